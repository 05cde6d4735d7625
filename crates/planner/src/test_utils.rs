//! Shared fixtures for analyzer tests.
//!
//! With the SQL parser out of scope, tests build unresolved plans the way
//! the parser would: relations referenced by name, select items wrapped in
//! auto-aliases, functions and attributes unresolved.

use std::sync::Arc;

use arrow_schema::DataType;

use crate::catalog::MemoryCatalog;
use crate::expr::{Expr, ExprRef};
use crate::logical_plan::{LogicalPlan, PlanRef};

/// Catalog with the standard test tables:
/// `t(a: INT, b: INT)` and `s(a: INT, c: STRING)`.
pub fn test_catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new(true);
    catalog.register_table(
        "t",
        vec![("a", DataType::Int32, false), ("b", DataType::Int32, false)],
    );
    catalog.register_table(
        "s",
        vec![("a", DataType::Int32, false), ("c", DataType::Utf8, true)],
    );
    catalog
}

/// Unresolved relation reference.
pub fn table(name: &str) -> PlanRef {
    Arc::new(LogicalPlan::UnresolvedRelation {
        name: name.to_string(),
    })
}

/// Unresolved attribute reference.
pub fn col(name: &str) -> ExprRef {
    Arc::new(Expr::UnresolvedAttribute {
        name: name.to_string(),
        qualifier: None,
    })
}

/// Qualified unresolved attribute reference.
pub fn qualified_col(qualifier: &str, name: &str) -> ExprRef {
    Arc::new(Expr::UnresolvedAttribute {
        name: name.to_string(),
        qualifier: Some(qualifier.to_string()),
    })
}

/// `*`, as written in a select list.
pub fn star() -> ExprRef {
    Arc::new(Expr::Star { qualifier: None })
}

/// Unresolved function application, as the parser emits it.
pub fn func(name: &str, args: Vec<ExprRef>, distinct: bool) -> ExprRef {
    Arc::new(Expr::UnresolvedFunction {
        name: name.to_string(),
        args,
        distinct,
    })
}

/// Select item the parser could not name: wrapped in an auto-alias.
pub fn auto(expr: ExprRef) -> ExprRef {
    Arc::new(Expr::AutoAlias { child: expr })
}

/// Projection node.
pub fn select(child: PlanRef, project_list: Vec<ExprRef>) -> PlanRef {
    Arc::new(LogicalPlan::Project {
        child,
        project_list,
    })
}

/// Filter node.
pub fn filter(child: PlanRef, condition: ExprRef) -> PlanRef {
    Arc::new(LogicalPlan::Filter { child, condition })
}
