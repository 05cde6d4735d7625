//! Catalog interface consumed by the analyzer.
//!
//! The analyzer only ever calls [`Catalog::lookup_relation`] and the
//! function registry; table/function registration and persistence live
//! outside the core. [`MemoryCatalog`] is the in-process implementation
//! used by demos and tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use arrow_schema::DataType;
use flint_common::{FlintError, Result};

use crate::expr::{Attribute, ExprRef};
use crate::functions::BuiltinFunctions;
use crate::logical_plan::{LogicalPlan, PlanRef};

/// Name equality under the configured case policy.
pub fn names_equal(case_sensitive: bool, a: &str, b: &str) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

/// Resolved function metadata: exposes the builder that turns an argument
/// list into a bound expression.
pub struct FunctionInfo {
    /// Canonical function name.
    pub name: String,
    builder: Arc<dyn Fn(Vec<ExprRef>) -> Result<ExprRef> + Send + Sync>,
}

impl std::fmt::Debug for FunctionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionInfo").field("name", &self.name).finish()
    }
}

impl FunctionInfo {
    /// New function info with the given builder.
    pub fn new(
        name: impl Into<String>,
        builder: Arc<dyn Fn(Vec<ExprRef>) -> Result<ExprRef> + Send + Sync>,
    ) -> Self {
        Self {
            name: name.into(),
            builder,
        }
    }

    /// Build the bound expression for `args`.
    pub fn build(&self, args: Vec<ExprRef>) -> Result<ExprRef> {
        (self.builder)(args)
    }
}

/// Function lookup surface.
pub trait FunctionRegistry {
    /// Look up function metadata by name, failing with
    /// [`FlintError::FunctionNotFound`] on a miss.
    fn lookup_function(&self, name: &str) -> Result<FunctionInfo>;
}

/// Relation and function lookup surface consumed by the analyzer.
pub trait Catalog: Send + Sync {
    /// Look up a relation plan by name, failing with
    /// [`FlintError::TableNotFound`] on a miss.
    fn lookup_relation(&self, name: &str) -> Result<PlanRef>;

    /// The function registry attached to this catalog.
    fn function_registry(&self) -> &dyn FunctionRegistry;
}

/// In-memory catalog keyed by table name.
///
/// Attribute ids are minted once at registration, so repeated lookups of
/// the same table return the same ids — reference deduplication is what
/// mints fresh instances when a table appears on both sides of a join.
pub struct MemoryCatalog {
    case_sensitive: bool,
    tables: RwLock<HashMap<String, Vec<Attribute>>>,
    functions: BuiltinFunctions,
}

impl MemoryCatalog {
    /// Empty catalog with builtin functions registered.
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            tables: RwLock::new(HashMap::new()),
            functions: BuiltinFunctions::new(case_sensitive),
        }
    }

    /// Register (or replace) a table from (column, type, nullable) triples.
    pub fn register_table(
        &self,
        name: impl Into<String>,
        columns: Vec<(&str, DataType, bool)>,
    ) {
        let name = name.into();
        let attributes = columns
            .into_iter()
            .map(|(col, data_type, nullable)| {
                Attribute::new(col, data_type, nullable).qualified_by(name.clone())
            })
            .collect();
        self.tables
            .write()
            .expect("catalog lock poisoned")
            .insert(name, attributes);
    }
}

impl Catalog for MemoryCatalog {
    fn lookup_relation(&self, name: &str) -> Result<PlanRef> {
        let tables = self.tables.read().expect("catalog lock poisoned");
        tables
            .iter()
            .find(|(table, _)| names_equal(self.case_sensitive, table, name))
            .map(|(table, attributes)| {
                Arc::new(LogicalPlan::Relation {
                    table: table.clone(),
                    attributes: attributes.clone(),
                }) as PlanRef
            })
            .ok_or_else(|| FlintError::TableNotFound(name.to_string()))
    }

    fn function_registry(&self) -> &dyn FunctionRegistry {
        &self.functions
    }
}
