//! Semantic analysis core for Flint SQL plans.
//!
//! Architecture role:
//! - accepts the unresolved logical plan produced by the parser
//! - binds names to catalog objects and functions, desugars higher-level
//!   constructs, and enforces/coerces types
//! - returns a fully resolved, strictly typed plan for the optimizer
//!
//! Key modules:
//! - [`expr`] / [`logical_plan`] — the immutable trees and their transforms
//! - [`types`] / [`constraints`] — the type lattice and constraint system
//! - [`analyzer`] / [`rules`] / [`aggregate`] / [`checks`] — the rule engine
//! - [`catalog`] — the lookup interface the analyzer consumes
//! - [`explain`] — diagnostic renderings

/// Aggregate resolution rules.
pub mod aggregate;
/// Rule engine and analyzer surface.
pub mod analyzer;
/// Catalog and function-registry interfaces.
pub mod catalog;
/// Type-check and post-analysis passes.
pub mod checks;
/// Expression type-constraint system.
pub mod constraints;
/// Plan and expression renderings.
pub mod explain;
/// Expression trees.
pub mod expr;
/// Builtin function registry.
pub mod functions;
/// Logical plan trees.
pub mod logical_plan;
/// Random plan/expression generation for tests.
pub mod test_utils;
/// Rewrite-result plumbing.
pub mod tree;
/// Type lattice over arrow data types.
pub mod types;
/// The resolution rule set.
pub mod rules;

pub use analyzer::{Analyzer, AnalyzerContext, Rule, RuleBatch, Strategy};
pub use catalog::{Catalog, FunctionInfo, FunctionRegistry, MemoryCatalog};
pub use explain::{display_name, explain_plan, render_expr};
pub use expr::{
    AggregateOp, Attribute, BinaryOperator, Expr, ExprRef, GeneratedKind, LiteralValue,
};
pub use logical_plan::{JoinType, LogicalPlan, PlanRef, SortOrder};
pub use tree::Transformed;
pub use types::AbstractType;
