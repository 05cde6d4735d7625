//! Builtin function registry.

use std::sync::Arc;

use flint_common::{FlintError, Result};

use crate::catalog::{names_equal, FunctionInfo, FunctionRegistry};
use crate::expr::{AggregateOp, Expr, ExprRef};

/// Registry of the builtin aggregate functions.
pub struct BuiltinFunctions {
    case_sensitive: bool,
}

impl BuiltinFunctions {
    /// New registry under the given name-matching policy.
    pub fn new(case_sensitive: bool) -> Self {
        Self { case_sensitive }
    }
}

const BUILTIN_AGGREGATES: &[AggregateOp] = &[
    AggregateOp::Count,
    AggregateOp::Sum,
    AggregateOp::Min,
    AggregateOp::Max,
    AggregateOp::Avg,
];

impl FunctionRegistry for BuiltinFunctions {
    fn lookup_function(&self, name: &str) -> Result<FunctionInfo> {
        BUILTIN_AGGREGATES
            .iter()
            .find(|op| names_equal(self.case_sensitive, op.name(), name))
            .map(|op| aggregate_info(*op))
            .ok_or_else(|| FlintError::FunctionNotFound(name.to_string()))
    }
}

fn aggregate_info(op: AggregateOp) -> FunctionInfo {
    FunctionInfo::new(
        op.name(),
        Arc::new(move |args: Vec<ExprRef>| {
            if args.len() != 1 {
                return Err(FlintError::Analysis(format!(
                    "{} expects exactly one argument, got {}",
                    op.name(),
                    args.len()
                )));
            }
            let mut it = args.into_iter();
            Ok(Arc::new(Expr::AggregateFunction {
                op,
                child: it.next().expect("arity checked above"),
            }))
        }),
    )
}
