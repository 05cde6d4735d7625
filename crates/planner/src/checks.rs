//! The type-check pass and the post-analysis checks.

use std::sync::Arc;

use arrow_schema::DataType;
use flint_common::{FlintError, Result};

use crate::analyzer::{AnalyzerContext, Rule};
use crate::constraints::{to_strictly_typed, TypeConstraint};
use crate::explain::render_expr;
use crate::expr::{Expr, ExprRef};
use crate::logical_plan::{
    collect_plan, collect_plan_exprs, transform_plan_up, LogicalPlan, PlanRef,
};
use crate::types::AbstractType;

/// Runs every expression's type constraint bottom-up, substituting the
/// coerced children, and enforces the plan-level typing obligations:
/// filter conditions are boolean, limit counts are foldable integrals,
/// sort keys are ordered, and set-operator sides agree in arity and type.
pub struct TypeCheck;

impl Rule for TypeCheck {
    fn name(&self) -> &str {
        "type_check"
    }

    fn apply(&self, plan: &PlanRef, _ctx: &AnalyzerContext) -> Result<PlanRef> {
        Ok(transform_plan_up(plan, &mut |node| {
            if !node.is_resolved() {
                // Residual unresolved nodes are reported by the
                // post-analysis batch, not here.
                return Ok(None);
            }
            let exprs = node.expressions();
            let mut new_exprs = Vec::with_capacity(exprs.len());
            let mut changed = false;
            for expr in &exprs {
                let strict = to_strictly_typed(expr)?;
                changed |= strict.as_ref() != expr.as_ref();
                new_exprs.push(strict);
            }
            let current: PlanRef = if changed {
                Arc::new(node.with_new_expressions(new_exprs))
            } else {
                Arc::clone(node)
            };
            let checked = enforce_plan_obligations(&current)?;
            if changed || !Arc::ptr_eq(&checked, &current) {
                Ok(Some(checked))
            } else {
                Ok(None)
            }
        })?
        .data)
    }
}

fn enforce_plan_obligations(plan: &PlanRef) -> Result<PlanRef> {
    match plan.as_ref() {
        LogicalPlan::Filter { child, condition } => {
            let coerced = TypeConstraint::SameTypeAs {
                target: DataType::Boolean,
                args: vec![Arc::clone(condition)],
            }
            .enforce()?;
            if coerced[0].as_ref() == condition.as_ref() {
                Ok(Arc::clone(plan))
            } else {
                Ok(Arc::new(LogicalPlan::Filter {
                    child: Arc::clone(child),
                    condition: coerced[0].clone(),
                }))
            }
        }
        LogicalPlan::Limit { child, count } => {
            let coerced = TypeConstraint::Foldable(vec![Arc::clone(count)])
                .and_then(|args| TypeConstraint::SameSubtypesOf {
                    supertype: AbstractType::Integral,
                    args,
                })
                .enforce()?;
            if coerced[0].as_ref() == count.as_ref() {
                Ok(Arc::clone(plan))
            } else {
                Ok(Arc::new(LogicalPlan::Limit {
                    child: Arc::clone(child),
                    count: coerced[0].clone(),
                }))
            }
        }
        LogicalPlan::Sort { child, order } => {
            let mut new_order = Vec::with_capacity(order.len());
            let mut changed = false;
            for o in order {
                let coerced = TypeConstraint::SameSubtypesOf {
                    supertype: AbstractType::Ordered,
                    args: vec![Arc::clone(&o.expr)],
                }
                .enforce()?;
                changed |= coerced[0].as_ref() != o.expr.as_ref();
                new_order.push(o.with_expr(coerced[0].clone()));
            }
            if changed {
                Ok(Arc::new(LogicalPlan::Sort {
                    child: Arc::clone(child),
                    order: new_order,
                }))
            } else {
                Ok(Arc::clone(plan))
            }
        }
        LogicalPlan::Union { left, right }
        | LogicalPlan::Intersect { left, right }
        | LogicalPlan::Except { left, right } => {
            let lout = left.output();
            let rout = right.output();
            if lout.len() != rout.len() {
                return Err(FlintError::Analysis(format!(
                    "set operator sides differ in arity: {} vs {}",
                    lout.len(),
                    rout.len()
                )));
            }
            for (l, r) in lout.iter().zip(&rout) {
                if l.data_type != r.data_type {
                    return Err(FlintError::TypeMismatch {
                        expr: render_expr(&r.to_expr()),
                        actual: r.data_type.clone(),
                        expected: l.data_type.to_string(),
                    });
                }
            }
            Ok(Arc::clone(plan))
        }
        _ => Ok(Arc::clone(plan)),
    }
}

/// Rejects whatever the resolution batch could not finish: the minimum
/// unresolved plan or expression, a generated attribute surviving in the
/// top-level output, or a distinct aggregate function.
pub struct PostAnalysisCheck;

impl Rule for PostAnalysisCheck {
    fn name(&self) -> &str {
        "post_analysis_check"
    }

    fn apply(&self, plan: &PlanRef, _ctx: &AnalyzerContext) -> Result<PlanRef> {
        // Minimum unresolved node: unresolved itself, children resolved.
        let minimum = collect_plan(plan, &mut |node| {
            (!node.is_resolved() && node.children().iter().all(|c| c.is_resolved()))
                .then(|| Arc::clone(node))
        });
        if let Some(node) = minimum.first() {
            return Err(unresolved_error(node));
        }

        for attr in plan.output() {
            if attr.generated.is_some() {
                return Err(FlintError::ResolutionFailure(format!(
                    "generated attribute {} must not appear in the analyzed output",
                    render_expr(&attr.to_expr())
                )));
            }
        }

        let distinct = collect_plan_exprs(plan, &mut |e| match e.as_ref() {
            Expr::DistinctAggregate(_) => Some(render_expr(e)),
            _ => None,
        });
        if let Some(rendered) = distinct.first() {
            return Err(FlintError::Unsupported(format!(
                "distinct aggregate function {rendered}"
            )));
        }

        Ok(Arc::clone(plan))
    }
}

fn unresolved_error(node: &PlanRef) -> FlintError {
    match node.as_ref() {
        LogicalPlan::UnresolvedRelation { name } => {
            FlintError::ResolutionFailure(format!("unresolved relation {name}"))
        }
        LogicalPlan::UnresolvedAggregate { .. } => {
            FlintError::ResolutionFailure("unresolved aggregate".to_string())
        }
        _ => {
            for expr in node.expressions() {
                if let Some(min) = minimum_unresolved_expr(&expr) {
                    return FlintError::ResolutionFailure(format!(
                        "unresolved expression {}",
                        render_expr(&min)
                    ));
                }
            }
            FlintError::ResolutionFailure("unresolved plan node".to_string())
        }
    }
}

fn minimum_unresolved_expr(expr: &ExprRef) -> Option<ExprRef> {
    for child in expr.children() {
        if let Some(min) = minimum_unresolved_expr(&child) {
            return Some(min);
        }
    }
    if !expr.is_resolved() && expr.children().iter().all(|c| c.is_resolved()) {
        Some(Arc::clone(expr))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use arrow_schema::DataType;
    use flint_common::config::LanguageConfig;

    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::expr::{Attribute, BinaryOperator};

    fn ctx() -> AnalyzerContext {
        AnalyzerContext {
            catalog: Arc::new(MemoryCatalog::new(true)),
            config: LanguageConfig::default(),
            anonymous_column: "col".to_string(),
        }
    }

    fn relation() -> (PlanRef, Attribute) {
        let a = Attribute::new("a", DataType::Int32, false).qualified_by("t");
        (
            Arc::new(LogicalPlan::Relation {
                table: "t".to_string(),
                attributes: vec![a.clone()],
            }),
            a,
        )
    }

    #[test]
    fn filter_condition_must_be_boolean() {
        let (t, a) = relation();
        let plan: PlanRef = Arc::new(LogicalPlan::Filter {
            child: t,
            condition: a.to_expr(),
        });
        let err = TypeCheck.apply(&plan, &ctx()).expect_err("must fail");
        assert!(matches!(err, FlintError::TypeMismatch { .. }), "err={err}");
    }

    #[test]
    fn type_check_inserts_casts_into_expressions() {
        let (t, _) = relation();
        let plan: PlanRef = Arc::new(LogicalPlan::Project {
            child: t,
            project_list: vec![Expr::alias(
                Arc::new(Expr::BinaryOp {
                    left: Expr::lit_str("1"),
                    op: BinaryOperator::Plus,
                    right: Expr::lit_i32(2),
                }),
                "s",
            )],
        });
        let checked = TypeCheck.apply(&plan, &ctx()).expect("check");
        let has_cast = collect_plan_exprs(&checked, &mut |e| {
            matches!(e.as_ref(), Expr::Cast { .. }).then_some(())
        });
        assert!(!has_cast.is_empty(), "expected an inserted cast");
    }

    #[test]
    fn limit_count_must_be_foldable() {
        let (t, a) = relation();
        let plan: PlanRef = Arc::new(LogicalPlan::Limit {
            child: t,
            count: a.to_expr(),
        });
        let err = TypeCheck.apply(&plan, &ctx()).expect_err("must fail");
        assert!(matches!(err, FlintError::TypeMismatch { .. }), "err={err}");

        let (t, _) = relation();
        let plan: PlanRef = Arc::new(LogicalPlan::Limit {
            child: t,
            count: Expr::lit_i32(10),
        });
        assert!(TypeCheck.apply(&plan, &ctx()).is_ok());
    }

    #[test]
    fn set_operator_sides_must_agree() {
        let (t, _) = relation();
        let s = Arc::new(LogicalPlan::Relation {
            table: "s".to_string(),
            attributes: vec![Attribute::new("x", DataType::Utf8, false).qualified_by("s")],
        });
        let plan: PlanRef = Arc::new(LogicalPlan::Union { left: t, right: s });
        let err = TypeCheck.apply(&plan, &ctx()).expect_err("must fail");
        assert!(matches!(err, FlintError::TypeMismatch { .. }), "err={err}");
    }

    #[test]
    fn residual_unresolved_attribute_is_reported() {
        let (t, _) = relation();
        let plan: PlanRef = Arc::new(LogicalPlan::Filter {
            child: t,
            condition: Arc::new(Expr::UnresolvedAttribute {
                name: "missing".to_string(),
                qualifier: None,
            }),
        });
        let err = PostAnalysisCheck.apply(&plan, &ctx()).expect_err("must fail");
        match err {
            FlintError::ResolutionFailure(msg) => {
                assert!(msg.contains("missing"), "msg={msg}")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn top_level_generated_attribute_is_rejected() {
        let (t, a) = relation();
        let grouping = Expr::grouping_alias(a.to_expr());
        let plan: PlanRef = Arc::new(LogicalPlan::Aggregate {
            child: t,
            grouping: vec![grouping],
            aggregations: vec![],
        });
        let err = PostAnalysisCheck.apply(&plan, &ctx()).expect_err("must fail");
        assert!(
            matches!(err, FlintError::ResolutionFailure(_)),
            "unexpected error: {err}"
        );
    }
}
