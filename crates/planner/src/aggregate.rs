//! Aggregate resolution.
//!
//! `ResolveAggregates` correlates grouping keys, collected aggregate
//! functions, having conditions, and sort orderings into one `Aggregate`
//! node plus an outer projection. It is the only rule that needs parent
//! context (an aggregate directly under a pending filter or sort must wait
//! for the merge rules), so it drives its own traversal instead of the
//! generic transforms.

use std::sync::Arc;

use flint_common::{FlintError, Result};

use crate::analyzer::{AnalyzerContext, Rule};
use crate::explain::{display_name, render_expr};
use crate::expr::{collect_expr, transform_expr_down, Attribute, Expr, ExprRef};
use crate::logical_plan::{collect_plan_exprs, LogicalPlan, PlanRef, SortOrder};

/// Rejects any surviving `DistinctAggregate`: the rewrite into a supported
/// form (two-phase aggregation or a self-join) is intentionally not
/// implemented yet.
pub struct RewriteDistinctAggregateFunctions;

impl Rule for RewriteDistinctAggregateFunctions {
    fn name(&self) -> &str {
        "rewrite_distinct_aggregate_functions"
    }

    fn apply(&self, plan: &PlanRef, _ctx: &AnalyzerContext) -> Result<PlanRef> {
        let found = collect_plan_exprs(plan, &mut |e| match e.as_ref() {
            Expr::DistinctAggregate(_) => Some(render_expr(e)),
            _ => None,
        });
        match found.first() {
            Some(rendered) => Err(FlintError::Unsupported(format!(
                "distinct aggregate function {rendered}"
            ))),
            None => Ok(Arc::clone(plan)),
        }
    }
}

/// Resolves `UnresolvedAggregate` nodes. See the steps in
/// [`rewrite_unresolved_aggregate`].
pub struct ResolveAggregates;

impl Rule for ResolveAggregates {
    fn name(&self) -> &str {
        "resolve_aggregates"
    }

    fn apply(&self, plan: &PlanRef, _ctx: &AnalyzerContext) -> Result<PlanRef> {
        resolve_in(plan)
    }
}

fn resolve_in(plan: &PlanRef) -> Result<PlanRef> {
    // An aggregate directly under a filter or sort still has merging ahead
    // of it; recurse past it without resolving.
    match plan.as_ref() {
        LogicalPlan::Filter { child, .. } | LogicalPlan::Sort { child, .. }
            if matches!(child.as_ref(), LogicalPlan::UnresolvedAggregate { .. }) =>
        {
            let new_child = rebuild_children(child)?;
            if Arc::ptr_eq(&new_child, child) {
                Ok(Arc::clone(plan))
            } else {
                Ok(Arc::new(plan.with_new_children(vec![new_child])))
            }
        }
        LogicalPlan::UnresolvedAggregate {
            child,
            keys,
            project_list,
            having,
            order,
        } => {
            let child = resolve_in(child)?;
            let ready = child.is_resolved()
                && keys.iter().all(|e| e.is_resolved())
                && project_list.iter().all(|e| e.is_resolved())
                && having.iter().all(|e| e.is_resolved())
                && order.iter().all(|o| o.expr.is_resolved());
            if ready {
                rewrite_unresolved_aggregate(&child, keys, project_list, having, order)
            } else if Arc::ptr_eq(&child, &plan.children()[0]) {
                Ok(Arc::clone(plan))
            } else {
                Ok(Arc::new(plan.with_new_children(vec![child])))
            }
        }
        _ => rebuild_children(plan),
    }
}

fn rebuild_children(plan: &PlanRef) -> Result<PlanRef> {
    let children = plan.children();
    if children.is_empty() {
        return Ok(Arc::clone(plan));
    }
    let new_children: Vec<PlanRef> = children.iter().map(resolve_in).collect::<Result<_>>()?;
    if new_children
        .iter()
        .zip(&children)
        .all(|(a, b)| Arc::ptr_eq(a, b))
    {
        Ok(Arc::clone(plan))
    } else {
        Ok(Arc::new(plan.with_new_children(new_children)))
    }
}

/// The aggregate rewrite:
///
/// 1. bind each grouping key to a fresh grouping alias;
/// 2. collect aggregate functions across project list, having conditions,
///    and orderings — distinct wrappers first so their inner functions are
///    not collected twice;
/// 3. reject aggregate functions nested inside aggregate functions;
/// 4. bind each collected aggregate to a fresh aggregation alias;
/// 5. rewrite all three expression sets, keys before aggregates, top-down;
///    bare generated attributes at the top of the project list get
///    re-aliased under the original expression's display name;
/// 6. reject any raw attribute that survived the rewrite — it was neither
///    grouped nor aggregated;
/// 7. assemble Aggregate, then optional Filter, optional Sort, and the
///    outer Project.
fn rewrite_unresolved_aggregate(
    child: &PlanRef,
    keys: &[ExprRef],
    project_list: &[ExprRef],
    having: &[ExprRef],
    order: &[SortOrder],
) -> Result<PlanRef> {
    // Step 1: grouping aliases and the key substitution.
    let key_aliases: Vec<ExprRef> = keys
        .iter()
        .map(|k| Expr::grouping_alias(Arc::clone(k)))
        .collect();
    let key_subst: Vec<(ExprRef, Attribute)> = keys
        .iter()
        .zip(&key_aliases)
        .filter_map(|(k, alias)| alias.to_attribute().map(|a| (Arc::clone(k), a)))
        .collect();

    // Step 2: collect aggregates from every expression position.
    let all_exprs: Vec<ExprRef> = project_list
        .iter()
        .chain(having)
        .map(Arc::clone)
        .chain(order.iter().map(|o| Arc::clone(&o.expr)))
        .collect();

    let mut distinct_aggs: Vec<ExprRef> = vec![];
    for expr in &all_exprs {
        for found in collect_expr(expr, &mut |e| {
            matches!(e.as_ref(), Expr::DistinctAggregate(_)).then(|| Arc::clone(e))
        }) {
            if !distinct_aggs.iter().any(|d| d.as_ref() == found.as_ref()) {
                distinct_aggs.push(found);
            }
        }
    }

    // Rewriting distinct occurrences away first keeps their inner
    // functions out of the plain collection.
    let distinct_placeholders: Vec<ExprRef> = distinct_aggs
        .iter()
        .map(|d| Expr::aggregation_alias(Arc::clone(d)))
        .collect();
    let mut plain_aggs: Vec<ExprRef> = vec![];
    for expr in &all_exprs {
        let masked = transform_expr_down(expr, &mut |e| {
            Ok(distinct_aggs
                .iter()
                .position(|d| d.as_ref() == e.as_ref())
                .map(|_| Expr::lit_i32(0)))
        })?;
        for found in collect_expr(&masked.data, &mut |e| {
            matches!(e.as_ref(), Expr::AggregateFunction { .. }).then(|| Arc::clone(e))
        }) {
            if !plain_aggs.iter().any(|p| p.as_ref() == found.as_ref()) {
                plain_aggs.push(found);
            }
        }
    }

    // Step 3: no aggregate may contain another aggregate.
    for distinct in &distinct_aggs {
        if let Expr::DistinctAggregate(inner) = distinct.as_ref() {
            if let Expr::AggregateFunction { child: arg, .. } = inner.as_ref() {
                if arg.contains_aggregate() {
                    return Err(FlintError::IllegalAggregation(format!(
                        "aggregate function nested inside {}",
                        render_expr(distinct)
                    )));
                }
            }
        }
    }
    for agg in &plain_aggs {
        if let Expr::AggregateFunction { child: arg, .. } = agg.as_ref() {
            if arg.contains_aggregate() {
                return Err(FlintError::IllegalAggregation(format!(
                    "aggregate function nested inside {}",
                    render_expr(agg)
                )));
            }
        }
    }

    // Step 4: aggregation aliases and the aggregate substitution.
    let plain_aliases: Vec<ExprRef> = plain_aggs
        .iter()
        .map(|a| Expr::aggregation_alias(Arc::clone(a)))
        .collect();
    let agg_aliases: Vec<ExprRef> = distinct_placeholders
        .iter()
        .chain(&plain_aliases)
        .map(Arc::clone)
        .collect();
    let agg_subst: Vec<(ExprRef, Attribute)> = distinct_aggs
        .iter()
        .chain(&plain_aggs)
        .zip(&agg_aliases)
        .filter_map(|(agg, alias)| alias.to_attribute().map(|a| (Arc::clone(agg), a)))
        .collect();

    // Step 5: keys first, then aggregates, top-down.
    let rewrite = |expr: &ExprRef| -> Result<ExprRef> {
        Ok(transform_expr_down(expr, &mut |e| {
            for (key, attr) in &key_subst {
                if key.as_ref() == e.as_ref() {
                    return Ok(Some(attr.to_expr()));
                }
            }
            for (agg, attr) in &agg_subst {
                if agg.as_ref() == e.as_ref() {
                    return Ok(Some(attr.to_expr()));
                }
            }
            Ok(None)
        })?
        .data)
    };

    let mut new_project = Vec::with_capacity(project_list.len());
    for expr in project_list {
        let rewritten = rewrite(expr)?;
        let top_level_generated = matches!(
            rewritten.as_ref(),
            Expr::AttributeRef(Attribute {
                generated: Some(_),
                ..
            })
        );
        if top_level_generated {
            new_project.push(Expr::alias(rewritten, display_name(expr)));
        } else {
            new_project.push(rewritten);
        }
    }
    let new_having: Vec<ExprRef> = having.iter().map(&rewrite).collect::<Result<_>>()?;
    let new_order: Vec<SortOrder> = order
        .iter()
        .map(|o| Ok(o.with_expr(rewrite(&o.expr)?)))
        .collect::<Result<_>>()?;

    // Step 6: anything still referencing a raw attribute was neither
    // grouped nor aggregated.
    check_no_raw_attributes(&new_project, "SELECT field")?;
    check_no_raw_attributes(&new_having, "HAVING condition")?;
    let order_exprs: Vec<ExprRef> = new_order.iter().map(|o| Arc::clone(&o.expr)).collect();
    check_no_raw_attributes(&order_exprs, "ORDER BY expression")?;

    // Step 7: assemble.
    let mut result: PlanRef = Arc::new(LogicalPlan::Aggregate {
        child: Arc::clone(child),
        grouping: key_aliases,
        aggregations: agg_aliases,
    });
    if !new_having.is_empty() {
        let mut conditions = new_having.into_iter();
        let first = conditions.next().expect("non-empty having");
        let folded = conditions.fold(first, |acc, c| Arc::new(Expr::And(acc, c)));
        result = Arc::new(LogicalPlan::Filter {
            child: result,
            condition: folded,
        });
    }
    if !new_order.is_empty() {
        result = Arc::new(LogicalPlan::Sort {
            child: result,
            order: new_order,
        });
    }
    Ok(Arc::new(LogicalPlan::Project {
        child: result,
        project_list: new_project,
    }))
}

fn check_no_raw_attributes(exprs: &[ExprRef], part: &str) -> Result<()> {
    for expr in exprs {
        let raw = crate::expr::collect_first_expr(expr, &mut |e| match e.as_ref() {
            Expr::AttributeRef(attr) if attr.generated.is_none() => Some(attr.clone()),
            _ => None,
        });
        if let Some(attr) = raw {
            return Err(FlintError::IllegalAggregation(format!(
                "{part} {} references {}, which is neither grouped nor aggregated",
                render_expr(expr),
                render_expr(&attr.to_expr()),
            )));
        }
    }
    Ok(())
}
