//! The resolution rule set.
//!
//! Each rule is a small plan rewrite; the engine iterates the whole set to
//! a fixed point, so rules only need to make progress, not finish in one
//! application. Aggregate resolution lives in [`crate::aggregate`].

use std::collections::HashMap;
use std::sync::Arc;

use flint_common::{ExprId, FlintError, Result};

use crate::analyzer::{AnalyzerContext, Rule};
use crate::catalog::names_equal;
use crate::explain::{display_name, render_expr};
use crate::expr::{collect_first_expr, transform_expr_down, Attribute, Expr, ExprRef};
use crate::logical_plan::{
    transform_plan_down, transform_plan_exprs_down, transform_plan_up, LogicalPlan, PlanRef,
};

/// Replaces each `With` binding by its body, substituting the CTE relation
/// for every reference to the bound name. Bottom-up, so inner bindings
/// shadow outer ones.
pub struct InlineCteRelations;

impl Rule for InlineCteRelations {
    fn name(&self) -> &str {
        "inline_cte_relations"
    }

    fn apply(&self, plan: &PlanRef, ctx: &AnalyzerContext) -> Result<PlanRef> {
        let case_sensitive = ctx.case_sensitive();
        Ok(transform_plan_up(plan, &mut |node| {
            Ok(match node.as_ref() {
                LogicalPlan::With { child, name, cte } => {
                    let replacement: PlanRef = Arc::new(LogicalPlan::SubqueryAlias {
                        name: name.clone(),
                        child: Arc::clone(cte),
                    });
                    Some(substitute_relation(child, case_sensitive, name, &replacement))
                }
                _ => None,
            })
        })?
        .data)
    }
}

/// Replace every `UnresolvedRelation` matching `name` by `replacement`,
/// without descending into the replacement (a CTE body may legitimately
/// reference an outer relation of the same name).
fn substitute_relation(
    plan: &PlanRef,
    case_sensitive: bool,
    name: &str,
    replacement: &PlanRef,
) -> PlanRef {
    if let LogicalPlan::UnresolvedRelation { name: referenced } = plan.as_ref() {
        if names_equal(case_sensitive, referenced, name) {
            return Arc::clone(replacement);
        }
    }
    let children = plan.children();
    if children.is_empty() {
        return Arc::clone(plan);
    }
    let new_children: Vec<PlanRef> = children
        .iter()
        .map(|c| substitute_relation(c, case_sensitive, name, replacement))
        .collect();
    if new_children
        .iter()
        .zip(&children)
        .all(|(a, b)| Arc::ptr_eq(a, b))
    {
        Arc::clone(plan)
    } else {
        Arc::new(plan.with_new_children(new_children))
    }
}

/// Binds every remaining `UnresolvedRelation` through the catalog.
pub struct ResolveRelations;

impl Rule for ResolveRelations {
    fn name(&self) -> &str {
        "resolve_relations"
    }

    fn apply(&self, plan: &PlanRef, ctx: &AnalyzerContext) -> Result<PlanRef> {
        Ok(transform_plan_up(plan, &mut |node| {
            Ok(match node.as_ref() {
                LogicalPlan::UnresolvedRelation { name } => {
                    Some(ctx.catalog.lookup_relation(name)?)
                }
                _ => None,
            })
        })?
        .data)
    }
}

/// Binds `UnresolvedFunction`s through the registry once their arguments
/// are resolved. `count(*)` becomes `count(1)`; any other star argument is
/// rejected, as is `DISTINCT` over a non-aggregate.
pub struct ResolveFunctions;

impl Rule for ResolveFunctions {
    fn name(&self) -> &str {
        "resolve_functions"
    }

    fn apply(&self, plan: &PlanRef, ctx: &AnalyzerContext) -> Result<PlanRef> {
        let case_sensitive = ctx.case_sensitive();
        Ok(transform_plan_exprs_down(plan, &mut |expr| {
            let Expr::UnresolvedFunction {
                name,
                args,
                distinct,
            } = expr.as_ref()
            else {
                return Ok(None);
            };
            let has_star = args.iter().any(|a| matches!(a.as_ref(), Expr::Star { .. }));
            if has_star {
                if names_equal(case_sensitive, name, "count") && args.len() == 1 {
                    if *distinct {
                        return Err(FlintError::Analysis(
                            "DISTINCT cannot be applied to count(*)".to_string(),
                        ));
                    }
                    return Ok(Some(Arc::new(Expr::AggregateFunction {
                        op: crate::expr::AggregateOp::Count,
                        child: Expr::lit_i32(1),
                    })));
                }
                return Err(FlintError::Analysis(format!(
                    "star argument is only valid in count(*), not in {name}(*)"
                )));
            }
            if !args.iter().all(|a| a.is_resolved()) {
                return Ok(None);
            }
            let info = ctx.catalog.function_registry().lookup_function(name)?;
            let built = info.build(args.clone())?;
            if *distinct {
                if matches!(built.as_ref(), Expr::AggregateFunction { .. }) {
                    Ok(Some(Arc::new(Expr::DistinctAggregate(built))))
                } else {
                    Err(FlintError::Analysis(format!(
                        "DISTINCT cannot be applied to non-aggregate function {name}"
                    )))
                }
            } else {
                Ok(Some(built))
            }
        })?
        .data)
    }
}

/// Expands `*` and `qualifier.*` in projections against the child output.
/// Waits until the child is resolved and deduplicated so the expansion
/// picks up fresh ids minted by reference deduplication.
pub struct ExpandStars;

impl Rule for ExpandStars {
    fn name(&self) -> &str {
        "expand_stars"
    }

    fn apply(&self, plan: &PlanRef, ctx: &AnalyzerContext) -> Result<PlanRef> {
        let case_sensitive = ctx.case_sensitive();
        Ok(transform_plan_down(plan, &mut |node| {
            let LogicalPlan::Project {
                child,
                project_list,
            } = node.as_ref()
            else {
                return Ok(None);
            };
            if !project_list
                .iter()
                .any(|e| matches!(e.as_ref(), Expr::Star { .. }))
            {
                return Ok(None);
            }
            if !child.is_resolved() || !child.is_deduplicated() {
                return Ok(None);
            }
            let output = child.output();
            let mut new_list = Vec::with_capacity(project_list.len());
            for expr in project_list {
                match expr.as_ref() {
                    Expr::Star { qualifier: None } => {
                        new_list.extend(output.iter().map(|a| a.to_expr()));
                    }
                    Expr::Star {
                        qualifier: Some(q),
                    } => {
                        let matched: Vec<ExprRef> = output
                            .iter()
                            .filter(|a| {
                                a.qualifier
                                    .as_deref()
                                    .is_some_and(|aq| names_equal(case_sensitive, aq, q))
                            })
                            .map(|a| a.to_expr())
                            .collect();
                        if matched.is_empty() {
                            return Err(FlintError::ResolutionFailure(format!(
                                "cannot expand {q}.*: no input attribute has that qualifier"
                            )));
                        }
                        new_list.extend(matched);
                    }
                    _ => new_list.push(Arc::clone(expr)),
                }
            }
            Ok(Some(Arc::new(LogicalPlan::Project {
                child: Arc::clone(child),
                project_list: new_list,
            })))
        })?
        .data)
    }
}

fn attribute_candidates(
    inputs: &[Attribute],
    case_sensitive: bool,
    name: &str,
    qualifier: Option<&str>,
) -> Vec<Attribute> {
    inputs
        .iter()
        .filter(|a| {
            names_equal(case_sensitive, &a.name, name)
                && match qualifier {
                    None => true,
                    Some(q) => a
                        .qualifier
                        .as_deref()
                        .is_some_and(|aq| names_equal(case_sensitive, aq, q)),
                }
        })
        .cloned()
        .collect()
}

/// Binds `UnresolvedAttribute`s against the union of the children's
/// outputs. Zero candidates leaves the reference for a later rule;
/// multiple candidates is an ambiguity error. Skips nodes whose subtree is
/// not yet deduplicated.
pub struct ResolveReferences;

impl Rule for ResolveReferences {
    fn name(&self) -> &str {
        "resolve_references"
    }

    fn apply(&self, plan: &PlanRef, ctx: &AnalyzerContext) -> Result<PlanRef> {
        let case_sensitive = ctx.case_sensitive();
        Ok(transform_plan_up(plan, &mut |node| {
            let has_unresolved = node.expressions().iter().any(|e| {
                collect_first_expr(e, &mut |x| {
                    matches!(x.as_ref(), Expr::UnresolvedAttribute { .. }).then_some(())
                })
                .is_some()
            });
            if !has_unresolved || !node.is_deduplicated() {
                return Ok(None);
            }
            let inputs: Vec<Attribute> =
                node.children().iter().flat_map(|c| c.output()).collect();
            if inputs.is_empty() {
                return Ok(None);
            }
            let exprs = node.expressions();
            let mut new_exprs = Vec::with_capacity(exprs.len());
            let mut changed = false;
            for expr in &exprs {
                let t = transform_expr_down(expr, &mut |e| {
                    let Expr::UnresolvedAttribute { name, qualifier } = e.as_ref() else {
                        return Ok(None);
                    };
                    let found = attribute_candidates(
                        &inputs,
                        case_sensitive,
                        name,
                        qualifier.as_deref(),
                    );
                    match found.len() {
                        0 => Ok(None),
                        1 => Ok(Some(found[0].to_expr())),
                        _ => Err(FlintError::ResolutionFailure(format!(
                            "ambiguous reference to {}: candidates are [{}]",
                            render_expr(e),
                            found
                                .iter()
                                .map(|a| render_expr(&a.to_expr()))
                                .collect::<Vec<_>>()
                                .join(", ")
                        ))),
                    }
                })?;
                changed |= t.changed;
                new_exprs.push(t.data);
            }
            if changed {
                Ok(Some(Arc::new(node.with_new_expressions(new_exprs))))
            } else {
                Ok(None)
            }
        })?
        .data)
    }
}

/// Converts `AutoAlias` wrappers over resolved children into real aliases
/// named after the child's rendering. A wrapper over a bare attribute
/// collapses to the attribute itself, which keeps its id stable.
pub struct ResolveAliases;

impl Rule for ResolveAliases {
    fn name(&self) -> &str {
        "resolve_aliases"
    }

    fn apply(&self, plan: &PlanRef, ctx: &AnalyzerContext) -> Result<PlanRef> {
        Ok(transform_plan_exprs_down(plan, &mut |expr| {
            let Expr::AutoAlias { child } = expr.as_ref() else {
                return Ok(None);
            };
            if !child.is_resolved() {
                return Ok(None);
            }
            if matches!(child.as_ref(), Expr::AttributeRef(_)) {
                return Ok(Some(Arc::clone(child)));
            }
            let mut name: String = display_name(child)
                .chars()
                .filter(|c| *c != '`' && *c != '\'')
                .collect();
            if name.is_empty() {
                name = ctx.anonymous_column.clone();
            }
            Ok(Some(Expr::alias(Arc::clone(child), name)))
        })?
        .data)
    }
}

/// Regenerates output ids on the right side of a binary operator whenever
/// both sides share an id, then rewrites every reference in the right
/// subtree to follow. Multi-instance relations get a fresh instance;
/// otherwise conflicting projection aliases get fresh ids.
pub struct DeduplicateReferences;

impl Rule for DeduplicateReferences {
    fn name(&self) -> &str {
        "deduplicate_references"
    }

    fn apply(&self, plan: &PlanRef, _ctx: &AnalyzerContext) -> Result<PlanRef> {
        Ok(transform_plan_down(plan, &mut |node| {
            let (left, right) = match node.as_ref() {
                LogicalPlan::Join { left, right, .. }
                | LogicalPlan::Union { left, right }
                | LogicalPlan::Intersect { left, right }
                | LogicalPlan::Except { left, right } => (left, right),
                _ => return Ok(None),
            };
            if !left.is_resolved() || !right.is_resolved() {
                return Ok(None);
            }
            let left_ids = left.output_ids();
            if left_ids.is_disjoint(&right.output_ids()) {
                return Ok(None);
            }

            let mut mapping: HashMap<ExprId, Attribute> = HashMap::new();
            let reinstanced = transform_plan_down(right, &mut |n| {
                match n.as_ref() {
                    LogicalPlan::Relation { table, attributes }
                        if attributes.iter().any(|a| left_ids.contains(&a.id)) =>
                    {
                        let fresh =
                            crate::logical_plan::new_relation_instance(table, attributes);
                        if let LogicalPlan::Relation {
                            attributes: fresh_attrs,
                            ..
                        } = &fresh
                        {
                            for (old, new) in attributes.iter().zip(fresh_attrs) {
                                mapping.insert(old.id, new.clone());
                            }
                        }
                        Ok(Some(Arc::new(fresh)))
                    }
                    LogicalPlan::Project {
                        child,
                        project_list,
                    } if project_list
                        .iter()
                        .any(|e| e.expr_id().is_some_and(|id| left_ids.contains(&id))) =>
                    {
                        let new_list = project_list
                            .iter()
                            .map(|e| match e.as_ref() {
                                Expr::Alias {
                                    child: c,
                                    name,
                                    id,
                                } if left_ids.contains(id) => {
                                    let fresh = ExprId::next();
                                    if let Some(mut attr) = e.to_attribute() {
                                        attr.id = fresh;
                                        mapping.insert(*id, attr);
                                    }
                                    Arc::new(Expr::Alias {
                                        child: Arc::clone(c),
                                        name: name.clone(),
                                        id: fresh,
                                    })
                                }
                                _ => Arc::clone(e),
                            })
                            .collect();
                        Ok(Some(Arc::new(LogicalPlan::Project {
                            child: Arc::clone(child),
                            project_list: new_list,
                        })))
                    }
                    _ => Ok(None),
                }
            })?;

            let remapped = transform_plan_exprs_down(&reinstanced.data, &mut |e| {
                Ok(match e.as_ref() {
                    Expr::AttributeRef(attr) => {
                        mapping.get(&attr.id).map(|fresh| fresh.to_expr())
                    }
                    _ => None,
                })
            })?;

            let mut children = node.children();
            children[1] = remapped.data;
            Ok(Some(Arc::new(node.with_new_children(children))))
        })?
        .data)
    }
}

/// `Distinct(child)` desugars into grouping by the child's whole output and
/// projecting it back.
pub struct RewriteDistinctsAsAggregates;

impl Rule for RewriteDistinctsAsAggregates {
    fn name(&self) -> &str {
        "rewrite_distincts_as_aggregates"
    }

    fn apply(&self, plan: &PlanRef, _ctx: &AnalyzerContext) -> Result<PlanRef> {
        Ok(transform_plan_up(plan, &mut |node| {
            Ok(match node.as_ref() {
                LogicalPlan::Distinct { child } if child.is_resolved() => {
                    let refs: Vec<ExprRef> =
                        child.output().iter().map(|a| a.to_expr()).collect();
                    Some(Arc::new(LogicalPlan::UnresolvedAggregate {
                        child: Arc::clone(child),
                        keys: refs.clone(),
                        project_list: refs,
                        having: vec![],
                        order: vec![],
                    }))
                }
                _ => None,
            })
        })?
        .data)
    }
}

/// A sort above a projection may reference attributes the projection
/// pruned. Re-project with the missing references appended, sort, then
/// re-project the original output. Aggregated projections are left to
/// aggregate resolution.
pub struct ResolveSortReferences;

impl Rule for ResolveSortReferences {
    fn name(&self) -> &str {
        "resolve_sort_references"
    }

    fn apply(&self, plan: &PlanRef, ctx: &AnalyzerContext) -> Result<PlanRef> {
        let case_sensitive = ctx.case_sensitive();
        Ok(transform_plan_down(plan, &mut |node| {
            let LogicalPlan::Sort { child, order } = node.as_ref() else {
                return Ok(None);
            };
            let LogicalPlan::Project {
                child: inner,
                project_list,
            } = child.as_ref()
            else {
                return Ok(None);
            };
            if project_list.iter().any(|e| e.contains_aggregate()) {
                return Ok(None);
            }
            if !child.is_resolved() {
                return Ok(None);
            }

            let mut pending: Vec<(String, Option<String>)> = vec![];
            for o in order {
                crate::expr::collect_expr(&o.expr, &mut |e| match e.as_ref() {
                    Expr::UnresolvedAttribute { name, qualifier } => {
                        Some((name.clone(), qualifier.clone()))
                    }
                    _ => None,
                })
                .into_iter()
                .for_each(|p| {
                    if !pending.contains(&p) {
                        pending.push(p);
                    }
                });
            }
            if pending.is_empty() {
                return Ok(None);
            }

            let inner_output = inner.output();
            let mut bound: Vec<((String, Option<String>), Attribute)> = vec![];
            for (name, qualifier) in &pending {
                let found = attribute_candidates(
                    &inner_output,
                    case_sensitive,
                    name,
                    qualifier.as_deref(),
                );
                match found.len() {
                    0 => return Ok(None),
                    1 => bound.push(((name.clone(), qualifier.clone()), found[0].clone())),
                    _ => {
                        return Err(FlintError::ResolutionFailure(format!(
                            "ambiguous sort reference to {name}"
                        )))
                    }
                }
            }

            let mut new_order = Vec::with_capacity(order.len());
            for o in order {
                let t = transform_expr_down(&o.expr, &mut |e| {
                    Ok(match e.as_ref() {
                        Expr::UnresolvedAttribute { name, qualifier } => bound
                            .iter()
                            .find(|((n, q), _)| n == name && q == qualifier)
                            .map(|(_, attr)| attr.to_expr()),
                        _ => None,
                    })
                })?;
                new_order.push(o.with_expr(t.data));
            }

            let visible = child.output_ids();
            let extra: Vec<ExprRef> = bound
                .iter()
                .filter(|(_, attr)| !visible.contains(&attr.id))
                .map(|(_, attr)| attr.to_expr())
                .collect();

            let mut widened_list = project_list.clone();
            widened_list.extend(extra);
            let widened = Arc::new(LogicalPlan::Project {
                child: Arc::clone(inner),
                project_list: widened_list,
            });
            let sorted = Arc::new(LogicalPlan::Sort {
                child: widened,
                order: new_order,
            });
            let restored: Vec<ExprRef> = child.output().iter().map(|a| a.to_expr()).collect();
            Ok(Some(Arc::new(LogicalPlan::Project {
                child: sorted,
                project_list: restored,
            })))
        })?
        .data)
    }
}

/// A projection containing an aggregate function is a global aggregation
/// with no grouping keys.
pub struct GlobalAggregates;

impl Rule for GlobalAggregates {
    fn name(&self) -> &str {
        "global_aggregates"
    }

    fn apply(&self, plan: &PlanRef, _ctx: &AnalyzerContext) -> Result<PlanRef> {
        Ok(transform_plan_up(plan, &mut |node| {
            Ok(match node.as_ref() {
                LogicalPlan::Project {
                    child,
                    project_list,
                } if project_list.iter().any(|e| e.contains_aggregate()) => {
                    Some(Arc::new(LogicalPlan::UnresolvedAggregate {
                        child: Arc::clone(child),
                        keys: vec![],
                        project_list: project_list.clone(),
                        having: vec![],
                        order: vec![],
                    }))
                }
                _ => None,
            })
        })?
        .data)
    }
}

/// A filter directly above an unresolved aggregate is a pending HAVING
/// condition; fold it into the aggregate. Stacked filters fold one per
/// visit.
pub struct MergeHavingConditions;

impl Rule for MergeHavingConditions {
    fn name(&self) -> &str {
        "merge_having_conditions"
    }

    fn apply(&self, plan: &PlanRef, _ctx: &AnalyzerContext) -> Result<PlanRef> {
        Ok(transform_plan_up(plan, &mut |node| {
            let LogicalPlan::Filter {
                child,
                condition,
            } = node.as_ref()
            else {
                return Ok(None);
            };
            let LogicalPlan::UnresolvedAggregate {
                child: agg_child,
                keys,
                project_list,
                having,
                order,
            } = child.as_ref()
            else {
                return Ok(None);
            };
            let mut new_having = having.clone();
            new_having.push(Arc::clone(condition));
            Ok(Some(Arc::new(LogicalPlan::UnresolvedAggregate {
                child: Arc::clone(agg_child),
                keys: keys.clone(),
                project_list: project_list.clone(),
                having: new_having,
                order: order.clone(),
            })))
        })?
        .data)
    }
}

/// A sort directly above an unresolved aggregate replaces the aggregate's
/// pending ordering; only the outermost sort survives.
pub struct MergeSortsOverAggregates;

impl Rule for MergeSortsOverAggregates {
    fn name(&self) -> &str {
        "merge_sorts_over_aggregates"
    }

    fn apply(&self, plan: &PlanRef, _ctx: &AnalyzerContext) -> Result<PlanRef> {
        Ok(transform_plan_up(plan, &mut |node| {
            let LogicalPlan::Sort { child, order } = node.as_ref() else {
                return Ok(None);
            };
            let LogicalPlan::UnresolvedAggregate {
                child: agg_child,
                keys,
                project_list,
                having,
                ..
            } = child.as_ref()
            else {
                return Ok(None);
            };
            Ok(Some(Arc::new(LogicalPlan::UnresolvedAggregate {
                child: Arc::clone(agg_child),
                keys: keys.clone(),
                project_list: project_list.clone(),
                having: having.clone(),
                order: order.clone(),
            })))
        })?
        .data)
    }
}
