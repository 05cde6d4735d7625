//! Logical plan trees.
//!
//! Plans are immutable `Arc`-shared trees over [`Expr`] expressions. Every
//! node computes an `output` attribute list and a `resolved` predicate, and
//! the same generic transforms as expressions apply at the plan level, plus
//! lifted variants that run an expression rewrite at every expression
//! position inside every node.

use std::collections::HashSet;
use std::sync::Arc;

use flint_common::{ExprId, Result};

use crate::expr::{transform_expr_down, transform_expr_up, Attribute, ExprRef};
use crate::tree::Transformed;

/// Shared reference to a plan node.
pub type PlanRef = Arc<LogicalPlan>;

/// Join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// Inner join.
    Inner,
}

/// One sort key: expression plus direction.
#[derive(Debug, Clone, PartialEq)]
pub struct SortOrder {
    /// Sort key expression.
    pub expr: ExprRef,
    /// Ascending (`true`) or descending.
    pub ascending: bool,
}

impl SortOrder {
    /// Ascending order over `expr`.
    pub fn asc(expr: ExprRef) -> Self {
        Self {
            expr,
            ascending: true,
        }
    }

    /// Same key with a different expression.
    pub fn with_expr(&self, expr: ExprRef) -> Self {
        Self {
            expr,
            ascending: self.ascending,
        }
    }
}

/// Logical plan node.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    /// Relation referenced by name, not yet bound to the catalog.
    UnresolvedRelation {
        /// Relation name as written.
        name: String,
    },
    /// Catalog-bound base relation. Multi-instance capable: a fresh
    /// instance regenerates every output id.
    Relation {
        /// Table name.
        table: String,
        /// Output attributes, qualified by the table name.
        attributes: Vec<Attribute>,
    },
    /// Renames the qualifier of the child's output (inlined CTE bodies).
    SubqueryAlias {
        /// Subquery alias.
        name: String,
        /// Aliased child.
        child: PlanRef,
    },
    /// Projection.
    Project {
        /// Input plan.
        child: PlanRef,
        /// Projected expressions.
        project_list: Vec<ExprRef>,
    },
    /// Row filter.
    Filter {
        /// Input plan.
        child: PlanRef,
        /// Boolean predicate.
        condition: ExprRef,
    },
    /// Sort.
    Sort {
        /// Input plan.
        child: PlanRef,
        /// Sort keys, most significant first.
        order: Vec<SortOrder>,
    },
    /// Row-count limit.
    Limit {
        /// Input plan.
        child: PlanRef,
        /// Row count; must be a foldable integral expression.
        count: ExprRef,
    },
    /// Join.
    Join {
        /// Left input.
        left: PlanRef,
        /// Right input.
        right: PlanRef,
        /// Join kind.
        join_type: JoinType,
        /// Optional join condition.
        condition: Option<ExprRef>,
    },
    /// Bag union.
    Union {
        /// Left input.
        left: PlanRef,
        /// Right input.
        right: PlanRef,
    },
    /// Set intersection.
    Intersect {
        /// Left input.
        left: PlanRef,
        /// Right input.
        right: PlanRef,
    },
    /// Set difference.
    Except {
        /// Left input.
        left: PlanRef,
        /// Right input.
        right: PlanRef,
    },
    /// Common table expression binding over `child`.
    With {
        /// Plan the binding is visible in.
        child: PlanRef,
        /// CTE name.
        name: String,
        /// CTE definition.
        cte: PlanRef,
    },
    /// Duplicate elimination.
    Distinct {
        /// Input plan.
        child: PlanRef,
    },
    /// Aggregation as parsed: grouping keys, projection, having, ordering
    /// not yet correlated.
    UnresolvedAggregate {
        /// Input plan.
        child: PlanRef,
        /// Grouping key expressions.
        keys: Vec<ExprRef>,
        /// Projected expressions.
        project_list: Vec<ExprRef>,
        /// Pending HAVING conditions.
        having: Vec<ExprRef>,
        /// Pending ORDER BY keys.
        order: Vec<SortOrder>,
    },
    /// Resolved aggregation: output is exactly the grouping aliases
    /// followed by the aggregation aliases.
    Aggregate {
        /// Input plan.
        child: PlanRef,
        /// Grouping aliases (generated named expressions).
        grouping: Vec<ExprRef>,
        /// Aggregation aliases (generated named expressions).
        aggregations: Vec<ExprRef>,
    },
}

impl LogicalPlan {
    /// Ordered child list.
    pub fn children(&self) -> Vec<PlanRef> {
        match self {
            LogicalPlan::UnresolvedRelation { .. } | LogicalPlan::Relation { .. } => vec![],
            LogicalPlan::SubqueryAlias { child, .. }
            | LogicalPlan::Project { child, .. }
            | LogicalPlan::Filter { child, .. }
            | LogicalPlan::Sort { child, .. }
            | LogicalPlan::Limit { child, .. }
            | LogicalPlan::Distinct { child }
            | LogicalPlan::UnresolvedAggregate { child, .. }
            | LogicalPlan::Aggregate { child, .. } => vec![Arc::clone(child)],
            LogicalPlan::Join { left, right, .. }
            | LogicalPlan::Union { left, right }
            | LogicalPlan::Intersect { left, right }
            | LogicalPlan::Except { left, right } => {
                vec![Arc::clone(left), Arc::clone(right)]
            }
            LogicalPlan::With { child, cte, .. } => vec![Arc::clone(child), Arc::clone(cte)],
        }
    }

    /// Rebuild this node from a new child list, preserving every non-child
    /// field. The list length must match [`LogicalPlan::children`].
    pub fn with_new_children(&self, children: Vec<PlanRef>) -> LogicalPlan {
        debug_assert_eq!(children.len(), self.children().len());
        fn next(it: &mut std::vec::IntoIter<PlanRef>) -> PlanRef {
            it.next().expect("child arity checked by caller")
        }
        let mut it = children.into_iter();
        match self {
            LogicalPlan::UnresolvedRelation { .. } | LogicalPlan::Relation { .. } => self.clone(),
            LogicalPlan::SubqueryAlias { name, .. } => LogicalPlan::SubqueryAlias {
                name: name.clone(),
                child: next(&mut it),
            },
            LogicalPlan::Project { project_list, .. } => LogicalPlan::Project {
                child: next(&mut it),
                project_list: project_list.clone(),
            },
            LogicalPlan::Filter { condition, .. } => LogicalPlan::Filter {
                child: next(&mut it),
                condition: Arc::clone(condition),
            },
            LogicalPlan::Sort { order, .. } => LogicalPlan::Sort {
                child: next(&mut it),
                order: order.clone(),
            },
            LogicalPlan::Limit { count, .. } => LogicalPlan::Limit {
                child: next(&mut it),
                count: Arc::clone(count),
            },
            LogicalPlan::Join {
                join_type,
                condition,
                ..
            } => LogicalPlan::Join {
                left: next(&mut it),
                right: next(&mut it),
                join_type: *join_type,
                condition: condition.clone(),
            },
            LogicalPlan::Union { .. } => LogicalPlan::Union {
                left: next(&mut it),
                right: next(&mut it),
            },
            LogicalPlan::Intersect { .. } => LogicalPlan::Intersect {
                left: next(&mut it),
                right: next(&mut it),
            },
            LogicalPlan::Except { .. } => LogicalPlan::Except {
                left: next(&mut it),
                right: next(&mut it),
            },
            LogicalPlan::With { name, .. } => LogicalPlan::With {
                child: next(&mut it),
                name: name.clone(),
                cte: next(&mut it),
            },
            LogicalPlan::Distinct { .. } => LogicalPlan::Distinct {
                child: next(&mut it),
            },
            LogicalPlan::UnresolvedAggregate {
                keys,
                project_list,
                having,
                order,
                ..
            } => LogicalPlan::UnresolvedAggregate {
                child: next(&mut it),
                keys: keys.clone(),
                project_list: project_list.clone(),
                having: having.clone(),
                order: order.clone(),
            },
            LogicalPlan::Aggregate {
                grouping,
                aggregations,
                ..
            } => LogicalPlan::Aggregate {
                child: next(&mut it),
                grouping: grouping.clone(),
                aggregations: aggregations.clone(),
            },
        }
    }

    /// Every expression held directly by this node, in a stable order
    /// matched by [`LogicalPlan::with_new_expressions`].
    pub fn expressions(&self) -> Vec<ExprRef> {
        match self {
            LogicalPlan::UnresolvedRelation { .. }
            | LogicalPlan::Relation { .. }
            | LogicalPlan::SubqueryAlias { .. }
            | LogicalPlan::Union { .. }
            | LogicalPlan::Intersect { .. }
            | LogicalPlan::Except { .. }
            | LogicalPlan::With { .. }
            | LogicalPlan::Distinct { .. } => vec![],
            LogicalPlan::Project { project_list, .. } => project_list.clone(),
            LogicalPlan::Filter { condition, .. } => vec![Arc::clone(condition)],
            LogicalPlan::Sort { order, .. } => {
                order.iter().map(|o| Arc::clone(&o.expr)).collect()
            }
            LogicalPlan::Limit { count, .. } => vec![Arc::clone(count)],
            LogicalPlan::Join { condition, .. } => condition.iter().map(Arc::clone).collect(),
            LogicalPlan::UnresolvedAggregate {
                keys,
                project_list,
                having,
                order,
                ..
            } => keys
                .iter()
                .chain(project_list)
                .chain(having)
                .map(Arc::clone)
                .chain(order.iter().map(|o| Arc::clone(&o.expr)))
                .collect(),
            LogicalPlan::Aggregate {
                grouping,
                aggregations,
                ..
            } => grouping.iter().chain(aggregations).map(Arc::clone).collect(),
        }
    }

    /// Rebuild this node with a new expression list, in the order produced
    /// by [`LogicalPlan::expressions`].
    pub fn with_new_expressions(&self, exprs: Vec<ExprRef>) -> LogicalPlan {
        debug_assert_eq!(exprs.len(), self.expressions().len());
        let mut it = exprs.into_iter();
        match self {
            LogicalPlan::UnresolvedRelation { .. }
            | LogicalPlan::Relation { .. }
            | LogicalPlan::SubqueryAlias { .. }
            | LogicalPlan::Union { .. }
            | LogicalPlan::Intersect { .. }
            | LogicalPlan::Except { .. }
            | LogicalPlan::With { .. }
            | LogicalPlan::Distinct { .. } => self.clone(),
            LogicalPlan::Project { child, .. } => LogicalPlan::Project {
                child: Arc::clone(child),
                project_list: it.collect(),
            },
            LogicalPlan::Filter { child, .. } => LogicalPlan::Filter {
                child: Arc::clone(child),
                condition: it.next().expect("filter condition"),
            },
            LogicalPlan::Sort { child, order } => LogicalPlan::Sort {
                child: Arc::clone(child),
                order: order
                    .iter()
                    .zip(it)
                    .map(|(o, e)| o.with_expr(e))
                    .collect(),
            },
            LogicalPlan::Limit { child, .. } => LogicalPlan::Limit {
                child: Arc::clone(child),
                count: it.next().expect("limit count"),
            },
            LogicalPlan::Join {
                left,
                right,
                join_type,
                condition,
            } => LogicalPlan::Join {
                left: Arc::clone(left),
                right: Arc::clone(right),
                join_type: *join_type,
                condition: condition.as_ref().map(|_| it.next().expect("join condition")),
            },
            LogicalPlan::UnresolvedAggregate {
                child,
                keys,
                project_list,
                having,
                order,
            } => LogicalPlan::UnresolvedAggregate {
                child: Arc::clone(child),
                keys: it.by_ref().take(keys.len()).collect(),
                project_list: it.by_ref().take(project_list.len()).collect(),
                having: it.by_ref().take(having.len()).collect(),
                order: order
                    .iter()
                    .zip(it)
                    .map(|(o, e)| o.with_expr(e))
                    .collect(),
            },
            LogicalPlan::Aggregate {
                child,
                grouping,
                aggregations,
            } => LogicalPlan::Aggregate {
                child: Arc::clone(child),
                grouping: it.by_ref().take(grouping.len()).collect(),
                aggregations: it.by_ref().take(aggregations.len()).collect(),
            },
        }
    }

    /// Output attribute list. Meaningful only for resolved plans; nodes
    /// that cannot produce attributes yet yield an empty list.
    pub fn output(&self) -> Vec<Attribute> {
        match self {
            LogicalPlan::UnresolvedRelation { .. } | LogicalPlan::UnresolvedAggregate { .. } => {
                vec![]
            }
            LogicalPlan::Relation { attributes, .. } => attributes.clone(),
            LogicalPlan::SubqueryAlias { name, child } => child
                .output()
                .into_iter()
                .map(|a| a.qualified_by(name.clone()))
                .collect(),
            LogicalPlan::Project { project_list, .. } => {
                project_list.iter().filter_map(|e| e.to_attribute()).collect()
            }
            LogicalPlan::Filter { child, .. }
            | LogicalPlan::Sort { child, .. }
            | LogicalPlan::Limit { child, .. }
            | LogicalPlan::Distinct { child }
            | LogicalPlan::With { child, .. } => child.output(),
            LogicalPlan::Join { left, right, .. } => {
                let mut out = left.output();
                out.extend(right.output());
                out
            }
            LogicalPlan::Union { left, right } => left
                .output()
                .into_iter()
                .zip(right.output())
                .map(|(l, r)| Attribute {
                    nullable: l.nullable || r.nullable,
                    ..l
                })
                .collect(),
            LogicalPlan::Intersect { left, right } => left
                .output()
                .into_iter()
                .zip(right.output())
                .map(|(l, r)| Attribute {
                    nullable: l.nullable && r.nullable,
                    ..l
                })
                .collect(),
            LogicalPlan::Except { left, .. } => left.output(),
            LogicalPlan::Aggregate {
                grouping,
                aggregations,
                ..
            } => grouping
                .iter()
                .chain(aggregations)
                .filter_map(|e| e.to_attribute())
                .collect(),
        }
    }

    /// Output ids as a set.
    pub fn output_ids(&self) -> HashSet<ExprId> {
        self.output().into_iter().map(|a| a.id).collect()
    }

    /// A plan is resolved iff all its expressions are resolved and all its
    /// children are resolved.
    pub fn is_resolved(&self) -> bool {
        match self {
            LogicalPlan::UnresolvedRelation { .. } | LogicalPlan::UnresolvedAggregate { .. } => {
                false
            }
            _ => {
                self.expressions().iter().all(|e| e.is_resolved())
                    && self.children().iter().all(|c| c.is_resolved())
            }
        }
    }

    /// Whether no two binary-operator siblings in the subtree share an
    /// output attribute id.
    pub fn is_deduplicated(&self) -> bool {
        let disjoint_here = match self {
            LogicalPlan::Join { left, right, .. }
            | LogicalPlan::Union { left, right }
            | LogicalPlan::Intersect { left, right }
            | LogicalPlan::Except { left, right } => {
                left.output_ids().is_disjoint(&right.output_ids())
            }
            _ => true,
        };
        disjoint_here && self.children().iter().all(|c| c.is_deduplicated())
    }
}

/// Fresh instance of a multi-instance relation: same table and columns,
/// all output ids regenerated.
pub fn new_relation_instance(table: &str, attributes: &[Attribute]) -> LogicalPlan {
    LogicalPlan::Relation {
        table: table.to_string(),
        attributes: attributes.iter().map(|a| a.clone().with_fresh_id()).collect(),
    }
}

/// Apply `rule` at every plan node, parent before children.
pub fn transform_plan_down<F>(plan: &PlanRef, rule: &mut F) -> Result<Transformed<PlanRef>>
where
    F: FnMut(&PlanRef) -> Result<Option<PlanRef>>,
{
    let (node, self_changed) = match rule(plan)? {
        Some(rewritten) => (rewritten, true),
        None => (Arc::clone(plan), false),
    };
    let children = node.children();
    let mut new_children = Vec::with_capacity(children.len());
    let mut child_changed = false;
    for child in &children {
        let t = transform_plan_down(child, rule)?;
        child_changed |= t.changed;
        new_children.push(t.data);
    }
    let result = if child_changed {
        Arc::new(node.with_new_children(new_children))
    } else {
        node
    };
    Ok(Transformed {
        data: result,
        changed: self_changed || child_changed,
    })
}

/// Apply `rule` at every plan node, children before parent.
pub fn transform_plan_up<F>(plan: &PlanRef, rule: &mut F) -> Result<Transformed<PlanRef>>
where
    F: FnMut(&PlanRef) -> Result<Option<PlanRef>>,
{
    let children = plan.children();
    let mut new_children = Vec::with_capacity(children.len());
    let mut child_changed = false;
    for child in &children {
        let t = transform_plan_up(child, rule)?;
        child_changed |= t.changed;
        new_children.push(t.data);
    }
    let node = if child_changed {
        Arc::new(plan.with_new_children(new_children))
    } else {
        Arc::clone(plan)
    };
    match rule(&node)? {
        Some(rewritten) => Ok(Transformed::yes(rewritten)),
        None => Ok(Transformed {
            data: node,
            changed: child_changed,
        }),
    }
}

/// Run an expression rewrite (parent before children) at every expression
/// position inside every plan node.
pub fn transform_plan_exprs_down<F>(plan: &PlanRef, rule: &mut F) -> Result<Transformed<PlanRef>>
where
    F: FnMut(&ExprRef) -> Result<Option<ExprRef>>,
{
    transform_plan_down(plan, &mut |node| map_node_exprs(node, rule, true))
}

/// Run an expression rewrite (children before parent) at every expression
/// position inside every plan node.
pub fn transform_plan_exprs_up<F>(plan: &PlanRef, rule: &mut F) -> Result<Transformed<PlanRef>>
where
    F: FnMut(&ExprRef) -> Result<Option<ExprRef>>,
{
    transform_plan_up(plan, &mut |node| map_node_exprs(node, rule, false))
}

fn map_node_exprs<F>(
    node: &PlanRef,
    rule: &mut F,
    top_down: bool,
) -> Result<Option<PlanRef>>
where
    F: FnMut(&ExprRef) -> Result<Option<ExprRef>>,
{
    let exprs = node.expressions();
    if exprs.is_empty() {
        return Ok(None);
    }
    let mut new_exprs = Vec::with_capacity(exprs.len());
    let mut changed = false;
    for expr in &exprs {
        let t = if top_down {
            transform_expr_down(expr, rule)?
        } else {
            transform_expr_up(expr, rule)?
        };
        changed |= t.changed;
        new_exprs.push(t.data);
    }
    if changed {
        Ok(Some(Arc::new(node.with_new_expressions(new_exprs))))
    } else {
        Ok(None)
    }
}

/// Gather `rule` results over the plan subtree in pre-order.
pub fn collect_plan<T, F>(plan: &PlanRef, rule: &mut F) -> Vec<T>
where
    F: FnMut(&PlanRef) -> Option<T>,
{
    let mut out = Vec::new();
    collect_plan_into(plan, rule, &mut out);
    out
}

fn collect_plan_into<T, F>(plan: &PlanRef, rule: &mut F, out: &mut Vec<T>)
where
    F: FnMut(&PlanRef) -> Option<T>,
{
    if let Some(v) = rule(plan) {
        out.push(v);
    }
    for child in plan.children() {
        collect_plan_into(&child, rule, out);
    }
}

/// First `rule` match over the plan subtree in pre-order.
pub fn collect_first_plan<T, F>(plan: &PlanRef, rule: &mut F) -> Option<T>
where
    F: FnMut(&PlanRef) -> Option<T>,
{
    if let Some(v) = rule(plan) {
        return Some(v);
    }
    for child in plan.children() {
        if let Some(v) = collect_first_plan(&child, rule) {
            return Some(v);
        }
    }
    None
}

/// Collect every expression satisfying `rule` at any expression position in
/// any plan node, pre-order.
pub fn collect_plan_exprs<T, F>(plan: &PlanRef, rule: &mut F) -> Vec<T>
where
    F: FnMut(&ExprRef) -> Option<T>,
{
    let mut out = Vec::new();
    let _: Vec<()> = collect_plan(plan, &mut |node| {
        for expr in node.expressions() {
            out.extend(crate::expr::collect_expr(&expr, rule));
        }
        None
    });
    out
}
