//! Expression trees.
//!
//! Expressions are immutable `Arc`-shared trees. Every node exposes ordered
//! children, a rebuild-from-children constructor, and the computed
//! attributes the analyzer works with: `data_type` (valid once strictly
//! typed), `nullable`, `resolved`, and `foldable`. Generic transforms keep
//! unchanged subtrees as the same `Arc` instance.

use std::sync::Arc;

use arrow_schema::DataType;
use flint_common::{ExprId, FlintError, Result};

use crate::constraints::TypeConstraint;
use crate::tree::Transformed;
use crate::types::{self, AbstractType};

/// Shared reference to an expression node.
pub type ExprRef = Arc<Expr>;

/// Literal scalar values.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// The untyped SQL NULL.
    Null,
    /// Boolean literal.
    Boolean(bool),
    /// 8-bit integer literal.
    Int8(i8),
    /// 16-bit integer literal.
    Int16(i16),
    /// 32-bit integer literal. Bare integer literals land here.
    Int32(i32),
    /// 64-bit integer literal.
    Int64(i64),
    /// 32-bit float literal.
    Float32(f32),
    /// 64-bit float literal. Bare fractional literals land here.
    Float64(f64),
    /// String literal.
    Utf8(String),
    /// Date literal (days since epoch).
    Date(i32),
    /// Timestamp literal (microseconds since epoch).
    Timestamp(i64),
}

impl LiteralValue {
    /// Concrete type of the literal.
    pub fn data_type(&self) -> DataType {
        match self {
            LiteralValue::Null => DataType::Null,
            LiteralValue::Boolean(_) => DataType::Boolean,
            LiteralValue::Int8(_) => DataType::Int8,
            LiteralValue::Int16(_) => DataType::Int16,
            LiteralValue::Int32(_) => DataType::Int32,
            LiteralValue::Int64(_) => DataType::Int64,
            LiteralValue::Float32(_) => DataType::Float32,
            LiteralValue::Float64(_) => DataType::Float64,
            LiteralValue::Utf8(_) => DataType::Utf8,
            LiteralValue::Date(_) => DataType::Date32,
            LiteralValue::Timestamp(_) => types::timestamp_type(),
        }
    }
}

/// Kind of an internally generated named expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedKind {
    /// Alias bound to a grouping key during aggregate resolution.
    Grouping,
    /// Alias bound to a collected aggregate function during aggregate
    /// resolution.
    Aggregation,
}

impl GeneratedKind {
    /// Display name prefix of attributes generated for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            GeneratedKind::Grouping => "group",
            GeneratedKind::Aggregation => "agg",
        }
    }
}

/// A named, typed, identified reference to a column in a plan's output.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Column name.
    pub name: String,
    /// Optional relation qualifier.
    pub qualifier: Option<String>,
    /// Process-unique expression id.
    pub id: ExprId,
    /// Concrete data type.
    pub data_type: DataType,
    /// Whether the column may hold NULL.
    pub nullable: bool,
    /// Set when this attribute was minted by aggregate resolution; such
    /// attributes must never leak into a plan's top-level output.
    pub generated: Option<GeneratedKind>,
}

impl Attribute {
    /// New user-visible attribute with a fresh id.
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            qualifier: None,
            id: ExprId::next(),
            data_type,
            nullable,
            generated: None,
        }
    }

    /// Same attribute under a relation qualifier.
    pub fn qualified_by(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Same attribute under a fresh id.
    pub fn with_fresh_id(mut self) -> Self {
        self.id = ExprId::next();
        self
    }

    /// Wrap as an expression node.
    pub fn to_expr(&self) -> ExprRef {
        Arc::new(Expr::AttributeRef(self.clone()))
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Multiply,
    /// `/`
    Divide,
}

impl BinaryOperator {
    /// Whether this operator compares its operands (result is Boolean).
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq
        )
    }

    /// Operator symbol used in renderings.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
        }
    }
}

/// Builtin aggregate functions.
///
/// Each kind is declarative: the descriptor exposes the intermediate state
/// shape and the result type, and the update/merge/final phases are derived
/// from those by the (external) evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    /// Row count. `count(*)` resolves to `count(1)`.
    Count,
    /// Numeric sum.
    Sum,
    /// Minimum over an ordered input.
    Min,
    /// Maximum over an ordered input.
    Max,
    /// Numeric average.
    Avg,
}

impl AggregateOp {
    /// Lower-case function name.
    pub fn name(&self) -> &'static str {
        match self {
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Avg => "avg",
        }
    }

    /// Result type for the given (already coerced) input type.
    pub fn result_type(&self, input: &DataType) -> DataType {
        match self {
            AggregateOp::Count => DataType::Int64,
            AggregateOp::Sum | AggregateOp::Min | AggregateOp::Max => input.clone(),
            AggregateOp::Avg => DataType::Float64,
        }
    }

    /// Shape of the partial-aggregation state merged across partials.
    pub fn state_type(&self, input: &DataType) -> DataType {
        match self {
            AggregateOp::Count => DataType::Int64,
            AggregateOp::Sum | AggregateOp::Min | AggregateOp::Max => input.clone(),
            AggregateOp::Avg => types::struct_type(vec![
                ("sum".to_string(), DataType::Float64, true),
                ("count".to_string(), DataType::Int64, false),
            ]),
        }
    }

    /// Whether the aggregate yields NULL over an empty group.
    pub fn nullable_result(&self) -> bool {
        !matches!(self, AggregateOp::Count)
    }
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal scalar.
    Literal(LiteralValue),
    /// Unbound column reference (name plus optional qualifier).
    UnresolvedAttribute {
        /// Literal spelling of the name.
        name: String,
        /// Optional relation qualifier.
        qualifier: Option<String>,
    },
    /// Bound column reference.
    AttributeRef(Attribute),
    /// Named wrapper with a stable id.
    Alias {
        /// Wrapped expression.
        child: ExprRef,
        /// Alias name.
        name: String,
        /// Expression id of the named instance.
        id: ExprId,
    },
    /// Pending alias whose name is derived from the child's rendering.
    AutoAlias {
        /// Wrapped expression.
        child: ExprRef,
    },
    /// Internal alias minted during aggregate resolution.
    GeneratedAlias {
        /// Grouping or aggregation.
        kind: GeneratedKind,
        /// Wrapped expression.
        child: ExprRef,
        /// Expression id of the named instance.
        id: ExprId,
    },
    /// `*` or `qualifier.*`.
    Star {
        /// Optional relation qualifier.
        qualifier: Option<String>,
    },
    /// Unbound function application.
    UnresolvedFunction {
        /// Function name as written.
        name: String,
        /// Argument list.
        args: Vec<ExprRef>,
        /// Whether `DISTINCT` was written.
        distinct: bool,
    },
    /// Explicit cast inserted by coercion (or written by the user).
    Cast {
        /// Operand.
        child: ExprRef,
        /// Target type.
        target: DataType,
    },
    /// Binary comparison or arithmetic.
    BinaryOp {
        /// Left operand.
        left: ExprRef,
        /// Operator.
        op: BinaryOperator,
        /// Right operand.
        right: ExprRef,
    },
    /// Logical conjunction.
    And(ExprRef, ExprRef),
    /// Logical disjunction.
    Or(ExprRef, ExprRef),
    /// Logical negation.
    Not(ExprRef),
    /// Aggregate function application.
    AggregateFunction {
        /// Function kind.
        op: AggregateOp,
        /// Single aggregated operand.
        child: ExprRef,
    },
    /// `DISTINCT` wrapper around an aggregate function.
    DistinctAggregate(ExprRef),
}

impl Expr {
    /// Alias `child` as `name` under a fresh id.
    pub fn alias(child: ExprRef, name: impl Into<String>) -> ExprRef {
        Arc::new(Expr::Alias {
            child,
            name: name.into(),
            id: ExprId::next(),
        })
    }

    /// Bind `child` to a fresh grouping alias.
    pub fn grouping_alias(child: ExprRef) -> ExprRef {
        Arc::new(Expr::GeneratedAlias {
            kind: GeneratedKind::Grouping,
            child,
            id: ExprId::next(),
        })
    }

    /// Bind `child` to a fresh aggregation alias.
    pub fn aggregation_alias(child: ExprRef) -> ExprRef {
        Arc::new(Expr::GeneratedAlias {
            kind: GeneratedKind::Aggregation,
            child,
            id: ExprId::next(),
        })
    }

    /// Integer literal helper.
    pub fn lit_i32(v: i32) -> ExprRef {
        Arc::new(Expr::Literal(LiteralValue::Int32(v)))
    }

    /// String literal helper.
    pub fn lit_str(v: impl Into<String>) -> ExprRef {
        Arc::new(Expr::Literal(LiteralValue::Utf8(v.into())))
    }

    /// Ordered child list.
    pub fn children(&self) -> Vec<ExprRef> {
        match self {
            Expr::Literal(_)
            | Expr::UnresolvedAttribute { .. }
            | Expr::AttributeRef(_)
            | Expr::Star { .. } => vec![],
            Expr::Alias { child, .. }
            | Expr::AutoAlias { child }
            | Expr::GeneratedAlias { child, .. }
            | Expr::Cast { child, .. }
            | Expr::Not(child)
            | Expr::AggregateFunction { child, .. }
            | Expr::DistinctAggregate(child) => vec![Arc::clone(child)],
            Expr::UnresolvedFunction { args, .. } => args.clone(),
            Expr::BinaryOp { left, right, .. } => vec![Arc::clone(left), Arc::clone(right)],
            Expr::And(l, r) | Expr::Or(l, r) => vec![Arc::clone(l), Arc::clone(r)],
        }
    }

    /// Rebuild this node from a new child list, preserving every non-child
    /// field. The list length must match [`Expr::children`].
    pub fn with_new_children(&self, children: Vec<ExprRef>) -> Expr {
        debug_assert_eq!(children.len(), self.children().len());
        fn next(it: &mut std::vec::IntoIter<ExprRef>) -> ExprRef {
            it.next().expect("child arity checked by caller")
        }
        let mut it = children.into_iter();
        match self {
            Expr::Literal(_)
            | Expr::UnresolvedAttribute { .. }
            | Expr::AttributeRef(_)
            | Expr::Star { .. } => self.clone(),
            Expr::Alias { name, id, .. } => Expr::Alias {
                child: next(&mut it),
                name: name.clone(),
                id: *id,
            },
            Expr::AutoAlias { .. } => Expr::AutoAlias { child: next(&mut it) },
            Expr::GeneratedAlias { kind, id, .. } => Expr::GeneratedAlias {
                kind: *kind,
                child: next(&mut it),
                id: *id,
            },
            Expr::Cast { target, .. } => Expr::Cast {
                child: next(&mut it),
                target: target.clone(),
            },
            Expr::Not(_) => Expr::Not(next(&mut it)),
            Expr::AggregateFunction { op, .. } => Expr::AggregateFunction {
                op: *op,
                child: next(&mut it),
            },
            Expr::DistinctAggregate(_) => Expr::DistinctAggregate(next(&mut it)),
            Expr::UnresolvedFunction { name, distinct, .. } => Expr::UnresolvedFunction {
                name: name.clone(),
                args: it.by_ref().collect(),
                distinct: *distinct,
            },
            Expr::BinaryOp { op, .. } => Expr::BinaryOp {
                left: next(&mut it),
                op: *op,
                right: next(&mut it),
            },
            Expr::And(_, _) => Expr::And(next(&mut it), next(&mut it)),
            Expr::Or(_, _) => Expr::Or(next(&mut it), next(&mut it)),
        }
    }

    /// Whether name and function binding is complete for the whole subtree.
    pub fn is_resolved(&self) -> bool {
        match self {
            Expr::UnresolvedAttribute { .. }
            | Expr::UnresolvedFunction { .. }
            | Expr::Star { .. }
            | Expr::AutoAlias { .. } => false,
            _ => self.children().iter().all(|c| c.is_resolved()),
        }
    }

    /// Whether the subtree is free of attributes and aggregates, so it can
    /// be evaluated at analysis time.
    pub fn is_foldable(&self) -> bool {
        match self {
            Expr::Literal(_) => true,
            Expr::AttributeRef(_)
            | Expr::UnresolvedAttribute { .. }
            | Expr::UnresolvedFunction { .. }
            | Expr::Star { .. }
            | Expr::AggregateFunction { .. }
            | Expr::DistinctAggregate(_) => false,
            _ => self.children().iter().all(|c| c.is_foldable()),
        }
    }

    /// Type constraint over this node's children.
    pub fn type_constraint(&self) -> TypeConstraint {
        match self {
            Expr::Literal(_)
            | Expr::UnresolvedAttribute { .. }
            | Expr::AttributeRef(_)
            | Expr::Star { .. }
            | Expr::UnresolvedFunction { .. } => TypeConstraint::PassThrough(self.children()),
            Expr::Alias { child, .. }
            | Expr::AutoAlias { child }
            | Expr::GeneratedAlias { child, .. }
            | Expr::Cast { child, .. }
            | Expr::DistinctAggregate(child) => {
                TypeConstraint::StrictlyTyped(vec![Arc::clone(child)])
            }
            Expr::And(l, r) | Expr::Or(l, r) => TypeConstraint::SameTypeAs {
                target: DataType::Boolean,
                args: vec![Arc::clone(l), Arc::clone(r)],
            },
            Expr::Not(child) => TypeConstraint::SameTypeAs {
                target: DataType::Boolean,
                args: vec![Arc::clone(child)],
            },
            Expr::BinaryOp { left, op, right } => {
                let args = vec![Arc::clone(left), Arc::clone(right)];
                if op.is_comparison() {
                    TypeConstraint::SameType(args).and_then(|coerced| {
                        TypeConstraint::SameSubtypesOf {
                            supertype: AbstractType::Ordered,
                            args: coerced,
                        }
                    })
                } else {
                    TypeConstraint::SameSubtypesOf {
                        supertype: AbstractType::Numeric,
                        args,
                    }
                }
            }
            Expr::AggregateFunction { op, child } => {
                let args = vec![Arc::clone(child)];
                match op {
                    AggregateOp::Count => TypeConstraint::PassThrough(args),
                    AggregateOp::Sum | AggregateOp::Avg => TypeConstraint::SameSubtypesOf {
                        supertype: AbstractType::Numeric,
                        args,
                    },
                    AggregateOp::Min | AggregateOp::Max => TypeConstraint::SameSubtypesOf {
                        supertype: AbstractType::Ordered,
                        args,
                    },
                }
            }
        }
    }

    /// Computed data type. Only meaningful once the subtree is resolved;
    /// evaluates the node's type constraint, so a constraint violation
    /// surfaces here as well as in the type-check pass.
    pub fn data_type(&self) -> Result<DataType> {
        match self {
            Expr::Literal(v) => Ok(v.data_type()),
            Expr::AttributeRef(attr) => Ok(attr.data_type.clone()),
            Expr::Alias { child, .. }
            | Expr::AutoAlias { child }
            | Expr::GeneratedAlias { child, .. }
            | Expr::DistinctAggregate(child) => child.data_type(),
            Expr::Cast { target, .. } => Ok(target.clone()),
            Expr::And(_, _) | Expr::Or(_, _) | Expr::Not(_) => Ok(DataType::Boolean),
            Expr::BinaryOp { op, .. } => {
                if op.is_comparison() {
                    Ok(DataType::Boolean)
                } else {
                    let coerced = self.type_constraint().enforce()?;
                    coerced[0].data_type()
                }
            }
            Expr::AggregateFunction { op, child } => Ok(op.result_type(&child.data_type()?)),
            Expr::UnresolvedAttribute { name, .. } => Err(FlintError::ResolutionFailure(format!(
                "data type of unresolved attribute '{name}'"
            ))),
            Expr::UnresolvedFunction { name, .. } => Err(FlintError::ResolutionFailure(format!(
                "data type of unresolved function '{name}'"
            ))),
            Expr::Star { .. } => Err(FlintError::ResolutionFailure(
                "data type of unexpanded star".to_string(),
            )),
        }
    }

    /// Computed nullability. Only meaningful once the subtree is resolved.
    pub fn nullable(&self) -> Result<bool> {
        match self {
            Expr::Literal(v) => Ok(matches!(v, LiteralValue::Null)),
            Expr::AttributeRef(attr) => Ok(attr.nullable),
            Expr::Alias { child, .. }
            | Expr::AutoAlias { child }
            | Expr::GeneratedAlias { child, .. }
            | Expr::Cast { child, .. }
            | Expr::DistinctAggregate(child) => child.nullable(),
            // count yields 0, never NULL, whatever the input; the other
            // aggregates yield NULL over an empty group.
            Expr::AggregateFunction { op, .. } => Ok(op.nullable_result()),
            Expr::UnresolvedAttribute { .. } | Expr::UnresolvedFunction { .. } | Expr::Star { .. } => {
                Err(FlintError::ResolutionFailure(
                    "nullability of unresolved expression".to_string(),
                ))
            }
            _ => {
                for child in self.children() {
                    if child.nullable()? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Name of this expression when it is a named expression.
    pub fn name(&self) -> Option<String> {
        match self {
            Expr::AttributeRef(attr) => Some(attr.name.clone()),
            Expr::Alias { name, .. } => Some(name.clone()),
            Expr::GeneratedAlias { kind, .. } => Some(kind.label().to_string()),
            _ => None,
        }
    }

    /// Expression id of this expression when it is a named expression.
    pub fn expr_id(&self) -> Option<ExprId> {
        match self {
            Expr::AttributeRef(attr) => Some(attr.id),
            Expr::Alias { id, .. } | Expr::GeneratedAlias { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Output attribute of this expression when it is a resolved named
    /// expression.
    pub fn to_attribute(&self) -> Option<Attribute> {
        match self {
            Expr::AttributeRef(attr) => Some(attr.clone()),
            Expr::Alias { child, name, id } => Some(Attribute {
                name: name.clone(),
                qualifier: None,
                id: *id,
                data_type: child.data_type().ok()?,
                nullable: child.nullable().ok()?,
                generated: None,
            }),
            Expr::GeneratedAlias { kind, child, id } => Some(Attribute {
                name: kind.label().to_string(),
                qualifier: None,
                id: *id,
                data_type: child.data_type().ok()?,
                nullable: child.nullable().ok()?,
                generated: Some(*kind),
            }),
            _ => None,
        }
    }

    /// Whether the subtree contains an aggregate function (distinct or not).
    pub fn contains_aggregate(&self) -> bool {
        matches!(
            self,
            Expr::AggregateFunction { .. } | Expr::DistinctAggregate(_)
        ) || self.children().iter().any(|c| c.contains_aggregate())
    }
}

/// Apply `rule` at every node, parent before children. A `None` result
/// leaves the node untouched; unchanged subtrees keep their instance.
pub fn transform_expr_down<F>(expr: &ExprRef, rule: &mut F) -> Result<Transformed<ExprRef>>
where
    F: FnMut(&ExprRef) -> Result<Option<ExprRef>>,
{
    let (node, self_changed) = match rule(expr)? {
        Some(rewritten) => (rewritten, true),
        None => (Arc::clone(expr), false),
    };
    let children = node.children();
    let mut new_children = Vec::with_capacity(children.len());
    let mut child_changed = false;
    for child in &children {
        let t = transform_expr_down(child, rule)?;
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

/// Apply `rule` at every node, children before parent.
pub fn transform_expr_up<F>(expr: &ExprRef, rule: &mut F) -> Result<Transformed<ExprRef>>
where
    F: FnMut(&ExprRef) -> Result<Option<ExprRef>>,
{
    let children = expr.children();
    let mut new_children = Vec::with_capacity(children.len());
    let mut child_changed = false;
    for child in &children {
        let t = transform_expr_up(child, rule)?;
        child_changed |= t.changed;
        new_children.push(t.data);
    }
    let node = if child_changed {
        Arc::new(expr.with_new_children(new_children))
    } else {
        Arc::clone(expr)
    };
    match rule(&node)? {
        Some(rewritten) => Ok(Transformed::yes(rewritten)),
        None => Ok(Transformed {
            data: node,
            changed: child_changed,
        }),
    }
}

/// Gather `rule` results over the subtree in pre-order.
pub fn collect_expr<T, F>(expr: &ExprRef, rule: &mut F) -> Vec<T>
where
    F: FnMut(&ExprRef) -> Option<T>,
{
    let mut out = Vec::new();
    collect_expr_into(expr, rule, &mut out);
    out
}

fn collect_expr_into<T, F>(expr: &ExprRef, rule: &mut F, out: &mut Vec<T>)
where
    F: FnMut(&ExprRef) -> Option<T>,
{
    if let Some(v) = rule(expr) {
        out.push(v);
    }
    for child in expr.children() {
        collect_expr_into(&child, rule, out);
    }
}

/// First `rule` match over the subtree in pre-order.
pub fn collect_first_expr<T, F>(expr: &ExprRef, rule: &mut F) -> Option<T>
where
    F: FnMut(&ExprRef) -> Option<T>,
{
    if let Some(v) = rule(expr) {
        return Some(v);
    }
    for child in expr.children() {
        if let Some(v) = collect_first_expr(&child, rule) {
            return Some(v);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_attr(name: &str) -> Attribute {
        Attribute::new(name, DataType::Int32, false)
    }

    #[test]
    fn unchanged_transform_keeps_the_instance() {
        let a = int_attr("a").to_expr();
        let expr: ExprRef = Arc::new(Expr::BinaryOp {
            left: Arc::clone(&a),
            op: BinaryOperator::Plus,
            right: Expr::lit_i32(1),
        });
        let t = transform_expr_up(&expr, &mut |_| Ok(None)).expect("transform");
        assert!(!t.changed);
        assert!(Arc::ptr_eq(&t.data, &expr));
    }

    #[test]
    fn transform_down_replaces_whole_subtree_first() {
        let a = int_attr("a").to_expr();
        let expr: ExprRef = Arc::new(Expr::Not(Arc::clone(&a)));
        let t = transform_expr_down(&expr, &mut |e| {
            Ok(match e.as_ref() {
                Expr::Not(_) => Some(Expr::lit_i32(0)),
                _ => None,
            })
        })
        .expect("transform");
        assert!(t.changed);
        assert_eq!(t.data.as_ref(), Expr::lit_i32(0).as_ref());
    }

    #[test]
    fn collect_is_preorder() {
        let a = int_attr("a").to_expr();
        let b = int_attr("b").to_expr();
        let expr: ExprRef = Arc::new(Expr::And(Arc::clone(&a), Arc::clone(&b)));
        let names = collect_expr(&expr, &mut |e| match e.as_ref() {
            Expr::AttributeRef(attr) => Some(attr.name.clone()),
            _ => None,
        });
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn resolved_and_foldable_flags() {
        let lit = Expr::lit_i32(1);
        assert!(lit.is_resolved());
        assert!(lit.is_foldable());

        let unresolved: ExprRef = Arc::new(Expr::UnresolvedAttribute {
            name: "a".to_string(),
            qualifier: None,
        });
        assert!(!unresolved.is_resolved());
        assert!(!unresolved.is_foldable());

        let agg: ExprRef = Arc::new(Expr::AggregateFunction {
            op: AggregateOp::Count,
            child: Expr::lit_i32(1),
        });
        assert!(agg.is_resolved());
        assert!(!agg.is_foldable());
    }

    #[test]
    fn aggregate_types() {
        let count: ExprRef = Arc::new(Expr::AggregateFunction {
            op: AggregateOp::Count,
            child: Expr::lit_i32(1),
        });
        assert_eq!(count.data_type().expect("count type"), DataType::Int64);
        assert!(!count.nullable().expect("count nullable"));

        let avg: ExprRef = Arc::new(Expr::AggregateFunction {
            op: AggregateOp::Avg,
            child: int_attr("a").to_expr(),
        });
        assert_eq!(avg.data_type().expect("avg type"), DataType::Float64);
        assert!(avg.nullable().expect("avg nullable"));
    }

    #[test]
    fn count_of_nullable_input_is_not_nullable() {
        let nullable_attr = Attribute::new("b", DataType::Int32, true);
        let count: ExprRef = Arc::new(Expr::AggregateFunction {
            op: AggregateOp::Count,
            child: nullable_attr.to_expr(),
        });
        assert!(!count.nullable().expect("count nullable"));
        let attr = Expr::alias(count, "cnt").to_attribute().expect("attribute");
        assert!(!attr.nullable);
    }

    #[test]
    fn avg_state_is_sum_and_count() {
        let state = AggregateOp::Avg.state_type(&DataType::Int32);
        match state {
            DataType::Struct(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].name(), "sum");
                assert_eq!(fields[1].name(), "count");
            }
            other => panic!("unexpected avg state type: {other:?}"),
        }
    }

    #[test]
    fn alias_attribute_carries_child_type() {
        let alias = Expr::alias(Expr::lit_i32(7), "seven");
        let attr = alias.to_attribute().expect("alias attribute");
        assert_eq!(attr.name, "seven");
        assert_eq!(attr.data_type, DataType::Int32);
        assert!(!attr.nullable);
        assert_eq!(attr.generated, None);
    }

    #[test]
    fn generated_alias_attribute_is_marked() {
        let ga = Expr::grouping_alias(int_attr("a").to_expr());
        let attr = ga.to_attribute().expect("generated attribute");
        assert_eq!(attr.generated, Some(GeneratedKind::Grouping));
        assert_eq!(attr.name, "group");
    }
}
