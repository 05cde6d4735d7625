//! Expression type constraints.
//!
//! Each expression kind declares its typing rule as a small constraint ADT
//! over its children; a single evaluator either produces the coerced child
//! list or fails with a typed mismatch error. Implicit coercion is expressed
//! by wrapping children in explicit [`Expr::Cast`] nodes, so a satisfied
//! constraint leaves a visible trail in the tree.

use std::sync::Arc;

use arrow_schema::DataType;
use flint_common::{FlintError, Result};

use crate::explain::render_expr;
use crate::expr::{Expr, ExprRef};
use crate::types::{implicitly_castable, widest_type_of, AbstractType};

/// Typing rule over a child list.
///
/// Primitives either check the children as-is or compute a coercion target;
/// combinators compose rules while preserving child order across their
/// output.
pub enum TypeConstraint {
    /// Each child must already be strictly typed; no cross-child
    /// requirement.
    PassThrough(Vec<ExprRef>),
    /// Each child must be implicitly castable to `target`; every child is
    /// coerced to `target`.
    SameTypeAs {
        /// Coercion target.
        target: DataType,
        /// Constrained children.
        args: Vec<ExprRef>,
    },
    /// Among children already a subtype of `supertype`, compute the widest
    /// common type; fail if no child is directly a subtype; coerce every
    /// child to that widest type.
    SameSubtypesOf {
        /// Required abstract supertype.
        supertype: AbstractType,
        /// Constrained children.
        args: Vec<ExprRef>,
    },
    /// Coerce all children to the widest common type across them.
    SameType(Vec<ExprRef>),
    /// Each child must be foldable.
    Foldable(Vec<ExprRef>),
    /// Each child's own constraint must succeed; children are replaced by
    /// their strictly-typed forms.
    StrictlyTyped(Vec<ExprRef>),
    /// Both constraints must succeed; results are concatenated in order.
    Concat(Box<TypeConstraint>, Box<TypeConstraint>),
    /// Run the first constraint, then derive the next one from its output.
    AndThen {
        /// Constraint evaluated first.
        first: Box<TypeConstraint>,
        /// Continuation building the follow-up constraint from the coerced
        /// children.
        then: Box<dyn FnOnce(Vec<ExprRef>) -> TypeConstraint>,
    },
    /// Try the first constraint; on failure, the second.
    OrElse(Box<TypeConstraint>, Box<TypeConstraint>),
}

impl TypeConstraint {
    /// Chain a follow-up constraint derived from this one's output.
    pub fn and_then<F>(self, then: F) -> TypeConstraint
    where
        F: FnOnce(Vec<ExprRef>) -> TypeConstraint + 'static,
    {
        TypeConstraint::AndThen {
            first: Box::new(self),
            then: Box::new(then),
        }
    }

    /// Concatenate with another constraint.
    pub fn concat(self, other: TypeConstraint) -> TypeConstraint {
        TypeConstraint::Concat(Box::new(self), Box::new(other))
    }

    /// Fall back to another constraint on failure.
    pub fn or_else(self, other: TypeConstraint) -> TypeConstraint {
        TypeConstraint::OrElse(Box::new(self), Box::new(other))
    }

    /// Evaluate the constraint, producing the coerced child list.
    pub fn enforce(self) -> Result<Vec<ExprRef>> {
        match self {
            TypeConstraint::PassThrough(args) => {
                for arg in &args {
                    let strict = to_strictly_typed(arg)?;
                    if strict.as_ref() != arg.as_ref() {
                        return Err(mismatch(arg, "a strictly typed expression"));
                    }
                }
                Ok(args)
            }
            TypeConstraint::SameTypeAs { target, args } => args
                .iter()
                .map(|arg| {
                    let actual = arg.data_type()?;
                    if !implicitly_castable(&actual, &target) {
                        return Err(FlintError::TypeMismatch {
                            expr: render_expr(arg),
                            actual,
                            expected: target.to_string(),
                        });
                    }
                    cast_if_needed(arg, &target)
                })
                .collect(),
            TypeConstraint::SameSubtypesOf { supertype, args } => {
                let types = args
                    .iter()
                    .map(|a| a.data_type())
                    .collect::<Result<Vec<_>>>()?;
                let subtypes: Vec<&DataType> =
                    types.iter().filter(|t| supertype.admits(t)).collect();
                if subtypes.is_empty() {
                    let offender = args.first().map(render_expr).unwrap_or_default();
                    return Err(FlintError::TypeMismatch {
                        expr: offender,
                        actual: types.first().cloned().unwrap_or(DataType::Null),
                        expected: supertype.name().to_string(),
                    });
                }
                let widest = widest_type_of(subtypes.into_iter())?;
                args.iter()
                    .zip(&types)
                    .map(|(arg, actual)| {
                        if !implicitly_castable(actual, &widest) {
                            return Err(FlintError::TypeMismatch {
                                expr: render_expr(arg),
                                actual: actual.clone(),
                                expected: widest.to_string(),
                            });
                        }
                        cast_if_needed(arg, &widest)
                    })
                    .collect()
            }
            TypeConstraint::SameType(args) => {
                let types = args
                    .iter()
                    .map(|a| a.data_type())
                    .collect::<Result<Vec<_>>>()?;
                let widest = widest_type_of(types.iter())?;
                args.iter().map(|arg| cast_if_needed(arg, &widest)).collect()
            }
            TypeConstraint::Foldable(args) => {
                for arg in &args {
                    if !arg.is_foldable() {
                        return Err(mismatch(arg, "a foldable expression"));
                    }
                }
                Ok(args)
            }
            TypeConstraint::StrictlyTyped(args) => {
                args.iter().map(to_strictly_typed).collect()
            }
            TypeConstraint::Concat(a, b) => {
                let mut out = a.enforce()?;
                out.extend(b.enforce()?);
                Ok(out)
            }
            TypeConstraint::AndThen { first, then } => then(first.enforce()?).enforce(),
            TypeConstraint::OrElse(a, b) => a.enforce().or_else(|_| b.enforce()),
        }
    }
}

fn mismatch(arg: &ExprRef, expected: &str) -> FlintError {
    FlintError::TypeMismatch {
        expr: render_expr(arg),
        actual: arg.data_type().unwrap_or(DataType::Null),
        expected: expected.to_string(),
    }
}

/// Wrap `expr` in a cast to `target` unless it already has that type.
pub fn cast_if_needed(expr: &ExprRef, target: &DataType) -> Result<ExprRef> {
    if expr.data_type()? == *target {
        Ok(Arc::clone(expr))
    } else {
        Ok(Arc::new(Expr::Cast {
            child: Arc::clone(expr),
            target: target.clone(),
        }))
    }
}

/// Rewrite `expr` bottom-up into its strictly-typed form: every node's
/// constraint is enforced and the coerced children are substituted in.
pub fn to_strictly_typed(expr: &ExprRef) -> Result<ExprRef> {
    let children = expr.children();
    let mut new_children = Vec::with_capacity(children.len());
    let mut changed = false;
    for child in &children {
        let strict = to_strictly_typed(child)?;
        changed |= strict.as_ref() != child.as_ref();
        new_children.push(strict);
    }
    let node: ExprRef = if changed {
        Arc::new(expr.with_new_children(new_children))
    } else {
        Arc::clone(expr)
    };
    let coerced = node.type_constraint().enforce()?;
    if coerced
        .iter()
        .zip(node.children().iter())
        .all(|(a, b)| a.as_ref() == b.as_ref())
    {
        Ok(node)
    } else {
        Ok(Arc::new(node.with_new_children(coerced)))
    }
}

/// Whether the expression already satisfies its constraints with no further
/// coercion.
pub fn is_strictly_typed(expr: &ExprRef) -> bool {
    match to_strictly_typed(expr) {
        Ok(strict) => strict.as_ref() == expr.as_ref(),
        Err(_) => false,
    }
}
