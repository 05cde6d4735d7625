//! Human-readable renderings of plans and expressions.
//!
//! The expression rendering doubles as the source of auto-generated alias
//! names, so it stays close to the SQL the user wrote: no ids, no type
//! annotations. The plan rendering is for diagnostics and prints ids.

use crate::expr::{Attribute, Expr, ExprRef};
use crate::logical_plan::{LogicalPlan, SortOrder};

/// Render a logical plan as human-readable multiline text.
pub fn explain_plan(plan: &LogicalPlan) -> String {
    let mut s = String::new();
    fmt_plan(plan, 0, &mut s);
    s
}

fn fmt_plan(plan: &LogicalPlan, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match plan {
        LogicalPlan::UnresolvedRelation { name } => {
            out.push_str(&format!("{pad}UnresolvedRelation {name}\n"));
        }
        LogicalPlan::Relation { table, attributes } => {
            out.push_str(&format!(
                "{pad}Relation {table} [{}]\n",
                fmt_attrs(attributes)
            ));
        }
        LogicalPlan::SubqueryAlias { name, child } => {
            out.push_str(&format!("{pad}SubqueryAlias {name}\n"));
            fmt_plan(child, indent + 1, out);
        }
        LogicalPlan::Project {
            child,
            project_list,
        } => {
            out.push_str(&format!("{pad}Project [{}]\n", fmt_exprs(project_list)));
            fmt_plan(child, indent + 1, out);
        }
        LogicalPlan::Filter { child, condition } => {
            out.push_str(&format!("{pad}Filter {}\n", render_expr(condition)));
            fmt_plan(child, indent + 1, out);
        }
        LogicalPlan::Sort { child, order } => {
            out.push_str(&format!("{pad}Sort [{}]\n", fmt_order(order)));
            fmt_plan(child, indent + 1, out);
        }
        LogicalPlan::Limit { child, count } => {
            out.push_str(&format!("{pad}Limit {}\n", render_expr(count)));
            fmt_plan(child, indent + 1, out);
        }
        LogicalPlan::Join {
            left,
            right,
            condition,
            ..
        } => {
            match condition {
                Some(c) => out.push_str(&format!("{pad}Join on {}\n", render_expr(c))),
                None => out.push_str(&format!("{pad}Join\n")),
            }
            fmt_plan(left, indent + 1, out);
            fmt_plan(right, indent + 1, out);
        }
        LogicalPlan::Union { left, right } => {
            out.push_str(&format!("{pad}Union\n"));
            fmt_plan(left, indent + 1, out);
            fmt_plan(right, indent + 1, out);
        }
        LogicalPlan::Intersect { left, right } => {
            out.push_str(&format!("{pad}Intersect\n"));
            fmt_plan(left, indent + 1, out);
            fmt_plan(right, indent + 1, out);
        }
        LogicalPlan::Except { left, right } => {
            out.push_str(&format!("{pad}Except\n"));
            fmt_plan(left, indent + 1, out);
            fmt_plan(right, indent + 1, out);
        }
        LogicalPlan::With { child, name, cte } => {
            out.push_str(&format!("{pad}With {name}\n"));
            out.push_str(&format!("{pad}  body:\n"));
            fmt_plan(child, indent + 2, out);
            out.push_str(&format!("{pad}  cte:\n"));
            fmt_plan(cte, indent + 2, out);
        }
        LogicalPlan::Distinct { child } => {
            out.push_str(&format!("{pad}Distinct\n"));
            fmt_plan(child, indent + 1, out);
        }
        LogicalPlan::UnresolvedAggregate {
            child,
            keys,
            project_list,
            having,
            order,
        } => {
            out.push_str(&format!(
                "{pad}UnresolvedAggregate keys=[{}] project=[{}] having=[{}] order=[{}]\n",
                fmt_exprs(keys),
                fmt_exprs(project_list),
                fmt_exprs(having),
                fmt_order(order),
            ));
            fmt_plan(child, indent + 1, out);
        }
        LogicalPlan::Aggregate {
            child,
            grouping,
            aggregations,
        } => {
            out.push_str(&format!(
                "{pad}Aggregate grouping=[{}] aggregations=[{}]\n",
                fmt_exprs(grouping),
                fmt_exprs(aggregations),
            ));
            fmt_plan(child, indent + 1, out);
        }
    }
}

fn fmt_attrs(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .map(|a| format!("{}{}", a.name, a.id))
        .collect::<Vec<_>>()
        .join(", ")
}

fn fmt_exprs(exprs: &[ExprRef]) -> String {
    exprs.iter().map(render_expr).collect::<Vec<_>>().join(", ")
}

fn fmt_order(order: &[SortOrder]) -> String {
    order
        .iter()
        .map(|o| {
            format!(
                "{} {}",
                render_expr(&o.expr),
                if o.ascending { "ASC" } else { "DESC" }
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render an expression as compact SQL-like text.
pub fn render_expr(expr: &ExprRef) -> String {
    fmt_expr(expr.as_ref())
}

fn fmt_expr(e: &Expr) -> String {
    match e {
        Expr::Literal(v) => fmt_literal(v),
        Expr::UnresolvedAttribute { name, qualifier } => match qualifier {
            Some(q) => format!("{q}.{name}"),
            None => name.clone(),
        },
        Expr::AttributeRef(attr) => match &attr.qualifier {
            Some(q) => format!("{q}.{}{}", attr.name, attr.id),
            None => format!("{}{}", attr.name, attr.id),
        },
        Expr::Alias { child, name, .. } => format!("{} AS {name}", fmt_expr(child)),
        Expr::AutoAlias { child } => fmt_expr(child),
        Expr::GeneratedAlias { kind, child, id } => {
            format!("{} AS {}{id}", fmt_expr(child), kind.label())
        }
        Expr::Star { qualifier } => match qualifier {
            Some(q) => format!("{q}.*"),
            None => "*".to_string(),
        },
        Expr::UnresolvedFunction {
            name,
            args,
            distinct,
        } => {
            let rendered = args.iter().map(render_expr).collect::<Vec<_>>().join(", ");
            if *distinct {
                format!("{name}(DISTINCT {rendered})")
            } else {
                format!("{name}({rendered})")
            }
        }
        Expr::Cast { child, target } => format!("CAST({} AS {target})", fmt_expr(child)),
        Expr::BinaryOp { left, op, right } => {
            format!("({} {} {})", fmt_expr(left), op.symbol(), fmt_expr(right))
        }
        Expr::And(l, r) => format!("({} AND {})", fmt_expr(l), fmt_expr(r)),
        Expr::Or(l, r) => format!("({} OR {})", fmt_expr(l), fmt_expr(r)),
        Expr::Not(x) => format!("(NOT {})", fmt_expr(x)),
        Expr::AggregateFunction { op, child } => {
            format!("{}({})", op.name(), fmt_expr(child))
        }
        Expr::DistinctAggregate(child) => match child.as_ref() {
            Expr::AggregateFunction { op, child } => {
                format!("{}(DISTINCT {})", op.name(), fmt_expr(child))
            }
            other => format!("DISTINCT {}", fmt_expr(other)),
        },
    }
}

/// Rendering used when deriving a column name from an expression: like
/// [`render_expr`] but without attribute ids, so generated names read the
/// way the user wrote the expression.
pub fn display_name(expr: &ExprRef) -> String {
    match expr.as_ref() {
        Expr::Literal(v) => fmt_literal(v),
        Expr::UnresolvedAttribute { name, .. } => name.clone(),
        Expr::AttributeRef(attr) => attr.name.clone(),
        Expr::Alias { name, .. } => name.clone(),
        Expr::AutoAlias { child } | Expr::GeneratedAlias { child, .. } => display_name(child),
        Expr::Star { .. } => "*".to_string(),
        Expr::UnresolvedFunction {
            name,
            args,
            distinct,
        } => {
            let rendered = args.iter().map(display_name).collect::<Vec<_>>().join(", ");
            if *distinct {
                format!("{name}(distinct {rendered})")
            } else {
                format!("{name}({rendered})")
            }
        }
        Expr::Cast { child, .. } => display_name(child),
        Expr::BinaryOp { left, op, right } => format!(
            "({} {} {})",
            display_name(left),
            op.symbol(),
            display_name(right)
        ),
        Expr::And(l, r) => format!("({} and {})", display_name(l), display_name(r)),
        Expr::Or(l, r) => format!("({} or {})", display_name(l), display_name(r)),
        Expr::Not(x) => format!("(not {})", display_name(x)),
        Expr::AggregateFunction { op, child } => {
            format!("{}({})", op.name(), display_name(child))
        }
        Expr::DistinctAggregate(child) => match child.as_ref() {
            Expr::AggregateFunction { op, child } => {
                format!("{}(distinct {})", op.name(), display_name(child))
            }
            _ => format!("distinct {}", display_name(child)),
        },
    }
}

fn fmt_literal(v: &crate::expr::LiteralValue) -> String {
    use crate::expr::LiteralValue;
    match v {
        LiteralValue::Null => "NULL".to_string(),
        LiteralValue::Boolean(b) => b.to_string(),
        LiteralValue::Int8(v) => v.to_string(),
        LiteralValue::Int16(v) => v.to_string(),
        LiteralValue::Int32(v) => v.to_string(),
        LiteralValue::Int64(v) => v.to_string(),
        LiteralValue::Float32(v) => v.to_string(),
        LiteralValue::Float64(v) => v.to_string(),
        LiteralValue::Utf8(s) => format!("'{s}'"),
        LiteralValue::Date(d) => format!("DATE {d}"),
        LiteralValue::Timestamp(t) => format!("TIMESTAMP {t}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_schema::DataType;

    use super::*;
    use crate::expr::{AggregateOp, Attribute, BinaryOperator};

    #[test]
    fn expression_rendering_reads_like_sql() {
        let a = Attribute::new("a", DataType::Int32, false).to_expr();
        let expr: ExprRef = Arc::new(Expr::BinaryOp {
            left: a,
            op: BinaryOperator::Plus,
            right: Expr::lit_i32(1),
        });
        assert_eq!(display_name(&expr), "(a + 1)");
    }

    #[test]
    fn count_renders_with_argument() {
        let count: ExprRef = Arc::new(Expr::AggregateFunction {
            op: AggregateOp::Count,
            child: Expr::lit_i32(1),
        });
        assert_eq!(display_name(&count), "count(1)");
        assert_eq!(render_expr(&count), "count(1)");
    }

    #[test]
    fn plan_rendering_is_indented() {
        let t = LogicalPlan::Relation {
            table: "t".to_string(),
            attributes: vec![Attribute::new("a", DataType::Int32, false)],
        };
        let plan = LogicalPlan::Filter {
            child: Arc::new(t),
            condition: Expr::lit_i32(1),
        };
        let text = explain_plan(&plan);
        assert!(text.starts_with("Filter 1\n"), "text={text}");
        assert!(text.contains("\n  Relation t"), "text={text}");
    }
}
