//! Config-driven random generation of data types, expressions, and plans.
//!
//! All randomness flows through a seeded `StdRng`, so the property tests
//! are deterministic. Generation parameters come from the `test.*`
//! configuration sections.

use std::sync::Arc;

use arrow_schema::DataType;
use flint_common::config::{ExprGenConfig, PlanGenConfig, TypeGenConfig};
use flint_planner::expr::{Attribute, BinaryOperator, Expr, ExprRef, LiteralValue};
use flint_planner::logical_plan::{LogicalPlan, PlanRef};
use flint_planner::types::{array_type, map_type, struct_type, timestamp_type};
use rand::rngs::StdRng;
use rand::Rng;

const PRIMITIVES: &[fn() -> DataType] = &[
    || DataType::Boolean,
    || DataType::Int8,
    || DataType::Int16,
    || DataType::Int32,
    || DataType::Int64,
    || DataType::Float32,
    || DataType::Float64,
    || DataType::Utf8,
    || DataType::Date32,
    timestamp_type,
];

/// Random data type honoring the `test.types.*` options.
pub fn gen_data_type(rng: &mut StdRng, config: &TypeGenConfig, allow_nested: bool) -> DataType {
    let pick = rng.gen_range(0..=12u32);
    match pick {
        0 if config.allow_null_type => DataType::Null,
        10 => {
            let element = gen_primitive(rng);
            array_type(element, config.allow_nullable_array_type && rng.gen_bool(0.5))
        }
        11 => {
            let value = gen_primitive(rng);
            map_type(
                DataType::Utf8,
                value,
                config.allow_nullable_map_type && rng.gen_bool(0.5),
            )
        }
        12 if allow_nested || config.allow_empty_struct_type => {
            let min_width = usize::from(!config.allow_empty_struct_type);
            let width = rng.gen_range(min_width..=config.max_struct_type_width);
            let fields = (0..width)
                .map(|i| {
                    let field_type = if config.allow_nested_struct_type && allow_nested {
                        gen_data_type(rng, config, false)
                    } else {
                        gen_primitive(rng)
                    };
                    (
                        format!("f{i}"),
                        field_type,
                        config.allow_nullable_struct_field && rng.gen_bool(0.5),
                    )
                })
                .collect();
            struct_type(fields)
        }
        _ => gen_primitive(rng),
    }
}

fn gen_primitive(rng: &mut StdRng) -> DataType {
    PRIMITIVES[rng.gen_range(0..PRIMITIVES.len())]()
}

/// Random numeric-or-null literal.
fn gen_literal(rng: &mut StdRng, config: &ExprGenConfig) -> ExprRef {
    if rng.gen_bool(config.chances.null) {
        return Arc::new(Expr::Literal(LiteralValue::Null));
    }
    let value = match rng.gen_range(0..3u32) {
        0 => LiteralValue::Int32(rng.gen_range(-100..100)),
        1 => LiteralValue::Int64(rng.gen_range(-100..100)),
        _ => LiteralValue::Float64(f64::from(rng.gen_range(-100..100)) / 4.0),
    };
    Arc::new(Expr::Literal(value))
}

/// Random value expression over the given input attributes, with at most
/// `size` nodes.
pub fn gen_expr(
    rng: &mut StdRng,
    config: &ExprGenConfig,
    inputs: &[Attribute],
    size: usize,
) -> ExprRef {
    if size <= 1 || rng.gen_bool(0.4) {
        return gen_leaf(rng, config, inputs);
    }
    let op = [
        BinaryOperator::Plus,
        BinaryOperator::Minus,
        BinaryOperator::Multiply,
    ][rng.gen_range(0..3)];
    Arc::new(Expr::BinaryOp {
        left: gen_expr(rng, config, inputs, size / 2),
        op,
        right: gen_expr(rng, config, inputs, size / 2),
    })
}

fn gen_leaf(rng: &mut StdRng, config: &ExprGenConfig, inputs: &[Attribute]) -> ExprRef {
    if !inputs.is_empty() && rng.gen_bool(0.6) {
        let attr = &inputs[rng.gen_range(0..inputs.len())];
        Arc::new(Expr::UnresolvedAttribute {
            name: attr.name.clone(),
            qualifier: None,
        })
    } else {
        gen_literal(rng, config)
    }
}

/// Random boolean predicate over the given input attributes.
pub fn gen_predicate(
    rng: &mut StdRng,
    config: &ExprGenConfig,
    inputs: &[Attribute],
    size: usize,
) -> ExprRef {
    if size > 2 && rng.gen_bool(0.3) {
        let left = gen_predicate(rng, config, inputs, size / 2);
        let right = gen_predicate(rng, config, inputs, size / 2);
        return if rng.gen_bool(0.5) {
            Arc::new(Expr::And(left, right))
        } else {
            Arc::new(Expr::Or(left, right))
        };
    }
    if config.only_logical_operators_in_predicate && size > 1 {
        let inner = gen_predicate(rng, config, inputs, size / 2);
        return Arc::new(Expr::Not(inner));
    }
    let op = [
        BinaryOperator::Eq,
        BinaryOperator::NotEq,
        BinaryOperator::Lt,
        BinaryOperator::GtEq,
    ][rng.gen_range(0..4)];
    Arc::new(Expr::BinaryOp {
        left: gen_expr(rng, config, inputs, size / 2),
        op,
        right: gen_literal(rng, config),
    })
}

/// Random single-source query shape honoring the `test.plans.*` chances:
/// an optional SELECT list over an optional WHERE over an optional LIMIT
/// over either the base relation or a nested subquery.
pub fn gen_plan(
    rng: &mut StdRng,
    plans: &PlanGenConfig,
    exprs: &ExprGenConfig,
    table: &str,
    inputs: &[Attribute],
    depth: usize,
) -> PlanRef {
    let mut plan: PlanRef = if depth > 0 && rng.gen_bool(plans.chances.subquery) {
        gen_plan(rng, plans, exprs, table, inputs, depth - 1)
    } else {
        Arc::new(LogicalPlan::UnresolvedRelation {
            name: table.to_string(),
        })
    };
    // A subquery prunes nothing here: project lists below only ever
    // reference the base columns, so the visible attributes stay `inputs`.
    if rng.gen_bool(plans.chances.where_clause) {
        plan = Arc::new(LogicalPlan::Filter {
            condition: gen_predicate(rng, exprs, inputs, plans.max_where_predicate_size.min(6)),
            child: plan,
        });
    }
    // Every projection ends in a star so the base columns stay visible to
    // enclosing generators, whatever else the select list computes.
    let mut project_list: Vec<ExprRef> = vec![];
    if rng.gen_bool(plans.chances.select_clause) {
        let width = rng.gen_range(1..=plans.max_project_width);
        for i in 0..width {
            let expr = gen_expr(rng, exprs, inputs, plans.max_select_expression_size.min(5));
            // Explicit aliases keep generated columns from shadowing the
            // base columns the star re-exports.
            project_list.push(Expr::alias(expr, format!("c{}_{i}", depth)));
        }
    }
    project_list.push(Arc::new(Expr::Star { qualifier: None }));
    plan = Arc::new(LogicalPlan::Project {
        child: plan,
        project_list,
    });
    if rng.gen_bool(plans.chances.limit_clause) {
        plan = Arc::new(LogicalPlan::Limit {
            child: plan,
            count: Arc::new(Expr::Literal(LiteralValue::Int32(
                rng.gen_range(0..=plans.max_limit) as i32,
            ))),
        });
    }
    plan
}
