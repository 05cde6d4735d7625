//! End-to-end analyzer scenarios over the standard test catalog.

use std::sync::Arc;

use arrow_schema::DataType;
use flint_common::config::LanguageConfig;
use flint_common::FlintError;
use flint_planner::expr::{collect_expr, Expr, ExprRef};
use flint_planner::logical_plan::{collect_first_plan, collect_plan_exprs, SortOrder};
use flint_planner::test_utils::{
    auto, col, filter, func, qualified_col, select, star, table, test_catalog,
};
use flint_planner::{Analyzer, BinaryOperator, Catalog, JoinType, LogicalPlan, PlanRef};

fn analyzer() -> (Analyzer, Arc<flint_planner::MemoryCatalog>) {
    let catalog = Arc::new(test_catalog());
    (
        Analyzer::new(Arc::clone(&catalog) as Arc<dyn Catalog>, LanguageConfig::default()),
        catalog,
    )
}

fn gt(left: ExprRef, right: ExprRef) -> ExprRef {
    Arc::new(Expr::BinaryOp {
        left,
        op: BinaryOperator::Gt,
        right,
    })
}

fn count_star() -> ExprRef {
    func("count", vec![star()], false)
}

#[test]
fn star_expands_to_the_table_output_in_order() {
    let (analyzer, catalog) = analyzer();
    let plan = select(table("t"), vec![star()]);
    let analyzed = analyzer.analyze(plan).expect("analyze");

    let t_output = catalog.lookup_relation("t").expect("lookup").output();
    let output = analyzed.output();
    assert_eq!(
        output.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
        vec!["a", "b"]
    );
    assert_eq!(output[0].id, t_output[0].id);
    assert_eq!(output[1].id, t_output[1].id);
}

#[test]
fn mixed_type_arithmetic_casts_the_string_side() {
    let (analyzer, _) = analyzer();
    let plan = select(
        table("t"),
        vec![auto(Arc::new(Expr::BinaryOp {
            left: Expr::lit_str("1"),
            op: BinaryOperator::Plus,
            right: Expr::lit_i32(2),
        }))],
    );
    let analyzed = analyzer.analyze(plan).expect("analyze");
    assert_eq!(analyzed.output()[0].data_type, DataType::Int32);
    let casts = collect_plan_exprs(&analyzed, &mut |e| match e.as_ref() {
        Expr::Cast { target, .. } => Some(target.clone()),
        _ => None,
    });
    assert_eq!(casts, vec![DataType::Int32]);
}

#[test]
fn pure_string_arithmetic_is_a_type_mismatch() {
    let (analyzer, _) = analyzer();
    let plan = select(
        table("t"),
        vec![auto(Arc::new(Expr::BinaryOp {
            left: Expr::lit_str("1"),
            op: BinaryOperator::Plus,
            right: Expr::lit_str("2"),
        }))],
    );
    let err = analyzer.analyze(plan).expect_err("must fail");
    assert!(matches!(err, FlintError::TypeMismatch { .. }), "err={err}");
}

#[test]
fn having_over_global_aggregate_builds_filter_over_aggregate() {
    let (analyzer, _) = analyzer();
    let plan = filter(
        select(table("t"), vec![auto(count_star())]),
        gt(count_star(), Expr::lit_i32(3)),
    );
    let analyzed = analyzer.analyze(plan).expect("analyze");

    let LogicalPlan::Project { child, project_list } = analyzed.as_ref() else {
        panic!("expected outer projection, got {analyzed:?}");
    };
    assert_eq!(project_list.len(), 1);
    assert_eq!(project_list[0].name().as_deref(), Some("count(1)"));
    let LogicalPlan::Filter { child, condition } = child.as_ref() else {
        panic!("expected having filter, got {child:?}");
    };
    // The having condition references the aggregation attribute, not a
    // fresh count.
    assert!(collect_expr(condition, &mut |e| {
        matches!(e.as_ref(), Expr::AggregateFunction { .. }).then_some(())
    })
    .is_empty());
    let LogicalPlan::Aggregate {
        grouping,
        aggregations,
        ..
    } = child.as_ref()
    else {
        panic!("expected aggregate, got {child:?}");
    };
    assert!(grouping.is_empty());
    assert_eq!(aggregations.len(), 1);
    assert!(analyzed.is_resolved());
}

#[test]
fn self_join_regenerates_right_side_ids() {
    let (analyzer, _) = analyzer();
    let join: PlanRef = Arc::new(LogicalPlan::Join {
        left: table("t"),
        right: table("t"),
        join_type: JoinType::Inner,
        condition: None,
    });
    let analyzed = analyzer.analyze(select(join, vec![star()])).expect("analyze");
    let output = analyzed.output();
    assert_eq!(output.len(), 4);
    assert_eq!(
        output.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
        vec!["a", "b", "a", "b"]
    );
    assert_ne!(output[0].id, output[2].id);
    assert_ne!(output[1].id, output[3].id);
    assert!(analyzed.is_deduplicated());
}

#[test]
fn ungrouped_attribute_with_aggregate_is_illegal() {
    let (analyzer, _) = analyzer();
    let plan = select(
        table("t"),
        vec![auto(col("a")), auto(func("count", vec![col("b")], false))],
    );
    let err = analyzer.analyze(plan).expect_err("must fail");
    match err {
        FlintError::IllegalAggregation(msg) => {
            assert!(msg.contains("SELECT field"), "msg={msg}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn nested_aggregate_is_illegal() {
    let (analyzer, _) = analyzer();
    let plan: PlanRef = Arc::new(LogicalPlan::UnresolvedAggregate {
        child: table("t"),
        keys: vec![col("b")],
        project_list: vec![auto(func(
            "max",
            vec![func("count", vec![col("a")], false)],
            false,
        ))],
        having: vec![],
        order: vec![],
    });
    let err = analyzer.analyze(plan).expect_err("must fail");
    assert!(
        matches!(err, FlintError::IllegalAggregation(_)),
        "unexpected error: {err}"
    );
}

#[test]
fn cte_reference_is_inlined_and_resolved() {
    let (analyzer, _) = analyzer();
    let cte = select(table("t"), vec![auto(col("a"))]);
    let body = select(table("c"), vec![auto(col("a"))]);
    let plan: PlanRef = Arc::new(LogicalPlan::With {
        child: body,
        name: "c".to_string(),
        cte,
    });
    let analyzed = analyzer.analyze(plan).expect("analyze");
    assert!(analyzed.is_resolved());
    assert_eq!(analyzed.output()[0].name, "a");
    let residual = collect_first_plan(&analyzed, &mut |n| {
        matches!(
            n.as_ref(),
            LogicalPlan::With { .. } | LogicalPlan::UnresolvedRelation { .. }
        )
        .then_some(())
    });
    assert!(residual.is_none(), "CTE structures must be desugared");
}

#[test]
fn inner_cte_shadows_outer() {
    let (analyzer, _) = analyzer();
    // WITH c AS (SELECT a FROM t) (WITH c AS (SELECT b FROM t) SELECT * FROM c)
    let outer_cte = select(table("t"), vec![auto(col("a"))]);
    let inner_cte = select(table("t"), vec![auto(col("b"))]);
    let inner: PlanRef = Arc::new(LogicalPlan::With {
        child: select(table("c"), vec![star()]),
        name: "c".to_string(),
        cte: inner_cte,
    });
    let plan: PlanRef = Arc::new(LogicalPlan::With {
        child: inner,
        name: "c".to_string(),
        cte: outer_cte,
    });
    let analyzed = analyzer.analyze(plan).expect("analyze");
    assert_eq!(analyzed.output()[0].name, "b");
}

#[test]
fn unresolvable_column_is_reported_post_analysis() {
    let (analyzer, _) = analyzer();
    let plan = select(table("t"), vec![auto(col("missing"))]);
    let err = analyzer.analyze(plan).expect_err("must fail");
    match err {
        FlintError::ResolutionFailure(msg) => {
            assert!(msg.contains("missing"), "msg={msg}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_table_fails_lookup() {
    let (analyzer, _) = analyzer();
    let err = analyzer
        .analyze(select(table("missing"), vec![star()]))
        .expect_err("must fail");
    assert!(matches!(err, FlintError::TableNotFound(_)), "err={err}");
}

#[test]
fn missing_function_fails_lookup() {
    let (analyzer, _) = analyzer();
    let plan = select(table("t"), vec![auto(func("median", vec![col("a")], false))]);
    let err = analyzer.analyze(plan).expect_err("must fail");
    assert!(matches!(err, FlintError::FunctionNotFound(_)), "err={err}");
}

#[test]
fn unqualified_ambiguous_reference_fails() {
    let (analyzer, _) = analyzer();
    let join: PlanRef = Arc::new(LogicalPlan::Join {
        left: table("t"),
        right: table("s"),
        join_type: JoinType::Inner,
        condition: None,
    });
    let err = analyzer
        .analyze(select(join, vec![auto(col("a"))]))
        .expect_err("must fail");
    assert!(matches!(err, FlintError::ResolutionFailure(_)), "err={err}");
}

#[test]
fn qualifier_disambiguates_join_references() {
    let (analyzer, _) = analyzer();
    let join: PlanRef = Arc::new(LogicalPlan::Join {
        left: table("t"),
        right: table("s"),
        join_type: JoinType::Inner,
        condition: Some(gt(qualified_col("t", "a"), qualified_col("s", "a"))),
    });
    let analyzed = analyzer
        .analyze(select(join, vec![auto(qualified_col("s", "a"))]))
        .expect("analyze");
    assert!(analyzed.is_resolved());
    assert_eq!(analyzed.output().len(), 1);
}

#[test]
fn distinct_desugars_into_group_by_output() {
    let (analyzer, _) = analyzer();
    let plan: PlanRef = Arc::new(LogicalPlan::Distinct {
        child: select(table("t"), vec![auto(col("a"))]),
    });
    let analyzed = analyzer.analyze(plan).expect("analyze");
    assert!(analyzed.is_resolved());
    assert_eq!(analyzed.output()[0].name, "a");
    let grouping = collect_first_plan(&analyzed, &mut |n| match n.as_ref() {
        LogicalPlan::Aggregate { grouping, .. } => Some(grouping.len()),
        _ => None,
    });
    assert_eq!(grouping, Some(1));
}

#[test]
fn distinct_aggregate_function_is_unsupported() {
    let (analyzer, _) = analyzer();
    let plan = select(table("t"), vec![auto(func("count", vec![col("a")], true))]);
    let err = analyzer.analyze(plan).expect_err("must fail");
    assert!(matches!(err, FlintError::Unsupported(_)), "err={err}");
}

#[test]
fn count_distinct_star_is_rejected() {
    let (analyzer, _) = analyzer();
    let plan = select(table("t"), vec![auto(func("count", vec![star()], true))]);
    let err = analyzer.analyze(plan).expect_err("must fail");
    assert!(matches!(err, FlintError::Analysis(_)), "err={err}");
}

#[test]
fn star_argument_outside_count_is_rejected() {
    let (analyzer, _) = analyzer();
    let plan = select(table("t"), vec![auto(func("sum", vec![star()], false))]);
    let err = analyzer.analyze(plan).expect_err("must fail");
    assert!(matches!(err, FlintError::Analysis(_)), "err={err}");
}

#[test]
fn sort_on_pruned_column_is_re_projected() {
    let (analyzer, _) = analyzer();
    let plan: PlanRef = Arc::new(LogicalPlan::Sort {
        child: select(table("t"), vec![auto(col("a"))]),
        order: vec![SortOrder::asc(col("b"))],
    });
    let analyzed = analyzer.analyze(plan).expect("analyze");
    assert!(analyzed.is_resolved());
    // Output stays what the user selected.
    let output = analyzed.output();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].name, "a");
    // Shape: Project over Sort over the widened Project.
    let LogicalPlan::Project { child, .. } = analyzed.as_ref() else {
        panic!("expected outer projection, got {analyzed:?}");
    };
    let LogicalPlan::Sort { child, .. } = child.as_ref() else {
        panic!("expected sort, got {child:?}");
    };
    let LogicalPlan::Project { project_list, .. } = child.as_ref() else {
        panic!("expected widened projection, got {child:?}");
    };
    assert_eq!(project_list.len(), 2);
}

#[test]
fn sort_over_aggregate_merges_into_the_aggregate() {
    let (analyzer, _) = analyzer();
    let plan: PlanRef = Arc::new(LogicalPlan::Sort {
        child: select(table("t"), vec![auto(count_star())]),
        order: vec![SortOrder::asc(count_star())],
    });
    let analyzed = analyzer.analyze(plan).expect("analyze");
    let LogicalPlan::Project { child, .. } = analyzed.as_ref() else {
        panic!("expected projection, got {analyzed:?}");
    };
    let LogicalPlan::Sort { child, order } = child.as_ref() else {
        panic!("expected sort below projection, got {child:?}");
    };
    assert!(matches!(child.as_ref(), LogicalPlan::Aggregate { .. }));
    // The sort key references the aggregation attribute.
    assert!(collect_expr(&order[0].expr, &mut |e| {
        matches!(e.as_ref(), Expr::AggregateFunction { .. }).then_some(())
    })
    .is_empty());
}

#[test]
fn limit_count_is_type_checked() {
    let (analyzer, _) = analyzer();
    let ok: PlanRef = Arc::new(LogicalPlan::Limit {
        child: select(table("t"), vec![auto(col("a"))]),
        count: Expr::lit_i32(5),
    });
    assert!(analyzer.analyze(ok).is_ok());

    let bad: PlanRef = Arc::new(LogicalPlan::Limit {
        child: select(table("t"), vec![auto(col("a"))]),
        count: col("a"),
    });
    let err = analyzer.analyze(bad).expect_err("must fail");
    assert!(matches!(err, FlintError::TypeMismatch { .. }), "err={err}");
}

#[test]
fn union_sides_must_have_matching_types() {
    let (analyzer, _) = analyzer();
    let ok: PlanRef = Arc::new(LogicalPlan::Union {
        left: select(table("t"), vec![auto(col("a"))]),
        right: select(table("s"), vec![auto(col("a"))]),
    });
    let analyzed = analyzer.analyze(ok).expect("analyze");
    assert!(analyzed.is_deduplicated());

    let bad: PlanRef = Arc::new(LogicalPlan::Union {
        left: select(table("t"), vec![auto(col("a"))]),
        right: select(table("s"), vec![auto(col("c"))]),
    });
    let err = analyzer.analyze(bad).expect_err("must fail");
    assert!(matches!(err, FlintError::TypeMismatch { .. }), "err={err}");
}

#[test]
fn group_by_with_having_and_order_resolves_fully() {
    let (analyzer, _) = analyzer();
    let count_b = func("count", vec![col("b")], false);
    let uagg: PlanRef = Arc::new(LogicalPlan::UnresolvedAggregate {
        child: table("t"),
        keys: vec![col("a")],
        project_list: vec![auto(col("a")), auto(Arc::clone(&count_b))],
        having: vec![gt(Arc::clone(&count_b), Expr::lit_i32(1))],
        order: vec![SortOrder::asc(col("a"))],
    });
    let analyzed = analyzer.analyze(uagg).expect("analyze");
    assert!(analyzed.is_resolved());
    let output = analyzed.output();
    assert_eq!(
        output.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
        vec!["a", "count(b)"]
    );
    assert!(output.iter().all(|a| a.generated.is_none()));
}

#[test]
fn analysis_is_idempotent_on_scenarios() {
    let (analyzer, _) = analyzer();
    let plans: Vec<PlanRef> = vec![
        select(table("t"), vec![star()]),
        filter(
            select(table("t"), vec![auto(count_star())]),
            gt(count_star(), Expr::lit_i32(3)),
        ),
        Arc::new(LogicalPlan::Distinct {
            child: select(table("t"), vec![auto(col("a"))]),
        }),
    ];
    for plan in plans {
        let once = analyzer.analyze(plan).expect("first analysis");
        let twice = analyzer.analyze(Arc::clone(&once)).expect("second analysis");
        assert_eq!(once.as_ref(), twice.as_ref(), "second analysis must be a no-op");
    }
}
