//! The analyzer: a batched fixed-point rule engine over logical plans.
//!
//! Guarantees after a successful [`Analyzer::analyze`]:
//! - every relation, attribute, and function reference is bound;
//! - higher-level constructs (CTEs, DISTINCT, HAVING, ORDER BY over
//!   aggregates, global aggregates, `*`) are desugared into the canonical
//!   algebra;
//! - every expression is strictly typed, with implicit coercions inserted
//!   as explicit casts;
//! - no unresolved node, generated attribute, or distinct aggregate
//!   survives (the post-analysis batch rejects any residue).
//!
//! Error taxonomy: see [`flint_common::FlintError`]. Constraint and rule
//! errors abort the whole analysis; only the zero-candidate case of
//! reference resolution defers, and the post-analysis batch converts any
//! leftover into a resolution failure.

use std::sync::Arc;

use flint_common::config::LanguageConfig;
use flint_common::Result;
use tracing::{debug, warn};

use crate::aggregate::{ResolveAggregates, RewriteDistinctAggregateFunctions};
use crate::catalog::Catalog;
use crate::checks::{PostAnalysisCheck, TypeCheck};
use crate::logical_plan::PlanRef;
use crate::rules::{
    DeduplicateReferences, ExpandStars, GlobalAggregates, InlineCteRelations,
    MergeHavingConditions, MergeSortsOverAggregates, ResolveAliases, ResolveFunctions,
    ResolveReferences, ResolveRelations, ResolveSortReferences, RewriteDistinctsAsAggregates,
};

/// Shared state handed to every rule application.
pub struct AnalyzerContext {
    /// Catalog consulted for relations and functions.
    pub catalog: Arc<dyn Catalog>,
    /// Language semantics configuration.
    pub config: LanguageConfig,
    /// Column name used when no rendering can be derived for an
    /// auto-aliased expression.
    pub anonymous_column: String,
}

impl AnalyzerContext {
    /// Whether name matching is case-sensitive.
    pub fn case_sensitive(&self) -> bool {
        self.config.case_sensitive
    }
}

/// A rule is a unary function on plans. Rules must be no-ops (returning a
/// structurally identical plan) once their pattern no longer occurs.
pub trait Rule {
    /// Rule name used in logs.
    fn name(&self) -> &str;

    /// Apply the rule to the whole plan.
    fn apply(&self, plan: &PlanRef, ctx: &AnalyzerContext) -> Result<PlanRef>;
}

/// Iteration strategy of a rule batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Each rule applied exactly once, in order.
    Once,
    /// Rules applied in passes until a full pass changes nothing, or the
    /// pass limit elapses. `None` means unlimited, bounded by a safety cap.
    FixedPoint(Option<usize>),
}

/// Safety cap for unlimited fixed-point batches: divergence is logged
/// instead of looping forever.
pub const FIXED_POINT_SAFETY_CAP: usize = 100;

/// A named list of rules plus an iteration strategy.
pub struct RuleBatch {
    /// Batch name used in logs.
    pub name: &'static str,
    /// Iteration strategy.
    pub strategy: Strategy,
    /// Rules in application order.
    pub rules: Vec<Box<dyn Rule>>,
}

impl RuleBatch {
    fn run(&self, plan: PlanRef, ctx: &AnalyzerContext) -> Result<PlanRef> {
        match self.strategy {
            Strategy::Once => {
                let mut current = plan;
                for rule in &self.rules {
                    current = rule.apply(&current, ctx)?;
                }
                Ok(current)
            }
            Strategy::FixedPoint(limit) => {
                let max_passes = limit.unwrap_or(FIXED_POINT_SAFETY_CAP);
                let mut current = plan;
                for pass in 0..max_passes {
                    let before = Arc::clone(&current);
                    for rule in &self.rules {
                        current = rule.apply(&current, ctx)?;
                    }
                    if plans_equal(&before, &current) {
                        debug!(batch = self.name, passes = pass, "batch reached fixed point");
                        return Ok(current);
                    }
                }
                if limit.is_none() {
                    warn!(
                        batch = self.name,
                        cap = FIXED_POINT_SAFETY_CAP,
                        "batch did not converge within the safety cap"
                    );
                }
                Ok(current)
            }
        }
    }
}

fn plans_equal(a: &PlanRef, b: &PlanRef) -> bool {
    Arc::ptr_eq(a, b) || a.as_ref() == b.as_ref()
}

/// The analyzer surface: turns an unresolved logical plan into a fully
/// resolved, strictly typed one.
pub struct Analyzer {
    ctx: AnalyzerContext,
    batches: Vec<RuleBatch>,
}

impl Analyzer {
    /// New analyzer over `catalog` with the given language configuration.
    pub fn new(catalog: Arc<dyn Catalog>, config: LanguageConfig) -> Self {
        Self {
            ctx: AnalyzerContext {
                catalog,
                config,
                anonymous_column: "col".to_string(),
            },
            batches: default_batches(),
        }
    }

    /// Analyze a plan. See the module docs for the guarantees.
    pub fn analyze(&self, plan: PlanRef) -> Result<PlanRef> {
        let mut current = plan;
        for batch in &self.batches {
            debug!(batch = batch.name, "running batch");
            current = batch.run(current, &self.ctx)?;
        }
        Ok(current)
    }
}

/// The standard batch list. Rule order within Resolution is significant:
/// merges must see aggregates produced by earlier desugaring rules, and
/// aggregate resolution must run last.
fn default_batches() -> Vec<RuleBatch> {
    vec![
        RuleBatch {
            name: "Resolution",
            strategy: Strategy::FixedPoint(None),
            rules: vec![
                Box::new(InlineCteRelations),
                Box::new(ResolveRelations),
                Box::new(ResolveFunctions),
                Box::new(ExpandStars),
                Box::new(ResolveReferences),
                Box::new(ResolveAliases),
                Box::new(DeduplicateReferences),
                Box::new(RewriteDistinctAggregateFunctions),
                Box::new(ResolveSortReferences),
                Box::new(RewriteDistinctsAsAggregates),
                Box::new(GlobalAggregates),
                Box::new(MergeHavingConditions),
                Box::new(MergeSortsOverAggregates),
                Box::new(ResolveAggregates),
            ],
        },
        RuleBatch {
            name: "Type check",
            strategy: Strategy::Once,
            rules: vec![Box::new(TypeCheck)],
        },
        RuleBatch {
            name: "Post-analysis check",
            strategy: Strategy::Once,
            rules: vec![Box::new(PostAnalysisCheck)],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logical_plan::LogicalPlan;

    struct Nop;

    impl Rule for Nop {
        fn name(&self) -> &str {
            "nop"
        }

        fn apply(&self, plan: &PlanRef, _ctx: &AnalyzerContext) -> Result<PlanRef> {
            Ok(Arc::clone(plan))
        }
    }

    struct WrapOnceInDistinct;

    impl Rule for WrapOnceInDistinct {
        fn name(&self) -> &str {
            "wrap_once"
        }

        fn apply(&self, plan: &PlanRef, _ctx: &AnalyzerContext) -> Result<PlanRef> {
            if matches!(plan.as_ref(), LogicalPlan::Distinct { .. }) {
                Ok(Arc::clone(plan))
            } else {
                Ok(Arc::new(LogicalPlan::Distinct {
                    child: Arc::clone(plan),
                }))
            }
        }
    }

    fn test_ctx() -> AnalyzerContext {
        AnalyzerContext {
            catalog: Arc::new(crate::catalog::MemoryCatalog::new(true)),
            config: LanguageConfig::default(),
            anonymous_column: "col".to_string(),
        }
    }

    fn leaf() -> PlanRef {
        Arc::new(LogicalPlan::UnresolvedRelation {
            name: "t".to_string(),
        })
    }

    #[test]
    fn fixed_point_stops_when_nothing_changes() {
        let batch = RuleBatch {
            name: "test",
            strategy: Strategy::FixedPoint(None),
            rules: vec![Box::new(Nop)],
        };
        let plan = leaf();
        let out = batch.run(Arc::clone(&plan), &test_ctx()).expect("run");
        assert!(Arc::ptr_eq(&out, &plan));
    }

    #[test]
    fn fixed_point_converges_after_one_effective_pass() {
        let batch = RuleBatch {
            name: "test",
            strategy: Strategy::FixedPoint(None),
            rules: vec![Box::new(WrapOnceInDistinct)],
        };
        let out = batch.run(leaf(), &test_ctx()).expect("run");
        // One wrap, then a no-op pass detects the fixed point.
        assert!(matches!(out.as_ref(), LogicalPlan::Distinct { .. }));
        match out.as_ref() {
            LogicalPlan::Distinct { child } => {
                assert!(matches!(
                    child.as_ref(),
                    LogicalPlan::UnresolvedRelation { .. }
                ));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn bounded_fixed_point_respects_the_limit() {
        struct AlwaysWrap;
        impl Rule for AlwaysWrap {
            fn name(&self) -> &str {
                "always_wrap"
            }
            fn apply(&self, plan: &PlanRef, _ctx: &AnalyzerContext) -> Result<PlanRef> {
                Ok(Arc::new(LogicalPlan::Distinct {
                    child: Arc::clone(plan),
                }))
            }
        }
        let batch = RuleBatch {
            name: "test",
            strategy: Strategy::FixedPoint(Some(3)),
            rules: vec![Box::new(AlwaysWrap)],
        };
        let out = batch.run(leaf(), &test_ctx()).expect("run");
        let mut depth = 0;
        let mut cursor = out;
        while let LogicalPlan::Distinct { child } = cursor.as_ref() {
            depth += 1;
            cursor = Arc::clone(child);
        }
        assert_eq!(depth, 3);
    }
}
