//! Typed identifiers shared across planner components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_EXPR_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identifier of a named-expression instance.
///
/// Ids are minted from a process-wide monotonic counter and stay stable
/// across plan rewrites unless deduplication explicitly reassigns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(
    /// Raw numeric id value.
    pub u64,
);

impl ExprId {
    /// Mint a fresh id. Safe under concurrent analyzer runs; no ordering
    /// across threads is implied.
    pub fn next() -> Self {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
