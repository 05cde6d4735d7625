use arrow_schema::DataType;
use thiserror::Error;

/// Canonical Flint error taxonomy used across crates.
///
/// Classification guidance:
/// - [`FlintError::TableNotFound`] / [`FlintError::FunctionNotFound`]: catalog lookup misses
/// - [`FlintError::ResolutionFailure`]: name binding failed or stayed incomplete
/// - [`FlintError::TypeMismatch`]: a type constraint rejected an expression
/// - [`FlintError::IllegalAggregation`]: invalid aggregate structure
/// - [`FlintError::Analysis`]: SQL-level misuse outside the above classes
/// - [`FlintError::Unsupported`]: valid SQL shape the analyzer intentionally rejects
#[derive(Debug, Error)]
pub enum FlintError {
    /// Catalog has no relation registered under the given name.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// Function registry has no function registered under the given name.
    #[error("function not found: {0}")]
    FunctionNotFound(String),

    /// Name binding failed or a plan/expression stayed unresolved.
    ///
    /// Examples:
    /// - ambiguous attribute reference with multiple candidates
    /// - residual unresolved node after the resolution batch
    /// - generated attribute surviving into the top-level output
    #[error("resolution failure: {0}")]
    ResolutionFailure(String),

    /// A type constraint rejected an expression.
    #[error("type mismatch: {expr} is of type {actual}, expected {expected}")]
    TypeMismatch {
        /// Rendering of the offending expression.
        expr: String,
        /// Actual data type of the offending expression.
        actual: DataType,
        /// Expected concrete or abstract type.
        expected: String,
    },

    /// Invalid aggregation structure.
    ///
    /// Examples:
    /// - aggregate function nested inside another aggregate function
    /// - SELECT/HAVING/ORDER BY referencing an attribute neither grouped
    ///   nor aggregated
    #[error("illegal aggregation: {0}")]
    IllegalAggregation(String),

    /// SQL-level misuse outside the dedicated classes.
    ///
    /// Examples:
    /// - `DISTINCT *`
    /// - star argument passed to a function other than `count`
    #[error("analysis error: {0}")]
    Analysis(String),

    /// Valid request for a feature the analyzer intentionally rejects.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Standard Flint result alias.
pub type Result<T> = std::result::Result<T, FlintError>;
