use serde::{Deserialize, Serialize};

/// Top-level Flint configuration.
///
/// Sections mirror the recognized option namespaces: `language.*` is read by
/// the analyzer core, `test.*` only governs the random plan/expression
/// generator used by the test harness.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Language semantics options.
    #[serde(default)]
    pub language: LanguageConfig,
    /// Test-harness generation options.
    #[serde(default)]
    pub test: TestConfig,
}

/// Language semantics options (`language.*`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct LanguageConfig {
    /// Whether name matching is case-sensitive.
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    /// Whether NULL sorts after every non-NULL value. Read by downstream
    /// components; the analyzer core carries it without acting on it.
    #[serde(default = "default_true")]
    pub nulls_larger: bool,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            nulls_larger: true,
        }
    }
}

/// Test-harness generation options (`test.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TestConfig {
    /// Random data type generation options.
    #[serde(default)]
    pub types: TypeGenConfig,
    /// Random expression generation options.
    #[serde(default)]
    pub expressions: ExprGenConfig,
    /// Random plan generation options.
    #[serde(default)]
    pub plans: PlanGenConfig,
}

/// Random data type generation options (`test.types.*`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct TypeGenConfig {
    /// Whether the null type may be generated.
    #[serde(default = "default_true")]
    pub allow_null_type: bool,
    /// Whether struct types with no fields may be generated.
    #[serde(default = "default_true")]
    pub allow_empty_struct_type: bool,
    /// Whether generated complex types may be nullable.
    #[serde(default = "default_true")]
    pub allow_nullable_complex_type: bool,
    /// Whether generated array types may have nullable elements.
    #[serde(default = "default_true")]
    pub allow_nullable_array_type: bool,
    /// Whether generated map types may have nullable values.
    #[serde(default = "default_true")]
    pub allow_nullable_map_type: bool,
    /// Whether generated struct fields may be nullable.
    #[serde(default = "default_true")]
    pub allow_nullable_struct_field: bool,
    /// Whether struct types may nest inside struct types.
    #[serde(default = "default_true")]
    pub allow_nested_struct_type: bool,
    /// Maximum number of fields in a generated struct type.
    #[serde(default = "default_max_struct_type_width")]
    pub max_struct_type_width: usize,
}

impl Default for TypeGenConfig {
    fn default() -> Self {
        Self {
            allow_null_type: true,
            allow_empty_struct_type: true,
            allow_nullable_complex_type: true,
            allow_nullable_array_type: true,
            allow_nullable_map_type: true,
            allow_nullable_struct_field: true,
            allow_nested_struct_type: true,
            max_struct_type_width: default_max_struct_type_width(),
        }
    }
}

/// Random expression generation options (`test.expressions.*`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ExprGenConfig {
    /// Maximum times a sub-generator may be retried/repeated.
    #[serde(default = "default_max_repetition")]
    pub max_repetition: usize,
    /// Chance weights for expression generation.
    #[serde(default)]
    pub chances: ExprGenChances,
    /// Whether generated predicates are restricted to logical operators.
    #[serde(default)]
    pub only_logical_operators_in_predicate: bool,
}

impl Default for ExprGenConfig {
    fn default() -> Self {
        Self {
            max_repetition: default_max_repetition(),
            chances: ExprGenChances::default(),
            only_logical_operators_in_predicate: false,
        }
    }
}

/// Chance weights for expression generation (`test.expressions.chances.*`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ExprGenChances {
    /// Chance of generating a NULL literal.
    #[serde(default = "default_null_chance")]
    pub null: f64,
}

impl Default for ExprGenChances {
    fn default() -> Self {
        Self {
            null: default_null_chance(),
        }
    }
}

/// Random plan generation options (`test.plans.*`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct PlanGenConfig {
    /// Maximum number of joins in a generated plan.
    #[serde(default = "default_max_join_num")]
    pub max_join_num: usize,
    /// Maximum number of expressions in a generated projection.
    #[serde(default = "default_max_project_width")]
    pub max_project_width: usize,
    /// Maximum generated LIMIT count.
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// Maximum node count of a generated expression.
    #[serde(default = "default_max_expression_size")]
    pub max_expression_size: usize,
    /// Maximum node count of a generated WHERE predicate.
    #[serde(default = "default_max_expression_size")]
    pub max_where_predicate_size: usize,
    /// Maximum node count of a generated SELECT expression.
    #[serde(default = "default_max_expression_size")]
    pub max_select_expression_size: usize,
    /// Chance weights for plan clause generation.
    #[serde(default)]
    pub chances: PlanGenChances,
}

impl Default for PlanGenConfig {
    fn default() -> Self {
        Self {
            max_join_num: default_max_join_num(),
            max_project_width: default_max_project_width(),
            max_limit: default_max_limit(),
            max_expression_size: default_max_expression_size(),
            max_where_predicate_size: default_max_expression_size(),
            max_select_expression_size: default_max_expression_size(),
            chances: PlanGenChances::default(),
        }
    }
}

/// Chance weights for plan clause generation (`test.plans.chances.*`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct PlanGenChances {
    /// Chance of generating a SELECT clause.
    #[serde(default = "default_clause_chance")]
    pub select_clause: f64,
    /// Chance of generating a FROM clause.
    #[serde(default = "default_clause_chance")]
    pub from_clause: f64,
    /// Chance of generating a WHERE clause.
    #[serde(default = "default_clause_chance")]
    pub where_clause: f64,
    /// Chance of generating a LIMIT clause.
    #[serde(default = "default_limit_chance")]
    pub limit_clause: f64,
    /// Chance of generating a subquery in place of a relation.
    #[serde(default = "default_subquery_chance")]
    pub subquery: f64,
}

impl Default for PlanGenChances {
    fn default() -> Self {
        Self {
            select_clause: default_clause_chance(),
            from_clause: default_clause_chance(),
            where_clause: default_clause_chance(),
            limit_clause: default_limit_chance(),
            subquery: default_subquery_chance(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_struct_type_width() -> usize {
    4
}

fn default_max_repetition() -> usize {
    8
}

fn default_null_chance() -> f64 {
    0.1
}

fn default_max_join_num() -> usize {
    2
}

fn default_max_project_width() -> usize {
    4
}

fn default_max_limit() -> usize {
    100
}

fn default_max_expression_size() -> usize {
    16
}

fn default_clause_chance() -> f64 {
    0.8
}

fn default_limit_chance() -> f64 {
    0.2
}

fn default_subquery_chance() -> f64 {
    0.1
}
