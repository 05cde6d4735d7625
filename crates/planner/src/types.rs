//! Type lattice over the arrow data types.
//!
//! The concrete algebra is `arrow_schema::DataType` restricted to the types
//! the planner understands: Null, Boolean, the signed integer widths, the
//! float widths, Utf8, Date32, microsecond Timestamp, and the List/Map/Struct
//! complex types with per-field nullability. This module layers the
//! capability predicates, the widening partial order, implicit-cast
//! compatibility, and the widest-common-type operation on top.

use std::sync::Arc;

use arrow_schema::{DataType, Field, Fields, TimeUnit};
use flint_common::{FlintError, Result};

/// Abstract types classify concrete types by capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbstractType {
    /// Types with a total order usable by comparisons and sorts.
    Ordered,
    /// Arithmetic-capable types.
    Numeric,
    /// Whole-number numeric types.
    Integral,
    /// Floating-point numeric types.
    Fractional,
}

impl AbstractType {
    /// Whether `data_type` is a subtype of this abstract type.
    pub fn admits(&self, data_type: &DataType) -> bool {
        match self {
            AbstractType::Ordered => {
                is_numeric(data_type)
                    || matches!(
                        data_type,
                        DataType::Utf8
                            | DataType::Boolean
                            | DataType::Date32
                            | DataType::Timestamp(_, _)
                    )
            }
            AbstractType::Numeric => is_numeric(data_type),
            AbstractType::Integral => is_integral(data_type),
            AbstractType::Fractional => is_fractional(data_type),
        }
    }

    /// Name used in type-mismatch messages.
    pub fn name(&self) -> &'static str {
        match self {
            AbstractType::Ordered => "ordered type",
            AbstractType::Numeric => "numeric type",
            AbstractType::Integral => "integral type",
            AbstractType::Fractional => "fractional type",
        }
    }
}

/// The canonical timestamp type (microsecond precision, no zone).
pub fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, None)
}

/// Array type constructor: element type plus element nullability.
pub fn array_type(element: DataType, element_nullable: bool) -> DataType {
    DataType::List(Arc::new(Field::new("item", element, element_nullable)))
}

/// Map type constructor: key/value types plus value nullability.
pub fn map_type(key: DataType, value: DataType, value_nullable: bool) -> DataType {
    let entries = Field::new(
        "entries",
        DataType::Struct(Fields::from(vec![
            Field::new("key", key, false),
            Field::new("value", value, value_nullable),
        ])),
        false,
    );
    DataType::Map(Arc::new(entries), false)
}

/// Struct type constructor from (name, type, nullable) triples.
pub fn struct_type(fields: Vec<(String, DataType, bool)>) -> DataType {
    DataType::Struct(Fields::from(
        fields
            .into_iter()
            .map(|(name, data_type, nullable)| Field::new(name, data_type, nullable))
            .collect::<Vec<_>>(),
    ))
}

pub(crate) fn is_integral(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
    )
}

pub(crate) fn is_fractional(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Float32 | DataType::Float64)
}

pub(crate) fn is_numeric(data_type: &DataType) -> bool {
    is_integral(data_type) || is_fractional(data_type)
}

fn numeric_rank(data_type: &DataType) -> Option<u8> {
    Some(match data_type {
        DataType::Int8 => 1,
        DataType::Int16 => 2,
        DataType::Int32 => 3,
        DataType::Int64 => 4,
        DataType::Float32 => 5,
        DataType::Float64 => 6,
        _ => return None,
    })
}

/// Whether `from` widens losslessly (or by sanctioned numeric promotion)
/// to `to`. Reflexive; Null widens to everything; integral and float types
/// widen along the numeric chain; Date32 widens to Timestamp.
pub fn widens_to(from: &DataType, to: &DataType) -> bool {
    if from == to {
        return true;
    }
    if *from == DataType::Null {
        return true;
    }
    if let (Some(a), Some(b)) = (numeric_rank(from), numeric_rank(to)) {
        return a <= b;
    }
    matches!((from, to), (DataType::Date32, DataType::Timestamp(_, _)))
}

/// Whether an implicit cast from `from` to `to` is sanctioned.
///
/// Covers widening plus the string conversions implicit coercion is allowed
/// to insert: strings convert to and from the primitive scalar types.
pub fn implicitly_castable(from: &DataType, to: &DataType) -> bool {
    if widens_to(from, to) {
        return true;
    }
    let string_convertible = |t: &DataType| {
        is_numeric(t)
            || matches!(
                t,
                DataType::Boolean | DataType::Date32 | DataType::Timestamp(_, _)
            )
    };
    match (from, to) {
        (DataType::Utf8, t) => string_convertible(t),
        (t, DataType::Utf8) => string_convertible(t),
        _ => false,
    }
}

/// Least upper bound of two types in the widening order.
pub fn widest_type(a: &DataType, b: &DataType) -> Result<DataType> {
    if widens_to(a, b) {
        Ok(b.clone())
    } else if widens_to(b, a) {
        Ok(a.clone())
    } else {
        Err(FlintError::TypeMismatch {
            expr: format!("{a} and {b}"),
            actual: a.clone(),
            expected: format!("a common supertype with {b}"),
        })
    }
}

/// Least upper bound of a non-empty set of types.
pub fn widest_type_of<'a>(mut types: impl Iterator<Item = &'a DataType>) -> Result<DataType> {
    let first = types
        .next()
        .ok_or_else(|| FlintError::Analysis("widest type of no types".to_string()))?;
    types.try_fold(first.clone(), |acc, t| widest_type(&acc, t))
}
