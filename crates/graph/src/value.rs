//! Typed values flowing through the graph
//!
//! A node produces exactly one [`ValueType`]. Missing data is a first-class
//! [`Value::Missing`] state rather than an error; every operator defines how it
//! propagates (see [`crate::operator`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Result type of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Boolean,
    Double,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Boolean => write!(f, "boolean"),
            ValueType::Double => write!(f, "double"),
        }
    }
}

/// A single computed value
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Missing,
    Bool(bool),
    Num(f64),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Type of a present value, `None` for missing.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Missing => None,
            Value::Bool(_) => Some(ValueType::Boolean),
            Value::Num(_) => Some(ValueType::Double),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(x) => Some(*x),
            _ => None,
        }
    }

    /// Numeric view used for ordering; booleans read as 0/1.
    pub fn as_ordinal(&self) -> Option<f64> {
        match self {
            Value::Missing => None,
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Num(x) => Some(*x),
        }
    }

    /// Wrap an arithmetic result, mapping NaN and infinities to missing.
    pub fn finite(x: f64) -> Value {
        if x.is_finite() {
            Value::Num(x)
        } else {
            Value::Missing
        }
    }

    /// Bitwise equality, so that `Num(NaN) == Num(NaN)` when comparing columns.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => a.to_bits() == b.to_bits(),
            (a, b) => a == b,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::finite(x)
    }
}

impl From<Option<bool>> for Value {
    fn from(b: Option<bool>) -> Self {
        b.map(Value::Bool).unwrap_or(Value::Missing)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => write!(f, "?"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Num(x) => write!(f, "{}", x),
        }
    }
}

/// Per-example values of one node over a whole dataset.
///
/// Shared immutably between the samples cache and its callers.
pub type Column = Arc<Vec<Value>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_maps_non_finite_to_missing() {
        assert_eq!(Value::finite(1.5), Value::Num(1.5));
        assert!(Value::finite(f64::NAN).is_missing());
        assert!(Value::finite(f64::INFINITY).is_missing());
    }

    #[test]
    fn test_ordinal_view() {
        assert_eq!(Value::Bool(true).as_ordinal(), Some(1.0));
        assert_eq!(Value::Bool(false).as_ordinal(), Some(0.0));
        assert_eq!(Value::Num(-2.0).as_ordinal(), Some(-2.0));
        assert_eq!(Value::Missing.as_ordinal(), None);
    }

    #[test]
    fn test_value_types() {
        assert_eq!(Value::Bool(true).value_type(), Some(ValueType::Boolean));
        assert_eq!(Value::Num(0.0).value_type(), Some(ValueType::Double));
        assert_eq!(Value::from(None::<bool>), Value::Missing);
    }
}
