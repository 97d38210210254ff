//! Primitive sets - the function operators a search may apply

use crate::errors::{GraphError, Result};
use crate::operator::Operator;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveSet {
    functions: Vec<Operator>,
}

impl PrimitiveSet {
    /// Build from function operators; inputs and stumps are rejected, duplicates dropped.
    pub fn new(functions: impl IntoIterator<Item = Operator>) -> Result<Self> {
        let mut set: Vec<Operator> = Vec::new();
        for op in functions {
            if !op.is_function() {
                return Err(GraphError::StructuralViolation(format!(
                    "{} cannot be used as a primitive function",
                    op.name()
                )));
            }
            if !set.contains(&op) {
                set.push(op);
            }
        }
        Ok(Self { functions: set })
    }

    /// Parse a list of operator names such as `["and", "or", "not"]`.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let ops = names
            .iter()
            .map(|name| name.as_ref().parse::<Operator>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(GraphError::StructuralViolation)?;
        Self::new(ops)
    }

    /// {and, or, not}
    pub fn boolean() -> Self {
        Self {
            functions: vec![Operator::And, Operator::Or, Operator::Not],
        }
    }

    /// {add, sub, mul, div, neg}
    pub fn arithmetic() -> Self {
        Self {
            functions: vec![
                Operator::Add,
                Operator::Sub,
                Operator::Mul,
                Operator::Div,
                Operator::Neg,
            ],
        }
    }

    pub fn functions(&self) -> &[Operator] {
        &self.functions
    }

    pub fn max_arity(&self) -> usize {
        self.functions.iter().map(Operator::arity).max().unwrap_or(0)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.functions.iter().map(Operator::name).collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Default for PrimitiveSet {
    fn default() -> Self {
        Self::boolean()
    }
}
