//! Operator kinds of the expression graph
//!
//! A closed sum type with one evaluation arm per kind. Every operator has a fixed
//! signature; the universe rejects applications that violate it.

use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Operator tag of a node
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Reference to the `index`-th input column
    Input { index: u32, ty: ValueType },
    Not,
    And,
    Or,
    Xor,
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Neg,
    Abs,
    Log,
    Sqrt,
    /// Boolean decision `child <= threshold`
    Stump { threshold: f64 },
}

// Manual Hash/Eq for threshold handling
impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Operator::Input { index: a, ty: ta }, Operator::Input { index: b, ty: tb }) => {
                a == b && ta == tb
            }
            (Operator::Stump { threshold: a }, Operator::Stump { threshold: b }) => {
                a.to_bits() == b.to_bits()
            }
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl Eq for Operator {}

impl Hash for Operator {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Operator::Input { index, ty } => {
                index.hash(state);
                ty.hash(state);
            }
            Operator::Stump { threshold } => threshold.to_bits().hash(state),
            _ => {}
        }
    }
}

/// Argument and result types of an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub args: &'static [ValueType],
    pub result: ValueType,
}

const NO_ARGS: &[ValueType] = &[];
const ONE_BOOL: &[ValueType] = &[ValueType::Boolean];
const TWO_BOOL: &[ValueType] = &[ValueType::Boolean, ValueType::Boolean];
const ONE_NUM: &[ValueType] = &[ValueType::Double];
const TWO_NUM: &[ValueType] = &[ValueType::Double, ValueType::Double];

impl Operator {
    pub fn signature(&self) -> Signature {
        use Operator::*;
        let (args, result) = match self {
            Input { ty, .. } => (NO_ARGS, *ty),
            Not => (ONE_BOOL, ValueType::Boolean),
            And | Or | Xor => (TWO_BOOL, ValueType::Boolean),
            Add | Sub | Mul | Div | Min | Max => (TWO_NUM, ValueType::Double),
            Neg | Abs | Log | Sqrt => (ONE_NUM, ValueType::Double),
            Stump { .. } => (ONE_NUM, ValueType::Boolean),
        };
        Signature { args, result }
    }

    pub fn arity(&self) -> usize {
        self.signature().args.len()
    }

    pub fn result_type(&self) -> ValueType {
        self.signature().result
    }

    /// Whether argument order is irrelevant to the result.
    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            Operator::And
                | Operator::Or
                | Operator::Xor
                | Operator::Add
                | Operator::Mul
                | Operator::Min
                | Operator::Max
        )
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Operator::Input { .. })
    }

    /// Whether the operator may be offered as a search action.
    pub fn is_function(&self) -> bool {
        !matches!(self, Operator::Input { .. } | Operator::Stump { .. })
    }

    pub fn name(&self) -> &'static str {
        use Operator::*;
        match self {
            Input { .. } => "input",
            Not => "not",
            And => "and",
            Or => "or",
            Xor => "xor",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Min => "min",
            Max => "max",
            Neg => "neg",
            Abs => "abs",
            Log => "log",
            Sqrt => "sqrt",
            Stump { .. } => "stump",
        }
    }

    /// Evaluate on already computed arguments.
    ///
    /// Any missing argument yields missing. Arguments of the wrong type also
    /// yield missing; well-formed graphs never produce them.
    pub fn apply(&self, args: &[Value]) -> Value {
        use Operator::*;
        if args.iter().any(Value::is_missing) {
            return Value::Missing;
        }
        match self {
            Input { .. } => Value::Missing,
            Not => unary_bool(args, |a| !a),
            And => binary_bool(args, |a, b| a && b),
            Or => binary_bool(args, |a, b| a || b),
            Xor => binary_bool(args, |a, b| a != b),
            Add => binary_num(args, |a, b| a + b),
            Sub => binary_num(args, |a, b| a - b),
            Mul => binary_num(args, |a, b| a * b),
            Div => binary_num(args, |a, b| if b == 0.0 { f64::NAN } else { a / b }),
            Min => binary_num(args, f64::min),
            Max => binary_num(args, f64::max),
            Neg => unary_num(args, |a| -a),
            Abs => unary_num(args, f64::abs),
            Log => unary_num(args, |a| if a > 0.0 { a.ln() } else { f64::NAN }),
            Sqrt => unary_num(args, |a| if a >= 0.0 { a.sqrt() } else { f64::NAN }),
            Stump { threshold } => match args.first().and_then(Value::as_num) {
                Some(x) => Value::Bool(x <= *threshold),
                None => Value::Missing,
            },
        }
    }
}

fn unary_bool(args: &[Value], f: impl Fn(bool) -> bool) -> Value {
    match args {
        [Value::Bool(a)] => Value::Bool(f(*a)),
        _ => Value::Missing,
    }
}

fn binary_bool(args: &[Value], f: impl Fn(bool, bool) -> bool) -> Value {
    match args {
        [Value::Bool(a), Value::Bool(b)] => Value::Bool(f(*a, *b)),
        _ => Value::Missing,
    }
}

fn unary_num(args: &[Value], f: impl Fn(f64) -> f64) -> Value {
    match args {
        [Value::Num(a)] => Value::finite(f(*a)),
        _ => Value::Missing,
    }
}

fn binary_num(args: &[Value], f: impl Fn(f64, f64) -> f64) -> Value {
    match args {
        [Value::Num(a), Value::Num(b)] => Value::finite(f(*a, *b)),
        _ => Value::Missing,
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Input { index, .. } => write!(f, "x{}", index),
            Operator::Stump { threshold } => write!(f, "<= {}", threshold),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Parses function operator names (`"and"`, `"sub"`, ...).
impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Operator::*;
        let op = match s.trim().to_ascii_lowercase().as_str() {
            "not" => Not,
            "and" => And,
            "or" => Or,
            "xor" => Xor,
            "add" => Add,
            "sub" => Sub,
            "mul" => Mul,
            "div" => Div,
            "min" => Min,
            "max" => Max,
            "neg" => Neg,
            "abs" => Abs,
            "log" => Log,
            "sqrt" => Sqrt,
            other => return Err(format!("unknown primitive operator '{}'", other)),
        };
        Ok(op)
    }
}
