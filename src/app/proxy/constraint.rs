//! Server-side selection expressions for sequences

use std::fmt;
use std::ops::{BitAnd, BitOr};

use crate::errors::{DapError, DapResult};

/// Literal on the right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Int(value) => write!(f, "{value}"),
            Atom::Float(value) => write!(f, "{value:?}"),
            Atom::Str(value) => write!(f, "\"{}\"", value.replace('"', "\\\"")),
        }
    }
}

impl Atom {
    /// Numeric value, `None` for strings
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Atom::Int(value) => Some(*value as f64),
            Atom::Float(value) => Some(*value),
            Atom::Str(_) => None,
        }
    }
}

impl From<i64> for Atom {
    fn from(value: i64) -> Self {
        Atom::Int(value)
    }
}

impl From<i32> for Atom {
    fn from(value: i32) -> Self {
        Atom::Int(i64::from(value))
    }
}

impl From<u32> for Atom {
    fn from(value: u32) -> Self {
        Atom::Int(i64::from(value))
    }
}

impl From<f64> for Atom {
    fn from(value: f64) -> Self {
        Atom::Float(value)
    }
}

impl From<f32> for Atom {
    fn from(value: f32) -> Self {
        Atom::Float(f64::from(value))
    }
}

impl From<&str> for Atom {
    fn from(value: &str) -> Self {
        Atom::Str(value.to_string())
    }
}

impl From<String> for Atom {
    fn from(value: String) -> Self {
        Atom::Str(value)
    }
}

/// Relational operators understood by DAP2 selections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Evaluate the operator on two comparable values
    pub fn holds<T: PartialOrd + ?Sized>(self, left: &T, right: &T) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
            CompareOp::Gt => left > right,
            CompareOp::Ge => left >= right,
        }
    }
}

/// A selection predicate such as `s.x>10&s.id=1`
///
/// Expressions only combine with AND; [`or`](Self::or) always fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintExpression {
    value: String,
}

impl ConstraintExpression {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// `<id><op><atom>`
    pub fn comparison(id: &str, op: CompareOp, atom: &Atom) -> Self {
        Self::new(format!("{id}{}{atom}", op.symbol()))
    }

    /// This expression ANDed with `other`, this expression first
    pub fn and(&self, other: impl fmt::Display) -> Self {
        Self::new(format!("{}&{}", self.value, other))
    }

    pub fn or(&self, _other: impl fmt::Display) -> DapResult<Self> {
        Err(DapError::OrConstraint)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for ConstraintExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl BitAnd for ConstraintExpression {
    type Output = ConstraintExpression;

    fn bitand(self, other: ConstraintExpression) -> ConstraintExpression {
        self.and(other)
    }
}

impl BitOr for ConstraintExpression {
    type Output = DapResult<ConstraintExpression>;

    fn bitor(self, other: ConstraintExpression) -> DapResult<ConstraintExpression> {
        self.or(other)
    }
}
