//! Scalar building blocks shared by plans, predicates and statistics.

use std::fmt::{Display, Formatter};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumIter};

use crate::plan::PlanNodeId;

pub type ColumnId = usize;

/// Reference to a column produced by a table scan.
///
/// `node` is the id of the scan that originally produces the column. It is resolved lazily against
/// whichever plan currently contains that scan, so a column reference stays valid when the nodes above
/// the scan are rebuilt.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef {
    node: PlanNodeId,
    column: ColumnId,
}

impl ColumnRef {
    pub fn new(node: PlanNodeId, column: ColumnId) -> Self {
        Self { node, column }
    }

    pub fn node(&self) -> PlanNodeId {
        self.node
    }

    pub fn column(&self) -> ColumnId {
        self.column
    }
}

impl Display for ColumnRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}.{}", self.node, self.column)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, StrumDisplay, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Long,
    Float,
    Double,
    String,
    Null,
}

impl DataType {
    /// Integral types have discrete value ranges, i.e. `x > 5` starts at 6.
    pub fn is_integral(&self) -> bool {
        matches!(self, DataType::Int | DataType::Long)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int | DataType::Long | DataType::Float | DataType::Double
        )
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    StrumDisplay,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum PredicateCondition {
    #[strum(serialize = "=")]
    Equals,
    #[strum(serialize = "!=")]
    NotEquals,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanEquals,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanEquals,
    #[strum(serialize = "LIKE")]
    Like,
    #[strum(serialize = "NOT LIKE")]
    NotLike,
}

impl PredicateCondition {
    /// Condition to use when both operands swap sides, e.g. `a > b` becomes `b < a`.
    ///
    /// `LIKE` is not symmetric and has no flipped form.
    pub fn flip(self) -> Option<Self> {
        use PredicateCondition::*;
        match self {
            Equals => Some(Equals),
            NotEquals => Some(NotEquals),
            LessThan => Some(GreaterThan),
            LessThanEquals => Some(GreaterThanEquals),
            GreaterThan => Some(LessThan),
            GreaterThanEquals => Some(LessThanEquals),
            Like | NotLike => None,
        }
    }
}

/// Literal value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(OrderedFloat<f64>),
    String(String),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Long,
            Value::Float(_) => DataType::Double,
            Value::String(_) => DataType::String,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(v.into_inner()),
            Value::String(_) => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(OrderedFloat(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "'{}'", v),
        }
    }
}

/// Right hand side of a comparison.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operand {
    Column(ColumnRef),
    Value(Value),
}

impl Operand {
    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self {
            Operand::Column(c) => Some(c),
            Operand::Value(_) => None,
        }
    }

    pub fn is_column(&self) -> bool {
        self.as_column().is_some()
    }
}

impl From<ColumnRef> for Operand {
    fn from(c: ColumnRef) -> Self {
        Operand::Column(c)
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Column(c) => write!(f, "{}", c),
            Operand::Value(v) => write!(f, "{}", v),
        }
    }
}
