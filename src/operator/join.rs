use std::fmt::{Display, Formatter};

use crate::expr::{ColumnRef, PredicateCondition};

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum JoinMode {
    Inner,
    Cross,
}

/// `left <condition> right`, `left` is produced by the left input.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct JoinCondition {
    left: ColumnRef,
    condition: PredicateCondition,
    right: ColumnRef,
}

impl JoinCondition {
    pub fn new(left: ColumnRef, condition: PredicateCondition, right: ColumnRef) -> Self {
        Self {
            left,
            condition,
            right,
        }
    }

    pub fn left(&self) -> ColumnRef {
        self.left
    }

    pub fn condition(&self) -> PredicateCondition {
        self.condition
    }

    pub fn right(&self) -> ColumnRef {
        self.right
    }
}

/// Logical join operator.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Join {
    join_mode: JoinMode,
    condition: Option<JoinCondition>,
}

impl Join {
    pub fn inner(condition: JoinCondition) -> Self {
        Self {
            join_mode: JoinMode::Inner,
            condition: Some(condition),
        }
    }

    pub fn cross() -> Self {
        Self {
            join_mode: JoinMode::Cross,
            condition: None,
        }
    }

    pub fn join_mode(&self) -> JoinMode {
        self.join_mode
    }

    pub fn condition(&self) -> Option<&JoinCondition> {
        self.condition.as_ref()
    }
}

impl Display for Join {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.condition {
            Some(c) => write!(f, "[Join] Inner {} {} {}", c.left, c.condition, c.right),
            None => write!(f, "[Join] Cross"),
        }
    }
}
