use std::fmt::{Display, Formatter};

use crate::expr::{ColumnRef, Operand, PredicateCondition};

/// Filters the rows of its single input by `column <condition> operand`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Predicate {
    column: ColumnRef,
    condition: PredicateCondition,
    operand: Operand,
}

impl Predicate {
    pub fn new<O: Into<Operand>>(column: ColumnRef, condition: PredicateCondition, operand: O) -> Self {
        Self {
            column,
            condition,
            operand: operand.into(),
        }
    }

    pub fn column(&self) -> ColumnRef {
        self.column
    }

    pub fn condition(&self) -> PredicateCondition {
        self.condition
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[Predicate] {} {} {}",
            self.column, self.condition, self.operand
        )
    }
}
