//! Logical operators of the plan DAG the join ordering core reads and rewrites.

use std::fmt::{Display, Formatter};

use enum_as_inner::EnumAsInner;
use strum_macros::Display as StrumDisplay;

mod join;
pub use join::*;
mod limit;
pub use limit::*;
mod predicate;
pub use predicate::*;
mod table_scan;
pub use table_scan::*;
mod union;
pub use union::*;

/// Logical relational operator.
#[derive(Clone, Debug, PartialEq, EnumAsInner)]
pub enum LogicalOperator {
    TableScan(TableScan),
    Predicate(Predicate),
    Join(Join),
    Union(Union),
    Limit(Limit),
}

impl LogicalOperator {
    /// Operators the join graph builder dissolves into vertices and predicates.
    pub fn is_join_graph_node(&self) -> bool {
        matches!(
            self,
            LogicalOperator::Predicate(_) | LogicalOperator::Join(_) | LogicalOperator::Union(_)
        )
    }
}

impl Display for LogicalOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalOperator::TableScan(t) => write!(f, "{}", t),
            LogicalOperator::Predicate(p) => write!(f, "{}", p),
            LogicalOperator::Join(j) => write!(f, "{}", j),
            LogicalOperator::Union(u) => write!(f, "{}", u),
            LogicalOperator::Limit(l) => write!(f, "{}", l),
        }
    }
}

/// Position of an input of a plan node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, StrumDisplay)]
pub enum InputSide {
    Left,
    Right,
}

impl InputSide {
    pub fn index(self) -> usize {
        match self {
            InputSide::Left => 0,
            InputSide::Right => 1,
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(InputSide::Left),
            1 => Some(InputSide::Right),
            _ => None,
        }
    }
}
