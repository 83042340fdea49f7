use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::error::{OptResult, OptimizerError};
use crate::expr::{ColumnRef, Operand, PredicateCondition};
use crate::join_ordering::VertexSet;
use crate::plan::PlanNodeRef;

pub type JoinPlanPredicateRef = Rc<JoinPlanPredicate>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalPredicateOperator {
    And,
    Or,
}

/// `left_operand <condition> right_operand`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinPlanAtomicPredicate {
    left_operand: ColumnRef,
    condition: PredicateCondition,
    right_operand: Operand,
}

impl JoinPlanAtomicPredicate {
    pub fn new<O: Into<Operand>>(
        left_operand: ColumnRef,
        condition: PredicateCondition,
        right_operand: O,
    ) -> Self {
        Self {
            left_operand,
            condition,
            right_operand: right_operand.into(),
        }
    }

    pub fn left_operand(&self) -> ColumnRef {
        self.left_operand
    }

    pub fn condition(&self) -> PredicateCondition {
        self.condition
    }

    pub fn right_operand(&self) -> &Operand {
        &self.right_operand
    }

    /// Swaps both column operands, `None` if the right operand is a value or the condition can't be
    /// flipped.
    pub fn flipped(&self) -> Option<Self> {
        let right = *self.right_operand.as_column()?;
        Some(Self {
            left_operand: right,
            condition: self.condition.flip()?,
            right_operand: Operand::Column(self.left_operand),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinPlanLogicalPredicate {
    operator: LogicalPredicateOperator,
    left: JoinPlanPredicateRef,
    right: JoinPlanPredicateRef,
}

impl JoinPlanLogicalPredicate {
    pub fn operator(&self) -> LogicalPredicateOperator {
        self.operator
    }

    pub fn left(&self) -> &JoinPlanPredicateRef {
        &self.left
    }

    pub fn right(&self) -> &JoinPlanPredicateRef {
        &self.right
    }
}

/// Predicate as seen by join ordering, shared between all candidate plans that apply it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JoinPlanPredicate {
    Atomic(JoinPlanAtomicPredicate),
    Logical(JoinPlanLogicalPredicate),
}

impl JoinPlanPredicate {
    pub fn atomic<O: Into<Operand>>(
        left_operand: ColumnRef,
        condition: PredicateCondition,
        right_operand: O,
    ) -> JoinPlanPredicateRef {
        Rc::new(JoinPlanPredicate::Atomic(JoinPlanAtomicPredicate::new(
            left_operand,
            condition,
            right_operand,
        )))
    }

    pub fn logical(
        operator: LogicalPredicateOperator,
        left: JoinPlanPredicateRef,
        right: JoinPlanPredicateRef,
    ) -> JoinPlanPredicateRef {
        Rc::new(JoinPlanPredicate::Logical(JoinPlanLogicalPredicate {
            operator,
            left,
            right,
        }))
    }

    pub fn and(left: JoinPlanPredicateRef, right: JoinPlanPredicateRef) -> JoinPlanPredicateRef {
        Self::logical(LogicalPredicateOperator::And, left, right)
    }

    pub fn or(left: JoinPlanPredicateRef, right: JoinPlanPredicateRef) -> JoinPlanPredicateRef {
        Self::logical(LogicalPredicateOperator::Or, left, right)
    }

    pub fn as_atomic(&self) -> Option<&JoinPlanAtomicPredicate> {
        match self {
            JoinPlanPredicate::Atomic(a) => Some(a),
            JoinPlanPredicate::Logical(_) => None,
        }
    }

    /// Every column the predicate reads, in left to right order.
    pub fn column_references(&self) -> Vec<ColumnRef> {
        let mut columns = vec![];
        self.collect_column_references(&mut columns);
        columns
    }

    fn collect_column_references(&self, columns: &mut Vec<ColumnRef>) {
        match self {
            JoinPlanPredicate::Atomic(a) => {
                columns.push(a.left_operand);
                if let Operand::Column(c) = &a.right_operand {
                    columns.push(*c);
                }
            }
            JoinPlanPredicate::Logical(l) => {
                l.left.collect_column_references(columns);
                l.right.collect_column_references(columns);
            }
        }
    }

    /// Vertices whose columns the predicate reads.
    pub fn accessed_vertex_set(&self, vertices: &[PlanNodeRef]) -> OptResult<VertexSet> {
        let mut vertex_set = VertexSet::empty();
        for column in self.column_references() {
            vertex_set.insert(find_vertex_of_column(vertices, &column)?);
        }
        Ok(vertex_set)
    }
}

impl From<JoinPlanAtomicPredicate> for JoinPlanPredicateRef {
    fn from(predicate: JoinPlanAtomicPredicate) -> Self {
        Rc::new(JoinPlanPredicate::Atomic(predicate))
    }
}

/// Position of the vertex producing `column`.
pub fn find_vertex_of_column(vertices: &[PlanNodeRef], column: &ColumnRef) -> OptResult<usize> {
    vertices
        .iter()
        .position(|v| v.find_output_column_id(column).is_some())
        .ok_or_else(|| OptimizerError::ColumnNotFound(*column).into())
}

impl Display for JoinPlanPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinPlanPredicate::Atomic(a) => write!(
                f,
                "{} {} {}",
                a.left_operand, a.condition, a.right_operand
            ),
            JoinPlanPredicate::Logical(l) => {
                let operator = match l.operator {
                    LogicalPredicateOperator::And => "AND",
                    LogicalPredicateOperator::Or => "OR",
                };
                write!(f, "({} {} {})", l.left, operator, l.right)
            }
        }
    }
}
