use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{OptResult, OptimizerError};
use crate::expr::{ColumnRef, Operand, PredicateCondition, Value};
use crate::join_ordering::{JoinPlanPredicate, JoinPlanPredicateRef, LogicalPredicateOperator};
use crate::plan::{PlanNodeId, PlanNodeRef};

/// The vertices and predicates making up a (sub) join graph.
///
/// Equality ignores the order of vertices and predicates.
#[derive(Clone, Debug, Default)]
pub struct BaseJoinGraph {
    vertices: Vec<PlanNodeRef>,
    predicates: Vec<JoinPlanPredicateRef>,
}

impl BaseJoinGraph {
    pub fn new(vertices: Vec<PlanNodeRef>, predicates: Vec<JoinPlanPredicateRef>) -> Self {
        Self {
            vertices,
            predicates,
        }
    }

    pub fn from_vertex(vertex: PlanNodeRef) -> Self {
        Self::new(vec![vertex], vec![])
    }

    /// Union of two graphs over disjoint vertex sets.
    pub fn from_joined_graphs(left: &BaseJoinGraph, right: &BaseJoinGraph) -> Self {
        let mut vertices = left.vertices.clone();
        vertices.extend(right.vertices.iter().cloned());
        let mut predicates = left.predicates.clone();
        predicates.extend(right.predicates.iter().cloned());
        Self::new(vertices, predicates)
    }

    pub fn with_predicate(&self, predicate: JoinPlanPredicateRef) -> Self {
        let mut graph = self.clone();
        graph.predicates.push(predicate);
        graph
    }

    pub fn vertices(&self) -> &[PlanNodeRef] {
        &self.vertices
    }

    pub fn predicates(&self) -> &[JoinPlanPredicateRef] {
        &self.predicates
    }

    /// The vertex producing `column`, if it is part of this graph.
    pub fn find_vertex(&self, column: &ColumnRef) -> Option<&PlanNodeRef> {
        self.vertices
            .iter()
            .find(|v| v.find_output_column_id(column).is_some())
    }

    fn sorted_vertex_ids(&self) -> Vec<PlanNodeId> {
        self.vertices.iter().map(|v| v.id()).sorted().collect()
    }

    fn sorted_predicates(&self) -> Vec<&JoinPlanPredicate> {
        self.predicates.iter().map(|p| &**p).sorted().collect()
    }

    /// Process independent key identifying this graph, used by the cardinality cache.
    pub fn normalize(&self) -> OptResult<JoinGraphKey> {
        let vertices = self
            .vertices
            .iter()
            .map(|v| v.description())
            .sorted()
            .collect();
        let predicates = self
            .predicates
            .iter()
            .map(|p| self.normalize_predicate(p))
            .collect::<OptResult<Vec<_>>>()?
            .into_iter()
            .sorted()
            .collect();

        Ok(JoinGraphKey {
            vertices,
            predicates,
        })
    }

    fn column_key(&self, column: &ColumnRef) -> OptResult<ColumnKey> {
        let vertex = self
            .find_vertex(column)
            .ok_or(OptimizerError::ColumnNotFound(*column))?;
        let column_name = vertex
            .describe_column(column)
            .ok_or(OptimizerError::ColumnNotFound(*column))?;
        Ok(ColumnKey {
            vertex: vertex.description(),
            column: column_name,
        })
    }

    fn normalize_predicate(&self, predicate: &JoinPlanPredicate) -> OptResult<PredicateKey> {
        match predicate {
            JoinPlanPredicate::Atomic(a) => {
                let left = self.column_key(&a.left_operand())?;
                let right = match a.right_operand() {
                    Operand::Column(c) => OperandKey::Column(self.column_key(c)?),
                    Operand::Value(v) => OperandKey::Value(v.clone()),
                };
                let mut condition = a.condition();

                let (left, right) = match right {
                    OperandKey::Column(right) if right < left => match condition.flip() {
                        Some(flipped) => {
                            condition = flipped;
                            (right, OperandKey::Column(left))
                        }
                        None => (left, OperandKey::Column(right)),
                    },
                    right => (left, right),
                };
                Ok(PredicateKey::Atomic {
                    left,
                    condition,
                    right,
                })
            }
            JoinPlanPredicate::Logical(l) => {
                let left = self.normalize_predicate(l.left())?;
                let right = self.normalize_predicate(l.right())?;
                let (left, right) = if right < left {
                    (right, left)
                } else {
                    (left, right)
                };
                Ok(PredicateKey::Logical {
                    operator: l.operator().into(),
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
        }
    }
}

impl PartialEq for BaseJoinGraph {
    fn eq(&self, other: &Self) -> bool {
        self.sorted_vertex_ids() == other.sorted_vertex_ids()
            && self.sorted_predicates() == other.sorted_predicates()
    }
}

impl Eq for BaseJoinGraph {}

impl Hash for BaseJoinGraph {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sorted_vertex_ids().hash(state);
        self.sorted_predicates().hash(state);
    }
}

impl Display for BaseJoinGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let vertices = self.vertices.iter().map(|v| format!("#{}", v.id())).join(", ");
        let predicates = self.predicates.iter().join(", ");
        write!(f, "[{}] [{}]", vertices, predicates)
    }
}

/// A column named by the vertex producing it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnKey {
    pub vertex: String,
    pub column: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperandKey {
    Column(ColumnKey),
    Value(Value),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogicalOperatorKey {
    And,
    Or,
}

impl From<LogicalPredicateOperator> for LogicalOperatorKey {
    fn from(operator: LogicalPredicateOperator) -> Self {
        match operator {
            LogicalPredicateOperator::And => LogicalOperatorKey::And,
            LogicalPredicateOperator::Or => LogicalOperatorKey::Or,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PredicateKey {
    Atomic {
        left: ColumnKey,
        condition: PredicateCondition,
        right: OperandKey,
    },
    Logical {
        operator: LogicalOperatorKey,
        left: Box<PredicateKey>,
        right: Box<PredicateKey>,
    },
}

/// Normalized form of a `BaseJoinGraph`.
///
/// Vertices and predicates are sorted, column comparisons have the smaller column on the left and the
/// operands of `AND`/`OR` are sorted, so equivalent graphs built in any order share one key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JoinGraphKey {
    pub vertices: Vec<String>,
    pub predicates: Vec<PredicateKey>,
}

impl Display for ColumnKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column)
    }
}

impl Display for PredicateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PredicateKey::Atomic {
                left,
                condition,
                right,
            } => match right {
                OperandKey::Column(c) => write!(f, "{} {} {}", left, condition, c),
                OperandKey::Value(v) => write!(f, "{} {} {}", left, condition, v),
            },
            PredicateKey::Logical {
                operator,
                left,
                right,
            } => write!(f, "({} {:?} {})", left, operator, right),
        }
    }
}

impl Display for JoinGraphKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] [{}]",
            self.vertices.join(", "),
            self.predicates.iter().join(", ")
        )
    }
}
