use std::collections::HashMap;

use crate::cardinality::{Cardinality, CardinalityEstimator};
use crate::error::OptResult;
use crate::expr::{ColumnRef, Operand};
use crate::join_ordering::{
    find_vertex_of_column, JoinPlanAtomicPredicate, JoinPlanPredicate, JoinPlanPredicateRef,
    LogicalPredicateOperator, VertexSet,
};
use crate::plan::PlanNodeRef;
use crate::stat::{default_selectivity, derive_statistics, ColumnStatistics, DEFAULT_DISJUNCTION_SELECTIVITY};

/// Estimation progress: vertices are joined one by one as predicates need them.
#[derive(Clone, Debug)]
struct EstimationState {
    cardinality: Cardinality,
    columns: HashMap<ColumnRef, Option<ColumnStatistics>>,
    not_joined: VertexSet,
}

/// Estimates cardinalities from the statistics of the vertices' columns.
///
/// Vertices are joined lazily, so a predicate is estimated against the product of only the vertices
/// seen so far instead of the full cartesian product.
#[derive(Clone, Debug)]
pub struct CardinalityEstimatorColumnStatistics {
    penalty: f64,
}

impl Default for CardinalityEstimatorColumnStatistics {
    fn default() -> Self {
        Self { penalty: 1.0 }
    }
}

impl CardinalityEstimatorColumnStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Multiplies every estimate by `penalty`.
    pub fn with_penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    /// Estimated row count and the statistics of all columns of `vertices` after applying `predicates`.
    pub fn estimate_statistics(
        &self,
        vertices: &[PlanNodeRef],
        predicates: &[JoinPlanPredicateRef],
    ) -> OptResult<(Cardinality, HashMap<ColumnRef, Option<ColumnStatistics>>)> {
        if vertices.is_empty() {
            return Ok((0.0, HashMap::new()));
        }

        let mut state = EstimationState {
            cardinality: 1.0,
            columns: HashMap::new(),
            not_joined: VertexSet::first_n(vertices.len()),
        };
        join_vertex(vertices, 0, &mut state)?;

        for predicate in predicates {
            apply_predicate(vertices, predicate, &mut state)?;
        }
        for vertex in state.not_joined.iter().collect::<Vec<_>>() {
            join_vertex(vertices, vertex, &mut state)?;
        }

        Ok((state.cardinality * self.penalty, state.columns))
    }
}

impl CardinalityEstimator for CardinalityEstimatorColumnStatistics {
    fn estimate(
        &self,
        vertices: &[PlanNodeRef],
        predicates: &[JoinPlanPredicateRef],
    ) -> OptResult<Cardinality> {
        Ok(self.estimate_statistics(vertices, predicates)?.0)
    }
}

fn join_vertex(vertices: &[PlanNodeRef], idx: usize, state: &mut EstimationState) -> OptResult<()> {
    let vertex = &vertices[idx];
    let statistics = derive_statistics(vertex)?;
    state.cardinality *= statistics.row_count();
    for (pos, column) in vertex.output_column_references().into_iter().enumerate() {
        let column_statistics = statistics.column_statistics().get(pos).copied().flatten();
        state.columns.insert(column, column_statistics);
    }
    state.not_joined.remove(idx);
    Ok(())
}

/// Joins the vertex producing `column` if it isn't joined yet.
fn require_column(
    vertices: &[PlanNodeRef],
    column: &ColumnRef,
    state: &mut EstimationState,
) -> OptResult<()> {
    let vertex = find_vertex_of_column(vertices, column)?;
    if state.not_joined.contains(vertex) {
        join_vertex(vertices, vertex, state)?;
    }
    Ok(())
}

fn apply_predicate(
    vertices: &[PlanNodeRef],
    predicate: &JoinPlanPredicate,
    state: &mut EstimationState,
) -> OptResult<()> {
    match predicate {
        JoinPlanPredicate::Atomic(atomic) => apply_atomic_predicate(vertices, atomic, state),
        JoinPlanPredicate::Logical(logical) => match logical.operator() {
            LogicalPredicateOperator::And => {
                apply_predicate(vertices, logical.left(), state)?;
                apply_predicate(vertices, logical.right(), state)
            }
            LogicalPredicateOperator::Or => {
                let mut left = state.clone();
                apply_predicate(vertices, logical.left(), &mut left)?;
                let mut right = state.clone();
                apply_predicate(vertices, logical.right(), &mut right)?;

                state.cardinality =
                    left.cardinality + right.cardinality * DEFAULT_DISJUNCTION_SELECTIVITY;
                state.not_joined = left.not_joined & right.not_joined;
                state.columns = left.columns;
                // A vertex joined only by the right branch still contributes its columns.
                for (column, statistics) in right.columns {
                    state.columns.entry(column).or_insert(statistics);
                }
                cap_distinct_counts(state);
                Ok(())
            }
        },
    }
}

fn apply_atomic_predicate(
    vertices: &[PlanNodeRef],
    predicate: &JoinPlanAtomicPredicate,
    state: &mut EstimationState,
) -> OptResult<()> {
    let left_column = predicate.left_operand();
    require_column(vertices, &left_column, state)?;
    if let Operand::Column(right_column) = predicate.right_operand() {
        require_column(vertices, right_column, state)?;
    }

    let condition = predicate.condition();
    let left = state.columns.get(&left_column).copied().flatten();
    let selectivity = match (left, predicate.right_operand()) {
        (Some(left), Operand::Value(value)) => {
            let estimate = left.estimate_predicate_with_value(condition, value);
            state.columns.insert(left_column, Some(estimate.column));
            estimate.selectivity
        }
        (Some(left), Operand::Column(right_column)) if *right_column != left_column => {
            match state.columns.get(right_column).copied().flatten() {
                Some(right) => {
                    let estimate = left.estimate_predicate_with_column(condition, &right);
                    state.columns.insert(left_column, Some(estimate.left));
                    state.columns.insert(*right_column, Some(estimate.right));
                    estimate.selectivity
                }
                None => default_selectivity(condition),
            }
        }
        _ => default_selectivity(condition),
    };

    state.cardinality *= selectivity;
    cap_distinct_counts(state);
    Ok(())
}

fn cap_distinct_counts(state: &mut EstimationState) {
    let cardinality = state.cardinality;
    for column in state.columns.values_mut().flatten() {
        column.cap_distinct_count(cardinality);
    }
}
