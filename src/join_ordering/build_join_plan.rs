use itertools::Itertools;
use log::trace;
use ordered_float::OrderedFloat;

use crate::cardinality::CardinalityEstimator;
use crate::cost::{Cost, CostModel, JoinPlanCostFeatureProxy, OperatorType};
use crate::error::{OptResult, OptimizerError};
use crate::expr::{Operand, PredicateCondition};
use crate::join_ordering::{
    BaseJoinGraph, JoinPlanAtomicPredicate, JoinPlanNode, JoinPlanNodeRef, JoinPlanPredicate,
    JoinPlanPredicateRef, LogicalPredicateOperator,
};
use crate::plan::PlanNodeRef;

/// Plan scanning `vertex` and applying `predicates` in order.
pub fn build_join_plan_vertex_node(
    vertex: &PlanNodeRef,
    predicates: &[JoinPlanPredicateRef],
    cost_model: &dyn CostModel,
    estimator: &dyn CardinalityEstimator,
) -> OptResult<JoinPlanNodeRef> {
    let mut join_graph = BaseJoinGraph::from_vertex(vertex.clone());
    let mut node_cost = Cost::default();
    for predicate in predicates {
        let (graph, cost) = add_predicate(&join_graph, predicate, cost_model, estimator)?;
        join_graph = graph;
        node_cost += cost;
    }

    let output_row_count = estimator.estimate_join_graph(&join_graph)?;
    Ok(JoinPlanNode::new_vertex(
        vertex.clone(),
        predicates.to_vec(),
        join_graph,
        output_row_count,
        node_cost,
    ))
}

/// Plan joining `left` and `right`.
///
/// The first atomic predicate comparing a column of each side becomes the join condition, all other
/// predicates are applied after the join, most selective first.
pub fn build_join_plan_join_node(
    left: &JoinPlanNodeRef,
    right: &JoinPlanNodeRef,
    predicates: &[JoinPlanPredicateRef],
    cost_model: &dyn CostModel,
    estimator: &dyn CardinalityEstimator,
) -> OptResult<JoinPlanNodeRef> {
    let left_graph = left.join_graph();
    let right_graph = right.join_graph();

    let mut primary_predicate = None;
    let mut secondary_predicates = Vec::with_capacity(predicates.len());
    for predicate in predicates {
        if primary_predicate.is_none() {
            if let Some(primary) = as_primary_predicate(predicate, left_graph, right_graph) {
                primary_predicate = Some(primary);
                continue;
            }
        }
        secondary_predicates.push(predicate.clone());
    }

    let operator_type = match &primary_predicate {
        Some(p) if p.condition() == PredicateCondition::Equals => OperatorType::JoinHash,
        Some(_) => OperatorType::JoinSortMerge,
        None => OperatorType::Product,
    };
    let proxy = JoinPlanCostFeatureProxy::for_join(
        left_graph,
        right_graph,
        primary_predicate.as_ref(),
        estimator,
    )?;
    let mut node_cost = cost_model.estimate_cost(operator_type, &proxy)?;
    trace!(
        "{} of {} and {} costs {}",
        operator_type,
        left_graph,
        right_graph,
        node_cost
    );

    let mut join_graph = BaseJoinGraph::from_joined_graphs(left_graph, right_graph);
    if let Some(primary) = &primary_predicate {
        join_graph = join_graph.with_predicate(primary.clone().into());
    }

    let mut estimated = Vec::with_capacity(secondary_predicates.len());
    for predicate in secondary_predicates {
        let row_count = estimator.estimate_join_graph(&join_graph.with_predicate(predicate.clone()))?;
        estimated.push((OrderedFloat(row_count), predicate));
    }
    let secondary_predicates: Vec<JoinPlanPredicateRef> = estimated
        .into_iter()
        .sorted_by_key(|(row_count, _)| *row_count)
        .map(|(_, predicate)| predicate)
        .collect();

    for predicate in &secondary_predicates {
        let (graph, cost) = add_predicate(&join_graph, predicate, cost_model, estimator)?;
        join_graph = graph;
        node_cost += cost;
    }

    let output_row_count = estimator.estimate_join_graph(&join_graph)?;
    Ok(JoinPlanNode::new_join(
        left.clone(),
        right.clone(),
        primary_predicate,
        secondary_predicates,
        join_graph,
        output_row_count,
        node_cost,
    ))
}

/// `predicate` oriented so that its left operand is produced by `left` and its right operand by
/// `right`, `None` if it can't be a join condition between them.
fn as_primary_predicate(
    predicate: &JoinPlanPredicate,
    left: &BaseJoinGraph,
    right: &BaseJoinGraph,
) -> Option<JoinPlanAtomicPredicate> {
    let atomic = predicate.as_atomic()?;
    let right_column = match atomic.right_operand() {
        Operand::Column(c) => c,
        Operand::Value(_) => return None,
    };

    let left_column = atomic.left_operand();
    if left.find_vertex(&left_column).is_some() && right.find_vertex(right_column).is_some() {
        Some(atomic.clone())
    } else if right.find_vertex(&left_column).is_some() && left.find_vertex(right_column).is_some()
    {
        atomic.flipped()
    } else {
        None
    }
}

fn ensure_applicable(predicate: &JoinPlanPredicate, graph: &BaseJoinGraph) -> OptResult<()> {
    for column in predicate.column_references() {
        if graph.find_vertex(&column).is_none() {
            return Err(OptimizerError::PredicateNotApplicable(format!(
                "column {} of {} is not produced by {}",
                column, predicate, graph
            ))
            .into());
        }
    }
    Ok(())
}

/// Applies `predicate` on top of `graph`, returning the filtered graph and the cost of the filter.
fn add_predicate(
    graph: &BaseJoinGraph,
    predicate: &JoinPlanPredicateRef,
    cost_model: &dyn CostModel,
    estimator: &dyn CardinalityEstimator,
) -> OptResult<(BaseJoinGraph, Cost)> {
    ensure_applicable(predicate, graph)?;
    let output = graph.with_predicate(predicate.clone());

    let cost = match &**predicate {
        JoinPlanPredicate::Atomic(atomic) => {
            let proxy = JoinPlanCostFeatureProxy::for_table_scan(graph, atomic, estimator)?;
            cost_model.estimate_cost(OperatorType::TableScan, &proxy)?
        }
        JoinPlanPredicate::Logical(logical) => match logical.operator() {
            LogicalPredicateOperator::And => {
                let (left, left_cost) = add_predicate(graph, logical.left(), cost_model, estimator)?;
                let (_, right_cost) = add_predicate(&left, logical.right(), cost_model, estimator)?;
                left_cost + right_cost
            }
            LogicalPredicateOperator::Or => {
                let (left, left_cost) = add_predicate(graph, logical.left(), cost_model, estimator)?;
                let (right, right_cost) =
                    add_predicate(graph, logical.right(), cost_model, estimator)?;
                let proxy = JoinPlanCostFeatureProxy::for_union(&left, &right, &output, estimator)?;
                left_cost
                    + right_cost
                    + cost_model.estimate_cost(OperatorType::UnionPositions, &proxy)?
            }
        },
    };
    Ok((output, cost))
}
