use std::rc::Rc;

use anyhow::ensure;
use log::{debug, trace};
use strum_macros::Display as StrumDisplay;

use crate::cardinality::CardinalityEstimator;
use crate::cost::CostModel;
use crate::error::{OptResult, OptimizerError};
use crate::join_ordering::{
    build_join_plan_join_node, build_join_plan_vertex_node, DpSubplanCache, DpSubplanCacheBest,
    EnumerateCcp, JoinGraph, JoinPlanNodeRef, VertexSet,
};

/// Finds a join order for a join graph.
pub trait JoinOrderingAlgorithm {
    fn name(&self) -> &str;

    /// Cheapest plan joining all vertices of `join_graph`.
    fn optimize(&self, join_graph: &JoinGraph) -> OptResult<JoinPlanNodeRef>;
}

/// Progress of a dynamic programming run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, StrumDisplay)]
pub enum DpState {
    Uninitialized,
    SeededLeaves,
    Enumerating,
    Done,
}

/// State shared by the dynamic programming join ordering algorithms: the join graph, the subplan cache
/// and the progress of the run.
pub(crate) struct DpDriver<'a, C> {
    join_graph: &'a JoinGraph,
    cost_model: &'a dyn CostModel,
    estimator: &'a dyn CardinalityEstimator,
    cache: C,
    state: DpState,
}

impl<'a, C: DpSubplanCache> DpDriver<'a, C> {
    pub(crate) fn new(
        join_graph: &'a JoinGraph,
        cost_model: &'a dyn CostModel,
        estimator: &'a dyn CardinalityEstimator,
        cache: C,
    ) -> Self {
        Self {
            join_graph,
            cost_model,
            estimator,
            cache,
            state: DpState::Uninitialized,
        }
    }

    fn transition(&mut self, from: DpState, to: DpState) -> OptResult<()> {
        ensure!(
            self.state == from,
            "Join ordering can't move from {} to {}, expected state {}",
            self.state,
            to,
            from
        );
        trace!("Join ordering state {} -> {}", from, to);
        self.state = to;
        Ok(())
    }

    pub(crate) fn cost_model(&self) -> &'a dyn CostModel {
        self.cost_model
    }

    pub(crate) fn estimator(&self) -> &'a dyn CardinalityEstimator {
        self.estimator
    }

    pub(crate) fn cache(&self) -> &C {
        &self.cache
    }

    pub(crate) fn cache_mut(&mut self) -> &mut C {
        &mut self.cache
    }

    /// Caches a plan for each single vertex with its local predicates.
    pub(crate) fn seed_leaves(&mut self) -> OptResult<()> {
        self.transition(DpState::Uninitialized, DpState::SeededLeaves)?;
        for (idx, vertex) in self.join_graph.vertices().iter().enumerate() {
            let predicates = self.join_graph.local_predicates(idx);
            let plan =
                build_join_plan_vertex_node(vertex, &predicates, self.cost_model, self.estimator)?;
            trace!("Leaf {}: {}", idx, plan);
            self.cache.cache_plan(VertexSet::single(idx), plan);
        }
        Ok(())
    }

    /// Csg-cmp pairs of the join graph in bottom up order.
    pub(crate) fn enumerate(&mut self) -> OptResult<Vec<(VertexSet, VertexSet)>> {
        self.transition(DpState::SeededLeaves, DpState::Enumerating)?;
        let pairs = EnumerateCcp::new(
            self.join_graph.vertices().len(),
            &self.join_graph.pairwise_edges(),
        )?
        .enumerate();
        debug!(
            "Join ordering {} vertices with {} csg-cmp pairs",
            self.join_graph.vertices().len(),
            pairs.len()
        );
        Ok(pairs)
    }

    /// Best plan of a vertex set that must have been built already.
    pub(crate) fn subplan(&self, vertex_set: VertexSet) -> OptResult<JoinPlanNodeRef> {
        self.cache
            .get_best_plan(vertex_set)
            .ok_or_else(|| OptimizerError::SubplanMissing(vertex_set).into())
    }

    /// Ends enumeration, returning the cheapest plan joining all vertices.
    pub(crate) fn finish(&mut self) -> OptResult<JoinPlanNodeRef> {
        self.transition(DpState::Enumerating, DpState::Done)?;
        let all_vertices = self.join_graph.all_vertices();
        let plan = self
            .cache
            .get_best_plan(all_vertices)
            .ok_or(OptimizerError::NoPlanForVertexSet(all_vertices))?;
        debug!("Best join plan costs {}: {}", plan.plan_cost(), plan.description());
        Ok(plan)
    }
}

/// Dynamic programming over connected subgraph complement pairs, keeping the single cheapest plan of
/// every vertex set.
pub struct DpCcp {
    cost_model: Rc<dyn CostModel>,
    estimator: Rc<dyn CardinalityEstimator>,
}

impl DpCcp {
    pub fn new(cost_model: Rc<dyn CostModel>, estimator: Rc<dyn CardinalityEstimator>) -> Self {
        Self {
            cost_model,
            estimator,
        }
    }
}

impl JoinOrderingAlgorithm for DpCcp {
    fn name(&self) -> &str {
        "DpCcp"
    }

    fn optimize(&self, join_graph: &JoinGraph) -> OptResult<JoinPlanNodeRef> {
        let mut driver = DpDriver::new(
            join_graph,
            &*self.cost_model,
            &*self.estimator,
            DpSubplanCacheBest::new(),
        );
        driver.seed_leaves()?;

        for (csg, cmp) in driver.enumerate()? {
            let left = driver.subplan(csg)?;
            let right = driver.subplan(cmp)?;
            let predicates = join_graph.predicates_between(csg, cmp);
            for (l, r) in [(&left, &right), (&right, &left)] {
                let plan = build_join_plan_join_node(
                    l,
                    r,
                    &predicates,
                    driver.cost_model(),
                    driver.estimator(),
                )?;
                trace!("Candidate for {}: {}", csg | cmp, plan);
                driver.cache_mut().cache_plan(csg | cmp, plan);
            }
        }

        driver.finish()
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::cardinality::CardinalityEstimatorColumnStatistics;
    use crate::cost::{Cost, CostModelNaive};
    use crate::expr::{ColumnRef, DataType, PredicateCondition};
    use crate::join_ordering::{JoinEdge, JoinPlanNodeKind, JoinPlanPredicate};
    use crate::operator::{ColumnDefinition, TableScan};
    use crate::plan::{LogicalPlanBuilder, PlanNodeRef};
    use crate::stat::{ColumnStatistics, TableStatistics};

    fn table(name: &str, row_count: f64) -> PlanNodeRef {
        LogicalPlanBuilder::scan(
            TableScan::new(name, vec![ColumnDefinition::new("a", DataType::Int)]).with_statistics(
                TableStatistics::stored(
                    row_count,
                    vec![ColumnStatistics::numeric(DataType::Int, 10.0, 1.0, 10.0)],
                ),
            ),
        )
        .node()
    }

    fn equals(left: &PlanNodeRef, right: &PlanNodeRef) -> crate::join_ordering::JoinPlanPredicateRef {
        JoinPlanPredicate::atomic(
            ColumnRef::new(left.id(), 0),
            PredicateCondition::Equals,
            ColumnRef::new(right.id(), 0),
        )
    }

    fn dp_ccp() -> DpCcp {
        DpCcp::new(
            Rc::new(CostModelNaive),
            Rc::new(CardinalityEstimatorColumnStatistics::new()),
        )
    }

    fn join_count(plan: &JoinPlanNodeRef) -> usize {
        match plan.kind() {
            JoinPlanNodeKind::Vertex(_) => 0,
            JoinPlanNodeKind::Join(join) => 1 + join_count(join.left()) + join_count(join.right()),
        }
    }

    /// Cheapest left deep plan over orders whose prefixes are all connected.
    fn best_left_deep_cost(join_graph: &JoinGraph) -> Cost {
        let cost_model = CostModelNaive;
        let estimator = CardinalityEstimatorColumnStatistics::new();
        let leaves: Vec<_> = join_graph
            .vertices()
            .iter()
            .enumerate()
            .map(|(idx, v)| {
                build_join_plan_vertex_node(v, &join_graph.local_predicates(idx), &cost_model, &estimator)
                    .unwrap()
            })
            .collect();

        let mut best: Option<Cost> = None;
        for order in (0..leaves.len()).permutations(leaves.len()) {
            let mut plan = leaves[order[0]].clone();
            let mut joined = VertexSet::single(order[0]);
            let mut connected = true;
            for &vertex in &order[1..] {
                let predicates = join_graph.predicates_between(joined, VertexSet::single(vertex));
                if predicates.is_empty() {
                    connected = false;
                    break;
                }
                plan = build_join_plan_join_node(
                    &plan,
                    &leaves[vertex],
                    &predicates,
                    &cost_model,
                    &estimator,
                )
                .unwrap();
                joined.insert(vertex);
            }
            if connected && best.map_or(true, |b| plan.plan_cost() < b) {
                best = Some(plan.plan_cost());
            }
        }
        best.unwrap()
    }

    #[test]
    fn test_star_with_uniform_tables() {
        let center = table("c", 10.0);
        let others: Vec<_> = ["a", "b", "d"].iter().map(|n| table(n, 10.0)).collect();
        let mut vertices = vec![center.clone()];
        vertices.extend(others.iter().cloned());
        let predicates = others.iter().map(|o| equals(&center, o)).collect();
        let join_graph = JoinGraph::from_predicates(vertices, predicates, vec![]).unwrap();

        let plan = dp_ccp().optimize(&join_graph).unwrap();
        // Each join keeps 10 rows and costs 1.2 * 10.
        assert!((plan.plan_cost().value() - 36.0).abs() < 1e-9);
        assert_eq!(3, join_count(&plan));
        assert_eq!(3, plan.join_graph().predicates().len());
        assert_eq!(4, plan.join_graph().vertices().len());
    }

    #[test]
    fn test_star_is_optimal() {
        let center = table("c", 100.0);
        let others: Vec<_> = [("a", 5.0), ("b", 2000.0), ("d", 40.0)]
            .iter()
            .map(|(n, r)| table(n, *r))
            .collect();
        let mut vertices = vec![center.clone()];
        vertices.extend(others.iter().cloned());
        let predicates = others.iter().map(|o| equals(&center, o)).collect();
        let join_graph = JoinGraph::from_predicates(vertices, predicates, vec![]).unwrap();

        let plan = dp_ccp().optimize(&join_graph).unwrap();
        let left_deep = best_left_deep_cost(&join_graph);
        assert!(plan.plan_cost().value() <= left_deep.value() + 1e-9);
        assert_eq!(3, join_count(&plan));
    }

    #[test]
    fn test_chain_is_optimal() {
        let tables: Vec<_> = [("a", 1000.0), ("b", 10.0), ("c", 500.0), ("d", 20.0), ("e", 300.0)]
            .iter()
            .map(|(n, r)| table(n, *r))
            .collect();
        let predicates = tables.iter().tuple_windows().map(|(l, r)| equals(l, r)).collect();
        let join_graph = JoinGraph::from_predicates(tables, predicates, vec![]).unwrap();

        let plan = dp_ccp().optimize(&join_graph).unwrap();
        assert!(plan.plan_cost().value() <= best_left_deep_cost(&join_graph).value() + 1e-9);
        assert_eq!(4, join_count(&plan));
    }

    #[test]
    fn test_single_vertex() {
        let x = table("x", 10.0);
        let join_graph = JoinGraph::new(vec![x.clone()], vec![], vec![]).unwrap();
        let plan = dp_ccp().optimize(&join_graph).unwrap();
        assert_eq!(x.id(), plan.kind().as_vertex().unwrap().vertex().id());
    }

    #[test]
    fn test_disconnected_graph() {
        let x = table("x", 10.0);
        let y = table("y", 10.0);
        let join_graph = JoinGraph::new(vec![x, y], vec![], vec![]).unwrap();
        let error = dp_ccp().optimize(&join_graph).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<OptimizerError>(),
            Some(OptimizerError::NoPlanForVertexSet(_))
        ));

        // Predicate-less edges allow cross products.
        let x = table("x", 10.0);
        let y = table("y", 10.0);
        let join_graph = JoinGraph::new(
            vec![x, y],
            vec![JoinEdge::new(VertexSet::from_bits(0b11), vec![])],
            vec![],
        )
        .unwrap();
        let plan = dp_ccp().optimize(&join_graph).unwrap();
        assert!(plan.kind().as_join().unwrap().primary_predicate().is_none());
        assert_eq!(100.0, plan.output_row_count());
    }

    #[test]
    fn test_state_transitions() {
        let join_graph = JoinGraph::new(vec![table("x", 1.0)], vec![], vec![]).unwrap();
        let estimator = CardinalityEstimatorColumnStatistics::new();
        let mut driver =
            DpDriver::new(&join_graph, &CostModelNaive, &estimator, DpSubplanCacheBest::new());
        assert!(driver.enumerate().is_err());
        driver.seed_leaves().unwrap();
        assert!(driver.seed_leaves().is_err());
        assert!(driver.enumerate().unwrap().is_empty());
        assert!(driver.subplan(VertexSet::single(0)).is_ok());
        assert!(driver.subplan(VertexSet::from_bits(0b11)).is_err());
        driver.finish().unwrap();
    }
}
