use std::rc::Rc;

use anyhow::ensure;
use itertools::Itertools;
use log::trace;

use crate::cardinality::CardinalityEstimator;
use crate::cost::CostModel;
use crate::error::{OptResult, OptimizerError};
use crate::join_ordering::{
    build_join_plan_join_node, DpDriver, DpSubplanCache, DpSubplanCacheTopK, JoinGraph,
    JoinOrderingAlgorithm, JoinPlanNodeRef,
};

/// Like [`DpCcp`](crate::join_ordering::DpCcp), but keeps the `max_entry_count_per_set` cheapest plans
/// of every vertex set and combines all of them when joining two sets.
pub struct DpCcpTopK {
    max_entry_count_per_set: usize,
    cost_model: Rc<dyn CostModel>,
    estimator: Rc<dyn CardinalityEstimator>,
}

impl DpCcpTopK {
    pub fn new(
        max_entry_count_per_set: usize,
        cost_model: Rc<dyn CostModel>,
        estimator: Rc<dyn CardinalityEstimator>,
    ) -> OptResult<Self> {
        ensure!(
            max_entry_count_per_set > 0,
            "DpCcpTopK has to keep at least one plan per vertex set"
        );
        Ok(Self {
            max_entry_count_per_set,
            cost_model,
            estimator,
        })
    }

    /// Up to `max_entry_count_per_set` plans joining all vertices of `join_graph`, cheapest first.
    pub fn optimize_top_k(&self, join_graph: &JoinGraph) -> OptResult<Vec<JoinPlanNodeRef>> {
        let mut driver = DpDriver::new(
            join_graph,
            &*self.cost_model,
            &*self.estimator,
            DpSubplanCacheTopK::new(self.max_entry_count_per_set),
        );
        driver.seed_leaves()?;

        for (csg, cmp) in driver.enumerate()? {
            let left_plans = driver.cache().get_best_plans(csg);
            let right_plans = driver.cache().get_best_plans(cmp);
            if left_plans.is_empty() {
                return Err(OptimizerError::SubplanMissing(csg).into());
            }
            if right_plans.is_empty() {
                return Err(OptimizerError::SubplanMissing(cmp).into());
            }

            let predicates = join_graph.predicates_between(csg, cmp);
            for (left, right) in left_plans.iter().cartesian_product(right_plans.iter()) {
                let plan = build_join_plan_join_node(
                    left,
                    right,
                    &predicates,
                    driver.cost_model(),
                    driver.estimator(),
                )?;
                let flipped = build_join_plan_join_node(
                    right,
                    left,
                    &predicates,
                    driver.cost_model(),
                    driver.estimator(),
                )?;
                let cheaper = if flipped.plan_cost() < plan.plan_cost() {
                    flipped
                } else {
                    plan
                };
                trace!("Candidate for {}: {}", csg | cmp, cheaper);
                driver.cache_mut().cache_plan(csg | cmp, cheaper);
            }
        }

        driver.finish()?;
        Ok(driver.cache().get_best_plans(join_graph.all_vertices()))
    }
}

impl JoinOrderingAlgorithm for DpCcpTopK {
    fn name(&self) -> &str {
        "DpCcpTopK"
    }

    fn optimize(&self, join_graph: &JoinGraph) -> OptResult<JoinPlanNodeRef> {
        let plans = self.optimize_top_k(join_graph)?;
        plans
            .into_iter()
            .next()
            .ok_or_else(|| OptimizerError::NoPlanForVertexSet(join_graph.all_vertices()).into())
    }
}
