use std::cell::RefCell;
use std::rc::Rc;

use crate::cardinality::{Cardinality, CardinalityEstimationCache, CardinalityEstimator};
use crate::error::OptResult;
use crate::join_ordering::{BaseJoinGraph, JoinPlanPredicateRef};
use crate::plan::PlanNodeRef;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CacheMode {
    ReadAndUpdate,
    ReadOnly,
}

/// Looks estimates up in a [`CardinalityEstimationCache`] before asking a fallback estimator.
pub struct CardinalityEstimatorCached {
    cache: Rc<RefCell<CardinalityEstimationCache>>,
    mode: CacheMode,
    fallback: Rc<dyn CardinalityEstimator>,
}

impl CardinalityEstimatorCached {
    pub fn new(
        cache: Rc<RefCell<CardinalityEstimationCache>>,
        mode: CacheMode,
        fallback: Rc<dyn CardinalityEstimator>,
    ) -> Self {
        Self {
            cache,
            mode,
            fallback,
        }
    }

    pub fn cache(&self) -> &Rc<RefCell<CardinalityEstimationCache>> {
        &self.cache
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }
}

impl CardinalityEstimator for CardinalityEstimatorCached {
    fn estimate(
        &self,
        vertices: &[PlanNodeRef],
        predicates: &[JoinPlanPredicateRef],
    ) -> OptResult<Cardinality> {
        self.estimate_join_graph(&BaseJoinGraph::new(vertices.to_vec(), predicates.to_vec()))
    }

    fn estimate_join_graph(&self, join_graph: &BaseJoinGraph) -> OptResult<Cardinality> {
        let key = join_graph.normalize()?;
        if let Some(cardinality) = self.cache.borrow_mut().get(&key) {
            return Ok(cardinality);
        }

        // The fallback may share the cache, so it must not be borrowed here.
        let cardinality = self.fallback.estimate_join_graph(join_graph)?;
        if self.mode == CacheMode::ReadAndUpdate {
            self.cache.borrow_mut().put(key, cardinality);
        }
        Ok(cardinality)
    }
}
