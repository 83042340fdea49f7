use std::collections::{BTreeMap, HashMap};

use ordered_float::OrderedFloat;

use crate::join_ordering::{JoinPlanNodeId, JoinPlanNodeRef, VertexSet};

/// Memo table of dynamic programming join ordering, keyed by the vertices a plan covers.
pub trait DpSubplanCache {
    fn cache_plan(&mut self, vertex_set: VertexSet, plan: JoinPlanNodeRef);

    fn get_best_plan(&self, vertex_set: VertexSet) -> Option<JoinPlanNodeRef>;

    fn clear(&mut self);
}

/// Keeps the cheapest plan per vertex set.
#[derive(Default)]
pub struct DpSubplanCacheBest {
    plans: HashMap<VertexSet, JoinPlanNodeRef>,
}

impl DpSubplanCacheBest {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DpSubplanCache for DpSubplanCacheBest {
    /// Replaces the cached plan only if `plan` is strictly cheaper, the first of equally cheap plans
    /// wins.
    fn cache_plan(&mut self, vertex_set: VertexSet, plan: JoinPlanNodeRef) {
        match self.plans.get(&vertex_set) {
            Some(cached) if cached.plan_cost() <= plan.plan_cost() => {}
            _ => {
                self.plans.insert(vertex_set, plan);
            }
        }
    }

    fn get_best_plan(&self, vertex_set: VertexSet) -> Option<JoinPlanNodeRef> {
        self.plans.get(&vertex_set).cloned()
    }

    fn clear(&mut self) {
        self.plans.clear();
    }
}

type TopKKey = (OrderedFloat<f64>, JoinPlanNodeId);

/// Keeps the `max_entry_count_per_set` cheapest plans per vertex set, ties ordered by plan id.
pub struct DpSubplanCacheTopK {
    max_entry_count_per_set: usize,
    plans: HashMap<VertexSet, BTreeMap<TopKKey, JoinPlanNodeRef>>,
}

impl DpSubplanCacheTopK {
    pub fn new(max_entry_count_per_set: usize) -> Self {
        Self {
            max_entry_count_per_set,
            plans: HashMap::new(),
        }
    }

    pub fn max_entry_count_per_set(&self) -> usize {
        self.max_entry_count_per_set
    }

    /// Cached plans of `vertex_set`, cheapest first.
    pub fn get_best_plans(&self, vertex_set: VertexSet) -> Vec<JoinPlanNodeRef> {
        self.plans
            .get(&vertex_set)
            .map(|plans| plans.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl DpSubplanCache for DpSubplanCacheTopK {
    fn cache_plan(&mut self, vertex_set: VertexSet, plan: JoinPlanNodeRef) {
        let plans = self.plans.entry(vertex_set).or_default();
        plans.insert((OrderedFloat(plan.plan_cost().value()), plan.id()), plan);
        while plans.len() > self.max_entry_count_per_set {
            plans.pop_last();
        }
    }

    fn get_best_plan(&self, vertex_set: VertexSet) -> Option<JoinPlanNodeRef> {
        self.plans
            .get(&vertex_set)
            .and_then(|plans| plans.values().next().cloned())
    }

    fn clear(&mut self) {
        self.plans.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::Cost;
    use crate::expr::DataType;
    use crate::join_ordering::{BaseJoinGraph, JoinPlanNode};
    use crate::operator::{ColumnDefinition, TableScan};
    use crate::plan::LogicalPlanBuilder;

    fn plan_with_cost(cost: f64) -> JoinPlanNodeRef {
        let vertex = LogicalPlanBuilder::scan(TableScan::new(
            "t",
            vec![ColumnDefinition::new("a", DataType::Int)],
        ))
        .node();
        JoinPlanNode::new_vertex(
            vertex.clone(),
            vec![],
            BaseJoinGraph::from_vertex(vertex),
            1.0,
            Cost::from(cost),
        )
    }

    #[test]
    fn test_best_keeps_cheapest() {
        let vertex_set = VertexSet::single(0);
        let mut cache = DpSubplanCacheBest::new();
        assert!(cache.get_best_plan(vertex_set).is_none());

        let first = plan_with_cost(10.0);
        cache.cache_plan(vertex_set, first.clone());
        cache.cache_plan(vertex_set, plan_with_cost(20.0));
        assert_eq!(first.id(), cache.get_best_plan(vertex_set).unwrap().id());

        // Equal cost keeps the first plan.
        cache.cache_plan(vertex_set, plan_with_cost(10.0));
        assert_eq!(first.id(), cache.get_best_plan(vertex_set).unwrap().id());

        // A zero cost plan is only replaced by a cheaper one.
        let free = plan_with_cost(0.0);
        cache.cache_plan(vertex_set, free.clone());
        cache.cache_plan(vertex_set, plan_with_cost(0.0));
        assert_eq!(free.id(), cache.get_best_plan(vertex_set).unwrap().id());

        cache.clear();
        assert!(cache.get_best_plan(vertex_set).is_none());
    }

    #[test]
    fn test_top_k_evicts_most_expensive() {
        let vertex_set = VertexSet::from_bits(0b11);
        let mut cache = DpSubplanCacheTopK::new(3);
        let plans: Vec<_> = [1.0, 2.0, 3.0, 4.0].iter().map(|c| plan_with_cost(*c)).collect();
        for plan in &plans {
            cache.cache_plan(vertex_set, plan.clone());
        }

        let best: Vec<_> = cache.get_best_plans(vertex_set).iter().map(|p| p.id()).collect();
        let expected: Vec<_> = plans[..3].iter().map(|p| p.id()).collect();
        assert_eq!(expected, best);
        assert_eq!(plans[0].id(), cache.get_best_plan(vertex_set).unwrap().id());

        // A cheaper plan pushes out the most expensive one.
        let cheapest = plan_with_cost(0.5);
        cache.cache_plan(vertex_set, cheapest.clone());
        let costs: Vec<_> = cache
            .get_best_plans(vertex_set)
            .iter()
            .map(|p| p.plan_cost().value())
            .collect();
        assert_eq!(vec![0.5, 1.0, 2.0], costs);
        assert!(cache.get_best_plans(VertexSet::single(0)).is_empty());
    }

    #[test]
    fn test_top_k_keeps_equal_costs() {
        let vertex_set = VertexSet::single(1);
        let mut cache = DpSubplanCacheTopK::new(2);
        let first = plan_with_cost(5.0);
        let second = plan_with_cost(5.0);
        cache.cache_plan(vertex_set, first.clone());
        cache.cache_plan(vertex_set, second.clone());
        assert_eq!(2, cache.get_best_plans(vertex_set).len());
        cache.cache_plan(vertex_set, plan_with_cost(5.0));
        let ids: Vec<_> = cache.get_best_plans(vertex_set).iter().map(|p| p.id()).collect();
        assert_eq!(vec![first.id(), second.id()], ids);
    }
}
