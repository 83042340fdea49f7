use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::runtime::{Builder, Runtime};

use crate::cardinality::{
    Cardinality, CardinalityEstimationCache, CardinalityEstimator,
    CardinalityEstimatorColumnStatistics,
};
use crate::cost::CostModelNaive;
use crate::error::OptResult;
use crate::join_ordering::{build_lqp_for_predicate, BaseJoinGraph, DpCcp, JoinPlanPredicateRef};
use crate::optimizer::{JoinOrderingRule, Rule};
use crate::plan::{LogicalPlanBuilder, Plan, PlanNodeRef};

/// Runs logical plans and counts their result rows.
#[async_trait(?Send)]
pub trait QueryExecutor {
    async fn execute(&self, plan: &Plan) -> OptResult<usize>;

    /// Aborts the execution in flight, called when it exceeded its time budget.
    fn cancel(&self) {}
}

#[derive(Clone, Debug)]
pub struct ExecutionEstimatorOptions {
    /// `None` waits for the execution to finish.
    pub timeout: Option<Duration>,
    /// Reported for executions that didn't finish within `timeout`.
    pub timeout_cardinality: Cardinality,
}

impl Default for ExecutionEstimatorOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            timeout_cardinality: 1e20,
        }
    }
}

impl ExecutionEstimatorOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_timeout_cardinality(mut self, timeout_cardinality: Cardinality) -> Self {
        self.timeout_cardinality = timeout_cardinality;
        self
    }
}

/// Estimates cardinalities by executing the join graph.
///
/// The probe plan is join ordered with column statistics first. Executions that run out of time report
/// `timeout_cardinality`, which makes the join order search avoid the sub graph instead of failing.
pub struct CardinalityEstimatorExecution {
    executor: Rc<dyn QueryExecutor>,
    options: ExecutionEstimatorOptions,
    cache: Option<Rc<RefCell<CardinalityEstimationCache>>>,
    runtime: Runtime,
}

impl CardinalityEstimatorExecution {
    /// Executions run on a current thread runtime owned by the estimator.
    pub fn new(
        executor: Rc<dyn QueryExecutor>,
        options: ExecutionEstimatorOptions,
    ) -> OptResult<Self> {
        let runtime = Builder::new_current_thread().enable_time().build()?;
        Ok(Self {
            executor,
            options,
            cache: None,
            runtime,
        })
    }

    /// Records timeouts in `cache` and skips executions that already timed out with the same budget.
    pub fn with_cache(mut self, cache: Rc<RefCell<CardinalityEstimationCache>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn options(&self) -> &ExecutionEstimatorOptions {
        &self.options
    }

    fn build_probe_plan(
        vertices: &[PlanNodeRef],
        predicates: &[JoinPlanPredicateRef],
    ) -> OptResult<Plan> {
        let mut root = vertices[0].clone();
        for vertex in &vertices[1..] {
            root = LogicalPlanBuilder::from(root).cross_join(vertex.clone()).node();
        }
        for predicate in predicates {
            root = build_lqp_for_predicate(predicate, root);
        }

        let rule = JoinOrderingRule::new(Box::new(DpCcp::new(
            Rc::new(CostModelNaive),
            Rc::new(CardinalityEstimatorColumnStatistics::new()),
        )));
        rule.apply(Plan::new(root))
    }

    /// Row count of `plan`, `None` if the execution timed out.
    fn execute_with_timeout(&self, plan: &Plan) -> OptResult<Option<usize>> {
        let timeout = match self.options.timeout {
            Some(timeout) => timeout,
            None => return self.runtime.block_on(self.executor.execute(plan)).map(Some),
        };

        let _guard = self.runtime.enter();
        let execution = tokio::time::timeout(timeout, self.executor.execute(plan));
        match self.runtime.block_on(execution) {
            Ok(row_count) => row_count.map(Some),
            Err(_) => {
                self.executor.cancel();
                Ok(None)
            }
        }
    }
}

impl CardinalityEstimator for CardinalityEstimatorExecution {
    fn estimate(
        &self,
        vertices: &[PlanNodeRef],
        predicates: &[JoinPlanPredicateRef],
    ) -> OptResult<Cardinality> {
        if vertices.is_empty() {
            return Ok(0.0);
        }

        let key = match &self.cache {
            Some(_) => Some(BaseJoinGraph::new(vertices.to_vec(), predicates.to_vec()).normalize()?),
            None => None,
        };
        if let (Some(cache), Some(key), Some(timeout)) = (&self.cache, &key, self.options.timeout) {
            if let Some(previous) = cache.borrow().get_timeout(key) {
                if previous >= timeout {
                    debug!("Skipping execution of {}, it timed out after {:?}", key, previous);
                    return Ok(self.options.timeout_cardinality);
                }
            }
        }

        let plan = Self::build_probe_plan(vertices, predicates)?;
        debug!("Executing probe plan {}", plan);
        match self.execute_with_timeout(&plan)? {
            Some(row_count) => Ok(row_count as Cardinality),
            None => {
                warn!(
                    "Execution of {} vertices with {} predicates timed out after {:?}",
                    vertices.len(),
                    predicates.len(),
                    self.options.timeout
                );
                if let (Some(cache), Some(key), Some(timeout)) =
                    (&self.cache, key, self.options.timeout)
                {
                    cache.borrow_mut().set_timeout(key, timeout);
                }
                Ok(self.options.timeout_cardinality)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use futures::future::pending;

    use super::*;
    use crate::expr::{ColumnRef, DataType, PredicateCondition, Value};
    use crate::join_ordering::JoinPlanPredicate;
    use crate::operator::{ColumnDefinition, LogicalOperator, TableScan};

    /// Reports the number of table scans in the plan times ten.
    #[derive(Default)]
    struct CountingExecutor {
        executions: Cell<usize>,
        joins: Cell<usize>,
    }

    #[async_trait(?Send)]
    impl QueryExecutor for CountingExecutor {
        async fn execute(&self, plan: &Plan) -> OptResult<usize> {
            self.executions.set(self.executions.get() + 1);
            let nodes: Vec<_> = plan.bfs_iterator().collect();
            let joins = nodes
                .iter()
                .filter(|n| matches!(n.operator(), LogicalOperator::Join(_)))
                .count();
            self.joins.set(joins);
            let scans = nodes
                .iter()
                .filter(|n| matches!(n.operator(), LogicalOperator::TableScan(_)))
                .count();
            Ok(scans * 10)
        }
    }

    #[derive(Default)]
    struct HangingExecutor {
        executions: Cell<usize>,
        cancelled: Cell<bool>,
    }

    #[async_trait(?Send)]
    impl QueryExecutor for HangingExecutor {
        async fn execute(&self, _plan: &Plan) -> OptResult<usize> {
            self.executions.set(self.executions.get() + 1);
            pending::<OptResult<usize>>().await
        }

        fn cancel(&self) {
            self.cancelled.set(true);
        }
    }

    fn scan(name: &str) -> PlanNodeRef {
        LogicalPlanBuilder::scan(TableScan::new(
            name,
            vec![ColumnDefinition::new("a", DataType::Int)],
        ))
        .node()
    }

    #[test]
    fn test_executes_probe_plan() {
        let executor = Rc::new(CountingExecutor::default());
        let estimator =
            CardinalityEstimatorExecution::new(executor.clone(), ExecutionEstimatorOptions::default())
                .unwrap();
        let (a, b, c) = (scan("a"), scan("b"), scan("c"));
        let predicates = vec![
            JoinPlanPredicate::atomic(
                ColumnRef::new(a.id(), 0),
                PredicateCondition::Equals,
                ColumnRef::new(b.id(), 0),
            ),
            JoinPlanPredicate::atomic(
                ColumnRef::new(c.id(), 0),
                PredicateCondition::LessThan,
                Value::from(3),
            ),
        ];

        let cardinality = estimator.estimate(&[a, b, c], &predicates).unwrap();
        assert_eq!(30.0, cardinality);
        assert_eq!(1, executor.executions.get());
        assert_eq!(2, executor.joins.get());
        assert_eq!(0.0, estimator.estimate(&[], &[]).unwrap());
    }

    #[test]
    fn test_timeout_reports_sentinel() {
        let executor = Rc::new(HangingExecutor::default());
        let cache = Rc::new(RefCell::new(CardinalityEstimationCache::new()));
        let options = ExecutionEstimatorOptions::default()
            .with_timeout(Duration::from_millis(10))
            .with_timeout_cardinality(1e9);
        let estimator =
            CardinalityEstimatorExecution::new(executor.clone(), options)
                .unwrap()
                .with_cache(cache.clone());
        let a = scan("a");

        assert_eq!(1e9, estimator.estimate(&[a.clone()], &[]).unwrap());
        assert!(executor.cancelled.get());
        let key = BaseJoinGraph::new(vec![a.clone()], vec![]).normalize().unwrap();
        assert_eq!(Some(Duration::from_millis(10)), cache.borrow().get_timeout(&key));

        // The recorded timeout covers the budget, so nothing is executed again.
        assert_eq!(1e9, estimator.estimate(&[a], &[]).unwrap());
        assert_eq!(1, executor.executions.get());
    }

    #[test]
    fn test_execution_finishing_within_timeout() {
        struct SleepingExecutor(Duration);

        #[async_trait(?Send)]
        impl QueryExecutor for SleepingExecutor {
            async fn execute(&self, _plan: &Plan) -> OptResult<usize> {
                tokio::time::sleep(self.0).await;
                Ok(7)
            }

            fn cancel(&self) {
                panic!("finished execution must not be cancelled");
            }
        }

        let options = ExecutionEstimatorOptions::default().with_timeout(Duration::from_secs(10));
        let estimator =
            CardinalityEstimatorExecution::new(Rc::new(SleepingExecutor(Duration::from_millis(5))), options)
                .unwrap();
        assert_eq!(7.0, estimator.estimate(&[scan("a")], &[]).unwrap());
    }
}
