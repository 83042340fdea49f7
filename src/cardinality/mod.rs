//! Cardinality estimation.
//!
//! Estimators predict the row count of a set of vertices joined and filtered by a set of predicates,
//! without building a plan for them. The row count of a join graph doesn't depend on the order its
//! predicates are applied in, which is what makes caching estimates by [`BaseJoinGraph`] possible.

use crate::error::OptResult;
use crate::join_ordering::{BaseJoinGraph, JoinPlanPredicateRef};
use crate::plan::PlanNodeRef;

mod column_statistics;
pub use column_statistics::*;
mod cache;
pub use cache::*;
mod cached;
pub use cached::*;
mod execution;
pub use execution::*;

pub type Cardinality = f64;

pub trait CardinalityEstimator {
    /// Row count of the cartesian product of `vertices` filtered by `predicates`.
    fn estimate(
        &self,
        vertices: &[PlanNodeRef],
        predicates: &[JoinPlanPredicateRef],
    ) -> OptResult<Cardinality>;

    fn estimate_join_graph(&self, join_graph: &BaseJoinGraph) -> OptResult<Cardinality> {
        self.estimate(join_graph.vertices(), join_graph.predicates())
    }
}
