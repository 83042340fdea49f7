use std::path::PathBuf;

use thiserror::Error;

use crate::cost::CostFeature;
use crate::expr::ColumnRef;
use crate::join_ordering::VertexSet;
use crate::plan::PlanNodeId;

pub type OptResult<T> = anyhow::Result<T>;

/// Invariant violations reported by the join ordering core.
///
/// These abort the optimization call. Timeouts and missing statistics are absorbed by the estimators and
/// never show up here.
#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("no vertex outputs column {0}")]
    ColumnNotFound(ColumnRef),
    #[error("plan node #{0} is not a vertex of the join graph")]
    VertexNotFound(PlanNodeId),
    #[error("edge {edge} references a vertex outside of a graph with {vertex_count} vertices")]
    InvalidEdge { edge: VertexSet, vertex_count: usize },
    #[error("join graph has {0} vertices, at most {1} are supported")]
    TooManyVertices(usize, usize),
    #[error("no subplan cached for vertex set {0}")]
    SubplanMissing(VertexSet),
    #[error("no plan for vertex set {0}, the join graph is not connected")]
    NoPlanForVertexSet(VertexSet),
    #[error("predicate not applicable: {0}")]
    PredicateNotApplicable(String),
    #[error("cost feature {0} is not available from this proxy")]
    MissingCostFeature(CostFeature),
    #[error("cost feature {feature} holds a {actual}, expected a {expected}")]
    CostFeatureTypeMismatch {
        feature: CostFeature,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("failed to access cardinality cache file {path:?}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cardinality cache file {path:?}")]
    CacheFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
