//! Join ordering.
//!
//! A [`JoinGraph`] is extracted from a logical plan by the [`JoinGraphBuilder`]. [`EnumerateCcp`]
//! enumerates the pairs of connected subgraphs of the join graph bottom up, and the dynamic
//! programming drivers ([`DpCcp`], [`DpCcpTopK`]) build candidate [`JoinPlanNode`]s for each pair,
//! keeping the cheapest ones in a subplan cache.
//!
//! ## Reference
//!
//! 1. Moerkotte, G. and Neumann, T., 2006. Analysis of two existing and one new dynamic programming
//! algorithm for the generation of optimal bushy join trees without cross products. VLDB, pp.930-941.

mod vertex_set;
pub use vertex_set::*;
mod predicate;
pub use predicate::*;
mod base_join_graph;
pub use base_join_graph::*;
mod join_graph;
pub use join_graph::*;
mod join_graph_builder;
pub use join_graph_builder::*;
mod enumerate_ccp;
pub use enumerate_ccp::*;
mod lqp_for_predicate;
pub use lqp_for_predicate::*;
mod join_plan;
pub use join_plan::*;
mod build_join_plan;
pub use build_join_plan::*;
mod subplan_cache;
pub use subplan_cache::*;
mod dp_ccp;
pub use dp_ccp::*;
mod dp_ccp_top_k;
pub use dp_ccp_top_k::*;
