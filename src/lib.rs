//! ## Background
//!
//! The join order of a query decides the size of the intermediate results it produces, and is
//! usually the decision with the largest impact on the execution time of a plan. The number of
//! possible join orders grows exponentially with the number of joined relations, so the optimizer
//! has to search it with dynamic programming instead of trying every order. Cost based bottom up
//! search over join orders goes back to System R [2].
//!
//! [1] showed how to enumerate exactly the pairs of connected subgraphs a dynamic program over a
//! join graph needs (so called csg-cmp pairs), without generating and discarding cross products.
//! This is the enumeration implemented in this crate.
//!
//! ## Design
//!
//! ### Join graph
//!
//! A join graph is extracted from the joins, predicates and unions of a logical plan. Every other
//! subtree becomes a vertex, and every predicate becomes an edge between the vertices it references.
//! Vertices are addressed by their position, so sets of vertices are plain bitsets.
//!
//! ### Dynamic programming
//!
//! The DP drivers walk the csg-cmp pairs bottom up, build candidate join plans from the cached plans of
//! both halves, and keep the cheapest plan (or the cheapest `k` plans) per vertex set. The cost of a
//! candidate comes from a pluggable cost model, which in turn needs row counts from a pluggable
//! cardinality estimator.
//!
//! ### Cardinality estimation
//!
//! Estimates come from column statistics, from executing the join graph, or from a cache keyed by a
//! normalized form of the join graph, which can be persisted between runs.
//!
//! ## Reference
//!
//! 1. Moerkotte, G. and Neumann, T., 2006. Analysis of two existing and one new dynamic programming
//! algorithm for the generation of optimal bushy join trees without cross products. In Proceedings
//! of the 32nd international conference on Very large data bases (pp. 930-941).
//! 2. Selinger, P. Griffiths, et al. "Access path selection in a relational database management
//! system." Readings in Artificial Intelligence and Databases. Morgan Kaufmann, 1989. 511-522.

#[macro_use]
extern crate prettytable;
#[macro_use]
extern crate lazy_static;

pub mod cardinality;
pub mod cost;
pub mod error;
pub mod expr;
pub mod join_ordering;
pub mod operator;
pub mod optimizer;
pub mod plan;
pub mod stat;
