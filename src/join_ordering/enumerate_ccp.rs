use anyhow::ensure;
use log::trace;

use crate::error::{OptResult, OptimizerError};
use crate::join_ordering::{VertexSet, MAX_VERTEX_COUNT};

/// Enumerates all csg-cmp pairs of a join graph.
///
/// A csg-cmp pair is a connected subgraph and a disjoint connected subgraph with at least one edge
/// between the two. Every unordered pair is emitted once, and smaller subgraphs are always emitted before
/// the pairs building them, so a dynamic programming pass can consume the output in order.
///
/// Follows "Analysis of Two Existing and One New Dynamic Programming Algorithm for the Generation of
/// Optimal Bushy Join Trees without Cross Products", Moerkotte and Neumann.
pub struct EnumerateCcp {
    vertex_count: usize,
    neighbors: Vec<VertexSet>,
}

impl EnumerateCcp {
    pub fn new(vertex_count: usize, edges: &[(usize, usize)]) -> OptResult<Self> {
        ensure!(
            vertex_count <= MAX_VERTEX_COUNT,
            OptimizerError::TooManyVertices(vertex_count, MAX_VERTEX_COUNT)
        );

        let mut neighbors = vec![VertexSet::empty(); vertex_count];
        for &(a, b) in edges {
            ensure!(
                a < vertex_count && b < vertex_count,
                OptimizerError::InvalidEdge {
                    edge: VertexSet::single(a.min(MAX_VERTEX_COUNT - 1))
                        | VertexSet::single(b.min(MAX_VERTEX_COUNT - 1)),
                    vertex_count,
                }
            );
            if a != b {
                neighbors[a].insert(b);
                neighbors[b].insert(a);
            }
        }

        Ok(Self {
            vertex_count,
            neighbors,
        })
    }

    pub fn enumerate(&self) -> Vec<(VertexSet, VertexSet)> {
        let mut pairs = vec![];
        for vertex in (0..self.vertex_count).rev() {
            let start = VertexSet::single(vertex);
            self.emit_csg(start, &mut pairs);
            self.enumerate_csg_recursive(start, VertexSet::first_n(vertex + 1), &mut pairs);
        }
        trace!(
            "Enumerated {} csg-cmp pairs over {} vertices",
            pairs.len(),
            self.vertex_count
        );
        pairs
    }

    /// Vertices adjacent to `vertex_set`, excluding `vertex_set` and `exclusion_set`.
    fn neighborhood(&self, vertex_set: VertexSet, exclusion_set: VertexSet) -> VertexSet {
        let adjacent = vertex_set
            .iter()
            .fold(VertexSet::empty(), |acc, v| acc | self.neighbors[v]);
        adjacent.difference(vertex_set | exclusion_set)
    }

    fn enumerate_csg_recursive(
        &self,
        vertex_set: VertexSet,
        exclusion_set: VertexSet,
        pairs: &mut Vec<(VertexSet, VertexSet)>,
    ) {
        let neighborhood = self.neighborhood(vertex_set, exclusion_set);
        for subset in neighborhood.subsets() {
            self.emit_csg(vertex_set | subset, pairs);
        }
        for subset in neighborhood.subsets() {
            self.enumerate_csg_recursive(vertex_set | subset, exclusion_set | neighborhood, pairs);
        }
    }

    fn emit_csg(&self, csg: VertexSet, pairs: &mut Vec<(VertexSet, VertexSet)>) {
        let min_vertex = match csg.min_vertex() {
            Some(v) => v,
            None => return,
        };
        let exclusion_set = csg | VertexSet::first_n(min_vertex + 1);
        let neighborhood = self.neighborhood(csg, exclusion_set);

        let descending: Vec<usize> = neighborhood.iter().collect();
        for &vertex in descending.iter().rev() {
            let cmp = VertexSet::single(vertex);
            pairs.push((csg, cmp));

            let cmp_exclusion = exclusion_set | (VertexSet::first_n(vertex + 1) & neighborhood);
            self.enumerate_cmp_recursive(csg, cmp, cmp_exclusion, pairs);
        }
    }

    fn enumerate_cmp_recursive(
        &self,
        csg: VertexSet,
        cmp: VertexSet,
        exclusion_set: VertexSet,
        pairs: &mut Vec<(VertexSet, VertexSet)>,
    ) {
        let neighborhood = self.neighborhood(cmp, exclusion_set);
        for subset in neighborhood.subsets() {
            pairs.push((csg, cmp | subset));
        }
        for subset in neighborhood.subsets() {
            self.enumerate_cmp_recursive(csg, cmp | subset, exclusion_set | neighborhood, pairs);
        }
    }
}
