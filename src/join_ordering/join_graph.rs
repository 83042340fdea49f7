use std::fmt::{Display, Formatter};

use anyhow::ensure;
use petgraph::algo::connected_components;
use petgraph::graph::UnGraph;
use smallvec::SmallVec;

use crate::error::{OptResult, OptimizerError};
use crate::join_ordering::{JoinPlanPredicateRef, VertexSet, MAX_VERTEX_COUNT};
use crate::operator::InputSide;
use crate::plan::{PlanNodeId, PlanNodeRef};

/// Predicates that read exactly the vertices of `vertex_set`.
#[derive(Clone, Debug)]
pub struct JoinEdge {
    vertex_set: VertexSet,
    predicates: SmallVec<[JoinPlanPredicateRef; 2]>,
}

impl JoinEdge {
    pub fn new<I>(vertex_set: VertexSet, predicates: I) -> Self
    where
        I: IntoIterator<Item = JoinPlanPredicateRef>,
    {
        Self {
            vertex_set,
            predicates: predicates.into_iter().collect(),
        }
    }

    pub fn vertex_set(&self) -> VertexSet {
        self.vertex_set
    }

    pub fn predicates(&self) -> &[JoinPlanPredicateRef] {
        &self.predicates
    }
}

/// Where the optimized join graph has to be attached in the surrounding plan.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OutputRelation {
    parent: PlanNodeId,
    side: InputSide,
}

impl OutputRelation {
    pub fn new(parent: PlanNodeId, side: InputSide) -> Self {
        Self { parent, side }
    }

    pub fn parent(&self) -> PlanNodeId {
        self.parent
    }

    pub fn side(&self) -> InputSide {
        self.side
    }
}

/// Vertices and the predicates connecting them, the input of join ordering.
///
/// Vertex positions are stable for the lifetime of the graph and used as bits of `VertexSet`s. Edges
/// with a single vertex hold the local predicates of that vertex.
#[derive(Clone, Debug)]
pub struct JoinGraph {
    vertices: Vec<PlanNodeRef>,
    edges: Vec<JoinEdge>,
    output_relations: Vec<OutputRelation>,
}

impl JoinGraph {
    pub fn new(
        vertices: Vec<PlanNodeRef>,
        edges: Vec<JoinEdge>,
        output_relations: Vec<OutputRelation>,
    ) -> OptResult<Self> {
        ensure!(
            vertices.len() <= MAX_VERTEX_COUNT,
            OptimizerError::TooManyVertices(vertices.len(), MAX_VERTEX_COUNT)
        );
        let all = VertexSet::first_n(vertices.len());
        for edge in &edges {
            ensure!(
                !edge.vertex_set.is_empty() && edge.vertex_set.is_subset_of(all),
                OptimizerError::InvalidEdge {
                    edge: edge.vertex_set,
                    vertex_count: vertices.len(),
                }
            );
        }

        Ok(Self {
            vertices,
            edges,
            output_relations,
        })
    }

    /// Groups `predicates` into edges by the vertices they access.
    pub fn from_predicates(
        vertices: Vec<PlanNodeRef>,
        predicates: Vec<JoinPlanPredicateRef>,
        output_relations: Vec<OutputRelation>,
    ) -> OptResult<Self> {
        let mut edges: Vec<JoinEdge> = vec![];
        for predicate in predicates {
            let vertex_set = predicate.accessed_vertex_set(&vertices)?;
            match edges.iter_mut().find(|e| e.vertex_set == vertex_set) {
                Some(edge) => edge.predicates.push(predicate),
                None => edges.push(JoinEdge::new(vertex_set, [predicate])),
            }
        }
        Self::new(vertices, edges, output_relations)
    }

    pub fn vertices(&self) -> &[PlanNodeRef] {
        &self.vertices
    }

    pub fn edges(&self) -> &[JoinEdge] {
        &self.edges
    }

    pub fn output_relations(&self) -> &[OutputRelation] {
        &self.output_relations
    }

    pub fn all_vertices(&self) -> VertexSet {
        VertexSet::first_n(self.vertices.len())
    }

    /// Position of `vertex` by identity.
    pub fn find_vertex(&self, vertex: &PlanNodeRef) -> OptResult<usize> {
        self.vertices
            .iter()
            .position(|v| v.id() == vertex.id())
            .ok_or_else(|| OptimizerError::VertexNotFound(vertex.id()).into())
    }

    /// Predicates that only read `vertex`.
    pub fn local_predicates(&self, vertex: usize) -> Vec<JoinPlanPredicateRef> {
        let vertex_set = VertexSet::single(vertex);
        self.edges
            .iter()
            .filter(|e| e.vertex_set == vertex_set)
            .flat_map(|e| e.predicates.iter().cloned())
            .collect()
    }

    /// Predicates that become applicable when joining `left` and `right`: covered by their union but by
    /// neither side alone.
    pub fn predicates_between(&self, left: VertexSet, right: VertexSet) -> Vec<JoinPlanPredicateRef> {
        let joined = left | right;
        self.edges
            .iter()
            .filter(|e| {
                e.vertex_set.is_subset_of(joined)
                    && !e.vertex_set.is_subset_of(left)
                    && !e.vertex_set.is_subset_of(right)
            })
            .flat_map(|e| e.predicates.iter().cloned())
            .collect()
    }

    /// Edges between exactly two vertices, the structure join enumeration walks.
    pub fn pairwise_edges(&self) -> Vec<(usize, usize)> {
        self.edges
            .iter()
            .filter(|e| e.vertex_set.len() == 2)
            .filter_map(|e| {
                let mut vertices = e.vertex_set.iter();
                Some((vertices.next()?, vertices.next()?))
            })
            .collect()
    }

    /// Whether the pairwise edges connect all vertices.
    pub fn is_connected(&self) -> bool {
        if self.vertices.len() <= 1 {
            return true;
        }
        let mut graph = UnGraph::<(), ()>::default();
        let nodes: Vec<_> = (0..self.vertices.len()).map(|_| graph.add_node(())).collect();
        for (a, b) in self.pairwise_edges() {
            graph.add_edge(nodes[a], nodes[b], ());
        }
        connected_components(&graph) == 1
    }
}

impl Display for JoinGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "==== Vertices ====")?;
        for (idx, vertex) in self.vertices.iter().enumerate() {
            writeln!(f, "{}: {}", idx, vertex.description())?;
        }
        writeln!(f, "===== Edges ======")?;
        for edge in &self.edges {
            let predicates: Vec<String> = edge.predicates.iter().map(|p| p.to_string()).collect();
            writeln!(f, "{}: [{}]", edge.vertex_set, predicates.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ColumnRef, DataType, PredicateCondition, Value};
    use crate::join_ordering::JoinPlanPredicate;
    use crate::operator::{ColumnDefinition, TableScan};
    use crate::plan::LogicalPlanBuilder;

    fn scan(name: &str) -> PlanNodeRef {
        LogicalPlanBuilder::scan(TableScan::new(
            name,
            vec![ColumnDefinition::new("a", DataType::Int)],
        ))
        .node()
    }

    fn column(vertex: &PlanNodeRef) -> ColumnRef {
        ColumnRef::new(vertex.id(), 0)
    }

    #[test]
    fn test_from_predicates() {
        let (a, b, c) = (scan("a"), scan("b"), scan("c"));
        let ab = JoinPlanPredicate::atomic(column(&a), PredicateCondition::Equals, column(&b));
        let ab2 = JoinPlanPredicate::atomic(column(&b), PredicateCondition::LessThan, column(&a));
        let bc = JoinPlanPredicate::atomic(column(&b), PredicateCondition::Equals, column(&c));
        let local = JoinPlanPredicate::atomic(column(&c), PredicateCondition::Equals, Value::from(1));

        let graph = JoinGraph::from_predicates(
            vec![a.clone(), b, c],
            vec![ab, ab2, bc, local.clone()],
            vec![],
        )
        .unwrap();

        assert_eq!(3, graph.edges().len());
        assert_eq!(2, graph.edges()[0].predicates().len());
        assert_eq!(vec![(0, 1), (1, 2)], graph.pairwise_edges());
        assert_eq!(vec![local], graph.local_predicates(2));
        assert!(graph.is_connected());
        assert_eq!(0, graph.find_vertex(&a).unwrap());

        let between = graph.predicates_between(VertexSet::single(0), VertexSet::single(1));
        assert_eq!(2, between.len());
        let between =
            graph.predicates_between(VertexSet::from_bits(0b011), VertexSet::single(2));
        assert_eq!(1, between.len());
        assert!(graph
            .predicates_between(VertexSet::single(0), VertexSet::single(2))
            .is_empty());
    }

    #[test]
    fn test_invalid_edges() {
        let graph = JoinGraph::new(
            vec![scan("a")],
            vec![JoinEdge::new(VertexSet::from_bits(0b10), [])],
            vec![],
        );
        let error = graph.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<OptimizerError>(),
            Some(OptimizerError::InvalidEdge { .. })
        ));

        let a = scan("a");
        let unknown = JoinPlanPredicate::atomic(
            column(&scan("b")),
            PredicateCondition::Equals,
            Value::from(1),
        );
        assert!(JoinGraph::from_predicates(vec![a], vec![unknown], vec![]).is_err());
    }

    #[test]
    fn test_disconnected() {
        let graph = JoinGraph::new(vec![scan("a"), scan("b")], vec![], vec![]).unwrap();
        assert!(!graph.is_connected());
    }
}
