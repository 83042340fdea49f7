use std::collections::HashSet;

use log::debug;
use petgraph::unionfind::UnionFind;

use crate::error::OptResult;
use crate::join_ordering::{
    JoinEdge, JoinGraph, JoinPlanPredicate, JoinPlanPredicateRef, OutputRelation, VertexSet,
};
use crate::operator::{InputSide, JoinMode, LogicalOperator};
use crate::plan::{Plan, PlanNodeId, PlanNodeRef};

/// Extracts join graphs from logical plans.
///
/// Joins, predicates and unions of predicates over the same input are dissolved into the predicates of
/// the join graph, every other node becomes a vertex.
#[derive(Default)]
pub struct JoinGraphBuilder {
    vertices: Vec<PlanNodeRef>,
    vertex_ids: HashSet<PlanNodeId>,
    predicates: Vec<JoinPlanPredicateRef>,
}

impl JoinGraphBuilder {
    /// Topmost node of `plan` that a join graph can be built from, with the places it is referenced.
    ///
    /// Nodes above the root have a single input, so there is at most one such node.
    pub fn find_root(plan: &Plan) -> Option<(PlanNodeRef, Vec<OutputRelation>)> {
        let root = plan
            .bfs_iterator()
            .find(|node| node.operator().is_join_graph_node())?;

        let mut output_relations = vec![];
        for node in plan.bfs_iterator() {
            for (idx, input) in node.inputs().iter().enumerate() {
                if let (true, Some(side)) = (input.id() == root.id(), InputSide::from_index(idx)) {
                    output_relations.push(OutputRelation::new(node.id(), side));
                }
            }
        }
        Some((root, output_relations))
    }

    /// Join graph of the subtree below `root`.
    ///
    /// Components not connected by any predicate, e.g. inputs of a cross join, are connected with edges
    /// without predicates.
    pub fn build(root: &PlanNodeRef, output_relations: Vec<OutputRelation>) -> OptResult<JoinGraph> {
        let mut builder = Self::default();
        builder.traverse(root);
        debug!(
            "Extracted {} vertices and {} predicates below #{}",
            builder.vertices.len(),
            builder.predicates.len(),
            root.id()
        );

        let graph = JoinGraph::from_predicates(builder.vertices, builder.predicates, vec![])?;
        let mut edges = graph.edges().to_vec();
        edges.extend(component_edges(&graph));
        JoinGraph::new(graph.vertices().to_vec(), edges, output_relations)
    }

    fn traverse(&mut self, node: &PlanNodeRef) {
        match node.operator() {
            LogicalOperator::Join(join) => {
                if let (JoinMode::Inner, Some(condition)) = (join.join_mode(), join.condition()) {
                    self.predicates.push(JoinPlanPredicate::atomic(
                        condition.left(),
                        condition.condition(),
                        condition.right(),
                    ));
                }
                for input in node.inputs() {
                    self.traverse(input);
                }
            }
            LogicalOperator::Predicate(predicate) => match node.left_input() {
                Some(input) => {
                    self.predicates.push(JoinPlanPredicate::atomic(
                        predicate.column(),
                        predicate.condition(),
                        predicate.operand().clone(),
                    ));
                    self.traverse(input);
                }
                None => self.add_vertex(node),
            },
            LogicalOperator::Union(_) => match parse_disjunction(node) {
                Some((predicate, base)) => {
                    self.predicates.push(predicate);
                    self.traverse(&base);
                }
                None => self.add_vertex(node),
            },
            LogicalOperator::TableScan(_) | LogicalOperator::Limit(_) => self.add_vertex(node),
        }
    }

    fn add_vertex(&mut self, node: &PlanNodeRef) {
        if self.vertex_ids.insert(node.id()) {
            self.vertices.push(node.clone());
        }
    }
}

/// Predicate applied by a chain of predicate nodes and unions on top of a common base node, and that
/// base node.
fn parse_predicate_chain(node: &PlanNodeRef) -> Option<(Option<JoinPlanPredicateRef>, PlanNodeRef)> {
    match node.operator() {
        LogicalOperator::Predicate(predicate) => {
            let (below, base) = parse_predicate_chain(node.left_input()?)?;
            let atomic = JoinPlanPredicate::atomic(
                predicate.column(),
                predicate.condition(),
                predicate.operand().clone(),
            );
            let chained = match below {
                Some(below) => JoinPlanPredicate::and(below, atomic),
                None => atomic,
            };
            Some((Some(chained), base))
        }
        LogicalOperator::Union(_) => {
            let (predicate, base) = parse_disjunction(node)?;
            Some((Some(predicate), base))
        }
        _ => Some((None, node.clone())),
    }
}

/// A union of two predicate chains over the same base node as a disjunction.
fn parse_disjunction(node: &PlanNodeRef) -> Option<(JoinPlanPredicateRef, PlanNodeRef)> {
    let (left, left_base) = parse_predicate_chain(node.left_input()?)?;
    let (right, right_base) = parse_predicate_chain(node.right_input()?)?;
    if left_base.id() != right_base.id() {
        return None;
    }
    Some((JoinPlanPredicate::or(left?, right?), left_base))
}

/// Edges without predicates chaining the components of `graph` that no pairwise edge connects.
fn component_edges(graph: &JoinGraph) -> Vec<JoinEdge> {
    let vertex_count = graph.vertices().len();
    let mut components = UnionFind::<usize>::new(vertex_count);
    for (a, b) in graph.pairwise_edges() {
        components.union(a, b);
    }

    // Lowest vertex of each component.
    let mut seen = HashSet::new();
    let mut representatives: Vec<usize> = vec![];
    for vertex in 0..vertex_count {
        if seen.insert(components.find(vertex)) {
            representatives.push(vertex);
        }
    }
    representatives
        .windows(2)
        .map(|pair| {
            JoinEdge::new(
                VertexSet::single(pair[0]) | VertexSet::single(pair[1]),
                Vec::<JoinPlanPredicateRef>::new(),
            )
        })
        .collect()
}
