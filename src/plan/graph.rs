use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{anyhow, bail};
use petgraph::prelude::{NodeIndex, StableGraph};
use petgraph::visit::{DfsPostOrder, EdgeRef};
use petgraph::{Directed, Direction};

use crate::error::OptResult;
use crate::operator::{InputSide, LogicalOperator};
use crate::plan::{Plan, PlanNode, PlanNodeId, PlanNodeRef};

type InnerGraph = StableGraph<PlanGraphNode, InputSide, Directed, PlanNodeId>;
pub type PlanGraphNodeId = NodeIndex<PlanNodeId>;

struct PlanGraphNode {
    plan_node_id: PlanNodeId,
    operator: LogicalOperator,
}

/// Mutable view of a plan, used to splice optimized subtrees into their parents.
///
/// A plan should be a single root dag. Edges point from a node to its inputs and carry the input side.
/// Only nodes of the original plan can be addressed as parents, spliced subtrees are tracked separately
/// because a rewritten subtree may reuse the ids of the nodes it replaces.
pub struct PlanGraph {
    graph: InnerGraph,
    node_ids: HashMap<PlanNodeId, PlanGraphNodeId>,
    spliced_node_ids: HashMap<PlanNodeId, PlanGraphNodeId>,
    root: PlanGraphNodeId,
}

fn insert_subtree(
    graph: &mut InnerGraph,
    known: &mut HashMap<PlanNodeId, PlanGraphNodeId>,
    node: &PlanNodeRef,
) -> PlanGraphNodeId {
    if let Some(existing) = known.get(&node.id()) {
        return *existing;
    }

    let graph_node_id = graph.add_node(PlanGraphNode {
        plan_node_id: node.id(),
        operator: node.operator().clone(),
    });
    known.insert(node.id(), graph_node_id);

    for (idx, input) in node.inputs().iter().enumerate() {
        let input_id = insert_subtree(graph, known, input);
        let side = InputSide::from_index(idx).unwrap_or(InputSide::Right);
        graph.add_edge(graph_node_id, input_id, side);
    }

    graph_node_id
}

impl PlanGraph {
    fn splice(&mut self, node: &PlanNodeRef) -> PlanGraphNodeId {
        insert_subtree(&mut self.graph, &mut self.spliced_node_ids, node)
    }

    fn graph_node_id(&self, plan_node_id: PlanNodeId) -> OptResult<PlanGraphNodeId> {
        self.node_ids
            .get(&plan_node_id)
            .copied()
            .ok_or_else(|| anyhow!("plan node #{} is not part of the plan graph", plan_node_id))
    }

    /// Replaces the `side` input of `parent` with `input`.
    ///
    /// The previous input stays in the graph but is no longer reachable from the root.
    pub fn set_input(
        &mut self,
        parent: PlanNodeId,
        side: InputSide,
        input: &PlanNodeRef,
    ) -> OptResult<()> {
        let parent_id = self.graph_node_id(parent)?;
        let old_edge = self
            .graph
            .edges_directed(parent_id, Direction::Outgoing)
            .find(|e| *e.weight() == side)
            .map(|e| e.id());
        match old_edge {
            Some(edge) => {
                self.graph.remove_edge(edge);
            }
            None => bail!("plan node #{} has no {} input", parent, side),
        }

        let input_id = self.splice(input);
        self.graph.add_edge(parent_id, input_id, side);
        Ok(())
    }

    pub fn set_root(&mut self, root: &PlanNodeRef) {
        self.root = self.splice(root);
    }

    /// Rebuilds the plan reachable from the root, keeping node ids.
    pub fn to_plan(&self) -> OptResult<Plan> {
        let mut plan_nodes = HashMap::<PlanGraphNodeId, PlanNodeRef>::new();
        // Post order visits all inputs of a node before the node itself.
        let mut dfs = DfsPostOrder::new(&self.graph, self.root);

        while let Some(node_id) = dfs.next(&self.graph) {
            let mut edges: Vec<(InputSide, PlanGraphNodeId)> = self
                .graph
                .edges_directed(node_id, Direction::Outgoing)
                .map(|e| (*e.weight(), e.target()))
                .collect();
            edges.sort_by_key(|(side, _)| *side);

            let inputs = edges
                .iter()
                .map(|(_, target)| {
                    plan_nodes
                        .get(target)
                        .cloned()
                        .ok_or_else(|| anyhow!("input of plan node visited after its parent"))
                })
                .collect::<OptResult<Vec<PlanNodeRef>>>()?;

            let node = &self.graph[node_id];
            let plan_node = PlanNode::new(node.plan_node_id, node.operator.clone(), inputs);
            plan_nodes.insert(node_id, Rc::new(plan_node));
        }

        plan_nodes
            .get(&self.root)
            .map(|root| Plan::new(root.clone()))
            .ok_or_else(|| anyhow!("plan graph root is missing"))
    }
}

/// Converts from raw plan to plan graph.
impl<'a> From<&'a Plan> for PlanGraph {
    fn from(plan: &'a Plan) -> Self {
        let mut graph = InnerGraph::default();
        let mut node_ids = HashMap::new();
        let root = insert_subtree(&mut graph, &mut node_ids, &plan.root());

        Self {
            graph,
            node_ids,
            spliced_node_ids: HashMap::new(),
            root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::DataType;
    use crate::operator::{ColumnDefinition, TableScan};
    use crate::plan::LogicalPlanBuilder;

    fn scan(name: &str) -> PlanNodeRef {
        LogicalPlanBuilder::scan(TableScan::new(
            name,
            vec![ColumnDefinition::new("a", DataType::Int)],
        ))
        .node()
    }

    #[test]
    fn test_round_trip_keeps_ids() {
        let plan = LogicalPlanBuilder::from(scan("x"))
            .cross_join(scan("y"))
            .limit(3)
            .build();
        let graph = PlanGraph::from(&plan);
        let rebuilt = graph.to_plan().unwrap();

        assert_eq!(plan, rebuilt);
        let ids = |p: &Plan| p.bfs_iterator().map(|n| n.id()).collect::<Vec<_>>();
        assert_eq!(ids(&plan), ids(&rebuilt));
    }

    #[test]
    fn test_set_input() {
        let x = scan("x");
        let y = scan("y");
        let z = scan("z");
        let plan = LogicalPlanBuilder::from(x.clone())
            .cross_join(y.clone())
            .limit(3)
            .build();
        let join = plan.root().left_input().unwrap().clone();

        let mut graph = PlanGraph::from(&plan);
        graph.set_input(join.id(), InputSide::Right, &z).unwrap();
        let rebuilt = graph.to_plan().unwrap();

        let new_join = rebuilt.root().left_input().unwrap().clone();
        assert_eq!(join.id(), new_join.id());
        assert_eq!(x.id(), new_join.left_input().unwrap().id());
        assert_eq!(z.id(), new_join.right_input().unwrap().id());

        assert!(graph.set_input(x.id(), InputSide::Left, &z).is_err());
    }
}
