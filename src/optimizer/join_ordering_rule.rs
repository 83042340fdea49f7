use std::rc::Rc;

use log::debug;

use crate::error::OptResult;
use crate::join_ordering::{JoinGraph, JoinGraphBuilder, JoinOrderingAlgorithm};
use crate::optimizer::Rule;
use crate::plan::{Plan, PlanGraph, PlanNode, PlanNodeRef};

/// Reorders the joins of a plan.
///
/// The topmost join graph is replaced by the plan the algorithm finds for it, and vertices containing
/// join graphs themselves, e.g. below a limit, are optimized the same way.
pub struct JoinOrderingRule {
    algorithm: Box<dyn JoinOrderingAlgorithm>,
}

impl JoinOrderingRule {
    pub fn new(algorithm: Box<dyn JoinOrderingAlgorithm>) -> Self {
        Self { algorithm }
    }

    fn optimize_subtree(&self, node: &PlanNodeRef) -> OptResult<PlanNodeRef> {
        if !node.operator().is_join_graph_node() {
            return self.optimize_inputs(node);
        }

        let join_graph = JoinGraphBuilder::build(node, vec![])?;
        if let [vertex] = join_graph.vertices() {
            if vertex.id() == node.id() {
                return self.optimize_inputs(node);
            }
        }

        let vertices = join_graph
            .vertices()
            .iter()
            .map(|v| self.optimize_subtree(v))
            .collect::<OptResult<Vec<_>>>()?;
        let join_graph = JoinGraph::new(
            vertices,
            join_graph.edges().to_vec(),
            join_graph.output_relations().to_vec(),
        )?;

        let plan = self.algorithm.optimize(&join_graph)?;
        debug!(
            "{} ordered {} vertices below #{}, cost {}",
            self.algorithm.name(),
            join_graph.vertices().len(),
            node.id(),
            plan.plan_cost()
        );
        plan.to_lqp()
    }

    /// `node` with optimized inputs, `node` itself if none of them changed.
    fn optimize_inputs(&self, node: &PlanNodeRef) -> OptResult<PlanNodeRef> {
        let inputs = node
            .inputs()
            .iter()
            .map(|input| self.optimize_subtree(input))
            .collect::<OptResult<Vec<_>>>()?;
        let unchanged = inputs
            .iter()
            .zip(node.inputs())
            .all(|(new, old)| Rc::ptr_eq(new, old));
        if unchanged {
            return Ok(node.clone());
        }
        Ok(Rc::new(PlanNode::new(
            node.id(),
            node.operator().clone(),
            inputs,
        )))
    }
}

impl Rule for JoinOrderingRule {
    fn name(&self) -> &str {
        "JoinOrderingRule"
    }

    fn apply(&self, plan: Plan) -> OptResult<Plan> {
        let (root, output_relations) = match JoinGraphBuilder::find_root(&plan) {
            Some(found) => found,
            None => return Ok(plan),
        };

        let optimized = self.optimize_subtree(&root)?;
        let mut graph = PlanGraph::from(&plan);
        if output_relations.is_empty() {
            graph.set_root(&optimized);
        }
        for relation in &output_relations {
            graph.set_input(relation.parent(), relation.side(), &optimized)?;
        }
        graph.to_plan()
    }
}
