use std::fmt::{Display, Formatter};
use std::io::Write;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use enum_as_inner::EnumAsInner;
use prettytable::Table;

use crate::cardinality::Cardinality;
use crate::cost::Cost;
use crate::error::{OptResult, OptimizerError};
use crate::expr::Operand;
use crate::join_ordering::{
    build_lqp_for_predicate, BaseJoinGraph, JoinPlanAtomicPredicate, JoinPlanPredicateRef,
};
use crate::operator::{Join, JoinCondition, LogicalOperator};
use crate::plan::{PlanNode, PlanNodeRef};

pub type JoinPlanNodeId = u32;
pub type JoinPlanNodeRef = Rc<JoinPlanNode>;

static NEXT_JOIN_PLAN_NODE_ID: AtomicU32 = AtomicU32::new(0);

/// A single vertex with its local predicates applied.
#[derive(Debug)]
pub struct JoinPlanVertexNode {
    vertex: PlanNodeRef,
    predicates: Vec<JoinPlanPredicateRef>,
}

impl JoinPlanVertexNode {
    pub fn vertex(&self) -> &PlanNodeRef {
        &self.vertex
    }

    pub fn predicates(&self) -> &[JoinPlanPredicateRef] {
        &self.predicates
    }
}

/// Binary join of two subplans.
///
/// Without a primary predicate the join is a cross product, secondary predicates are applied on top
/// of the join.
#[derive(Debug)]
pub struct JoinPlanJoinNode {
    left: JoinPlanNodeRef,
    right: JoinPlanNodeRef,
    primary_predicate: Option<JoinPlanAtomicPredicate>,
    secondary_predicates: Vec<JoinPlanPredicateRef>,
}

impl JoinPlanJoinNode {
    pub fn left(&self) -> &JoinPlanNodeRef {
        &self.left
    }

    pub fn right(&self) -> &JoinPlanNodeRef {
        &self.right
    }

    pub fn primary_predicate(&self) -> Option<&JoinPlanAtomicPredicate> {
        self.primary_predicate.as_ref()
    }

    pub fn secondary_predicates(&self) -> &[JoinPlanPredicateRef] {
        &self.secondary_predicates
    }
}

#[derive(Debug, EnumAsInner)]
pub enum JoinPlanNodeKind {
    Vertex(JoinPlanVertexNode),
    Join(JoinPlanJoinNode),
}

/// Candidate plan built during join ordering, immutable and shared between all candidates using it
/// as a subplan.
#[derive(Debug)]
pub struct JoinPlanNode {
    id: JoinPlanNodeId,
    kind: JoinPlanNodeKind,
    join_graph: BaseJoinGraph,
    output_row_count: Cardinality,
    node_cost: Cost,
    plan_cost: Cost,
}

impl JoinPlanNode {
    pub(crate) fn new_vertex(
        vertex: PlanNodeRef,
        predicates: Vec<JoinPlanPredicateRef>,
        join_graph: BaseJoinGraph,
        output_row_count: Cardinality,
        node_cost: Cost,
    ) -> JoinPlanNodeRef {
        Rc::new(Self {
            id: NEXT_JOIN_PLAN_NODE_ID.fetch_add(1, Ordering::Relaxed),
            kind: JoinPlanNodeKind::Vertex(JoinPlanVertexNode { vertex, predicates }),
            join_graph,
            output_row_count,
            node_cost,
            plan_cost: node_cost,
        })
    }

    pub(crate) fn new_join(
        left: JoinPlanNodeRef,
        right: JoinPlanNodeRef,
        primary_predicate: Option<JoinPlanAtomicPredicate>,
        secondary_predicates: Vec<JoinPlanPredicateRef>,
        join_graph: BaseJoinGraph,
        output_row_count: Cardinality,
        node_cost: Cost,
    ) -> JoinPlanNodeRef {
        let plan_cost = node_cost + left.plan_cost + right.plan_cost;
        Rc::new(Self {
            id: NEXT_JOIN_PLAN_NODE_ID.fetch_add(1, Ordering::Relaxed),
            kind: JoinPlanNodeKind::Join(JoinPlanJoinNode {
                left,
                right,
                primary_predicate,
                secondary_predicates,
            }),
            join_graph,
            output_row_count,
            node_cost,
            plan_cost,
        })
    }

    /// Unique per process, used to order plans of equal cost.
    pub fn id(&self) -> JoinPlanNodeId {
        self.id
    }

    pub fn kind(&self) -> &JoinPlanNodeKind {
        &self.kind
    }

    /// Vertices and predicates this plan covers.
    pub fn join_graph(&self) -> &BaseJoinGraph {
        &self.join_graph
    }

    pub fn output_row_count(&self) -> Cardinality {
        self.output_row_count
    }

    /// Cost of this node alone.
    pub fn node_cost(&self) -> Cost {
        self.node_cost
    }

    /// Cost of this node and all its inputs.
    pub fn plan_cost(&self) -> Cost {
        self.plan_cost
    }

    pub fn children(&self) -> Vec<&JoinPlanNodeRef> {
        match &self.kind {
            JoinPlanNodeKind::Vertex(_) => vec![],
            JoinPlanNodeKind::Join(join) => vec![&join.left, &join.right],
        }
    }

    /// One line description of the plan tree.
    pub fn description(&self) -> String {
        match &self.kind {
            JoinPlanNodeKind::Vertex(vertex) => {
                let mut description = vertex.vertex.description();
                for predicate in &vertex.predicates {
                    description = format!("{} WHERE {}", description, predicate);
                }
                description
            }
            JoinPlanNodeKind::Join(join) => {
                let condition = match &join.primary_predicate {
                    Some(p) => format!("JOIN ON {} {} {}", p.left_operand(), p.condition(), p.right_operand()),
                    None => "CROSS JOIN".to_string(),
                };
                let mut description = format!(
                    "({}) {} ({})",
                    join.left.description(),
                    condition,
                    join.right.description()
                );
                for predicate in &join.secondary_predicates {
                    description = format!("{} WHERE {}", description, predicate);
                }
                description
            }
        }
    }

    /// Prints each node of the plan tree with its estimates as a table.
    pub fn print(&self, out: &mut dyn Write) -> OptResult<()> {
        let mut table = Table::new();
        table.set_titles(row!["Node", "Rows", "Node cost", "Plan cost"]);
        self.add_table_rows(&mut table, 0);
        table.print(out)?;
        Ok(())
    }

    fn add_table_rows(&self, table: &mut Table, depth: usize) {
        let label = match &self.kind {
            JoinPlanNodeKind::Vertex(vertex) => vertex.vertex.operator().to_string(),
            JoinPlanNodeKind::Join(join) => match &join.primary_predicate {
                Some(p) => format!("[Join] {} {} {}", p.left_operand(), p.condition(), p.right_operand()),
                None => "[Join] Cross".to_string(),
            },
        };
        table.add_row(row![
            format!("{:indent$}{}", "", label, indent = depth * 2),
            self.output_row_count,
            self.node_cost,
            self.plan_cost
        ]);
        for child in self.children() {
            child.add_table_rows(table, depth + 1);
        }
    }

    /// Materializes this plan as a logical plan.
    pub fn to_lqp(&self) -> OptResult<PlanNodeRef> {
        let (mut root, predicates) = match &self.kind {
            JoinPlanNodeKind::Vertex(vertex) => (vertex.vertex.clone(), &vertex.predicates),
            JoinPlanNodeKind::Join(join) => {
                let left = join.left.to_lqp()?;
                let right = join.right.to_lqp()?;
                let operator = match &join.primary_predicate {
                    Some(primary) => {
                        let right_column = match primary.right_operand() {
                            Operand::Column(c) => *c,
                            Operand::Value(v) => {
                                return Err(OptimizerError::PredicateNotApplicable(format!(
                                    "primary join predicate compares with value {}",
                                    v
                                ))
                                .into())
                            }
                        };
                        Join::inner(JoinCondition::new(
                            primary.left_operand(),
                            primary.condition(),
                            right_column,
                        ))
                    }
                    None => Join::cross(),
                };
                (
                    PlanNode::new_ref(LogicalOperator::Join(operator), vec![left, right]),
                    &join.secondary_predicates,
                )
            }
        };

        for predicate in predicates {
            root = build_lqp_for_predicate(predicate, root);
        }
        Ok(root)
    }
}

impl Display for JoinPlanNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [cost: {}]", self.description(), self.plan_cost)
    }
}
