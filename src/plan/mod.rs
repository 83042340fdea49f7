//! The logical plan DAG the join ordering core consumes and produces.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::mem::swap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::expr::{ColumnId, ColumnRef, DataType, Operand, PredicateCondition};
use crate::operator::{
    ColumnDefinition, Join, JoinCondition, Limit, LogicalOperator, Predicate, TableScan, Union,
};

mod graph;
pub use graph::*;

pub type PlanNodeId = u32;

pub type PlanNodeRef = Rc<PlanNode>;

static NEXT_PLAN_NODE_ID: AtomicU32 = AtomicU32::new(1);

/// Allocates a process wide unique plan node id.
///
/// Column references point at the table scan producing them by id, so ids must not collide between
/// plans that are later combined.
pub fn next_plan_node_id() -> PlanNodeId {
    NEXT_PLAN_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// One node in a plan.
#[derive(Debug)]
pub struct PlanNode {
    id: PlanNodeId,
    operator: LogicalOperator,
    inputs: Vec<PlanNodeRef>,
}

/// The `eq` should ignore `id`.
impl PartialEq for PlanNode {
    fn eq(&self, other: &Self) -> bool {
        self.operator == other.operator && self.inputs == other.inputs
    }
}

/// A query plan.
///
/// A query plan is a single root dag(directed acyclic graph).
#[derive(PartialEq, Debug)]
pub struct Plan {
    root: PlanNodeRef,
}

/// Breath first iterator of a single root dag plan.
struct BFSPlanNodeIter {
    visited: HashSet<PlanNodeId>,
    cur_level: Vec<PlanNodeRef>,
    next_level: Vec<PlanNodeRef>,
}

impl Iterator for BFSPlanNodeIter {
    type Item = PlanNodeRef;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur_level.is_empty() {
            swap(&mut self.cur_level, &mut self.next_level);
            // Pop from the back while keeping left inputs first.
            self.cur_level.reverse();
        }

        if let Some(p) = self.cur_level.pop() {
            for input in &p.inputs {
                if self.visited.insert(input.id) {
                    self.next_level.push(input.clone());
                }
            }

            Some(p)
        } else {
            None
        }
    }
}

impl Plan {
    pub fn new(root: PlanNodeRef) -> Self {
        Self { root }
    }

    pub fn root(&self) -> PlanNodeRef {
        self.root.clone()
    }

    pub fn bfs_iterator(&self) -> impl Iterator<Item = PlanNodeRef> {
        self.root.bfs_iterator()
    }
}

impl Display for Plan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.root.fmt_tree(f, 0)
    }
}

impl PlanNode {
    pub fn new(id: PlanNodeId, operator: LogicalOperator, inputs: Vec<PlanNodeRef>) -> Self {
        Self {
            id,
            operator,
            inputs,
        }
    }

    /// Creates a node with a fresh id.
    pub fn new_ref(operator: LogicalOperator, inputs: Vec<PlanNodeRef>) -> PlanNodeRef {
        Rc::new(Self::new(next_plan_node_id(), operator, inputs))
    }

    pub fn operator(&self) -> &LogicalOperator {
        &self.operator
    }

    pub fn id(&self) -> PlanNodeId {
        self.id
    }

    pub fn inputs(&self) -> &[PlanNodeRef] {
        &self.inputs
    }

    pub fn left_input(&self) -> Option<&PlanNodeRef> {
        self.inputs.get(0)
    }

    pub fn right_input(&self) -> Option<&PlanNodeRef> {
        self.inputs.get(1)
    }

    pub fn bfs_iterator(self: &Rc<Self>) -> impl Iterator<Item = PlanNodeRef> {
        let mut visited = HashSet::new();
        visited.insert(self.id);

        BFSPlanNodeIter {
            cur_level: vec![self.clone()],
            next_level: vec![],
            visited,
        }
    }

    /// Columns produced by this node, in output order.
    pub fn output_column_references(&self) -> Vec<ColumnRef> {
        match &self.operator {
            LogicalOperator::TableScan(scan) => (0..scan.columns().len())
                .map(|column| ColumnRef::new(self.id, column))
                .collect(),
            LogicalOperator::Join(_) => self
                .inputs
                .iter()
                .flat_map(|input| input.output_column_references())
                .collect(),
            LogicalOperator::Predicate(_) | LogicalOperator::Union(_) | LogicalOperator::Limit(_) => {
                self.left_input()
                    .map(|input| input.output_column_references())
                    .unwrap_or_default()
            }
        }
    }

    pub fn find_output_column_id(&self, column: &ColumnRef) -> Option<ColumnId> {
        self.output_column_references()
            .iter()
            .position(|c| c == column)
    }

    /// Finds the table scan producing `column` in this subtree.
    fn find_scan(&self, column: &ColumnRef) -> Option<&TableScan> {
        if self.id == column.node() {
            return self.operator.as_table_scan();
        }
        self.inputs.iter().find_map(|input| input.find_scan(column))
    }

    fn find_column_definition(&self, column: &ColumnRef) -> Option<&ColumnDefinition> {
        self.find_scan(column)
            .and_then(|scan| scan.columns().get(column.column()))
    }

    pub fn column_data_type(&self, column: &ColumnRef) -> Option<DataType> {
        self.find_column_definition(column).map(|c| c.data_type())
    }

    /// Process independent name of a column, e.g. `nation.n_name`.
    pub fn describe_column(&self, column: &ColumnRef) -> Option<String> {
        let scan = self.find_scan(column)?;
        let definition = scan.columns().get(column.column())?;
        Some(format!("{}.{}", scan.table_name(), definition.name()))
    }

    /// Process independent description of the whole subtree.
    pub fn description(&self) -> String {
        let own = match &self.operator {
            LogicalOperator::TableScan(scan) => return scan.to_string(),
            LogicalOperator::Predicate(p) => {
                let describe = |c: &ColumnRef| {
                    self.describe_column(c).unwrap_or_else(|| c.to_string())
                };
                let operand = match p.operand() {
                    Operand::Column(c) => describe(c),
                    Operand::Value(v) => v.to_string(),
                };
                format!("[Predicate] {} {} {}", describe(&p.column()), p.condition(), operand)
            }
            other => other.to_string(),
        };
        let inputs: Vec<String> = self.inputs.iter().map(|i| i.description()).collect();
        format!("{}({})", own, inputs.join(", "))
    }

    fn fmt_tree(&self, f: &mut Formatter<'_>, depth: usize) -> std::fmt::Result {
        writeln!(f, "{:indent$}{} #{}", "", self.operator, self.id, indent = depth * 2)?;
        for input in &self.inputs {
            input.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

/// Builds logical plans bottom up.
///
/// ```ignore
/// let plan = LogicalPlanBuilder::scan(nation)
///     .predicate(n_regionkey, PredicateCondition::Equals, Value::from(1))
///     .cross_join(region)
///     .build();
/// ```
pub struct LogicalPlanBuilder {
    root: PlanNodeRef,
}

impl LogicalPlanBuilder {
    pub fn scan(table_scan: TableScan) -> Self {
        Self::from(PlanNode::new_ref(
            LogicalOperator::TableScan(table_scan),
            vec![],
        ))
    }

    fn reset_root(mut self, operator: LogicalOperator, mut inputs: Vec<PlanNodeRef>) -> Self {
        inputs.insert(0, self.root);
        self.root = PlanNode::new_ref(operator, inputs);
        self
    }

    pub fn predicate<O: Into<Operand>>(
        self,
        column: ColumnRef,
        condition: PredicateCondition,
        operand: O,
    ) -> Self {
        let predicate = Predicate::new(column, condition, operand);
        self.reset_root(LogicalOperator::Predicate(predicate), vec![])
    }

    pub fn join(
        self,
        left: ColumnRef,
        condition: PredicateCondition,
        right: ColumnRef,
        right_input: PlanNodeRef,
    ) -> Self {
        let join = Join::inner(JoinCondition::new(left, condition, right));
        self.reset_root(LogicalOperator::Join(join), vec![right_input])
    }

    pub fn cross_join(self, right_input: PlanNodeRef) -> Self {
        self.reset_root(LogicalOperator::Join(Join::cross()), vec![right_input])
    }

    pub fn union_positions(self, right_input: PlanNodeRef) -> Self {
        self.reset_root(LogicalOperator::Union(Union::positions()), vec![right_input])
    }

    pub fn limit(self, row_count: usize) -> Self {
        self.reset_root(LogicalOperator::Limit(Limit::new(row_count)), vec![])
    }

    /// Current root, useful for building multi child plans, e.g. join.
    pub fn node(&self) -> PlanNodeRef {
        self.root.clone()
    }

    pub fn build(self) -> Plan {
        Plan::new(self.root)
    }
}

impl From<PlanNodeRef> for LogicalPlanBuilder {
    fn from(root: PlanNodeRef) -> Self {
        Self { root }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Value;

    fn scan(name: &str) -> PlanNodeRef {
        LogicalPlanBuilder::scan(TableScan::new(
            name,
            vec![
                ColumnDefinition::new("a", DataType::Int),
                ColumnDefinition::new("b", DataType::String),
            ],
        ))
        .node()
    }

    #[test]
    fn test_output_columns() {
        let x = scan("x");
        let y = scan("y");
        let plan = LogicalPlanBuilder::from(x.clone())
            .predicate(
                ColumnRef::new(x.id(), 0),
                PredicateCondition::GreaterThan,
                Value::from(3),
            )
            .cross_join(y.clone())
            .build();

        let columns = plan.root().output_column_references();
        assert_eq!(4, columns.len());
        assert_eq!(Some(2), plan.root().find_output_column_id(&ColumnRef::new(y.id(), 0)));
        assert_eq!(
            Some("y.b".to_string()),
            plan.root().describe_column(&ColumnRef::new(y.id(), 1))
        );
        assert_eq!(
            Some(DataType::String),
            plan.root().column_data_type(&ColumnRef::new(x.id(), 1))
        );
        assert_eq!(None, x.find_output_column_id(&ColumnRef::new(y.id(), 0)));
    }

    #[test]
    fn test_bfs_iterator() {
        let x = scan("x");
        let y = scan("y");
        let plan = LogicalPlanBuilder::from(x.clone())
            .cross_join(y.clone())
            .limit(10)
            .build();

        let ids: Vec<PlanNodeId> = plan.bfs_iterator().map(|n| n.id()).collect();
        assert_eq!(4, ids.len());
        assert_eq!(plan.root().id(), ids[0]);
        assert_eq!(vec![x.id(), y.id()], ids[2..].to_vec());
    }

    #[test]
    fn test_description_is_id_independent() {
        let first = LogicalPlanBuilder::from(scan("x")).limit(3).node();
        let second = LogicalPlanBuilder::from(scan("x")).limit(3).node();
        assert_ne!(first.id(), second.id());
        assert_eq!(first.description(), second.description());
        assert_eq!(*first, *second);
    }
}
