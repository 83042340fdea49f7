use crate::join_ordering::{JoinPlanPredicate, LogicalPredicateOperator};
use crate::plan::{LogicalPlanBuilder, PlanNodeRef};

/// Logical plan applying `predicate` on top of `input`.
///
/// Conjunctions become chained predicate nodes and disjunctions a positional union of both branches.
pub fn build_lqp_for_predicate(predicate: &JoinPlanPredicate, input: PlanNodeRef) -> PlanNodeRef {
    match predicate {
        JoinPlanPredicate::Atomic(atomic) => LogicalPlanBuilder::from(input)
            .predicate(
                atomic.left_operand(),
                atomic.condition(),
                atomic.right_operand().clone(),
            )
            .node(),
        JoinPlanPredicate::Logical(logical) => match logical.operator() {
            LogicalPredicateOperator::And => {
                let left = build_lqp_for_predicate(logical.left(), input);
                build_lqp_for_predicate(logical.right(), left)
            }
            LogicalPredicateOperator::Or => {
                let left = build_lqp_for_predicate(logical.left(), input.clone());
                let right = build_lqp_for_predicate(logical.right(), input);
                LogicalPlanBuilder::from(left).union_positions(right).node()
            }
        },
    }
}
