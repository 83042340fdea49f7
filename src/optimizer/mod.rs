//! Rule based rewriting of logical plans.
//!
//! The optimizer runs a batch of rules over a plan, each rule consuming the plan produced by the
//! previous one.

use log::debug;

use crate::error::OptResult;
use crate::plan::Plan;

mod join_ordering_rule;
pub use join_ordering_rule::*;

/// A rewrite of a whole logical plan.
pub trait Rule {
    fn name(&self) -> &str;

    /// Returns the rewritten plan, or `plan` itself if the rule doesn't apply.
    fn apply(&self, plan: Plan) -> OptResult<Plan>;
}

pub struct Optimizer {
    rules: Vec<Box<dyn Rule>>,
}

impl Optimizer {
    pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Box<dyn Rule>] {
        &self.rules
    }

    pub fn optimize(&self, plan: Plan) -> OptResult<Plan> {
        let mut plan = plan;
        for rule in &self.rules {
            debug!("Applying rule {}", rule.name());
            plan = rule.apply(plan)?;
            debug!("Plan after applying rule {} is {}", rule.name(), plan);
        }
        Ok(plan)
    }
}
