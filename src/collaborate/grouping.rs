//! Step grouping for grouped execution
//!
//! Steps inside one group run concurrently and see the same context; groups
//! run one after another. Plans carry no dependency metadata, so the only
//! strategy shipped is `Sequential`.

use crate::collaborate::plan::PlanStep;

/// Splits a plan into ordered groups of steps
pub trait GroupingStrategy: Send + Sync {
    /// Every step must appear in exactly one group, in plan order.
    fn group(&self, plan: &[PlanStep]) -> Vec<Vec<PlanStep>>;

    fn name(&self) -> &str;
}

/// One step per group
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl GroupingStrategy for Sequential {
    fn group(&self, plan: &[PlanStep]) -> Vec<Vec<PlanStep>> {
        plan.iter().cloned().map(|step| vec![step]).collect()
    }

    fn name(&self) -> &str {
        "sequential"
    }
}
