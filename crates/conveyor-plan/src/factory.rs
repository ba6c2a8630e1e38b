//! Allocation of identified plan nodes.

use crate::plan::{Plan, PlanStep};

/// Hands out plan nodes with monotonically unique IDs.
///
/// One factory exists per compilation; it is threaded by `&mut` through every
/// recursive call, so concurrent builds are independent by construction. The
/// seed only separates ID ranges of unrelated factories (a build ID or
/// timestamp works fine); it carries no security meaning.
#[derive(Debug)]
pub struct PlanFactory {
    counter: i64,
}

impl PlanFactory {
    pub fn new(seed: i64) -> Self {
        PlanFactory { counter: seed }
    }

    /// Wrap a step variant into an identified node. Never fails, never
    /// reuses an ID within this factory's lifetime.
    pub fn new_plan(&mut self, step: PlanStep) -> Plan {
        self.counter += 1;
        Plan {
            id: self.counter.to_string(),
            step,
        }
    }
}
