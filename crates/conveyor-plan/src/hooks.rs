//! Lifecycle-hook composition.
//!
//! Hooks wrap an already-compiled step in a fixed nesting order: abort,
//! error, failure, success, ensure. Each stage rewraps the previous result,
//! so `ensure` (when present) ends up outermost and observes the outcome of
//! everything nested inside it, including the other hooks. Hook bodies are
//! full step configs and recurse through the whole compiler.

use conveyor_types::{Result, StepHooks};

use crate::compile::PlanCompiler;
use crate::plan::{HookPlan, Plan, PlanStep};

impl<'a> PlanCompiler<'a> {
    /// Wrap `plan` with the step's declared hooks. A failure compiling any
    /// hook body aborts the whole call; no partially-hooked plan escapes.
    pub(crate) fn apply_hooks(&mut self, plan: Plan, hooks: &StepHooks) -> Result<Plan> {
        let mut current = plan;

        if let Some(abort) = &hooks.on_abort {
            let next = self.compile_step(abort)?;
            current = self.wrap(current, next, PlanStep::OnAbort);
        }
        if let Some(error) = &hooks.on_error {
            let next = self.compile_step(error)?;
            current = self.wrap(current, next, PlanStep::OnError);
        }
        if let Some(failure) = &hooks.on_failure {
            let next = self.compile_step(failure)?;
            current = self.wrap(current, next, PlanStep::OnFailure);
        }
        if let Some(success) = &hooks.on_success {
            let next = self.compile_step(success)?;
            current = self.wrap(current, next, PlanStep::OnSuccess);
        }
        if let Some(ensure) = &hooks.ensure {
            let next = self.compile_step(ensure)?;
            current = self.wrap(current, next, PlanStep::Ensure);
        }

        Ok(current)
    }

    fn wrap(&mut self, step: Plan, next: Plan, variant: fn(HookPlan) -> PlanStep) -> Plan {
        self.factory.new_plan(variant(HookPlan {
            step: Box::new(step),
            next: Box::new(next),
        }))
    }
}
