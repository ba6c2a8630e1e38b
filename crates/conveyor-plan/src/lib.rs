//! Build plan factory: compiles job step sequences into executable plan trees.
//!
//! This crate implements the core Conveyor transform: a job's declared steps,
//! the pipeline's resource tables, and the versions resolved for a build go
//! in; a uniquely-identified, immutable, JSON-serializable [`Plan`] tree
//! comes out for the execution engine to interpret. It also carries the
//! generic tree walker and the pipeline lint rules.

pub mod compile;
pub mod factory;
pub mod hooks;
pub mod plan;
pub mod validate;
pub mod walk;

pub use compile::compile;
pub use factory::PlanFactory;
pub use plan::{
    CheckPlan, GetPlan, HookPlan, InParallelPlan, InterruptPlan, LoadVarPlan, Plan, PlanId,
    PlanStep, PutPlan, SetPipelinePlan, TaskPlan, TimeoutPlan,
};
pub use validate::{validate, validate_or_raise, Diagnostic, LintRule, Severity};
pub use walk::{attach_resource_types, collect_ids, matches_ignoring_ids, strip_ids, walk, walk_mut};
