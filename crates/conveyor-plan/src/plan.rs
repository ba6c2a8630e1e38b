//! The compiled plan tree.
//!
//! A [`Plan`] is one node of the execution tree handed to the engine: a
//! globally-unique ID plus exactly one [`PlanStep`] variant. The tree is
//! built once per build, is immutable afterwards, and serializes to JSON as
//! the wire contract shipped to workers, so the field names here are stable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use conveyor_types::{
    Params, PutInputs, Source, Tags, VarFormat, Vars, Version, VersionedResourceTypes,
};

/// Unique identifier of a plan node within one compiled tree.
pub type PlanId = String;

/// One node of the compiled execution tree.
///
/// On the wire the step variant is flattened next to the ID:
/// `{"id": "7", "get": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    #[serde(flatten)]
    pub step: PlanStep,
}

impl Plan {
    /// Short name of the populated variant, for logs and UI.
    pub fn step_name(&self) -> &'static str {
        match &self.step {
            PlanStep::Get(_) => "get",
            PlanStep::Put(_) => "put",
            PlanStep::Check(_) => "check",
            PlanStep::Task(_) => "task",
            PlanStep::SetPipeline(_) => "set_pipeline",
            PlanStep::LoadVar(_) => "load_var",
            PlanStep::Do(_) => "do",
            PlanStep::Aggregate(_) => "aggregate",
            PlanStep::InParallel(_) => "in_parallel",
            PlanStep::Retry(_) => "retry",
            PlanStep::Try(_) => "try",
            PlanStep::Timeout(_) => "timeout",
            PlanStep::Interrupt(_) => "interrupt",
            PlanStep::OnSuccess(_) => "on_success",
            PlanStep::OnFailure(_) => "on_failure",
            PlanStep::OnAbort(_) => "on_abort",
            PlanStep::OnError(_) => "on_error",
            PlanStep::Ensure(_) => "ensure",
        }
    }

    /// Leaves carry work; everything else composes other plans.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self.step,
            PlanStep::Get(_)
                | PlanStep::Put(_)
                | PlanStep::Check(_)
                | PlanStep::Task(_)
                | PlanStep::SetPipeline(_)
                | PlanStep::LoadVar(_)
        )
    }
}

/// The tagged union of every operation the engine knows how to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStep {
    Get(GetPlan),
    Put(PutPlan),
    Check(CheckPlan),
    Task(TaskPlan),
    SetPipeline(SetPipelinePlan),
    LoadVar(LoadVarPlan),
    /// Strictly sequential children.
    Do(Vec<Plan>),
    /// Unbounded parallel children.
    Aggregate(Vec<Plan>),
    InParallel(InParallelPlan),
    /// One child per attempt, run in order until one succeeds.
    Retry(Vec<Plan>),
    /// Child failure is non-fatal to siblings.
    Try(Box<Plan>),
    Timeout(TimeoutPlan),
    /// Soft-timeout variant: the engine interrupts rather than kills.
    Interrupt(InterruptPlan),
    OnSuccess(HookPlan),
    OnFailure(HookPlan),
    OnAbort(HookPlan),
    OnError(HookPlan),
    Ensure(HookPlan),
}

impl PlanStep {
    /// Mutable access to the denormalized resource-type list, for the nodes
    /// that carry one. Used by rewriting passes before serialization.
    pub fn resource_types_mut(&mut self) -> Option<&mut VersionedResourceTypes> {
        match self {
            PlanStep::Get(get) => Some(&mut get.resource_types),
            PlanStep::Put(put) => Some(&mut put.resource_types),
            PlanStep::Check(check) => Some(&mut check.resource_types),
            PlanStep::Task(task) => Some(&mut task.resource_types),
            _ => None,
        }
    }
}

/// Fetch one version of a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetPlan {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Source::is_empty")]
    pub source: Source,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
    /// Version selected for this build, or unset for "any version".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    /// Backlink to the put whose produced version this get fetches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_from: Option<PlanId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: VersionedResourceTypes,
}

/// Push to a resource. Always paired with a dependent [`GetPlan`] under an
/// `OnSuccess` wrapper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PutPlan {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Source::is_empty")]
    pub source: Source,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<PutInputs>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: VersionedResourceTypes,
}

/// Discover new versions of a resource. Emitted by the engine's check
/// scheduling, not by job compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckPlan {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Source::is_empty")]
    pub source: Source,
    /// Version to check from, usually the latest known one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_version: Option<Version>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: VersionedResourceTypes,
}

/// Run a task container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPlan {
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub privileged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vars::is_empty")]
    pub vars: Vars,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_mapping: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub output_mapping: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: VersionedResourceTypes,
}

/// Replace another pipeline's configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetPipelinePlan {
    pub name: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Vars::is_empty")]
    pub vars: Vars,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub var_files: Vec<String>,
}

/// Read a file into a build-local var.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadVarPlan {
    pub name: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<VarFormat>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reveal: bool,
}

/// Bounded parallel execution of children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InParallelPlan {
    pub steps: Vec<Plan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fail_fast: bool,
}

/// Hard time limit on a child plan. The duration stays a string on the wire;
/// enforcement is the engine's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutPlan {
    pub step: Box<Plan>,
    pub duration: String,
}

/// Soft time limit on a child plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptPlan {
    pub step: Box<Plan>,
    pub duration: String,
}

/// Binary wrapper for lifecycle hooks: run `step`, then conditionally `next`.
/// Both sides are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookPlan {
    pub step: Box<Plan>,
    pub next: Box<Plan>,
}
