//! Pipeline lint: advisory diagnostics over a pipeline document.
//!
//! The compiler assumes validated input; this module is the surrounding
//! component that does the validating. Call [`validate`] for advisory
//! diagnostics or [`validate_or_raise`] to fail on the first error-severity
//! finding.

use std::collections::HashSet;

use conveyor_types::{
    parse_duration, ConveyorError, PipelineConfig, StepConfig, StepShape,
};

// ---------------------------------------------------------------------------
// Diagnostic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub job: Option<String>,
    pub fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

// ---------------------------------------------------------------------------
// LintRule trait
// ---------------------------------------------------------------------------

pub trait LintRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, pipeline: &PipelineConfig) -> Vec<Diagnostic>;
}

/// Resource types workers provide out of the box; resources using them need
/// no `resource_types` entry.
const CORE_RESOURCE_TYPES: &[&str] = &[
    "git",
    "s3",
    "time",
    "semver",
    "registry-image",
    "github-release",
    "pool",
    "mock",
];

// ---------------------------------------------------------------------------
// Step traversal
// ---------------------------------------------------------------------------

/// Visit a step config and everything nested under it: grouped children and
/// all five hook bodies.
fn each_step<'a>(step: &'a StepConfig, f: &mut dyn FnMut(&'a StepConfig)) {
    f(step);
    match &step.shape {
        StepShape::Do(children) | StepShape::Aggregate(children) => {
            for child in children {
                each_step(child, f);
            }
        }
        StepShape::InParallel(ip) => {
            for child in &ip.steps {
                each_step(child, f);
            }
        }
        StepShape::Try(inner) => each_step(inner, f),
        StepShape::Get(_)
        | StepShape::Put(_)
        | StepShape::Task(_)
        | StepShape::SetPipeline(_)
        | StepShape::LoadVar(_) => {}
    }
    for hook in [
        &step.hooks.on_success,
        &step.hooks.on_failure,
        &step.hooks.on_abort,
        &step.hooks.on_error,
        &step.hooks.ensure,
    ]
    .into_iter()
    .flatten()
    {
        each_step(hook, f);
    }
}

/// Short display form of a step for messages, e.g. `get(repo)`.
fn step_label(step: &StepConfig) -> String {
    match &step.shape {
        StepShape::Get(get) => format!("get({})", get.name),
        StepShape::Put(put) => format!("put({})", put.name),
        StepShape::Task(task) => format!("task({})", task.name),
        StepShape::SetPipeline(sp) => format!("set_pipeline({})", sp.name),
        StepShape::LoadVar(lv) => format!("load_var({})", lv.name),
        StepShape::Do(_) => "do".into(),
        StepShape::Try(_) => "try".into(),
        StepShape::Aggregate(_) => "aggregate".into(),
        StepShape::InParallel(_) => "in_parallel".into(),
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct DuplicateNamesRule;
impl LintRule for DuplicateNamesRule {
    fn name(&self) -> &str {
        "duplicate_names"
    }
    fn apply(&self, pipeline: &PipelineConfig) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        let mut check = |kind: &str, names: Vec<&str>| {
            let mut seen = HashSet::new();
            for name in names {
                if !seen.insert(name) {
                    diags.push(Diagnostic {
                        rule: "duplicate_names".into(),
                        severity: Severity::Error,
                        message: format!("duplicate {kind} name '{name}'"),
                        job: None,
                        fix: Some(format!("rename one of the '{name}' {kind}s")),
                    });
                }
            }
        };
        check("job", pipeline.jobs.iter().map(|j| j.name.as_str()).collect());
        check(
            "resource",
            pipeline.resources.iter().map(|r| r.name.as_str()).collect(),
        );
        check(
            "resource type",
            pipeline
                .resource_types
                .iter()
                .map(|rt| rt.name.as_str())
                .collect(),
        );
        diags
    }
}

struct UnknownResourceRule;
impl LintRule for UnknownResourceRule {
    fn name(&self) -> &str {
        "unknown_resource"
    }
    fn apply(&self, pipeline: &PipelineConfig) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for job in &pipeline.jobs {
            for step in &job.plan {
                each_step(step, &mut |step| {
                    let referenced = match &step.shape {
                        StepShape::Get(get) => Some(get.resource_name()),
                        StepShape::Put(put) => Some(put.resource_name()),
                        _ => None,
                    };
                    if let Some(name) = referenced {
                        if pipeline.resources.lookup(name).is_none() {
                            diags.push(Diagnostic {
                                rule: "unknown_resource".into(),
                                severity: Severity::Error,
                                message: format!(
                                    "step {} references unknown resource '{name}'",
                                    step_label(step)
                                ),
                                job: Some(job.name.clone()),
                                fix: Some(format!("declare a resource named '{name}'")),
                            });
                        }
                    }
                });
            }
        }
        diags
    }
}

struct UnknownResourceTypeRule;
impl LintRule for UnknownResourceTypeRule {
    fn name(&self) -> &str {
        "unknown_resource_type"
    }
    fn apply(&self, pipeline: &PipelineConfig) -> Vec<Diagnostic> {
        let declared: HashSet<&str> = pipeline
            .resource_types
            .iter()
            .map(|rt| rt.name.as_str())
            .collect();
        pipeline
            .resources
            .iter()
            .filter(|r| {
                !declared.contains(r.type_name.as_str())
                    && !CORE_RESOURCE_TYPES.contains(&r.type_name.as_str())
            })
            .map(|r| Diagnostic {
                rule: "unknown_resource_type".into(),
                severity: Severity::Warning,
                message: format!(
                    "resource '{}' uses type '{}' which is neither a core type nor declared under resource_types",
                    r.name, r.type_name
                ),
                job: None,
                fix: Some(format!("declare a resource type named '{}'", r.type_name)),
            })
            .collect()
    }
}

struct DurationRule;
impl LintRule for DurationRule {
    fn name(&self) -> &str {
        "duration_format"
    }
    fn apply(&self, pipeline: &PipelineConfig) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for job in &pipeline.jobs {
            for step in &job.plan {
                each_step(step, &mut |step| {
                    for (field, value) in [("timeout", &step.timeout), ("interrupt", &step.interrupt)]
                    {
                        if let Some(value) = value {
                            if let Err(err) = parse_duration(value) {
                                diags.push(Diagnostic {
                                    rule: "duration_format".into(),
                                    severity: Severity::Error,
                                    message: format!(
                                        "step {} has unparseable {field}: {err}",
                                        step_label(step)
                                    ),
                                    job: Some(job.name.clone()),
                                    fix: Some("use a number with an ms/s/m/h/d suffix".into()),
                                });
                            }
                        }
                    }
                });
            }
        }
        diags
    }
}

struct EmptyGroupRule;
impl LintRule for EmptyGroupRule {
    fn name(&self) -> &str {
        "empty_group"
    }
    fn apply(&self, pipeline: &PipelineConfig) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for job in &pipeline.jobs {
            for step in &job.plan {
                each_step(step, &mut |step| {
                    let empty = match &step.shape {
                        StepShape::Do(children) | StepShape::Aggregate(children) => {
                            children.is_empty()
                        }
                        StepShape::InParallel(ip) => ip.steps.is_empty(),
                        _ => false,
                    };
                    if empty {
                        diags.push(Diagnostic {
                            rule: "empty_group".into(),
                            severity: Severity::Warning,
                            message: format!("step {} has no children", step_label(step)),
                            job: Some(job.name.clone()),
                            fix: Some("remove the empty group or add steps to it".into()),
                        });
                    }
                });
            }
        }
        diags
    }
}

struct ParallelLimitRule;
impl LintRule for ParallelLimitRule {
    fn name(&self) -> &str {
        "parallel_limit"
    }
    fn apply(&self, pipeline: &PipelineConfig) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for job in &pipeline.jobs {
            for step in &job.plan {
                each_step(step, &mut |step| {
                    if let StepShape::InParallel(ip) = &step.shape {
                        if ip.limit == Some(0) {
                            diags.push(Diagnostic {
                                rule: "parallel_limit".into(),
                                severity: Severity::Error,
                                message: "in_parallel limit of 0 would never run any step".into(),
                                job: Some(job.name.clone()),
                                fix: Some("use a positive limit or drop the limit".into()),
                            });
                        }
                    }
                });
            }
        }
        diags
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

fn all_rules() -> Vec<Box<dyn LintRule>> {
    vec![
        Box::new(DuplicateNamesRule),
        Box::new(UnknownResourceRule),
        Box::new(UnknownResourceTypeRule),
        Box::new(DurationRule),
        Box::new(EmptyGroupRule),
        Box::new(ParallelLimitRule),
    ]
}

/// Run every lint rule and collect the diagnostics.
pub fn validate(pipeline: &PipelineConfig) -> Vec<Diagnostic> {
    let mut diags = Vec::new();
    for rule in all_rules() {
        diags.extend(rule.apply(pipeline));
    }
    for diag in &diags {
        if diag.severity == Severity::Warning {
            tracing::warn!(rule = %diag.rule, "{}", diag.message);
        }
    }
    diags
}

/// Like [`validate`], but fails with the first error-severity finding.
pub fn validate_or_raise(pipeline: &PipelineConfig) -> conveyor_types::Result<Vec<Diagnostic>> {
    let diags = validate(pipeline);
    if let Some(err) = diags.iter().find(|d| d.severity == Severity::Error) {
        return Err(ConveyorError::ValidationFailed(err.message.clone()));
    }
    Ok(diags)
}
