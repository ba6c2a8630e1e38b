//! The step compiler: job config in, identified plan tree out.
//!
//! Compilation is a pure recursive transform over immutable input tables.
//! The only mutable state is the [`PlanFactory`] ID counter, owned by the one
//! compiling call stack. The sole error is [`ConveyorError::ResourceNotFound`];
//! it propagates unchanged through every layer of recursion and no partial
//! tree is ever returned.

use conveyor_types::{
    BuildInput, ConveyorError, GetStep, JobConfig, PutStep, ResourceConfigs, Result, StepConfig,
    StepShape, TaskStep, VersionedResourceTypes,
};

use crate::factory::PlanFactory;
use crate::plan::{
    GetPlan, HookPlan, InParallelPlan, InterruptPlan, LoadVarPlan, Plan, PlanStep, PutPlan,
    SetPipelinePlan, TaskPlan, TimeoutPlan,
};

/// Compile a job's step sequence into a single plan tree.
///
/// `resources` and `resource_types` are the pipeline's lookup tables;
/// `inputs` holds the version selected for each pipeline-level input of this
/// specific build.
pub fn compile(
    job: &JobConfig,
    factory: &mut PlanFactory,
    resources: &ResourceConfigs,
    resource_types: &VersionedResourceTypes,
    inputs: &[BuildInput],
) -> Result<Plan> {
    tracing::debug!(job = %job.name, steps = job.plan.len(), "compiling build plan");
    let mut compiler = PlanCompiler {
        factory,
        resources,
        resource_types,
        inputs,
    };
    compiler.compile_sequence(&job.plan)
}

/// Per-compilation state threaded through every recursive call.
pub(crate) struct PlanCompiler<'a> {
    pub(crate) factory: &'a mut PlanFactory,
    resources: &'a ResourceConfigs,
    resource_types: &'a VersionedResourceTypes,
    inputs: &'a [BuildInput],
}

impl<'a> PlanCompiler<'a> {
    /// A one-element sequence collapses to its lone step; anything else
    /// becomes a `Do` holding the steps in declared order.
    fn compile_sequence(&mut self, steps: &[StepConfig]) -> Result<Plan> {
        if steps.len() == 1 {
            return self.compile_step(&steps[0]);
        }
        let mut children = Vec::with_capacity(steps.len());
        for step in steps {
            children.push(self.compile_step(step)?);
        }
        Ok(self.factory.new_plan(PlanStep::Do(children)))
    }

    /// Compile one step config: retry expansion first, hooks last, so hooks
    /// observe the whole retried/timed step rather than a single attempt.
    pub(crate) fn compile_step(&mut self, step: &StepConfig) -> Result<Plan> {
        let plan = if step.attempts > 0 {
            // Each attempt is compiled independently, not cloned, so every
            // attempt subtree carries its own IDs.
            let mut attempts = Vec::with_capacity(step.attempts);
            for _ in 0..step.attempts {
                attempts.push(self.compile_attempt(step)?);
            }
            self.factory.new_plan(PlanStep::Retry(attempts))
        } else {
            self.compile_attempt(step)?
        };

        self.apply_hooks(plan, &step.hooks)
    }

    /// One unhooked attempt: the step shape wrapped in its time limits.
    /// Limits sit inside the retry node so they re-arm on every attempt,
    /// with the soft interrupt inside the hard timeout.
    fn compile_attempt(&mut self, step: &StepConfig) -> Result<Plan> {
        let mut plan = self.compile_shape(step)?;
        if let Some(duration) = &step.interrupt {
            plan = self.factory.new_plan(PlanStep::Interrupt(InterruptPlan {
                step: Box::new(plan),
                duration: duration.clone(),
            }));
        }
        if let Some(duration) = &step.timeout {
            plan = self.factory.new_plan(PlanStep::Timeout(TimeoutPlan {
                step: Box::new(plan),
                duration: duration.clone(),
            }));
        }
        Ok(plan)
    }

    fn compile_shape(&mut self, step: &StepConfig) -> Result<Plan> {
        match &step.shape {
            StepShape::Get(get) => self.compile_get(get, step),
            StepShape::Put(put) => self.compile_put(put, step),
            StepShape::Task(task) => Ok(self.compile_task(task, step)),
            StepShape::SetPipeline(sp) => {
                Ok(self.factory.new_plan(PlanStep::SetPipeline(SetPipelinePlan {
                    name: sp.name.clone(),
                    file: sp.file.clone(),
                    vars: sp.vars.clone(),
                    var_files: sp.var_files.clone(),
                })))
            }
            StepShape::LoadVar(lv) => Ok(self.factory.new_plan(PlanStep::LoadVar(LoadVarPlan {
                name: lv.name.clone(),
                file: lv.file.clone(),
                format: lv.format,
                reveal: lv.reveal,
            }))),
            StepShape::Do(steps) => self.compile_sequence(steps),
            StepShape::Try(inner) => {
                let child = self.compile_step(inner)?;
                Ok(self.factory.new_plan(PlanStep::Try(Box::new(child))))
            }
            StepShape::Aggregate(steps) => {
                let mut children = Vec::with_capacity(steps.len());
                for child in steps {
                    children.push(self.compile_step(child)?);
                }
                Ok(self.factory.new_plan(PlanStep::Aggregate(children)))
            }
            StepShape::InParallel(ip) => {
                let mut children = Vec::with_capacity(ip.steps.len());
                for child in &ip.steps {
                    children.push(self.compile_step(child)?);
                }
                Ok(self.factory.new_plan(PlanStep::InParallel(InParallelPlan {
                    steps: children,
                    limit: ip.limit,
                    fail_fast: ip.fail_fast,
                })))
            }
        }
    }

    fn compile_get(&mut self, get: &GetStep, step: &StepConfig) -> Result<Plan> {
        let resource = self.resources.lookup(get.resource_name()).ok_or_else(|| {
            ConveyorError::ResourceNotFound {
                name: get.resource_name().to_string(),
            }
        })?;

        // The version selected for this build wins; a pinned config version
        // is the fallback; otherwise the get takes any version.
        let version = self
            .inputs
            .iter()
            .find(|input| input.name == get.name)
            .map(|input| input.version.clone())
            .or_else(|| get.version.clone());

        Ok(self.factory.new_plan(PlanStep::Get(GetPlan {
            name: get.name.clone(),
            type_name: resource.type_name.clone(),
            resource: resource.name.clone(),
            source: resource.source.clone(),
            params: get.params.clone(),
            version,
            version_from: None,
            tags: step.tags.clone(),
            resource_types: self.resource_types.clone(),
        })))
    }

    /// A put is always followed by a get of the version it produced, wired
    /// via `version_from` and only run when the put succeeds.
    fn compile_put(&mut self, put: &PutStep, step: &StepConfig) -> Result<Plan> {
        let resource = self.resources.lookup(put.resource_name()).ok_or_else(|| {
            ConveyorError::ResourceNotFound {
                name: put.resource_name().to_string(),
            }
        })?;

        let put_plan = self.factory.new_plan(PlanStep::Put(PutPlan {
            name: put.name.clone(),
            type_name: resource.type_name.clone(),
            resource: resource.name.clone(),
            source: resource.source.clone(),
            params: put.params.clone(),
            inputs: put.inputs.clone(),
            tags: step.tags.clone(),
            resource_types: self.resource_types.clone(),
        }));

        let dependent_get = self.factory.new_plan(PlanStep::Get(GetPlan {
            name: put.name.clone(),
            type_name: resource.type_name.clone(),
            resource: resource.name.clone(),
            source: resource.source.clone(),
            params: put.get_params.clone(),
            version: None,
            version_from: Some(put_plan.id.clone()),
            tags: step.tags.clone(),
            resource_types: self.resource_types.clone(),
        }));

        Ok(self.factory.new_plan(PlanStep::OnSuccess(HookPlan {
            step: Box::new(put_plan),
            next: Box::new(dependent_get),
        })))
    }

    fn compile_task(&mut self, task: &TaskStep, step: &StepConfig) -> Plan {
        self.factory.new_plan(PlanStep::Task(TaskPlan {
            name: task.name.clone(),
            privileged: task.privileged,
            file: task.file.clone(),
            config: task.config.clone(),
            vars: task.vars.clone(),
            params: task.params.clone(),
            input_mapping: task.input_mapping.clone(),
            output_mapping: task.output_mapping.clone(),
            image: task.image.clone(),
            tags: step.tags.clone(),
            resource_types: self.resource_types.clone(),
        }))
    }
}
