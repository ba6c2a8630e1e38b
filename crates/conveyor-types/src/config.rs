//! Pipeline configuration model: jobs, steps, resources, and build inputs.
//!
//! These types mirror the pipeline document as declared by the user. A step
//! sets exactly one of the nine step shapes (`get`, `put`, `task`, ...); that
//! exclusivity is enforced structurally by [`StepShape`] being a sum type, so
//! a config with two shapes set is unrepresentable once deserialized.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Opaque resource source configuration (`name -> value` pairs).
pub type Source = serde_json::Map<String, serde_json::Value>;

/// Opaque step params (`name -> value` pairs).
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Interpolation variables for tasks and set_pipeline steps.
pub type Vars = serde_json::Map<String, serde_json::Value>;

/// A concrete resource version, e.g. `{"ref": "abc123"}`.
pub type Version = BTreeMap<String, String>;

/// Worker placement tags.
pub type Tags = Vec<String>;

// ---------------------------------------------------------------------------
// Pipeline document
// ---------------------------------------------------------------------------

/// A whole pipeline document: resources, custom resource types, and jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub resources: ResourceConfigs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_types: Vec<ResourceTypeConfig>,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

impl PipelineConfig {
    /// Look up a job by name (case-sensitive exact match).
    pub fn job(&self, name: &str) -> Option<&JobConfig> {
        self.jobs.iter().find(|j| j.name == name)
    }

    /// The pipeline's custom resource types in the form the compiler consumes.
    /// Versions are unset until a worker has checked each type.
    pub fn versioned_resource_types(&self) -> VersionedResourceTypes {
        self.resource_types
            .iter()
            .map(|rt| VersionedResourceType {
                name: rt.name.clone(),
                type_name: rt.type_name.clone(),
                source: rt.source.clone(),
                version: None,
            })
            .collect()
    }
}

/// A named sequence of steps that produces builds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    #[serde(default)]
    pub plan: Vec<StepConfig>,
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// A named, typed external artifact source/sink (e.g. a git repo).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Source::is_empty")]
    pub source: Source,
}

/// Read-only resource table, looked up by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceConfigs(pub Vec<ResourceConfig>);

impl ResourceConfigs {
    /// Look up a resource by name (case-sensitive exact match).
    pub fn lookup(&self, name: &str) -> Option<&ResourceConfig> {
        self.0.iter().find(|r| r.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResourceConfig> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A custom resource type as declared in the pipeline document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceTypeConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Source::is_empty")]
    pub source: Source,
}

/// A custom resource type plus the version selected for it, denormalized into
/// every resource-touching plan node so nodes can be shipped to workers
/// independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionedResourceType {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Source::is_empty")]
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

pub type VersionedResourceTypes = Vec<VersionedResourceType>;

/// The version selected for one pipeline-level input of a specific build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildInput {
    pub name: String,
    #[serde(default)]
    pub version: Version,
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// One declared unit of work in a job's plan, with its modifiers.
///
/// The shape and the hook fields are flattened, so on the wire this reads as
/// `{"get": {...}, "timeout": "1h", "on_success": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    #[serde(flatten)]
    pub shape: StepShape,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub attempts: usize,
    #[serde(flatten)]
    pub hooks: StepHooks,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl StepConfig {
    /// A bare step with the given shape and no modifiers or hooks.
    pub fn from_shape(shape: StepShape) -> Self {
        StepConfig {
            shape,
            tags: Tags::new(),
            timeout: None,
            interrupt: None,
            attempts: 0,
            hooks: StepHooks::default(),
        }
    }
}

/// The mutually-exclusive step shapes. Exactly one is ever populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepShape {
    Get(GetStep),
    Put(PutStep),
    Task(TaskStep),
    SetPipeline(SetPipelineStep),
    LoadVar(LoadVarStep),
    Do(Vec<StepConfig>),
    Try(Box<StepConfig>),
    Aggregate(Vec<StepConfig>),
    InParallel(InParallelStep),
}

/// Fetch a resource version into the build's artifact namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetStep {
    /// Logical name of the fetched artifact; also the default resource name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
    /// Pinned version, used when no build input matches the logical name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

impl GetStep {
    /// The resource this step reads: explicit `resource:` or the logical name.
    pub fn resource_name(&self) -> &str {
        self.resource.as_deref().unwrap_or(&self.name)
    }
}

/// Push an artifact to a resource, then fetch the produced version back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PutStep {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
    /// Params for the dependent get that follows a successful put.
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub get_params: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<PutInputs>,
}

impl PutStep {
    pub fn resource_name(&self) -> &str {
        self.resource.as_deref().unwrap_or(&self.name)
    }
}

/// Which build artifacts are streamed to a put step's container.
#[derive(Debug, Clone, PartialEq)]
pub enum PutInputs {
    /// Stream every artifact produced so far.
    All,
    /// Stream only artifacts referenced by the put's params.
    Detect,
    /// Stream exactly the named artifacts.
    Specified(Vec<String>),
}

impl Serialize for PutInputs {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            PutInputs::All => serializer.serialize_str("all"),
            PutInputs::Detect => serializer.serialize_str("detect"),
            PutInputs::Specified(names) => names.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for PutInputs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct PutInputsVisitor;

        impl<'de> de::Visitor<'de> for PutInputsVisitor {
            type Value = PutInputs;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "\"all\", \"detect\", or a list of artifact names")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<PutInputs, E> {
                match v {
                    "all" => Ok(PutInputs::All),
                    "detect" => Ok(PutInputs::Detect),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }

            fn visit_seq<A: de::SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<PutInputs, A::Error> {
                let mut names = Vec::new();
                while let Some(name) = seq.next_element::<String>()? {
                    names.push(name);
                }
                Ok(PutInputs::Specified(names))
            }
        }

        deserializer.deserialize_any(PutInputsVisitor)
    }
}

/// Run a task container. Tasks are self-contained; no resource lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStep {
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub privileged: bool,
    /// Path to a task config file within the build's artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Inline task config, carried verbatim; its schema belongs to the engine.
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
    /// Artifact whose contents become the task's image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Replace another pipeline's configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetPipelineStep {
    pub name: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Vars::is_empty")]
    pub vars: Vars,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub var_files: Vec<String>,
}

/// Read a file from the build's artifacts into a build-local var.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadVarStep {
    pub name: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<VarFormat>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reveal: bool,
}

/// How a load_var step interprets the file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarFormat {
    Json,
    Yaml,
    Trim,
    Raw,
}

/// Bounded-parallelism step group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InParallelStep {
    pub steps: Vec<StepConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fail_fast: bool,
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// The five lifecycle hooks a step may declare. Each is a full step config
/// and can nest arbitrarily (including further hooks).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepHooks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<Box<StepConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<Box<StepConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_abort: Option<Box<StepConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<Box<StepConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ensure: Option<Box<StepConfig>>,
}

impl StepHooks {
    pub fn is_empty(&self) -> bool {
        self.on_success.is_none()
            && self.on_failure.is_none()
            && self.on_abort.is_none()
            && self.on_error.is_none()
            && self.ensure.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn get_step(name: &str) -> StepConfig {
        StepConfig::from_shape(StepShape::Get(GetStep {
            name: name.into(),
            ..GetStep::default()
        }))
    }

    #[test]
    fn step_config_round_trips_with_modifiers() {
        let mut step = get_step("repo");
        step.timeout = Some("1h".into());
        step.attempts = 3;

        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["get"]["name"], "repo");
        assert_eq!(json["timeout"], "1h");
        assert_eq!(json["attempts"], 3);

        let back: StepConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, step);
    }

    #[test]
    fn bare_step_omits_default_modifiers() {
        let json = serde_json::to_value(get_step("repo")).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("get"));
        assert!(!obj.contains_key("timeout"));
        assert!(!obj.contains_key("attempts"));
        assert!(!obj.contains_key("tags"));
        assert!(!obj.contains_key("on_success"));
    }

    #[test]
    fn step_shape_tags_are_snake_case() {
        let step = StepConfig::from_shape(StepShape::SetPipeline(SetPipelineStep {
            name: "self".into(),
            file: "ci/pipeline.yml".into(),
            ..SetPipelineStep::default()
        }));
        let json = serde_json::to_value(&step).unwrap();
        assert!(json.as_object().unwrap().contains_key("set_pipeline"));
    }

    #[test]
    fn nested_do_deserializes() {
        let doc = json!({
            "do": [
                {"get": {"name": "a"}},
                {"task": {"name": "b", "file": "a/task.yml"}}
            ]
        });
        let step: StepConfig = serde_json::from_value(doc).unwrap();
        match step.shape {
            StepShape::Do(children) => assert_eq!(children.len(), 2),
            other => panic!("expected do, got {other:?}"),
        }
    }

    #[test]
    fn hooks_deserialize_alongside_shape() {
        let doc = json!({
            "task": {"name": "unit", "file": "repo/unit.yml"},
            "on_failure": {"task": {"name": "report", "file": "repo/report.yml"}},
            "ensure": {"put": {"name": "locks"}}
        });
        let step: StepConfig = serde_json::from_value(doc).unwrap();
        assert!(step.hooks.on_failure.is_some());
        assert!(step.hooks.ensure.is_some());
        assert!(step.hooks.on_success.is_none());
        assert!(!step.hooks.is_empty());
    }

    #[test]
    fn get_step_resource_name_defaults_to_logical_name() {
        let step = GetStep {
            name: "repo".into(),
            ..GetStep::default()
        };
        assert_eq!(step.resource_name(), "repo");

        let step = GetStep {
            name: "repo".into(),
            resource: Some("github-repo".into()),
            ..GetStep::default()
        };
        assert_eq!(step.resource_name(), "github-repo");
    }

    #[test]
    fn resource_lookup_is_case_sensitive() {
        let resources = ResourceConfigs(vec![ResourceConfig {
            name: "Repo".into(),
            type_name: "git".into(),
            source: Source::new(),
        }]);
        assert!(resources.lookup("Repo").is_some());
        assert!(resources.lookup("repo").is_none());
    }

    #[test]
    fn resource_type_field_serializes_as_type() {
        let rc = ResourceConfig {
            name: "repo".into(),
            type_name: "git".into(),
            source: Source::new(),
        };
        let json = serde_json::to_value(&rc).unwrap();
        assert_eq!(json["type"], "git");
    }

    // --- PutInputs ---

    #[test]
    fn put_inputs_all_round_trips() {
        let json = serde_json::to_string(&PutInputs::All).unwrap();
        assert_eq!(json, "\"all\"");
        let back: PutInputs = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PutInputs::All);
    }

    #[test]
    fn put_inputs_detect_round_trips() {
        let back: PutInputs = serde_json::from_str("\"detect\"").unwrap();
        assert_eq!(back, PutInputs::Detect);
    }

    #[test]
    fn put_inputs_list_round_trips() {
        let inputs = PutInputs::Specified(vec!["binary".into(), "notes".into()]);
        let json = serde_json::to_string(&inputs).unwrap();
        assert_eq!(json, "[\"binary\",\"notes\"]");
        let back: PutInputs = serde_json::from_str(&json).unwrap();
        assert_eq!(back, inputs);
    }

    #[test]
    fn put_inputs_rejects_unknown_keyword() {
        assert!(serde_json::from_str::<PutInputs>("\"some\"").is_err());
    }

    // --- Pipeline document ---

    #[test]
    fn pipeline_config_from_yaml() {
        let doc = r#"
name: main
resources:
  - name: repo
    type: git
    source:
      uri: https://example.com/repo.git
resource_types:
  - name: slack
    type: registry-image
    source:
      repository: example/slack-resource
jobs:
  - name: build
    plan:
      - get: {name: repo}
      - task: {name: unit, file: repo/unit.yml}
"#;
        let pipeline: PipelineConfig = serde_yaml::from_str(doc).unwrap();
        assert_eq!(pipeline.name, "main");
        assert_eq!(pipeline.resources.len(), 1);
        assert!(pipeline.job("build").is_some());
        assert!(pipeline.job("missing").is_none());
        assert_eq!(pipeline.job("build").unwrap().plan.len(), 2);
    }

    #[test]
    fn versioned_resource_types_start_unversioned() {
        let pipeline = PipelineConfig {
            name: "main".into(),
            resource_types: vec![ResourceTypeConfig {
                name: "slack".into(),
                type_name: "registry-image".into(),
                source: Source::new(),
            }],
            ..PipelineConfig::default()
        };
        let types = pipeline.versioned_resource_types();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].name, "slack");
        assert_eq!(types[0].type_name, "registry-image");
        assert!(types[0].version.is_none());
    }
}
