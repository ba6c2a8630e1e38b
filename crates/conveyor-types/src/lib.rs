//! Shared types, errors, and configuration model for the Conveyor build-plan
//! compiler.
//!
//! This crate provides the foundational types used across all other Conveyor
//! crates:
//! - `ConveyorError` — unified error taxonomy
//! - `config` — pipeline, job, step, and resource configuration model
//! - `duration` — parsing and formatting of duration strings

pub mod config;
pub mod duration;

pub use config::{
    BuildInput, GetStep, InParallelStep, JobConfig, LoadVarStep, Params, PipelineConfig,
    PutInputs, PutStep, ResourceConfig, ResourceConfigs, ResourceTypeConfig, SetPipelineStep,
    Source, StepConfig, StepHooks, StepShape, Tags, TaskStep, VarFormat, Vars, Version,
    VersionedResourceType, VersionedResourceTypes,
};
pub use duration::{format_duration, parse_duration};

/// Unified error type for all Conveyor subsystems.
#[derive(Debug, thiserror::Error)]
pub enum ConveyorError {
    // === Plan compilation ===
    #[error("resource '{name}' not found in pipeline config")]
    ResourceNotFound { name: String },

    // === Pipeline documents ===
    #[error("job '{name}' not found in pipeline config")]
    JobNotFound { name: String },

    #[error("pipeline validation failed: {0}")]
    ValidationFailed(String),

    #[error("invalid duration '{input}': {reason}")]
    InvalidDuration { input: String, reason: String },

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

impl ConveyorError {
    /// Returns `true` if the error is caused by the pipeline configuration
    /// rather than the environment. Config errors are fixable by the pipeline
    /// author and surface to the user as an invalid/unschedulable build.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ConveyorError::ResourceNotFound { .. }
                | ConveyorError::JobNotFound { .. }
                | ConveyorError::ValidationFailed(_)
                | ConveyorError::InvalidDuration { .. }
        )
    }
}

/// A convenience alias for `Result<T, ConveyorError>`.
pub type Result<T> = std::result::Result<T, ConveyorError>;
