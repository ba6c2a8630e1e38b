//! CLI binary for validating pipeline documents and compiling build plans.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use conveyor_plan::{collect_ids, PlanFactory, Severity};
use conveyor_types::{BuildInput, ConveyorError, PipelineConfig};

#[derive(Parser)]
#[command(name = "conveyor", version, about = "Build-plan compiler for declarative CI pipelines")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a pipeline document
    Validate {
        /// Path to the pipeline .yml or .json file
        pipeline: PathBuf,
    },

    /// Compile one job's plan and print it as JSON
    Compile {
        /// Path to the pipeline .yml or .json file
        pipeline: PathBuf,

        /// Name of the job to compile
        #[arg(short, long)]
        job: String,

        /// JSON file holding the build's resolved inputs ([{name, version}, ...])
        #[arg(short, long)]
        inputs: Option<PathBuf>,

        /// Seed for plan IDs (default: current epoch millis)
        #[arg(long)]
        seed: Option<i64>,

        /// Write the plan here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit compact JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },

    /// Show information about a pipeline document
    Info {
        /// Path to the pipeline .yml or .json file
        pipeline: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    match cli.command {
        Commands::Validate { pipeline } => {
            cmd_validate(&pipeline)?;
        }
        Commands::Compile {
            pipeline,
            job,
            inputs,
            seed,
            output,
            compact,
        } => {
            cmd_compile(
                &pipeline,
                &job,
                inputs.as_deref(),
                seed,
                output.as_deref(),
                compact,
            )?;
        }
        Commands::Info { pipeline } => {
            cmd_info(&pipeline)?;
        }
    }

    Ok(())
}

/// Load a pipeline document, picking the format from the file extension.
fn load_pipeline(path: &Path) -> conveyor_types::Result<PipelineConfig> {
    let raw = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .map(|ext| ext == "json")
        .unwrap_or(false);
    if is_json {
        Ok(serde_json::from_str(&raw)?)
    } else {
        Ok(serde_yaml::from_str(&raw)?)
    }
}

fn load_inputs(path: &Path) -> conveyor_types::Result<Vec<BuildInput>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn cmd_validate(path: &Path) -> anyhow::Result<()> {
    let pipeline = load_pipeline(path)?;
    let diagnostics = conveyor_plan::validate(&pipeline);

    if diagnostics.is_empty() {
        println!("Pipeline is valid");
        return Ok(());
    }

    let mut has_error = false;
    for diag in &diagnostics {
        let severity = match diag.severity {
            Severity::Error => {
                has_error = true;
                "ERROR"
            }
            Severity::Warning => "WARN",
            Severity::Info => "INFO",
        };
        match &diag.job {
            Some(job) => println!("[{}] {} (job {}): {}", severity, diag.rule, job, diag.message),
            None => println!("[{}] {}: {}", severity, diag.rule, diag.message),
        }
        if let Some(fix) = &diag.fix {
            println!("        fix: {fix}");
        }
    }

    if has_error {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_compile(
    path: &Path,
    job_name: &str,
    inputs: Option<&Path>,
    seed: Option<i64>,
    output: Option<&Path>,
    compact: bool,
) -> anyhow::Result<()> {
    let pipeline = load_pipeline(path)?;
    let job = pipeline
        .job(job_name)
        .ok_or_else(|| ConveyorError::JobNotFound {
            name: job_name.to_string(),
        })?;

    let inputs = match inputs {
        Some(path) => load_inputs(path)?,
        None => Vec::new(),
    };

    // The seed only separates ID ranges across unrelated compilations.
    let seed = seed.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
    let mut factory = PlanFactory::new(seed);

    let plan = conveyor_plan::compile(
        job,
        &mut factory,
        &pipeline.resources,
        &pipeline.versioned_resource_types(),
        &inputs,
    )?;
    tracing::debug!(
        job = %job.name,
        nodes = collect_ids(&plan).len(),
        root = plan.step_name(),
        "compiled build plan"
    );

    let json = if compact {
        serde_json::to_string(&plan)?
    } else {
        serde_json::to_string_pretty(&plan)?
    };
    match output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_info(path: &Path) -> anyhow::Result<()> {
    let pipeline = load_pipeline(path)?;

    println!("Pipeline: {}", pipeline.name);
    println!("Resources: {}", pipeline.resources.len());
    println!("Resource types: {}", pipeline.resource_types.len());
    println!("Jobs: {}", pipeline.jobs.len());

    println!("\nJobs:");
    for job in &pipeline.jobs {
        println!("  {} ({} steps)", job.name, job.plan.len());
    }

    if !pipeline.resources.is_empty() {
        println!("\nResources:");
        for resource in pipeline.resources.iter() {
            println!("  {} [{}]", resource.name, resource.type_name);
        }
    }

    Ok(())
}
