//! Subcommand handlers
//!
//! Each handler returns `Ok(true)` on success, `Ok(false)` when the command
//! ran but its outcome is a failure, and `Err` when it could not run at all.

use anyhow::{Context, Result, anyhow};
use tracing::info;

use record_etl::pipeline::{Collaborators, PipelineConfig, PipelineExecutor};
use record_etl::provision::{InMemoryProvisioner, Provisioner, ensure_infrastructure};

use crate::CommonArgs;

/// Load the configuration file, if any, and apply command line overrides
fn load_config(args: &CommonArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .map_err(|e| anyhow!(e.user_message()))
            .with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(data_root) = &args.data_root {
        config = config.with_data_root(data_root);
    }
    if let Some(output_dir) = &args.output_dir {
        config = config.with_output_dir(output_dir);
    }
    Ok(config)
}

fn collaborators(config: &PipelineConfig, local: bool) -> Result<Collaborators> {
    if local {
        return Ok(Collaborators::local(config));
    }
    aws_collaborators(config)
}

#[cfg(all(feature = "aws", feature = "postgres-backend"))]
fn aws_collaborators(config: &PipelineConfig) -> Result<Collaborators> {
    Collaborators::aws(config).map_err(|e| anyhow!(e.user_message()))
}

#[cfg(not(all(feature = "aws", feature = "postgres-backend")))]
fn aws_collaborators(_config: &PipelineConfig) -> Result<Collaborators> {
    Err(anyhow!(
        "this binary was built without the `aws` and `postgres-backend` features; rerun with --local"
    ))
}

#[cfg(feature = "aws")]
fn aws_provisioner(config: &PipelineConfig) -> Result<Box<dyn Provisioner>> {
    let infra = &config.infrastructure;
    let password = config
        .database_password()
        .map_err(|e| anyhow!(e.user_message()))?;
    let provisioner = record_etl::provision::AwsProvisioner::connect(
        &infra.region,
        password,
        std::time::Duration::from_secs(infra.instance_poll_interval_secs),
        infra.instance_max_attempts,
    )
    .map_err(|e| anyhow!(e.user_message()))?;
    Ok(Box::new(provisioner))
}

#[cfg(not(feature = "aws"))]
fn aws_provisioner(_config: &PipelineConfig) -> Result<Box<dyn Provisioner>> {
    Err(anyhow!(
        "this binary was built without the `aws` feature; rerun with --local"
    ))
}

/// Handle the `run` command
pub fn handle_run(args: &CommonArgs, dry_run: bool, parallel: bool, verbose: bool) -> Result<bool> {
    let config = load_config(args)?
        .with_dry_run(dry_run)
        .with_parallel_extract(parallel)
        .with_verbose(verbose);
    let collaborators = collaborators(&config, args.local)?;

    let mut executor =
        PipelineExecutor::new(config, collaborators).map_err(|e| anyhow!(e.user_message()))?;
    eprintln!("Starting pipeline run: {}", executor.record().run_id);

    let report = executor.run().map_err(|e| anyhow!(e.user_message()))?;
    report.print_summary();

    if report.is_success() {
        eprintln!();
        eprintln!("Pipeline completed successfully!");
    }
    Ok(report.is_success())
}

/// Handle the `validate` command
pub fn handle_validate(args: &CommonArgs) -> Result<bool> {
    let config = load_config(args)?;

    if let Err(message) = config.validate() {
        eprintln!("Invalid configuration: {message}");
        return Ok(false);
    }

    let locations = config.input_locations();
    let missing = config.missing_inputs();
    for location in &locations {
        let status = if missing.contains(&location.path) {
            "missing"
        } else {
            "ok"
        };
        eprintln!("  {:<8} {}", status, location.path.display());
    }

    if missing.is_empty() {
        eprintln!("Configuration valid, {} inputs present", locations.len());
        Ok(true)
    } else {
        eprintln!("{} of {} inputs missing", missing.len(), locations.len());
        Ok(false)
    }
}

/// Handle the `provision` command
pub fn handle_provision(args: &CommonArgs) -> Result<bool> {
    let config = load_config(args)?;
    let provisioner: Box<dyn Provisioner> = if args.local {
        Box::new(InMemoryProvisioner::new())
    } else {
        aws_provisioner(&config)?
    };

    let infrastructure = ensure_infrastructure(provisioner.as_ref(), &config.infrastructure)
        .map_err(|e| anyhow!(e.user_message()))?;

    info!(
        created = infrastructure.created_count(),
        endpoint = %infrastructure.endpoint,
        "Infrastructure ready"
    );
    for (resource, outcome) in &infrastructure.outcomes {
        eprintln!("  {resource}: {outcome}");
    }
    eprintln!("Database endpoint: {}", infrastructure.endpoint);
    eprintln!("Service role: {}", infrastructure.role);
    Ok(true)
}
