//! Pipeline executor for running the full ETL job

use std::collections::HashMap;
use std::time::Instant;

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::config::{InputLocation, PipelineConfig};
use super::error::{PipelineError, PipelineResult};
use super::record::{RunRecord, StageOutput};
use super::stage::{PipelineStage, RunState, StageFailure};
use crate::extract::{self, InputFormat, ParseError};
use crate::provision::{
    DatabaseEndpoint, InMemoryProvisioner, ProvisionedInfrastructure, Provisioner,
    ensure_infrastructure,
};
use crate::sink::{
    LocalObjectStore, ObjectStore, RelationalConnector, replace_and_verify, write_staging_csv,
};
use crate::table::{RecordSet, combine};
use crate::transform::Normalizer;

/// External systems the pipeline talks to
///
/// Built once at process start and handed to the executor.
pub struct Collaborators {
    pub provisioner: Box<dyn Provisioner>,
    pub object_store: Box<dyn ObjectStore>,
    pub connector: Box<dyn RelationalConnector>,
}

impl Collaborators {
    /// Bundle the three collaborators
    pub fn new(
        provisioner: Box<dyn Provisioner>,
        object_store: Box<dyn ObjectStore>,
        connector: Box<dyn RelationalConnector>,
    ) -> Self {
        Self {
            provisioner,
            object_store,
            connector,
        }
    }

    /// Local collaborators rooted in the output directory
    ///
    /// Provisioning is recorded in memory, objects are copied under
    /// `<output_dir>/object_store` and the table lives in
    /// `<output_dir>/<database>.duckdb`.
    #[cfg(feature = "duckdb-backend")]
    pub fn local(config: &PipelineConfig) -> Self {
        let output_dir = &config.output.output_dir;
        let database_file = output_dir.join(format!(
            "{}.duckdb",
            config.infrastructure.database.database_name
        ));
        Self::new(
            Box::new(InMemoryProvisioner::new()),
            Box::new(LocalObjectStore::new(output_dir.join("object_store"))),
            Box::new(crate::sink::DuckDbConnector::file(database_file)),
        )
    }

    /// AWS control plane, S3 and PostgreSQL
    #[cfg(all(feature = "aws", feature = "postgres-backend"))]
    pub fn aws(config: &PipelineConfig) -> PipelineResult<Self> {
        let infra = &config.infrastructure;
        let password = config.database_password()?;
        let provisioner = crate::provision::AwsProvisioner::connect(
            &infra.region,
            password.clone(),
            std::time::Duration::from_secs(infra.instance_poll_interval_secs),
            infra.instance_max_attempts,
        )?;
        let object_store =
            crate::sink::S3ObjectStore::connect(infra.bucket.clone(), Some(&infra.region), None)?;
        Ok(Self::new(
            Box::new(provisioner),
            Box::new(object_store),
            Box::new(crate::sink::PostgresConnector::new(password)),
        ))
    }

    /// Collaborators that never leave the process: in-memory provisioning,
    /// a local object store and the given connector
    pub fn in_process(
        config: &PipelineConfig,
        provisioner: InMemoryProvisioner,
        connector: Box<dyn RelationalConnector>,
    ) -> Self {
        Self::new(
            Box::new(provisioner),
            Box::new(LocalObjectStore::new(
                config.output.output_dir.join("object_store"),
            )),
            connector,
        )
    }
}

/// Pipeline executor that runs all stages
pub struct PipelineExecutor {
    config: PipelineConfig,
    collaborators: Collaborators,
    normalizer: Normalizer,
    record: RunRecord,
    state: RunState,
    started: bool,
}

impl PipelineExecutor {
    /// Create a new pipeline executor
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::ConfigError)?;

        let config_hash = Self::hash_config(&config);
        let run_id = Uuid::new_v4().to_string();
        let mut record = RunRecord::new(run_id, config_hash);
        if let Some(name) = &config.name {
            record = record.with_name(name.clone());
        }

        Ok(Self {
            config,
            collaborators,
            normalizer: Normalizer::default(),
            record,
            state: RunState::Idle,
            started: false,
        })
    }

    /// Use custom normalization rules
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Get the run record
    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Get the current run state
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Run the pipeline
    ///
    /// A failing stage does not produce an `Err`: the report carries the
    /// failure and no later stage runs. Only a dry run with missing inputs,
    /// or a second call on the same executor, returns an error. A dry run
    /// counts as the executor's one call.
    pub fn run(&mut self) -> PipelineResult<PipelineReport> {
        if self.started {
            return Err(PipelineError::ConfigError(format!(
                "run {} has already been executed",
                self.record.run_id
            )));
        }
        self.started = true;

        let _span = info_span!(
            "pipeline_run",
            run_id = %self.record.run_id,
            dry_run = self.config.dry_run
        )
        .entered();

        if self.config.verbose {
            eprintln!("Pipeline run: {}", self.record.run_id);
            if self.config.dry_run {
                eprintln!("DRY RUN MODE - no changes will be made");
            }
        }

        if self.config.dry_run {
            return self.dry_run();
        }

        let start = Instant::now();
        info!(
            run_id = %self.record.run_id,
            data_root = %self.config.inputs.data_root.display(),
            "ETL pipeline started"
        );

        let outcome = match self.execute() {
            Ok(()) => {
                self.transition(RunState::Done);
                self.record.complete();
                info!(
                    run_id = %self.record.run_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "ETL pipeline completed successfully"
                );
                RunOutcome::Done
            }
            Err(failure) => {
                error!(
                    stage = failure.stage.name(),
                    kind = %failure.kind,
                    "Pipeline failed: {}",
                    failure.cause
                );
                RunOutcome::Failed(failure)
            }
        };

        let record_path = RunRecord::default_path(&self.config.output.output_dir);
        let record_path = match self.record.save(&record_path) {
            Ok(()) => Some(record_path),
            Err(e) => {
                warn!(path = %record_path.display(), error = %e, "Failed to save run record");
                None
            }
        };

        Ok(PipelineReport {
            run_id: self.record.run_id.clone(),
            outcome,
            state: self.state.clone(),
            stages_completed: self.record.completed_stages.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
            outputs: self.record.stage_outputs.clone(),
            record_path,
        })
    }

    /// Run every stage in order, stopping at the first failure
    fn execute(&mut self) -> Result<(), StageFailure> {
        let infrastructure = self.run_stage(PipelineStage::Provision, |exec| exec.provision())?;

        let mut sets = Vec::new();
        for format in InputFormat::all() {
            let extracted =
                self.run_stage(PipelineStage::extract(format), |exec| exec.extract(format))?;
            sets.extend(extracted);
        }

        let combined = self.run_stage(PipelineStage::Aggregate, |_| {
            let inputs = sets.len();
            let combined = combine(sets);
            let output = StageOutput::success()
                .with_metadata("inputs", serde_json::json!(inputs))
                .with_metadata("rows", serde_json::json!(combined.row_count()))
                .with_metadata("columns", serde_json::json!(combined.columns()));
            Ok((combined, output))
        })?;

        let normalized = self.run_stage(PipelineStage::Normalize, |exec| {
            let normalized = exec.normalizer.apply(combined);
            let output = StageOutput::success()
                .with_metadata("rows", serde_json::json!(normalized.row_count()))
                .with_metadata("columns", serde_json::json!(normalized.columns()));
            Ok((normalized, output))
        })?;

        self.run_stage(PipelineStage::PersistObjectStore, |exec| {
            exec.persist_object_store(&normalized)
        })?;

        self.run_stage(PipelineStage::PersistRelational, |exec| {
            exec.persist_relational(&normalized, &infrastructure.endpoint)
        })?;

        Ok(())
    }

    /// Run one stage, recording its output or its failure
    fn run_stage<T>(
        &mut self,
        stage: PipelineStage,
        work: impl FnOnce(&Self) -> PipelineResult<(T, StageOutput)>,
    ) -> Result<T, StageFailure> {
        let _stage_span = info_span!("pipeline_stage", stage = stage.name()).entered();
        info!(stage = stage.name(), "Starting stage");
        if self.config.verbose {
            eprintln!("Running stage {}...", stage.name());
        }

        self.record.start_stage(stage);
        let start = Instant::now();
        let result = work(self);
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok((value, output)) => {
                info!(stage = stage.name(), duration_ms, "Stage completed");
                if self.config.verbose {
                    eprintln!("Stage {} completed in {}ms", stage.name(), duration_ms);
                }
                self.record
                    .complete_stage(stage, output.with_duration(duration_ms));
                self.transition(self.state.after(stage));
                Ok(value)
            }
            Err(e) => {
                let failure = e.to_failure(stage);
                error!(stage = stage.name(), kind = %failure.kind, error = %failure.cause, "Stage failed");
                if self.config.verbose {
                    eprintln!("Stage {} failed: {}", stage.name(), e.user_message());
                }
                self.record.fail(
                    failure.clone(),
                    StageOutput::failed()
                        .with_metadata("error", serde_json::json!(failure.cause))
                        .with_duration(duration_ms),
                );
                self.transition(RunState::Failed(failure.clone()));
                Err(failure)
            }
        }
    }

    fn transition(&mut self, next: RunState) {
        if self.state.is_terminal() {
            warn!(state = %self.state, to = %next, "Ignoring transition out of a terminal state");
            return;
        }
        if next != self.state {
            info!(from = %self.state, to = %next, "State transition");
            self.state = next;
        }
    }

    fn provision(&self) -> PipelineResult<(ProvisionedInfrastructure, StageOutput)> {
        let infrastructure = ensure_infrastructure(
            self.collaborators.provisioner.as_ref(),
            &self.config.infrastructure,
        )?;

        let outcomes: HashMap<&str, String> = infrastructure
            .outcomes
            .iter()
            .map(|(resource, outcome)| (resource.as_str(), outcome.to_string()))
            .collect();
        let output = StageOutput::success()
            .with_metadata("endpoint", serde_json::json!(infrastructure.endpoint.to_string()))
            .with_metadata("role", serde_json::json!(infrastructure.role.as_str()))
            .with_metadata("created", serde_json::json!(infrastructure.created_count()))
            .with_metadata("outcomes", serde_json::json!(outcomes));
        Ok((infrastructure, output))
    }

    /// Read every source of one format, in source order
    fn extract(&self, format: InputFormat) -> PipelineResult<(Vec<RecordSet>, StageOutput)> {
        let locations = self.config.input_locations_for(format);

        let results: Vec<(RecordSet, String)> = if self.config.parallel_extract {
            locations
                .par_iter()
                .map(Self::read_input)
                .collect::<Result<_, ParseError>>()?
        } else {
            locations
                .iter()
                .map(Self::read_input)
                .collect::<Result<_, ParseError>>()?
        };

        let mut output = StageOutput::success();
        let mut inputs = Vec::with_capacity(results.len());
        let mut rows = 0;
        for (location, (set, hash)) in locations.iter().zip(&results) {
            rows += set.row_count();
            inputs.push(serde_json::json!({
                "source": location.source,
                "rows": set.row_count(),
                "sha256": hash,
            }));
            output = output.with_file(&location.path);
        }
        let output = output
            .with_metadata("format", serde_json::json!(format.extension()))
            .with_metadata("rows", serde_json::json!(rows))
            .with_metadata("inputs", serde_json::json!(inputs));

        Ok((results.into_iter().map(|(set, _)| set).collect(), output))
    }

    fn read_input(location: &InputLocation) -> Result<(RecordSet, String), ParseError> {
        let set = extract::read_file(location.format, &location.path)?;
        let hash = extract::content_hash(&location.path)?;
        debug!(
            path = %location.path.display(),
            rows = set.row_count(),
            columns = set.column_count(),
            "Read input"
        );
        Ok((set, hash))
    }

    fn persist_object_store(&self, table: &RecordSet) -> PipelineResult<((), StageOutput)> {
        let staging = self.config.staging_path();
        let rows = write_staging_csv(table, &staging)?;
        info!(path = %staging.display(), rows, "Staging file written");

        let location = self
            .collaborators
            .object_store
            .put_file(&staging, &self.config.output.object_key)?;
        info!(
            uri = %location.uri,
            bytes = location.bytes,
            store = %self.collaborators.object_store.describe(),
            "Uploaded staging file"
        );

        let output = StageOutput::success()
            .with_file(&staging)
            .with_metadata("rows", serde_json::json!(rows))
            .with_metadata("uri", serde_json::json!(location.uri))
            .with_metadata("bytes", serde_json::json!(location.bytes));
        Ok(((), output))
    }

    fn persist_relational(
        &self,
        table: &RecordSet,
        endpoint: &DatabaseEndpoint,
    ) -> PipelineResult<((), StageOutput)> {
        let table_name = &self.config.output.table_name;
        let mut store = self.collaborators.connector.connect(endpoint)?;
        let rows = replace_and_verify(
            store.as_mut(),
            table_name,
            table,
            self.config.output.verify_row_count,
        )?;
        info!(
            table = %table_name,
            rows,
            backend = %self.collaborators.connector.describe(),
            "Relational table replaced"
        );

        let output = StageOutput::success()
            .with_metadata("table", serde_json::json!(table_name))
            .with_metadata("rows", serde_json::json!(rows))
            .with_metadata("endpoint", serde_json::json!(endpoint.to_string()));
        Ok(((), output))
    }

    /// Validate configuration and inputs without running anything
    fn dry_run(&self) -> PipelineResult<PipelineReport> {
        let missing = self.config.missing_inputs();
        if !missing.is_empty() {
            return Err(PipelineError::ConfigError(format!(
                "Missing inputs:\n  {}",
                missing
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join("\n  ")
            )));
        }

        info!(
            inputs = self.config.input_locations().len(),
            "Dry run validation passed"
        );
        if self.config.verbose {
            eprintln!("Dry run validation passed for all stages");
        }

        Ok(PipelineReport {
            run_id: self.record.run_id.clone(),
            outcome: RunOutcome::DryRun,
            state: self.state.clone(),
            stages_completed: Vec::new(),
            duration_ms: 0,
            outputs: HashMap::new(),
            record_path: None,
        })
    }

    /// Hash the config to tell runs of different configurations apart
    fn hash_config(config: &PipelineConfig) -> String {
        let mut hasher = Sha256::new();
        match serde_json::to_vec(config) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(format!("{:?}", config).as_bytes()),
        }
        format!("{:x}", hasher.finalize())
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every stage completed
    Done,
    /// Inputs validated, nothing ran
    DryRun,
    /// A stage failed and the run stopped
    Failed(StageFailure),
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::DryRun => write!(f, "dry run"),
            Self::Failed(failure) => write!(f, "failed: {}", failure),
        }
    }
}

/// Report from a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Run ID
    pub run_id: String,
    /// How the run ended
    pub outcome: RunOutcome,
    /// Final state
    pub state: RunState,
    /// Completed stages
    pub stages_completed: Vec<PipelineStage>,
    /// Total duration in milliseconds
    pub duration_ms: u64,
    /// Stage outputs
    pub outputs: HashMap<String, StageOutput>,
    /// Where the run record was written
    pub record_path: Option<std::path::PathBuf>,
}

impl PipelineReport {
    /// Check if pipeline was successful
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, RunOutcome::Failed(_))
    }

    /// Failure record, if the run failed
    pub fn failure(&self) -> Option<&StageFailure> {
        match &self.outcome {
            RunOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Get formatted duration
    pub fn duration_formatted(&self) -> String {
        let secs = self.duration_ms / 1000;
        let mins = secs / 60;
        let remaining_secs = secs % 60;

        if mins > 0 {
            format!("{}m {}s", mins, remaining_secs)
        } else {
            format!("{}s", secs)
        }
    }

    /// Print summary to stderr
    pub fn print_summary(&self) {
        eprintln!();
        eprintln!("Pipeline {} - {}", self.run_id, self.outcome);
        eprintln!("Duration: {}", self.duration_formatted());
        eprintln!("Stages completed: {}", self.stages_completed.len());

        for stage in &self.stages_completed {
            if let Some(output) = self.outputs.get(stage.name()) {
                match output.metadata_u64("rows") {
                    Some(rows) => eprintln!(
                        "  - {}: ok, {} rows ({}ms)",
                        stage.name(),
                        rows,
                        output.duration_ms
                    ),
                    None => eprintln!("  - {}: ok ({}ms)", stage.name(), output.duration_ms),
                }
            }
        }

        if let Some(failure) = self.failure() {
            eprintln!("  - {}: failed ({})", failure.stage, failure.kind);
            eprintln!("    {}", failure.cause);
        }
        if let Some(path) = &self.record_path {
            eprintln!("Run record: {}", path.display());
        }
    }
}
