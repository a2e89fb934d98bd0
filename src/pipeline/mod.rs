//! Pipeline orchestration
//!
//! Runs the ETL job as a linear sequence of stages:
//!
//! 1. **provision**: ensure bucket, database instance, role, catalog and crawler
//! 2. **extract_csv**, **extract_json**, **extract_xml**: read every source of
//!    each format
//! 3. **aggregate**: outer-union the record sets in format-then-source order
//! 4. **normalize**: rename measurement columns and derive metric ones
//! 5. **persist_object_store**: write the staging file and upload it
//! 6. **persist_relational**: replace the target table
//!
//! # Example
//!
//! ```rust,ignore
//! use record_etl::pipeline::{Collaborators, PipelineConfig, PipelineExecutor};
//!
//! let config = PipelineConfig::new()
//!     .with_data_root("data")
//!     .with_output_dir("output");
//!
//! let collaborators = Collaborators::local(&config);
//! let mut executor = PipelineExecutor::new(config, collaborators)?;
//! let report = executor.run()?;
//!
//! if let Some(failure) = report.failure() {
//!     eprintln!("{} failed: {}", failure.stage, failure.cause);
//! }
//! ```
//!
//! # Failure handling
//!
//! The first failing stage moves the run to `Failed(stage, cause)` and
//! nothing after it runs. Nothing is rolled back: provisioned resources and
//! an already uploaded object stay in place. The run record is written to
//! `<output_dir>/run_record.json` whether the run succeeds or not.
//!
//! # Dry Run
//!
//! With `dry_run` set the executor only checks that every input exists and
//! returns a `ConfigError` naming each missing file.

mod config;
mod error;
mod executor;
mod record;
mod stage;

pub use config::{
    DEFAULT_PASSWORD_ENV, InputLocation, InputsConfig, OutputConfig, PipelineConfig,
};
pub use error::{PipelineError, PipelineResult};
pub use executor::{Collaborators, PipelineExecutor, PipelineReport, RunOutcome};
pub use record::{RUN_RECORD_FILE, RunRecord, RunStatus, StageOutput};
pub use stage::{PipelineStage, RunState, SinkKind, StageFailure};

/// Run the pipeline once with the given collaborators
pub fn run_pipeline(
    config: PipelineConfig,
    collaborators: Collaborators,
) -> PipelineResult<PipelineReport> {
    let mut executor = PipelineExecutor::new(config, collaborators)?;
    executor.run()
}

/// Run the pipeline against local collaborators
#[cfg(feature = "duckdb-backend")]
pub fn run_local(config: PipelineConfig) -> PipelineResult<PipelineReport> {
    let collaborators = Collaborators::local(&config);
    run_pipeline(config, collaborators)
}
