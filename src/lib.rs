//! Record ETL - multi-format extraction and normalization pipeline
//!
//! Provides:
//! - Format readers for delimited text, line-delimited JSON and XML
//! - An outer-union aggregator and a schema normalizer
//! - Sinks for a staging file, object storage and a relational table
//! - Idempotent infrastructure provisioning
//! - A pipeline orchestrator with a recorded run state

pub mod extract;
pub mod pipeline;
pub mod provision;
pub mod sink;
pub mod table;
pub mod transform;

// Re-export commonly used types
pub use extract::{InputFormat, ParseError, RecordReader, read_file};
pub use pipeline::{
    Collaborators, PipelineConfig, PipelineError, PipelineExecutor, PipelineReport,
    PipelineResult, PipelineStage, RunOutcome, RunState, StageFailure, run_pipeline,
};
#[cfg(feature = "duckdb-backend")]
pub use pipeline::run_local;
pub use provision::{
    EnsureOutcome, Ensured, InMemoryProvisioner, InfrastructureConfig, Provisioner,
    ProvisioningError, ensure_infrastructure,
};
pub use sink::{LoadError, ObjectStore, RelationalConnector, RelationalStore, TransferError};
pub use table::{RecordSet, Value, combine};
pub use transform::{Normalizer, normalize};
