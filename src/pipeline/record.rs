//! Run record written at the end of every run

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{PipelineError, PipelineResult};
use super::stage::{PipelineStage, StageFailure};

/// File name of the run record inside the output directory
pub const RUN_RECORD_FILE: &str = "run_record.json";

/// What happened during one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique pipeline run ID
    pub run_id: String,
    /// Pipeline name
    pub name: Option<String>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the record was last updated
    pub updated_at: DateTime<Utc>,
    /// Current status
    pub status: RunStatus,
    /// Completed stages
    pub completed_stages: Vec<PipelineStage>,
    /// Current stage (if running)
    pub current_stage: Option<PipelineStage>,
    /// Stage outputs keyed by stage name
    pub stage_outputs: HashMap<String, StageOutput>,
    /// Set when a stage failed
    pub failure: Option<StageFailure>,
    /// Configuration hash, to tell runs of different configurations apart
    pub config_hash: String,
}

impl RunRecord {
    /// Create a new record for a pipeline run
    pub fn new(run_id: impl Into<String>, config_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.into(),
            name: None,
            started_at: now,
            updated_at: now,
            status: RunStatus::Running,
            completed_stages: Vec::new(),
            current_stage: None,
            stage_outputs: HashMap::new(),
            failure: None,
            config_hash: config_hash.into(),
        }
    }

    /// Set pipeline name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark a stage as started
    pub fn start_stage(&mut self, stage: PipelineStage) {
        self.current_stage = Some(stage);
        self.updated_at = Utc::now();
    }

    /// Mark a stage as completed
    pub fn complete_stage(&mut self, stage: PipelineStage, output: StageOutput) {
        self.completed_stages.push(stage);
        self.stage_outputs.insert(stage.name().to_string(), output);
        self.current_stage = None;
        self.updated_at = Utc::now();
    }

    /// Mark the run as done
    pub fn complete(&mut self) {
        self.status = RunStatus::Done;
        self.current_stage = None;
        self.updated_at = Utc::now();
    }

    /// Mark the run as failed
    pub fn fail(&mut self, failure: StageFailure, output: StageOutput) {
        self.stage_outputs
            .insert(failure.stage.name().to_string(), output);
        self.status = RunStatus::Failed;
        self.failure = Some(failure);
        self.current_stage = None;
        self.updated_at = Utc::now();
    }

    /// Check if a stage has been completed
    pub fn is_stage_completed(&self, stage: PipelineStage) -> bool {
        self.completed_stages.contains(&stage)
    }

    /// Get output from a stage
    pub fn stage_output(&self, stage: PipelineStage) -> Option<&StageOutput> {
        self.stage_outputs.get(stage.name())
    }

    /// Calculate duration so far
    pub fn duration(&self) -> chrono::Duration {
        self.updated_at - self.started_at
    }

    /// Save the record as pretty JSON
    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io_with_path(parent, "creating output directory", e))?;
        }
        fs::write(path, json)
            .map_err(|e| PipelineError::io_with_path(path, "writing run record", e))?;
        Ok(())
    }

    /// Load a record from file
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| PipelineError::io_with_path(path, "reading run record", e))?;
        let record: Self = serde_json::from_str(&json)?;
        Ok(record)
    }

    /// Get default record path for an output directory
    pub fn default_path(output_dir: &Path) -> PathBuf {
        output_dir.join(RUN_RECORD_FILE)
    }
}

/// Pipeline run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run is in progress
    Running,
    /// Every stage completed
    Done,
    /// A stage failed and the run stopped
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Output from a pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    /// Whether the stage was successful
    pub success: bool,
    /// Output file paths
    pub files: Vec<PathBuf>,
    /// Stage-specific metadata
    pub metadata: HashMap<String, serde_json::Value>,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl StageOutput {
    /// Create a successful stage output
    pub fn success() -> Self {
        Self {
            success: true,
            files: Vec::new(),
            metadata: HashMap::new(),
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }

    /// Create a failed stage output
    pub fn failed() -> Self {
        Self {
            success: false,
            ..Self::success()
        }
    }

    /// Add an output file
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Set duration
    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    /// Read a numeric metadata entry
    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(|v| v.as_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_record_new() {
        let record = RunRecord::new("run-123", "config-hash");
        assert_eq!(record.run_id, "run-123");
        assert_eq!(record.status, RunStatus::Running);
        assert!(record.completed_stages.is_empty());
        assert!(record.failure.is_none());
    }

    #[test]
    fn test_run_record_stage_lifecycle() {
        let mut record = RunRecord::new("run-123", "hash");

        record.start_stage(PipelineStage::ExtractCsv);
        assert_eq!(record.current_stage, Some(PipelineStage::ExtractCsv));

        record.complete_stage(
            PipelineStage::ExtractCsv,
            StageOutput::success().with_metadata("rows", serde_json::json!(3)),
        );
        assert!(record.is_stage_completed(PipelineStage::ExtractCsv));
        assert!(record.current_stage.is_none());
        assert_eq!(
            record
                .stage_output(PipelineStage::ExtractCsv)
                .and_then(|o| o.metadata_u64("rows")),
            Some(3)
        );
    }

    #[test]
    fn test_run_record_fail() {
        let mut record = RunRecord::new("run-123", "hash");
        record.start_stage(PipelineStage::ExtractXml);
        record.fail(
            StageFailure {
                stage: PipelineStage::ExtractXml,
                kind: "FileNotFound".to_string(),
                cause: "File not found: data/source3.xml".to_string(),
            },
            StageOutput::failed(),
        );

        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(
            record.failure.as_ref().map(|f| f.kind.as_str()),
            Some("FileNotFound")
        );
        assert!(
            !record
                .stage_output(PipelineStage::ExtractXml)
                .unwrap()
                .success
        );
    }

    #[test]
    fn test_run_record_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = RunRecord::default_path(&temp.path().join("out"));

        let mut record = RunRecord::new("run-1", "hash").with_name("nightly");
        record.complete_stage(PipelineStage::Provision, StageOutput::success());
        record.complete();
        record.save(&path).unwrap();

        let loaded = RunRecord::load(&path).unwrap();
        assert_eq!(loaded.run_id, "run-1");
        assert_eq!(loaded.status, RunStatus::Done);
        assert_eq!(loaded.completed_stages, vec![PipelineStage::Provision]);
        assert_eq!(loaded.name.as_deref(), Some("nightly"));
    }

    #[test]
    fn test_stage_output() {
        let output = StageOutput::success()
            .with_file("/output/transformed_data.csv")
            .with_metadata("rows", serde_json::json!(10))
            .with_duration(1500);

        assert!(output.success);
        assert_eq!(output.files.len(), 1);
        assert_eq!(output.duration_ms, 1500);
        assert!(!StageOutput::failed().success);
    }
}
