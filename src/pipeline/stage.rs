//! Pipeline stages and run state

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::extract::InputFormat;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Ensure bucket, database instance, catalog and role exist
    Provision,
    /// Read the delimited text sources
    ExtractCsv,
    /// Read the line-delimited JSON sources
    ExtractJson,
    /// Read the XML sources
    ExtractXml,
    /// Outer-union every record set into one table
    Aggregate,
    /// Rename measurement columns and derive metric ones
    Normalize,
    /// Write the staging file and upload it
    PersistObjectStore,
    /// Replace the relational table
    PersistRelational,
}

impl PipelineStage {
    /// Get all stages in execution order
    pub fn all() -> Vec<Self> {
        vec![
            Self::Provision,
            Self::ExtractCsv,
            Self::ExtractJson,
            Self::ExtractXml,
            Self::Aggregate,
            Self::Normalize,
            Self::PersistObjectStore,
            Self::PersistRelational,
        ]
    }

    /// Extraction stage for an input format
    pub fn extract(format: InputFormat) -> Self {
        match format {
            InputFormat::Csv => Self::ExtractCsv,
            InputFormat::Json => Self::ExtractJson,
            InputFormat::Xml => Self::ExtractXml,
        }
    }

    /// Stable stage name, used in failure records
    pub fn name(&self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::ExtractCsv => "extract_csv",
            Self::ExtractJson => "extract_json",
            Self::ExtractXml => "extract_xml",
            Self::Aggregate => "aggregate",
            Self::Normalize => "normalize",
            Self::PersistObjectStore => "persist_object_store",
            Self::PersistRelational => "persist_relational",
        }
    }

    /// Get stage description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Provision => "Ensure cloud infrastructure exists",
            Self::ExtractCsv => "Read delimited text sources",
            Self::ExtractJson => "Read line-delimited JSON sources",
            Self::ExtractXml => "Read XML sources",
            Self::Aggregate => "Combine record sets",
            Self::Normalize => "Normalize schema and derive metric columns",
            Self::PersistObjectStore => "Write staging file and upload to object storage",
            Self::PersistRelational => "Replace relational table",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    /// Stage that failed
    pub stage: PipelineStage,
    /// Error kind, e.g. `FileNotFound`
    pub kind: String,
    /// Full error message
    pub cause: String,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed ({}): {}", self.stage, self.kind, self.cause)
    }
}

/// Sink a persisted state refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    ObjectStore,
    Relational,
}

/// Run state machine
///
/// `Idle → Provisioned → Extracted → Aggregated → Normalized →
/// Persisted(ObjectStore) → Persisted(Relational) → Done`, with `Failed`
/// reachable from every non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Provisioned,
    Extracted,
    Aggregated,
    Normalized,
    Persisted(SinkKind),
    Done,
    Failed(StageFailure),
}

impl RunState {
    /// State reached when `stage` completes from this state
    ///
    /// The first two extraction stages leave the state unchanged; the run
    /// is `Extracted` only once every format has been read.
    pub fn after(&self, stage: PipelineStage) -> RunState {
        match stage {
            PipelineStage::Provision => RunState::Provisioned,
            PipelineStage::ExtractCsv | PipelineStage::ExtractJson => self.clone(),
            PipelineStage::ExtractXml => RunState::Extracted,
            PipelineStage::Aggregate => RunState::Aggregated,
            PipelineStage::Normalize => RunState::Normalized,
            PipelineStage::PersistObjectStore => RunState::Persisted(SinkKind::ObjectStore),
            PipelineStage::PersistRelational => RunState::Persisted(SinkKind::Relational),
        }
    }

    /// Check if no further stage can run
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed(_))
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Provisioned => write!(f, "provisioned"),
            RunState::Extracted => write!(f, "extracted"),
            RunState::Aggregated => write!(f, "aggregated"),
            RunState::Normalized => write!(f, "normalized"),
            RunState::Persisted(SinkKind::ObjectStore) => write!(f, "persisted(object_store)"),
            RunState::Persisted(SinkKind::Relational) => write!(f, "persisted(relational)"),
            RunState::Done => write!(f, "done"),
            RunState::Failed(failure) => write!(f, "failed({}, {})", failure.stage, failure.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names_and_order() {
        let names: Vec<_> = PipelineStage::all().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "provision",
                "extract_csv",
                "extract_json",
                "extract_xml",
                "aggregate",
                "normalize",
                "persist_object_store",
                "persist_relational",
            ]
        );
    }

    #[test]
    fn test_extract_stage_for_format() {
        assert_eq!(
            PipelineStage::extract(InputFormat::Json),
            PipelineStage::ExtractJson
        );
    }

    #[test]
    fn test_state_machine_walk() {
        let mut state = RunState::Idle;
        let mut seen = Vec::new();
        for stage in PipelineStage::all() {
            state = state.after(stage);
            seen.push(state.to_string());
        }
        assert_eq!(
            seen,
            vec![
                "provisioned",
                "provisioned",
                "provisioned",
                "extracted",
                "aggregated",
                "normalized",
                "persisted(object_store)",
                "persisted(relational)",
            ]
        );
        assert!(!state.is_terminal());
    }

    #[test]
    fn test_failed_state_display() {
        let state = RunState::Failed(StageFailure {
            stage: PipelineStage::ExtractXml,
            kind: "FileNotFound".to_string(),
            cause: "File not found: data/source1.xml".to_string(),
        });
        assert_eq!(state.to_string(), "failed(extract_xml, FileNotFound)");
        assert!(state.is_terminal());
    }
}
