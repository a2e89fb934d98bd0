//! Pipeline configuration types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{PipelineError, PipelineResult};
use crate::extract::InputFormat;
use crate::provision::InfrastructureConfig;

/// Default environment variable holding the database password
pub const DEFAULT_PASSWORD_ENV: &str = "ETL_DB_PASSWORD";

/// Main pipeline configuration
///
/// Loaded from TOML with sections `[inputs]`, `[output]` and
/// `[infrastructure]`; every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Name of the pipeline run
    pub name: Option<String>,
    /// Input locations
    pub inputs: InputsConfig,
    /// Sink settings
    pub output: OutputConfig,
    /// Infrastructure to provision
    pub infrastructure: InfrastructureConfig,
    /// Environment variable the database password is read from
    pub password_env: String,
    /// Read the sources of one format concurrently
    pub parallel_extract: bool,
    /// Enable dry-run mode
    pub dry_run: bool,
    /// Verbose output
    pub verbose: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: None,
            inputs: InputsConfig::default(),
            output: OutputConfig::default(),
            infrastructure: InfrastructureConfig::default(),
            password_env: DEFAULT_PASSWORD_ENV.to_string(),
            parallel_extract: false,
            dry_run: false,
            verbose: false,
        }
    }
}

/// Where the input files live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputsConfig {
    /// Directory holding `<source>.<ext>` files
    pub data_root: PathBuf,
    /// Source names, in enumeration order
    pub sources: Vec<String>,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            sources: vec![
                "source1".to_string(),
                "source2".to_string(),
                "source3".to_string(),
            ],
        }
    }
}

/// Sink settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for the staging file and run record
    pub output_dir: PathBuf,
    /// Staging file name inside the output directory
    pub staging_file: String,
    /// Object-store key of the uploaded artifact
    pub object_key: String,
    /// Relational table replaced on every run
    pub table_name: String,
    /// Re-count rows after the relational load
    pub verify_row_count: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            staging_file: "transformed_data.csv".to_string(),
            object_key: "transformed_data.csv".to_string(),
            table_name: "etl_table".to_string(),
            verify_row_count: true,
        }
    }
}

/// One expected input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLocation {
    pub format: InputFormat,
    pub source: String,
    pub path: PathBuf,
}

impl PipelineConfig {
    /// Create a new pipeline config
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io_with_path(path, "reading configuration", e))?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> PipelineResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Set the pipeline name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the data root
    pub fn with_data_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.data_root = path.into();
        self
    }

    /// Set the source names
    pub fn with_sources<S: Into<String>>(mut self, sources: impl IntoIterator<Item = S>) -> Self {
        self.inputs.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Set the output directory
    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output.output_dir = path.into();
        self
    }

    /// Set the staging file name
    pub fn with_staging_file(mut self, name: impl Into<String>) -> Self {
        self.output.staging_file = name.into();
        self
    }

    /// Set the object key
    pub fn with_object_key(mut self, key: impl Into<String>) -> Self {
        self.output.object_key = key.into();
        self
    }

    /// Set the relational table name
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.output.table_name = name.into();
        self
    }

    /// Enable or disable post-load row count verification
    pub fn with_verify_row_count(mut self, verify: bool) -> Self {
        self.output.verify_row_count = verify;
        self
    }

    /// Set infrastructure settings
    pub fn with_infrastructure(mut self, infrastructure: InfrastructureConfig) -> Self {
        self.infrastructure = infrastructure;
        self
    }

    /// Set the password environment variable
    pub fn with_password_env(mut self, name: impl Into<String>) -> Self {
        self.password_env = name.into();
        self
    }

    /// Enable parallel extraction
    pub fn with_parallel_extract(mut self, parallel: bool) -> Self {
        self.parallel_extract = parallel;
        self
    }

    /// Enable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Expected inputs: every format, and within a format every source in order
    pub fn input_locations(&self) -> Vec<InputLocation> {
        InputFormat::all()
            .into_iter()
            .flat_map(|format| self.input_locations_for(format))
            .collect()
    }

    /// Expected inputs of one format, in source order
    pub fn input_locations_for(&self, format: InputFormat) -> Vec<InputLocation> {
        self.inputs
            .sources
            .iter()
            .map(|source| InputLocation {
                format,
                source: source.clone(),
                path: self
                    .inputs
                    .data_root
                    .join(format!("{}.{}", source, format.extension())),
            })
            .collect()
    }

    /// Expected inputs that are not files
    pub fn missing_inputs(&self) -> Vec<PathBuf> {
        self.input_locations()
            .into_iter()
            .filter(|loc| !loc.path.is_file())
            .map(|loc| loc.path)
            .collect()
    }

    /// Path of the staging file
    pub fn staging_path(&self) -> PathBuf {
        self.output.output_dir.join(&self.output.staging_file)
    }

    /// Resolve the database password from the environment
    pub fn database_password(&self) -> PipelineResult<String> {
        self.password_from(|name| std::env::var(name).ok())
    }

    /// Resolve the database password with a custom lookup
    pub fn password_from(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> PipelineResult<String> {
        match lookup(&self.password_env) {
            Some(password) if !password.is_empty() => Ok(password),
            _ => Err(PipelineError::ConfigError(format!(
                "database password not set: export {}",
                self.password_env
            ))),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.inputs.sources.is_empty() {
            return Err("At least one input source is required".to_string());
        }
        if let Some(source) = self
            .inputs
            .sources
            .iter()
            .find(|s| s.trim().is_empty() || s.contains(['/', '\\']))
        {
            return Err(format!("Invalid source name: {:?}", source));
        }
        if self.output.staging_file.trim().is_empty() {
            return Err("Staging file name is required".to_string());
        }
        if self.output.object_key.trim().is_empty() {
            return Err("Object key is required".to_string());
        }
        if self.output.table_name.trim().is_empty() {
            return Err("Table name is required".to_string());
        }
        if self.password_env.trim().is_empty() {
            return Err("Password environment variable name is required".to_string());
        }
        self.infrastructure
            .validate()
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}
