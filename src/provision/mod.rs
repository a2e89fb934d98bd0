//! Infrastructure provisioning
//!
//! Every call is an idempotent "ensure exists": a second call with the same
//! arguments reports [`EnsureOutcome::AlreadyExists`] instead of failing.
//! [`ensure_infrastructure`] runs the full sequence the pipeline needs before
//! extraction starts.
//!
//! Implementations:
//! - [`InMemoryProvisioner`]: records resources in memory, used for local runs
//!   and tests
//! - `AwsProvisioner` (feature `aws`): S3, RDS, Glue and IAM

#[cfg(feature = "aws")]
mod aws;
mod error;
mod memory;

#[cfg(feature = "aws")]
pub use aws::AwsProvisioner;
pub use error::ProvisioningError;
pub use memory::InMemoryProvisioner;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of an ensure call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsureOutcome {
    /// The resource was created by this call
    Created,
    /// The resource was already present
    AlreadyExists,
}

impl fmt::Display for EnsureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnsureOutcome::Created => write!(f, "created"),
            EnsureOutcome::AlreadyExists => write!(f, "already exists"),
        }
    }
}

/// An ensured resource together with how it was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ensured<T> {
    pub outcome: EnsureOutcome,
    pub value: T,
}

impl<T> Ensured<T> {
    pub fn created(value: T) -> Self {
        Self {
            outcome: EnsureOutcome::Created,
            value,
        }
    }

    pub fn existing(value: T) -> Self {
        Self {
            outcome: EnsureOutcome::AlreadyExists,
            value,
        }
    }

    pub fn is_created(&self) -> bool {
        self.outcome == EnsureOutcome::Created
    }
}

impl Ensured<()> {
    /// Outcome of a call that yields no value
    pub fn from_outcome(outcome: EnsureOutcome) -> Self {
        Self { outcome, value: () }
    }
}

/// Connection details of a relational database instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEndpoint {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
}

impl DatabaseEndpoint {
    /// Endpoint of a database on this machine
    pub fn local(database: impl Into<String>) -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_port("postgres"),
            database: database.into(),
            user: "admin".to_string(),
        }
    }
}

impl fmt::Display for DatabaseEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

/// Identifier of an access role
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleArn(pub String);

impl RoleArn {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Relational database instance to provision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseInstanceSpec {
    /// Instance identifier
    pub identifier: String,
    /// Instance class, e.g. `db.t3.micro`
    pub instance_class: String,
    /// Allocated storage in GiB
    pub allocated_storage_gb: i32,
    /// Database engine
    pub engine: String,
    /// Master user name
    pub master_username: String,
    /// Initial database created on the instance
    pub database_name: String,
    pub publicly_accessible: bool,
}

impl Default for DatabaseInstanceSpec {
    fn default() -> Self {
        Self {
            identifier: "etl-mysql-db".to_string(),
            instance_class: "db.t3.micro".to_string(),
            allocated_storage_gb: 20,
            engine: "postgres".to_string(),
            master_username: "admin".to_string(),
            database_name: "etl_database".to_string(),
            publicly_accessible: true,
        }
    }
}

impl DatabaseInstanceSpec {
    /// Listener port used by the engine
    pub fn port(&self) -> u16 {
        default_port(&self.engine)
    }
}

fn default_port(engine: &str) -> u16 {
    match engine {
        "mysql" | "mariadb" | "aurora-mysql" => 3306,
        _ => 5432,
    }
}

/// Crawler targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlerTargets {
    /// Catalog database the crawler writes into
    pub database: String,
    /// Object-store paths to crawl
    pub s3_paths: Vec<String>,
    /// Prefix for catalog tables
    pub table_prefix: String,
}

/// The full set of infrastructure the pipeline runs against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfrastructureConfig {
    pub region: String,
    pub bucket: String,
    pub database: DatabaseInstanceSpec,
    pub catalog_database: String,
    pub crawler: String,
    pub crawler_table_prefix: String,
    pub service_role: String,
    pub role_policies: Vec<String>,
    /// Seconds between readiness checks of a new database instance
    pub instance_poll_interval_secs: u64,
    /// Readiness checks before giving up
    pub instance_max_attempts: u32,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            region: "ap-south-1".to_string(),
            bucket: "my-etl-bucket-unique123456".to_string(),
            database: DatabaseInstanceSpec::default(),
            catalog_database: "etl_glue_db".to_string(),
            crawler: "etl_glue_crawler".to_string(),
            crawler_table_prefix: "etl_".to_string(),
            service_role: "AWSGlueServiceRole".to_string(),
            role_policies: vec![
                "arn:aws:iam::aws:policy/service-role/AWSGlueServiceRole".to_string(),
                "arn:aws:iam::aws:policy/AmazonS3FullAccess".to_string(),
            ],
            instance_poll_interval_secs: 30,
            instance_max_attempts: 60,
        }
    }
}

impl InfrastructureConfig {
    /// Crawler targets derived from the bucket and catalog settings
    pub fn crawler_targets(&self) -> CrawlerTargets {
        CrawlerTargets {
            database: self.catalog_database.clone(),
            s3_paths: vec![format!("s3://{}/", self.bucket)],
            table_prefix: self.crawler_table_prefix.clone(),
        }
    }

    /// Check that every resource has a name
    pub fn validate(&self) -> Result<(), ProvisioningError> {
        let required = [
            ("region", &self.region),
            ("bucket", &self.bucket),
            ("database.identifier", &self.database.identifier),
            ("database.database_name", &self.database.database_name),
            ("catalog_database", &self.catalog_database),
            ("crawler", &self.crawler),
            ("service_role", &self.service_role),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ProvisioningError::InvalidConfig(format!(
                    "'{field}' must not be empty"
                )));
            }
        }
        if self.instance_max_attempts == 0 {
            return Err(ProvisioningError::InvalidConfig(
                "'instance_max_attempts' must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Idempotent control-plane operations
pub trait Provisioner {
    /// Ensure an object-storage bucket exists in `region`
    fn ensure_bucket(&self, name: &str, region: &str) -> Result<Ensured<()>, ProvisioningError>;

    /// Ensure a database instance exists and is available, returning its endpoint
    fn ensure_database_instance(
        &self,
        spec: &DatabaseInstanceSpec,
    ) -> Result<Ensured<DatabaseEndpoint>, ProvisioningError>;

    /// Ensure a metadata catalog database exists
    fn ensure_catalog_database(&self, name: &str) -> Result<Ensured<()>, ProvisioningError>;

    /// Ensure a crawler exists; a newly created crawler is started
    fn ensure_crawler(
        &self,
        name: &str,
        role: &RoleArn,
        targets: &CrawlerTargets,
    ) -> Result<Ensured<()>, ProvisioningError>;

    /// Ensure an access role exists with `policies` attached
    fn ensure_service_role(
        &self,
        name: &str,
        policies: &[String],
    ) -> Result<Ensured<RoleArn>, ProvisioningError>;
}

/// What [`ensure_infrastructure`] produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedInfrastructure {
    /// Endpoint of the relational store
    pub endpoint: DatabaseEndpoint,
    /// Role used by the crawler
    pub role: RoleArn,
    /// `(resource, outcome)` in the order they were ensured
    pub outcomes: Vec<(String, EnsureOutcome)>,
}

impl ProvisionedInfrastructure {
    /// Number of resources created by this run
    pub fn created_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == EnsureOutcome::Created)
            .count()
    }
}

/// Ensure bucket, database instance, role, catalog and crawler, in that order
pub fn ensure_infrastructure(
    provisioner: &dyn Provisioner,
    config: &InfrastructureConfig,
) -> Result<ProvisionedInfrastructure, ProvisioningError> {
    config.validate()?;
    let mut outcomes = Vec::with_capacity(5);

    let bucket = provisioner.ensure_bucket(&config.bucket, &config.region)?;
    log_outcome("bucket", &config.bucket, bucket.outcome);
    outcomes.push((format!("bucket:{}", config.bucket), bucket.outcome));

    let instance = provisioner.ensure_database_instance(&config.database)?;
    log_outcome(
        "database instance",
        &config.database.identifier,
        instance.outcome,
    );
    outcomes.push((
        format!("database_instance:{}", config.database.identifier),
        instance.outcome,
    ));

    let role = provisioner.ensure_service_role(&config.service_role, &config.role_policies)?;
    log_outcome("service role", &config.service_role, role.outcome);
    outcomes.push((format!("service_role:{}", config.service_role), role.outcome));

    let catalog = provisioner.ensure_catalog_database(&config.catalog_database)?;
    log_outcome("catalog database", &config.catalog_database, catalog.outcome);
    outcomes.push((
        format!("catalog_database:{}", config.catalog_database),
        catalog.outcome,
    ));

    let crawler =
        provisioner.ensure_crawler(&config.crawler, &role.value, &config.crawler_targets())?;
    log_outcome("crawler", &config.crawler, crawler.outcome);
    outcomes.push((format!("crawler:{}", config.crawler), crawler.outcome));

    Ok(ProvisionedInfrastructure {
        endpoint: instance.value,
        role: role.value,
        outcomes,
    })
}

fn log_outcome(resource: &str, name: &str, outcome: EnsureOutcome) {
    match outcome {
        EnsureOutcome::Created => tracing::info!(resource, name, "Resource created"),
        EnsureOutcome::AlreadyExists => tracing::info!(resource, name, "Resource already exists"),
    }
}
