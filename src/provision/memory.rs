//! In-memory provisioner

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    CrawlerTargets, DatabaseEndpoint, DatabaseInstanceSpec, EnsureOutcome, Ensured, Provisioner,
    ProvisioningError, RoleArn,
};

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, String>,
    instances: BTreeMap<String, DatabaseEndpoint>,
    catalogs: BTreeSet<String>,
    crawlers: BTreeMap<String, (RoleArn, CrawlerTargets)>,
    started_crawlers: Vec<String>,
    roles: BTreeMap<String, (RoleArn, Vec<String>)>,
    calls: Vec<&'static str>,
    fail_on: Option<&'static str>,
}

/// Provisioner that keeps resources in memory
///
/// Clones share state, so a caller can keep a handle for inspection after
/// handing a clone to the pipeline. Every database instance resolves to a
/// `localhost` endpoint.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvisioner {
    state: Arc<Mutex<State>>,
}

impl InMemoryProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `operation` fail, e.g. `"ensure_crawler"`
    pub fn failing_on(self, operation: &'static str) -> Self {
        self.lock().fail_on = Some(operation);
        self
    }

    /// Operations called so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    /// Check if a bucket has been ensured
    pub fn has_bucket(&self, name: &str) -> bool {
        self.lock().buckets.contains_key(name)
    }

    /// Crawlers started so far
    pub fn started_crawlers(&self) -> Vec<String> {
        self.lock().started_crawlers.clone()
    }

    /// Policies attached to a role
    pub fn role_policies(&self, name: &str) -> Option<Vec<String>> {
        self.lock().roles.get(name).map(|(_, p)| p.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(
        &self,
        operation: &'static str,
        name: &str,
    ) -> Result<MutexGuard<'_, State>, ProvisioningError> {
        let mut state = self.lock();
        state.calls.push(operation);
        if state.fail_on == Some(operation) {
            return Err(ProvisioningError::request(
                resource_of(operation),
                name,
                "injected failure",
            ));
        }
        Ok(state)
    }
}

fn resource_of(operation: &str) -> &'static str {
    match operation {
        "ensure_bucket" => "bucket",
        "ensure_database_instance" => "database instance",
        "ensure_catalog_database" => "catalog database",
        "ensure_crawler" => "crawler",
        _ => "service role",
    }
}

impl Provisioner for InMemoryProvisioner {
    fn ensure_bucket(&self, name: &str, region: &str) -> Result<Ensured<()>, ProvisioningError> {
        let mut state = self.begin("ensure_bucket", name)?;
        if state.buckets.contains_key(name) {
            return Ok(Ensured::existing(()));
        }
        state.buckets.insert(name.to_string(), region.to_string());
        Ok(Ensured::created(()))
    }

    fn ensure_database_instance(
        &self,
        spec: &DatabaseInstanceSpec,
    ) -> Result<Ensured<DatabaseEndpoint>, ProvisioningError> {
        let mut state = self.begin("ensure_database_instance", &spec.identifier)?;
        if let Some(endpoint) = state.instances.get(&spec.identifier) {
            return Ok(Ensured::existing(endpoint.clone()));
        }
        let endpoint = DatabaseEndpoint {
            host: "localhost".to_string(),
            port: spec.port(),
            database: spec.database_name.clone(),
            user: spec.master_username.clone(),
        };
        state
            .instances
            .insert(spec.identifier.clone(), endpoint.clone());
        Ok(Ensured::created(endpoint))
    }

    fn ensure_catalog_database(&self, name: &str) -> Result<Ensured<()>, ProvisioningError> {
        let mut state = self.begin("ensure_catalog_database", name)?;
        let outcome = if state.catalogs.insert(name.to_string()) {
            EnsureOutcome::Created
        } else {
            EnsureOutcome::AlreadyExists
        };
        Ok(Ensured::from_outcome(outcome))
    }

    fn ensure_crawler(
        &self,
        name: &str,
        role: &RoleArn,
        targets: &CrawlerTargets,
    ) -> Result<Ensured<()>, ProvisioningError> {
        let mut state = self.begin("ensure_crawler", name)?;
        if state.crawlers.contains_key(name) {
            return Ok(Ensured::existing(()));
        }
        state
            .crawlers
            .insert(name.to_string(), (role.clone(), targets.clone()));
        state.started_crawlers.push(name.to_string());
        Ok(Ensured::created(()))
    }

    fn ensure_service_role(
        &self,
        name: &str,
        policies: &[String],
    ) -> Result<Ensured<RoleArn>, ProvisioningError> {
        let mut state = self.begin("ensure_service_role", name)?;
        if let Some((arn, _)) = state.roles.get(name) {
            return Ok(Ensured::existing(arn.clone()));
        }
        let arn = RoleArn(format!("arn:aws:iam::000000000000:role/{name}"));
        state
            .roles
            .insert(name.to_string(), (arn.clone(), policies.to_vec()));
        Ok(Ensured::created(arn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_idempotent() {
        let provisioner = InMemoryProvisioner::new();
        let first = provisioner.ensure_bucket("b", "ap-south-1").unwrap();
        let second = provisioner.ensure_bucket("b", "ap-south-1").unwrap();

        assert!(first.is_created());
        assert_eq!(second.outcome, EnsureOutcome::AlreadyExists);
        assert!(provisioner.has_bucket("b"));
    }

    #[test]
    fn test_crawler_started_once() {
        let provisioner = InMemoryProvisioner::new();
        let role = RoleArn("arn:aws:iam::000000000000:role/r".to_string());
        let targets = CrawlerTargets {
            database: "db".to_string(),
            s3_paths: vec!["s3://b/".to_string()],
            table_prefix: "etl_".to_string(),
        };

        provisioner.ensure_crawler("c", &role, &targets).unwrap();
        provisioner.ensure_crawler("c", &role, &targets).unwrap();
        assert_eq!(provisioner.started_crawlers(), vec!["c"]);
    }

    #[test]
    fn test_role_keeps_policies() {
        let provisioner = InMemoryProvisioner::new();
        let policies = vec!["p1".to_string(), "p2".to_string()];

        let arn = provisioner.ensure_service_role("role", &policies).unwrap();
        assert!(arn.is_created());
        assert_eq!(provisioner.role_policies("role"), Some(policies));
    }

    #[test]
    fn test_clones_share_state() {
        let provisioner = InMemoryProvisioner::new();
        let handle = provisioner.clone();
        provisioner.ensure_catalog_database("cat").unwrap();

        let again = handle.ensure_catalog_database("cat").unwrap();
        assert_eq!(again.outcome, EnsureOutcome::AlreadyExists);
    }

    #[test]
    fn test_injected_failure() {
        let provisioner = InMemoryProvisioner::new().failing_on("ensure_bucket");
        let err = provisioner.ensure_bucket("b", "r").unwrap_err();
        assert!(matches!(
            err,
            ProvisioningError::Request {
                resource: "bucket",
                ..
            }
        ));
        assert!(!provisioner.has_bucket("b"));
    }
}
