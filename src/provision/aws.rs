//! AWS control plane: S3, RDS, Glue and IAM

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_glue::types::{CrawlerTargets as GlueTargets, DatabaseInput, S3Target};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use tokio::runtime::Runtime;

use super::{
    CrawlerTargets, DatabaseEndpoint, DatabaseInstanceSpec, Ensured, Provisioner,
    ProvisioningError, RoleArn,
};

/// Provisioner backed by the AWS SDK
///
/// Clients are created once from the default credential chain. A private
/// runtime drives the async SDK so that every call blocks until done.
pub struct AwsProvisioner {
    s3: aws_sdk_s3::Client,
    rds: aws_sdk_rds::Client,
    glue: aws_sdk_glue::Client,
    iam: aws_sdk_iam::Client,
    master_password: String,
    poll_interval: Duration,
    max_attempts: u32,
    runtime: Runtime,
}

impl AwsProvisioner {
    /// Connect to `region`
    ///
    /// `master_password` is only sent when a database instance is created.
    pub fn connect(
        region: &str,
        master_password: impl Into<String>,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Result<Self, ProvisioningError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ProvisioningError::request("runtime", region, e))?;

        let config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(aws_config::Region::new(region.to_string()))
                .load(),
        );

        Ok(Self {
            s3: aws_sdk_s3::Client::new(&config),
            rds: aws_sdk_rds::Client::new(&config),
            glue: aws_sdk_glue::Client::new(&config),
            iam: aws_sdk_iam::Client::new(&config),
            master_password: master_password.into(),
            poll_interval,
            max_attempts: max_attempts.max(1),
            runtime,
        })
    }

    /// Poll until the instance reports `available`, then return its endpoint
    async fn wait_for_instance(
        &self,
        spec: &DatabaseInstanceSpec,
    ) -> Result<DatabaseEndpoint, ProvisioningError> {
        let id = spec.identifier.as_str();
        for attempt in 1..=self.max_attempts {
            let response = self
                .rds
                .describe_db_instances()
                .db_instance_identifier(id)
                .send()
                .await
                .map_err(|e| ProvisioningError::request("database instance", id, e))?;

            let instance = response.db_instances().first();
            let status = instance.and_then(|i| i.db_instance_status()).unwrap_or("");
            tracing::debug!(instance = id, status, attempt, "Database instance status");

            if status == "available" {
                let endpoint = instance.and_then(|i| i.endpoint()).ok_or_else(|| {
                    ProvisioningError::MissingField {
                        resource: "database instance",
                        name: id.to_string(),
                        field: "endpoint",
                    }
                })?;
                let host = endpoint.address().ok_or_else(|| ProvisioningError::MissingField {
                    resource: "database instance",
                    name: id.to_string(),
                    field: "endpoint address",
                })?;
                let port = endpoint
                    .port()
                    .and_then(|p| u16::try_from(p).ok())
                    .unwrap_or_else(|| spec.port());

                return Ok(DatabaseEndpoint {
                    host: host.to_string(),
                    port,
                    database: spec.database_name.clone(),
                    user: spec.master_username.clone(),
                });
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(ProvisioningError::Timeout {
            resource: "database instance",
            name: id.to_string(),
            attempts: self.max_attempts,
        })
    }
}

impl Provisioner for AwsProvisioner {
    fn ensure_bucket(&self, name: &str, region: &str) -> Result<Ensured<()>, ProvisioningError> {
        self.runtime.block_on(async {
            let mut request = self.s3.create_bucket().bucket(name);
            // us-east-1 rejects an explicit location constraint
            if region != "us-east-1" {
                request = request.create_bucket_configuration(
                    CreateBucketConfiguration::builder()
                        .location_constraint(BucketLocationConstraint::from(region))
                        .build(),
                );
            }

            match request.send().await {
                Ok(_) => Ok(Ensured::created(())),
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|se| se.is_bucket_already_owned_by_you()) =>
                {
                    Ok(Ensured::existing(()))
                }
                Err(e) => Err(ProvisioningError::request("bucket", name, e)),
            }
        })
    }

    fn ensure_database_instance(
        &self,
        spec: &DatabaseInstanceSpec,
    ) -> Result<Ensured<DatabaseEndpoint>, ProvisioningError> {
        self.runtime.block_on(async {
            let created = self
                .rds
                .create_db_instance()
                .db_instance_identifier(&spec.identifier)
                .allocated_storage(spec.allocated_storage_gb)
                .db_instance_class(&spec.instance_class)
                .engine(&spec.engine)
                .master_username(&spec.master_username)
                .master_user_password(&self.master_password)
                .db_name(&spec.database_name)
                .publicly_accessible(spec.publicly_accessible)
                .send()
                .await;

            let created = match created {
                Ok(_) => {
                    tracing::info!(instance = %spec.identifier, "Database instance creation started");
                    true
                }
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|se| se.is_db_instance_already_exists_fault()) =>
                {
                    false
                }
                Err(e) => {
                    return Err(ProvisioningError::request(
                        "database instance",
                        &spec.identifier,
                        e,
                    ));
                }
            };

            let endpoint = self.wait_for_instance(spec).await?;
            Ok(if created {
                Ensured::created(endpoint)
            } else {
                Ensured::existing(endpoint)
            })
        })
    }

    fn ensure_catalog_database(&self, name: &str) -> Result<Ensured<()>, ProvisioningError> {
        self.runtime.block_on(async {
            let input = DatabaseInput::builder()
                .name(name)
                .build()
                .map_err(|e| ProvisioningError::request("catalog database", name, e))?;

            match self.glue.create_database().database_input(input).send().await {
                Ok(_) => Ok(Ensured::created(())),
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|se| se.is_already_exists_exception()) =>
                {
                    Ok(Ensured::existing(()))
                }
                Err(e) => Err(ProvisioningError::request("catalog database", name, e)),
            }
        })
    }

    fn ensure_crawler(
        &self,
        name: &str,
        role: &RoleArn,
        targets: &CrawlerTargets,
    ) -> Result<Ensured<()>, ProvisioningError> {
        self.runtime.block_on(async {
            let glue_targets = targets
                .s3_paths
                .iter()
                .fold(GlueTargets::builder(), |builder, path| {
                    builder.s3_targets(S3Target::builder().path(path).build())
                })
                .build();

            let created = self
                .glue
                .create_crawler()
                .name(name)
                .role(role.as_str())
                .database_name(&targets.database)
                .targets(glue_targets)
                .table_prefix(&targets.table_prefix)
                .send()
                .await;

            match created {
                Ok(_) => {}
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|se| se.is_already_exists_exception()) =>
                {
                    return Ok(Ensured::existing(()));
                }
                Err(e) => return Err(ProvisioningError::request("crawler", name, e)),
            }

            self.glue
                .start_crawler()
                .name(name)
                .send()
                .await
                .map_err(|e| ProvisioningError::request("crawler", name, e))?;
            tracing::info!(crawler = name, "Crawler started");
            Ok(Ensured::created(()))
        })
    }

    fn ensure_service_role(
        &self,
        name: &str,
        policies: &[String],
    ) -> Result<Ensured<RoleArn>, ProvisioningError> {
        self.runtime.block_on(async {
            let trust = serde_json::json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": {"Service": "glue.amazonaws.com"},
                    "Action": "sts:AssumeRole"
                }]
            });

            let created = self
                .iam
                .create_role()
                .role_name(name)
                .assume_role_policy_document(trust.to_string())
                .description("Glue ETL Role")
                .send()
                .await;

            let created = match created {
                Ok(_) => true,
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|se| se.is_entity_already_exists_exception()) =>
                {
                    false
                }
                Err(e) => return Err(ProvisioningError::request("service role", name, e)),
            };

            if created {
                for policy in policies {
                    self.iam
                        .attach_role_policy()
                        .role_name(name)
                        .policy_arn(policy)
                        .send()
                        .await
                        .map_err(|e| ProvisioningError::request("service role", name, e))?;
                }
            }

            let role = self
                .iam
                .get_role()
                .role_name(name)
                .send()
                .await
                .map_err(|e| ProvisioningError::request("service role", name, e))?;
            let arn = role
                .role()
                .map(|r| RoleArn(r.arn().to_string()))
                .ok_or_else(|| ProvisioningError::MissingField {
                    resource: "service role",
                    name: name.to_string(),
                    field: "arn",
                })?;

            Ok(if created {
                Ensured::created(arn)
            } else {
                Ensured::existing(arn)
            })
        })
    }
}
