//! ☁️🚚 AWS DMS: the real migration service, reached through the official SDK.
//!
//! INT. us-east-1, NIGHT. A replication instance hums. It has been waiting
//! for a task since the Terraform apply. Tonight it gets one.
//!
//! 🧠 Knowledge graph:
//! - Client built from the ambient AWS environment (env vars → ~/.aws/config → IAM role → hope)
//! - create → `CreateReplicationTask`, describe → `DescribeReplicationTasks` filtered by ARN,
//!   start → `StartReplicationTask` with `start-replication`
//! - SDK errors are flattened with `DisplayErrorContext` so the message survives the trip
//!   into `FerryError::RemoteCall` (the bare SDK Display just says "service error". thanks.)

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_databasemigration::config::Region;
use aws_sdk_databasemigration::error::DisplayErrorContext;
use aws_sdk_databasemigration::types::{
    Filter, MigrationTypeValue, StartReplicationTaskTypeValue, Tag,
};
use tracing::debug;

use crate::errors::FerryError;
use crate::replication::{
    CreateTaskRequest, MigrationType, ReplicationService, TaskSnapshot, TaskStatus,
};

/// ☁️ Thin wrapper over the DMS SDK client.
#[derive(Debug, Clone)]
pub struct AwsDms {
    client: aws_sdk_databasemigration::Client,
}

impl AwsDms {
    /// 🚀 Build a client from the ambient AWS credential chain.
    /// `None` leaves the region to the chain too (AWS_REGION, profile, IMDS).
    pub async fn connect(region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let the_aws_config = loader.load().await;
        debug!(
            "☁️ DMS client configured for region {:?}",
            the_aws_config.region().map(|r| r.as_ref().to_string())
        );
        Self::from_client(aws_sdk_databasemigration::Client::new(&the_aws_config))
    }

    /// 🔧 Wrap an already configured client. Tests point one of these at a mock server.
    pub fn from_client(client: aws_sdk_databasemigration::Client) -> Self {
        Self { client }
    }
}

fn sdk_failure<E>(operation: &'static str, err: E) -> FerryError
where
    E: std::error::Error,
{
    FerryError::remote(operation, DisplayErrorContext(err).to_string())
}

fn migration_type_value(migration_type: MigrationType) -> MigrationTypeValue {
    match migration_type {
        MigrationType::FullLoad => MigrationTypeValue::FullLoad,
    }
}

#[async_trait]
impl ReplicationService for AwsDms {
    async fn create_replication_task(&self, request: &CreateTaskRequest) -> Result<String, FerryError> {
        let the_mappings_json = request
            .table_mappings
            .to_json()
            .map_err(|e| FerryError::remote("create-replication-task", e))?;

        let the_tags: Vec<Tag> = request
            .tags
            .iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build())
            .collect();

        let response = self
            .client
            .create_replication_task()
            .replication_task_identifier(&request.task_identifier)
            .source_endpoint_arn(&request.source_endpoint_arn)
            .target_endpoint_arn(&request.target_endpoint_arn)
            .replication_instance_arn(&request.replication_instance_arn)
            .migration_type(migration_type_value(request.migration_type))
            .table_mappings(the_mappings_json)
            .replication_task_settings(&request.task_settings)
            .set_tags(Some(the_tags))
            .send()
            .await
            .map_err(|e| sdk_failure("create-replication-task", e))?;

        // 💀 A 200 without an ARN is the service equivalent of a receipt with no total.
        response
            .replication_task()
            .and_then(|task| task.replication_task_arn())
            .map(str::to_string)
            .ok_or_else(|| {
                FerryError::remote(
                    "create-replication-task",
                    "response did not include a replication task ARN",
                )
            })
    }

    async fn describe_replication_task(&self, task_arn: &str) -> Result<TaskSnapshot, FerryError> {
        let the_filter = Filter::builder()
            .name("replication-task-arn")
            .values(task_arn)
            .build()
            .map_err(|e| FerryError::remote("describe-replication-tasks", e))?;

        let response = self
            .client
            .describe_replication_tasks()
            .filters(the_filter)
            .send()
            .await
            .map_err(|e| sdk_failure("describe-replication-tasks", e))?;

        let task = response.replication_tasks().first().ok_or_else(|| {
            FerryError::remote(
                "describe-replication-tasks",
                format!("no replication task matches {task_arn}"),
            )
        })?;

        Ok(TaskSnapshot {
            arn: task
                .replication_task_arn()
                .unwrap_or(task_arn)
                .to_string(),
            status: TaskStatus::from(task.status().unwrap_or_default()),
            last_failure_message: task.last_failure_message().map(str::to_string),
        })
    }

    async fn start_replication_task(&self, task_arn: &str) -> Result<TaskStatus, FerryError> {
        let response = self
            .client
            .start_replication_task()
            .replication_task_arn(task_arn)
            .start_replication_task_type(StartReplicationTaskTypeValue::StartReplication)
            .send()
            .await
            .map_err(|e| sdk_failure("start-replication-task", e))?;

        Ok(TaskStatus::from(
            response
                .replication_task()
                .and_then(|task| task.status())
                .unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use aws_sdk_databasemigration::config::retry::RetryConfig;
    use aws_sdk_databasemigration::config::{BehaviorVersion, Credentials, Region};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::replication::TableMappings;

    const TARGET_PREFIX: &str = "AmazonDMSv20160101";

    fn dms_pointed_at(server: &MockServer) -> AwsDms {
        let config = aws_sdk_databasemigration::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(server.uri())
            .credentials_provider(Credentials::new("AKIDFERRY", "shh", None, None, "test"))
            .retry_config(RetryConfig::disabled())
            .build();
        AwsDms::from_client(aws_sdk_databasemigration::Client::from_conf(config))
    }

    fn json_reply(body: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/x-amz-json-1.1")
            .set_body_string(body.to_string())
    }

    #[tokio::test]
    async fn the_one_where_create_sends_full_load_and_the_mappings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", format!("{TARGET_PREFIX}.CreateReplicationTask").as_str()))
            .and(body_partial_json(json!({
                "ReplicationTaskIdentifier": "pg-to-rs-7",
                "MigrationType": "full-load",
                "SourceEndpointArn": "arn:src",
                "TargetEndpointArn": "arn:dst",
                "ReplicationInstanceArn": "arn:inst",
                "ReplicationTaskSettings": "{}"
            })))
            .respond_with(json_reply(json!({
                "ReplicationTask": {
                    "ReplicationTaskArn": "arn:aws:dms:us-east-1:123:task:SEVEN",
                    "Status": "creating"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dms = dms_pointed_at(&server);
        let request = CreateTaskRequest {
            task_identifier: "pg-to-rs-7".to_string(),
            source_endpoint_arn: "arn:src".to_string(),
            target_endpoint_arn: "arn:dst".to_string(),
            replication_instance_arn: "arn:inst".to_string(),
            migration_type: MigrationType::FullLoad,
            table_mappings: TableMappings::include_schema("public", "%"),
            task_settings: "{}".to_string(),
            tags: BTreeMap::from([("Project".to_string(), "ferry".to_string())]),
        };

        let arn = dms
            .create_replication_task(&request)
            .await
            .expect("💀 create should have been a layup against a mock server");
        assert_eq!(arn, "arn:aws:dms:us-east-1:123:task:SEVEN");
    }

    #[tokio::test]
    async fn the_one_where_describe_brings_back_status_and_failure_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", format!("{TARGET_PREFIX}.DescribeReplicationTasks").as_str()))
            .and(body_partial_json(json!({
                "Filters": [{ "Name": "replication-task-arn", "Values": ["arn:task"] }]
            })))
            .respond_with(json_reply(json!({
                "ReplicationTasks": [{
                    "ReplicationTaskArn": "arn:task",
                    "Status": "failed",
                    "LastFailureMessage": "disk full"
                }]
            })))
            .mount(&server)
            .await;

        let snapshot = dms_pointed_at(&server)
            .describe_replication_task("arn:task")
            .await
            .expect("💀 describe should parse a perfectly normal response");
        assert_eq!(snapshot.status, TaskStatus::Failed);
        assert_eq!(snapshot.last_failure_message.as_deref(), Some("disk full"));
    }

    #[tokio::test]
    async fn the_one_where_an_empty_describe_is_a_remote_call_problem() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(json_reply(json!({ "ReplicationTasks": [] })))
            .mount(&server)
            .await;

        let err = dms_pointed_at(&server)
            .describe_replication_task("arn:ghost")
            .await
            .expect_err("no tasks means no snapshot");
        assert!(matches!(
            err,
            FerryError::RemoteCall { operation: "describe-replication-tasks", .. }
        ));
        assert!(err.to_string().contains("arn:ghost"));
    }

    #[tokio::test]
    async fn the_one_where_service_faults_surface_as_remote_call_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", format!("{TARGET_PREFIX}.StartReplicationTask").as_str()))
            .respond_with(
                ResponseTemplate::new(400)
                    .insert_header("content-type", "application/x-amz-json-1.1")
                    .set_body_string(
                        json!({
                            "__type": "InvalidResourceStateFault",
                            "message": "task is not ready"
                        })
                        .to_string(),
                    ),
            )
            .mount(&server)
            .await;

        let err = dms_pointed_at(&server)
            .start_replication_task("arn:task")
            .await
            .expect_err("a 400 is not a start");
        assert!(matches!(
            err,
            FerryError::RemoteCall { operation: "start-replication-task", .. }
        ));
    }

    #[tokio::test]
    async fn the_one_where_start_reports_what_the_service_said() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "ReplicationTaskArn": "arn:task",
                "StartReplicationTaskType": "start-replication"
            })))
            .respond_with(json_reply(json!({
                "ReplicationTask": { "ReplicationTaskArn": "arn:task", "Status": "starting" }
            })))
            .mount(&server)
            .await;

        let status = dms_pointed_at(&server)
            .start_replication_task("arn:task")
            .await
            .expect("💀 start should succeed against the mock");
        assert_eq!(status, TaskStatus::Starting);
    }
}
