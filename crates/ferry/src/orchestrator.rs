//! 🎬 The orchestrator: create, wait, start, wait. Four beats, one song.
//!
//! *[the task is created. it is "creating". it is "creating". it is "ready".]*
//! *[the task is started. it is "running". for a while. then "stopped".]*
//! *[for a full load, "stopped" means "done". nobody finds this confusing. nobody.]*
//!
//! Prerequisites that live outside this program: a replication instance, a
//! source endpoint and a target endpoint, all already provisioned.
//!
//! 🧠 Knowledge graph:
//! - `MigrationPlan`: validated config for the create call
//! - `create_migration_task` → `waiter::wait_for_status(readiness)`
//! - `start_migration_task` → `waiter::wait_for_status(completion)`
//! - `run_migration`: both, or only the second half when `dms.task_arn` is set
//!   (`--task-arn` or `FERRY_DMS__TASK_ARN`; the classic `TASK_ARN` is never read)
//!
//! Every failure is logged with context here and then handed back to the caller.
//! A create that fails halfway may leave a task behind; cleaning it up is a
//! job for the console, not for us.

use std::collections::BTreeMap;

use tracing::{error, info};

use crate::app_config::AppConfig;
use crate::errors::FerryError;
use crate::replication::{
    CreateTaskRequest, MigrationType, ReplicationService, TableMappings, TaskSnapshot,
};
use crate::waiter::{WaitPolicy, wait_for_status};

/// 📝 Everything needed to ask for a new full-load task, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationPlan {
    pub task_name: String,
    pub source_endpoint_arn: String,
    pub target_endpoint_arn: String,
    pub replication_instance_arn: String,
    pub schema_name: String,
    pub table_pattern: String,
    pub tags: BTreeMap<String, String>,
    pub task_settings: String,
}

impl MigrationPlan {
    /// 🎯 Pull the plan out of config, naming every missing ARN at once.
    pub fn from_config(config: &AppConfig) -> Result<Self, FerryError> {
        let mut missing = Vec::new();
        let mut require = |value: &Option<String>, name: &str| -> String {
            match value {
                Some(v) if !v.trim().is_empty() => v.clone(),
                _ => {
                    missing.push(format!("dms.{name}"));
                    String::new()
                }
            }
        };

        let source_endpoint_arn = require(&config.dms.source_endpoint_arn, "source_endpoint_arn");
        let target_endpoint_arn = require(&config.dms.target_endpoint_arn, "target_endpoint_arn");
        let replication_instance_arn =
            require(&config.dms.replication_instance_arn, "replication_instance_arn");

        if !missing.is_empty() {
            return Err(FerryError::Config(format!(
                "cannot create a replication task without {}",
                missing.join(", ")
            )));
        }
        if config.migration.task_name.trim().is_empty() {
            return Err(FerryError::Config(
                "migration.task_name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            task_name: config.migration.task_name.clone(),
            source_endpoint_arn,
            target_endpoint_arn,
            replication_instance_arn,
            schema_name: config.migration.schema_name.clone(),
            table_pattern: config.migration.table_pattern.clone(),
            tags: config.migration.tags.clone(),
            task_settings: config.migration.task_settings.clone(),
        })
    }

    /// 📦 The create call, fully assembled. Always a one-time full load.
    pub fn to_request(&self) -> CreateTaskRequest {
        CreateTaskRequest {
            task_identifier: self.task_name.clone(),
            source_endpoint_arn: self.source_endpoint_arn.clone(),
            target_endpoint_arn: self.target_endpoint_arn.clone(),
            replication_instance_arn: self.replication_instance_arn.clone(),
            migration_type: MigrationType::FullLoad,
            table_mappings: TableMappings::include_schema(&self.schema_name, &self.table_pattern),
            task_settings: self.task_settings.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// 🏗️ Create the task and block until it is `ready`. Returns the task ARN.
pub async fn create_migration_task<S>(
    service: &S,
    plan: &MigrationPlan,
    readiness: &WaitPolicy,
) -> Result<String, FerryError>
where
    S: ReplicationService + ?Sized,
{
    let result = async {
        let task_arn = service.create_replication_task(&plan.to_request()).await?;
        info!(task_arn = %task_arn, "🏗️ Migration task creation started: {}", task_arn);

        wait_for_status(service, &task_arn, readiness).await?;
        info!("✅ Migration task created successfully: {}", task_arn);
        Ok::<_, FerryError>(task_arn)
    }
    .await;

    result.inspect_err(|err| error!("💀 Error in migration task creation process: {}", err))
}

/// 🚀 Start a `ready` task and block until the full load finishes.
pub async fn start_migration_task<S>(
    service: &S,
    task_arn: &str,
    completion: &WaitPolicy,
) -> Result<TaskSnapshot, FerryError>
where
    S: ReplicationService + ?Sized,
{
    let result = async {
        let status = service.start_replication_task(task_arn).await?;
        info!("🚀 Task started successfully. Status: {}", status);

        let snapshot = wait_for_status(service, task_arn, completion).await?;
        info!("✅ Migration completed successfully!");
        Ok::<_, FerryError>(snapshot)
    }
    .await;

    result.inspect_err(|err| error!("💀 Error in migration process: {}", err))
}

/// 🎬 The whole crossing: create (or reuse) → ready → start → stopped.
pub async fn run_migration<S>(service: &S, config: &AppConfig) -> Result<String, FerryError>
where
    S: ReplicationService + ?Sized,
{
    let readiness = config.migration.readiness_policy();
    let completion = config.migration.completion_policy();

    let task_arn = match config.dms.task_arn.as_deref().filter(|arn| !arn.trim().is_empty()) {
        Some(existing) => {
            // 🔁 somebody already paid for this task; make sure it is ready and reuse it
            info!("🔁 Reusing existing replication task {}", existing);
            wait_for_status(service, existing, &readiness).await?;
            existing.to_string()
        }
        None => {
            let plan = MigrationPlan::from_config(config)?;
            create_migration_task(service, &plan, &readiness).await?
        }
    };

    start_migration_task(service, &task_arn, &completion).await?;
    info!("🏁 Migration process completed successfully!");
    Ok(task_arn)
}
