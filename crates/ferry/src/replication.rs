//! 🚚 Replication: the seam between us and the managed migration service.
//!
//! 🎬 COLD OPEN: INT. AWS CONSOLE, 2:14 AM
//!
//! A replication instance idles in a private subnet. Two endpoints stare at
//! each other across the VPC like exes at a wedding. Nobody has told them
//! they are about to share a task. That is our job.
//!
//! This module owns the three calls we ever make (create, describe, start),
//! the task status vocabulary, and the backend enum that lets the real AWS
//! client and the scripted in-memory one take turns.
//!
//! 🧠 Knowledge graph:
//! - Pattern: trait → concrete impls (AwsDms, InMemoryDms) → ReplicationBackend enum
//! - `waiter` only needs `describe_replication_task`
//! - `orchestrator` needs all three
//!
//! 🦆 The duck has read-only IAM permissions.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;

use crate::errors::FerryError;

pub(crate) mod aws_dms;
pub(crate) mod in_mem;
pub(crate) mod table_mappings;

pub use aws_dms::AwsDms;
pub use in_mem::InMemoryDms;
pub use table_mappings::TableMappings;

/// 🏷️ Lifecycle status of a replication task, as reported by the service.
///
/// Unknown strings survive as `Other` so a new service status never turns
/// into a parse failure halfway through a long wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Creating,
    Ready,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
    Deleting,
    Modifying,
    Moving,
    FailedMove,
    Testing,
    Other(String),
}

impl TaskStatus {
    /// 🔤 The service spelling of this status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "creating",
            Self::Ready => "ready",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
            Self::Deleting => "deleting",
            Self::Modifying => "modifying",
            Self::Moving => "moving",
            Self::FailedMove => "failed-move",
            Self::Testing => "testing",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl From<&str> for TaskStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "creating" => Self::Creating,
            "ready" => Self::Ready,
            "starting" => Self::Starting,
            "running" => Self::Running,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "failed" => Self::Failed,
            "deleting" => Self::Deleting,
            "modifying" => Self::Modifying,
            "moving" => Self::Moving,
            "failed-move" => Self::FailedMove,
            "testing" => Self::Testing,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 📸 What a single describe call tells us about a task. Always fresh, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub arn: String,
    pub status: TaskStatus,
    pub last_failure_message: Option<String>,
}

/// 🚚 How much of the source we move. We only ever move everything, once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationType {
    #[default]
    FullLoad,
}

impl MigrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullLoad => "full-load",
        }
    }
}

/// 📝 Everything the create call needs. Built by the orchestrator from config.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTaskRequest {
    pub task_identifier: String,
    pub source_endpoint_arn: String,
    pub target_endpoint_arn: String,
    pub replication_instance_arn: String,
    pub migration_type: MigrationType,
    pub table_mappings: TableMappings,
    /// Raw JSON; `{}` means "service defaults, thanks".
    pub task_settings: String,
    pub tags: BTreeMap<String, String>,
}

/// 🔌 The three logical operations we ask of the migration service.
///
/// # Contract 📜
/// - `create_replication_task` returns the new task's ARN. It does not wait.
/// - `describe_replication_task` hits the service every time. No caching, no memo.
/// - `start_replication_task` returns whatever status the service reports right after the start.
/// - Every error comes back as `FerryError::RemoteCall`.
#[async_trait]
pub trait ReplicationService: fmt::Debug + Send + Sync {
    async fn create_replication_task(&self, request: &CreateTaskRequest) -> Result<String, FerryError>;

    async fn describe_replication_task(&self, task_arn: &str) -> Result<TaskSnapshot, FerryError>;

    async fn start_replication_task(&self, task_arn: &str) -> Result<TaskStatus, FerryError>;
}

/// 🎭 The many faces of the migration service. The CLI rides `Aws`,
/// the tests ride `InMemory`, the orchestrator does not care which.
#[derive(Debug)]
pub enum ReplicationBackend {
    Aws(AwsDms),
    InMemory(InMemoryDms),
}

#[async_trait]
impl ReplicationService for ReplicationBackend {
    async fn create_replication_task(&self, request: &CreateTaskRequest) -> Result<String, FerryError> {
        match self {
            ReplicationBackend::Aws(dms) => dms.create_replication_task(request).await,
            ReplicationBackend::InMemory(dms) => dms.create_replication_task(request).await,
        }
    }

    async fn describe_replication_task(&self, task_arn: &str) -> Result<TaskSnapshot, FerryError> {
        match self {
            ReplicationBackend::Aws(dms) => dms.describe_replication_task(task_arn).await,
            ReplicationBackend::InMemory(dms) => dms.describe_replication_task(task_arn).await,
        }
    }

    async fn start_replication_task(&self, task_arn: &str) -> Result<TaskStatus, FerryError> {
        match self {
            ReplicationBackend::Aws(dms) => dms.start_replication_task(task_arn).await,
            ReplicationBackend::InMemory(dms) => dms.start_replication_task(task_arn).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_every_known_status_survives_the_round_trip() {
        let the_usual_suspects = [
            TaskStatus::Creating,
            TaskStatus::Ready,
            TaskStatus::Starting,
            TaskStatus::Running,
            TaskStatus::Stopping,
            TaskStatus::Stopped,
            TaskStatus::Failed,
            TaskStatus::Deleting,
            TaskStatus::Modifying,
            TaskStatus::Moving,
            TaskStatus::FailedMove,
            TaskStatus::Testing,
        ];
        for status in the_usual_suspects {
            assert_eq!(TaskStatus::from(status.as_str()), status);
        }
    }

    #[test]
    fn the_one_where_a_brand_new_status_is_kept_verbatim() {
        let mystery = TaskStatus::from("hibernating");
        assert_eq!(mystery, TaskStatus::Other("hibernating".to_string()));
        assert_eq!(mystery.to_string(), "hibernating");
    }

    #[test]
    fn the_one_where_full_load_speaks_service_dialect() {
        assert_eq!(MigrationType::FullLoad.as_str(), "full-load");
    }
}
