//! # Previously, on Ferry...
//!
//! 🎬 The real migration service bills by the hour and takes five minutes to
//! say "creating". Tests do not have five minutes. Tests barely have five
//! milliseconds.
//!
//! `InMemoryDms` is a scripted stand-in for the migration service. You hand it
//! the statuses a task should walk through, and every describe call reads the
//! next line of the script. The last line sticks, like a song in your head.
//! It also writes down every create and start it receives, so tests can ask
//! "what did you actually send?" afterwards.
//!
//! ⚠️ Not for production. No network calls, no replication, no data moved.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::errors::FerryError;
use crate::replication::{CreateTaskRequest, ReplicationService, TaskSnapshot, TaskStatus};

/// 📜 One line of the describe script.
#[derive(Debug, Clone)]
enum ScriptLine {
    Status(TaskStatus, Option<String>),
    RemoteError(String),
}

#[derive(Debug)]
struct Stage {
    task_arn: String,
    describe_script: VecDeque<ScriptLine>,
    start_status: TaskStatus,
    create_error: Option<String>,
    start_error: Option<String>,
    created: Vec<CreateTaskRequest>,
    started: Vec<String>,
    describe_calls: usize,
}

impl Default for Stage {
    fn default() -> Self {
        Self {
            task_arn: String::new(),
            describe_script: VecDeque::new(),
            // 🚦 what the real service answers right after a start
            start_status: TaskStatus::Starting,
            create_error: None,
            start_error: None,
            created: Vec::new(),
            started: Vec::new(),
            describe_calls: 0,
        }
    }
}

/// 🎭 The understudy for AWS DMS. Knows its lines, never improvises.
///
/// Clone-able so a test can keep a handle after giving one to the orchestrator;
/// every clone shares the same stage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDms {
    stage: Arc<Mutex<Stage>>,
}

impl InMemoryDms {
    /// 🚀 A fresh service that will hand out `task_arn` on create.
    pub fn new(task_arn: impl Into<String>) -> Self {
        let stage = Stage {
            task_arn: task_arn.into(),
            ..Stage::default()
        };
        Self {
            stage: Arc::new(Mutex::new(stage)),
        }
    }

    fn stage(&self) -> MutexGuard<'_, Stage> {
        // 🔒 a poisoned lock only happens if a test already panicked; keep the data anyway
        self.stage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 📜 Append plain statuses to the describe script.
    pub fn with_statuses<I>(self, statuses: I) -> Self
    where
        I: IntoIterator<Item = TaskStatus>,
    {
        self.stage()
            .describe_script
            .extend(statuses.into_iter().map(|s| ScriptLine::Status(s, None)));
        self
    }

    /// 🪦 Append a status that carries a service failure message.
    pub fn with_failure(self, status: TaskStatus, message: impl Into<String>) -> Self {
        self.stage()
            .describe_script
            .push_back(ScriptLine::Status(status, Some(message.into())));
        self
    }

    /// 📡 Append a describe call that fails like a flaky network would.
    pub fn with_describe_error(self, message: impl Into<String>) -> Self {
        self.stage()
            .describe_script
            .push_back(ScriptLine::RemoteError(message.into()));
        self
    }

    /// 🚦 The status a start call answers with. `starting` unless told otherwise.
    pub fn with_start_status(self, status: TaskStatus) -> Self {
        self.stage().start_status = status;
        self
    }

    /// 💀 Make the create call fail.
    pub fn failing_create(self, message: impl Into<String>) -> Self {
        self.stage().create_error = Some(message.into());
        self
    }

    /// 💀 Make the start call fail.
    pub fn failing_start(self, message: impl Into<String>) -> Self {
        self.stage().start_error = Some(message.into());
        self
    }

    /// 📋 Every create request received, in order.
    pub fn created_requests(&self) -> Vec<CreateTaskRequest> {
        self.stage().created.clone()
    }

    /// 📋 Every ARN a start was issued for, in order.
    pub fn started_tasks(&self) -> Vec<String> {
        self.stage().started.clone()
    }

    /// 🔢 How many times somebody asked "are we there yet?"
    pub fn describe_calls(&self) -> usize {
        self.stage().describe_calls
    }
}

#[async_trait]
impl ReplicationService for InMemoryDms {
    async fn create_replication_task(&self, request: &CreateTaskRequest) -> Result<String, FerryError> {
        let mut stage = self.stage();
        if let Some(message) = stage.create_error.clone() {
            return Err(FerryError::remote("create-replication-task", message));
        }
        stage.created.push(request.clone());
        Ok(stage.task_arn.clone())
    }

    async fn describe_replication_task(&self, task_arn: &str) -> Result<TaskSnapshot, FerryError> {
        let mut stage = self.stage();
        stage.describe_calls += 1;

        // 🔄 pop until the last line, then the last line repeats forever
        let line = if stage.describe_script.len() > 1 {
            stage.describe_script.pop_front()
        } else {
            stage.describe_script.front().cloned()
        };

        match line {
            Some(ScriptLine::Status(status, last_failure_message)) => Ok(TaskSnapshot {
                arn: task_arn.to_string(),
                status,
                last_failure_message,
            }),
            Some(ScriptLine::RemoteError(message)) => {
                Err(FerryError::remote("describe-replication-tasks", message))
            }
            None => Err(FerryError::remote(
                "describe-replication-tasks",
                format!("no replication task matches {task_arn}"),
            )),
        }
    }

    async fn start_replication_task(&self, task_arn: &str) -> Result<TaskStatus, FerryError> {
        let mut stage = self.stage();
        if let Some(message) = stage.start_error.clone() {
            return Err(FerryError::remote("start-replication-task", message));
        }
        stage.started.push(task_arn.to_string());
        Ok(stage.start_status.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_the_last_line_of_the_script_sticks() {
        let dms = InMemoryDms::new("arn:task").with_statuses([TaskStatus::Creating, TaskStatus::Ready]);

        let first = dms.describe_replication_task("arn:task").await.expect("scripted");
        let second = dms.describe_replication_task("arn:task").await.expect("scripted");
        let third = dms.describe_replication_task("arn:task").await.expect("scripted");

        assert_eq!(first.status, TaskStatus::Creating);
        assert_eq!(second.status, TaskStatus::Ready);
        assert_eq!(third.status, TaskStatus::Ready);
        assert_eq!(dms.describe_calls(), 3);
    }

    #[tokio::test]
    async fn the_one_where_an_unscripted_task_does_not_exist() {
        let dms = InMemoryDms::new("arn:task");
        let err = dms.describe_replication_task("arn:task").await.expect_err("empty script");
        assert!(matches!(err, FerryError::RemoteCall { .. }));
    }

    #[tokio::test]
    async fn the_one_where_clones_share_the_same_notebook() {
        let dms = InMemoryDms::new("arn:task");
        let handle = dms.clone();
        dms.start_replication_task("arn:task").await.expect("start");
        assert_eq!(handle.started_tasks(), vec!["arn:task".to_string()]);
    }

    #[tokio::test]
    async fn the_one_where_a_start_answers_with_the_scripted_status() {
        let fresh = InMemoryDms::new("arn:task");
        let status = fresh.start_replication_task("arn:task").await.expect("start");
        assert_eq!(status, TaskStatus::Starting);

        let already_going = InMemoryDms::new("arn:task").with_start_status(TaskStatus::Running);
        let status = already_going.start_replication_task("arn:task").await.expect("start");
        assert_eq!(status, TaskStatus::Running);
    }
}
