//! ⏳ The waiter: "are we there yet?" as a bounded loop.
//!
//! 🎬 *[a replication task sits in "creating". the waiter asks. it says "creating".]*
//! *[ten seconds pass. the waiter asks again. "creating." the waiter is patient.]*
//! *[ten more. "ready." the waiter nods and goes home.]*
//!
//! One generic primitive, used twice: once for "ready", once for "done".
//!
//! # Order of checks, every iteration 📜
//! 1. describe the task, fresh (no caching, ever)
//! 2. failure set? → `TerminalFailureState` with the service message (or a placeholder)
//! 3. success set? → return the snapshot
//! 4. waited longer than `max_wait`? → `TimeoutExceeded` with the last status
//! 5. sleep `interval`, go to 1
//!
//! Failure is checked before success, so a status listed in both is a failure.
//! A describe error ends the wait on the spot. There is no fetch retry here;
//! a flaky network during a one-hour full load will fail the whole run.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{error, info};

use crate::errors::FerryError;
use crate::replication::{ReplicationService, TaskSnapshot, TaskStatus};

/// 🪦 What we say when the service had nothing to say.
pub const NO_FAILURE_MESSAGE: &str = "No failure message available";

/// 🔧 The knobs for one wait.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitPolicy {
    /// 🏷️ What we are waiting for, for the logs ("ready", "complete").
    pub goal: &'static str,
    pub interval: Duration,
    pub max_wait: Duration,
    pub success: Vec<TaskStatus>,
    pub failure: Vec<TaskStatus>,
    /// 🔄 Statuses worth an extra "still going" log line.
    pub in_progress: Vec<TaskStatus>,
}

impl WaitPolicy {
    /// 🏗️ Provisioning wait: short polls, short patience.
    /// `stopped` counts as failure here because a task that stopped before it
    /// was ever ready cannot be started.
    pub fn readiness(interval: Duration, max_wait: Duration) -> Self {
        Self {
            goal: "ready",
            interval,
            max_wait,
            success: vec![TaskStatus::Ready],
            failure: vec![TaskStatus::Failed, TaskStatus::Stopped],
            in_progress: vec![TaskStatus::Creating],
        }
    }

    /// 🚚 Full-load wait: longer polls, much longer patience.
    /// For a full load, `stopped` is the finish line.
    pub fn completion(interval: Duration, max_wait: Duration) -> Self {
        Self {
            goal: "complete",
            interval,
            max_wait,
            success: vec![TaskStatus::Stopped],
            failure: vec![TaskStatus::Failed],
            in_progress: vec![TaskStatus::Running],
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::readiness(Duration::from_secs(10), Duration::from_secs(300))
    }
}

/// ⏳ Poll `task_arn` until it reaches a success status, a failure status, or the deadline.
pub async fn wait_for_status<S>(
    service: &S,
    task_arn: &str,
    policy: &WaitPolicy,
) -> Result<TaskSnapshot, FerryError>
where
    S: ReplicationService + ?Sized,
{
    info!("⏳ Waiting for replication task to be {}...", policy.goal);
    let started = Instant::now();

    loop {
        let snapshot = service
            .describe_replication_task(task_arn)
            .await
            .inspect_err(|err| error!("💀 Error while checking task status: {}", err))?;

        info!(task_arn, status = %snapshot.status, "📡 Current task status: {}", snapshot.status);

        if policy.failure.contains(&snapshot.status) {
            let err = FerryError::TerminalFailureState {
                task_arn: task_arn.to_string(),
                status: snapshot.status.clone(),
                message: snapshot
                    .last_failure_message
                    .clone()
                    .unwrap_or_else(|| NO_FAILURE_MESSAGE.to_string()),
            };
            error!("💀 Error while waiting for task to be {}: {}", policy.goal, err);
            return Err(err);
        }

        if policy.success.contains(&snapshot.status) {
            info!(
                "✅ Task is {} after {:?}",
                policy.goal,
                started.elapsed()
            );
            return Ok(snapshot);
        }

        if policy.in_progress.contains(&snapshot.status) {
            info!("🔄 Task is {}...", snapshot.status);
        }

        let waited = started.elapsed();
        if waited > policy.max_wait {
            let err = FerryError::TimeoutExceeded {
                task_arn: task_arn.to_string(),
                last_status: snapshot.status,
                waited,
            };
            error!("💀 Error while waiting for task to be {}: {}", policy.goal, err);
            return Err(err);
        }

        sleep(policy.interval).await;
    }
}
