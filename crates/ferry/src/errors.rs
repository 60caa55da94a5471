//! 💀 Errors: the closed menu of ways a ferry crossing can go wrong.
//!
//! 🎬 *[a task sits in "creating" for 299 seconds. the clock ticks to 301.]*
//! *["well," said the waiter, "that's a TimeoutExceeded."]*
//!
//! Callers branch on the variant, never on the message text. The messages are
//! for the humans reading logs at 3am; the variants are for the code.
//!
//! 🦆 The duck is not an error variant. We checked.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::replication::TaskStatus;

/// 📦 Boxed error for remote-call sources. The AWS SDK has one error type per
/// operation, and we do not want one variant per operation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 🏷️ Everything the library can fail with.
#[derive(Debug, Error)]
pub enum FerryError {
    /// 📡 The service call itself blew up (network, auth, throttling, service fault).
    /// Propagated straight away, never retried.
    #[error("remote call `{operation}` failed: {source}")]
    RemoteCall {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// 🪦 The task landed in a state it cannot come back from.
    #[error("task {task_arn} is in {status} state. Failure message: {message}")]
    TerminalFailureState {
        task_arn: String,
        status: TaskStatus,
        message: String,
    },

    /// ⏱️ We waited. And waited. Like a dog at the window.
    #[error("timeout passed after {waited:?} waiting on task {task_arn}. Current status: {last_status}")]
    TimeoutExceeded {
        task_arn: String,
        last_status: TaskStatus,
        waited: Duration,
    },

    /// 📄 One CSV file refused to become a table. Files before it are already committed.
    #[error("loading {} into table `{table}` failed after {committed} file(s) were committed: {source}", path.display())]
    PerFileLoad {
        path: PathBuf,
        table: String,
        committed: usize,
        #[source]
        source: LoadError,
    },

    /// ✋ Someone hit Ctrl+C. Not an error, just a change of plans.
    #[error("interrupted by user")]
    Interrupted,

    /// 🔧 A workflow needed a setting the configuration did not provide.
    #[error("configuration problem: {0}")]
    Config(String),
}

impl FerryError {
    /// 🚀 Shorthand for wrapping any SDK/driver error as a remote-call failure.
    pub fn remote<E>(operation: &'static str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        FerryError::RemoteCall {
            operation,
            source: source.into(),
        }
    }

    /// ✋ True when the run ended because the user asked it to.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, FerryError::Interrupted)
    }
}

/// 📄 Why a single CSV file could not be loaded.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row} has {found} fields but the header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("csv file has no header row")]
    EmptyHeader,

    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),
}
