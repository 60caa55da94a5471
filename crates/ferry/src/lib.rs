//! ⛴️ Ferry: moves a PostgreSQL database over to Redshift and carries local
//! CSV files into database tables.
//!
//! 🎬 COLD OPEN: two databases on opposite banks of a river. One of them has
//! all the data. The other one has a very large invoice and no data. Somebody
//! has to run the boat.
//!
//! Two workflows, one library:
//! - 🚚 **Migration**: create a full-load replication task on the managed
//!   migration service, wait until it is ready, start it, and wait until it is done.
//!   See [`orchestrator`].
//! - 📄 **Upload**: every `*.csv` in a directory becomes a table of the same
//!   name, replaced wholesale. See [`loader`].
//!
//! 🧠 Knowledge graph:
//! - `app_config` → figment layers (defaults, classic env vars, `FERRY_*`, TOML)
//! - `replication` → the service seam (AWS SDK client + scripted in-memory one)
//! - `waiter` → the "are we there yet?" loop both migration phases share
//! - `orchestrator` → create, start, run_migration
//! - `loader` → discovery, CSV typing, table sinks
//! - `errors` → the closed set of ways it can all go wrong
//!
//! 🦆 The duck rides for free.

use std::future::Future;
use std::io;

use tracing::warn;

pub mod app_config;
pub mod errors;
pub mod loader;
pub mod orchestrator;
pub mod replication;
pub mod waiter;

pub use app_config::{AppConfig, load_config};
pub use errors::{FerryError, LoadError};
pub use loader::{
    PostgresTableSink, TableSink, TableSinkBackend, UploadReport, load_csv_files, run_upload,
};
pub use orchestrator::{MigrationPlan, create_migration_task, run_migration, start_migration_task};
pub use replication::{AwsDms, InMemoryDms, ReplicationBackend, ReplicationService, TaskStatus};
pub use waiter::{WaitPolicy, wait_for_status};

/// ✋ Run `work` until it finishes or the user hits Ctrl+C, whichever comes first.
///
/// Ctrl+C becomes [`FerryError::Interrupted`]. Whatever the work was in the
/// middle of is dropped on the floor: a remote task that was already created
/// keeps running on the service side.
pub async fn until_interrupted<F, T>(work: F) -> Result<T, FerryError>
where
    F: Future<Output = Result<T, FerryError>>,
{
    race_with_interrupt(work, tokio::signal::ctrl_c()).await
}

async fn race_with_interrupt<F, T, I>(work: F, interrupt: I) -> Result<T, FerryError>
where
    F: Future<Output = Result<T, FerryError>>,
    I: Future<Output = io::Result<()>>,
{
    tokio::pin!(work);
    tokio::select! {
        result = &mut work => result,
        signal = interrupt => match signal {
            Ok(()) => {
                warn!("✋ Process interrupted by user");
                Err(FerryError::Interrupted)
            }
            Err(err) => {
                // 🔇 no signal handler, no interruption: just finish the work
                warn!("⚠️ Could not listen for Ctrl+C: {}", err);
                work.await
            }
        },
    }
}
