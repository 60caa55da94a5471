//! 🚚 ferry-migrate: create a full-load replication task, wait for it to be
//! ready, start it, and wait for it to finish.
//!
//! 🎬 *[a postgres schema boards the ferry. redshift waits on the other bank.]*
//! Runs with no arguments; everything comes from the environment and an
//! optional `ferry.toml`.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ferry::{AwsDms, ReplicationBackend, run_migration, until_interrupted};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "ferry-migrate", version, about = "Run a full-load PostgreSQL → Redshift migration task")]
struct Args {
    /// TOML config layered over the environment (default: ./ferry.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replication task identifier (overrides migration.task_name)
    #[arg(long)]
    task_name: Option<String>,

    /// Start an existing task instead of creating one (overrides dms.task_arn)
    #[arg(long)]
    task_arn: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    ferry_cli::init_tracing();
    let args = Args::parse();

    let mut app_config = ferry_cli::load_app_config(args.config.as_deref())?;
    if let Some(task_name) = args.task_name {
        app_config.migration.task_name = task_name;
    }
    if let Some(task_arn) = args.task_arn {
        app_config.dms.task_arn = Some(task_arn);
    }

    let outcome = until_interrupted(async {
        let dms = ReplicationBackend::Aws(AwsDms::connect(app_config.dms.region.as_deref()).await);
        run_migration(&dms, &app_config).await
    })
    .await;

    match outcome {
        Ok(task_arn) => {
            info!("🎉 Migration process completed successfully. Task: {}", task_arn);
            Ok(())
        }
        Err(err) if err.is_interrupted() => {
            // ✋ the remote task, if any, keeps going without us
            warn!("✋ Migration interrupted by user");
            Ok(())
        }
        Err(err) => {
            ferry_cli::exit_with_failure(anyhow::Error::new(err).context("💀 Migration failed"))
        }
    }
}
