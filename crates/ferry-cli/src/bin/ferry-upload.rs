//! 📄 ferry-upload: every CSV in the data directory becomes a table.
//!
//! Each file replaces the table named after it. Runs with no arguments;
//! connection settings come from the environment and an optional `ferry.toml`.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use ferry::{PostgresTableSink, run_upload, until_interrupted};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "ferry-upload", version, about = "Load every CSV file in a directory into database tables")]
struct Args {
    /// TOML config layered over the environment (default: ./ferry.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory to scan for *.csv files (overrides upload.data_dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    ferry_cli::init_tracing();
    let args = Args::parse();

    let mut app_config = ferry_cli::load_app_config(args.config.as_deref())?;
    if let Some(data_dir) = args.data_dir {
        app_config.upload.data_dir = data_dir;
    }

    let outcome = until_interrupted(async {
        let settings = app_config.upload_connection()?;
        let mut sink = PostgresTableSink::connect(&settings, app_config.upload.batch_rows).await?;
        run_upload(&mut sink, &app_config.upload).await
    })
    .await;

    match outcome {
        Ok(report) => {
            if !report.tables.is_empty() {
                println!("{}", ferry_cli::render_upload_summary(&report));
            }
            info!(
                "🎉 Upload finished: {} table(s), {} row(s)",
                report.tables.len(),
                report.total_rows()
            );
            Ok(())
        }
        Err(err) if err.is_interrupted() => {
            warn!("✋ Upload interrupted by user");
            Ok(())
        }
        Err(err) => ferry_cli::exit_with_failure(anyhow::Error::new(err).context("💀 Upload failed")),
    }
}
