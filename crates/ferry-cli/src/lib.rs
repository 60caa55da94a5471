//! 🚀 ferry-cli: the front door for both binaries.
//!
//! 🎬 *[narrator voice]* "Every crossing starts at the dock."
//! The binaries stay thin: set up logging, load config, hand off to the
//! `ferry` library, and if it all goes sideways, explain why before exiting 1.
//! Shared bits live here so `ferry-migrate` and `ferry-upload` say things the same way.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use ferry::{AppConfig, UploadReport};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 🔧 Picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "ferry.toml";

/// 📡 tracing to stderr, `info` unless `RUST_LOG` says otherwise.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// 🔍 Which TOML file to layer on top of the environment, if any.
///
/// An explicit path must exist. Without one, `ferry.toml` is used when present
/// and the environment alone is enough otherwise.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    match explicit {
        Some(path) => {
            let exists = path.try_exists().with_context(|| {
                format!("💀 Could not check whether the config file '{}' exists", path.display())
            })?;
            if !exists {
                anyhow::bail!(
                    "💀 Config file '{}' not found. If it is a relative path, check the working directory, or pass an absolute path.",
                    path.display()
                );
            }
            Ok(Some(path.to_path_buf()))
        }
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            Ok(fallback.is_file().then_some(fallback))
        }
    }
}

/// 🔧 Resolve the config file and load every layer.
pub fn load_app_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let path = resolve_config_path(explicit)?;
    ferry::load_config(path.as_deref())
        .context("💀 Could not load the configuration. Check the TOML file and the environment variables.")
}

/// 🕵️ Does anything in the chain smell like an unreachable service?
pub fn looks_like_connection_trouble(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        let cause_str = cause.to_string();
        [
            "error connecting to server",
            "connection refused",
            "Connection refused",
            "dispatch failure",
            "tcp connect error",
            "dns error",
            "timed out",
        ]
        .iter()
        .any(|needle| cause_str.contains(needle))
    })
}

/// 💀 Log the whole error chain (plus a hint when it looks like networking) and exit 1.
pub fn exit_with_failure(err: anyhow::Error) -> ! {
    error!("💀 error: {}", err);
    for cause in err.chain().skip(1) {
        error!("⚠️  cause: {}", cause);
    }

    if looks_like_connection_trouble(&err) {
        error!(
            "🔧 hint: looks like a service isn't reachable. \
            Check the database host and port, that the AWS region and credentials are right, \
            and that this machine can reach both. Even servers need a nudge sometimes. ☕"
        );
    }

    std::process::exit(1);
}

/// 🍽️ One row per loaded table.
pub fn render_upload_summary(report: &UploadReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["File", "Table", "Columns", "Rows"]);

    for loaded in &report.tables {
        table.add_row(vec![
            Cell::new(&loaded.file_name),
            Cell::new(&loaded.table),
            Cell::new(loaded.columns).set_alignment(CellAlignment::Right),
            Cell::new(loaded.rows).set_alignment(CellAlignment::Right),
        ]);
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use ferry::loader::LoadedTable;

    use super::*;

    #[test]
    fn the_one_where_a_missing_config_file_is_called_out_by_name() {
        let dir = tempfile::tempdir().expect("💀 no temp dir, no test");
        let missing = dir.path().join("nope.toml");

        let err = resolve_config_path(Some(&missing)).expect_err("file does not exist");

        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn the_one_where_an_explicit_config_file_is_taken_at_its_word() {
        let dir = tempfile::tempdir().expect("💀 no temp dir, no test");
        let path = dir.path().join("ferry.toml");
        std::fs::write(&path, "[upload]\nbatch_rows = 10\n").expect("write config");

        let resolved = resolve_config_path(Some(&path)).expect("file exists");

        assert_eq!(resolved, Some(path));
    }

    #[test]
    fn the_one_where_refused_connections_earn_a_hint() {
        let err = anyhow::anyhow!("Connection refused (os error 111)").context("💀 Upload failed");
        assert!(looks_like_connection_trouble(&err));

        let err = anyhow::anyhow!("task arn:task is in failed state").context("💀 Migration failed");
        assert!(!looks_like_connection_trouble(&err));
    }

    #[test]
    fn the_one_where_the_summary_lists_every_table() {
        let report = UploadReport {
            tables: vec![
                LoadedTable {
                    table: "orders".to_string(),
                    file_name: "orders.csv".to_string(),
                    rows: 2,
                    columns: 3,
                },
                LoadedTable {
                    table: "users".to_string(),
                    file_name: "users.csv".to_string(),
                    rows: 1,
                    columns: 2,
                },
            ],
        };

        let rendered = render_upload_summary(&report);

        assert!(rendered.contains("orders.csv"));
        assert!(rendered.contains("users"));
        assert!(rendered.contains("Rows"));
    }
}
