//! 🔍 Discovery: which CSV files are waiting on the dock.
//!
//! Non-recursive, `.csv` only (any case), sorted by file name so two files that
//! map to the same table always resolve the same way: the later name wins.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::errors::LoadError;

/// 🎫 One file, one table. The table name is the file stem, verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvUpload {
    pub path: PathBuf,
    pub table: String,
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// 🔍 List every CSV file directly inside `data_dir`, paired with its table name.
pub async fn discover_csv_files(data_dir: &Path) -> Result<Vec<CsvUpload>, LoadError> {
    let mut entries = tokio::fs::read_dir(data_dir).await?;
    let mut uploads = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_csv(&path) {
            continue;
        }
        // 🔗 metadata follows symlinks, so a linked orders.csv still counts
        let is_file = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata.is_file(),
            Err(err) => {
                warn!("⚠️ Skipping {}: {}", path.display(), err);
                false
            }
        };
        if !is_file {
            continue;
        }
        let Some(table) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if table.is_empty() {
            continue;
        }
        uploads.push(CsvUpload {
            table: table.to_string(),
            path,
        });
    }

    uploads.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));

    info!(
        "🔍 Found {} files to upload: {:?}",
        uploads.len(),
        uploads
            .iter()
            .map(|u| (u.path.display().to_string(), u.table.as_str()))
            .collect::<Vec<_>>()
    );
    Ok(uploads)
}
