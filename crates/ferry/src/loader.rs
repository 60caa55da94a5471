//! 📄 Loader: a directory of CSV files becomes a set of database tables.
//!
//! 🎬 *[a folder named `data/`. inside, `orders.csv` and `users.csv` wait for a ride.]*
//!
//! One file → one table, named after the file stem. Every load is a full
//! replace: the table is dropped, recreated from the CSV header and refilled.
//! Running the upload twice leaves one copy of each file, never two.
//!
//! 🧠 Knowledge graph:
//! - Pattern: trait `TableSink` → concrete impls (PostgresTableSink, InMemoryTableSink) → TableSinkBackend enum
//! - `discovery` decides which files, `frame` parses and types them, the sink writes them
//! - The first file that fails stops the run. Everything before it stays committed.

use std::path::Path;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::app_config::UploadConfig;
use crate::errors::{FerryError, LoadError};

pub(crate) mod discovery;
pub(crate) mod frame;
pub(crate) mod in_mem;
pub(crate) mod postgres;

pub use discovery::{CsvUpload, discover_csv_files};
pub use frame::{CellValue, Column, ColumnType, CsvFrame};
pub use in_mem::InMemoryTableSink;
pub use postgres::PostgresTableSink;

/// 🕳️ Somewhere a whole table can be swapped for a new one.
///
/// # Contract 📜
/// - `replace_table` drops `table` if it exists, creates it from the frame's
///   columns and inserts every row.
/// - It either fully happens or leaves the previous table untouched.
#[async_trait]
pub trait TableSink: std::fmt::Debug + Send {
    async fn replace_table(&mut self, table: &str, frame: &CsvFrame) -> Result<(), LoadError>;
}

/// 🎭 The sinks the upload can write to, behind one type.
#[derive(Debug)]
pub enum TableSinkBackend {
    Postgres(PostgresTableSink),
    InMemory(InMemoryTableSink),
}

#[async_trait]
impl TableSink for TableSinkBackend {
    async fn replace_table(&mut self, table: &str, frame: &CsvFrame) -> Result<(), LoadError> {
        match self {
            TableSinkBackend::Postgres(sink) => sink.replace_table(table, frame).await,
            TableSinkBackend::InMemory(sink) => sink.replace_table(table, frame).await,
        }
    }
}

/// 📊 One table that made it across.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedTable {
    pub table: String,
    pub file_name: String,
    pub rows: usize,
    pub columns: usize,
}

/// 📊 What an upload run did, in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub tables: Vec<LoadedTable>,
}

impl UploadReport {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// 🚚 Load every upload in order. Stops at the first file that fails.
pub async fn load_csv_files<S>(uploads: &[CsvUpload], sink: &mut S) -> Result<UploadReport, FerryError>
where
    S: TableSink + ?Sized,
{
    let mut report = UploadReport::default();

    for upload in uploads {
        let file_name = upload
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(file = %file_name, table = %upload.table, "📄 Processing file");

        let loaded = async {
            let frame = CsvFrame::from_path(&upload.path).await?;
            sink.replace_table(&upload.table, &frame).await?;
            Ok::<_, LoadError>(frame)
        }
        .await;

        match loaded {
            Ok(frame) => {
                info!(
                    rows = frame.row_count(),
                    "✅ Successfully uploaded {} to table {}", file_name, upload.table
                );
                report.tables.push(LoadedTable {
                    table: upload.table.clone(),
                    file_name,
                    rows: frame.row_count(),
                    columns: frame.columns().len(),
                });
            }
            Err(source) => {
                let err = FerryError::PerFileLoad {
                    path: upload.path.clone(),
                    table: upload.table.clone(),
                    committed: report.tables.len(),
                    source,
                };
                error!("💀 Error processing file {}: {}", file_name, err);
                return Err(err);
            }
        }
    }

    Ok(report)
}

/// 🚀 Discover and load everything in `upload.data_dir`.
/// An empty directory is a quiet success with a warning.
pub async fn run_upload<S>(sink: &mut S, upload: &UploadConfig) -> Result<UploadReport, FerryError>
where
    S: TableSink + ?Sized,
{
    let uploads = discover_in(&upload.data_dir).await?;
    if uploads.is_empty() {
        warn!(
            "🏜️ No CSV files found in {}, nothing to upload",
            upload.data_dir.display()
        );
        return Ok(UploadReport::default());
    }
    load_csv_files(&uploads, sink).await
}

async fn discover_in(data_dir: &Path) -> Result<Vec<CsvUpload>, FerryError> {
    discover_csv_files(data_dir).await.map_err(|source| {
        FerryError::Config(format!(
            "cannot read data directory {}: {}",
            data_dir.display(),
            source
        ))
    })
}
