//! 🐘 PostgresTableSink: CSV frames become real tables.
//!
//! Each file is loaded inside its own transaction:
//! `DROP TABLE IF EXISTS` → `CREATE TABLE` → chunked multi-row `INSERT`s → `COMMIT`.
//! A file that fails halfway rolls back completely, and tables from earlier
//! files stay committed.
//!
//! 🔐 TLS goes through rustls with the trusted roots from `ssl_root_cert`.
//! `prefer` falls back to plaintext only when the server does not offer TLS;
//! a certificate that fails verification is always an error.
//!
//! 🧠 Postgres caps a single statement at 65535 bind parameters, so a chunk
//! holds at most `65535 / columns` rows, and never more than `batch_rows`.

use std::io::BufReader;
use std::path::Path;

use async_trait::async_trait;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_postgres::config::SslMode;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Connection, NoTls, Socket};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, error, info};

use crate::app_config::{ConnectionSettings, TlsSettings};
use crate::errors::{FerryError, LoadError};
use crate::loader::TableSink;
use crate::loader::frame::{CellValue, Column, ColumnType, CsvFrame};

/// 🔢 Postgres wire protocol limit on bind parameters per statement.
const MAX_BIND_PARAMETERS: usize = 65_535;

/// 🧷 Double-quote an identifier so names keep their case and may hold anything.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_identifier(table))
}

pub(crate) fn create_table_sql(table: &str, columns: &[Column]) -> String {
    let definitions: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", quote_identifier(&c.name), c.column_type.sql_type()))
        .collect();
    format!(
        "CREATE TABLE {} ({})",
        quote_identifier(table),
        definitions.join(", ")
    )
}

/// 📝 `INSERT INTO "t" ("a", "b") VALUES ($1, $2), ($3, $4), ...`
pub(crate) fn insert_sql(table: &str, columns: &[Column], row_count: usize) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_identifier(&c.name)).collect();
    let width = columns.len();
    let tuples: Vec<String> = (0..row_count)
        .map(|row| {
            let placeholders: Vec<String> = (1..=width)
                .map(|col| format!("${}", row * width + col))
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_identifier(table),
        names.join(", "),
        tuples.join(", ")
    )
}

/// 📏 Rows per INSERT for a table of `width` columns.
pub(crate) fn rows_per_insert(width: usize, batch_rows: usize) -> usize {
    let by_parameters = MAX_BIND_PARAMETERS / width.max(1);
    batch_rows.min(by_parameters).max(1)
}

/// 🎯 The bind value for one cell, typed by its column so NULLs carry the right OID.
fn bind_value(cell: &CellValue, column_type: ColumnType) -> Box<dyn ToSql + Sync + Send> {
    match (column_type, cell) {
        (ColumnType::BigInt, CellValue::BigInt(v)) => Box::new(Some(*v)),
        (ColumnType::BigInt, _) => Box::new(None::<i64>),
        (ColumnType::Double, CellValue::Double(v)) => Box::new(Some(*v)),
        (ColumnType::Double, _) => Box::new(None::<f64>),
        (ColumnType::Boolean, CellValue::Boolean(v)) => Box::new(Some(*v)),
        (ColumnType::Boolean, _) => Box::new(None::<bool>),
        (ColumnType::Text, CellValue::Text(v)) => Box::new(Some(v.clone())),
        (ColumnType::Text, _) => Box::new(None::<String>),
    }
}

/// 🐘 A live connection that replaces whole tables.
pub struct PostgresTableSink {
    client: Client,
    batch_rows: usize,
    connection_task: JoinHandle<()>,
}

impl PostgresTableSink {
    /// 🔌 Connect and park the connection driver on its own task.
    pub async fn connect(settings: &ConnectionSettings, batch_rows: usize) -> Result<Self, FerryError> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&settings.host)
            .port(settings.port)
            .dbname(&settings.database)
            .user(&settings.user)
            .password(&settings.password)
            .application_name("ferry-upload");

        let (client, connection_task) = match &settings.tls {
            TlsSettings::Disabled => {
                config.ssl_mode(SslMode::Disable);
                connect_with(&config, NoTls).await?
            }
            TlsSettings::Preferred { root_cert } => {
                config.ssl_mode(SslMode::Prefer);
                connect_with(&config, rustls_connector(root_cert).await?).await?
            }
            TlsSettings::Required { root_cert } => {
                config.ssl_mode(SslMode::Require);
                connect_with(&config, rustls_connector(root_cert).await?).await?
            }
        };

        info!(
            host = %settings.host,
            port = settings.port,
            database = %settings.database,
            tls = !matches!(settings.tls, TlsSettings::Disabled),
            "🐘 Connected to Postgres"
        );
        Ok(Self {
            client,
            batch_rows,
            connection_task,
        })
    }
}

async fn connect_with<T>(
    config: &tokio_postgres::Config,
    tls: T,
) -> Result<(Client, JoinHandle<()>), FerryError>
where
    T: MakeTlsConnect<Socket>,
    T::Stream: Send + 'static,
    T::TlsConnect: Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let (client, connection) = config
        .connect(tls)
        .await
        .map_err(|e| FerryError::remote("postgres-connect", e))?;
    Ok((client, spawn_connection(connection)))
}

fn spawn_connection<S, T>(connection: Connection<S, T>) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("💀 Postgres connection error: {}", e);
        }
    })
}

/// 📜 A rustls connector trusting exactly the certificates in the PEM bundle at `root_cert`.
pub(crate) async fn rustls_connector(root_cert: &Path) -> Result<MakeRustlsConnect, FerryError> {
    let pem = tokio::fs::read(root_cert).await.map_err(|e| {
        FerryError::Config(format!(
            "cannot read ssl_root_cert {}: {}",
            root_cert.display(),
            e
        ))
    })?;

    let mut root_store = RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut BufReader::new(pem.as_slice())) {
        let cert = cert.map_err(|e| {
            FerryError::Config(format!("bad certificate in {}: {}", root_cert.display(), e))
        })?;
        root_store.add(cert).map_err(|e| {
            FerryError::Config(format!("bad certificate in {}: {}", root_cert.display(), e))
        })?;
    }
    if root_store.is_empty() {
        return Err(FerryError::Config(format!(
            "no certificates found in ssl_root_cert {}",
            root_cert.display()
        )));
    }

    let tls_config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(MakeRustlsConnect::new(tls_config))
}

impl std::fmt::Debug for PostgresTableSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTableSink")
            .field("batch_rows", &self.batch_rows)
            .finish_non_exhaustive()
    }
}

impl Drop for PostgresTableSink {
    fn drop(&mut self) {
        self.connection_task.abort();
    }
}

#[async_trait]
impl TableSink for PostgresTableSink {
    async fn replace_table(&mut self, table: &str, frame: &CsvFrame) -> Result<(), LoadError> {
        let columns = frame.columns();
        let chunk_rows = rows_per_insert(columns.len(), self.batch_rows);

        let transaction = self.client.transaction().await?;
        transaction.batch_execute(&drop_table_sql(table)).await?;
        transaction.batch_execute(&create_table_sql(table, columns)).await?;

        for chunk in frame.rows().chunks(chunk_rows) {
            let values: Vec<Box<dyn ToSql + Sync + Send>> = chunk
                .iter()
                .flat_map(|row| {
                    row.iter()
                        .zip(columns)
                        .map(|(cell, column)| bind_value(cell, column.column_type))
                })
                .collect();
            let params: Vec<&(dyn ToSql + Sync)> = values
                .iter()
                .map(|value| value.as_ref() as &(dyn ToSql + Sync))
                .collect();

            let inserted = transaction
                .execute(&insert_sql(table, columns, chunk.len()), &params)
                .await?;
            debug!(table, inserted, "📦 Inserted chunk");
        }

        transaction.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<Column> {
        vec![
            Column {
                name: "id".to_string(),
                column_type: ColumnType::BigInt,
            },
            Column {
                name: "Name".to_string(),
                column_type: ColumnType::Text,
            },
        ]
    }

    #[test]
    fn the_one_where_identifiers_survive_quotes_and_case() {
        assert_eq!(quote_identifier("orders"), "\"orders\"");
        assert_eq!(quote_identifier("Order \"Items\""), "\"Order \"\"Items\"\"\"");
    }

    #[test]
    fn the_one_where_the_table_is_rebuilt_from_the_header() {
        assert_eq!(drop_table_sql("users"), "DROP TABLE IF EXISTS \"users\"");
        assert_eq!(
            create_table_sql("users", &columns()),
            "CREATE TABLE \"users\" (\"id\" BIGINT, \"Name\" TEXT)"
        );
    }

    #[test]
    fn the_one_where_placeholders_keep_counting_across_rows() {
        assert_eq!(
            insert_sql("users", &columns(), 3),
            "INSERT INTO \"users\" (\"id\", \"Name\") VALUES ($1, $2), ($3, $4), ($5, $6)"
        );
    }

    #[test]
    fn the_one_where_wide_tables_get_smaller_chunks() {
        assert_eq!(rows_per_insert(2, 1000), 1000);
        assert_eq!(rows_per_insert(100, 1000), 655);
        assert_eq!(rows_per_insert(70_000, 1000), 1);
        assert_eq!(rows_per_insert(3, 0), 1);
    }

    #[test]
    fn the_one_where_a_null_still_knows_its_column_type() {
        let bound = bind_value(&CellValue::Null, ColumnType::BigInt);
        assert_eq!(format!("{bound:?}"), "None");
        let bound = bind_value(&CellValue::Text("x".to_string()), ColumnType::Text);
        assert_eq!(format!("{bound:?}"), "Some(\"x\")");
    }

    #[tokio::test]
    async fn the_one_where_a_missing_certificate_bundle_is_a_config_problem() {
        let dir = tempfile::tempdir().expect("💀 no temp dir, no test");
        let Err(err) = rustls_connector(&dir.path().join("global-bundle.pem")).await else {
            panic!("💀 a file that does not exist cannot be trusted");
        };
        assert!(matches!(&err, FerryError::Config(_)));
        assert!(err.to_string().contains("global-bundle.pem"));
    }

    #[tokio::test]
    async fn the_one_where_a_bundle_without_certificates_trusts_nobody() {
        let dir = tempfile::tempdir().expect("💀 no temp dir, no test");
        let path = dir.path().join("empty.pem");
        std::fs::write(&path, "not a certificate\n").expect("write pem");

        let Err(err) = rustls_connector(&path).await else {
            panic!("💀 nothing to trust, yet a connector was built");
        };
        assert!(err.to_string().contains("no certificates found"));
    }

    fn local_postgres() -> ConnectionSettings {
        let var = |name: &str, fallback: &str| std::env::var(name).unwrap_or_else(|_| fallback.to_string());
        ConnectionSettings {
            host: var("FERRY_TEST_PG_HOST", "localhost"),
            port: var("FERRY_TEST_PG_PORT", "5432").parse().unwrap_or(5432),
            database: var("FERRY_TEST_PG_DATABASE", "postgres"),
            user: var("FERRY_TEST_PG_USER", "postgres"),
            password: var("FERRY_TEST_PG_PASSWORD", "postgres"),
            tls: TlsSettings::Disabled,
        }
    }

    async fn row_count(sink: &PostgresTableSink, table: &str) -> i64 {
        sink.client
            .query_one(&format!("SELECT COUNT(*) FROM {}", quote_identifier(table)), &[])
            .await
            .expect("💀 count query")
            .get(0)
    }

    #[tokio::test]
    #[ignore = "needs a running Postgres, see FERRY_TEST_PG_* for connection settings"]
    async fn the_one_where_a_real_postgres_replaces_and_rolls_back() {
        let table = format!("ferry_replace_{}", std::process::id());
        let mut sink = PostgresTableSink::connect(&local_postgres(), 2)
            .await
            .expect("💀 is Postgres running?");
        let users = CsvFrame::from_bytes(b"id,name\n1,Ana\n2,Bo\n3,Cy\n").expect("valid csv");

        sink.replace_table(&table, &users).await.expect("first load");
        sink.replace_table(&table, &users).await.expect("second load");
        assert_eq!(row_count(&sink, &table).await, 3);

        // 🧨 Postgres refuses NUL bytes in text, so the INSERT fails after DROP and CREATE
        let poisoned = CsvFrame::from_bytes(b"id,name\n9,bad\x00byte\n").expect("valid csv");
        let err = sink
            .replace_table(&table, &poisoned)
            .await
            .expect_err("NUL bytes are not text");
        assert!(matches!(err, LoadError::Database(_)));
        assert_eq!(row_count(&sink, &table).await, 3);

        sink.client
            .batch_execute(&drop_table_sql(&table))
            .await
            .expect("💀 cleanup");
    }
}
