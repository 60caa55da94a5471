//! 🔧 App Configuration: environment in, one struct out.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In PGHOST. Nothing." said every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment. Layers, last one wins:
//! 1. serde defaults
//! 2. the classic variables (`PGHOST`, `REDSHIFT_HOST`, `SOURCE_ENDPOINT_ARN`, ...)
//! 3. `FERRY_*` variables, `__` for nesting (`FERRY_MIGRATION__TASK_NAME`)
//! 4. an optional TOML file
//!
//! The struct is built once in `main` and handed down by reference. Nothing in
//! here is global.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::errors::FerryError;
use crate::waiter::WaitPolicy;

/// 🗺️ Classic env var → config path. These are the names the deployment already exports.
///
/// `TASK_ARN` is not read: deployments export it as a placeholder. Resuming an
/// existing task is opt-in through `--task-arn` or `FERRY_DMS__TASK_ARN`.
const CLASSIC_ENV_VARS: &[(&str, &str)] = &[
    ("PGHOST", "postgres.host"),
    ("PGPORT", "postgres.port"),
    ("PGDATABASE", "postgres.database"),
    ("PGUSER", "postgres.user"),
    ("PGPASSWORD", "postgres.password"),
    ("PGSSLMODE", "postgres.ssl_mode"),
    ("PGSSLROOTCERT", "postgres.ssl_root_cert"),
    ("REDSHIFT_HOST", "redshift.host"),
    ("REDSHIFT_PORT", "redshift.port"),
    ("REDSHIFT_DB", "redshift.database"),
    ("REDSHIFT_USER", "redshift.user"),
    ("REDSHIFT_PASSWORD", "redshift.password"),
    ("AWS_DEFAULT_REGION", "dms.region"),
    ("SOURCE_ENDPOINT_ARN", "dms.source_endpoint_arn"),
    ("TARGET_ENDPOINT_ARN", "dms.target_endpoint_arn"),
    ("REPLICATION_INSTANCE_ARN", "dms.replication_instance_arn"),
];

pub const DEFAULT_POSTGRES_PORT: u16 = 5432;
pub const DEFAULT_REDSHIFT_PORT: u16 = 5439;

/// 📦 The AppConfig: one struct to rule them all.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// 🐘 Source database (and the CSV loader's default target).
    #[serde(default)]
    pub postgres: DatabaseConfig,
    /// 🟥 Target warehouse. Speaks the postgres wire protocol, mostly.
    #[serde(default)]
    pub redshift: DatabaseConfig,
    #[serde(default)]
    pub dms: DmsConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

/// 🐘 Connection settings for one database. Everything optional at parse time;
/// the workflow that needs it calls [`DatabaseConfig::resolve`].
#[derive(Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// 🔐 `disable`, `prefer` or `require` (libpq's `allow`, `verify-ca` and
    /// `verify-full` are accepted too). Unset means `prefer` when a root
    /// certificate is configured and `disable` otherwise.
    pub ssl_mode: Option<SslModeSetting>,
    /// 📜 PEM bundle of trusted root certificates (the RDS global bundle, say).
    pub ssl_root_cert: Option<PathBuf>,
}

/// 🔐 How hard to insist on TLS. Certificates are always verified when TLS is used.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SslModeSetting {
    Disable,
    Allow,
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

/// 🔐 TLS settings with the defaults already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsSettings {
    Disabled,
    /// Try TLS first; fall back to plaintext only if the server does not offer it.
    Preferred { root_cert: PathBuf },
    Required { root_cert: PathBuf },
}

// 🔒 Hand-rolled so the password never shows up in a log line.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("ssl_mode", &self.ssl_mode)
            .field("ssl_root_cert", &self.ssl_root_cert)
            .finish()
    }
}

/// ✅ A database config with every required field present.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub tls: TlsSettings,
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}

impl DatabaseConfig {
    /// 🎯 Check every field is present; name all the missing ones at once.
    pub fn resolve(&self, section: &str, default_port: u16) -> Result<ConnectionSettings, FerryError> {
        let mut missing = Vec::new();
        let mut require = |value: &Option<String>, field: &str| -> String {
            match value {
                Some(v) if !v.trim().is_empty() => v.clone(),
                _ => {
                    missing.push(format!("{section}.{field}"));
                    String::new()
                }
            }
        };

        let host = require(&self.host, "host");
        let database = require(&self.database, "database");
        let user = require(&self.user, "user");
        let password = require(&self.password, "password");
        let tls = self.tls_settings(section, &mut missing);

        if !missing.is_empty() {
            return Err(FerryError::Config(format!(
                "missing database settings: {}",
                missing.join(", ")
            )));
        }

        Ok(ConnectionSettings {
            host,
            port: self.port.unwrap_or(default_port),
            database,
            user,
            password,
            tls,
        })
    }

    fn tls_settings(&self, section: &str, missing: &mut Vec<String>) -> TlsSettings {
        let mode = match (self.ssl_mode, &self.ssl_root_cert) {
            (Some(mode), _) => mode,
            (None, Some(_)) => SslModeSetting::Prefer,
            (None, None) => SslModeSetting::Disable,
        };
        if mode == SslModeSetting::Disable {
            return TlsSettings::Disabled;
        }

        let Some(root_cert) = self.ssl_root_cert.clone() else {
            missing.push(format!("{section}.ssl_root_cert"));
            return TlsSettings::Disabled;
        };
        match mode {
            SslModeSetting::Allow | SslModeSetting::Prefer => TlsSettings::Preferred { root_cert },
            _ => TlsSettings::Required { root_cert },
        }
    }
}

/// ☁️ Migration service coordinates. The endpoints and instance already exist;
/// we only ever refer to them by ARN.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DmsConfig {
    /// 🌎 `None` lets the AWS credential chain pick (profile, IMDS, ...).
    pub region: Option<String>,
    /// 🔁 An already created task. When set, creation is skipped.
    pub task_arn: Option<String>,
    pub source_endpoint_arn: Option<String>,
    pub target_endpoint_arn: Option<String>,
    pub replication_instance_arn: Option<String>,
}

/// 🚚 What task to create and how long to wait for it.
#[derive(Debug, Deserialize, Clone)]
pub struct MigrationConfig {
    /// 🏷️ Must be unique per run. Suffix a version number; the service will not do it for you.
    #[serde(default = "default_task_name")]
    pub task_name: String,
    #[serde(default = "default_schema_name")]
    pub schema_name: String,
    /// `%` is the DMS wildcard.
    #[serde(default = "default_table_pattern")]
    pub table_pattern: String,
    #[serde(default = "default_tags")]
    pub tags: BTreeMap<String, String>,
    #[serde(default = "default_task_settings")]
    pub task_settings: String,
    #[serde(default)]
    pub readiness: WaitConfig,
    #[serde(default)]
    pub completion: WaitConfig,
}

fn default_task_name() -> String {
    "postgres-to-redshift-task".to_string()
}

fn default_schema_name() -> String {
    "public".to_string()
}

fn default_table_pattern() -> String {
    "%".to_string()
}

fn default_tags() -> BTreeMap<String, String> {
    BTreeMap::from([("Project".to_string(), "postgres-to-redshift".to_string())])
}

fn default_task_settings() -> String {
    "{}".to_string()
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            task_name: default_task_name(),
            schema_name: default_schema_name(),
            table_pattern: default_table_pattern(),
            tags: default_tags(),
            task_settings: default_task_settings(),
            readiness: WaitConfig::default(),
            completion: WaitConfig::default(),
        }
    }
}

/// ⏱️ Poll interval and patience, in seconds. Unset fields fall back to the
/// policy's own defaults (10s/300s for readiness, 20s/3600s for completion).
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct WaitConfig {
    pub interval_secs: Option<u64>,
    pub max_wait_secs: Option<u64>,
}

impl WaitConfig {
    fn durations(&self, interval: u64, max_wait: u64) -> (Duration, Duration) {
        (
            Duration::from_secs(self.interval_secs.unwrap_or(interval)),
            Duration::from_secs(self.max_wait_secs.unwrap_or(max_wait)),
        )
    }
}

impl MigrationConfig {
    pub fn readiness_policy(&self) -> WaitPolicy {
        let (interval, max_wait) = self.readiness.durations(10, 300);
        WaitPolicy::readiness(interval, max_wait)
    }

    pub fn completion_policy(&self) -> WaitPolicy {
        let (interval, max_wait) = self.completion.durations(20, 3600);
        WaitPolicy::completion(interval, max_wait)
    }
}

/// 🎯 Which database the CSV loader writes into.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadTarget {
    /// 🐘 the `postgres` section (seeding the migration source)
    #[default]
    Source,
    /// 🟥 the `redshift` section
    Target,
}

/// 📄 CSV loader settings.
#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub target: UploadTarget,
    /// 📦 Rows per INSERT statement (also capped by the 65535 bind-parameter limit).
    #[serde(default = "default_batch_rows")]
    pub batch_rows: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_batch_rows() -> usize {
    1000
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            target: UploadTarget::default(),
            batch_rows: default_batch_rows(),
        }
    }
}

impl AppConfig {
    /// 🎯 Connection settings for whichever database the loader targets.
    pub fn upload_connection(&self) -> Result<ConnectionSettings, FerryError> {
        match self.upload.target {
            UploadTarget::Source => self.postgres.resolve("postgres", DEFAULT_POSTGRES_PORT),
            UploadTarget::Target => self.redshift.resolve("redshift", DEFAULT_REDSHIFT_PORT),
        }
    }
}

/// 🗺️ The classic variables, renamed into config paths.
fn classic_env() -> Env {
    let the_names: Vec<&str> = CLASSIC_ENV_VARS.iter().map(|(name, _)| *name).collect();
    Env::raw().only(&the_names).map(|key| {
        CLASSIC_ENV_VARS
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, path)| (*path).into())
            .unwrap_or_else(|| key.as_str().to_ascii_lowercase().into())
    })
}

/// 🚀 Load the config from the environment and, optionally, a TOML file.
///
/// - `None` → env vars only.
/// - `Some(path)` → env vars + TOML file, merged. TOML wins on conflicts.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new()
        .merge(classic_env())
        .merge(Env::prefixed("FERRY_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables. \
             The file exists in our hearts, but apparently not on disk.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables. \
                 No file was provided, this one's all on the environment."
            .to_string(),
    };

    config.extract().context(context_msg)
}
