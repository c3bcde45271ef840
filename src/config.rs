/*!
 * Configuration types for reconciliation runs
 *
 * A `ReconConfig` is built once at process start (TOML file, then environment
 * overrides) and handed by reference to every component that needs it.
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ReconError, Result};

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "reconcile.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconConfig {
    #[serde(default)]
    pub metadata: MetadataConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub s3: S3Config,

    #[serde(default)]
    pub db: DbConfig,

    #[serde(default)]
    pub checksum: ChecksumPolicy,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which document store implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    /// MongoDB (requires the `mongo` feature)
    #[default]
    Mongo,
    /// JSON export loaded into memory
    Dump,
}

/// Document store connection and collection layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default)]
    pub backend: MetadataBackend,

    /// Host, including scheme (e.g. "mongodb://localhost")
    #[serde(default = "default_mongo_host")]
    pub host: String,

    #[serde(default = "default_mongo_port")]
    pub port: u16,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub auth_mechanism: Option<String>,

    #[serde(default = "default_mongo_database")]
    pub database: String,

    #[serde(default)]
    pub ca_cert: Option<PathBuf>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// JSON export used by the `dump` backend
    #[serde(default)]
    pub dump_path: Option<PathBuf>,

    #[serde(default = "default_users_collection")]
    pub users_collection: String,

    #[serde(default = "default_submissions_collection")]
    pub submissions_collection: String,

    /// Collections searched for an accession's files when no schema list is known
    #[serde(default = "default_object_collections")]
    pub object_collections: Vec<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: MetadataBackend::default(),
            host: default_mongo_host(),
            port: default_mongo_port(),
            user: String::new(),
            password: String::new(),
            auth_mechanism: None,
            database: default_mongo_database(),
            ca_cert: None,
            connect_timeout_secs: default_connect_timeout(),
            dump_path: None,
            users_collection: default_users_collection(),
            submissions_collection: default_submissions_collection(),
            object_collections: default_object_collections(),
        }
    }
}

impl MetadataConfig {
    /// Connection URI in "host:port" form
    pub fn uri(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Which object probe implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// S3-compatible object store (requires the `s3-native` feature)
    #[default]
    S3,
    /// Directory on the local filesystem
    Local,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the `local` backend
    #[serde(default)]
    pub root: Option<PathBuf>,
}

/// S3 endpoint and credentials.
///
/// The endpoint is verified against the system trust store; custom CA
/// bundles are rejected rather than silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Config {
    /// Endpoint URL without port (e.g. "https://s3.example.org")
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_s3_port")]
    pub port: u16,

    #[serde(default)]
    pub access_key: String,

    #[serde(default)]
    pub secret_key: String,

    #[serde(default)]
    pub bucket: String,

    #[serde(default = "default_s3_region")]
    pub region: String,

    /// Per-operation timeout in seconds
    #[serde(default = "default_s3_timeout")]
    pub timeout_secs: u64,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            port: default_s3_port(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            region: default_s3_region(),
            timeout_secs: default_s3_timeout(),
        }
    }
}

impl S3Config {
    /// Endpoint in "url:port" form
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.url, self.port)
    }
}

/// Ingestion database connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default = "default_db_host")]
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_db_database")]
    pub database: String,

    #[serde(default = "default_db_sslmode")]
    pub sslmode: String,

    #[serde(default)]
    pub ca_cert: Option<PathBuf>,

    #[serde(default)]
    pub client_cert: Option<PathBuf>,

    #[serde(default)]
    pub client_key: Option<PathBuf>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            user: String::new(),
            password: String::new(),
            database: default_db_database(),
            sslmode: default_db_sslmode(),
            ca_cert: None,
            client_cert: None,
            client_key: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl DbConfig {
    /// Check that TLS material required by the ssl mode is present
    pub fn validate(&self) -> Result<()> {
        let client_material = self.client_cert.is_some() && self.client_key.is_some();
        if self.sslmode == "verify-full" && !client_material {
            return Err(ReconError::Config(
                "when db.sslmode is set to verify-full both db.client_cert and db.client_key \
                 are needed"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Retry and reconnect policy for checksum lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumPolicy {
    /// Total attempts per lookup before the file is reported absent
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// How long to keep trying to re-establish a lost connection
    #[serde(default = "default_reconnect_timeout")]
    pub reconnect_timeout_secs: u64,

    /// Pause between reconnect attempts
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,
}

impl Default for ChecksumPolicy {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            reconnect_timeout_secs: default_reconnect_timeout(),
            reconnect_interval_secs: default_reconnect_interval(),
        }
    }
}

impl ChecksumPolicy {
    pub fn reconnect_timeout(&self) -> Duration {
        Duration::from_secs(self.reconnect_timeout_secs)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }

    /// Parse a level name; unknown names yield `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "error" | "fatal" | "panic" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

// Default value functions for serde
fn default_mongo_host() -> String {
    "mongodb://localhost".to_string()
}

fn default_mongo_port() -> u16 {
    27017
}

fn default_mongo_database() -> String {
    "default".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_users_collection() -> String {
    "user".to_string()
}

fn default_submissions_collection() -> String {
    "folder".to_string()
}

fn default_object_collections() -> Vec<String> {
    vec!["analysis".to_string(), "run".to_string()]
}

fn default_s3_port() -> u16 {
    443
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

fn default_s3_timeout() -> u64 {
    30
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_database() -> String {
    "lega".to_string()
}

fn default_db_sslmode() -> String {
    "prefer".to_string()
}

fn default_retry_attempts() -> u32 {
    8
}

fn default_reconnect_timeout() -> u64 {
    5 * 60
}

fn default_reconnect_interval() -> u64 {
    5
}

impl ReconConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ReconError::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        let config: ReconConfig = toml::from_str(&contents).map_err(|e| {
            ReconError::Config(format!("invalid config file {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    /// Resolve the configuration for a run.
    ///
    /// An explicit path must exist. Without one, `reconcile.toml` in the
    /// working directory is used when present, otherwise the defaults.
    /// Environment overrides are applied last, then the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)?
                } else {
                    tracing::info!("No config file found, using environment only");
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from the environment.
    ///
    /// Keys follow the dotted config names with `.` replaced by `_`
    /// (`DB_HOST`, `S3_ACCESSKEY`, `MONGO_AUTHMECHANISM`, ...).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, target: &mut String| {
            if let Some(value) = lookup(key) {
                *target = value;
            }
        };
        let path = |key: &str, target: &mut Option<PathBuf>| {
            if let Some(value) = lookup(key) {
                *target = Some(PathBuf::from(value));
            }
        };
        let port = |key: &str, target: &mut u16| -> Result<()> {
            if let Some(value) = lookup(key) {
                *target = value.trim().parse().map_err(|_| {
                    ReconError::Config(format!("{} must be a port number, got '{}'", key, value))
                })?;
            }
            Ok(())
        };

        string("MONGO_HOST", &mut self.metadata.host);
        port("MONGO_PORT", &mut self.metadata.port)?;
        string("MONGO_USER", &mut self.metadata.user);
        string("MONGO_PASSWORD", &mut self.metadata.password);
        string("MONGO_DATABASE", &mut self.metadata.database);
        path("MONGO_CACERT", &mut self.metadata.ca_cert);
        if let Some(mechanism) = lookup("MONGO_AUTHMECHANISM") {
            self.metadata.auth_mechanism = Some(mechanism);
        }

        string("S3_URL", &mut self.s3.url);
        port("S3_PORT", &mut self.s3.port)?;
        string("S3_ACCESSKEY", &mut self.s3.access_key);
        string("S3_SECRETKEY", &mut self.s3.secret_key);
        string("S3_BUCKET", &mut self.s3.bucket);
        string("S3_REGION", &mut self.s3.region);
        if lookup("S3_CACERT").is_some() {
            return Err(ReconError::Config(
                "S3_CACERT is not supported, add the CA to the system trust store".to_string(),
            ));
        }

        string("DB_HOST", &mut self.db.host);
        port("DB_PORT", &mut self.db.port)?;
        string("DB_USER", &mut self.db.user);
        string("DB_PASSWORD", &mut self.db.password);
        string("DB_DATABASE", &mut self.db.database);
        string("DB_SSLMODE", &mut self.db.sslmode);
        path("DB_CACERT", &mut self.db.ca_cert);
        path("DB_CLIENTCERT", &mut self.db.client_cert);
        path("DB_CLIENTKEY", &mut self.db.client_key);

        if let Some(level) = lookup("LOGLEVEL") {
            self.logging.log_level = LogLevel::parse(&level).unwrap_or_else(|| {
                tracing::warn!("Log level '{}' not supported, setting to 'trace'", level);
                LogLevel::Trace
            });
        }

        Ok(())
    }

    /// Cross-field checks
    pub fn validate(&self) -> Result<()> {
        if self.checksum.retry_attempts == 0 {
            return Err(ReconError::Config(
                "checksum.retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.metadata.backend == MetadataBackend::Dump && self.metadata.dump_path.is_none() {
            return Err(ReconError::Config(
                "metadata.backend = \"dump\" requires metadata.dump_path".to_string(),
            ));
        }
        if self.storage.backend == StorageBackend::Local && self.storage.root.is_none() {
            return Err(ReconError::Config(
                "storage.backend = \"local\" requires storage.root".to_string(),
            ));
        }
        Ok(())
    }
}
