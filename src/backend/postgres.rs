//! Ingestion database checksum lookups over sqlx Postgres

use super::error::{BackendError, BackendResult};
use super::ChecksumBackend;
use crate::config::DbConfig;
use crate::core::model::ChecksumRecord;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info};

const BACKEND: &str = "postgres";

const CHECKSUM_QUERY: &str = "SELECT archive_file_checksum, archive_file_checksum_type \
     FROM local_ega.main WHERE submission_file_path = $1";

pub struct PgChecksumBackend {
    options: PgConnectOptions,
    acquire_timeout: Duration,
    pool: Option<PgPool>,
    host: String,
}

impl PgChecksumBackend {
    /// Connect using the `[db]` section. Fails if the first connection cannot
    /// be established.
    pub async fn connect(config: &DbConfig) -> BackendResult<Self> {
        let options = connect_options(config)?;
        let mut backend = Self {
            options,
            acquire_timeout: Duration::from_secs(config.connect_timeout_secs),
            pool: None,
            host: config.host.clone(),
        };
        backend.pool = Some(backend.create_pool().await?);
        Ok(backend)
    }

    async fn create_pool(&self) -> BackendResult<PgPool> {
        debug!(host = %self.host, "Creating database connection pool");

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(self.acquire_timeout)
            .connect_with(self.options.clone())
            .await
            .map_err(|e| {
                BackendError::connection(
                    BACKEND,
                    format!("Failed to connect to database at {}: {}", self.host, e),
                )
            })?;

        info!(host = %self.host, "Database connection pool established");
        Ok(pool)
    }

    fn pool(&self) -> BackendResult<&PgPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| BackendError::connection(BACKEND, "connection is closed"))
    }
}

fn connect_options(config: &DbConfig) -> BackendResult<PgConnectOptions> {
    let ssl_mode: PgSslMode = config.sslmode.parse().map_err(|_| BackendError::InvalidConfig {
        backend: BACKEND.to_string(),
        message: format!("unknown sslmode '{}'", config.sslmode),
    })?;

    let mut options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database)
        .ssl_mode(ssl_mode);

    if let Some(ref ca) = config.ca_cert {
        options = options.ssl_root_cert(ca);
    }
    if let (Some(cert), Some(key)) = (&config.client_cert, &config.client_key) {
        options = options.ssl_client_cert(cert).ssl_client_key(key);
    }

    Ok(options)
}

#[async_trait]
impl ChecksumBackend for PgChecksumBackend {
    async fn ping(&mut self) -> BackendResult<()> {
        sqlx::query("SELECT 1")
            .execute(self.pool()?)
            .await
            .map(|_| ())
            .map_err(|e| BackendError::connection(BACKEND, e))
    }

    async fn reconnect(&mut self) -> BackendResult<()> {
        let pool = self.create_pool().await?;
        self.pool = Some(pool);
        Ok(())
    }

    async fn query_checksum(&mut self, path: &str) -> BackendResult<ChecksumRecord> {
        let row: (Option<String>, Option<String>) = sqlx::query_as(CHECKSUM_QUERY)
            .bind(path)
            .fetch_one(self.pool()?)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => BackendError::not_found(BACKEND, path),
                other => BackendError::query(BACKEND, other),
            })?;

        match row {
            (Some(checksum), checksum_type) => Ok(ChecksumRecord {
                checksum,
                checksum_type: checksum_type.unwrap_or_default(),
            }),
            (None, _) => Err(BackendError::not_found(BACKEND, path)),
        }
    }

    async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            debug!(host = %self.host, "Database connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_options_accepts_known_sslmodes() {
        for mode in ["disable", "prefer", "require", "verify-ca", "verify-full"] {
            let config = DbConfig {
                sslmode: mode.to_string(),
                ..Default::default()
            };
            assert!(connect_options(&config).is_ok(), "{}", mode);
        }
    }

    #[test]
    fn test_connect_options_rejects_unknown_sslmode() {
        let config = DbConfig {
            sslmode: "sometimes".to_string(),
            ..Default::default()
        };
        let err = connect_options(&config).err().unwrap();
        assert!(matches!(err, BackendError::InvalidConfig { .. }));
    }
}
