//! Backend factory
//!
//! Turns the resolved [`ReconConfig`](crate::config::ReconConfig) sections into
//! boxed collaborators. Each store is opened once per run. A backend whose
//! cargo feature is disabled yields `BackendError::Unsupported`.

use super::error::BackendError;
use super::{ChecksumBackend, LocalProbe, MemoryMetadataStore, MetadataStore, ObjectProbe};
use crate::config::{
    DbConfig, MetadataBackend, MetadataConfig, S3Config, StorageBackend, StorageConfig,
};
use crate::error::Result;
use tracing::{debug, info};

/// Open the document store selected by `metadata.backend`
pub async fn open_metadata_store(config: &MetadataConfig) -> Result<Box<dyn MetadataStore>> {
    match config.backend {
        MetadataBackend::Dump => {
            let path = config.dump_path.as_deref().ok_or_else(|| BackendError::InvalidConfig {
                backend: "dump".to_string(),
                message: "metadata.dump_path is required for the dump backend".to_string(),
            })?;
            debug!(path = %path.display(), "Loading metadata dump");
            let store = MemoryMetadataStore::from_file(path)?;
            info!(path = %path.display(), "Metadata loaded from dump");
            Ok(Box::new(store))
        }
        MetadataBackend::Mongo => open_mongo(config).await,
    }
}

#[cfg(feature = "mongo")]
async fn open_mongo(config: &MetadataConfig) -> Result<Box<dyn MetadataStore>> {
    let store = super::MongoMetadataStore::connect(config).await?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "mongo"))]
async fn open_mongo(_config: &MetadataConfig) -> Result<Box<dyn MetadataStore>> {
    Err(BackendError::Unsupported {
        backend: "mongo".to_string(),
        reason: "built without the `mongo` feature".to_string(),
    }
    .into())
}

/// Open the object probe selected by `storage.backend`
pub async fn open_probe(storage: &StorageConfig, s3: &S3Config) -> Result<Box<dyn ObjectProbe>> {
    match storage.backend {
        StorageBackend::Local => {
            let root = storage.root.clone().ok_or_else(|| BackendError::InvalidConfig {
                backend: "local".to_string(),
                message: "storage.root is required for the local backend".to_string(),
            })?;
            debug!(root = %root.display(), "Using local object probe");
            Ok(Box::new(LocalProbe::with_root(root)))
        }
        StorageBackend::S3 => open_s3(s3).await,
    }
}

#[cfg(feature = "s3-native")]
async fn open_s3(config: &S3Config) -> Result<Box<dyn ObjectProbe>> {
    let probe = super::S3Probe::new(config).await?;
    Ok(Box::new(probe))
}

#[cfg(not(feature = "s3-native"))]
async fn open_s3(_config: &S3Config) -> Result<Box<dyn ObjectProbe>> {
    Err(BackendError::Unsupported {
        backend: "s3".to_string(),
        reason: "built without the `s3-native` feature".to_string(),
    }
    .into())
}

/// Open the ingestion database connection
pub async fn open_checksum_backend(config: &DbConfig) -> Result<Box<dyn ChecksumBackend>> {
    config.validate()?;
    open_postgres(config).await
}

#[cfg(feature = "postgres")]
async fn open_postgres(config: &DbConfig) -> Result<Box<dyn ChecksumBackend>> {
    let backend = super::PgChecksumBackend::connect(config).await?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(_config: &DbConfig) -> Result<Box<dyn ChecksumBackend>> {
    Err(BackendError::Unsupported {
        backend: "postgres".to_string(),
        reason: "built without the `postgres` feature".to_string(),
    }
    .into())
}
