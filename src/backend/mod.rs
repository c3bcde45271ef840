//! Collaborator abstractions for the three external stores
//!
//! The reconciliation core never talks to a database or bucket directly. It
//! goes through three narrow traits:
//!
//! - [`MetadataStore`]: collection-scoped `find` / `find_one` over JSON-shaped
//!   documents (MongoDB in production, an in-memory dump for tests and offline
//!   runs).
//! - [`ObjectProbe`]: a single "does this key exist" probe against object
//!   storage (S3-compatible in production, a local directory otherwise).
//! - [`ChecksumBackend`]: ping / reconnect / single-row checksum lookup against
//!   the ingestion database. The retry and reconnect policy lives in
//!   [`crate::core::checksum`], not here.
//!
//! # Example
//!
//! ```
//! use reconcile::backend::{Filter, MemoryMetadataStore, MetadataStore};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = MemoryMetadataStore::new();
//! store.insert("user", json!({"userId": "u1", "folders": ["f1"]}));
//!
//! let user = store.find_one("user", &Filter::eq("userId", "u1")).await.unwrap();
//! assert!(user.is_some());
//! # }
//! ```

pub mod error;
pub mod local;
pub mod memory;
pub mod registry;

#[cfg(feature = "s3-native")]
mod s3;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "mongo")]
mod mongo;

pub use error::{BackendError, BackendResult};
pub use local::LocalProbe;
pub use memory::MemoryMetadataStore;
pub use registry::{open_checksum_backend, open_metadata_store, open_probe};

#[cfg(feature = "s3-native")]
pub use s3::S3Probe;

#[cfg(feature = "postgres")]
pub use postgres::PgChecksumBackend;

#[cfg(feature = "mongo")]
pub use mongo::MongoMetadataStore;

use crate::core::model::ChecksumRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A document as returned by the metadata store
pub type Document = serde_json::Value;

/// Equality or set-membership predicate over a named string field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    /// `field == value`
    Eq { field: String, value: String },

    /// `field in values`
    In { field: String, values: Vec<String> },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn any_of(field: impl Into<String>, values: impl IntoIterator<Item = String>) -> Self {
        Filter::In {
            field: field.into(),
            values: values.into_iter().collect(),
        }
    }

    /// The field this filter applies to
    pub fn field(&self) -> &str {
        match self {
            Filter::Eq { field, .. } | Filter::In { field, .. } => field,
        }
    }

    /// Evaluate the filter against a document.
    ///
    /// An array-valued field matches when any of its string elements matches,
    /// as a document database would evaluate it.
    pub fn matches(&self, doc: &Document) -> bool {
        let candidates: Vec<&str> = match doc.get(self.field()) {
            Some(serde_json::Value::String(s)) => vec![s.as_str()],
            Some(serde_json::Value::Array(items)) => {
                items.iter().filter_map(|v| v.as_str()).collect()
            }
            _ => return false,
        };

        match self {
            Filter::Eq { value, .. } => candidates.iter().any(|c| *c == value.as_str()),
            Filter::In { values, .. } => candidates
                .iter()
                .any(|c| values.iter().any(|v| v.as_str() == *c)),
        }
    }
}

/// Document store queried by collection name and filter
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// First document matching the filter, `None` when nothing matches
    async fn find_one(&self, collection: &str, filter: &Filter) -> BackendResult<Option<Document>>;

    /// All documents matching the filter, in insertion order
    async fn find(&self, collection: &str, filter: &Filter) -> BackendResult<Vec<Document>>;
}

/// Metadata-level existence probe against object storage
#[async_trait]
pub trait ObjectProbe: Send + Sync {
    /// `Ok(false)` for a missing key. Any `Err` is a transport or protocol
    /// fault and says nothing about the key.
    async fn exists(&self, key: &str) -> BackendResult<bool>;

    /// Short name for diagnostics
    fn name(&self) -> &str;
}

/// Connection to the ingestion database
///
/// Implementations report connectivity loss from [`ping`](Self::ping) and
/// replace their underlying connection in [`reconnect`](Self::reconnect).
#[async_trait]
pub trait ChecksumBackend: Send {
    async fn ping(&mut self) -> BackendResult<()>;

    async fn reconnect(&mut self) -> BackendResult<()>;

    /// Single-row lookup keyed by exact path equality. A missing row is an
    /// error (`NotFound`), not `Ok`.
    async fn query_checksum(&mut self, path: &str) -> BackendResult<ChecksumRecord>;

    async fn close(&mut self) {}
}

#[async_trait]
impl<T: MetadataStore + ?Sized> MetadataStore for Box<T> {
    async fn find_one(&self, collection: &str, filter: &Filter) -> BackendResult<Option<Document>> {
        (**self).find_one(collection, filter).await
    }

    async fn find(&self, collection: &str, filter: &Filter) -> BackendResult<Vec<Document>> {
        (**self).find(collection, filter).await
    }
}

#[async_trait]
impl<T: ObjectProbe + ?Sized> ObjectProbe for Box<T> {
    async fn exists(&self, key: &str) -> BackendResult<bool> {
        (**self).exists(key).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T: ChecksumBackend + ?Sized> ChecksumBackend for Box<T> {
    async fn ping(&mut self) -> BackendResult<()> {
        (**self).ping().await
    }

    async fn reconnect(&mut self) -> BackendResult<()> {
        (**self).reconnect().await
    }

    async fn query_checksum(&mut self, path: &str) -> BackendResult<ChecksumRecord> {
        (**self).query_checksum(path).await
    }

    async fn close(&mut self) {
        (**self).close().await
    }
}
