//! In-memory document store
//!
//! Holds collections of JSON documents in insertion order. Used by the test
//! suite and for offline runs against a JSON export of the metadata database:
//!
//! ```json
//! {
//!   "user":     [{"userId": "u1", "folders": ["f1"]}],
//!   "folder":   [{"folderId": "f1",
//!                 "metadataObjects": [{"accessionId": "a1", "schema": "analysis"}]}],
//!   "analysis": [{"accessionId": "a1", "files": [{"filename": "x.bam"}]}]
//! }
//! ```

use super::error::{BackendError, BackendResult};
use super::{Document, Filter, MetadataStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

const BACKEND: &str = "memory";

#[derive(Debug, Clone, Default)]
pub struct MemoryMetadataStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl MemoryMetadataStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a JSON object mapping collection names to arrays
    pub fn from_value(dump: Document) -> BackendResult<Self> {
        let map = match dump {
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(BackendError::Decode {
                    what: "metadata dump".to_string(),
                    message: "top level must be an object of collections".to_string(),
                })
            }
        };

        let store = Self::new();
        for (collection, docs) in map {
            match docs {
                serde_json::Value::Array(docs) => {
                    for doc in docs {
                        store.insert(&collection, doc);
                    }
                }
                _ => {
                    return Err(BackendError::Decode {
                        what: format!("collection '{}'", collection),
                        message: "expected an array of documents".to_string(),
                    })
                }
            }
        }
        Ok(store)
    }

    /// Load a JSON dump from disk
    pub fn from_file(path: &Path) -> BackendResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| BackendError::InvalidConfig {
            backend: BACKEND.to_string(),
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let dump: Document = serde_json::from_str(&contents)?;
        Self::from_value(dump)
    }

    /// Append a document to a collection
    pub fn insert(&self, collection: &str, doc: Document) {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        collections
            .entry(collection.to_string())
            .or_default()
            .push(doc);
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.read()
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.read().values().all(|docs| docs.is_empty())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Vec<Document>>> {
        self.collections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> BackendResult<Option<Document>> {
        Ok(self
            .read()
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| filter.matches(doc)).cloned()))
    }

    async fn find(&self, collection: &str, filter: &Filter) -> BackendResult<Vec<Document>> {
        Ok(self
            .read()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_find_preserves_insertion_order() {
        let store = MemoryMetadataStore::new();
        store.insert("folder", json!({"folderId": "f2", "n": 1}));
        store.insert("folder", json!({"folderId": "f1", "n": 2}));
        store.insert("folder", json!({"folderId": "f2", "n": 3}));

        let docs = store
            .find("folder", &Filter::eq("folderId", "f2"))
            .await
            .unwrap();
        let order: Vec<i64> = docs.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(order, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_find_one_missing_collection() {
        let store = MemoryMetadataStore::new();
        let doc = store
            .find_one("user", &Filter::eq("userId", "nobody"))
            .await
            .unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"user": [{{"userId": "u1", "folders": ["f1", "f2"]}}], "folder": []}}"#
        )
        .unwrap();

        let store = MemoryMetadataStore::from_file(file.path()).unwrap();
        assert_eq!(store.len("user"), 1);
        assert_eq!(store.len("folder"), 0);
        assert!(!store.is_empty());
    }

    #[test]
    fn test_rejects_non_object_dump() {
        let err = MemoryMetadataStore::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, BackendError::Decode { .. }));

        let err = MemoryMetadataStore::from_value(json!({"user": {"userId": "u1"}})).unwrap_err();
        assert!(matches!(err, BackendError::Decode { .. }));
    }
}
