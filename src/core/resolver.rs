//! Metadata graph traversal
//!
//! Walks user → folders → submission collections → metadata objects → files.
//! Each step is a read-only query against the [`MetadataStore`]. A failing
//! step never aborts the traversal: it yields its zero value together with
//! the error, and the caller decides what to report.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::backend::{BackendError, Document, Filter, MetadataStore};
use crate::config::MetadataConfig;
use crate::core::dedup::stable_dedup;
use crate::core::model::{FileRef, MetadataObject, SubmissionCollection, User};

/// Schema tag identifying analysis objects
pub const ANALYSIS_SCHEMA: &str = "analysis";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No document matched
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// The store query failed or returned something undecodable
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Value of a traversal step plus the error that degraded it, if any
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub error: Option<ResolveError>,
}

impl<T> Resolved<T> {
    pub fn ok(value: T) -> Self {
        Self { value, error: None }
    }

    pub fn degraded(value: T, error: ResolveError) -> Self {
        Self {
            value,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Split into the value and any error, pushing the error onto `errors`
    pub fn collect_into(self, errors: &mut Vec<ResolveError>) -> T {
        if let Some(e) = self.error {
            errors.push(e);
        }
        self.value
    }
}

/// Where a traversal starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Root {
    User(String),
    Folder(String),
    Accession(String),
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Root::User(id) => write!(f, "user {}", id),
            Root::Folder(id) => write!(f, "folder {}", id),
            Root::Accession(id) => write!(f, "accession {}", id),
        }
    }
}

/// Everything a traversal found, in document order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub root: Root,
    pub folders: Vec<String>,
    pub accessions: Vec<String>,
    pub schemas: Vec<String>,
    pub files: Vec<FileRef>,
    #[serde(skip)]
    pub errors: Vec<ResolveError>,
}

impl Resolution {
    /// File paths in resolution order, duplicates included
    pub fn file_paths(&self) -> Vec<String> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Resolves root identifiers into accessions, schemas and files
pub struct GraphResolver<'a, S: ?Sized> {
    store: &'a S,
    config: &'a MetadataConfig,
}

impl<'a, S: MetadataStore + ?Sized> GraphResolver<'a, S> {
    pub fn new(store: &'a S, config: &'a MetadataConfig) -> Self {
        Self { store, config }
    }

    /// Folders owned by a user, in stored order.
    ///
    /// An unknown user yields an empty list with a `NotFound` error.
    pub async fn resolve_folders_for_user(&self, user_id: &str) -> Resolved<Vec<String>> {
        debug!(
            collection = %self.config.users_collection,
            user = user_id,
            "Querying user folders"
        );

        let filter = Filter::eq("userId", user_id);
        let doc = match self
            .store
            .find_one(&self.config.users_collection, &filter)
            .await
        {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                return Resolved::degraded(
                    Vec::new(),
                    ResolveError::NotFound {
                        kind: "user",
                        id: user_id.to_string(),
                    },
                )
            }
            Err(e) => return Resolved::degraded(Vec::new(), e.into()),
        };

        match decode::<User>(doc, "user") {
            Ok(user) => {
                debug!(user = %user.id, folders = %user.folders.join(","), "User folders resolved");
                Resolved::ok(user.folders)
            }
            Err(e) => Resolved::degraded(Vec::new(), e.into()),
        }
    }

    /// Submission collections linked to any of the given folders.
    ///
    /// An empty folder set short-circuits to an empty result without a query.
    /// Collections whose folder is not in the set are never returned.
    pub async fn resolve_collections(
        &self,
        folder_ids: &[String],
    ) -> Resolved<Vec<SubmissionCollection>> {
        if folder_ids.is_empty() {
            return Resolved::ok(Vec::new());
        }

        debug!(
            collection = %self.config.submissions_collection,
            folders = folder_ids.len(),
            "Querying submission collections"
        );

        let filter = Filter::any_of("folderId", folder_ids.iter().cloned());
        let docs = match self
            .store
            .find(&self.config.submissions_collection, &filter)
            .await
        {
            Ok(docs) => docs,
            Err(e) => return Resolved::degraded(Vec::new(), e.into()),
        };

        let mut collections = Vec::with_capacity(docs.len());
        let mut error = None;
        for doc in docs {
            match decode::<SubmissionCollection>(doc, "submission collection") {
                Ok(col) if folder_ids.contains(&col.folder_id) => collections.push(col),
                Ok(_) => {}
                Err(e) => {
                    error.get_or_insert(ResolveError::from(e));
                }
            }
        }

        Resolved {
            value: collections,
            error,
        }
    }

    /// Files declared by every object carrying `accession_id`, searched in
    /// the configured object collections. No dedup is applied.
    pub async fn resolve_files_for_accession(&self, accession_id: &str) -> Resolved<Vec<FileRef>> {
        self.resolve_files_in(accession_id, &self.config.object_collections)
            .await
    }

    /// Like [`resolve_files_for_accession`](Self::resolve_files_for_accession)
    /// but over an explicit list of object collections, visited in order.
    pub async fn resolve_files_in(
        &self,
        accession_id: &str,
        collections: &[String],
    ) -> Resolved<Vec<FileRef>> {
        if accession_id.is_empty() {
            return Resolved::ok(Vec::new());
        }

        let filter = Filter::eq("accessionId", accession_id);
        let mut files = Vec::new();
        let mut error = None;

        for collection in collections {
            debug!(collection = %collection, accession = accession_id, "Querying metadata objects");
            let docs = match self.store.find(collection, &filter).await {
                Ok(docs) => docs,
                Err(e) => {
                    error.get_or_insert(ResolveError::from(e));
                    continue;
                }
            };

            for doc in docs {
                match decode::<MetadataObject>(doc, "metadata object") {
                    Ok(object) => files.extend(object.files),
                    Err(e) => {
                        error.get_or_insert(ResolveError::from(e));
                    }
                }
            }
        }

        Resolved { value: files, error }
    }

    /// Accession of the analysis object reachable from a folder.
    ///
    /// When several objects are tagged `analysis` the last one scanned wins.
    /// An empty string means no analysis is linked.
    pub async fn resolve_analysis_accession_for_folder(&self, folder_id: &str) -> Resolved<String> {
        let Resolved { value, error } = self
            .resolve_collections(&[folder_id.to_string()])
            .await;

        let accession = value
            .iter()
            .flat_map(|col| col.metadata_objects.iter())
            .filter(|obj| obj.schema == ANALYSIS_SCHEMA)
            .last()
            .map(|obj| obj.accession_id.clone())
            .unwrap_or_default();

        Resolved {
            value: accession,
            error,
        }
    }

    /// Full traversal from a root.
    ///
    /// `only_accession` replaces the accession list but leaves the schema list
    /// as derived from the traversal.
    pub async fn resolve(&self, root: &Root, only_accession: Option<&str>) -> Resolution {
        let mut errors = Vec::new();

        let folders = match root {
            Root::User(id) => self.resolve_folders_for_user(id).await.collect_into(&mut errors),
            Root::Folder(id) => vec![id.clone()],
            Root::Accession(_) => Vec::new(),
        };

        let (accessions, schemas) = match root {
            Root::Accession(id) => {
                let accession = only_accession.unwrap_or(id.as_str()).to_string();
                (vec![accession], Vec::new())
            }
            _ => {
                let collections = self
                    .resolve_collections(&folders)
                    .await
                    .collect_into(&mut errors);
                extract_accessions_and_schemas(&collections, only_accession)
            }
        };

        let search: &[String] = if schemas.is_empty() {
            &self.config.object_collections
        } else {
            &schemas
        };

        let mut files = Vec::new();
        for accession in &accessions {
            let found = self
                .resolve_files_in(accession, search)
                .await
                .collect_into(&mut errors);
            files.extend(found);
        }

        debug!(
            root = %root,
            folders = folders.len(),
            accessions = accessions.len(),
            files = files.len(),
            errors = errors.len(),
            "Resolution finished"
        );

        Resolution {
            root: root.clone(),
            folders,
            accessions,
            schemas,
            files,
            errors,
        }
    }
}

/// Accession ids and schema names across collections, each deduplicated in
/// first-seen order.
///
/// With `only_accession` set, the accession list is exactly that id while
/// the schema list still reflects every object traversed.
pub fn extract_accessions_and_schemas(
    collections: &[SubmissionCollection],
    only_accession: Option<&str>,
) -> (Vec<String>, Vec<String>) {
    let objects = || collections.iter().flat_map(|col| col.metadata_objects.iter());

    let schemas = stable_dedup(objects().map(|obj| obj.schema.clone()));
    let accessions = match only_accession {
        Some(id) => vec![id.to_string()],
        None => stable_dedup(objects().map(|obj| obj.accession_id.clone())),
    };

    (accessions, schemas)
}

fn decode<T: DeserializeOwned>(doc: Document, what: &str) -> Result<T, BackendError> {
    serde_json::from_value(doc).map_err(|e| BackendError::Decode {
        what: what.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::MetadataObject;

    fn object(accession: &str, schema: &str) -> MetadataObject {
        MetadataObject {
            accession_id: accession.to_string(),
            schema: schema.to_string(),
            files: Vec::new(),
        }
    }

    fn collection(folder: &str, objects: Vec<MetadataObject>) -> SubmissionCollection {
        SubmissionCollection {
            folder_id: folder.to_string(),
            name: String::new(),
            metadata_objects: objects,
        }
    }

    #[test]
    fn test_extract_dedups_in_first_seen_order() {
        let collections = vec![
            collection("f1", vec![object("a2", "sample"), object("a1", "analysis")]),
            collection("f2", vec![object("a2", "sample"), object("a3", "sample")]),
        ];

        let (accessions, schemas) = extract_accessions_and_schemas(&collections, None);
        assert_eq!(accessions, vec!["a2", "a1", "a3"]);
        assert_eq!(schemas, vec!["sample", "analysis"]);
    }

    #[test]
    fn test_extract_is_idempotent() {
        let collections = vec![collection(
            "f1",
            vec![object("a1", "run"), object("a1", "run"), object("a2", "study")],
        )];

        let first = extract_accessions_and_schemas(&collections, None);
        let second = extract_accessions_and_schemas(&collections, None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_only_accession_replaces_ids_but_not_schemas() {
        let collections = vec![collection(
            "f1",
            vec![object("a1", "analysis"), object("s1", "sample")],
        )];

        let (accessions, schemas) = extract_accessions_and_schemas(&collections, Some("zzz"));
        assert_eq!(accessions, vec!["zzz"]);
        assert_eq!(schemas, vec!["analysis", "sample"]);
    }

    #[test]
    fn test_extract_empty() {
        let (accessions, schemas) = extract_accessions_and_schemas(&[], None);
        assert!(accessions.is_empty());
        assert!(schemas.is_empty());

        let (accessions, _) = extract_accessions_and_schemas(&[], Some("a9"));
        assert_eq!(accessions, vec!["a9"]);
    }

    #[test]
    fn test_root_display() {
        assert_eq!(Root::User("u1".to_string()).to_string(), "user u1");
        assert_eq!(Root::Accession("a1".to_string()).to_string(), "accession a1");
    }
}
