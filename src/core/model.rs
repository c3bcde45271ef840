//! Read-only projections of the submission metadata hierarchy
//!
//! All of these are materialised per invocation from store queries and
//! discarded at the end of the run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A user record: identifier plus the folders it owns, in stored order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "userId")]
    pub id: String,

    #[serde(default)]
    pub folders: Vec<String>,
}

/// A user-owned grouping of submissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(rename = "folderId")]
    pub id: String,

    #[serde(default)]
    pub name: String,
}

/// The submission document linked to a folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionCollection {
    #[serde(rename = "folderId")]
    pub folder_id: String,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "metadataObjects", default)]
    pub metadata_objects: Vec<MetadataObject>,
}

impl SubmissionCollection {
    /// The folder this collection belongs to
    pub fn folder(&self) -> Folder {
        Folder {
            id: self.folder_id.clone(),
            name: self.name.clone(),
        }
    }
}

/// A submitted metadata object, identified by its accession
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataObject {
    #[serde(rename = "accessionId")]
    pub accession_id: String,

    /// Free-form type tag ("analysis", "sample", ...)
    #[serde(default)]
    pub schema: String,

    #[serde(default)]
    pub files: Vec<FileRef>,
}

/// A file declared by a metadata object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    #[serde(rename = "filename", alias = "fileName", alias = "path")]
    pub path: String,

    /// Declared checksum; absent before ingestion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    #[serde(
        rename = "checksumMethod",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub checksum_method: Option<String>,
}

impl FileRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            checksum: None,
            checksum_method: None,
        }
    }
}

/// Checksum metadata held by the ingestion database for one path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumRecord {
    pub checksum: String,
    pub checksum_type: String,
}

/// Classification of a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerdictStatus {
    ExistsInStorage,
    MissingInStorage,
    ChecksumVerified,
    ChecksumAbsent,
}

impl VerdictStatus {
    /// Whether the verdict confirms the file is where it should be
    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            VerdictStatus::ExistsInStorage | VerdictStatus::ChecksumVerified
        )
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictStatus::ExistsInStorage => write!(f, "exists-in-storage"),
            VerdictStatus::MissingInStorage => write!(f, "missing-in-storage"),
            VerdictStatus::ChecksumVerified => write!(f, "checksum-verified"),
            VerdictStatus::ChecksumAbsent => write!(f, "checksum-absent"),
        }
    }
}

/// Outcome for one file. `status` is `None` when the check was inconclusive,
/// in which case `detail` carries the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VerdictStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Verdict {
    pub fn new(path: impl Into<String>, status: VerdictStatus) -> Self {
        Self {
            path: path.into(),
            status: Some(status),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn inconclusive(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: None,
            detail: Some(detail.into()),
        }
    }

    pub fn is_inconclusive(&self) -> bool {
        self.status.is_none()
    }
}
