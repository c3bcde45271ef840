//! Local filesystem object probe
//!
//! Treats a directory as a bucket: an object key is a path relative to the
//! root. Useful against a mounted inbox or an archive snapshot on disk.

use super::error::{BackendError, BackendResult};
use super::ObjectProbe;
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use tokio::fs;

#[derive(Debug, Clone)]
pub struct LocalProbe {
    root: PathBuf,
}

impl LocalProbe {
    /// Create a probe rooted at a specific directory
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an object key relative to the root
    fn resolve_key(&self, key: &str) -> PathBuf {
        let key = key.replace('\\', "/");
        self.root.join(key.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectProbe for LocalProbe {
    async fn exists(&self, key: &str) -> BackendResult<bool> {
        match fs::metadata(self.resolve_key(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BackendError::transport("local", e)),
        }
    }

    fn name(&self) -> &str {
        "local"
    }
}
