//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use reconcile::backend::{
    BackendError, BackendResult, ChecksumBackend, Document, Filter, MemoryMetadataStore,
    MetadataStore, ObjectProbe,
};
use reconcile::core::ChecksumRecord;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// Metadata graph used across the resolver and end-to-end tests.
///
/// - u1 owns f1 and f2; f1 links analysis a1 (x.bam), f2 links nothing
/// - u2 owns f3; f3 links s1 (sample), a3 and a4 (analysis), s1 again
/// - a5 declares dup.bam in both the analysis and run collections
/// - a6 is two analysis objects declaring the same file
pub fn fixture() -> Document {
    json!({
        "user": [
            {"userId": "u1", "folders": ["f1", "f2"]},
            {"userId": "u2", "folders": ["f3"]}
        ],
        "folder": [
            {"folderId": "f1", "name": "First", "metadataObjects": [
                {"accessionId": "a1", "schema": "analysis"}
            ]},
            {"folderId": "f3", "name": "Third", "metadataObjects": [
                {"accessionId": "s1", "schema": "sample"},
                {"accessionId": "a3", "schema": "analysis"},
                {"accessionId": "a4", "schema": "analysis"},
                {"accessionId": "s1", "schema": "sample"}
            ]},
            {"folderId": "f9", "name": "Orphan", "metadataObjects": [
                {"accessionId": "a9", "schema": "analysis"}
            ]}
        ],
        "analysis": [
            {"accessionId": "a1", "files": [{"filename": "x.bam", "checksumMethod": "SHA256"}]},
            {"accessionId": "a3", "files": [{"filename": "y.bam"}, {"filename": "z.bam"}]},
            {"accessionId": "a4", "files": [{"filename": "w.bam"}]},
            {"accessionId": "a5", "files": [{"filename": "dup.bam"}]},
            {"accessionId": "a6", "files": [{"filename": "twice.bam"}]},
            {"accessionId": "a6", "files": [{"filename": "twice.bam"}]}
        ],
        "run": [
            {"accessionId": "a5", "files": [{"filename": "dup.bam"}]}
        ],
        "sample": [
            {"accessionId": "s1", "files": [{"filename": "s.txt"}]}
        ]
    })
}

pub fn fixture_store() -> MemoryMetadataStore {
    MemoryMetadataStore::from_value(fixture()).expect("fixture is a valid dump")
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Wraps a store, records every queried collection and fails chosen ones
pub struct RecordingStore<S> {
    inner: S,
    failing: HashSet<String>,
    pub queries: Mutex<Vec<String>>,
}

impl<S: MetadataStore> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing: HashSet::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, collection: &str) -> Self {
        self.failing.insert(collection.to_string());
        self
    }

    pub fn queried(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    fn check(&self, collection: &str) -> BackendResult<()> {
        self.queries.lock().unwrap().push(collection.to_string());
        if self.failing.contains(collection) {
            return Err(BackendError::transport("recording", "connection reset by peer"));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: MetadataStore> MetadataStore for RecordingStore<S> {
    async fn find_one(&self, collection: &str, filter: &Filter) -> BackendResult<Option<Document>> {
        self.check(collection)?;
        self.inner.find_one(collection, filter).await
    }

    async fn find(&self, collection: &str, filter: &Filter) -> BackendResult<Vec<Document>> {
        self.check(collection)?;
        self.inner.find(collection, filter).await
    }
}

/// Object probe answering from a fixed table; unknown keys are missing
pub struct TableProbe {
    answers: HashMap<String, BackendResult<bool>>,
    pub probed: Mutex<Vec<String>>,
}

impl TableProbe {
    pub fn new(answers: Vec<(&str, BackendResult<bool>)>) -> Self {
        Self {
            answers: answers
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            probed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ObjectProbe for TableProbe {
    async fn exists(&self, key: &str) -> BackendResult<bool> {
        self.probed.lock().unwrap().push(key.to_string());
        self.answers.get(key).cloned().unwrap_or(Ok(false))
    }

    fn name(&self) -> &str {
        "table"
    }
}

/// Checksum database double.
///
/// Rows are looked up by exact path. `failures_before_row` makes a known path
/// fail that many times before the row is returned. `pings` scripts ping
/// outcomes in order; once exhausted every ping succeeds.
#[derive(Default)]
pub struct FakeChecksumDb {
    pub rows: HashMap<String, ChecksumRecord>,
    pub failures_before_row: u32,
    pub pings: VecDeque<bool>,
    pub ping_calls: usize,
    pub query_calls: usize,
    pub reconnects: usize,
    pub closes: usize,
}

impl FakeChecksumDb {
    pub fn with_rows(paths: &[&str]) -> Self {
        Self {
            rows: paths
                .iter()
                .map(|p| {
                    (
                        p.to_string(),
                        ChecksumRecord {
                            checksum: format!("sum-{}", p),
                            checksum_type: "SHA256".to_string(),
                        },
                    )
                })
                .collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ChecksumBackend for FakeChecksumDb {
    async fn ping(&mut self) -> BackendResult<()> {
        self.ping_calls += 1;
        if self.pings.pop_front().unwrap_or(true) {
            Ok(())
        } else {
            Err(BackendError::connection("fake", "server closed the connection"))
        }
    }

    async fn reconnect(&mut self) -> BackendResult<()> {
        self.reconnects += 1;
        Ok(())
    }

    async fn query_checksum(&mut self, path: &str) -> BackendResult<ChecksumRecord> {
        self.query_calls += 1;
        if self.failures_before_row > 0 {
            self.failures_before_row -= 1;
            return Err(BackendError::query("fake", "canceling statement due to conflict"));
        }
        self.rows
            .get(path)
            .cloned()
            .ok_or_else(|| BackendError::not_found("fake", path))
    }

    async fn close(&mut self) {
        self.closes += 1;
    }
}
