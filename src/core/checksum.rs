//! Self-healing access to the ingestion checksum database
//!
//! Every lookup first asserts connectivity. A failed ping moves the handle to
//! `Reconnecting`, where it polls at a fixed interval until the ping succeeds
//! or the reconnect budget runs out. Running out is terminal: the handle goes
//! to `Fatal`, the caller must stop the run, and no further lookups are sent.
//!
//! Query-level failures (including "no such row") are a different matter and
//! are retried as a whole lookup up to the configured attempt ceiling.
//!
//! ```text
//! Connected --ping fails--> Reconnecting --ping ok--> Connected
//!                               |
//!                               +--elapsed > timeout--> Fatal
//! ```

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, warn};

use crate::backend::{BackendError, ChecksumBackend};
use crate::config::ChecksumPolicy;
use crate::core::model::ChecksumRecord;

/// Connectivity state of a checksum store handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Reconnecting,
    Fatal,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    /// Every attempt failed at the query level
    #[error("checksum lookup failed after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: BackendError },

    /// Connectivity could not be restored within the reconnect timeout
    #[error("checksum database unreachable for {}s", .waited.as_secs())]
    Unreachable { waited: Duration },

    /// The handle already went fatal on an earlier lookup
    #[error("checksum database handle is no longer usable")]
    AlreadyFatal,
}

impl ChecksumError {
    /// Whether this error ends the whole run rather than one file
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChecksumError::Unreachable { .. } | ChecksumError::AlreadyFatal
        )
    }
}

/// Anything the reconciliation engine can ask for checksum presence
#[async_trait]
pub trait ChecksumLookup: Send {
    async fn get_checksum(&mut self, path: &str) -> Result<ChecksumRecord, ChecksumError>;
}

/// Checksum database handle with the retry and reconnect policy applied
pub struct ChecksumStore<B> {
    backend: B,
    policy: ChecksumPolicy,
    state: ConnectionState,
}

impl<B: ChecksumBackend> ChecksumStore<B> {
    pub fn new(backend: B, policy: ChecksumPolicy) -> Self {
        Self {
            backend,
            policy,
            state: ConnectionState::Connected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Block until the backend answers a ping, reconnecting as needed.
    pub async fn ensure_connected(&mut self) -> Result<(), ChecksumError> {
        if self.state == ConnectionState::Fatal {
            return Err(ChecksumError::AlreadyFatal);
        }

        let start = Instant::now();
        while let Err(e) = self.backend.ping().await {
            self.state = ConnectionState::Reconnecting;
            warn!(error = %e, "Database unreachable, reconnecting");
            self.backend.close().await;

            let waited = start.elapsed();
            if waited > self.policy.reconnect_timeout() {
                self.state = ConnectionState::Fatal;
                error!(
                    waited_secs = waited.as_secs(),
                    "Could not reconnect to failed database in reasonable time, giving up"
                );
                return Err(ChecksumError::Unreachable { waited });
            }

            sleep(self.policy.reconnect_interval()).await;
            debug!("Reconnecting to DB");
            if let Err(e) = self.backend.reconnect().await {
                debug!(error = %e, "Reconnect attempt failed");
            }
        }

        self.state = ConnectionState::Connected;
        Ok(())
    }

    async fn lookup_once(&mut self, path: &str) -> Result<ChecksumRecord, LookupFailure> {
        self.ensure_connected().await.map_err(LookupFailure::Fatal)?;
        self.backend
            .query_checksum(path)
            .await
            .map_err(LookupFailure::Query)
    }

    /// Fetch the checksum recorded for `path`.
    ///
    /// Query failures are retried up to `retry_attempts` total attempts and
    /// the last one is returned. Connectivity loss past the reconnect timeout
    /// is returned immediately as a fatal error.
    pub async fn get_checksum(&mut self, path: &str) -> Result<ChecksumRecord, ChecksumError> {
        let attempts = self.policy.retry_attempts.max(1);
        let mut last = None;

        for attempt in 1..=attempts {
            match self.lookup_once(path).await {
                Ok(record) => return Ok(record),
                Err(LookupFailure::Fatal(e)) => return Err(e),
                Err(LookupFailure::Query(e)) => {
                    debug!(path, attempt, error = %e, "Checksum lookup failed");
                    last = Some(e);
                }
            }
        }

        Err(ChecksumError::RetriesExhausted {
            attempts,
            last: last.unwrap_or_else(|| BackendError::not_found("checksum", path)),
        })
    }

    /// Close the underlying connection
    pub async fn close(mut self) {
        self.backend.close().await;
    }
}

enum LookupFailure {
    Fatal(ChecksumError),
    Query(BackendError),
}

#[async_trait]
impl<B: ChecksumBackend> ChecksumLookup for ChecksumStore<B> {
    async fn get_checksum(&mut self, path: &str) -> Result<ChecksumRecord, ChecksumError> {
        ChecksumStore::get_checksum(self, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendResult;
    use std::collections::VecDeque;

    /// Backend whose ping and query results are scripted in order
    #[derive(Default)]
    struct Scripted {
        pings: VecDeque<bool>,
        queries: VecDeque<BackendResult<ChecksumRecord>>,
        ping_calls: usize,
        query_calls: usize,
        reconnects: usize,
    }

    #[async_trait]
    impl ChecksumBackend for Scripted {
        async fn ping(&mut self) -> BackendResult<()> {
            self.ping_calls += 1;
            match self.pings.pop_front().unwrap_or(true) {
                true => Ok(()),
                false => Err(BackendError::connection("test", "down")),
            }
        }

        async fn reconnect(&mut self) -> BackendResult<()> {
            self.reconnects += 1;
            Ok(())
        }

        async fn query_checksum(&mut self, path: &str) -> BackendResult<ChecksumRecord> {
            self.query_calls += 1;
            self.queries
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::not_found("test", path)))
        }
    }

    fn record() -> ChecksumRecord {
        ChecksumRecord {
            checksum: "abc123".to_string(),
            checksum_type: "SHA256".to_string(),
        }
    }

    fn policy(retry_attempts: u32) -> ChecksumPolicy {
        ChecksumPolicy {
            retry_attempts,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let backend = Scripted {
            queries: VecDeque::from(vec![Ok(record())]),
            ..Default::default()
        };
        let mut store = ChecksumStore::new(backend, policy(8));

        assert_eq!(store.get_checksum("x.c4gh").await.unwrap(), record());
        assert_eq!(store.backend().query_calls, 1);
        assert_eq!(store.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_success_after_two_failures() {
        let backend = Scripted {
            queries: VecDeque::from(vec![
                Err(BackendError::not_found("test", "x")),
                Err(BackendError::query("test", "deadlock")),
                Ok(record()),
            ]),
            ..Default::default()
        };
        let mut store = ChecksumStore::new(backend, policy(8));

        assert!(store.get_checksum("x.c4gh").await.is_ok());
        assert_eq!(store.backend().query_calls, 3);
        assert_eq!(store.backend().ping_calls, 3);
    }

    #[tokio::test]
    async fn test_retry_ceiling() {
        let mut store = ChecksumStore::new(Scripted::default(), policy(8));

        let err = store.get_checksum("missing.c4gh").await.unwrap_err();
        assert!(matches!(
            err,
            ChecksumError::RetriesExhausted { attempts: 8, .. }
        ));
        assert!(!err.is_fatal());
        assert_eq!(store.backend().query_calls, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_then_queries() {
        let backend = Scripted {
            pings: VecDeque::from(vec![false, false, true]),
            queries: VecDeque::from(vec![Ok(record())]),
            ..Default::default()
        };
        let mut store = ChecksumStore::new(backend, policy(8));

        assert!(store.get_checksum("x.c4gh").await.is_ok());
        assert_eq!(store.backend().reconnects, 2);
        assert_eq!(store.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_timeout_is_fatal_once() {
        let backend = Scripted {
            pings: VecDeque::from(vec![false; 1000]),
            ..Default::default()
        };
        let mut store = ChecksumStore::new(backend, policy(8));

        let err = store.get_checksum("x.c4gh").await.unwrap_err();
        match err {
            ChecksumError::Unreachable { waited } => {
                assert!(waited > Duration::from_secs(300));
            }
            other => panic!("expected Unreachable, got {:?}", other),
        }
        assert_eq!(store.state(), ConnectionState::Fatal);
        assert_eq!(store.backend().query_calls, 0);

        let pings = store.backend().ping_calls;
        let err = store.get_checksum("y.c4gh").await.unwrap_err();
        assert_eq!(err, ChecksumError::AlreadyFatal);
        assert_eq!(store.backend().ping_calls, pings);
        assert_eq!(store.backend().query_calls, 0);
    }
}
