//! Per-file reconciliation
//!
//! Files are verified one at a time in resolution order and each verdict is
//! handed to the caller as soon as it is known. One file failing never stops
//! the run. The only early stop is the checksum database going unreachable.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::backend::ObjectProbe;
use crate::core::checksum::{ChecksumError, ChecksumLookup};
use crate::core::model::{Verdict, VerdictStatus};
use crate::error::{ReconError, EXIT_PARTIAL, EXIT_SUCCESS};

/// Which store a run verifies against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    Storage,
    Checksum,
}

impl fmt::Display for ReconcileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileMode::Storage => write!(f, "storage"),
            ReconcileMode::Checksum => write!(f, "checksum"),
        }
    }
}

impl FromStr for ReconcileMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "storage" | "s3" => Ok(ReconcileMode::Storage),
            "checksum" | "db" => Ok(ReconcileMode::Checksum),
            other => Err(format!("unknown reconcile mode '{}'", other)),
        }
    }
}

/// The collaborator a run checks files against
pub enum Verifier<'a> {
    Storage(&'a dyn ObjectProbe),
    Checksum(&'a mut dyn ChecksumLookup),
}

impl Verifier<'_> {
    pub fn mode(&self) -> ReconcileMode {
        match self {
            Verifier::Storage(_) => ReconcileMode::Storage,
            Verifier::Checksum(_) => ReconcileMode::Checksum,
        }
    }
}

/// Verdict counts for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub total: usize,
    pub exists_in_storage: usize,
    pub missing_in_storage: usize,
    pub checksum_verified: usize,
    pub checksum_absent: usize,
    pub inconclusive: usize,
}

impl ReconcileSummary {
    pub fn record(&mut self, verdict: &Verdict) {
        self.total += 1;
        match verdict.status {
            Some(VerdictStatus::ExistsInStorage) => self.exists_in_storage += 1,
            Some(VerdictStatus::MissingInStorage) => self.missing_in_storage += 1,
            Some(VerdictStatus::ChecksumVerified) => self.checksum_verified += 1,
            Some(VerdictStatus::ChecksumAbsent) => self.checksum_absent += 1,
            None => self.inconclusive += 1,
        }
    }

    /// Files confirmed present or ingested
    pub fn confirmed(&self) -> usize {
        self.exists_in_storage + self.checksum_verified
    }

    /// True when every file was confirmed
    pub fn is_clean(&self) -> bool {
        self.confirmed() == self.total
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_clean() {
            EXIT_SUCCESS
        } else {
            EXIT_PARTIAL
        }
    }
}

pub struct ReconciliationEngine<'a> {
    verifier: Verifier<'a>,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(verifier: Verifier<'a>) -> Self {
        Self { verifier }
    }

    pub fn storage(probe: &'a dyn ObjectProbe) -> Self {
        Self::new(Verifier::Storage(probe))
    }

    pub fn checksum(lookup: &'a mut dyn ChecksumLookup) -> Self {
        Self::new(Verifier::Checksum(lookup))
    }

    pub fn mode(&self) -> ReconcileMode {
        self.verifier.mode()
    }

    /// Classify one file.
    ///
    /// Returns an error only when the checksum database is gone for good.
    pub async fn verify(&mut self, path: &str) -> Result<Verdict, ChecksumError> {
        match &mut self.verifier {
            Verifier::Storage(probe) => Ok(match probe.exists(path).await {
                Ok(true) => Verdict::new(path, VerdictStatus::ExistsInStorage),
                Ok(false) => Verdict::new(path, VerdictStatus::MissingInStorage),
                Err(e) if e.is_not_found() => Verdict::new(path, VerdictStatus::MissingInStorage),
                Err(e) => Verdict::inconclusive(path, e.to_string()),
            }),
            Verifier::Checksum(lookup) => match lookup.get_checksum(path).await {
                Ok(record) => {
                    debug!(path, checksum_type = %record.checksum_type, "Checksum found");
                    Ok(Verdict::new(path, VerdictStatus::ChecksumVerified))
                }
                Err(e) if e.is_fatal() => Err(e),
                Err(e) => Ok(Verdict::new(path, VerdictStatus::ChecksumAbsent)
                    .with_detail(e.to_string())),
            },
        }
    }

    /// Verify every file in order, streaming each verdict to `on_verdict`.
    pub async fn run<F>(
        &mut self,
        files: &[String],
        mut on_verdict: F,
    ) -> Result<ReconcileSummary, ReconError>
    where
        F: FnMut(&Verdict),
    {
        let mut summary = ReconcileSummary::default();
        debug!(mode = %self.mode(), files = files.len(), "Starting reconciliation");

        for path in files {
            let verdict = match self.verify(path).await {
                Ok(verdict) => verdict,
                Err(e) => {
                    let waited = match e {
                        ChecksumError::Unreachable { waited } => waited,
                        _ => Duration::ZERO,
                    };
                    return Err(ReconError::ChecksumStoreUnreachable {
                        waited,
                        processed: summary.total,
                    });
                }
            };

            summary.record(&verdict);
            on_verdict(&verdict);
        }

        Ok(summary)
    }
}
