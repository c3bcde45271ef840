/*!
 * Reconcile - cross-store reconciliation for submission archives
 *
 * Resolves the files that belong to a user, folder or accession from the
 * submission metadata store, then checks each one against:
 * - object storage (does the uploaded object exist)
 * - the ingestion database (was a checksum recorded for it)
 *
 * Checksum lookups retry on query failure and heal lost connections inline.
 * A checksum database that stays down past its reconnect budget ends the run.
 */

pub mod backend;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod output;

// Re-export commonly used types
pub use config::{ChecksumPolicy, ReconConfig};
pub use core::{
    ChecksumStore, GraphResolver, ReconcileMode, ReconcileSummary, ReconciliationEngine,
    Resolution, Root, Verdict, VerdictStatus,
};
pub use error::{ReconError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
