/*!
 * Reconciliation core: graph traversal, per-file verification and the
 * checksum database resilience policy
 */

pub mod checksum;
pub mod dedup;
pub mod engine;
pub mod model;
pub mod resolver;

pub use checksum::{ChecksumError, ChecksumLookup, ChecksumStore, ConnectionState};
pub use dedup::{stable_dedup, stable_dedup_by};
pub use engine::{ReconcileMode, ReconcileSummary, ReconciliationEngine, Verifier};
pub use model::{
    ChecksumRecord, FileRef, Folder, MetadataObject, SubmissionCollection, User, Verdict,
    VerdictStatus,
};
pub use resolver::{
    extract_accessions_and_schemas, GraphResolver, Resolution, ResolveError, Resolved, Root,
    ANALYSIS_SCHEMA,
};
