//! Unified error type for the auditchain pipeline.
//!
//! All fallible operations across the workspace return `AuditResult<T>`.
//! Variants distinguish the error kinds named in the pipeline's error-handling
//! design: per-event failures that are recovered locally (classification,
//! enrichment) versus chain/config invariant violations that abort the run
//! (canonicalisation, state store, signing, configuration).

use thiserror::Error;

/// The unified error type for the auditchain runtime.
#[derive(Debug, Error)]
pub enum AuditError {
    /// An event could not be reduced to canonical bytes (non-finite number,
    /// non-UTF-8 string, unserialisable value). Fatal: the chain's invariants
    /// depend on canonicalisation succeeding for every event.
    #[error("canonicalisation failed: {reason}")]
    Canonicalisation { reason: String },

    /// The chain state file could not be loaded or atomically persisted.
    #[error("state store error: {reason}")]
    StateStore { reason: String },

    /// A signing or verification key could not be loaded or is malformed.
    #[error("key error: {reason}")]
    KeyError { reason: String },

    /// A checkpoint could not be built, signed, or written.
    #[error("checkpoint error: {reason}")]
    Checkpoint { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The sensitivity dictionary, risk policy, or schema catalog failed to load.
    #[error("classification error: {reason}")]
    Classification { reason: String },

    /// Per-event enrichment failed. Recovered locally by the enricher, which
    /// emits an error event rather than propagating this further.
    #[error("enrichment error: {reason}")]
    Enrichment { reason: String },

    /// A raw log line could not be parsed into an event by the registered parser.
    #[error("parse error: {reason}")]
    Parse { reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the auditchain crates.
pub type AuditResult<T> = Result<T, AuditError>;
