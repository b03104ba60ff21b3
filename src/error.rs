//! Error types for the orthology inference engine.
//!
//! All errors are strongly typed using thiserror. Per-reaction and per-entity
//! inference failures are *not* errors: they are expected outcomes modeled as
//! enums in the inference modules and recovered locally. Only setup faults,
//! store faults, and report I/O reach this taxonomy.

use std::path::PathBuf;

use thiserror::Error;

use crate::entity::DbId;

/// Fatal setup failures. Any of these aborts the whole species run:
/// there is nothing meaningful to continue with.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Species config is missing required field '{field}'")]
    MissingSpeciesField { field: String },

    #[error("No reference database configured for species '{species}'")]
    MissingReferenceDatabase { species: String },

    #[error("Failed to read homology file {path}: {source}")]
    HomologyFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed homology record at {path}:{line}: {reason}")]
    MalformedHomologyRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Failed to read species config {path}: {source}")]
    SpeciesConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse species config {path}: {source}")]
    SpeciesConfigInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by the object store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No instance with this id.
    #[error("Instance not found: {0}")]
    NotFound(DbId),

    /// The instance exists but is not of the expected class.
    #[error("Instance {id} is a {actual}, expected {expected}")]
    ClassMismatch {
        id: DbId,
        expected: &'static str,
        actual: &'static str,
    },

    /// Backend fault (poisoned lock, broken index).
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Report file I/O failures.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error type for the inference engine.
#[derive(Debug, Error)]
pub enum OrthoError {
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

impl OrthoError {
    /// Returns true if this error was detectable before any inference work
    /// started (missing config, unreadable homology tables).
    #[must_use]
    pub const fn is_setup(&self) -> bool {
        matches!(self, Self::Setup(_))
    }
}

/// Result type alias for engine operations.
pub type OrthoResult<T> = Result<T, OrthoError>;
