//! Error types for docai-extract

use crate::types::{ExtractionError, SourceId};
use thiserror::Error;

/// Result type for run-level operations
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Run-fatal errors.
///
/// Data-quality problems never surface here; they end up as field status
/// inside the `DocumentResult`.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Threshold or schema misconfigured (aborts before any document)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Reference list missing or malformed
    #[error("Reference list error: {0}")]
    Reference(String),

    /// Collaborator crash, propagated from the document that triggered it
    #[error("{source_id} collaborator failed on document {document_id}: {error}")]
    Extraction {
        document_id: String,
        source_id: SourceId,
        #[source]
        error: ExtractionError,
    },

    /// Malformed or inconsistent capture input
    #[error("Capture error: {0}")]
    Capture(String),

    /// Inconsistent ground-truth labels
    #[error("Ground truth error: {0}")]
    GroundTruth(String),

    /// Result files that would overwrite each other
    #[error("Output error: {0}")]
    Output(String),

    /// I/O error (input captures, output files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
