//! Error types surfaced at the query boundary.
//!
//! Provider faults (embedding, generation, index I/O) are never masked:
//! they are converted into these variants at the orchestrator boundary and
//! handed to the caller verbatim. There is no automatic retry at this layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    /// The agent identifier is outside the closed {writer, code, reviewer} set.
    #[error("unknown agent: '{0}' (expected writer, code, or reviewer)")]
    UnknownAgent(String),

    /// No persisted vectors exist. Recoverable by running `kba ingest`.
    #[error("vector index not found or empty. Run: kba ingest")]
    IndexNotReady,

    /// The chat-generation capability failed; the message is surfaced verbatim.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Embedding or index faults that reach the caller undisguised.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
