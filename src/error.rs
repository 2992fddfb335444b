//! Error types for the mail gateway.

use std::time::Duration;

/// Failure of a single protocol session attempt.
///
/// Every variant is absorbed at the orchestrator boundary and turned into
/// fall-through to the next retrieval path; none of them reach the caller
/// of `fetch_latest`. A mailbox confirmed to hold zero messages is NOT an
/// error — see `gateway::FetchOutcome::ConfirmedEmpty`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("session timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },
}

/// Failure of an outbound submission.
///
/// Submission has no fallback path, so these surface verbatim to the
/// immediate caller.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("invalid address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}
