//! Error types for noteguard-audit
//!
//! Failure taxonomy: transient network errors are retried then downgraded to
//! skipped-item warnings; board "complexity/limit" responses abandon the
//! current batch; malformed data degrades individual fields; malformed
//! judgment responses are discarded without touching other passes.

use thiserror::Error;

/// Audit pipeline error type
#[derive(Debug, Error)]
pub enum AuditError {
    /// Transport-level failure (after retries exhausted)
    #[error("Network error: {0}")]
    Network(String),

    /// External API returned an unexpected error payload
    #[error("API error: {0}")]
    Api(String),

    /// Board signalled a rate/complexity limit; the current batch is
    /// abandoned and partial results already merged are kept
    #[error("Batch abandoned: {0}")]
    BatchAbandoned(String),

    /// Failed to parse a response or record field
    #[error("Parse error: {0}")]
    Parse(String),

    /// Judgment-service response missing required keys or out-of-range
    /// indices; the response is discarded
    #[error("Malformed judgment response: {0}")]
    MalformedJudgment(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// noteguard-common error
    #[error("Common error: {0}")]
    Common(#[from] noteguard_common::Error),
}

/// Result type for pipeline operations
pub type AuditResult<T> = Result<T, AuditError>;
