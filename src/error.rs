//! Error types for the search engine.

use thiserror::Error;

/// Errors that can occur while answering a top-k query.
#[derive(Error, Debug)]
pub enum TopkError {
    /// The storage adapter failed to read a posting list or a set's tokens.
    /// Fatal for the current query; other queries may still proceed.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// An internal invariant of the engine was violated. Only raised behind
    /// `debug_assertions` — a release build trusts the invariants hold and
    /// skips the check for hot-path performance.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type Result<T> = std::result::Result<T, TopkError>;
