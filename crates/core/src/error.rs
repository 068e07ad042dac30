//! Error types for Loomnet operations.
//!
//! One taxonomy shared across the workspace: lookup failures, route
//! selection outcomes, argument validation, capacity and concurrency
//! conditions, plus conversions from the storage and I/O layers.

use thiserror::Error;

/// Errors that can occur across the routing and trust subsystem.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown identity, node, route, report, or other entity
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up
        kind: &'static str,
        /// The identifier that failed to resolve
        id: String,
    },

    /// No route candidate survived filtering
    #[error("no route available between {src} and {dest}")]
    NoRouteAvailable {
        /// Source identity handle
        src: String,
        /// Destination identity handle
        dest: String,
    },

    /// Malformed or out-of-range input
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Capacity shortage; callers degrade to best-effort candidates
    #[error("capacity exhausted: {0}")]
    CapacityExhausted(String),

    /// An optimistic precondition was invalidated by a concurrent update
    #[error("stale write: {0}")]
    StaleWrite(String),

    /// Database errors
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] with the given entity kind.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for [`Error::InvalidArgument`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

/// Result type for Loomnet operations.
pub type Result<T> = std::result::Result<T, Error>;
