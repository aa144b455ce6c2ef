//! Error taxonomy for the cognitive core (spec §7).
//!
//! Validation and logical errors are returned to callers; transient I/O and
//! storage errors are logged and the loop continues; fatal errors are not
//! represented as a variant here at all — they abort the process and rely on
//! a supervisor restart.

use thiserror::Error;

/// Top-level error surfaced by the external-interface layer (§6).
#[derive(Debug, Error)]
pub enum SynapseError {
    #[error("budget must be non-negative, got {0}")]
    InvalidBudget(f64),

    #[error("requestId '{0}' already exists")]
    DuplicateId(String),

    #[error("unknown app '{0}'")]
    UnknownApp(String),

    #[error("app '{0}' is already installed")]
    AlreadyInstalled(String),

    #[error("conversation '{0}' not found")]
    ConversationNotFound(String),

    #[error("app '{0}' not found")]
    AppNotFound(String),

    #[error("sub-agent request '{0}' not found")]
    RequestNotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("http app requires an endpoint")]
    MissingEndpoint,

    #[error("cannot route a message to \"loop\"")]
    RouteToLoopForbidden,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Transport/network hiccups worth a bounded retry (spec §4.D, §7) —
    /// MCP transport negotiation, tool round-trips, LLM timeouts.
    #[error("transient error: {0}")]
    Transient(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SynapseError>;

impl SynapseError {
    /// Whether this error kind is safe to retry after a short backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, SynapseError::Storage(_) | SynapseError::Transient(_))
    }
}
