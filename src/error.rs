//! Tagged error taxonomy shared by every layer of the agent.
//!
//! Each layer wraps the error it receives with a short context string rather
//! than discarding it; `#[source]` keeps the original cause reachable via
//! `std::error::Error::source`.

use thiserror::Error;

/// Error kind shared across the reconcile loop.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Bad MAC, bad slot name, bad config values. Per-row fatal; the next row proceeds.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A row or file that was required to exist did not.
    #[error("not found: {0}")]
    NotFound(String),

    /// Configure/Validate/Rollback failure, or a command exited non-zero.
    #[error("network configuration failed: {0}")]
    Network(String),

    /// Filesystem I/O, DB driver errors, unexpected parse failures.
    #[error("system error: {0}")]
    System(#[source] anyhow::Error),

    /// An external command exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The naming allocator has no free slot left.
    #[error("no free multinic slot available")]
    Exhausted,
}

pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    pub fn system(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        let source = source.into().context(context.into());
        AgentError::System(source)
    }

    pub fn network(context: impl std::fmt::Display) -> Self {
        AgentError::Network(context.to_string())
    }

    pub fn validation(context: impl std::fmt::Display) -> Self {
        AgentError::Validation(context.to_string())
    }

    pub fn not_found(context: impl std::fmt::Display) -> Self {
        AgentError::NotFound(context.to_string())
    }

    pub fn timeout(context: impl std::fmt::Display) -> Self {
        AgentError::Timeout(context.to_string())
    }

    /// True for errors that should count a row as failed but not abort the tick.
    #[must_use]
    pub fn is_row_fatal_only(&self) -> bool {
        !matches!(self, AgentError::System(_))
    }
}

impl From<std::io::Error> for AgentError {
    fn from(e: std::io::Error) -> Self {
        AgentError::system("filesystem I/O", e)
    }
}

impl From<serde_yaml::Error> for AgentError {
    fn from(e: serde_yaml::Error) -> Self {
        AgentError::system("yaml parse", e)
    }
}

impl From<sqlx::Error> for AgentError {
    fn from(e: sqlx::Error) -> Self {
        AgentError::system("database", e)
    }
}
