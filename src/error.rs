//! Error types and handling for paged streams
//!
//! A stream carries at most one terminal failure. This module defines the
//! kinds of failure a consumer can observe and the errors a data source
//! reports back to the paging loop.

use std::any::Any;
use thiserror::Error;

/// Errors reported by a [`DataSource`](crate::source::DataSource) or its session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Could not open a session against the data source
    #[error("connection error: {0}")]
    Connection(String),
    /// A page fetch failed to execute
    #[error("execution error: {0}")]
    Execution(String),
    /// Commit or rollback of the session failed
    #[error("transaction error: {0}")]
    Transaction(String),
}

/// Terminal failure of a stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The data source failed; propagated verbatim
    #[error("data source failure: {0}")]
    Source(#[from] SourceError),
    /// The cancellation token fired while the producer was handing off a value
    #[error("stream cancelled")]
    Cancelled,
    /// Raised by a consumer action or a mapper
    #[error("consumer error: {0}")]
    Consumer(String),
    /// The downstream consumer went away before the producer finished
    #[error("stream consumer disconnected")]
    Disconnected,
    /// The producer panicked; carries the panic message
    #[error("stream producer panicked: {0}")]
    Panicked(String),
}

impl StreamError {
    /// Shorthand for a [`StreamError::Consumer`] failure
    pub fn consumer(msg: impl Into<String>) -> Self {
        StreamError::Consumer(msg.into())
    }

    /// True for [`StreamError::Cancelled`]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamError::Cancelled)
    }

    /// True when the failure originated in the data source
    pub fn is_source(&self) -> bool {
        matches!(self, StreamError::Source(_))
    }

    /// Turn a payload caught from an unwinding producer into a failure
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = if let Some(msg) = payload.downcast_ref::<&str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "non-string panic payload".to_string()
        };
        StreamError::Panicked(msg)
    }
}

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Result type for data source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Invalid [`PagingConfig`](crate::config::PagingConfig)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("page_size must be at least 1")]
    ZeroPageSize,
    #[error("queue_capacity must be at least 1")]
    ZeroQueueCapacity,
}
