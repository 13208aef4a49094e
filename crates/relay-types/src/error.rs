//! Error types shared by consumers, producers and the relay engine.

use thiserror::Error;

/// Errors returned by Consumer/Producer implementations.
///
/// `Cancelled` is a control signal rather than a failure: the relay engine
/// treats it as the request to stop, never as a transient broker problem.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Client already closed")]
    Closed,

    #[error("Consumer error: {0}")]
    Consumer(String),

    #[error("Producer error: {0}")]
    Producer(String),

    #[error("Commit error: {0}")]
    Commit(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether this error was caused by the cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, Error>;
