//! Error types for igniter
//!
//! This module defines all error types used throughout the workspace.
//! None of them escape the event handlers of the controller: item-level
//! failures are logged and reported as [`ControllerEvent`]s instead.
//!
//! [`ControllerEvent`]: crate::controller::ControllerEvent

use thiserror::Error;

/// Result type alias for igniter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for igniter
#[derive(Error, Debug)]
pub enum Error {
    /// An event payload did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Network or HTTP failure while talking to the DNS provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// Well-formed provider response that reported a failure
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Node source errors
    #[error("Node source error: {0}")]
    NodeSource(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a node source error
    pub fn node_source(msg: impl Into<String>) -> Self {
        Self::NodeSource(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error came from the network layer rather than from the
    /// provider's answer
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
