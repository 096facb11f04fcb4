//! Error types for Actchain.
//!
//! All errors in Actchain are represented by the `ActchainError` enum,
//! which provides specific variants for each failure category of an activation.

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Actchain operations.
///
/// Each variant represents a specific category of error that can occur
/// while decoding chains, walking them, or talking to storage.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum ActchainError {
    /// Engine-level errors (startup, shutdown, configuration).
    #[error("{0}")]
    Engine(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON encoding, header values, etc.).
    #[error("{0}")]
    Convert(String),

    /// Malformed or unknown action / trigger payloads.
    #[error("{0}")]
    Decode(String),

    /// Malformed condition, type mismatch or unsupported operator.
    #[error("{0}")]
    Evaluation(String),

    /// Network or process failures while executing a step.
    #[error("{0}")]
    Transport(String),

    /// LLM provider failures.
    #[error("{0}")]
    Provider(String),

    /// Script execution errors (interpreters and the embedded engine).
    #[error("{0}")]
    Script(String),

    /// Runtime execution errors.
    #[error("{0}")]
    Runtime(String),

    /// Storage operation errors.
    #[error("{0}")]
    Store(String),

    /// Activation lifecycle errors.
    #[error("{0}")]
    Activation(String),

    /// Chain definition errors.
    #[error("{0}")]
    Chain(String),

    /// Action execution errors.
    #[error("{0}")]
    Action(String),

    /// Trigger execution errors.
    #[error("{0}")]
    Trigger(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),
}

impl ActchainError {
    /// Wraps the error with the stage that produced it.
    pub fn stage(
        self,
        stage: &str,
    ) -> Self {
        ActchainError::Action(format!("failed to execute {}: {}", stage, self))
    }
}

impl From<ActchainError> for String {
    fn from(val: ActchainError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for ActchainError {
    fn from(error: std::io::Error) -> Self {
        ActchainError::IoError(error.to_string())
    }
}

impl From<ActchainError> for std::io::Error {
    fn from(val: ActchainError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for ActchainError {
    fn from(_: FromUtf8Error) -> Self {
        ActchainError::Runtime("Error with utf-8 string convert".to_string())
    }
}

impl From<serde_json::Error> for ActchainError {
    fn from(error: serde_json::Error) -> Self {
        ActchainError::Convert(error.to_string())
    }
}

impl From<reqwest::Error> for ActchainError {
    fn from(error: reqwest::Error) -> Self {
        ActchainError::Transport(error.to_string())
    }
}

impl From<toml::de::Error> for ActchainError {
    fn from(error: toml::de::Error) -> Self {
        ActchainError::Config(error.to_string())
    }
}

impl From<jsonschema::ValidationError<'_>> for ActchainError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        ActchainError::Decode(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::ActchainError;

    #[test]
    fn test_stage_wraps_cause() {
        let err = ActchainError::Transport("connection refused".to_string()).stage("http action 'fetch'");
        assert_eq!(err.to_string(), "failed to execute http action 'fetch': connection refused");
    }

    #[test]
    fn test_provider_message_is_verbatim() {
        let err = ActchainError::Provider("all models failed".to_string());
        assert_eq!(err.to_string(), "all models failed");
    }
}
