//! Error types for replbridge.
//!
//! Transport and protocol errors are fatal for the call chain that hit them and
//! are never recovered silently. Guest-side failures surface as
//! [`BridgeError::RemoteEvaluation`] carrying the guest's own diagnostic text.

use crate::engine::EngineState;
use thiserror::Error;

/// Main error type for replbridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    // Process and pipe errors
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Framing errors
    #[error("Protocol desynchronized: reply key {key:?} is not outstanding")]
    ProtocolDesync { key: String },

    // Guest-side errors
    #[error("Guest evaluation of `{expression}` failed:\n    {}", indent(.diagnostic))]
    RemoteEvaluation {
        expression: String,
        diagnostic: String,
    },

    #[error("{guest} cannot convert {what}")]
    UnsupportedConversion { guest: String, what: String },

    #[error("Could not decode guest output for `{expression}`: {message}")]
    Decode { expression: String, message: String },

    // Lifecycle errors
    #[error("Engine is not ready (state: {state:?})")]
    NotReady { state: EngineState },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for replbridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

fn indent(text: &str) -> String {
    text.trim_end().replace('\n', "\n    ")
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Transport {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl BridgeError {
    /// Create a transport error with context for an I/O failure.
    pub fn transport(context: impl Into<String>, err: std::io::Error) -> Self {
        BridgeError::Transport {
            message: format!("{}: {}", context.into(), err),
            source: Some(err),
        }
    }

    /// Create a transport error that has no underlying I/O cause.
    pub fn transport_msg(message: impl Into<String>) -> Self {
        BridgeError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Create a remote evaluation error from guest diagnostic text.
    pub fn remote(expression: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        BridgeError::RemoteEvaluation {
            expression: expression.into(),
            diagnostic: diagnostic.into(),
        }
    }

    /// Create a decode error for guest output that did not parse.
    pub fn decode(expression: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::Decode {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported conversion error.
    pub fn unsupported(guest: impl Into<String>, what: impl Into<String>) -> Self {
        BridgeError::UnsupportedConversion {
            guest: guest.into(),
            what: what.into(),
        }
    }

    /// Whether the engine's stream position can no longer be trusted.
    ///
    /// After a fatal error the only sensible operation left is `close()`.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::Transport { .. } | BridgeError::ProtocolDesync { .. }
        )
    }

    /// The guest's diagnostic text, if this is a remote evaluation error.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            BridgeError::RemoteEvaluation { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::ProtocolDesync {
            key: "[1] \"stamp\"".into(),
        };
        assert_eq!(
            err.to_string(),
            "Protocol desynchronized: reply key \"[1] \\\"stamp\\\"\" is not outstanding"
        );
    }

    #[test]
    fn test_remote_error_indents_multiline_diagnostic() {
        let err = BridgeError::remote("ho", "Error in try(ho) :\nobject 'ho' not found\n");
        assert_eq!(
            err.to_string(),
            "Guest evaluation of `ho` failed:\n    Error in try(ho) :\n    object 'ho' not found"
        );
        assert_eq!(
            err.diagnostic(),
            Some("Error in try(ho) :\nobject 'ho' not found\n")
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(BridgeError::transport_msg("guest closed its output").is_fatal());
        assert!(BridgeError::ProtocolDesync { key: "k".into() }.is_fatal());
        assert!(!BridgeError::remote("x", "boom").is_fatal());
        assert!(!BridgeError::NotReady {
            state: EngineState::Closed
        }
        .is_fatal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: BridgeError = io.into();
        assert!(matches!(err, BridgeError::Transport { source: Some(_), .. }));
    }
}
