//! Error types for mapepire-rs.
//!
//! Errors are split by the phase in which they occur: building a profile,
//! establishing a session, and exchanging messages on a live session.

use crate::transport::TlsPolicy;
use std::fmt;
use thiserror::Error;

/// Top-level error type encompassing all possible errors.
#[derive(Error, Debug)]
pub enum MapepireError {
    /// Invalid or missing profile values
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Handshake-time errors
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Errors on an established (or expected) session
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors raised while building a [`DaemonServer`](crate::DaemonServer).
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// A required parameter was not supplied
    #[error("Missing required parameter '{parameter}'")]
    MissingParameter { parameter: String },

    /// A parameter was supplied but is not acceptable
    #[error("Invalid parameter '{parameter}': {message}")]
    InvalidParameter { parameter: String, message: String },

    /// The `.env` file exists but could not be read
    #[error("Failed to read environment file: {0}")]
    EnvFile(String),
}

/// Errors raised while establishing a session.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// DNS or TCP failure
    #[error("Failed to connect to {host}:{port}: {message}")]
    ConnectionFailed {
        host: String,
        port: u16,
        message: String,
    },

    /// The daemon rejected the Basic-Auth credentials
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The daemon answered the upgrade request with a non-101 status
    #[error("WebSocket upgrade rejected with HTTP status {status}")]
    UpgradeRejected { status: u16 },

    /// TLS/SSL error
    #[error("TLS error: {0}")]
    TlsError(String),

    /// Handshake did not complete in time
    #[error("Connection timeout after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The handshake request could not be built from the profile
    #[error("Invalid handshake request: {0}")]
    InvalidRequest(String),

    /// `connect` was called on a session that is already connected
    #[error("Session is already connected")]
    AlreadyConnected,
}

/// Errors raised by the request/response exchange.
#[derive(Error, Debug)]
pub enum TransportError {
    /// No live transport
    #[error("not connected")]
    NotConnected,

    /// Message send error
    #[error("Failed to send message: {0}")]
    SendError(String),

    /// Message receive error
    #[error("Failed to receive message: {0}")]
    ReceiveError(String),

    /// The peer closed the connection before a response arrived
    #[error("Connection closed by peer: {0}")]
    ConnectionClosed(String),

    /// No response within the profile timeout
    #[error("No response after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Response payload is not valid text
    #[error("Invalid response payload: {0}")]
    InvalidPayload(String),

    /// A per-call TLS policy that the live session was not opened with
    #[error("Session was opened with TLS policy ({negotiated}), not ({requested}); reconnect to change it")]
    PolicyConflict {
        negotiated: TlsPolicy,
        requested: TlsPolicy,
    },
}

/// Coarse classification of a [`MapepireError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Transport,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "CONFIGURATION"),
            ErrorKind::Connection => write!(f, "CONNECTION"),
            ErrorKind::Transport => write!(f, "TRANSPORT"),
        }
    }
}

impl MapepireError {
    /// Which phase the error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MapepireError::Configuration(_) => ErrorKind::Configuration,
            MapepireError::Connection(_) => ErrorKind::Connection,
            MapepireError::Transport(_) => ErrorKind::Transport,
        }
    }
}

impl ConfigurationError {
    pub(crate) fn invalid(parameter: &str, message: impl Into<String>) -> Self {
        ConfigurationError::InvalidParameter {
            parameter: parameter.to_string(),
            message: message.into(),
        }
    }
}

impl TransportError {
    /// Whether the transport can no longer be used and the caller should reconnect.
    ///
    /// A timed-out or half-written exchange leaves the stream out of step with
    /// the daemon, so the session is dropped. Errors raised before anything was
    /// sent, or after a whole response was read, leave it usable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            TransportError::NotConnected
                | TransportError::InvalidPayload(_)
                | TransportError::PolicyConflict { .. }
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                TransportError::ConnectionClosed(err.to_string())
            }
            WsError::Utf8 => TransportError::InvalidPayload(err.to_string()),
            other => TransportError::ReceiveError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::ConnectionFailed {
            host: "localhost".to_string(),
            port: 8076,
            message: "Connection refused".to_string(),
        };
        assert!(err.to_string().contains("localhost"));
        assert!(err.to_string().contains("8076"));
    }

    #[test]
    fn test_configuration_error_display() {
        let err = ConfigurationError::MissingParameter {
            parameter: "user".to_string(),
        };
        assert!(err.to_string().contains("'user'"));

        let err = ConfigurationError::invalid("port", "Port must be greater than 0");
        assert!(err.to_string().contains("port"));
        assert!(err.to_string().contains("greater than 0"));
    }

    #[test]
    fn test_not_connected_message() {
        assert_eq!(TransportError::NotConnected.to_string(), "not connected");
    }

    #[test]
    fn test_error_kind_mapping() {
        let err: MapepireError = ConfigurationError::EnvFile("bad line".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err: MapepireError = ConnectionError::UpgradeRejected { status: 404 }.into();
        assert_eq!(err.kind(), ErrorKind::Connection);

        let err: MapepireError = TransportError::Timeout { timeout_secs: 60 }.into();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.kind().to_string(), "TRANSPORT");
    }

    #[test]
    fn test_fatal_errors_end_the_session() {
        assert!(TransportError::Timeout { timeout_secs: 1 }.is_fatal());
        assert!(TransportError::SendError("broken pipe".to_string()).is_fatal());
        assert!(TransportError::ReceiveError("reset".to_string()).is_fatal());
        assert!(TransportError::ConnectionClosed("1000".to_string()).is_fatal());

        assert!(!TransportError::NotConnected.is_fatal());
        assert!(!TransportError::InvalidPayload("utf-8".to_string()).is_fatal());
    }

    #[test]
    fn test_policy_conflict_names_both_policies() {
        let err = TransportError::PolicyConflict {
            negotiated: TlsPolicy::new(false, true),
            requested: TlsPolicy::new(true, true),
        };
        let message = err.to_string();
        assert!(message.contains("verify_peer=false, verify_peer_name=true"));
        assert!(message.contains("verify_peer=true, verify_peer_name=true"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_tungstenite_closed_maps_to_connection_closed() {
        let err: TransportError = tokio_tungstenite::tungstenite::Error::ConnectionClosed.into();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
    }
}
