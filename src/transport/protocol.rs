//! Transport protocol abstraction trait.
//!
//! This module defines the `TransportProtocol` trait that separates the
//! session state machine from the wire. [`WebSocketTransport`] is the
//! production implementation.
//!
//! [`WebSocketTransport`]: super::WebSocketTransport

use crate::connection::DaemonServer;
use crate::error::{ConnectionError, TransportError};
use async_trait::async_trait;

use super::tls::TlsPolicy;

/// Transport protocol trait for daemon communication.
#[async_trait]
pub trait TransportProtocol: Send + Sync {
    /// Open the connection and perform the authenticated handshake.
    ///
    /// # Arguments
    ///
    /// * `profile` - Target, credentials, timeout, frame size and persistence
    /// * `policy` - Certificate checks for this handshake
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the handshake fails. Nothing stays open
    /// on failure.
    async fn connect(
        &mut self,
        profile: &DaemonServer,
        policy: TlsPolicy,
    ) -> Result<(), ConnectionError>;

    /// Send one complete text payload.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if not connected or the write fails.
    async fn send_text(&mut self, message: &str) -> Result<(), TransportError>;

    /// Wait for the next text payload from the daemon.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` on timeout, peer close or read failure.
    async fn receive_text(&mut self) -> Result<String, TransportError>;

    /// Perform the closing handshake and release the connection.
    ///
    /// Closing a transport that is not connected is a no-op.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Check if the connection is still active.
    fn is_connected(&self) -> bool;
}
