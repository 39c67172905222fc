//! Session lifecycle for a Mapepire daemon connection.
//!
//! A [`SessionConnector`] owns at most one live transport and moves through
//! `Idle -> Connecting -> Connected -> Closed`. A failed handshake returns to
//! `Idle`; a closed session can be connected again, which opens a fresh
//! transport. Exactly one response is consumed per request and requests are
//! never pipelined, so `single_send_and_receive` takes `&mut self`.

use crate::connection::params::{DaemonServer, ProfileView};
use crate::error::{ConnectionError, TransportError};
use crate::transport::{TlsPolicy, TransportProtocol, WebSocketTransport};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Never connected, or the last handshake failed
    Idle,
    /// Handshake in progress
    Connecting,
    /// Handshake completed; requests may be sent
    Connected,
    /// Closed by the caller or the peer
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session engine driving a [`TransportProtocol`] with a [`DaemonServer`] profile.
pub struct SessionConnector<T = WebSocketTransport> {
    transport: T,
    profile: Option<Arc<DaemonServer>>,
    state: SessionState,
    /// Policy the live transport was negotiated under
    active_policy: Option<TlsPolicy>,
}

impl SessionConnector<WebSocketTransport> {
    /// Create an idle connector using the WebSocket transport.
    pub fn new() -> Self {
        Self::with_transport(WebSocketTransport::new())
    }

    /// Create an idle connector bound to `profile`; see [`connect_with_profile`].
    ///
    /// [`connect_with_profile`]: SessionConnector::connect_with_profile
    pub fn with_profile(profile: Arc<DaemonServer>) -> Self {
        let mut connector = Self::new();
        connector.profile = Some(profile);
        connector
    }
}

impl Default for SessionConnector<WebSocketTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TransportProtocol> SessionConnector<T> {
    /// Create an idle connector over a custom transport.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            profile: None,
            state: SessionState::Idle,
            active_policy: None,
        }
    }

    /// Get current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected && self.transport.is_connected()
    }

    /// Profile of the current or most recent session.
    pub fn profile(&self) -> Option<&DaemonServer> {
        self.profile.as_deref()
    }

    /// Certificate policy the live transport was opened with.
    pub fn tls_policy(&self) -> Option<TlsPolicy> {
        self.active_policy
    }

    /// Open an authenticated session to the daemon described by `profile`,
    /// checking its certificate as the profile's TLS flags say.
    ///
    /// # Errors
    ///
    /// `ConnectionError::AlreadyConnected` if a session is live; otherwise
    /// any handshake failure, after which the connector is `Idle` again.
    pub async fn connect(&mut self, profile: Arc<DaemonServer>) -> Result<(), ConnectionError> {
        let policy = TlsPolicy::from_profile(&profile);
        self.connect_with_policy(profile, policy).await
    }

    /// Like [`connect`](SessionConnector::connect), but checks the daemon
    /// certificate under `policy` instead of the profile's flags.
    pub async fn connect_with_policy(
        &mut self,
        profile: Arc<DaemonServer>,
        policy: TlsPolicy,
    ) -> Result<(), ConnectionError> {
        if self.is_connected() {
            return Err(ConnectionError::AlreadyConnected);
        }

        self.profile = Some(Arc::clone(&profile));
        self.handshake(&profile, policy).await
    }

    /// Connect using the profile given to [`with_profile`](SessionConnector::with_profile)
    /// or to an earlier [`connect`](SessionConnector::connect).
    pub async fn connect_with_profile(&mut self) -> Result<(), ConnectionError> {
        let profile = self.profile.clone().ok_or_else(|| {
            ConnectionError::InvalidRequest("no daemon profile bound to this session".to_string())
        })?;
        self.connect(profile).await
    }

    /// Send one text payload and return the daemon's next text payload.
    ///
    /// `tls_override` is the certificate policy this call requires. The
    /// certificate was checked once, when the session was opened, and the
    /// live transport is never replaced here: an override equal to that
    /// policy is accepted, any other is refused before anything is sent, and
    /// `None` accepts whatever policy the session was opened with. Use [`connect_with_policy`](SessionConnector::connect_with_policy) to
    /// open a session under a different policy.
    ///
    /// # Errors
    ///
    /// - `TransportError::NotConnected` before `connect` or after `close`
    /// - `TransportError::PolicyConflict` if `tls_override` differs from the
    ///   session's policy; the session stays usable
    /// - send, receive, timeout or peer-close failures, after which the
    ///   session is `Closed` and must be reconnected
    pub async fn single_send_and_receive(
        &mut self,
        message: &str,
        tls_override: Option<TlsPolicy>,
    ) -> Result<String, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        if let (Some(requested), Some(negotiated)) = (tls_override, self.active_policy) {
            if requested != negotiated {
                return Err(TransportError::PolicyConflict {
                    negotiated,
                    requested,
                });
            }
        }

        match self.exchange(message).await {
            Ok(response) => Ok(response),
            Err(e) => {
                if e.is_fatal() || !self.transport.is_connected() {
                    self.abandon(&e).await;
                }
                Err(e)
            }
        }
    }

    /// Perform the closing handshake. Closing an idle or closed session is a no-op.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        if self.state != SessionState::Connected {
            return Ok(());
        }

        self.state = SessionState::Closed;
        self.active_policy = None;
        self.transport.close().await
    }

    async fn exchange(&mut self, message: &str) -> Result<String, TransportError> {
        self.transport.send_text(message).await?;
        self.transport.receive_text().await
    }

    /// Close a session whose stream can no longer be trusted to pair
    /// requests with responses.
    async fn abandon(&mut self, cause: &TransportError) {
        info!(error = %cause, "Exchange failed, closing session");
        self.state = SessionState::Closed;
        self.active_policy = None;
        if let Err(e) = self.transport.close().await {
            debug!(error = %e, "Transport close after failed exchange");
        }
    }

    async fn handshake(
        &mut self,
        profile: &DaemonServer,
        policy: TlsPolicy,
    ) -> Result<(), ConnectionError> {
        self.state = SessionState::Connecting;
        debug!(uri = %profile.uri(), %policy, "Connecting session");

        match self.transport.connect(profile, policy).await {
            Ok(()) => {
                self.state = SessionState::Connected;
                self.active_policy = Some(policy);
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Idle;
                self.active_policy = None;
                Err(e)
            }
        }
    }
}

impl<T> fmt::Debug for SessionConnector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConnector")
            .field("profile", &self.profile)
            .field("state", &self.state)
            .field("active_policy", &self.active_policy)
            .finish()
    }
}

/// Renders the bound profile (password redacted) and the transport state.
impl<T> fmt::Display for SessionConnector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.profile.as_deref() {
            Some(profile) => {
                let view = ProfileView {
                    title: "SessionConnector",
                    ..profile.view()
                };
                fmt::Display::fmt(&view, f)?;
                writeln!(f)?;
            }
            None => writeln!(f, "SessionConnector")?,
        }
        write!(f, "transport: {}", self.state)
    }
}
