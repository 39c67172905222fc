//! Daemon connection profile and its builder.
//!
//! A [`DaemonServer`] holds everything needed to reach and authenticate
//! against a Mapepire daemon. It is validated once at construction and is
//! read-only afterwards, so the URI and auth token derived from it cannot
//! drift from what was used for the handshake.

use crate::connection::auth::Credentials;
use crate::error::ConfigurationError;
use std::fmt;
use std::time::Duration;

/// Default daemon host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default daemon port.
pub const DEFAULT_PORT: u16 = 8076;
/// Self-signed certificates are rejected unless asked otherwise.
pub const DEFAULT_IGNORE_UNAUTHORIZED: bool = false;
/// Certificate subject must match the host unless asked otherwise.
pub const DEFAULT_VERIFY_HOST_NAME: bool = true;
/// Default handshake and read timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// Default outbound WebSocket frame size, in bytes.
pub const DEFAULT_FRAME_SIZE: usize = 4096;
/// TCP keep-alive is off by default.
pub const DEFAULT_PERSISTENT: bool = false;

const HIDDEN_PASSWORD: &str = "(hidden)";
const NO_PASSWORD: &str = "(no password was provided)";

/// Connection profile for a Mapepire daemon.
#[derive(Clone)]
pub struct DaemonServer {
    host: String,
    port: u16,
    credentials: Credentials,
    ignore_unauthorized: bool,
    verify_host_name: bool,
    timeout_secs: u64,
    frame_size: usize,
    persistent: bool,
}

impl DaemonServer {
    /// Create a new DaemonServerBuilder.
    pub fn builder() -> DaemonServerBuilder {
        DaemonServerBuilder::new()
    }

    /// Profile for `localhost:8076` with every other field defaulted.
    pub fn new(user: &str, password: &str) -> Result<Self, ConfigurationError> {
        DaemonServerBuilder::new().user(user).password(password).build()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn user(&self) -> &str {
        self.credentials.user()
    }

    /// Get the password (for internal use only, never logged).
    pub(crate) fn password(&self) -> &str {
        self.credentials.password()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Accept a certificate that fails chain validation.
    pub fn ignore_unauthorized(&self) -> bool {
        self.ignore_unauthorized
    }

    /// Require the certificate subject to match [`host`](Self::host).
    pub fn verify_host_name(&self) -> bool {
        self.verify_host_name
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Largest outbound frame; longer payloads are sent as continuation frames.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Keep the TCP connection alive between requests.
    pub fn persistent(&self) -> bool {
        self.persistent
    }

    /// WebSocket endpoint of the daemon, `wss://{host}:{port}/db/`.
    pub fn uri(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            // IPv6 literal
            format!("wss://[{}]:{}/db/", self.host, self.port)
        } else {
            format!("wss://{}:{}/db/", self.host, self.port)
        }
    }

    /// Base64 token for the `Authorization: Basic` header.
    pub fn auth_token(&self) -> String {
        self.credentials.basic_token()
    }

    pub(crate) fn view(&self) -> ProfileView<'_> {
        ProfileView {
            title: "DaemonServer",
            host: &self.host,
            port: self.port,
            user: self.user(),
            password: self.password(),
            ignore_unauthorized: self.ignore_unauthorized,
            verify_host_name: self.verify_host_name,
            timeout_secs: self.timeout_secs,
            frame_size: self.frame_size,
            persistent: self.persistent,
        }
    }
}

// Prevent password from being displayed in debug or display output
impl fmt::Debug for DaemonServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonServer")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user())
            .field("password", &redact_password(self.password()))
            .field("ignore_unauthorized", &self.ignore_unauthorized)
            .field("verify_host_name", &self.verify_host_name)
            .field("timeout_secs", &self.timeout_secs)
            .field("frame_size", &self.frame_size)
            .field("persistent", &self.persistent)
            .finish()
    }
}

impl fmt::Display for DaemonServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.view(), f)
    }
}

/// Redaction marker shown in place of a password.
pub fn redact_password(password: &str) -> &'static str {
    if password.is_empty() {
        NO_PASSWORD
    } else {
        HIDDEN_PASSWORD
    }
}

/// Line-per-field rendering shared by the profile and its builder.
pub(crate) struct ProfileView<'a> {
    pub(crate) title: &'a str,
    pub(crate) host: &'a str,
    pub(crate) port: u16,
    pub(crate) user: &'a str,
    pub(crate) password: &'a str,
    pub(crate) ignore_unauthorized: bool,
    pub(crate) verify_host_name: bool,
    pub(crate) timeout_secs: u64,
    pub(crate) frame_size: usize,
    pub(crate) persistent: bool,
}

impl fmt::Display for ProfileView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "host: {}", self.host)?;
        writeln!(f, "port: {}", self.port)?;
        writeln!(f, "user: {}", self.user)?;
        writeln!(f, "password: {}", redact_password(self.password))?;
        writeln!(f, "ignore_unauthorized: {}", self.ignore_unauthorized)?;
        writeln!(f, "verify_host_name: {}", self.verify_host_name)?;
        writeln!(f, "timeout: {}", self.timeout_secs)?;
        writeln!(f, "frame_size: {}", self.frame_size)?;
        write!(f, "persistent: {}", self.persistent)
    }
}

/// Builder for constructing a [`DaemonServer`] with validation.
#[derive(Clone, Default)]
pub struct DaemonServerBuilder {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    ignore_unauthorized: Option<bool>,
    verify_host_name: Option<bool>,
    timeout_secs: Option<u64>,
    frame_size: Option<usize>,
    persistent: Option<bool>,
}

impl DaemonServerBuilder {
    /// Create a new builder; unset fields take the `DEFAULT_*` values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the daemon host (DNS name or IP).
    pub fn host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    /// Set the daemon port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the user profile.
    pub fn user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    /// Set the password.
    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    /// Accept self-signed or otherwise untrusted certificates.
    pub fn ignore_unauthorized(mut self, ignore: bool) -> Self {
        self.ignore_unauthorized = Some(ignore);
        self
    }

    /// Enable or disable certificate hostname verification.
    pub fn verify_host_name(mut self, verify: bool) -> Self {
        self.verify_host_name = Some(verify);
        self
    }

    /// Set the handshake and read timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Set the outbound frame size in bytes.
    pub fn frame_size(mut self, bytes: usize) -> Self {
        self.frame_size = Some(bytes);
        self
    }

    /// Enable or disable TCP keep-alive.
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = Some(persistent);
        self
    }

    /// Build the DaemonServer with validation.
    pub fn build(self) -> Result<DaemonServer, ConfigurationError> {
        let user = self.user.ok_or_else(|| ConfigurationError::MissingParameter {
            parameter: "user".to_string(),
        })?;
        let password = self
            .password
            .ok_or_else(|| ConfigurationError::MissingParameter {
                parameter: "password".to_string(),
            })?;

        if user.is_empty() {
            return Err(ConfigurationError::invalid("user", "User cannot be empty"));
        }
        if password.is_empty() {
            return Err(ConfigurationError::invalid(
                "password",
                "Password cannot be empty",
            ));
        }

        let host = self.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
        if host.trim().is_empty() {
            return Err(ConfigurationError::invalid("host", "Host cannot be empty"));
        }

        let port = self.port.unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(ConfigurationError::invalid(
                "port",
                "Port must be in 1..=65535",
            ));
        }

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigurationError::invalid(
                "timeout",
                "Timeout must be greater than 0",
            ));
        }

        let frame_size = self.frame_size.unwrap_or(DEFAULT_FRAME_SIZE);
        if frame_size == 0 {
            return Err(ConfigurationError::invalid(
                "frame_size",
                "Frame size must be greater than 0",
            ));
        }

        Ok(DaemonServer {
            host,
            port,
            credentials: Credentials::new(user, password),
            ignore_unauthorized: self
                .ignore_unauthorized
                .unwrap_or(DEFAULT_IGNORE_UNAUTHORIZED),
            verify_host_name: self.verify_host_name.unwrap_or(DEFAULT_VERIFY_HOST_NAME),
            timeout_secs,
            frame_size,
            persistent: self.persistent.unwrap_or(DEFAULT_PERSISTENT),
        })
    }
}

impl fmt::Debug for DaemonServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonServerBuilder")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field(
                "password",
                &redact_password(self.password.as_deref().unwrap_or_default()),
            )
            .field("ignore_unauthorized", &self.ignore_unauthorized)
            .field("verify_host_name", &self.verify_host_name)
            .field("timeout_secs", &self.timeout_secs)
            .field("frame_size", &self.frame_size)
            .field("persistent", &self.persistent)
            .finish()
    }
}

/// Renders the values `build` would use, before validation.
impl fmt::Display for DaemonServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = ProfileView {
            title: "DaemonServerBuilder",
            host: self.host.as_deref().unwrap_or(DEFAULT_HOST),
            port: self.port.unwrap_or(DEFAULT_PORT),
            user: self.user.as_deref().unwrap_or_default(),
            password: self.password.as_deref().unwrap_or_default(),
            ignore_unauthorized: self
                .ignore_unauthorized
                .unwrap_or(DEFAULT_IGNORE_UNAUTHORIZED),
            verify_host_name: self.verify_host_name.unwrap_or(DEFAULT_VERIFY_HOST_NAME),
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            frame_size: self.frame_size.unwrap_or(DEFAULT_FRAME_SIZE),
            persistent: self.persistent.unwrap_or(DEFAULT_PERSISTENT),
        };
        fmt::Display::fmt(&view, f)
    }
}
