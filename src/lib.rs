//! # mapepire-rs
//!
//! Client for the Mapepire database daemon over secure WebSockets.
//!
//! A [`DaemonServer`] profile describes where the daemon listens, who to
//! authenticate as and how strictly to check its certificate. A
//! [`SessionConnector`] opens one authenticated session with that profile and
//! exchanges text payloads with the daemon, one request and one response at
//! a time. Payloads are passed through unchanged.
//!
//! ## Example
//!
//! ```no_run
//! # use mapepire_rs::*;
//! # use std::sync::Arc;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let profile = DaemonServer::builder()
//!     .host("ibmi.example.com")
//!     .user("meMyself")
//!     .password("secret")
//!     .build()?;
//!
//! let mut session = SessionConnector::new();
//! session.connect(Arc::new(profile)).await?;
//!
//! let reply = session
//!     .single_send_and_receive(r#"{"id":"t1","type":"sql","rows":4,"sql":"select 1"}"#, None)
//!     .await?;
//! println!("{}", reply);
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod transport;

pub use connection::{
    credential_encoder, Credentials, DaemonServer, DaemonServerBuilder, SessionConnector,
    SessionState,
};
pub use error::{ConfigurationError, ConnectionError, ErrorKind, MapepireError, TransportError};
pub use transport::{TlsPolicy, TransportProtocol, WebSocketTransport};
