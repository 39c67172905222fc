//! Transport layer for Mapepire daemon communication.
//!
//! # Architecture
//!
//! The transport layer is organized into:
//! - `protocol` - Transport protocol trait definition
//! - `tls` - Certificate verification policy
//! - `websocket` - Secure WebSocket transport implementation
//!
//! # Example
//!
//! ```no_run
//! use mapepire_rs::connection::DaemonServer;
//! use mapepire_rs::transport::{TlsPolicy, TransportProtocol, WebSocketTransport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let profile = DaemonServer::new("meMyself", "secret")?;
//! let mut transport = WebSocketTransport::new();
//!
//! transport.connect(&profile, TlsPolicy::from_profile(&profile)).await?;
//! transport.send_text(r#"{"id":"q1","type":"sql","sql":"values 1"}"#).await?;
//! let reply = transport.receive_text().await?;
//! println!("{}", reply);
//!
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod protocol;
pub mod tls;
pub mod websocket;

pub use protocol::TransportProtocol;
pub use tls::TlsPolicy;
pub use websocket::WebSocketTransport;
