//! Connection management for Mapepire daemon sessions.
//!
//! This module provides the daemon profile, credential encoding, environment
//! loading and the session state machine.
//!
//! # Example
//!
//! ```no_run
//! # use mapepire_rs::connection::{DaemonServer, SessionConnector};
//! # use std::sync::Arc;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Using the builder
//! let profile = DaemonServer::builder()
//!     .host("ibmi.example.com")
//!     .port(8076)
//!     .user("meMyself")
//!     .password("secret")
//!     .ignore_unauthorized(true)
//!     .build()?;
//!
//! // Or from MAPEPIRE_* variables and ./.env
//! let profile = DaemonServer::from_env()?;
//!
//! let mut session = SessionConnector::new();
//! session.connect(Arc::new(profile)).await?;
//! let reply = session
//!     .single_send_and_receive(r#"{"id":"q1","type":"sql","sql":"values 1"}"#, None)
//!     .await?;
//! println!("{}", reply);
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod env;
pub mod params;
pub mod session;

pub use auth::{credential_encoder, Credentials};
pub use params::{DaemonServer, DaemonServerBuilder};
pub use session::{SessionConnector, SessionState};
