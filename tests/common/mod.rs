//! Common test utilities for mapepire-rs integration tests.
//!
//! # Integration Test Prerequisites
//!
//! These integration tests require a reachable Mapepire daemon and a valid
//! database user. The daemon normally listens on port 8076 of the IBM i host.
//!
//! # Configuration
//!
//! Tests read the same variables as `DaemonServer::from_env`, either from the
//! process environment or from a `.env` file in the crate root:
//!
//! | Variable                       | Default     |
//! |--------------------------------|-------------|
//! | `MAPEPIRE_SERVER`              | "localhost" |
//! | `MAPEPIRE_PORT`                | 8076        |
//! | `MAPEPIRE_DB_USER`             | required    |
//! | `MAPEPIRE_DB_PASS`             | required    |
//! | `MAPEPIRE_IGNORE_UNAUTHORIZED` | false       |
//!
//! Daemons usually run with a self-signed certificate, so set
//! `MAPEPIRE_IGNORE_UNAUTHORIZED=true` unless its chain is trusted.
//!
//! # Running Integration Tests
//!
//! Integration tests automatically skip if no profile can be loaded or the
//! daemon is not reachable. To run them:
//!
//! ```bash
//! MAPEPIRE_SERVER=ibmi.example.com MAPEPIRE_DB_USER=me MAPEPIRE_DB_PASS=secret \
//!   MAPEPIRE_IGNORE_UNAUTHORIZED=true cargo test --test integration_tests -- --nocapture
//! ```

use mapepire_rs::{DaemonServer, SessionConnector};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

/// Request used by the end-to-end checks.
pub const SELECT_ONE: &str = r#"{"id":"t1","type":"sql","rows":4,"sql":"select 1"}"#;

/// Load the test profile from the environment and `.env`.
///
/// Returns `None` when the profile is incomplete, e.g. no credentials are set.
pub fn test_profile() -> Option<DaemonServer> {
    DaemonServer::from_env_dir(env!("CARGO_MANIFEST_DIR")).ok()
}

/// Connect a session with the test profile.
pub async fn get_test_session() -> Result<SessionConnector, mapepire_rs::MapepireError> {
    let profile = DaemonServer::from_env_dir(env!("CARGO_MANIFEST_DIR"))?;
    let mut session = SessionConnector::new();
    session.connect(Arc::new(profile)).await?;
    Ok(session)
}

/// Check if the daemon is reachable with the configured profile.
///
/// Only TCP connectivity is checked, not authentication.
pub fn is_daemon_available() -> bool {
    let Some(profile) = test_profile() else {
        return false;
    };
    let addr = format!("{}:{}", profile.host(), profile.port());

    let socket_addrs: Vec<_> = match addr.to_socket_addrs() {
        Ok(addrs) => addrs.collect(),
        Err(_) => return false,
    };

    socket_addrs
        .iter()
        .any(|socket_addr| TcpStream::connect_timeout(socket_addr, Duration::from_secs(2)).is_ok())
}

/// Skip a test if no daemon is available.
///
/// # Example
///
/// ```ignore
/// #[tokio::test]
/// async fn test_exchange() {
///     skip_if_no_daemon!();
///     // Test code here...
/// }
/// ```
#[macro_export]
macro_rules! skip_if_no_daemon {
    () => {
        if !$crate::common::is_daemon_available() {
            eprintln!("Skipping test: no Mapepire daemon profile configured or reachable");
            return;
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_one_is_sql_request() {
        assert!(SELECT_ONE.contains(r#""type":"sql""#));
        assert!(SELECT_ONE.contains(r#""id":"t1""#));
    }
}
