//! Basic usage example for mapepire-rs.
//!
//! Reads the profile from `MAPEPIRE_*` variables or `./.env`, runs a query,
//! opens a second session under a relaxed TLS policy and closes both:
//!
//! ```bash
//! MAPEPIRE_SERVER=ibmi.example.com MAPEPIRE_DB_USER=me MAPEPIRE_DB_PASS=secret \
//!   MAPEPIRE_IGNORE_UNAUTHORIZED=true RUST_LOG=mapepire_rs=debug \
//!   cargo run --example basic_usage
//! ```

use mapepire_rs::{DaemonServer, SessionConnector, TlsPolicy};
use std::error::Error;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const QUERY: &str = r#"{"id":"t1","type":"sql","rows":4,"sql":"select * from sysibm.sysdummy1"}"#;

/// Opens a session with the profile from the environment.
async fn example_connection() -> Result<SessionConnector, Box<dyn Error>> {
    let profile = DaemonServer::from_env()?;
    println!("{}", profile);

    let mut session = SessionConnector::with_profile(Arc::new(profile));
    session.connect_with_profile().await?;
    Ok(session)
}

/// Sends one SQL request and returns the raw JSON reply.
async fn example_query(session: &mut SessionConnector) -> Result<String, Box<dyn Error>> {
    Ok(session.single_send_and_receive(QUERY, None).await?)
}

/// Same request, insisting the session was opened with the profile's TLS policy.
async fn example_pinned_query(session: &mut SessionConnector) -> Result<String, Box<dyn Error>> {
    let Some(profile) = session.profile() else {
        return Err("session has no profile".into());
    };
    let expected = TlsPolicy::from_profile(profile);
    Ok(session.single_send_and_receive(QUERY, Some(expected)).await?)
}

/// Opens a second session that skips chain verification but keeps the name check.
async fn example_lenient_session(profile: Arc<DaemonServer>) -> Result<String, Box<dyn Error>> {
    let mut session = SessionConnector::new();
    session
        .connect_with_policy(profile, TlsPolicy::new(false, true))
        .await?;
    let reply = session.single_send_and_receive(QUERY, None).await?;
    session.close().await?;
    Ok(reply)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut session = example_connection().await?;
    println!("{}", session);

    println!("reply: {}", example_query(&mut session).await?);
    println!("reply: {}", example_pinned_query(&mut session).await?);

    if let Some(profile) = session.profile() {
        let profile = Arc::new(profile.clone());
        println!("lenient reply: {}", example_lenient_session(profile).await?);
    }

    session.close().await?;
    println!("{}", session);
    Ok(())
}
