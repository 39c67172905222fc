//! Loading a [`DaemonServer`] from environment variables.
//!
//! | Variable                       | Field                 | Default     |
//! |--------------------------------|-----------------------|-------------|
//! | `MAPEPIRE_SERVER`              | host                  | "localhost" |
//! | `MAPEPIRE_PORT`                | port                  | 8076        |
//! | `MAPEPIRE_DB_USER`             | user                  | required    |
//! | `MAPEPIRE_DB_PASS`             | password              | required    |
//! | `MAPEPIRE_IGNORE_UNAUTHORIZED` | ignore_unauthorized   | false       |
//! | `MAPEPIRE_VERIFY_HOSTNAME`     | verify_host_name      | true        |
//! | `MAPEPIRE_TIMEOUT`             | timeout (seconds)     | 60          |
//! | `MAPEPIRE_FRAMESIZE`           | frame_size (bytes)    | 4096        |
//! | `MAPEPIRE_PERSISTENCE`         | persistent            | false       |
//!
//! Values in the process environment win over values in a `.env` file. The
//! file is only read; nothing is written back into the process environment.

use crate::connection::params::{DaemonServer, DaemonServerBuilder};
use crate::error::ConfigurationError;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::str::FromStr;

pub const ENV_SERVER: &str = "MAPEPIRE_SERVER";
pub const ENV_PORT: &str = "MAPEPIRE_PORT";
pub const ENV_DB_USER: &str = "MAPEPIRE_DB_USER";
pub const ENV_DB_PASS: &str = "MAPEPIRE_DB_PASS";
pub const ENV_IGNORE_UNAUTHORIZED: &str = "MAPEPIRE_IGNORE_UNAUTHORIZED";
pub const ENV_VERIFY_HOSTNAME: &str = "MAPEPIRE_VERIFY_HOSTNAME";
pub const ENV_TIMEOUT: &str = "MAPEPIRE_TIMEOUT";
pub const ENV_FRAMESIZE: &str = "MAPEPIRE_FRAMESIZE";
pub const ENV_PERSISTENCE: &str = "MAPEPIRE_PERSISTENCE";

const ENV_FILE: &str = ".env";

impl DaemonServer {
    /// Load from the process environment and `./.env`.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_env_dir(".")
    }

    /// Load from the process environment and the `.env` file in `dir`.
    ///
    /// A missing `.env` file is not an error.
    pub fn from_env_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let file_values = read_env_file(&dir.as_ref().join(ENV_FILE))?;
        Self::from_lookup(|key| env::var(key).ok().or_else(|| file_values.get(key).cloned()))
    }

    /// Load from an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        builder_from_lookup(lookup)?.build()
    }
}

/// Populate a builder from `lookup`; absent keys leave the builder default.
pub fn builder_from_lookup<F>(lookup: F) -> Result<DaemonServerBuilder, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = DaemonServerBuilder::new();

    if let Some(host) = lookup(ENV_SERVER) {
        builder = builder.host(host.trim());
    }
    if let Some(port) = lookup(ENV_PORT) {
        builder = builder.port(parse_number(ENV_PORT, &port)?);
    }
    if let Some(user) = lookup(ENV_DB_USER) {
        builder = builder.user(&user);
    }
    if let Some(password) = lookup(ENV_DB_PASS) {
        builder = builder.password(&password);
    }
    if let Some(value) = lookup(ENV_IGNORE_UNAUTHORIZED) {
        builder = builder.ignore_unauthorized(parse_bool(ENV_IGNORE_UNAUTHORIZED, &value)?);
    }
    if let Some(value) = lookup(ENV_VERIFY_HOSTNAME) {
        builder = builder.verify_host_name(parse_bool(ENV_VERIFY_HOSTNAME, &value)?);
    }
    if let Some(value) = lookup(ENV_TIMEOUT) {
        builder = builder.timeout_secs(parse_number(ENV_TIMEOUT, &value)?);
    }
    if let Some(value) = lookup(ENV_FRAMESIZE) {
        builder = builder.frame_size(parse_number(ENV_FRAMESIZE, &value)?);
    }
    if let Some(value) = lookup(ENV_PERSISTENCE) {
        builder = builder.persistent(parse_bool(ENV_PERSISTENCE, &value)?);
    }

    Ok(builder)
}

/// Read `path` as a dotenv file without touching the process environment.
fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigurationError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => return Ok(HashMap::new()),
        Err(e) => return Err(ConfigurationError::EnvFile(e.to_string())),
    };

    iter.map(|item| item.map_err(|e| ConfigurationError::EnvFile(e.to_string())))
        .collect()
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigurationError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigurationError::invalid(key, format!("Invalid number: {}", value)))
}

/// Parse boolean value from string.
fn parse_bool(key: &str, s: &str) -> Result<bool, ConfigurationError> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigurationError::invalid(
            key,
            format!("Invalid boolean value: {}", s),
        )),
    }
}
