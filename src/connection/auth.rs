//! Basic-Auth credentials for the daemon handshake.
//!
//! The daemon authenticates the WebSocket upgrade request with an
//! `Authorization: Basic {base64(user:password)}` header. The password is
//! kept in a buffer that is wiped when the last clone of the credentials is
//! dropped, and so is the `user:password` scratch buffer used to build the
//! token.

use crate::connection::params::redact_password;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use std::sync::Arc;

/// Encode `user:password` as standard base64.
///
/// This is the token carried by the `Authorization: Basic` header. It is
/// exposed on its own so the header value can be reproduced without opening
/// a connection.
///
/// ```
/// # use mapepire_rs::credential_encoder;
/// assert_eq!(credential_encoder("X", "Y"), "WDpZ");
/// ```
pub fn credential_encoder(user: &str, password: &str) -> String {
    Password::from(password).basic_token(user)
}

/// Daemon login: a user name and a password that never shows up in output.
#[derive(Clone)]
pub struct Credentials {
    user: String,
    password: Arc<Password>,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: Arc::new(Password::new(password.into())),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub(crate) fn password(&self) -> &str {
        self.password.as_str()
    }

    pub fn has_password(&self) -> bool {
        !self.password.bytes.is_empty()
    }

    /// `base64(user:password)`, identical to [`credential_encoder`].
    pub fn basic_token(&self) -> String {
        self.password.basic_token(&self.user)
    }

    /// Full value of the `Authorization` header, `Basic {token}`.
    pub fn authorization_header(&self) -> String {
        format!("Basic {}", self.basic_token())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &redact_password(self.password()))
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.user, redact_password(self.password()))
    }
}

/// Password bytes, zeroed on drop.
struct Password {
    bytes: Vec<u8>,
}

impl Password {
    fn new(password: String) -> Self {
        Self {
            bytes: password.into_bytes(),
        }
    }

    fn as_str(&self) -> &str {
        // Only ever built from a String
        std::str::from_utf8(&self.bytes).unwrap_or_default()
    }

    fn basic_token(&self, user: &str) -> String {
        let mut pair = Vec::with_capacity(user.len() + 1 + self.bytes.len());
        pair.extend_from_slice(user.as_bytes());
        pair.push(b':');
        pair.extend_from_slice(&self.bytes);

        let token = STANDARD.encode(&pair);
        wipe(&mut pair);
        token
    }
}

impl From<&str> for Password {
    fn from(password: &str) -> Self {
        Self::new(password.to_string())
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        wipe(&mut self.bytes);
    }
}

fn wipe(bytes: &mut [u8]) {
    bytes.iter_mut().for_each(|b| *b = 0);
}
