//! TLS verification policy for the daemon connection.
//!
//! Chain trust and hostname matching are two independent checks. A daemon
//! with a self-signed certificate can still be pinned to its hostname, and a
//! daemon behind an address that does not match its certificate can still be
//! required to present a trusted chain.
//!
//! Trusted roots are the bundled webpki roots plus whatever the operating
//! system store holds, so a daemon certificate issued by a private CA that is
//! installed locally verifies like it does for other TLS clients.

use crate::connection::DaemonServer;
use crate::error::ConnectionError;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{verify_server_cert_signed_by_trust_anchor, verify_server_name};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Which certificate checks to perform during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsPolicy {
    /// Require a certificate chain to a trusted root
    pub verify_peer: bool,
    /// Require the certificate to be valid for the target host
    pub verify_peer_name: bool,
}

impl TlsPolicy {
    pub fn new(verify_peer: bool, verify_peer_name: bool) -> Self {
        Self {
            verify_peer,
            verify_peer_name,
        }
    }

    /// Policy derived from a profile's `ignore_unauthorized` and `verify_host_name`.
    pub fn from_profile(profile: &DaemonServer) -> Self {
        Self::new(!profile.ignore_unauthorized(), profile.verify_host_name())
    }

    /// Build a rustls client configuration enforcing this policy.
    pub fn client_config(&self) -> Result<Arc<ClientConfig>, ConnectionError> {
        let provider = rustls::crypto::ring::default_provider();
        let verifier = DaemonCertVerifier::new(*self, trusted_roots());

        let config = ClientConfig::builder_with_provider(Arc::new(provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| ConnectionError::TlsError(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();

        Ok(Arc::new(config))
    }
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl fmt::Display for TlsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "verify_peer={}, verify_peer_name={}",
            self.verify_peer, self.verify_peer_name
        )
    }
}

/// Bundled webpki roots plus the platform store, loaded once per process.
fn trusted_roots() -> Arc<RootCertStore> {
    static ROOTS: OnceLock<Arc<RootCertStore>> = OnceLock::new();

    ROOTS
        .get_or_init(|| {
            let mut roots = webpki_root_store();
            let native = rustls_native_certs::load_native_certs();
            for e in &native.errors {
                warn!(error = %e, "Could not read platform certificate store");
            }
            let (added, ignored) = roots.add_parsable_certificates(native.certs);
            debug!(added, ignored, total = roots.len(), "Loaded trusted roots");
            Arc::new(roots)
        })
        .clone()
}

fn webpki_root_store() -> RootCertStore {
    RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    }
}

/// Certificate verifier with separately switchable chain and name checks.
#[derive(Debug)]
struct DaemonCertVerifier {
    policy: TlsPolicy,
    roots: Arc<RootCertStore>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl DaemonCertVerifier {
    fn new(policy: TlsPolicy, roots: Arc<RootCertStore>) -> Self {
        Self {
            policy,
            roots,
            algorithms: rustls::crypto::ring::default_provider().signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for DaemonCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let cert = ParsedCertificate::try_from(end_entity)?;

        if self.policy.verify_peer {
            verify_server_cert_signed_by_trust_anchor(
                &cert,
                &self.roots,
                intermediates,
                now,
                self.algorithms.all,
            )?;
        }

        if self.policy.verify_peer_name {
            verify_server_name(&cert, server_name)?;
        }

        Ok(ServerCertVerified::assertion())
    }

    // Handshake signatures are always checked; the policy only relaxes trust in the certificate.
    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
