//! Pinned-certificate TLS for LanBeam.
//!
//! Every installation ships the same self-issued certificate and private
//! key (a [`PinnedCredential`]). The host presents it as its server
//! certificate; the client accepts a server only if it presents exactly
//! that certificate, byte for byte. Server names are not checked, since
//! peers are addressed by LAN IP.
//!
//! ## Security Model
//!
//! - All transfers are encrypted with TLS (1.2 or 1.3)
//! - Only holders of the pinned key can act as a host
//! - Handshake signatures are verified against the pinned certificate

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, SignatureScheme};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::error::{Error, Result};

/// Server name the client presents in its hello. The verifier ignores it.
pub const PINNED_SERVER_NAME: &str = "lanbeam.local";

/// The certificate and key shared by every LanBeam installation.
pub struct PinnedCredential {
    cert: CertificateDer<'static>,
    key: PrivateKeyDer<'static>,
    cert_pem: String,
    key_pem: String,
}

impl PinnedCredential {
    /// Generate a fresh self-signed credential.
    ///
    /// Distribute the result (see [`PinnedCredential::save`]) to every
    /// device that should be able to pair.
    ///
    /// # Errors
    ///
    /// Returns an error if certificate generation fails.
    pub fn generate() -> Result<Self> {
        let subject_alt_names = vec![PINNED_SERVER_NAME.to_string(), "localhost".to_string()];
        let cert_params = rcgen::CertificateParams::new(subject_alt_names)
            .map_err(|e| Error::TlsError(format!("Failed to create cert params: {e}")))?;

        let key_pair = rcgen::KeyPair::generate()
            .map_err(|e| Error::TlsError(format!("Failed to generate key pair: {e}")))?;

        let cert = cert_params
            .self_signed(&key_pair)
            .map_err(|e| Error::TlsError(format!("Failed to generate self-signed cert: {e}")))?;

        Self::from_pem(&cert.pem(), &key_pair.serialize_pem())
    }

    /// Parse a credential from PEM text.
    ///
    /// The first certificate in `cert_pem` and the first private key in
    /// `key_pem` are used.
    ///
    /// # Errors
    ///
    /// Returns an error if either PEM block is missing or malformed.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        let cert = rustls_pemfile::certs(&mut cert_pem.as_bytes())
            .next()
            .ok_or_else(|| Error::TlsError("no certificate found in PEM".to_string()))?
            .map_err(|e| Error::TlsError(format!("Failed to parse certificate: {e}")))?;

        let key = rustls_pemfile::private_key(&mut key_pem.as_bytes())
            .map_err(|e| Error::TlsError(format!("Failed to parse private key: {e}")))?
            .ok_or_else(|| Error::TlsError("no private key found in PEM".to_string()))?;

        Ok(Self {
            cert,
            key,
            cert_pem: cert_pem.to_string(),
            key_pem: key_pem.to_string(),
        })
    }

    /// Load a credential from PEM files.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed.
    pub fn load(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let cert_pem = std::fs::read_to_string(cert_path).map_err(|e| {
            Error::TlsError(format!("Failed to read {}: {e}", cert_path.display()))
        })?;
        let key_pem = std::fs::read_to_string(key_path).map_err(|e| {
            Error::TlsError(format!("Failed to read {}: {e}", key_path.display()))
        })?;

        Self::from_pem(&cert_pem, &key_pem)
    }

    /// Write the credential as PEM files, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written.
    pub fn save(&self, cert_path: &Path, key_path: &Path) -> Result<()> {
        for path in [cert_path, key_path] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(cert_path, &self.cert_pem)?;
        std::fs::write(key_path, &self.key_pem)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(key_path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// DER bytes of the pinned certificate.
    #[must_use]
    pub fn cert_der(&self) -> &CertificateDer<'static> {
        &self.cert
    }

    /// SHA-256 fingerprint of the certificate as colon-separated hex.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        sha256(self.cert.as_ref())
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl Clone for PinnedCredential {
    fn clone(&self) -> Self {
        Self {
            cert: self.cert.clone(),
            key: self.key.clone_key(),
            cert_pem: self.cert_pem.clone(),
            key_pem: self.key_pem.clone(),
        }
    }
}

impl fmt::Debug for PinnedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedCredential")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

/// TLS configuration for both roles of a LanBeam connection.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    server: Arc<rustls::ServerConfig>,
    client: Arc<rustls::ClientConfig>,
}

impl TlsConfig {
    /// Build server and client configurations around a pinned credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not match the certificate or the
    /// configuration cannot be built.
    pub fn pinned(credential: &PinnedCredential) -> Result<Self> {
        let server = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![credential.cert.clone()], credential.key.clone_key())
            .map_err(|e| Error::TlsError(format!("Failed to build server config: {e}")))?;

        let verifier = PinnedCertVerifier {
            pinned: credential.cert.clone(),
            algorithms: rustls::crypto::ring::default_provider().signature_verification_algorithms,
        };

        let client = rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();

        Ok(Self {
            server: Arc::new(server),
            client: Arc::new(client),
        })
    }

    /// Get the server configuration.
    #[must_use]
    pub fn server_config(&self) -> Arc<rustls::ServerConfig> {
        Arc::clone(&self.server)
    }

    /// Get the client configuration.
    #[must_use]
    pub fn client_config(&self) -> Arc<rustls::ClientConfig> {
        Arc::clone(&self.client)
    }

    /// Acceptor for the host role.
    #[must_use]
    pub fn acceptor(&self) -> TlsAcceptor {
        TlsAcceptor::from(self.server_config())
    }

    /// Connector for the client role.
    #[must_use]
    pub fn connector(&self) -> TlsConnector {
        TlsConnector::from(self.client_config())
    }

    /// Server name to pass to [`TlsConnector::connect`].
    ///
    /// # Errors
    ///
    /// Never fails in practice; the name is a valid DNS name.
    pub fn server_name() -> Result<ServerName<'static>> {
        ServerName::try_from(PINNED_SERVER_NAME)
            .map_err(|e| Error::TlsError(format!("Invalid server name: {e}")))
    }
}

/// Accepts exactly one server certificate.
#[derive(Debug)]
struct PinnedCertVerifier {
    pinned: CertificateDer<'static>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        if constant_time_eq(end_entity.as_ref(), self.pinned.as_ref()) {
            Ok(ServerCertVerified::assertion())
        } else {
            tracing::warn!("Peer presented a certificate that does not match the pinned one");
            Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Compute SHA-256 hash of data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Constant-time comparison of two byte slices.
///
/// Returns `true` if the slices are equal, `false` otherwise.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
