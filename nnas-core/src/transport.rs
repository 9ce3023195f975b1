use std::{fmt, path::Path, time::Duration};

use reqwest::{blocking::Client, Certificate, Identity, Url};
use rustls::{
    pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer},
    sign::CertifiedKey,
    InconsistentKeys,
};
use secrecy::{ExposeSecret, SecretString};

use crate::{
    defaults::{user_agent, DEFAULT_TIMEOUT},
    error::AccountServerError,
};

/// Failures while loading the TLS client credentials or the endpoint.
#[derive(Debug, thiserror::Error)]
enum CredentialError {
    #[error("invalid account server endpoint {endpoint}: {reason}")]
    Endpoint { endpoint: String, reason: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid client certificate: {0}")]
    Certificate(String),
    #[error("invalid client private key: {0}")]
    PrivateKey(String),
    #[error("client certificate and private key do not form a key pair")]
    KeyMismatch,
    #[error("invalid trusted root certificate: {0}")]
    RootCertificate(String),
    #[error("failed to set up the TLS client: {0}")]
    Client(String),
}

impl From<CredentialError> for AccountServerError {
    fn from(error: CredentialError) -> Self {
        Self::generic(error.to_string())
    }
}

/// Server trust settings, for callers that cannot reach [`TransportConfig`] directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, uniffi::Record)]
pub struct TransportOptions {
    /// PEM-encoded certificate trusted in addition to the built-in roots.
    pub root_certificate_pem: Option<String>,
    /// Skips verification of the server certificate.
    pub accept_invalid_server_certs: bool,
}

/// Endpoint and client certificate material for the account server transport.
///
/// The certificate and key are validated when the config is created, so a config that
/// exists always holds a usable key pair. Nothing here touches the network.
pub struct TransportConfig {
    endpoint: Url,
    certificate_pem: String,
    key_pem: SecretString,
    root_certificate_pem: Option<String>,
    accept_invalid_server_certs: bool,
    timeout: Duration,
}

impl TransportConfig {
    /// Creates a transport config from PEM-encoded client certificate (chain) and key.
    ///
    /// # Errors
    /// Returns a generic error if the endpoint is not an absolute `https` URL, if either
    /// PEM document cannot be parsed, or if the key does not belong to the certificate.
    pub fn new(
        endpoint: &str,
        certificate_pem: impl Into<String>,
        key_pem: impl Into<String>,
    ) -> Result<Self, AccountServerError> {
        let endpoint = parse_endpoint(endpoint)?;
        let certificate_pem = certificate_pem.into();
        let key_pem = SecretString::from(key_pem.into());

        validate_key_pair(&certificate_pem, key_pem.expose_secret())?;

        Ok(Self {
            endpoint,
            certificate_pem,
            key_pem,
            root_certificate_pem: None,
            accept_invalid_server_certs: false,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Creates a transport config from PEM files on disk.
    ///
    /// # Errors
    /// Returns a generic error if a file cannot be read, plus everything [`Self::new`] rejects.
    pub fn from_pem_files(
        endpoint: &str,
        certificate_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<Self, AccountServerError> {
        let certificate_pem = read_pem(certificate_path.as_ref())?;
        let key_pem = read_pem(key_path.as_ref())?;
        Self::new(endpoint, certificate_pem, key_pem)
    }

    /// Trusts an additional root certificate when verifying the server.
    ///
    /// # Errors
    /// Returns a generic error if the PEM document holds no parsable certificate.
    pub fn with_root_certificate(
        mut self,
        root_certificate_pem: impl Into<String>,
    ) -> Result<Self, AccountServerError> {
        let root_certificate_pem = root_certificate_pem.into();
        let roots = CertificateDer::pem_slice_iter(root_certificate_pem.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CredentialError::RootCertificate(e.to_string()))?;
        if roots.is_empty() {
            return Err(CredentialError::RootCertificate("no certificate found".to_string()).into());
        }
        self.root_certificate_pem = Some(root_certificate_pem);
        Ok(self)
    }

    /// Applies [`TransportOptions`].
    ///
    /// # Errors
    /// Returns a generic error if the root certificate cannot be parsed.
    pub fn with_options(self, options: TransportOptions) -> Result<Self, AccountServerError> {
        let config = match options.root_certificate_pem {
            Some(root_certificate_pem) => self.with_root_certificate(root_certificate_pem)?,
            None => self,
        };
        Ok(config.accept_invalid_server_certs(options.accept_invalid_server_certs))
    }

    /// Skips verification of the server certificate.
    ///
    /// The official servers present certificates issued by a private CA; prefer
    /// [`Self::with_root_certificate`] when that CA is available.
    #[must_use]
    pub const fn accept_invalid_server_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_server_certs = accept;
        self
    }

    /// Overrides the fixed per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The base URL operation paths are appended to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Builds the pooled HTTPS client that presents the client certificate on every
    /// handshake.
    pub(crate) fn build_client(&self) -> Result<Client, AccountServerError> {
        let mut identity_pem =
            Vec::with_capacity(self.certificate_pem.len() + self.key_pem.expose_secret().len() + 1);
        identity_pem.extend_from_slice(self.certificate_pem.as_bytes());
        identity_pem.push(b'\n');
        identity_pem.extend_from_slice(self.key_pem.expose_secret().as_bytes());

        let identity = Identity::from_pem(&identity_pem)
            .map_err(|e| CredentialError::PrivateKey(e.to_string()))?;

        let mut builder = Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .user_agent(user_agent())
            .danger_accept_invalid_certs(self.accept_invalid_server_certs);

        if let Some(root) = &self.root_certificate_pem {
            let root = Certificate::from_pem(root.as_bytes())
                .map_err(|e| CredentialError::RootCertificate(e.to_string()))?;
            builder = builder.add_root_certificate(root);
        }

        let client = builder
            .build()
            .map_err(|e| CredentialError::Client(e.to_string()))?;
        Ok(client)
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("key_pem", &self.key_pem)
            .field("root_certificate", &self.root_certificate_pem.is_some())
            .field("accept_invalid_server_certs", &self.accept_invalid_server_certs)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, CredentialError> {
    let invalid = |reason: &str| CredentialError::Endpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("not a base URL"));
    }

    // unit tests talk plain HTTP to a local mock server
    if cfg!(not(test)) && url.scheme() != "https" {
        return Err(invalid("scheme must be https"));
    }

    Ok(url)
}

fn read_pem(path: &Path) -> Result<String, CredentialError> {
    std::fs::read_to_string(path).map_err(|source| CredentialError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Parses both PEM documents and checks that the key's public half matches the leaf
/// certificate.
fn validate_key_pair(certificate_pem: &str, key_pem: &str) -> Result<(), CredentialError> {
    let chain = CertificateDer::pem_slice_iter(certificate_pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CredentialError::Certificate(e.to_string()))?;
    if chain.is_empty() {
        return Err(CredentialError::Certificate("no certificate found".to_string()));
    }

    let key = PrivateKeyDer::from_pem_slice(key_pem.as_bytes())
        .map_err(|e| CredentialError::PrivateKey(e.to_string()))?;

    let provider = rustls::crypto::ring::default_provider();
    let signing_key = provider
        .key_provider
        .load_private_key(key)
        .map_err(|e| CredentialError::PrivateKey(e.to_string()))?;

    match CertifiedKey::new(chain, signing_key).keys_match() {
        // the key type cannot report its public half; the handshake will tell
        Ok(()) | Err(rustls::Error::InconsistentKeys(InconsistentKeys::Unknown)) => Ok(()),
        Err(rustls::Error::InconsistentKeys(InconsistentKeys::KeyMismatch)) => {
            Err(CredentialError::KeyMismatch)
        }
        Err(e) => Err(CredentialError::Certificate(e.to_string())),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Returns a fresh self-signed certificate and its PKCS#8 key, both PEM encoded.
    pub(crate) fn generated_key_pair() -> (String, String) {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        (cert.pem(), key_pair.serialize_pem())
    }

    #[test]
    fn test_valid_key_pair() {
        let (cert, key) = generated_key_pair();
        let config = TransportConfig::new("https://account.example.net/v1/api", cert, key)
            .unwrap();

        assert_eq!(
            config.endpoint().as_str(),
            "https://account.example.net/v1/api"
        );
        assert!(config.build_client().is_ok());
    }

    #[test]
    fn test_mismatched_key_pair() {
        let (cert, _) = generated_key_pair();
        let (_, other_key) = generated_key_pair();

        let err = TransportConfig::new("https://account.example.net/v1/api", cert, other_key)
            .unwrap_err();

        assert_eq!(
            err,
            AccountServerError::generic(
                "client certificate and private key do not form a key pair"
            )
        );
    }

    #[test]
    fn test_malformed_certificate() {
        let (_, key) = generated_key_pair();
        let garbage = "-----BEGIN CERTIFICATE-----\nbm90IGEgY2VydGlmaWNhdGU=\n-----END CERTIFICATE-----\n";

        let err = TransportConfig::new("https://account.example.net/v1/api", garbage, key)
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid client certificate"));
    }

    #[test]
    fn test_missing_certificate() {
        let (_, key) = generated_key_pair();

        let err = TransportConfig::new("https://account.example.net/v1/api", "", key)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid client certificate: no certificate found"
        );
    }

    #[test]
    fn test_missing_private_key() {
        let (cert, _) = generated_key_pair();

        let err = TransportConfig::new(
            "https://account.example.net/v1/api",
            cert.clone(),
            cert,
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("invalid client private key"));
    }

    #[test]
    fn test_invalid_endpoint() {
        let (cert, key) = generated_key_pair();

        let err = TransportConfig::new("account.example.net", cert, key).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("invalid account server endpoint account.example.net"));
    }

    #[test]
    fn test_root_certificate() {
        let (cert, key) = generated_key_pair();
        let (root, _) = generated_key_pair();

        let config = TransportConfig::new("https://account.example.net/v1/api", cert, key)
            .unwrap()
            .with_root_certificate(root)
            .unwrap();
        assert!(config.build_client().is_ok());

        let (cert, key) = generated_key_pair();
        let err = TransportConfig::new("https://account.example.net/v1/api", cert, key)
            .unwrap()
            .with_root_certificate("no pem here")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid trusted root certificate: no certificate found"
        );
    }

    #[test]
    fn test_with_options() {
        let (cert, key) = generated_key_pair();
        let (root, _) = generated_key_pair();

        let config = TransportConfig::new("https://account.example.net/v1/api", cert, key)
            .unwrap()
            .with_options(TransportOptions {
                root_certificate_pem: Some(root),
                accept_invalid_server_certs: true,
            })
            .unwrap();
        assert!(config.root_certificate_pem.is_some());
        assert!(config.accept_invalid_server_certs);

        let (cert, key) = generated_key_pair();
        let config = TransportConfig::new("https://account.example.net/v1/api", cert, key)
            .unwrap()
            .with_options(TransportOptions::default())
            .unwrap();
        assert!(config.root_certificate_pem.is_none());
        assert!(!config.accept_invalid_server_certs);

        let (cert, key) = generated_key_pair();
        let err = TransportConfig::new("https://account.example.net/v1/api", cert, key)
            .unwrap()
            .with_options(TransportOptions {
                root_certificate_pem: Some("no pem here".to_string()),
                accept_invalid_server_certs: false,
            })
            .unwrap_err();
        assert!(err.to_string().starts_with("invalid trusted root certificate"));
    }

    #[test]
    fn test_from_pem_files() {
        let (cert, key) = generated_key_pair();
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("ctr-common-cert.pem");
        let key_path = dir.path().join("ctr-common-key.pem");
        std::fs::write(&cert_path, cert).unwrap();
        std::fs::write(&key_path, key).unwrap();

        let config = TransportConfig::from_pem_files(
            "https://account.example.net/v1/api",
            &cert_path,
            &key_path,
        )
        .unwrap()
        .accept_invalid_server_certs(true)
        .with_timeout(Duration::from_secs(3));
        assert!(config.build_client().is_ok());

        let err = TransportConfig::from_pem_files(
            "https://account.example.net/v1/api",
            dir.path().join("missing.pem"),
            &key_path,
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("failed to read"));
    }

    #[test]
    fn test_debug_hides_key() {
        let (cert, key) = generated_key_pair();
        let config =
            TransportConfig::new("https://account.example.net/v1/api", cert, key.clone())
                .unwrap();

        assert!(!format!("{config:?}").contains(&key));
    }
}
