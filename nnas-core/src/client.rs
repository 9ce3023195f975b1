use std::{error::Error, io::Read};

use reqwest::{blocking::Client, header::HeaderMap, Method, StatusCode, Url};

use crate::{
    defaults::{AccountServer, MAX_RESPONSE_BODY_SIZE},
    error::AccountServerError,
    fault::{AccountServerErrorCode, ErrorXml},
    identity::ClientIdentity,
    response::{classify, RawResponse, ResponseSchema},
    transport::{TransportConfig, TransportOptions},
};

/// A client for the account server, bound to one endpoint, one client certificate and
/// one [`ClientIdentity`].
///
/// Create it once and share it: the underlying connection pool is reused across calls and
/// threads, so concurrent operations neither serialize nor repeat the TLS handshake.
/// Every operation blocks the calling thread until the response is classified. Nothing
/// is retried internally.
#[derive(Debug, uniffi::Object)]
pub struct AccountServerClient {
    endpoint: Url,
    http: Client,
    identity_headers: HeaderMap,
}

#[uniffi::export]
impl AccountServerClient {
    /// Creates a client from PEM-encoded client certificate and key.
    ///
    /// Validates the endpoint, the key pair and the identity header values before
    /// returning; no request is made.
    ///
    /// # Errors
    /// Returns a generic error if any of the inputs is rejected.
    #[uniffi::constructor]
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(
        endpoint: &str,
        certificate_pem: String,
        key_pem: String,
        identity: ClientIdentity,
    ) -> Result<Self, AccountServerError> {
        let config = TransportConfig::new(endpoint, certificate_pem, key_pem)?;
        Self::from_config(&config, &identity)
    }

    /// Creates a client for one of the public account servers.
    ///
    /// # Errors
    /// See [`AccountServerClient::new`].
    #[uniffi::constructor]
    pub fn with_server(
        server: AccountServer,
        certificate_pem: String,
        key_pem: String,
        identity: ClientIdentity,
    ) -> Result<Self, AccountServerError> {
        Self::new(server.endpoint(), certificate_pem, key_pem, identity)
    }

    /// Creates a client with custom server trust settings.
    ///
    /// The official servers present certificates issued by a private CA, so either
    /// `root_certificate_pem` or `accept_invalid_server_certs` is needed to reach them.
    ///
    /// # Errors
    /// See [`AccountServerClient::new`]. Also fails if the root certificate cannot be
    /// parsed.
    #[uniffi::constructor]
    #[allow(clippy::needless_pass_by_value)]
    pub fn new_with_options(
        endpoint: &str,
        certificate_pem: String,
        key_pem: String,
        identity: ClientIdentity,
        options: TransportOptions,
    ) -> Result<Self, AccountServerError> {
        let config = TransportConfig::new(endpoint, certificate_pem, key_pem)?.with_options(options)?;
        Self::from_config(&config, &identity)
    }

    /// Creates a client for one of the public account servers with custom server trust
    /// settings.
    ///
    /// # Errors
    /// See [`AccountServerClient::new_with_options`].
    #[uniffi::constructor]
    pub fn with_server_options(
        server: AccountServer,
        certificate_pem: String,
        key_pem: String,
        identity: ClientIdentity,
        options: TransportOptions,
    ) -> Result<Self, AccountServerError> {
        Self::new_with_options(server.endpoint(), certificate_pem, key_pem, identity, options)
    }

    /// The base URL requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> String {
        self.endpoint.to_string()
    }

    /// Checks whether an account with the given network id exists.
    ///
    /// The id is not validated locally; the server is authoritative. The check is
    /// idempotent and safe to retry.
    ///
    /// # Errors
    /// - [`AccountServerError::Generic`] if the request could not complete or the server
    ///   answered with an unexpected body.
    /// - [`AccountServerError::Fault`] if the server rejected the request, for example with
    ///   code `1104` for a malformed id.
    pub fn does_user_exist(&self, id: &str) -> Result<bool, AccountServerError> {
        let url = self.operation_url(&["people", id]);
        let outcome = self.execute(Method::GET, url);
        classify::<UserExistence>(outcome)
            .into_result()
            .map(|UserExistence(exists)| exists)
    }
}

impl AccountServerClient {
    /// Creates a client from an already validated transport config.
    ///
    /// # Errors
    /// Returns a generic error if an identity field is not a valid header value or the
    /// TLS client cannot be set up.
    pub fn from_config(
        config: &TransportConfig,
        identity: &ClientIdentity,
    ) -> Result<Self, AccountServerError> {
        let identity_headers = identity.to_headers()?;
        let http = config.build_client()?;

        Ok(Self {
            endpoint: config.endpoint().clone(),
            http,
            identity_headers,
        })
    }

    /// Appends path segments to the endpoint, percent-encoding each one.
    fn operation_url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Sends a request carrying the identity headers and reads the body, up to
    /// [`MAX_RESPONSE_BODY_SIZE`] bytes.
    ///
    /// `Err` holds a description of a failure that prevented a complete response.
    fn execute(&self, method: Method, url: Url) -> Result<RawResponse, String> {
        log::debug!("{method} {url}");

        let response = self
            .http
            .request(method, url.clone())
            .headers(self.identity_headers.clone())
            .send()
            .map_err(|err| format!("request to {url} failed: {}", error_chain(&err)))?;

        let status = response.status();
        let mut body = Vec::new();
        response
            .take(MAX_RESPONSE_BODY_SIZE + 1)
            .read_to_end(&mut body)
            .map_err(|err| {
                format!(
                    "failed to read response body from {url} with status {status}: {}",
                    error_chain(&err)
                )
            })?;
        if u64::try_from(body.len()).unwrap_or(u64::MAX) > MAX_RESPONSE_BODY_SIZE {
            return Err(format!(
                "response body from {url} with status {status} exceeds {MAX_RESPONSE_BODY_SIZE} bytes"
            ));
        }

        log::debug!("{url} answered with status {status} and {} bytes", body.len());
        Ok(RawResponse { status, body })
    }
}

/// Renders an error with all of its sources, innermost last.
fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Answer of the `people/{id}` lookup.
///
/// The server reports a taken id with fault `0100` and a free one with an empty
/// success response.
struct UserExistence(bool);

impl ResponseSchema for UserExistence {
    fn from_fault(fault: &ErrorXml) -> Option<Self> {
        fault
            .contains(AccountServerErrorCode::AccountIdExists)
            .then_some(Self(true))
    }

    fn from_success(status: StatusCode, body: &[u8]) -> Option<Self> {
        (status.is_success() && body.iter().all(u8::is_ascii_whitespace)).then_some(Self(false))
    }
}
