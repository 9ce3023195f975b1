use std::fmt;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::{defaults::DEFAULT_FPD_VERSION, error::AccountServerError};

const SENSITIVE_HEADERS: [&str; 2] = ["x-nintendo-client-secret", "x-nintendo-device-cert"];

/// Device and application identity sent with every account server request.
///
/// All fields are opaque strings; the server decides whether they are acceptable.
/// Identity material, in particular `client_secret`, should be loaded from configuration
/// (see [`ClientIdentity::from_json`]) rather than embedded in source.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct ClientIdentity {
    /// Application client id.
    pub client_id: String,
    /// Application client secret.
    pub client_secret: String,
    /// Device certificate, may be absent or empty.
    #[serde(default)]
    pub device_cert: Option<String>,
    /// Server environment the device is provisioned for (e.g. `L1`).
    pub environment: String,
    /// Two-letter country code.
    pub country: String,
    /// Region bitmask: 1 JPN, 2 USA, 4 EUR, 8 AUS, 16 CHN, 32 KOR, 64 TWN.
    pub region: String,
    /// System version of the device.
    pub system_version: String,
    /// Serial number of the device.
    pub serial_number: String,
    /// Device id.
    pub device_id: String,
    /// Device type (1 debug, 2 retail), may be absent or empty.
    #[serde(default)]
    pub device_type: Option<String>,
    /// Platform id.
    pub platform_id: String,
    /// FPD version, [`DEFAULT_FPD_VERSION`] when absent.
    #[serde(default)]
    pub fpd_version: Option<String>,
}

/// Deserializes a [`ClientIdentity`] from a JSON string.
///
/// # Errors
/// Returns an error if the JSON is invalid or a required field is missing.
#[uniffi::export]
pub fn client_identity_from_json(json: &str) -> Result<ClientIdentity, AccountServerError> {
    ClientIdentity::from_json(json)
}

impl ClientIdentity {
    /// Deserializes a `ClientIdentity` from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the JSON is invalid or a required field is missing.
    pub fn from_json(json: &str) -> Result<Self, AccountServerError> {
        serde_json::from_str(json).map_err(|e| {
            AccountServerError::generic(format!("invalid client identity json: {e}"))
        })
    }

    /// Maps the identity onto the account server's request headers.
    ///
    /// Empty optional fields are left out.
    pub(crate) fn to_headers(&self) -> Result<HeaderMap, AccountServerError> {
        let fpd_version = self
            .fpd_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_FPD_VERSION);

        let required = [
            ("x-nintendo-client-id", self.client_id.as_str()),
            ("x-nintendo-client-secret", self.client_secret.as_str()),
            ("x-nintendo-fpd-version", fpd_version),
            ("x-nintendo-platform-id", self.platform_id.as_str()),
            ("x-nintendo-device-id", self.device_id.as_str()),
            ("x-nintendo-serial-number", self.serial_number.as_str()),
            ("x-nintendo-system-version", self.system_version.as_str()),
            ("x-nintendo-region", self.region.as_str()),
            ("x-nintendo-country", self.country.as_str()),
            ("x-nintendo-environment", self.environment.as_str()),
        ];
        let optional = [
            ("x-nintendo-device-type", self.device_type.as_deref()),
            ("x-nintendo-device-cert", self.device_cert.as_deref()),
        ];

        let mut headers = HeaderMap::with_capacity(required.len() + optional.len());
        let present = optional
            .into_iter()
            .filter_map(|(name, value)| value.filter(|v| !v.is_empty()).map(|v| (name, v)));
        for (name, value) in required.into_iter().chain(present) {
            // values are never echoed back, they may be secrets
            let mut value = HeaderValue::from_str(value).map_err(|_| {
                AccountServerError::generic(format!(
                    "client identity field for {name} is not a valid header value"
                ))
            })?;
            value.set_sensitive(SENSITIVE_HEADERS.contains(&name));
            headers.insert(HeaderName::from_static(name), value);
        }
        Ok(headers)
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("device_cert", &self.device_cert.as_ref().map(|_| "<redacted>"))
            .field("environment", &self.environment)
            .field("country", &self.country)
            .field("region", &self.region)
            .field("system_version", &self.system_version)
            .field("serial_number", &self.serial_number)
            .field("device_id", &self.device_id)
            .field("device_type", &self.device_type)
            .field("platform_id", &self.platform_id)
            .field("fpd_version", &self.fpd_version)
            .finish()
    }
}
