//! Known account servers and transport defaults.

use std::time::Duration;

use strum::{Display, EnumString};

/// Fixed timeout applied to every request, covering connect, TLS handshake and the
/// full response read.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Value sent as `X-Nintendo-FPD-Version` when the identity does not set one.
pub const DEFAULT_FPD_VERSION: &str = "0000";

/// Largest response body that is read. Expected bodies are fault documents or empty.
pub const MAX_RESPONSE_BODY_SIZE: u64 = 64 * 1024;

pub(crate) fn user_agent() -> String {
    format!("nnas-core/{}", env!("CARGO_PKG_VERSION"))
}

/// Public account server deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, uniffi::Enum)]
#[strum(serialize_all = "lowercase")]
pub enum AccountServer {
    /// The original Nintendo Network account server.
    Nintendo,
    /// The Pretendo Network reimplementation.
    Pretendo,
}

impl AccountServer {
    /// Base URL of the server's API. Operation paths are appended to it.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Nintendo => "https://account.nintendo.net/v1/api",
            Self::Pretendo => "https://account.pretendo.cc/v1/api",
        }
    }
}
