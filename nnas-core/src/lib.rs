#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Client for the Nintendo Network account server (NNAS).
//!
//! Requests are authenticated with a client certificate (mutual TLS) and carry the
//! device/application identity of a [`ClientIdentity`]. Every operation resolves to
//! one of three states: success, a structured server fault ([`AccountServerError::Fault`])
//! or a local/transport failure ([`AccountServerError::Generic`]).
//!
//! ```rust,no_run
//! use nnas_core::{AccountServer, AccountServerClient, ClientIdentity};
//!
//! # fn run(cert_pem: String, key_pem: String, identity: ClientIdentity) -> Result<(), nnas_core::AccountServerError> {
//! let client = AccountServerClient::with_server(AccountServer::Nintendo, cert_pem, key_pem, identity)?;
//! if client.does_user_exist("superwhiskers")? {
//!     println!("taken");
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub use client::AccountServerClient;

pub mod defaults;
pub use defaults::AccountServer;

mod error;
pub use error::*;

pub mod fault;
pub use fault::{AccountServerErrorCode, ErrorXml, ErrorXmlError};

mod identity;
pub use identity::{client_identity_from_json, ClientIdentity};

pub mod logger;

mod transport;
pub use transport::{TransportConfig, TransportOptions};

// private modules
mod response;

uniffi::setup_scaffolding!("nnas_core");
