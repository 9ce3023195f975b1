//! Classification of raw account server responses.
//!
//! Fault documents and success documents may share a status code, so the body shape
//! decides: a fault document always wins over the status line.

use reqwest::StatusCode;

use crate::{
    error::AccountServerError,
    fault::{ErrorXml, ErrorXmlError},
};

/// A response that was fully received.
#[derive(Debug, Clone)]
pub(crate) struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Operation-specific success schema.
pub(crate) trait ResponseSchema: Sized {
    /// Faults that answer the operation rather than reject it.
    fn from_fault(_fault: &ErrorXml) -> Option<Self> {
        None
    }

    /// Decodes a body that is not a fault document.
    fn from_success(status: StatusCode, body: &[u8]) -> Option<Self>;
}

/// The three states a response can end up in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Classified<T> {
    Success(T),
    /// The first error of the fault document.
    ProtocolFault(ErrorXmlError),
    TransportError(String),
}

impl<T> Classified<T> {
    pub(crate) fn into_result(self) -> Result<T, AccountServerError> {
        match self {
            Self::Success(payload) => Ok(payload),
            Self::ProtocolFault(error) => Err(error.into()),
            Self::TransportError(message) => Err(AccountServerError::Generic { message }),
        }
    }
}

/// Classifies the outcome of a request. `Err` means no response was received.
pub(crate) fn classify<T: ResponseSchema>(outcome: Result<RawResponse, String>) -> Classified<T> {
    let response = match outcome {
        Ok(response) => response,
        Err(message) => return Classified::TransportError(message),
    };

    if let Some(fault) = ErrorXml::parse(&response.body) {
        if let Some(payload) = T::from_fault(&fault) {
            return Classified::Success(payload);
        }
        // `parse` never yields a document without errors
        if let Some(first) = fault.errors.into_iter().next() {
            return Classified::ProtocolFault(first);
        }
    }

    if let Some(payload) = T::from_success(response.status, &response.body) {
        return Classified::Success(payload);
    }

    // only a short prefix, the body may echo request data
    let snippet = String::from_utf8_lossy(&response.body)
        .chars()
        .take(20)
        .collect::<String>();
    Classified::TransportError(format!(
        "unexpected response body with status {}: {snippet:?}",
        response.status.as_u16()
    ))
}
