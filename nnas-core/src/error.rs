use thiserror::Error;

use crate::fault::ErrorXmlError;

/// Error outputs from the account server client.
///
/// Together with `Ok(_)` this forms the tri-state result of every operation: no error,
/// a generic (local or transport) error, or a fault document issued by the server.
#[derive(Debug, Clone, PartialEq, Eq, Error, uniffi::Error)]
pub enum AccountServerError {
    /// Local or transport-level failure: invalid credentials at construction, connection,
    /// TLS, timeout, read errors or a response body of unexpected shape.
    #[error("{message}")]
    Generic {
        /// Human readable description of the failure.
        message: String,
    },
    /// The server answered with a well-formed fault document.
    #[error("code {code}, caused by: {cause}: {message}")]
    Fault {
        /// The `cause` element of the fault document.
        cause: String,
        /// The `code` element of the fault document, verbatim.
        code: String,
        /// The `message` element of the fault document.
        message: String,
    },
}

impl AccountServerError {
    pub(crate) fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Returns the discriminant of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Generic { .. } => ErrorKind::Generic,
            Self::Fault { .. } => ErrorKind::Fault,
        }
    }
}

impl From<ErrorXmlError> for AccountServerError {
    fn from(error: ErrorXmlError) -> Self {
        Self::Fault {
            cause: error.cause,
            code: error.code,
            message: error.message,
        }
    }
}

/// Discriminant of the tri-state result.
///
/// The numeric values are part of the C ABI and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorKind {
    /// The server returned a fault document.
    Fault = 0,
    /// A local or transport-level error occurred.
    Generic = 1,
    /// The operation succeeded.
    None = 2,
}

impl ErrorKind {
    /// Returns the discriminant for the outcome of an operation.
    #[must_use]
    pub const fn of<T>(result: &Result<T, AccountServerError>) -> Self {
        match result {
            Ok(_) => Self::None,
            Err(error) => error.kind(),
        }
    }
}

/// Result type returned by every account server operation.
pub type AccountServerResult<T, E = AccountServerError> = std::result::Result<T, E>;
