//! C ABI over [`AccountServerClient`].
//!
//! Ownership rules:
//! - A client returned by [`nnas_account_server_client_new`] is released with
//!   [`nnas_account_server_client_free`].
//! - Every function taking an `NnasError *` accepts null. When it is not null the
//!   function always overwrites it, with [`NnasErrorType::None`] on success, and never
//!   reads or frees what was there before. Strings written into it are owned by the
//!   caller and released with [`nnas_error_free`].
//! - Panics are caught at the boundary and reported as generic errors.

use std::{
    ffi::{c_char, CStr, CString},
    panic::{catch_unwind, AssertUnwindSafe},
    ptr,
};

use nnas_core::{
    AccountServerClient, AccountServerError, ClientIdentity, ErrorKind, TransportOptions,
};

/// Discriminant of [`NnasError`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NnasErrorType {
    /// The server returned a fault document, see [`NnasError::error_xml`].
    Fault = 0,
    /// A local or transport-level error occurred, see [`NnasError::error`].
    Generic = 1,
    /// No error.
    None = 2,
}

impl From<ErrorKind> for NnasErrorType {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Fault => Self::Fault,
            ErrorKind::Generic => Self::Generic,
            ErrorKind::None => Self::None,
        }
    }
}

/// Fields of a server fault document. Null unless the error type is `Fault`.
#[repr(C)]
#[derive(Debug)]
pub struct NnasErrorXml {
    /// `cause` element.
    pub cause: *mut c_char,
    /// `code` element, verbatim.
    pub code: *mut c_char,
    /// `message` element.
    pub message: *mut c_char,
}

/// Tri-state error written by the C ABI functions.
#[repr(C)]
#[derive(Debug)]
pub struct NnasError {
    /// Which of the payload fields is populated.
    pub kind: NnasErrorType,
    /// Description of a generic error. Null unless the error type is `Generic`.
    pub error: *mut c_char,
    /// Fault document fields.
    pub error_xml: NnasErrorXml,
}

impl NnasError {
    /// An error of type `None` with all pointers null.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            kind: NnasErrorType::None,
            error: ptr::null_mut(),
            error_xml: NnasErrorXml {
                cause: ptr::null_mut(),
                code: ptr::null_mut(),
                message: ptr::null_mut(),
            },
        }
    }

    /// Converts the outcome of an operation, allocating the strings it carries.
    #[must_use]
    pub fn from_result<T>(result: &Result<T, AccountServerError>) -> Self {
        let mut error = Self::none();
        error.kind = ErrorKind::of(result).into();
        match result {
            Ok(_) => {}
            Err(AccountServerError::Generic { message }) => error.error = c_string(message),
            Err(AccountServerError::Fault {
                cause,
                code,
                message,
            }) => {
                error.error_xml = NnasErrorXml {
                    cause: c_string(cause),
                    code: c_string(code),
                    message: c_string(message),
                };
            }
        }
        error
    }
}

/// Identity fields as C strings. Device certificate, device type and FPD version may be
/// null; every other field must not be.
#[repr(C)]
#[derive(Debug)]
pub struct NnasClientIdentity {
    /// Application client id.
    pub client_id: *const c_char,
    /// Application client secret.
    pub client_secret: *const c_char,
    /// Device certificate, nullable.
    pub device_cert: *const c_char,
    /// Server environment.
    pub environment: *const c_char,
    /// Country code.
    pub country: *const c_char,
    /// Region bitmask.
    pub region: *const c_char,
    /// System version.
    pub system_version: *const c_char,
    /// Serial number.
    pub serial_number: *const c_char,
    /// Device id.
    pub device_id: *const c_char,
    /// Device type, nullable.
    pub device_type: *const c_char,
    /// Platform id.
    pub platform_id: *const c_char,
    /// FPD version, nullable.
    pub fpd_version: *const c_char,
}

impl NnasClientIdentity {
    /// Copies the fields into an owned [`ClientIdentity`].
    ///
    /// # Safety
    /// Every non-null field must point to a NUL-terminated string.
    unsafe fn to_identity(&self) -> Result<ClientIdentity, AccountServerError> {
        Ok(ClientIdentity {
            client_id: required_str(self.client_id, "client_id")?,
            client_secret: required_str(self.client_secret, "client_secret")?,
            device_cert: optional_str(self.device_cert, "device_cert")?,
            environment: required_str(self.environment, "environment")?,
            country: required_str(self.country, "country")?,
            region: required_str(self.region, "region")?,
            system_version: required_str(self.system_version, "system_version")?,
            serial_number: required_str(self.serial_number, "serial_number")?,
            device_id: required_str(self.device_id, "device_id")?,
            device_type: optional_str(self.device_type, "device_type")?,
            platform_id: required_str(self.platform_id, "platform_id")?,
            fpd_version: optional_str(self.fpd_version, "fpd_version")?,
        })
    }
}

/// Opaque client handle.
#[derive(Debug)]
pub struct NnasAccountServerClient(AccountServerClient);

/// Creates a client. Returns null on failure and describes the failure in `error`.
///
/// `root_certificate_pem` may be null. It is trusted in addition to the built-in roots.
/// The official servers use a private CA, so reaching them needs either that root or
/// `accept_invalid_server_certs`.
///
/// # Safety
/// `endpoint`, `certificate_pem`, `key_pem` and `root_certificate_pem` must be null or
/// NUL-terminated strings.
/// `identity` must be null or point to a valid [`NnasClientIdentity`]. `error` must be
/// null or point to writable memory for an [`NnasError`].
#[no_mangle]
pub unsafe extern "C" fn nnas_account_server_client_new(
    endpoint: *const c_char,
    certificate_pem: *const c_char,
    key_pem: *const c_char,
    identity: *const NnasClientIdentity,
    root_certificate_pem: *const c_char,
    accept_invalid_server_certs: bool,
    error: *mut NnasError,
) -> *mut NnasAccountServerClient {
    let result = guarded(|| {
        let identity = identity
            .as_ref()
            .ok_or_else(|| generic("identity is null"))?
            .to_identity()?;
        let options = TransportOptions {
            root_certificate_pem: optional_str(root_certificate_pem, "root_certificate_pem")?,
            accept_invalid_server_certs,
        };
        AccountServerClient::new_with_options(
            &required_str(endpoint, "endpoint")?,
            required_str(certificate_pem, "certificate_pem")?,
            required_str(key_pem, "key_pem")?,
            identity,
            options,
        )
    });

    write_error(error, &result);
    result.map_or(ptr::null_mut(), |client| {
        Box::into_raw(Box::new(NnasAccountServerClient(client)))
    })
}

/// Checks whether an account with the given network id exists.
///
/// Returns `1` if it exists, `0` if it does not and `-1` on error.
///
/// # Safety
/// `client` must be null or a live handle from [`nnas_account_server_client_new`].
/// `id` must be null or a NUL-terminated string. `error` must be null or point to
/// writable memory for an [`NnasError`].
#[no_mangle]
pub unsafe extern "C" fn nnas_account_server_client_does_user_exist(
    client: *const NnasAccountServerClient,
    id: *const c_char,
    error: *mut NnasError,
) -> i32 {
    let result = guarded(|| {
        let client = client.as_ref().ok_or_else(|| generic("client is null"))?;
        client.0.does_user_exist(&required_str(id, "id")?)
    });

    write_error(error, &result);
    match result {
        Ok(true) => 1,
        Ok(false) => 0,
        Err(_) => -1,
    }
}

/// Releases a client. Null is ignored.
///
/// # Safety
/// `client` must be null or a handle from [`nnas_account_server_client_new`] that has
/// not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn nnas_account_server_client_free(client: *mut NnasAccountServerClient) {
    if !client.is_null() {
        drop(Box::from_raw(client));
    }
}

/// Releases the strings held by an error and resets it to type `None`. Null is ignored.
///
/// # Safety
/// `error` must be null or point to an [`NnasError`] written by this library whose
/// strings have not been released yet.
#[no_mangle]
pub unsafe extern "C" fn nnas_error_free(error: *mut NnasError) {
    let Some(error) = error.as_mut() else {
        return;
    };
    for string in [
        error.error,
        error.error_xml.cause,
        error.error_xml.code,
        error.error_xml.message,
    ] {
        if !string.is_null() {
            drop(CString::from_raw(string));
        }
    }
    *error = NnasError::none();
}

/// Runs `f`, turning a panic into a generic error.
fn guarded<T>(f: impl FnOnce() -> Result<T, AccountServerError>) -> Result<T, AccountServerError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        log::error!("panic caught at the C ABI boundary");
        Err(generic("internal error"))
    })
}

unsafe fn write_error<T>(out: *mut NnasError, result: &Result<T, AccountServerError>) {
    if !out.is_null() {
        out.write(NnasError::from_result(result));
    }
}

fn generic(message: &str) -> AccountServerError {
    AccountServerError::Generic {
        message: message.to_string(),
    }
}

/// Copies a string for C, dropping interior NULs.
fn c_string(value: &str) -> *mut c_char {
    CString::new(value.replace('\0', ""))
        .unwrap_or_default()
        .into_raw()
}

unsafe fn optional_str(ptr: *const c_char, name: &str) -> Result<Option<String>, AccountServerError> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(|s| Some(s.to_string()))
        .map_err(|_| generic(&format!("{name} is not valid UTF-8")))
}

unsafe fn required_str(ptr: *const c_char, name: &str) -> Result<String, AccountServerError> {
    optional_str(ptr, name)?.ok_or_else(|| generic(&format!("{name} is null")))
}
