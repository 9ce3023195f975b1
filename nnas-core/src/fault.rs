//! Fault documents returned by the account server.
//!
//! A fault is an XML sheet of the form
//! `<errors><error><cause/><code/><message/></error></errors>`. Some server
//! implementations answer with a bare `<error>` root; both shapes are accepted.

use std::{borrow::Cow, str::FromStr};

use quick_xml::{events::Event, Reader};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::AccountServerError;

/// A parsed account server fault document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "errors")]
pub struct ErrorXml {
    /// Every `<error>` element of the document, in document order.
    #[serde(rename = "error", default)]
    pub errors: Vec<ErrorXmlError>,
}

/// A single `<error>` element of an [`ErrorXml`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "error")]
pub struct ErrorXmlError {
    /// What the server blames, usually a parameter or header name.
    #[serde(default)]
    pub cause: String,
    /// The account server error code, verbatim (normally four digits).
    #[serde(default)]
    pub code: String,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
}

impl ErrorXml {
    /// Parses a response body as a fault document.
    ///
    /// Returns `None` when the body is not a fault document: not UTF-8, not XML, a
    /// different root element, or no `<error>` element with any content. Empty
    /// `<error/>` elements are dropped, so a parsed document always holds at least
    /// one error.
    #[must_use]
    pub fn parse(body: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(body).ok()?;

        let mut document = match root_element(text)?.as_str() {
            "errors" => quick_xml::de::from_str::<Self>(text).ok()?,
            "error" => Self {
                errors: vec![quick_xml::de::from_str::<ErrorXmlError>(text).ok()?],
            },
            _ => return None,
        };

        // an element without cause, code or message carries nothing to report
        document
            .errors
            .retain(|error| *error != ErrorXmlError::default());
        if document.errors.is_empty() {
            return None;
        }
        Some(document)
    }

    /// Serializes the document in the format the server uses.
    ///
    /// # Errors
    /// Returns a generic error if serialization fails.
    pub fn to_xml(&self) -> Result<String, AccountServerError> {
        quick_xml::se::to_string(self).map_err(|e| {
            AccountServerError::generic(format!("failed to serialize fault document: {e}"))
        })
    }

    /// Returns the first error of the document, the one surfaced to callers.
    #[must_use]
    pub fn first(&self) -> Option<&ErrorXmlError> {
        self.errors.first()
    }

    /// Whether any error of the document carries the given code.
    #[must_use]
    pub fn contains(&self, code: AccountServerErrorCode) -> bool {
        self.errors
            .iter()
            .any(|error| error.known_code() == Some(code))
    }
}

impl ErrorXmlError {
    /// Looks the code up in the catalog of documented account server codes.
    ///
    /// Numeric codes shorter than four digits are zero-padded first, so `"106"` and
    /// `"0106"` resolve to the same entry.
    #[must_use]
    pub fn known_code(&self) -> Option<AccountServerErrorCode> {
        AccountServerErrorCode::from_str(&normalize_code(&self.code)).ok()
    }
}

fn normalize_code(code: &str) -> Cow<'_, str> {
    let code = code.trim();
    if !code.is_empty() && code.len() < 4 && code.bytes().all(|b| b.is_ascii_digit()) {
        Cow::Owned(format!("{code:0>4}"))
    } else {
        Cow::Borrowed(code)
    }
}

/// Returns the local name of the document's root element, skipping the prolog.
fn root_element(text: &str) -> Option<String> {
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event().ok()? {
            Event::Start(e) | Event::Empty(e) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Event::Decl(_) | Event::Comment(_) | Event::DocType(_) | Event::PI(_) => {}
            Event::Text(t) if t.iter().all(u8::is_ascii_whitespace) => {}
            _ => return None,
        }
    }
}

/// Documented account server error codes.
///
/// Entries marked as Pretendo-specific have only been observed on the Pretendo
/// reimplementation of the account server.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
pub enum AccountServerErrorCode {
    /// Pretendo-specific.
    #[strum(to_string = "0000")]
    Unknown,
    /// A parameter of the request has the wrong format.
    #[strum(to_string = "0001")]
    BadParameterFormat,
    /// The request itself is malformed.
    #[strum(to_string = "0002")]
    BadRequestFormat,
    /// A required request parameter is missing.
    #[strum(to_string = "0003")]
    MissingRequestParameter,
    /// The client identity headers were rejected.
    #[strum(to_string = "0004")]
    UnauthorizedClient,
    #[strum(to_string = "0005")]
    InvalidAccountToken,
    #[strum(to_string = "0006")]
    ExpiredAccountToken,
    #[strum(to_string = "0007")]
    ForbiddenRequest,
    #[strum(to_string = "0008")]
    RequestNotFound,
    #[strum(to_string = "0009")]
    InvalidHttpMethod,
    #[strum(to_string = "0010")]
    InvalidPlatformId,
    #[strum(to_string = "0011")]
    SystemUpdateRequired,
    /// The device is permanently banned from all services.
    #[strum(to_string = "0012")]
    BannedDevice,
    /// The requested account id is already taken.
    #[strum(to_string = "0100")]
    AccountIdExists,
    #[strum(to_string = "0101")]
    InvalidAccountId,
    #[strum(to_string = "0103")]
    InvalidMailAddress,
    #[strum(to_string = "0104")]
    UnauthorizedDevice,
    #[strum(to_string = "0105")]
    RegistrationLimitReached,
    #[strum(to_string = "0106")]
    InvalidAccountPassword,
    #[strum(to_string = "0107")]
    CountryMismatch,
    /// The account is permanently banned from all services.
    #[strum(to_string = "0108")]
    BannedAccount,
    #[strum(to_string = "0110")]
    DeviceMismatch,
    #[strum(to_string = "0111")]
    AccountIdChanged,
    #[strum(to_string = "0112")]
    AccountDeleted,
    #[strum(to_string = "0114")]
    CoppaNotAccepted,
    #[strum(to_string = "0115")]
    AssociationLimitReached,
    #[strum(to_string = "0116")]
    InvalidConfirmationCode,
    #[strum(to_string = "0117")]
    ConfirmationCodeExpired,
    #[strum(to_string = "0118")]
    GameServerUniqueIdNotLinked,
    #[strum(to_string = "0119")]
    BannedAccountInApplication,
    #[strum(to_string = "0120")]
    BannedDeviceInApplication,
    #[strum(to_string = "0121")]
    BannedAccountInNexService,
    #[strum(to_string = "0122")]
    BannedDeviceInNexService,
    #[strum(to_string = "0123")]
    ServiceClosed,
    #[strum(to_string = "0124")]
    ApplicationUpdateRequired,
    #[strum(to_string = "0125")]
    ClientUniqueIdNotLinked,
    #[strum(to_string = "0126")]
    BannedAccountInIndependentService,
    #[strum(to_string = "0127")]
    BannedDeviceInIndependentService,
    #[strum(to_string = "0128")]
    MailAddressNotValidated,
    #[strum(to_string = "0129")]
    WrongBirthdateOrMailAddress,
    #[strum(to_string = "0130")]
    PidNotFound,
    #[strum(to_string = "0131")]
    WrongAccountMail,
    #[strum(to_string = "0132")]
    TempbannedAccount,
    #[strum(to_string = "0134")]
    TempbannedAccountInApplication,
    #[strum(to_string = "0136")]
    TempbannedAccountInNexService,
    #[strum(to_string = "0137")]
    TempbannedDeviceInNexService,
    #[strum(to_string = "0138")]
    TempbannedAccountInIndependentService,
    #[strum(to_string = "0139")]
    TempbannedDeviceInIndependentService,
    #[strum(to_string = "0142")]
    CoppaAgreementCanceled,
    #[strum(to_string = "0143")]
    DeviceInactive,
    #[strum(to_string = "1004")]
    EulaNotAccepted,
    #[strum(to_string = "1006")]
    InvalidUniqueId,
    #[strum(to_string = "1016")]
    NexAccountNotFound,
    #[strum(to_string = "1017")]
    GameServerIdEnvironmentNotFound,
    #[strum(to_string = "1018")]
    TokenGenerationFailed,
    #[strum(to_string = "1019")]
    InvalidNexClientId,
    #[strum(to_string = "1020")]
    InvalidClientKey,
    #[strum(to_string = "1021")]
    InvalidGameServerId,
    #[strum(to_string = "1022")]
    InvalidClientId,
    #[strum(to_string = "1023")]
    WrongMailAddress,
    #[strum(to_string = "1024")]
    MasterPinNotFound,
    #[strum(to_string = "1025")]
    MailTextNotFound,
    #[strum(to_string = "1031")]
    MailSendFailed,
    #[strum(to_string = "1032")]
    DomainAccountAlreadyExists,
    #[strum(to_string = "1033")]
    ExcessiveMailSendRequest,
    #[strum(to_string = "1035")]
    CreditCardGeneralFailure,
    #[strum(to_string = "1036")]
    CreditCardDateExpired,
    #[strum(to_string = "1037")]
    CreditCardDeclined,
    #[strum(to_string = "1038")]
    InvalidCreditCardNumber,
    #[strum(to_string = "1039")]
    CreditCardNumberWrong,
    #[strum(to_string = "1040")]
    InvalidCreditCardDate,
    #[strum(to_string = "1041")]
    CreditCardBlacklisted,
    #[strum(to_string = "1042")]
    InvalidCreditCardPin,
    #[strum(to_string = "1043")]
    WrongCreditCardPin,
    #[strum(to_string = "1044")]
    InvalidLocation,
    #[strum(to_string = "1045")]
    InvalidPostalCode,
    #[strum(to_string = "1046")]
    DeviceEulaCountryMismatch,
    #[strum(to_string = "1100")]
    InvalidEulaCountry,
    #[strum(to_string = "1101")]
    InvalidEulaCountryAndVersion,
    #[strum(to_string = "1103")]
    ParentalControlsRequired,
    /// The account id does not satisfy the server's format rules.
    #[strum(to_string = "1104")]
    AccountIdFormatInvalid,
    #[strum(to_string = "1105")]
    WrongAccountPasswordOrMailAddress,
    #[strum(to_string = "1106")]
    AuthenticationLocked,
    #[strum(to_string = "1107")]
    AccountIdPasswordSame,
    #[strum(to_string = "1111")]
    ApprovalIdNotFound,
    #[strum(to_string = "1115")]
    PendingMigration,
    #[strum(to_string = "1125")]
    MailAddressDomainNameNotAcceptable,
    #[strum(to_string = "1126")]
    MailAddressDomainNameNotResolved,
    #[strum(to_string = "1200")]
    CountryNotProvided,
    /// Pretendo-specific.
    #[strum(to_string = "1600")]
    BadRequest,
    #[strum(to_string = "2001")]
    InternalServerError,
    #[strum(to_string = "2002")]
    UnderMaintenance,
    #[strum(to_string = "2999")]
    NintendoNetworkClosed,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    const CLIENT_ID_FAULT: &str = "<errors><error><cause>client_id</cause><code>0004</code><message>API application invalid or incorrect application credentials</message></error></errors>";

    fn client_id_fault() -> ErrorXml {
        ErrorXml {
            errors: vec![ErrorXmlError {
                cause: "client_id".to_string(),
                code: "0004".to_string(),
                message: "API application invalid or incorrect application credentials"
                    .to_string(),
            }],
        }
    }

    #[test]
    fn test_parse_errors_document() {
        let parsed = ErrorXml::parse(CLIENT_ID_FAULT.as_bytes()).unwrap();
        assert_eq!(parsed, client_id_fault());
        assert_eq!(
            parsed.first().and_then(ErrorXmlError::known_code),
            Some(AccountServerErrorCode::UnauthorizedClient)
        );
    }

    #[test]
    fn test_format_matches_server_format() {
        assert_eq!(client_id_fault().to_xml().unwrap(), CLIENT_ID_FAULT);
    }

    #[test]
    fn test_parse_with_prolog_and_whitespace() {
        let body = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<errors>\n  <error>\n    <cause>device_id</cause>\n    <code>0110</code>\n    <message>Unlinked device</message>\n  </error>\n</errors>\n";

        let parsed = ErrorXml::parse(body.as_bytes()).unwrap();
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].cause, "device_id");
        assert!(parsed.contains(AccountServerErrorCode::DeviceMismatch));
    }

    #[test]
    fn test_parse_bare_error_root() {
        let body = b"<error><cause>badRequest</cause><code>106</code><message>invalid id</message></error>";

        let parsed = ErrorXml::parse(body).unwrap();
        let first = parsed.first().unwrap();
        assert_eq!(first.code, "106");
        assert_eq!(first.message, "invalid id");
        assert_eq!(
            first.known_code(),
            Some(AccountServerErrorCode::InvalidAccountPassword)
        );
    }

    #[test]
    fn test_empty_error_elements_are_dropped() {
        let body = b"<errors><error/><error><cause>client_id</cause><code>0004</code><message>API application invalid or incorrect application credentials</message></error></errors>";

        assert_eq!(ErrorXml::parse(body), Some(client_id_fault()));
    }

    #[test]
    fn test_parse_multiple_errors() {
        let body = b"<errors><error><cause>Bad Request</cause><code>1600</code><message>Unable to process request</message></error><error><code>0100</code><message>Account ID already exists</message></error></errors>";

        let parsed = ErrorXml::parse(body).unwrap();
        assert_eq!(parsed.errors.len(), 2);
        assert_eq!(parsed.errors[1].cause, "");
        assert!(parsed.contains(AccountServerErrorCode::AccountIdExists));
        assert!(parsed.contains(AccountServerErrorCode::BadRequest));
        assert!(!parsed.contains(AccountServerErrorCode::BannedDevice));
    }

    #[test_case(b"" ; "empty body")]
    #[test_case(b"<errors/>" ; "empty errors root")]
    #[test_case(b"<errors></errors>" ; "errors root without children")]
    #[test_case(b"<error/>" ; "empty error root")]
    #[test_case(b"<errors><error/></errors>" ; "errors root with empty error")]
    #[test_case(b"<errors><error><cause></cause><code></code></error></errors>" ; "errors root with blank elements")]
    #[test_case(b"<person><id>1</id></person>" ; "foreign root")]
    #[test_case(b"{\"exists\": true}" ; "json body")]
    #[test_case(b"not xml at all" ; "plain text")]
    #[test_case(&[0xff, 0xfe, 0x3c] ; "invalid utf8")]
    fn test_not_a_fault_document(body: &[u8]) {
        assert_eq!(ErrorXml::parse(body), None);
    }

    #[test_case("0100", Some(AccountServerErrorCode::AccountIdExists) ; "four digits")]
    #[test_case("100", Some(AccountServerErrorCode::AccountIdExists) ; "unpadded")]
    #[test_case(" 1104 ", Some(AccountServerErrorCode::AccountIdFormatInvalid) ; "surrounding whitespace")]
    #[test_case("4", Some(AccountServerErrorCode::UnauthorizedClient) ; "single digit")]
    #[test_case("9999", None ; "undocumented")]
    #[test_case("abc", None ; "not numeric")]
    #[test_case("", None ; "empty")]
    fn test_known_code(code: &str, expected: Option<AccountServerErrorCode>) {
        let error = ErrorXmlError {
            code: code.to_string(),
            ..ErrorXmlError::default()
        };
        assert_eq!(error.known_code(), expected);
    }

    #[test]
    fn test_code_display() {
        assert_eq!(AccountServerErrorCode::AccountIdExists.to_string(), "0100");
        assert_eq!(AccountServerErrorCode::NintendoNetworkClosed.to_string(), "2999");
    }
}
