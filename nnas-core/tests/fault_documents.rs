//! Fault documents as the account server sends them.

use nnas_core::{AccountServerError, AccountServerErrorCode, ErrorXml, ErrorXmlError};

const ACCOUNT_ID_EXISTS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<errors>
  <error>
    <code>0100</code>
    <message>Account ID already exists</message>
  </error>
</errors>"#;

#[test]
fn test_parse_server_document() {
    let document = ErrorXml::parse(ACCOUNT_ID_EXISTS.as_bytes()).unwrap();

    let error = document.first().unwrap();
    assert_eq!(error.cause, "");
    assert_eq!(error.code, "0100");
    assert_eq!(error.known_code(), Some(AccountServerErrorCode::AccountIdExists));
    assert!(document.contains(AccountServerErrorCode::AccountIdExists));
}

#[test]
fn test_serialized_document_parses_back() {
    let document = ErrorXml {
        errors: vec![ErrorXmlError {
            cause: "X-Nintendo-Client-Secret".to_string(),
            code: "0004".to_string(),
            message: "client_id and client_secret are incorrect".to_string(),
        }],
    };

    let xml = document.to_xml().unwrap();

    assert!(xml.starts_with("<errors><error>"));
    assert_eq!(ErrorXml::parse(xml.as_bytes()), Some(document));
}

#[test]
fn test_bodies_that_are_not_faults() {
    for body in [
        &b""[..],
        b"<errors/>",
        b"<person><user_id>superwhiskers</user_id></person>",
        b"{\"error\": \"0100\"}",
        b"\xff\xfe<errors>",
    ] {
        assert_eq!(ErrorXml::parse(body), None, "{:?}", String::from_utf8_lossy(body));
    }
}

#[test]
fn test_fault_becomes_error() {
    let error = ErrorXmlError {
        cause: "Bad Request".to_string(),
        code: "1104".to_string(),
        message: "User ID format is invalid".to_string(),
    };

    assert_eq!(error.known_code(), Some(AccountServerErrorCode::AccountIdFormatInvalid));
    assert_eq!(
        AccountServerError::from(error).to_string(),
        "code 1104, caused by: Bad Request: User ID format is invalid"
    );
}
