//! Text encodings of NTLM messages for protocols such as HTTP.
//!
//! Messages travel as standard base64 without line wrapping, usually in `Authorization` and
//! `WWW-Authenticate` headers of the form `NTLM <base64>`.


use base64::prelude::{BASE64_STANDARD, Engine};

use crate::error::{ParsingError, StoringError};
use crate::message::Message;


/// The authentication scheme name used in HTTP headers.
pub const HTTP_SCHEME: &str = "NTLM";


/// Encodes a message as base64.
pub fn to_base64(message: &Message) -> Result<String, StoringError> {
    let bytes = message.to_bytes()?;
    Ok(BASE64_STANDARD.encode(bytes))
}

/// Decodes a message from base64.
pub fn from_base64(token: &str) -> Result<Message, ParsingError> {
    let bytes = BASE64_STANDARD.decode(token.trim())
        .map_err(|e| ParsingError::InvalidBase64 { message: e.to_string() })?;
    Message::try_from(bytes.as_slice())
}

/// Assembles the value of an `Authorization` header carrying the message.
pub fn authorization_header(message: &Message) -> Result<String, StoringError> {
    Ok(format!("{} {}", HTTP_SCHEME, to_base64(message)?))
}

/// Extracts the message from the value of a `WWW-Authenticate` header.
///
/// The scheme name is matched case-insensitively. A header without a token (a bare `NTLM`, as sent
/// to initiate the handshake) is reported as [`ParsingError::ShortHeader`].
pub fn parse_authenticate_header(value: &str) -> Result<Message, ParsingError> {
    let value = value.trim();
    let (scheme, token) = value.split_once(' ')
        .unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case(HTTP_SCHEME) {
        return Err(ParsingError::UnexpectedScheme { scheme: scheme.to_owned() });
    }
    from_base64(token)
}
