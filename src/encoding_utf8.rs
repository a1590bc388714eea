//! OEM codepage conversion on operating systems other than Windows.
//!
//! Other operating systems do not have a concept of an OEM or ANSI character set. While a custom
//! character set may be chosen, the absolute majority of systems use UTF-8, so OEM strings are
//! treated as UTF-8.


use crate::error::{ParsingError, StoringError};


/// Decodes an OEM byte string into a Rust string.
pub(crate) fn oem_to_string(oem: &[u8]) -> Result<String, ParsingError> {
    String::from_utf8(Vec::from(oem))
        .or(Err(ParsingError::InvalidOemEncoding { value: Vec::from(oem) }))
}


/// Encodes a Rust string into an OEM byte string.
pub(crate) fn string_to_oem(string: &str) -> Result<Vec<u8>, StoringError> {
    Ok(Vec::from(string.as_bytes()))
}
