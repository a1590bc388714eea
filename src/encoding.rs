//! String encodings used in NTLM messages.


use crate::error::{ParsingError, StoringError};
use crate::flags::Flags;

#[cfg(windows)]
use crate::encoding_windows::{oem_to_string, string_to_oem};

#[cfg(not(windows))]
use crate::encoding_utf8::{oem_to_string, string_to_oem};


/// The encoding of the strings stored in an NTLM message.
///
/// The encoding is negotiated once through the [`Flags::NEGOTIATE_UNICODE`] flag and then passed
/// explicitly to every function that converts between strings and message bytes.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum StringEncoding {
    /// UTF-16 in little-endian byte order, without a Byte Order Mark.
    Unicode,

    /// The OEM codepage of the local system.
    Oem,
}
impl StringEncoding {
    /// Derives the encoding from a negotiated flag set.
    ///
    /// Unicode wins whenever it has been negotiated; everything else falls back to OEM.
    pub fn from_flags(flags: Flags) -> Self {
        if flags.is_unicode() {
            Self::Unicode
        } else {
            Self::Oem
        }
    }

    /// Encodes a string into message bytes.
    pub fn encode(&self, string: &str) -> Result<Vec<u8>, StoringError> {
        match self {
            Self::Unicode => Ok(string_to_utf16_le_bytes(string)),
            Self::Oem => string_to_oem(string),
        }
    }

    /// Decodes message bytes into a string.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, ParsingError> {
        match self {
            Self::Unicode => utf16_le_bytes_to_string(bytes),
            Self::Oem => oem_to_string(bytes),
        }
    }
}


/// Encodes a string as UTF-16 in little-endian byte order.
pub(crate) fn string_to_utf16_le_bytes(string: &str) -> Vec<u8> {
    string.encode_utf16()
        .flat_map(|w| w.to_le_bytes())
        .collect()
}

/// Converts UTF-16 values stored as bytes in little-endian format into a string.
pub(crate) fn utf16_le_bytes_to_string(bytes: &[u8]) -> Result<String, ParsingError> {
    if bytes.len() % 2 != 0 {
        return Err(ParsingError::ItemLengthNotDivisible { expected_divisor: 2, obtained_length: bytes.len() });
    }
    let u16s: Vec<u16> = bytes.chunks_exact(2)
        .map(|chk| u16::from_le_bytes([chk[0], chk[1]]))
        .collect();
    String::from_utf16(&u16s)
        .or(Err(ParsingError::InvalidUtf16 { value: u16s }))
}
