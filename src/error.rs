//! Errors raised while decoding, encoding and answering NTLM messages.


use std::fmt;


/// The broad category an error belongs to.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ErrorKind {
    /// The message does not start with `NTLMSSP\0`.
    Signature,

    /// The message type discriminator is not 1, 2 or 3.
    UnknownType,

    /// The bytes do not describe a well-formed structure, or a value does not fit the wire format.
    Format,

    /// A field required for computing a response is absent.
    MissingField,

    /// The requested negotiation cannot be satisfied.
    UnsupportedNegotiation,
}


/// An error that may occur while parsing existing NTLM packets.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ParsingError {
    /// The header is shorter than expected.
    ShortHeader { expected_min_len: usize, obtained_len: usize },

    /// The magic value does not match the expected one.
    MagicMismatch { expected: [u8; 8], obtained: Vec<u8> },

    /// The message type is not one of the three handshake messages.
    UnknownMessageType { message_type: u32 },

    /// The message is of a different type than the one being decoded.
    UnexpectedMessageType { expected: u32, obtained: u32 },

    /// An internal item has a different length than expected.
    ItemLengthMismatch { expected: usize, obtained: usize },

    /// An internal item is shorter than expected.
    ItemMinLengthMismatch { expected_at_least: usize, obtained: usize },

    /// An internal item's length is not divisible by an expected divisor.
    ItemLengthNotDivisible { expected_divisor: usize, obtained_length: usize },

    /// A security buffer points outside of the message.
    OutOfBounds { offset: u32, length: u16, message_length: usize },

    /// The target information terminator carries data.
    TerminatorWithData { length: u16 },

    /// A byte string cannot be decoded using the current OEM encoding.
    InvalidOemEncoding { value: Vec<u8> },

    /// A string of 16-bit characters could not be decoded.
    InvalidUtf16 { value: Vec<u16> },

    /// A transport token is not valid base64.
    InvalidBase64 { message: String },

    /// A header names an authentication scheme other than NTLM.
    UnexpectedScheme { scheme: String },
}
impl ParsingError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MagicMismatch { .. } => ErrorKind::Signature,
            Self::UnknownMessageType { .. } => ErrorKind::UnknownType,
            Self::UnexpectedMessageType { .. } => ErrorKind::UnknownType,
            _ => ErrorKind::Format,
        }
    }
}
impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortHeader { expected_min_len, obtained_len }
                => write!(f, "header too short (expected at least {} bytes, obtained {})", expected_min_len, obtained_len),
            Self::MagicMismatch { expected, obtained }
                => write!(f, "mismatched magic (expected {:?}, obtained {:?})", expected, obtained),
            Self::UnknownMessageType { message_type }
                => write!(f, "unknown NTLM message type {}", message_type),
            Self::UnexpectedMessageType { expected, obtained }
                => write!(f, "expected NTLM message type {}, obtained {}", expected, obtained),
            Self::ItemLengthMismatch { expected, obtained }
                => write!(f, "insufficient length for an internal item (expected {:?}, obtained {:?})", expected, obtained),
            Self::ItemMinLengthMismatch { expected_at_least, obtained }
                => write!(f, "insufficient minimum length for an internal item (expected at least {:?}, obtained {:?})", expected_at_least, obtained),
            Self::ItemLengthNotDivisible { expected_divisor, obtained_length }
                => write!(f, "item length {} not divisible by {}", obtained_length, expected_divisor),
            Self::OutOfBounds { offset, length, message_length }
                => write!(f, "security buffer ({} bytes at offset {}) exceeds message of {} bytes", length, offset, message_length),
            Self::TerminatorWithData { length }
                => write!(f, "target information terminator carries {} bytes of data", length),
            Self::InvalidOemEncoding { value }
                => write!(f, "failed to decode value with the current OEM encoding: {:?}", value),
            Self::InvalidUtf16 { value }
                => write!(f, "failed to decode value as UTF-16: {:?}", value),
            Self::InvalidBase64 { message }
                => write!(f, "failed to decode base64 token: {}", message),
            Self::UnexpectedScheme { scheme }
                => write!(f, "unexpected authentication scheme {:?}", scheme),
        }
    }
}
impl std::error::Error for ParsingError {
}

/// An error that may occur while writing an NTLM packet.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum StoringError {
    /// The string cannot be encoded using the OEM encoding.
    NonOemEncodable { string: String },

    /// A payload is too long to be described by a security buffer.
    BufferTooLong { length: usize },

    /// The message grew past the range of a 32-bit offset.
    MessageTooLong { length: usize },

    /// An optional field is present while an optional field preceding it is not.
    OptionalFieldGap { field: &'static str, missing: &'static str },
}
impl StoringError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Format
    }
}
impl fmt::Display for StoringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonOemEncodable { string }
                => write!(f, "failed to encode {:?} using OEM encoding", string),
            Self::BufferTooLong { length }
                => write!(f, "payload of {} bytes does not fit into a security buffer", length),
            Self::MessageTooLong { length }
                => write!(f, "message of {} bytes exceeds the 32-bit offset range", length),
            Self::OptionalFieldGap { field, missing }
                => write!(f, "optional field {} cannot be stored without {}", field, missing),
        }
    }
}
impl std::error::Error for StoringError {
}

/// An error that may occur while computing the response to a Challenge message.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ResponseError {
    /// A field required for the computation is absent.
    MissingField { field: &'static str },

    /// The requested negotiation cannot be satisfied.
    UnsupportedNegotiation { reason: String },

    /// The Challenge message contents could not be interpreted.
    Parsing(ParsingError),

    /// The Authenticate message could not be assembled.
    Storing(StoringError),
}
impl ResponseError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField { .. } => ErrorKind::MissingField,
            Self::UnsupportedNegotiation { .. } => ErrorKind::UnsupportedNegotiation,
            Self::Parsing(e) => e.kind(),
            Self::Storing(e) => e.kind(),
        }
    }
}
impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field }
                => write!(f, "challenge message lacks the {} field", field),
            Self::UnsupportedNegotiation { reason }
                => write!(f, "unsupported negotiation: {}", reason),
            Self::Parsing(e)
                => write!(f, "failed to interpret challenge: {}", e),
            Self::Storing(e)
                => write!(f, "failed to assemble authenticate message: {}", e),
        }
    }
}
impl std::error::Error for ResponseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parsing(e) => Some(e),
            Self::Storing(e) => Some(e),
            _ => None,
        }
    }
}
impl From<ParsingError> for ResponseError {
    fn from(e: ParsingError) -> Self {
        Self::Parsing(e)
    }
}
impl From<StoringError> for ResponseError {
    fn from(e: StoringError) -> Self {
        Self::Storing(e)
    }
}


#[cfg(test)]
mod tests {
    use std::error::Error;
    use super::*;

    #[test]
    fn response_error_kinds() {
        let unsupported = ResponseError::UnsupportedNegotiation { reason: "no randomness".to_owned() };
        assert_eq!(unsupported.kind(), ErrorKind::UnsupportedNegotiation);
        assert!(unsupported.to_string().contains("no randomness"));
        assert!(unsupported.source().is_none());

        let missing = ResponseError::MissingField { field: "challenge" };
        assert_eq!(missing.kind(), ErrorKind::MissingField);
    }

    #[test]
    fn wrapped_errors_keep_their_kind() {
        let parsing = ResponseError::from(ParsingError::MagicMismatch { expected: *b"NTLMSSP\0", obtained: vec![0; 8] });
        assert_eq!(parsing.kind(), ErrorKind::Signature);
        assert!(parsing.source().is_some());

        let storing = ResponseError::from(StoringError::BufferTooLong { length: 70_000 });
        assert_eq!(storing.kind(), ErrorKind::Format);
    }
}
