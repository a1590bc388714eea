//! An NTLM message codec and challenge-response calculator for Rust.
//!
//! The crate decodes and encodes the three messages of the NTLM handshake (Negotiate, Challenge and
//! Authenticate) byte-for-byte and calculates NTLMv1, NTLM2 session and NTLMv2 responses. Moving
//! the messages between client and server is left to the caller; [`transport`] has helpers for
//! the `NTLM <base64>` form used in HTTP headers.
//!
//! Sample usage:
//! ```
//! use ntlmssp::{Credentials, Message, NegotiateMessage, ResponseOptions};
//!
//! // send this to the server...
//! let negotiate = ntlmssp::transport::authorization_header(&NegotiateMessage::default().into())
//!     .expect("failed to encode negotiate message");
//! assert!(negotiate.starts_with("NTLM "));
//!
//! // ...and get this back in the WWW-Authenticate header
//! let challenge_header = concat!(
//!     "NTLM TlRMTVNTUAACAAAAHAAcADgAAAAFgooCJ+UA1//+ZM4AAAAAAAAAAJAAkABUAAAABgGxHQAAAA9WAEEARwBSAE",
//!     "EATgBUAC0AMgAwADAAOABSADIAAgAcAFYAQQBHAFIAQQBOAFQALQAyADAAMAA4AFIAMgABABwAVgBBAEcAUgBBAE4A",
//!     "VAAtADIAMAAwADgAUgAyAAQAHAB2AGEAZwByAGEAbgB0AC0AMgAwADAAOABSADIAAwAcAHYAYQBnAHIAYQBuAHQALQ",
//!     "AyADAAMAA4AFIAMgAHAAgAZBMdFHQnzgEAAAAA",
//! );
//! let challenge = match ntlmssp::transport::parse_authenticate_header(challenge_header) {
//!     Ok(Message::Challenge(c)) => c,
//!     other => panic!("expected a challenge, obtained {:?}", other),
//! };
//!
//! // calculate the response
//! let creds = Credentials {
//!     username: "vagrant".to_owned(),
//!     password: "vagrant".to_owned(),
//!     domain: String::new(),
//! };
//! let options = ResponseOptions {
//!     ntlmv2: true,
//!     workstation: "kobe.local".to_owned(),
//!     ..Default::default()
//! };
//! let authenticate = challenge.response(&creds, &options)
//!     .expect("failed to calculate response");
//! let authorization = ntlmssp::transport::authorization_header(&authenticate.into())
//!     .expect("failed to encode authenticate message");
//! assert!(authorization.starts_with("NTLM TlRMTVNTUAADAAAA"));
//! ```


#[cfg(windows)]
mod encoding_windows;

#[cfg(not(windows))]
mod encoding_utf8;

mod encoding;
mod error;
mod field_set;
mod flags;
mod hash;
mod message;
mod primitive;
mod response;
mod security_buffer;
mod target_info;
pub mod transport;


pub use crate::encoding::StringEncoding;
pub use crate::error::{ErrorKind, ParsingError, ResponseError, StoringError};
pub use crate::flags::Flags;
pub use crate::hash::{
    des_long, get_ntlm_time, lm_v1_password_func, ntlm_v1_password_func, ntlm_v2_password_func,
};
pub use crate::message::{AuthenticateMessage, ChallengeMessage, Message, NegotiateMessage, OsVersion};
pub use crate::response::{
    ChallengeResponse, ResponseOptions, respond_challenge_ntlm_v1, respond_challenge_ntlm_v1_extended,
    respond_challenge_ntlm_v1_no_lm, respond_challenge_ntlm_v2,
};
pub use crate::security_buffer::SecurityBuffer;
pub use crate::target_info::{TargetInfo, TargetInfoEntry, TargetInfoType};


/// The magic value at the start of every NTLMSSP data packet.
pub const NTLMSSP_MAGIC: [u8; 8] = *b"NTLMSSP\0";


/// Standard NTLM credentials, consisting of username, password and domain.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Credentials {
    /// The username part of the credentials.
    pub username: String,

    /// The password part of the credentials.
    pub password: String,

    /// The domain part of the credentials.
    ///
    /// Often specified in combination with the username as `<DOMAIN>\<USERNAME>`. In credentials
    /// without a domain, the domain is an empty string.
    pub domain: String,
}
