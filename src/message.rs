//! The three NTLM handshake messages and their wire layouts.
//!
//! Every message starts with the magic `NTLMSSP\0` and a 32-bit message type. The remaining header
//! consists of mandatory fields followed by a chain of optional fields; an optional field can only
//! be present if all optional fields before it are present as well.


use tracing::trace;

use crate::NTLMSSP_MAGIC;
use crate::encoding::StringEncoding;
use crate::error::{ParsingError, StoringError};
use crate::field_set::{FieldSetReader, FieldSetWriter, check_optional_chain};
use crate::flags::Flags;
use crate::primitive::{read_array, read_u32_le};
use crate::target_info::TargetInfo;


/// The length of the part shared by all messages: magic and message type.
const COMMON_HEADER_LEN: usize = 8 + 4;


/// An NTLM message.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Message {
    Negotiate(NegotiateMessage),
    Challenge(ChallengeMessage),
    Authenticate(AuthenticateMessage),
}
impl Message {
    /// Returns the 32-bit message number identifying the type of this message.
    pub fn message_number(&self) -> u32 {
        match self {
            Self::Negotiate(_) => NegotiateMessage::MESSAGE_TYPE,
            Self::Challenge(_) => ChallengeMessage::MESSAGE_TYPE,
            Self::Authenticate(_) => AuthenticateMessage::MESSAGE_TYPE,
        }
    }

    /// Serializes the NTLM message into bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        match self {
            Self::Negotiate(t1m) => t1m.to_bytes(),
            Self::Challenge(t2m) => t2m.to_bytes(),
            Self::Authenticate(t3m) => t3m.to_bytes(),
        }
    }
}
impl TryFrom<&[u8]> for Message {
    type Error = ParsingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let message_type = read_common_header(value)?;
        trace!(message_type, length = value.len(), "decoding NTLM message");
        match message_type {
            NegotiateMessage::MESSAGE_TYPE => NegotiateMessage::parse(value)
                .map(Message::Negotiate),
            ChallengeMessage::MESSAGE_TYPE => ChallengeMessage::parse(value)
                .map(Message::Challenge),
            AuthenticateMessage::MESSAGE_TYPE => AuthenticateMessage::parse(value)
                .map(Message::Authenticate),
            other => Err(ParsingError::UnknownMessageType { message_type: other }),
        }
    }
}
impl From<NegotiateMessage> for Message {
    fn from(m: NegotiateMessage) -> Self {
        Self::Negotiate(m)
    }
}
impl From<ChallengeMessage> for Message {
    fn from(m: ChallengeMessage) -> Self {
        Self::Challenge(m)
    }
}
impl From<AuthenticateMessage> for Message {
    fn from(m: AuthenticateMessage) -> Self {
        Self::Authenticate(m)
    }
}

/// Validates the magic and returns the message type.
fn read_common_header(value: &[u8]) -> Result<u32, ParsingError> {
    if value.len() < COMMON_HEADER_LEN {
        return Err(ParsingError::ShortHeader { expected_min_len: COMMON_HEADER_LEN, obtained_len: value.len() });
    }
    let obtained_magic: [u8; 8] = read_array(value, 0)?;
    if obtained_magic != NTLMSSP_MAGIC {
        return Err(ParsingError::MagicMismatch { expected: NTLMSSP_MAGIC, obtained: Vec::from(obtained_magic) });
    }
    read_u32_le(value, 8)
}

/// Validates the magic and checks that the message is of the expected type.
fn expect_common_header(value: &[u8], expected: u32) -> Result<(), ParsingError> {
    let obtained = read_common_header(value)?;
    if obtained != expected {
        return Err(ParsingError::UnexpectedMessageType { expected, obtained });
    }
    Ok(())
}

/// Starts a message with the magic and the message type.
fn start_message(message_type: u32) -> FieldSetWriter {
    let mut writer = FieldSetWriter::new();
    writer.fixed(&NTLMSSP_MAGIC);
    writer.u32(message_type);
    writer
}


/// A structure representing the version of an operating system as well as the NTLM revision used.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct OsVersion {
    pub major_version: u8,
    pub minor_version: u8,
    pub build_number: u16,
    pub reserved: [u8; 3],
    pub ntlm_revision: u8,
}
impl OsVersion {
    pub const SIZE: usize = 8;

    /// The NTLM revision announced by Windows Server 2003 and later.
    pub const NTLMSSP_REVISION_W2K3: u8 = 0x0F;

    /// Creates a version structure announcing the current NTLM revision.
    pub fn new(major_version: u8, minor_version: u8, build_number: u16) -> Self {
        Self {
            major_version,
            minor_version,
            build_number,
            reserved: [0, 0, 0],
            ntlm_revision: Self::NTLMSSP_REVISION_W2K3,
        }
    }

    /// Serializes the OS version structure into bytes.
    pub fn to_bytes(&self) -> [u8; 8] {
        let build = self.build_number.to_le_bytes();
        [
            self.major_version, self.minor_version, build[0], build[1],
            self.reserved[0], self.reserved[1], self.reserved[2], self.ntlm_revision,
        ]
    }
}
impl From<[u8; 8]> for OsVersion {
    fn from(value: [u8; 8]) -> Self {
        Self {
            major_version: value[0],
            minor_version: value[1],
            build_number: u16::from_le_bytes([value[2], value[3]]),
            reserved: [value[4], value[5], value[6]],
            ntlm_revision: value[7],
        }
    }
}
impl TryFrom<&[u8]> for OsVersion {
    type Error = ParsingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 8] = value.try_into()
            .or(Err(ParsingError::ItemLengthMismatch { expected: Self::SIZE, obtained: value.len() }))?;
        Ok(Self::from(bytes))
    }
}


/// The contents of an NTLM Negotiate message.
///
/// The Negotiate message is the first message in an NTLM challenge-response process and is sent by
/// the client to the server; the server is expected to respond with a Challenge message.
///
/// Domain and workstation are raw OEM bytes, as the protocol never encodes them as Unicode.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NegotiateMessage {
    /// Stores which information has been specified and which NTLM behavior should be negotiated.
    pub flags: Flags,

    /// The domain against which the client wishes to authenticate.
    pub domain: Option<Vec<u8>>,

    /// The NT hostname of the client.
    pub workstation: Option<Vec<u8>>,

    /// Version information about the client's operating system.
    pub os_version: Option<OsVersion>,
}
impl Default for NegotiateMessage {
    fn default() -> Self {
        Self {
            flags: Flags::TYPE1_DEFAULT,
            domain: None,
            workstation: None,
            os_version: None,
        }
    }
}
impl NegotiateMessage {
    pub const MESSAGE_TYPE: u32 = 0x0000_0001;
    const MIN_HEADER_LEN: usize = COMMON_HEADER_LEN + 4;

    /// Creates a Negotiate message with the given flags and no optional fields.
    pub fn new(flags: Flags) -> Self {
        Self {
            flags,
            ..Default::default()
        }
    }

    /// Supplies the domain name and announces it in the flags.
    pub fn with_domain(mut self, domain: &str) -> Result<Self, StoringError> {
        self.domain = Some(StringEncoding::Oem.encode(domain)?);
        self.flags |= Flags::NEGOTIATE_DOMAIN_SUPPLIED;
        Ok(self)
    }

    /// Supplies the workstation name and announces it in the flags.
    pub fn with_workstation(mut self, workstation: &str) -> Result<Self, StoringError> {
        self.domain.get_or_insert_with(Vec::new);
        self.workstation = Some(StringEncoding::Oem.encode(workstation)?);
        self.flags |= Flags::NEGOTIATE_WORKSTATION_SUPPLIED;
        Ok(self)
    }

    /// Attaches the version block and announces it in the flags.
    pub fn with_os_version(mut self, os_version: OsVersion) -> Self {
        self.domain.get_or_insert_with(Vec::new);
        self.workstation.get_or_insert_with(Vec::new);
        self.os_version = Some(os_version);
        self.flags |= Flags::NEGOTIATE_VERSION;
        self
    }

    /// Decodes the supplied domain name, if any.
    pub fn domain_name(&self) -> Result<Option<String>, ParsingError> {
        self.domain.as_deref()
            .map(|d| StringEncoding::Oem.decode(d))
            .transpose()
    }

    /// Decodes the supplied workstation name, if any.
    pub fn workstation_name(&self) -> Result<Option<String>, ParsingError> {
        self.workstation.as_deref()
            .map(|w| StringEncoding::Oem.decode(w))
            .transpose()
    }

    /// Serializes the Negotiate message into bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        check_optional_chain(&[
            ("domain", self.domain.is_some()),
            ("workstation", self.workstation.is_some()),
            ("os_version", self.os_version.is_some()),
        ])?;

        let mut writer = start_message(Self::MESSAGE_TYPE);
        writer.u32(self.flags.bits());
        if let Some(domain) = &self.domain {
            writer.buffer(domain)?;
        }
        if let Some(workstation) = &self.workstation {
            writer.buffer(workstation)?;
        }
        if let Some(os_version) = &self.os_version {
            writer.fixed(&os_version.to_bytes());
        }
        writer.finish()
    }

    fn parse(value: &[u8]) -> Result<Self, ParsingError> {
        let mut reader = FieldSetReader::new(value, Self::MIN_HEADER_LEN)?;
        let flags = Flags::from_bits_retain(reader.u32_at(12)?);

        let domain = reader.optional_buffer_at(16)?;
        let workstation = match domain {
            Some(_) => reader.optional_buffer_at(24)?,
            None => None,
        };
        let os_version = if workstation.is_some() && reader.has_slot(32, OsVersion::SIZE) {
            Some(OsVersion::from(reader.array_at::<8>(32)?))
        } else {
            None
        };

        Ok(Self {
            flags,
            domain,
            workstation,
            os_version,
        })
    }
}
impl TryFrom<&[u8]> for NegotiateMessage {
    type Error = ParsingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        expect_common_header(value, Self::MESSAGE_TYPE)?;
        Self::parse(value)
    }
}


/// The contents of an NTLM Challenge message.
///
/// The Challenge message is sent by the server in response to the client's Negotiate message; the
/// client is expected to respond with an Authenticate message.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ChallengeMessage {
    /// The host against which the client is authenticating, encoded according to the flags.
    pub target_name: Vec<u8>,

    /// Stores which NTLM behavior has been accepted by the server from the client's request.
    pub flags: Flags,

    /// The challenge value, read as a little-endian integer.
    pub challenge: u64,

    /// The context value, a leftover of local authentication.
    pub context: Option<u64>,

    /// Information about the targets of the authentication, as a serialized [`TargetInfo`] list.
    pub target_info: Option<Vec<u8>>,

    /// Version information about the server's operating system.
    pub os_version: Option<OsVersion>,
}
impl Default for ChallengeMessage {
    fn default() -> Self {
        Self {
            target_name: Vec::new(),
            flags: Flags::TYPE2_DEFAULT,
            challenge: 0,
            context: None,
            target_info: None,
            os_version: None,
        }
    }
}
impl ChallengeMessage {
    pub const MESSAGE_TYPE: u32 = 0x0000_0002;
    const MIN_HEADER_LEN: usize = COMMON_HEADER_LEN + 8 + 4 + 8;

    /// The encoding of the strings in this message.
    pub fn encoding(&self) -> StringEncoding {
        StringEncoding::from_flags(self.flags)
    }

    /// The challenge as it appears on the wire.
    pub fn challenge_bytes(&self) -> [u8; 8] {
        self.challenge.to_le_bytes()
    }

    /// Decodes the target name.
    pub fn decoded_target_name(&self, encoding: StringEncoding) -> Result<String, ParsingError> {
        encoding.decode(&self.target_name)
    }

    /// Parses the target information list; a message without one yields an empty list.
    pub fn target_information(&self) -> Result<TargetInfo, ParsingError> {
        match &self.target_info {
            Some(ti) => TargetInfo::parse(ti),
            None => Ok(TargetInfo::default()),
        }
    }

    /// Sets the target name, encoding it as selected by the current flags.
    pub fn with_target_name(mut self, target_name: &str) -> Result<Self, StoringError> {
        self.target_name = self.encoding().encode(target_name)?;
        Ok(self)
    }

    /// Attaches a target information list and announces it in the flags.
    pub fn with_target_info(mut self, target_info: &TargetInfo) -> Result<Self, StoringError> {
        self.context.get_or_insert(0);
        self.target_info = Some(target_info.to_bytes()?);
        self.flags |= Flags::NEGOTIATE_TARGET_INFO;
        Ok(self)
    }

    /// Attaches the version block and announces it in the flags.
    pub fn with_os_version(mut self, os_version: OsVersion) -> Self {
        self.context.get_or_insert(0);
        self.target_info.get_or_insert_with(Vec::new);
        self.os_version = Some(os_version);
        self.flags |= Flags::NEGOTIATE_VERSION;
        self
    }

    /// Serializes the Challenge message into bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        check_optional_chain(&[
            ("context", self.context.is_some()),
            ("target_info", self.target_info.is_some()),
            ("os_version", self.os_version.is_some()),
        ])?;

        let mut writer = start_message(Self::MESSAGE_TYPE);
        writer.buffer(&self.target_name)?;
        writer.u32(self.flags.bits());
        writer.u64(self.challenge);
        if let Some(context) = self.context {
            writer.u64(context);
        }
        if let Some(target_info) = &self.target_info {
            writer.buffer(target_info)?;
        }
        if let Some(os_version) = &self.os_version {
            writer.fixed(&os_version.to_bytes());
        }
        writer.finish()
    }

    fn parse(value: &[u8]) -> Result<Self, ParsingError> {
        let mut reader = FieldSetReader::new(value, Self::MIN_HEADER_LEN)?;
        let target_name = reader.buffer_at(12)?;
        let flags = Flags::from_bits_retain(reader.u32_at(20)?);
        let challenge = reader.u64_at(24)?;

        let context = if reader.has_slot(32, 8) {
            Some(reader.u64_at(32)?)
        } else {
            None
        };
        let target_info = match context {
            Some(_) => reader.optional_buffer_at(40)?,
            None => None,
        };
        let os_version = if target_info.is_some() && reader.has_slot(48, OsVersion::SIZE) {
            Some(OsVersion::from(reader.array_at::<8>(48)?))
        } else {
            None
        };

        Ok(Self {
            target_name,
            flags,
            challenge,
            context,
            target_info,
            os_version,
        })
    }
}
impl TryFrom<&[u8]> for ChallengeMessage {
    type Error = ParsingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        expect_common_header(value, Self::MESSAGE_TYPE)?;
        Self::parse(value)
    }
}


/// The contents of an NTLM Authenticate message.
///
/// The Authenticate message is sent by the client in response to the server's Challenge message;
/// once it is accepted by the server, the authentication has succeeded.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AuthenticateMessage {
    pub lm_response: Vec<u8>,
    pub ntlm_response: Vec<u8>,
    pub domain: Vec<u8>,
    pub user: Vec<u8>,
    pub workstation: Vec<u8>,
    pub session_key: Option<Vec<u8>>,
    pub flags: Option<Flags>,
    pub os_version: Option<OsVersion>,
}
impl AuthenticateMessage {
    pub const MESSAGE_TYPE: u32 = 0x0000_0003;
    const MIN_HEADER_LEN: usize = COMMON_HEADER_LEN + 5 * 8;

    /// The encoding of the strings in this message.
    ///
    /// Messages without a flags field fall back to the default Authenticate flags.
    pub fn encoding(&self) -> StringEncoding {
        StringEncoding::from_flags(self.flags.unwrap_or(Flags::TYPE3_DEFAULT))
    }

    pub fn decoded_domain(&self, encoding: StringEncoding) -> Result<String, ParsingError> {
        encoding.decode(&self.domain)
    }

    pub fn decoded_user(&self, encoding: StringEncoding) -> Result<String, ParsingError> {
        encoding.decode(&self.user)
    }

    pub fn decoded_workstation(&self, encoding: StringEncoding) -> Result<String, ParsingError> {
        encoding.decode(&self.workstation)
    }

    /// Serializes the Authenticate message into bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        check_optional_chain(&[
            ("session_key", self.session_key.is_some()),
            ("flags", self.flags.is_some()),
            ("os_version", self.os_version.is_some()),
        ])?;

        let mut writer = start_message(Self::MESSAGE_TYPE);
        writer.buffer(&self.lm_response)?;
        writer.buffer(&self.ntlm_response)?;
        writer.buffer(&self.domain)?;
        writer.buffer(&self.user)?;
        writer.buffer(&self.workstation)?;
        if let Some(session_key) = &self.session_key {
            writer.buffer(session_key)?;
        }
        if let Some(flags) = self.flags {
            writer.u32(flags.bits());
        }
        if let Some(os_version) = &self.os_version {
            writer.fixed(&os_version.to_bytes());
        }
        writer.finish()
    }

    fn parse(value: &[u8]) -> Result<Self, ParsingError> {
        let mut reader = FieldSetReader::new(value, Self::MIN_HEADER_LEN)?;
        let lm_response = reader.buffer_at(12)?;
        let ntlm_response = reader.buffer_at(20)?;
        let domain = reader.buffer_at(28)?;
        let user = reader.buffer_at(36)?;
        let workstation = reader.buffer_at(44)?;

        let session_key = reader.optional_buffer_at(52)?;
        let flags = if session_key.is_some() && reader.has_slot(60, 4) {
            Some(Flags::from_bits_retain(reader.u32_at(60)?))
        } else {
            None
        };
        let os_version = if flags.is_some() && reader.has_slot(64, OsVersion::SIZE) {
            Some(OsVersion::from(reader.array_at::<8>(64)?))
        } else {
            None
        };

        Ok(Self {
            lm_response,
            ntlm_response,
            domain,
            user,
            workstation,
            session_key,
            flags,
            os_version,
        })
    }
}
impl TryFrom<&[u8]> for AuthenticateMessage {
    type Error = ParsingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        expect_common_header(value, Self::MESSAGE_TYPE)?;
        Self::parse(value)
    }
}
