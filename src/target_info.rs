//! The attribute-value list a server embeds in its Challenge message.


use tracing::warn;

use crate::encoding::{string_to_utf16_le_bytes, utf16_le_bytes_to_string};
use crate::error::{ParsingError, StoringError};
use crate::primitive::{read_bytes, read_u16_le, write_u16_le};


/// The type of additional target information included in the Challenge message.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TargetInfoType {
    Terminator,
    ServerName,
    DomainName,
    DnsComputerName,
    DnsDomainName,
    DnsTreeName,
    Flags,
    Timestamp,
    SingleHost,
    TargetName,
    ChannelBindings,
    Unknown(u16),
}
impl From<TargetInfoType> for u16 {
    fn from(t: TargetInfoType) -> Self {
        match t {
            TargetInfoType::Terminator => 0x0000,
            TargetInfoType::ServerName => 0x0001,
            TargetInfoType::DomainName => 0x0002,
            TargetInfoType::DnsComputerName => 0x0003,
            TargetInfoType::DnsDomainName => 0x0004,
            TargetInfoType::DnsTreeName => 0x0005,
            TargetInfoType::Flags => 0x0006,
            TargetInfoType::Timestamp => 0x0007,
            TargetInfoType::SingleHost => 0x0008,
            TargetInfoType::TargetName => 0x0009,
            TargetInfoType::ChannelBindings => 0x000A,
            TargetInfoType::Unknown(w) => w,
        }
    }
}
impl From<u16> for TargetInfoType {
    fn from(w: u16) -> Self {
        match w {
            0x0000 => TargetInfoType::Terminator,
            0x0001 => TargetInfoType::ServerName,
            0x0002 => TargetInfoType::DomainName,
            0x0003 => TargetInfoType::DnsComputerName,
            0x0004 => TargetInfoType::DnsDomainName,
            0x0005 => TargetInfoType::DnsTreeName,
            0x0006 => TargetInfoType::Flags,
            0x0007 => TargetInfoType::Timestamp,
            0x0008 => TargetInfoType::SingleHost,
            0x0009 => TargetInfoType::TargetName,
            0x000A => TargetInfoType::ChannelBindings,
            other => TargetInfoType::Unknown(other),
        }
    }
}

/// An entry of additional target information included in the Challenge message.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TargetInfoEntry {
    pub entry_type: TargetInfoType,
    pub data: Vec<u8>,
}

impl TargetInfoEntry {
    /// The entry closing every target information list.
    pub fn terminator() -> Self {
        Self {
            entry_type: TargetInfoType::Terminator,
            data: Vec::new(),
        }
    }

    /// Serializes the target info entry into bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        let bytes_len: u16 = self.data.len()
            .try_into()
            .or(Err(StoringError::BufferTooLong { length: self.data.len() }))?;

        let mut ret = Vec::with_capacity(4 + self.data.len());
        write_u16_le(&mut ret, self.entry_type.into());
        write_u16_le(&mut ret, bytes_len);
        ret.extend_from_slice(&self.data);
        Ok(ret)
    }

    /// Attempts to deserialize a target info entry from the given byte slice. If successful,
    /// returns the deserialized target info entry as well as any bytes remaining in the slice (that
    /// are not part of the freshly deserialized target info entry).
    pub fn try_from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), ParsingError> {
        let entry_type: TargetInfoType = read_u16_le(bytes, 0)?.into();
        let length = read_u16_le(bytes, 2)?;
        let data = read_bytes(bytes, 4, length.into())?;

        let entry = Self {
            entry_type,
            data: Vec::from(data),
        };
        let rest = &bytes[4 + usize::from(length)..];
        Ok((entry, rest))
    }

    /// Attempts to convert the data within this target info entry into a string.
    ///
    /// Target information strings are always UTF-16, even if the message flags select OEM.
    pub fn to_string(&self) -> Result<String, ParsingError> {
        utf16_le_bytes_to_string(&self.data)
    }

    /// Creates a target info entry from an entry type and a string.
    pub fn from_string(entry_type: TargetInfoType, string: &str) -> Self {
        Self {
            entry_type,
            data: string_to_utf16_le_bytes(string),
        }
    }
}


/// The parsed target information list, in wire order.
///
/// Duplicate entries are kept, as is the terminator if the list had one, so that serializing a
/// parsed list reproduces the original bytes.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TargetInfo {
    pub entries: Vec<TargetInfoEntry>,
}

impl TargetInfo {
    /// Parses a target information list.
    ///
    /// Parsing stops at the terminator. A list that ends without one is accepted; anything after
    /// the terminator is discarded.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParsingError> {
        let mut entries = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let (entry, next) = TargetInfoEntry::try_from_bytes(rest)?;
            rest = next;
            if entry.entry_type == TargetInfoType::Terminator {
                if !entry.data.is_empty() {
                    return Err(ParsingError::TerminatorWithData { length: entry.data.len() as u16 });
                }
                entries.push(entry);
                if !rest.is_empty() {
                    warn!(trailing = rest.len(), "discarding bytes after target information terminator");
                }
                break;
            }
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    /// Serializes the entries back into a target information list.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StoringError> {
        let mut ret = Vec::new();
        for entry in &self.entries {
            ret.append(&mut entry.to_bytes()?);
        }
        Ok(ret)
    }

    /// Returns the first entry of the given type.
    pub fn find(&self, entry_type: TargetInfoType) -> Option<&TargetInfoEntry> {
        self.entries.iter()
            .find(|e| e.entry_type == entry_type)
    }

    /// Returns the server's timestamp as a Windows FILETIME value, if it sent one.
    pub fn timestamp(&self) -> Option<u64> {
        let entry = self.find(TargetInfoType::Timestamp)?;
        let bytes: [u8; 8] = entry.data.as_slice().try_into().ok()?;
        Some(u64::from_le_bytes(bytes))
    }

    /// Returns the value of the flags entry, if present.
    pub fn flags(&self) -> Option<u32> {
        let entry = self.find(TargetInfoType::Flags)?;
        let bytes: [u8; 4] = entry.data.as_slice().try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }
}


#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;
    use super::*;

    const MEMBER_TARGET_INFO: [u8; 70] = hex!(
        "02000c0054004500530054004e00540001000c004d0045004d00420045005200"
        "03001e006d0065006d006200650072002e0074006500730074002e0063006f00"
        "6d0000000000"
    );

    #[test]
    fn parse_member_target_info() {
        let ti = TargetInfo::parse(&MEMBER_TARGET_INFO).unwrap();
        assert_eq!(ti.entries.len(), 4);

        assert_eq!(ti.entries[0].entry_type, TargetInfoType::DomainName);
        assert_eq!(ti.entries[0].to_string().unwrap(), "TESTNT");
        assert_eq!(ti.entries[1].entry_type, TargetInfoType::ServerName);
        assert_eq!(ti.entries[1].to_string().unwrap(), "MEMBER");
        assert_eq!(ti.entries[2].entry_type, TargetInfoType::DnsComputerName);
        assert_eq!(ti.entries[2].to_string().unwrap(), "member.test.com");
        assert_eq!(ti.entries[3], TargetInfoEntry::terminator());

        assert_eq!(ti.timestamp(), None);
        assert_eq!(ti.to_bytes().unwrap(), MEMBER_TARGET_INFO);
    }

    #[test]
    fn timestamp_and_flags() {
        let ti = TargetInfo::parse(&hex!("0700080064131d147427ce01060004000200000000000000")).unwrap();
        assert_eq!(ti.timestamp(), Some(0x01ce_2774_141d_1364));
        assert_eq!(ti.flags(), Some(2));
    }

    #[test]
    fn duplicates_are_kept() {
        let mut ti = TargetInfo::default();
        ti.entries.push(TargetInfoEntry::from_string(TargetInfoType::DomainName, "A"));
        ti.entries.push(TargetInfoEntry::from_string(TargetInfoType::DomainName, "B"));
        ti.entries.push(TargetInfoEntry::terminator());

        let bytes = ti.to_bytes().unwrap();
        let reparsed = TargetInfo::parse(&bytes).unwrap();
        assert_eq!(reparsed, ti);
        assert_eq!(reparsed.find(TargetInfoType::DomainName).unwrap().to_string().unwrap(), "A");
    }

    #[test]
    fn overlong_entry_fails() {
        let err = TargetInfo::parse(&hex!("02000c0054004500")).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Format);
    }

    #[test]
    fn truncated_entry_header_fails() {
        assert!(TargetInfo::parse(&hex!("0200")).is_err());
    }

    #[test]
    fn terminator_with_data_fails() {
        assert_eq!(
            TargetInfo::parse(&hex!("000002004142")),
            Err(ParsingError::TerminatorWithData { length: 2 }),
        );
    }

    #[test]
    fn missing_terminator_is_tolerated() {
        let ti = TargetInfo::parse(&hex!("010002004100")).unwrap();
        assert_eq!(ti.entries.len(), 1);
        assert_eq!(ti.to_bytes().unwrap(), hex!("010002004100"));
    }

    #[test]
    fn bytes_after_terminator_are_dropped() {
        let ti = TargetInfo::parse(&hex!("0000000000000000")).unwrap();
        assert_eq!(ti.entries, vec![TargetInfoEntry::terminator()]);
    }

    fn arb_entry() -> impl Strategy<Value = TargetInfoEntry> {
        (1u16..=0x00FF, proptest::collection::vec(any::<u8>(), 0..64))
            .prop_map(|(t, data)| TargetInfoEntry { entry_type: t.into(), data })
    }

    proptest! {
        #[test]
        fn reencoding_is_byte_exact(entries in proptest::collection::vec(arb_entry(), 0..8)) {
            let mut bytes = Vec::new();
            for entry in &entries {
                bytes.extend_from_slice(&entry.to_bytes().unwrap());
            }
            bytes.extend_from_slice(&[0, 0, 0, 0]);

            let parsed = TargetInfo::parse(&bytes).unwrap();
            prop_assert_eq!(parsed.entries.len(), entries.len() + 1);
            prop_assert_eq!(parsed.to_bytes().unwrap(), bytes);
        }
    }
}
