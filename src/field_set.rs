//! Assembly and disassembly of the header-plus-trailing-data layout shared by all NTLM messages.
//!
//! A message consists of a header of fixed-size fields (integers, fixed byte strings and security
//! buffer descriptors) followed by a single data region holding the payloads of all security
//! buffers, in the order their descriptors appear in the header. Offsets stored in descriptors are
//! relative to the first byte of the message.


use tracing::{trace, warn};

use crate::error::{ParsingError, StoringError};
use crate::primitive::{read_array, read_u32_le, read_u64_le};
use crate::security_buffer::SecurityBuffer;


enum HeaderSlot {
    Fixed(Vec<u8>),
    Buffer { start: usize, length: usize },
}
impl HeaderSlot {
    fn len(&self) -> usize {
        match self {
            Self::Fixed(bytes) => bytes.len(),
            Self::Buffer { .. } => SecurityBuffer::SIZE,
        }
    }
}


/// Collects the fields of a message in schema order and lays them out on [`finish`](Self::finish).
pub(crate) struct FieldSetWriter {
    header: Vec<HeaderSlot>,
    trailing: Vec<u8>,
}
impl FieldSetWriter {
    pub fn new() -> Self {
        Self {
            header: Vec::new(),
            trailing: Vec::new(),
        }
    }

    /// Appends a fixed-size field to the header.
    pub fn fixed(&mut self, bytes: &[u8]) {
        self.header.push(HeaderSlot::Fixed(Vec::from(bytes)));
    }

    pub fn u32(&mut self, value: u32) {
        self.fixed(&value.to_le_bytes());
    }

    pub fn u64(&mut self, value: u64) {
        self.fixed(&value.to_le_bytes());
    }

    /// Reserves a security buffer descriptor in the header and queues its payload for the data
    /// region.
    pub fn buffer(&mut self, payload: &[u8]) -> Result<(), StoringError> {
        if u16::try_from(payload.len()).is_err() {
            return Err(StoringError::BufferTooLong { length: payload.len() });
        }
        self.header.push(HeaderSlot::Buffer { start: self.trailing.len(), length: payload.len() });
        self.trailing.extend_from_slice(payload);
        Ok(())
    }

    /// Serializes the header followed by the data region.
    pub fn finish(self) -> Result<Vec<u8>, StoringError> {
        let header_len: usize = self.header.iter()
            .map(|slot| slot.len())
            .sum();
        let total_len = header_len + self.trailing.len();
        if u32::try_from(total_len).is_err() {
            return Err(StoringError::MessageTooLong { length: total_len });
        }

        // header_len fits as total_len does
        let mut trailing_offset = header_len as u32;
        let mut ret = Vec::with_capacity(total_len);
        for slot in &self.header {
            match slot {
                HeaderSlot::Fixed(bytes) => ret.extend_from_slice(bytes),
                HeaderSlot::Buffer { start, length } => {
                    let payload = &self.trailing[*start..*start + *length];
                    let sb = SecurityBuffer::encode(payload, &mut trailing_offset)?;
                    ret.extend_from_slice(&sb.to_bytes());
                },
            }
        }
        ret.extend_from_slice(&self.trailing);
        Ok(ret)
    }
}


/// Fails if an optional field is present while an optional field preceding it is absent.
///
/// `fields` lists the optional fields of a schema in header order along with their presence.
pub(crate) fn check_optional_chain(fields: &[(&'static str, bool)]) -> Result<(), StoringError> {
    let mut first_missing = None;
    for &(name, present) in fields {
        match (present, first_missing) {
            (false, None) => first_missing = Some(name),
            (true, Some(missing)) => return Err(StoringError::OptionalFieldGap { field: name, missing }),
            _ => {},
        }
    }
    Ok(())
}


/// Reads fields out of a complete message.
///
/// The reader tracks where the header must end: the start of the earliest non-empty security
/// buffer payload seen so far. Optional fields are only read if they fit before that point.
pub(crate) struct FieldSetReader<'a> {
    message: &'a [u8],
    header_limit: usize,
}
impl<'a> FieldSetReader<'a> {
    /// Creates a reader, requiring at least `min_header` bytes for the mandatory fields.
    pub fn new(message: &'a [u8], min_header: usize) -> Result<Self, ParsingError> {
        if message.len() < min_header {
            return Err(ParsingError::ShortHeader { expected_min_len: min_header, obtained_len: message.len() });
        }
        Ok(Self {
            message,
            header_limit: message.len(),
        })
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32, ParsingError> {
        read_u32_le(self.message, offset)
    }

    pub fn u64_at(&self, offset: usize) -> Result<u64, ParsingError> {
        read_u64_le(self.message, offset)
    }

    pub fn array_at<const N: usize>(&self, offset: usize) -> Result<[u8; N], ParsingError> {
        read_array(self.message, offset)
    }

    /// Reads the security buffer descriptor at `offset` and returns the data it points to.
    pub fn buffer_at(&mut self, offset: usize) -> Result<Vec<u8>, ParsingError> {
        let sb = SecurityBuffer::read_at(self.message, offset)?;
        if !sb.is_consistent() {
            warn!(offset, length = sb.length, capacity = sb.capacity, "security buffer capacity below its length");
        }
        let payload = sb.apply_to_slice(self.message)?;
        if sb.length > 0 {
            // payload lies within the message, so the offset fits
            let payload_start = sb.offset as usize;
            if payload_start < self.header_limit {
                self.header_limit = payload_start;
                trace!(header_limit = self.header_limit, "header limit lowered by security buffer");
            }
        }
        Ok(Vec::from(payload))
    }

    /// Whether a field of `length` bytes at `offset` lies within the header.
    pub fn has_slot(&self, offset: usize, length: usize) -> bool {
        offset + length <= self.header_limit
    }

    /// Reads an optional security buffer if its descriptor lies within the header.
    pub fn optional_buffer_at(&mut self, offset: usize) -> Result<Option<Vec<u8>>, ParsingError> {
        if self.has_slot(offset, SecurityBuffer::SIZE) {
            self.buffer_at(offset).map(Some)
        } else {
            Ok(None)
        }
    }
}


#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use super::*;

    #[test]
    fn payloads_follow_header_in_field_order() {
        let mut writer = FieldSetWriter::new();
        writer.fixed(b"AB");
        writer.buffer(b"first").unwrap();
        writer.u32(0x0403_0201);
        writer.buffer(b"").unwrap();
        writer.buffer(b"second").unwrap();
        let bytes = writer.finish().unwrap();

        // header: 2 + 8 + 4 + 8 + 8 = 30
        let mut expected = Vec::new();
        expected.extend_from_slice(b"AB");
        expected.extend_from_slice(&hex!("050005001e000000"));
        expected.extend_from_slice(&hex!("01020304"));
        expected.extend_from_slice(&hex!("0000000023000000"));
        expected.extend_from_slice(&hex!("0600060023000000"));
        expected.extend_from_slice(b"firstsecond");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn optional_chain() {
        assert!(check_optional_chain(&[("a", true), ("b", true), ("c", false)]).is_ok());
        assert!(check_optional_chain(&[("a", false), ("b", false)]).is_ok());
        assert_eq!(
            check_optional_chain(&[("a", true), ("b", false), ("c", true)]),
            Err(StoringError::OptionalFieldGap { field: "c", missing: "b" }),
        );
    }

    #[test]
    fn reader_lowers_header_limit() {
        let mut writer = FieldSetWriter::new();
        writer.u32(7);
        writer.buffer(b"payload").unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = FieldSetReader::new(&bytes, 12).unwrap();
        assert_eq!(reader.u32_at(0).unwrap(), 7);
        assert!(reader.has_slot(12, 4));
        assert_eq!(reader.buffer_at(4).unwrap(), b"payload");
        assert!(!reader.has_slot(12, 4));
        assert_eq!(reader.optional_buffer_at(12).unwrap(), None);
    }

    #[test]
    fn reader_requires_mandatory_header() {
        assert_eq!(
            FieldSetReader::new(&[0u8; 10], 12).err(),
            Some(ParsingError::ShortHeader { expected_min_len: 12, obtained_len: 10 }),
        );
    }
}
