//! Security buffers, the indirection behind every variable-length NTLM field.


use crate::error::{ParsingError, StoringError};
use crate::primitive::{read_u16_le, read_u32_le, write_u16_le, write_u32_le};


/// An NTLM security buffer, pointing to data contained later in the message.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SecurityBuffer {
    pub length: u16,
    pub capacity: u16,
    pub offset: u32,
}

impl SecurityBuffer {
    /// The size of an encoded security buffer descriptor.
    pub const SIZE: usize = 8;

    /// Generates a security buffer for the given slice of bytes located at `offset`.
    ///
    /// The length and capacity are both set to the length of the slice.
    pub fn for_slice(slice: &[u8], offset: u32) -> Result<Self, StoringError> {
        let len_u16: u16 = slice.len()
            .try_into()
            .or(Err(StoringError::BufferTooLong { length: slice.len() }))?;
        Ok(Self {
            length: len_u16,
            capacity: len_u16,
            offset,
        })
    }

    /// Describes `payload` placed at `*trailing_offset` and advances the offset past it.
    pub fn encode(payload: &[u8], trailing_offset: &mut u32) -> Result<Self, StoringError> {
        let sb = Self::for_slice(payload, *trailing_offset)?;
        *trailing_offset = trailing_offset.checked_add(u32::from(sb.length))
            .ok_or(StoringError::MessageTooLong { length: payload.len() })?;
        Ok(sb)
    }

    /// Serializes the security buffer into bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut ret = Vec::with_capacity(Self::SIZE);
        write_u16_le(&mut ret, self.length);
        write_u16_le(&mut ret, self.capacity);
        write_u32_le(&mut ret, self.offset);
        ret
    }

    /// Reads the security buffer descriptor at `offset` within `message`.
    pub fn read_at(message: &[u8], offset: usize) -> Result<Self, ParsingError> {
        Ok(Self {
            length: read_u16_le(message, offset)?,
            capacity: read_u16_le(message, offset + 2)?,
            offset: read_u32_le(message, offset + 4)?,
        })
    }

    /// Extracts the data this security buffer points to.
    ///
    /// `message` must be the complete message, since offsets are relative to its first byte.
    pub fn apply_to_slice<'a>(&self, message: &'a [u8]) -> Result<&'a [u8], ParsingError> {
        let out_of_bounds = || ParsingError::OutOfBounds {
            offset: self.offset,
            length: self.length,
            message_length: message.len(),
        };

        if self.length == 0 {
            // empty buffers often carry a meaningless offset
            return Ok(&[]);
        }

        let start: usize = self.offset.try_into().or(Err(out_of_bounds()))?;
        let end = start.checked_add(usize::from(self.length)).ok_or_else(out_of_bounds)?;
        message.get(start..end).ok_or_else(out_of_bounds)
    }

    /// Whether the descriptor is internally consistent.
    pub fn is_consistent(&self) -> bool {
        self.capacity >= self.length
    }
}
impl TryFrom<&[u8]> for SecurityBuffer {
    type Error = ParsingError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        if value.len() != Self::SIZE {
            return Err(ParsingError::ItemLengthMismatch { expected: Self::SIZE, obtained: value.len() });
        }
        Self::read_at(value, 0)
    }
}
