//! Fixed-width little-endian integer and byte-string codecs.
//!
//! Readers take the whole message and an absolute offset, failing instead of panicking when fewer
//! bytes remain than the field requires. Writers append to a byte vector.


use crate::error::ParsingError;


/// Reads `N` bytes starting at `offset`.
pub(crate) fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N], ParsingError> {
    let slice = read_bytes(bytes, offset, N)?;
    let mut ret = [0u8; N];
    ret.copy_from_slice(slice);
    Ok(ret)
}

/// Borrows `length` bytes starting at `offset`.
pub(crate) fn read_bytes(bytes: &[u8], offset: usize, length: usize) -> Result<&[u8], ParsingError> {
    offset.checked_add(length)
        .and_then(|end| bytes.get(offset..end))
        .ok_or(ParsingError::ItemMinLengthMismatch {
            expected_at_least: offset.saturating_add(length),
            obtained: bytes.len(),
        })
}

pub(crate) fn read_u16_le(bytes: &[u8], offset: usize) -> Result<u16, ParsingError> {
    read_array(bytes, offset).map(u16::from_le_bytes)
}

pub(crate) fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32, ParsingError> {
    read_array(bytes, offset).map(u32::from_le_bytes)
}

pub(crate) fn read_u64_le(bytes: &[u8], offset: usize) -> Result<u64, ParsingError> {
    read_array(bytes, offset).map(u64::from_le_bytes)
}

pub(crate) fn write_u16_le(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_u32_le(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}


#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use super::*;

    #[test]
    fn integers_are_little_endian() {
        let bytes = hex!("0102030405060708");
        assert_eq!(read_u16_le(&bytes, 0).unwrap(), 0x0201);
        assert_eq!(read_u32_le(&bytes, 4).unwrap(), 0x0807_0605);
        assert_eq!(read_u64_le(&bytes, 0).unwrap(), 0x0807_0605_0403_0201);

        let mut buf = Vec::new();
        write_u16_le(&mut buf, 0x0201);
        write_u32_le(&mut buf, 0x0605_0403);
        assert_eq!(buf, hex!("010203040506"));
    }

    #[test]
    fn short_reads_fail() {
        let bytes = hex!("010203");
        assert_eq!(
            read_u32_le(&bytes, 0),
            Err(ParsingError::ItemMinLengthMismatch { expected_at_least: 4, obtained: 3 }),
        );
        assert!(read_u16_le(&bytes, 2).is_err());
        assert!(read_bytes(&bytes, usize::MAX, 2).is_err());
        assert_eq!(read_bytes(&bytes, 3, 0).unwrap(), b"");
    }
}
