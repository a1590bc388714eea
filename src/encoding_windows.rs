//! OEM codepage conversion on Windows.
//!
//! Legacy NTLM peers encode strings in the system's OEM codepage when Unicode has not been
//! negotiated. The operating system converts between this codepage and UTF-16, which we then
//! convert from and to Rust strings.


use windows::Win32::Globalization::{
    CP_OEMCP, MB_ERR_INVALID_CHARS, MB_PRECOMPOSED, MultiByteToWideChar, WC_COMPOSITECHECK,
    WideCharToMultiByte,
};

use crate::error::{ParsingError, StoringError};


/// Decodes an OEM byte string into a Rust string.
pub(crate) fn oem_to_string(oem: &[u8]) -> Result<String, ParsingError> {
    if oem.is_empty() {
        return Ok(String::new());
    }
    let invalid = || ParsingError::InvalidOemEncoding { value: Vec::from(oem) };

    // ask for the required number of UTF-16 units first
    let wide_len = unsafe {
        MultiByteToWideChar(CP_OEMCP, MB_ERR_INVALID_CHARS | MB_PRECOMPOSED, oem, None)
    };
    let wide_len: usize = wide_len.try_into().map_err(|_| invalid())?;
    if wide_len == 0 {
        return Err(invalid());
    }

    let mut wide = vec![0u16; wide_len];
    let written = unsafe {
        MultiByteToWideChar(CP_OEMCP, MB_ERR_INVALID_CHARS | MB_PRECOMPOSED, oem, Some(wide.as_mut_slice()))
    };
    let written: usize = written.try_into().map_err(|_| invalid())?;
    if written == 0 {
        return Err(invalid());
    }
    wide.truncate(written);

    String::from_utf16(&wide)
        .or(Err(ParsingError::InvalidUtf16 { value: wide }))
}


/// Encodes a Rust string into an OEM byte string.
pub(crate) fn string_to_oem(string: &str) -> Result<Vec<u8>, StoringError> {
    if string.is_empty() {
        return Ok(Vec::new());
    }
    let unencodable = || StoringError::NonOemEncodable { string: string.to_owned() };

    let wide: Vec<u16> = string.encode_utf16().collect();

    let oem_len = unsafe {
        WideCharToMultiByte(CP_OEMCP, WC_COMPOSITECHECK, &wide, None, None, None)
    };
    let oem_len: usize = oem_len.try_into().map_err(|_| unencodable())?;
    if oem_len == 0 {
        return Err(unencodable());
    }

    let mut oem = vec![0u8; oem_len];
    let written = unsafe {
        WideCharToMultiByte(CP_OEMCP, WC_COMPOSITECHECK, &wide, Some(oem.as_mut_slice()), None, None)
    };
    let written: usize = written.try_into().map_err(|_| unencodable())?;
    if written == 0 {
        return Err(unencodable());
    }
    oem.truncate(written);

    Ok(oem)
}
