//! Password hashes and the cryptographic building blocks of NTLM responses.


use chrono::Utc;
use cipher::{BlockEncrypt, Key, KeyInit};
use cipher::generic_array::GenericArray;
use des::Des;
use digest::Digest;
use hmac::{Hmac, Mac};
use md4::Md4;
use md5::Md5;

use crate::Credentials;
use crate::encoding::{StringEncoding, string_to_utf16_le_bytes};
use crate::error::StoringError;


/// Seconds between the Windows epoch (1601-01-01) and the Unix epoch (1970-01-01).
const WINDOWS_TO_UNIX_EPOCH_SECS: i64 = 11_644_473_600;


/// Obtains the current NTLM timestamp.
///
/// The value is a Windows FILETIME: the number of 100-nanosecond intervals since 1601-01-01 UTC.
pub fn get_ntlm_time() -> u64 {
    let now = Utc::now();
    let secs = now.timestamp() + WINDOWS_TO_UNIX_EPOCH_SECS;
    let secs = u64::try_from(secs).unwrap_or(0);
    secs * 10_000_000 + u64::from(now.timestamp_subsec_nanos() / 100)
}


/// Spreads 56 key bits over the eight bytes DES expects, leaving the parity bits cleared.
fn expand_des_key(key: &[u8; 7]) -> [u8; 8] {
    [
        key[0] & 0xFE,
        ((key[0] << 7) | (key[1] >> 1)) & 0xFE,
        ((key[1] << 6) | (key[2] >> 2)) & 0xFE,
        ((key[2] << 5) | (key[3] >> 3)) & 0xFE,
        ((key[3] << 4) | (key[4] >> 4)) & 0xFE,
        ((key[4] << 3) | (key[5] >> 5)) & 0xFE,
        ((key[5] << 2) | (key[6] >> 6)) & 0xFE,
        key[6] << 1,
    ]
}

/// Encrypts a single block with DES-ECB using a 7-byte key.
fn des_encrypt(key: &[u8; 7], data: [u8; 8]) -> [u8; 8] {
    let des = Des::new(&GenericArray::from(expand_des_key(key)));
    let mut block = GenericArray::from(data);
    des.encrypt_block(&mut block);
    block.into()
}


/// Performs the NTLMv1 DES encryption to calculate the response value to the challenge.
///
/// The 16-byte key is padded with zeroes to 21 bytes and split into three 7-byte DES keys, each
/// of which encrypts `data`.
pub fn des_long(key: [u8; 16], data: [u8; 8]) -> [u8; 24] {
    let key0 = [key[0], key[1], key[2], key[3], key[4], key[5], key[6]];
    let key1 = [key[7], key[8], key[9], key[10], key[11], key[12], key[13]];
    let key2 = [key[14], key[15], 0, 0, 0, 0, 0];

    let mut ret = [0u8; 24];
    ret[0..8].copy_from_slice(&des_encrypt(&key0, data));
    ret[8..16].copy_from_slice(&des_encrypt(&key1, data));
    ret[16..24].copy_from_slice(&des_encrypt(&key2, data));
    ret
}


/// Derives the encryption key from a password according to the LMv1 scheme.
///
/// The LMv1 scheme consists of the following:
///
/// ```plain
///            ┌────────────┐  ┌───────────────┐  ┌─────────────┐
/// password ──┤ convert to ├──┤ encode using  ├──┤ truncate or ├──┐
///            │ uppercase  │  │ OEM codepage  │  │ pad to 14 B │  │
///            └────────────┘  └───────────────┘  └─────────────┘  │
///           ┌────────────────────────────────────────────────────┘
///           │┌───────┐
///           └┤ split │           "KGS!@#$%"
///            └─┬───┬─┘               │ input
///         0..7 │   │ 7..14    key ┌──┴──┐ output
///              │   └──────────────┤ DES ├────────────┐
///              │                  └─────┘            │ 0..8
///              │                                  ┌──┴───┐
///              │                 "KGS!@#$%"       │ join ├──── key
///              │                     │ input      └──┬───┘
///              │              key ┌──┴──┐ output     │ 8..16
///              └──────────────────┤ DES ├────────────┘
///                                 └─────┘
/// ```
pub fn lm_v1_password_func(password: &str) -> Result<[u8; 16], StoringError> {
    const LM_MAGIC: [u8; 8] = *b"KGS!@#$%";

    let oem = StringEncoding::Oem.encode(&password.to_uppercase())?;
    let mut padded = [0u8; 14];
    let used = oem.len().min(14);
    padded[..used].copy_from_slice(&oem[..used]);

    let half0 = [padded[0], padded[1], padded[2], padded[3], padded[4], padded[5], padded[6]];
    let half1 = [padded[7], padded[8], padded[9], padded[10], padded[11], padded[12], padded[13]];

    let mut output = [0u8; 16];
    output[0..8].copy_from_slice(&des_encrypt(&half0, LM_MAGIC));
    output[8..16].copy_from_slice(&des_encrypt(&half1, LM_MAGIC));
    Ok(output)
}


/// Derives the encryption key from a password according to the NTLMv1 scheme.
///
/// The NTLMv1 scheme encodes the password as UTF-16 in little-endian byte order (without the Byte
/// Order Mark) and hashes it using MD4.
pub fn ntlm_v1_password_func(password: &str) -> [u8; 16] {
    md4(&string_to_utf16_le_bytes(password))
}

/// Derives the encryption key from a password according to the NTLMv2 scheme.
///
/// The NTLMv2 scheme is a HMAC-MD5 scheme whose key is the encryption key derived from the password
/// using the NTLMv1 scheme and whose plaintext is a concatenation of uppercase username and
/// unchanged-case domain, each encoded as UTF-16 in little-endian byte order without the Byte Order
/// Mark.
pub fn ntlm_v2_password_func(creds: &Credentials) -> [u8; 16] {
    let hmac_key = ntlm_v1_password_func(&creds.password);
    let upper_user_bytes = string_to_utf16_le_bytes(&creds.username.to_uppercase());
    let dom_bytes = string_to_utf16_le_bytes(&creds.domain);
    hmac_md5(&hmac_key, &[&upper_user_bytes, &dom_bytes])
}


pub(crate) fn md4(data: &[u8]) -> [u8; 16] {
    let mut md4_state = <Md4 as Digest>::new();
    md4_state.update(data);
    md4_state.finalize().into()
}

pub(crate) fn md5(parts: &[&[u8]]) -> [u8; 16] {
    let mut md5_state = <Md5 as Digest>::new();
    for part in parts {
        md5_state.update(part);
    }
    md5_state.finalize().into()
}

/// Computes HMAC-MD5 over the concatenation of `parts`.
pub(crate) fn hmac_md5(key: &[u8; 16], parts: &[&[u8]]) -> [u8; 16] {
    // HMAC zero-pads short keys to the block size; doing it here keeps key setup infallible
    let mut block_key = Key::<Hmac<Md5>>::default();
    block_key[..key.len()].copy_from_slice(key);

    let mut hmac_md5 = <Hmac<Md5> as KeyInit>::new(&block_key);
    for part in parts {
        hmac_md5.update(part);
    }
    hmac_md5.finalize().into_bytes().into()
}
