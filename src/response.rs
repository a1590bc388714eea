//! Calculation of the Authenticate message answering a server's Challenge.


use rand::RngCore;
use rand::rngs::OsRng;
use tracing::{debug, instrument, warn};

use crate::Credentials;
use crate::encoding::StringEncoding;
use crate::error::{ResponseError, StoringError};
use crate::flags::Flags;
use crate::hash::{
    des_long, get_ntlm_time, hmac_md5, lm_v1_password_func, md4, md5, ntlm_v1_password_func,
    ntlm_v2_password_func,
};
use crate::message::{AuthenticateMessage, ChallengeMessage, OsVersion};


/// The response to an NTLM challenge.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ChallengeResponse {
    /// The classic LanManager (LM) response.
    pub lm_response: Vec<u8>,

    /// The NT LanManager (NTLM) response.
    pub ntlm_response: Vec<u8>,

    /// The session key, generally calculated from elements of the responses.
    pub session_key: Vec<u8>,
}

impl ChallengeResponse {
    /// Converts this response to a challenge into a full-blown Authenticate message.
    ///
    /// Strings are encoded as selected by `flags`. The session key field is always present so
    /// that the flags can follow it; it only carries the key if `attach_session_key` is set.
    pub fn to_message(
        &self,
        creds: &Credentials,
        workstation_name: &str,
        flags: Flags,
        attach_session_key: bool,
    ) -> Result<AuthenticateMessage, StoringError> {
        let encoding = StringEncoding::from_flags(flags);
        let session_key = if attach_session_key {
            self.session_key.clone()
        } else {
            Vec::new()
        };
        Ok(AuthenticateMessage {
            lm_response: self.lm_response.clone(),
            ntlm_response: self.ntlm_response.clone(),
            domain: encoding.encode(&creds.domain)?,
            user: encoding.encode(&creds.username)?,
            workstation: encoding.encode(workstation_name)?,
            session_key: Some(session_key),
            flags: Some(flags),
            os_version: None,
        })
    }
}


/// Knobs for [`ChallengeMessage::response`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ResponseOptions {
    /// Calculate an NTLMv2 response instead of one of the NTLMv1 family.
    pub ntlmv2: bool,

    /// The NT hostname of the client.
    pub workstation: String,

    /// A fixed client challenge; a random one is drawn from the OS if absent.
    pub client_challenge: Option<[u8; 8]>,

    /// A fixed timestamp for the NTLMv2 blob, used if the server did not send one.
    pub timestamp: Option<u64>,

    /// The flags the client wishes to use; they are narrowed to the ones the server offered.
    /// Defaults to the server's flags.
    pub flags: Option<Flags>,

    /// Attach the session key if the server offered key exchange, signing or sealing.
    pub session_key: bool,

    /// Send an LM response in plain NTLMv1; if unset, the NTLM response is sent in its place.
    pub use_lm_hash: bool,

    /// A version block to append to the Authenticate message.
    pub os_version: Option<OsVersion>,
}
impl Default for ResponseOptions {
    fn default() -> Self {
        Self {
            ntlmv2: false,
            workstation: String::new(),
            client_challenge: None,
            timestamp: None,
            flags: None,
            session_key: false,
            use_lm_hash: true,
            os_version: None,
        }
    }
}


impl ChallengeMessage {
    /// Calculates the Authenticate message answering this challenge.
    ///
    /// The domain is upper-cased before it is used, both in the message and in the NTLMv2 hash.
    #[instrument(level = "debug", skip_all, fields(ntlmv2 = options.ntlmv2))]
    pub fn response(&self, creds: &Credentials, options: &ResponseOptions) -> Result<AuthenticateMessage, ResponseError> {
        if self.challenge == 0 {
            return Err(ResponseError::MissingField { field: "challenge" });
        }
        let server_challenge = self.challenge_bytes();

        let flags = match options.flags {
            Some(requested) => {
                let dropped = requested - self.flags;
                if !dropped.is_empty() {
                    warn!(dropped = dropped.bits(), "server did not offer all requested flags");
                }
                requested & self.flags
            },
            None => self.flags,
        };
        debug!(flags = flags.bits(), "negotiated flags");

        let creds = Credentials {
            username: creds.username.clone(),
            password: creds.password.clone(),
            domain: creds.domain.to_uppercase(),
        };

        let response = if options.ntlmv2 {
            let target_info = self.target_information()?;
            let time = match (target_info.timestamp(), options.timestamp) {
                (Some(server_time), _) => {
                    debug!("using timestamp from target information");
                    server_time
                },
                (None, Some(fixed_time)) => {
                    debug!("using caller-supplied timestamp");
                    fixed_time
                },
                (None, None) => {
                    debug!("using local clock for timestamp");
                    get_ntlm_time()
                },
            };
            let client_challenge = obtain_client_challenge(options)?;
            respond_challenge_ntlm_v2(server_challenge, client_challenge, &target_info.to_bytes()?, time, &creds)
        } else if flags.contains(Flags::NEGOTIATE_NTLM2_KEY) {
            debug!("calculating NTLM2 session response");
            let client_challenge = obtain_client_challenge(options)?;
            respond_challenge_ntlm_v1_extended(server_challenge, client_challenge, &creds)
        } else if options.use_lm_hash {
            debug!("calculating NTLMv1 response with LM");
            respond_challenge_ntlm_v1(server_challenge, &creds)?
        } else {
            debug!("calculating NTLMv1 response without LM");
            respond_challenge_ntlm_v1_no_lm(server_challenge, &creds)
        };

        let attach_session_key = options.session_key && self.flags.intersects(Flags::SESSION_KEY_CAPABLE);
        if options.session_key && !attach_session_key {
            debug!("server offered neither key exchange nor signing nor sealing; omitting session key");
        }

        let mut message = response.to_message(&creds, &options.workstation, flags, attach_session_key)?;
        message.os_version = options.os_version;
        Ok(message)
    }
}


fn obtain_client_challenge(options: &ResponseOptions) -> Result<[u8; 8], ResponseError> {
    if let Some(client_challenge) = options.client_challenge {
        warn!("using a fixed client challenge");
        return Ok(client_challenge);
    }
    let mut client_challenge = [0u8; 8];
    OsRng.try_fill_bytes(&mut client_challenge)
        .map_err(|e| ResponseError::UnsupportedNegotiation {
            reason: format!("cannot generate client challenge: {}", e),
        })?;
    Ok(client_challenge)
}


// response calculation functions


/// Calculates an NTLMv1 response to the given server challenge.
///
/// An LMv1 response is also included.
pub fn respond_challenge_ntlm_v1(server_challenge: [u8; 8], creds: &Credentials) -> Result<ChallengeResponse, StoringError> {
    let ntlm_key = ntlm_v1_password_func(&creds.password);
    let ntlm_response = Vec::from(des_long(ntlm_key, server_challenge));

    let lm_key = lm_v1_password_func(&creds.password)?;
    let lm_response = Vec::from(des_long(lm_key, server_challenge));

    Ok(ChallengeResponse {
        lm_response,
        ntlm_response,
        session_key: Vec::from(md4(&ntlm_key)),
    })
}

/// Calculates an NTLMv1 response to the given server challenge.
///
/// No LM response is included; instead, the NTLMv1 response is copied.
pub fn respond_challenge_ntlm_v1_no_lm(server_challenge: [u8; 8], creds: &Credentials) -> ChallengeResponse {
    let ntlm_key = ntlm_v1_password_func(&creds.password);
    let ntlm_response = Vec::from(des_long(ntlm_key, server_challenge));

    let lm_response = ntlm_response.clone();

    ChallengeResponse {
        lm_response,
        ntlm_response,
        session_key: Vec::from(md4(&ntlm_key)),
    }
}

/// Calculates an extended NTLMv1 response (NTLM2 session response) to the given server challenge.
///
/// The NTLM response is in the extended format; the LM response field contains the client
/// challenge which has also influenced the calculation of the NTLM response.
pub fn respond_challenge_ntlm_v1_extended(server_challenge: [u8; 8], client_challenge: [u8; 8], creds: &Credentials) -> ChallengeResponse {
    let ntlm_key = ntlm_v1_password_func(&creds.password);

    let session_hash = md5(&[&server_challenge, &client_challenge]);
    let mut desl_plaintext = [0u8; 8];
    desl_plaintext.copy_from_slice(&session_hash[0..8]);

    let ntlm_response = Vec::from(des_long(ntlm_key, desl_plaintext));
    let mut lm_response = Vec::with_capacity(24);
    lm_response.extend_from_slice(&client_challenge);
    lm_response.resize(24, 0);

    ChallengeResponse {
        lm_response,
        ntlm_response,
        session_key: Vec::from(md4(&ntlm_key)),
    }
}

/// Calculates an NTLMv2 response to the given server challenge, including target info and time
/// value to protect against replay attacks.
///
/// `target_info` is embedded verbatim; `time` is a Windows FILETIME value.
pub fn respond_challenge_ntlm_v2(
    server_challenge: [u8; 8],
    client_challenge: [u8; 8],
    target_info: &[u8],
    time: u64,
    creds: &Credentials,
) -> ChallengeResponse {
    let mut blob = Vec::with_capacity(28 + target_info.len() + 4);
    blob.push(0x01); // RespType
    blob.push(0x01); // HiRespType
    blob.extend_from_slice(&[0u8; 6]);
    blob.extend_from_slice(&time.to_le_bytes());
    blob.extend_from_slice(&client_challenge);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(target_info);
    blob.extend_from_slice(&[0u8; 4]);

    let ntlm_key = ntlm_v2_password_func(creds);

    let nt_proof_string = hmac_md5(&ntlm_key, &[&server_challenge, &blob]);

    let mut ntlm_response = Vec::with_capacity(16 + blob.len());
    ntlm_response.extend_from_slice(&nt_proof_string);
    ntlm_response.extend_from_slice(&blob);

    let mut lm_response = Vec::with_capacity(16 + 8);
    lm_response.extend_from_slice(&hmac_md5(&ntlm_key, &[&server_challenge, &client_challenge]));
    lm_response.extend_from_slice(&client_challenge);

    let session_key = Vec::from(hmac_md5(&ntlm_key, &[&nt_proof_string]));

    ChallengeResponse {
        lm_response,
        ntlm_response,
        session_key,
    }
}


#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use super::*;
    use crate::ErrorKind;
    use crate::target_info::{TargetInfo, TargetInfoEntry, TargetInfoType};

    const SERVER_CHALLENGE: [u8; 8] = hex!("0123456789abcdef");
    const CLIENT_CHALLENGE: [u8; 8] = hex!("ffffff0011223344");
    const TARGET_INFO: [u8; 98] = hex!(
        "02000c0044004f004d00410049004e0001000c00530045005200560045005200"
        "0400140064006f006d00610069006e002e0063006f006d000300220073006500"
        "72007600650072002e0064006f006d00610069006e002e0063006f006d000000"
        "0000"
    );
    const TIMESTAMP: u64 = u64::from_le_bytes(hex!("0090d336b734c301"));

    fn creds() -> Credentials {
        Credentials {
            username: "user".to_owned(),
            password: "SecREt01".to_owned(),
            domain: "DOMAIN".to_owned(),
        }
    }

    fn challenge(flags: Flags) -> ChallengeMessage {
        ChallengeMessage {
            flags,
            challenge: u64::from_le_bytes(SERVER_CHALLENGE),
            ..Default::default()
        }
    }

    #[test]
    fn ntlm_v1() {
        let resp = respond_challenge_ntlm_v1(SERVER_CHALLENGE, &creds()).unwrap();
        assert_eq!(resp.lm_response, hex!("c337cd5cbd44fc9782a667af6d427c6de67c20c2d3e77c56"));
        assert_eq!(resp.ntlm_response, hex!("25a98c1c31e81847466b29b2df4680f39958fb8c213a9cc6"));
        assert_eq!(resp.session_key, hex!("3f373ea8e4af954f14faa506f8eebdc4"));
    }

    #[test]
    fn ntlm_v1_no_lm() {
        let resp = respond_challenge_ntlm_v1_no_lm(SERVER_CHALLENGE, &creds());
        assert_eq!(resp.ntlm_response, hex!("25a98c1c31e81847466b29b2df4680f39958fb8c213a9cc6"));
        assert_eq!(resp.lm_response, resp.ntlm_response);
    }

    #[test]
    fn ntlm2_session() {
        let resp = respond_challenge_ntlm_v1_extended(SERVER_CHALLENGE, CLIENT_CHALLENGE, &creds());
        assert_eq!(resp.lm_response, hex!("ffffff0011223344" "00000000000000000000000000000000"));
        assert_eq!(resp.ntlm_response, hex!("10d550832d12b2ccb79d5ad1f4eed3df82aca4c3681dd455"));
    }

    #[test]
    fn ntlm_v2() {
        let resp = respond_challenge_ntlm_v2(SERVER_CHALLENGE, CLIENT_CHALLENGE, &TARGET_INFO, TIMESTAMP, &creds());
        assert_eq!(resp.lm_response, hex!("d6e6152ea25d03b7c6ba6629c2d6aaf0ffffff0011223344"));
        assert_eq!(&resp.ntlm_response[..16], hex!("cbabbca713eb795d04c97abc01ee4983"));
        assert_eq!(&resp.ntlm_response[16..32], hex!("01010000000000000090d336b734c301"));
        assert_eq!(&resp.ntlm_response[32..44], hex!("ffffff001122334400000000"));
        assert_eq!(&resp.ntlm_response[44..44 + TARGET_INFO.len()], TARGET_INFO);
        assert_eq!(&resp.ntlm_response[44 + TARGET_INFO.len()..], [0u8; 4]);
        assert_eq!(resp.session_key, hex!("b94a239bb4c6d1ec08306a071d2b90f0"));
    }

    #[test]
    fn ntlm_v2_is_deterministic() {
        let first = respond_challenge_ntlm_v2(SERVER_CHALLENGE, CLIENT_CHALLENGE, &TARGET_INFO, TIMESTAMP, &creds());
        let second = respond_challenge_ntlm_v2(SERVER_CHALLENGE, CLIENT_CHALLENGE, &TARGET_INFO, TIMESTAMP, &creds());
        assert_eq!(first, second);
    }

    #[test]
    fn response_uses_v1_without_ntlm2_key() {
        let t2m = challenge(Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_NTLM);
        let t3m = t2m.response(&creds(), &ResponseOptions::default()).unwrap();
        assert_eq!(t3m.lm_response, hex!("c337cd5cbd44fc9782a667af6d427c6de67c20c2d3e77c56"));
        assert_eq!(t3m.ntlm_response, hex!("25a98c1c31e81847466b29b2df4680f39958fb8c213a9cc6"));
        assert_eq!(t3m.session_key, Some(Vec::new()));
        assert_eq!(t3m.flags, Some(Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_NTLM));

        let options = ResponseOptions {
            use_lm_hash: false,
            ..Default::default()
        };
        let t3m = t2m.response(&creds(), &options).unwrap();
        assert_eq!(t3m.lm_response, t3m.ntlm_response);
    }

    #[test]
    fn response_uses_ntlm2_session_when_offered() {
        let t2m = challenge(Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_NTLM | Flags::NEGOTIATE_NTLM2_KEY);
        let options = ResponseOptions {
            client_challenge: Some(CLIENT_CHALLENGE),
            ..Default::default()
        };
        let t3m = t2m.response(&creds(), &options).unwrap();
        assert_eq!(t3m.ntlm_response, hex!("10d550832d12b2ccb79d5ad1f4eed3df82aca4c3681dd455"));
        assert_eq!(&t3m.lm_response[..8], CLIENT_CHALLENGE);

        // the client can opt out by not requesting the flag
        let options = ResponseOptions {
            flags: Some(Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_NTLM),
            ..options
        };
        let t3m = t2m.response(&creds(), &options).unwrap();
        assert_eq!(t3m.ntlm_response, hex!("25a98c1c31e81847466b29b2df4680f39958fb8c213a9cc6"));
    }

    #[test]
    fn response_ntlm_v2_with_fixed_inputs() {
        let t2m = ChallengeMessage {
            target_info: Some(Vec::from(TARGET_INFO)),
            context: Some(0),
            ..challenge(Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_NTLM | Flags::NEGOTIATE_TARGET_INFO)
        };
        let options = ResponseOptions {
            ntlmv2: true,
            workstation: "WS".to_owned(),
            client_challenge: Some(CLIENT_CHALLENGE),
            timestamp: Some(TIMESTAMP),
            ..Default::default()
        };
        let t3m = t2m.response(&creds(), &options).unwrap();
        assert_eq!(t3m.lm_response, hex!("d6e6152ea25d03b7c6ba6629c2d6aaf0ffffff0011223344"));
        assert_eq!(&t3m.ntlm_response[..16], hex!("cbabbca713eb795d04c97abc01ee4983"));
        assert_eq!(t3m.decoded_domain(StringEncoding::Unicode).unwrap(), "DOMAIN");
        assert_eq!(t3m.decoded_user(StringEncoding::Unicode).unwrap(), "user");
        assert_eq!(t3m.decoded_workstation(StringEncoding::Unicode).unwrap(), "WS");
    }

    #[test]
    fn server_timestamp_wins_over_fixed_one() {
        let mut ti = TargetInfo::default();
        ti.entries.push(TargetInfoEntry {
            entry_type: TargetInfoType::Timestamp,
            data: Vec::from(TIMESTAMP.to_le_bytes()),
        });
        ti.entries.push(TargetInfoEntry::terminator());
        let t2m = challenge(Flags::NEGOTIATE_UNICODE)
            .with_target_info(&ti).unwrap();

        let options = ResponseOptions {
            ntlmv2: true,
            client_challenge: Some(CLIENT_CHALLENGE),
            timestamp: Some(1),
            ..Default::default()
        };
        let t3m = t2m.response(&creds(), &options).unwrap();
        assert_eq!(&t3m.ntlm_response[24..32], TIMESTAMP.to_le_bytes());
    }

    #[test]
    fn domain_is_upper_cased() {
        let mut lower = creds();
        lower.domain = "domain".to_owned();
        let t2m = challenge(Flags::NEGOTIATE_UNICODE);
        let options = ResponseOptions {
            ntlmv2: true,
            client_challenge: Some(CLIENT_CHALLENGE),
            timestamp: Some(TIMESTAMP),
            ..Default::default()
        };
        let t3m = t2m.response(&lower, &options).unwrap();
        assert_eq!(t3m.decoded_domain(t3m.encoding()).unwrap(), "DOMAIN");

        // the hash uses the upper-cased domain as well
        let upper = t2m.response(&creds(), &options).unwrap();
        assert_eq!(t3m.ntlm_response, upper.ntlm_response);
    }

    #[test]
    fn oem_strings_without_unicode() {
        let t2m = challenge(Flags::NEGOTIATE_OEM | Flags::NEGOTIATE_NTLM);
        let t3m = t2m.response(&creds(), &ResponseOptions::default()).unwrap();
        assert_eq!(t3m.user, b"user");
        assert_eq!(t3m.domain, b"DOMAIN");
    }

    #[test]
    fn session_key_requires_offer() {
        let options = ResponseOptions {
            session_key: true,
            ..Default::default()
        };

        let t2m = challenge(Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_NTLM);
        let t3m = t2m.response(&creds(), &options).unwrap();
        assert_eq!(t3m.session_key, Some(Vec::new()));

        let t2m = challenge(Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_NTLM | Flags::NEGOTIATE_SIGN);
        let t3m = t2m.response(&creds(), &options).unwrap();
        assert_eq!(t3m.session_key, Some(hex!("3f373ea8e4af954f14faa506f8eebdc4").to_vec()));
    }

    #[test]
    fn requested_flags_are_narrowed() {
        let t2m = challenge(Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_NTLM);
        let options = ResponseOptions {
            flags: Some(Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_NTLM | Flags::NEGOTIATE_SEAL),
            ..Default::default()
        };
        let t3m = t2m.response(&creds(), &options).unwrap();
        assert_eq!(t3m.flags, Some(Flags::NEGOTIATE_UNICODE | Flags::NEGOTIATE_NTLM));
    }

    #[test]
    fn zero_challenge_is_missing() {
        let t2m = ChallengeMessage::default();
        let err = t2m.response(&creds(), &ResponseOptions::default()).unwrap_err();
        assert_eq!(err, ResponseError::MissingField { field: "challenge" });
        assert_eq!(err.kind(), ErrorKind::MissingField);
    }

    #[test]
    fn random_client_challenges_differ() {
        let t2m = challenge(Flags::NEGOTIATE_UNICODE);
        let options = ResponseOptions {
            ntlmv2: true,
            timestamp: Some(TIMESTAMP),
            ..Default::default()
        };
        let first = t2m.response(&creds(), &options).unwrap();
        let second = t2m.response(&creds(), &options).unwrap();
        assert_ne!(first.ntlm_response, second.ntlm_response);
    }

    #[test]
    fn os_version_is_appended() {
        let t2m = challenge(Flags::NEGOTIATE_UNICODE);
        let options = ResponseOptions {
            os_version: Some(OsVersion::new(10, 0, 19041)),
            ..Default::default()
        };
        let t3m = t2m.response(&creds(), &options).unwrap();
        let bytes = t3m.to_bytes().unwrap();
        let decoded = AuthenticateMessage::try_from(&bytes[..]).unwrap();
        assert_eq!(decoded.os_version, Some(OsVersion::new(10, 0, 19041)));
    }
}
