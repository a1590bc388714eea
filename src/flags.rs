//! The NTLM negotiation flags and the default flag sets of each message type.


use bitflags::bitflags;


bitflags! {
    /// NTLM operation flags.
    #[derive(Clone, Copy, Debug, Default, Hash, Eq, Ord, PartialEq, PartialOrd)]
    pub struct Flags: u32 {
        const NEGOTIATE_UNICODE = 0x0000_0001;
        const NEGOTIATE_OEM = 0x0000_0002;
        const REQUEST_TARGET = 0x0000_0004;
        const UNKNOWN_8 = 0x0000_0008;
        const NEGOTIATE_SIGN = 0x0000_0010;
        const NEGOTIATE_SEAL = 0x0000_0020;
        const NEGOTIATE_DATAGRAM = 0x0000_0040;
        const NEGOTIATE_LANMAN_KEY = 0x0000_0080;
        const NEGOTIATE_NETWARE = 0x0000_0100;
        const NEGOTIATE_NTLM = 0x0000_0200;
        const UNKNOWN_400 = 0x0000_0400;
        const NEGOTIATE_ANONYMOUS = 0x0000_0800;
        const NEGOTIATE_DOMAIN_SUPPLIED = 0x0000_1000;
        const NEGOTIATE_WORKSTATION_SUPPLIED = 0x0000_2000;
        const NEGOTIATE_LOCAL_CALL = 0x0000_4000;
        const NEGOTIATE_ALWAYS_SIGN = 0x0000_8000;
        const TARGET_TYPE_DOMAIN = 0x0001_0000;
        const TARGET_TYPE_SERVER = 0x0002_0000;
        const TARGET_TYPE_SHARE = 0x0004_0000;
        const NEGOTIATE_NTLM2_KEY = 0x0008_0000;
        const REQUEST_INIT_RESPONSE = 0x0010_0000;
        const REQUEST_ACCEPT_RESPONSE = 0x0020_0000;
        const REQUEST_NON_NT_SESSION_KEY = 0x0040_0000;
        const NEGOTIATE_TARGET_INFO = 0x0080_0000;
        const UNKNOWN_1000000 = 0x0100_0000;
        const NEGOTIATE_VERSION = 0x0200_0000;
        const UNKNOWN_4000000 = 0x0400_0000;
        const UNKNOWN_8000000 = 0x0800_0000;
        const UNKNOWN_10000000 = 0x1000_0000;
        const NEGOTIATE_128BIT = 0x2000_0000;
        const NEGOTIATE_KEY_EXCHANGE = 0x4000_0000;
        const NEGOTIATE_56BIT = 0x8000_0000;
    }
}

impl Flags {
    /// The flags a Negotiate message carries unless told otherwise.
    pub const TYPE1_DEFAULT: Flags = Flags::NEGOTIATE_UNICODE
        .union(Flags::NEGOTIATE_OEM)
        .union(Flags::REQUEST_TARGET)
        .union(Flags::NEGOTIATE_NTLM)
        .union(Flags::NEGOTIATE_ALWAYS_SIGN)
        .union(Flags::NEGOTIATE_NTLM2_KEY);

    /// The flags a Challenge message carries unless told otherwise.
    pub const TYPE2_DEFAULT: Flags = Flags::NEGOTIATE_UNICODE;

    /// The flags an Authenticate message carries unless told otherwise.
    pub const TYPE3_DEFAULT: Flags = Flags::NEGOTIATE_UNICODE
        .union(Flags::REQUEST_TARGET)
        .union(Flags::NEGOTIATE_NTLM)
        .union(Flags::NEGOTIATE_ALWAYS_SIGN)
        .union(Flags::NEGOTIATE_NTLM2_KEY);

    /// Flags whose presence in a Challenge allows the client to attach a session key.
    pub const SESSION_KEY_CAPABLE: Flags = Flags::NEGOTIATE_KEY_EXCHANGE
        .union(Flags::NEGOTIATE_SIGN)
        .union(Flags::NEGOTIATE_SEAL);

    /// Looks up a single flag by its symbolic name.
    ///
    /// Both the full name (`NEGOTIATE_UNICODE`) and the short form without the `NEGOTIATE_` prefix
    /// (`UNICODE`) are accepted; the lookup ignores ASCII case.
    pub fn by_name(name: &str) -> Option<Flags> {
        let upper = name.to_ascii_uppercase();
        Flags::from_name(&upper)
            .or_else(|| Flags::from_name(&format!("NEGOTIATE_{}", upper)))
    }

    /// Whether strings in messages carrying these flags are encoded as UTF-16.
    pub fn is_unicode(&self) -> bool {
        self.contains(Flags::NEGOTIATE_UNICODE)
    }
}
