//! Well-known trustees and their security identifiers.
//!
//! A [`Sid`] holds the binary SID exactly as the platform produced it; the
//! string forms (`S-1-5-18`, SDDL aliases) are derived here so audit output
//! does not need another platform round trip.

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Largest binary SID the platform can produce (`SECURITY_MAX_SID_SIZE`).
pub const MAX_SID_SIZE: usize = 68;

/// Well-known identities the mutator grants rights to or assigns as owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trustee {
    LocalSystem,
    Interactive,
    BuiltinAdministrators,
    World,
}

impl Trustee {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trustee::LocalSystem => "SYSTEM",
            Trustee::Interactive => "INTERACTIVE",
            Trustee::BuiltinAdministrators => "Administrators",
            Trustee::World => "Everyone",
        }
    }

    /// `WELL_KNOWN_SID_TYPE` value passed to `CreateWellKnownSid`.
    pub fn well_known_type(&self) -> i32 {
        match self {
            Trustee::World => 1,
            Trustee::Interactive => 11,
            Trustee::LocalSystem => 22,
            Trustee::BuiltinAdministrators => 26,
        }
    }

    /// Trustee groups are tagged as well-known groups in explicit access entries; SYSTEM is a user.
    pub fn is_group(&self) -> bool { !matches!(self, Trustee::LocalSystem) }

    /// Canonical authority and sub-authorities; what a platform resolves these to by default.
    pub fn canonical(&self) -> Sid {
        match self {
            Trustee::World => Sid::from_parts(1, &[0]),
            Trustee::Interactive => Sid::from_parts(5, &[4]),
            Trustee::LocalSystem => Sid::from_parts(5, &[18]),
            Trustee::BuiltinAdministrators => Sid::from_parts(5, &[32, 544]),
        }
    }
}

impl Display for Trustee {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sid {
    bytes: Vec<u8>,
}

impl Sid {
    /// Wrap a binary SID. Returns `None` when the buffer is not a well-formed revision-1 SID.
    pub fn from_bytes(bytes: &[u8]) -> Option<Sid> {
        if bytes.len() < 8 || bytes[0] != 1 { return None; }
        let count = bytes[1] as usize;
        let len = 8 + 4 * count;
        if count > 15 || bytes.len() < len { return None; }
        Some(Sid { bytes: bytes[..len].to_vec() })
    }

    pub fn from_parts(authority: u64, sub_authorities: &[u32]) -> Sid {
        let mut bytes = Vec::with_capacity(8 + 4 * sub_authorities.len());
        bytes.push(1);
        bytes.push(sub_authorities.len() as u8);
        bytes.extend_from_slice(&authority.to_be_bytes()[2..]);
        for sub in sub_authorities { bytes.extend_from_slice(&sub.to_le_bytes()); }
        Sid { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] { &self.bytes }

    pub fn authority(&self) -> u64 {
        self.bytes[2..8].iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
    }

    pub fn sub_authorities(&self) -> Vec<u32> {
        self.bytes[8..]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Two-letter SDDL alias for the well-known SIDs this tool uses, if any.
    pub fn sddl_alias(&self) -> Option<&'static str> {
        match (self.authority(), self.sub_authorities().as_slice()) {
            (1, [0]) => Some("WD"),
            (5, [4]) => Some("IU"),
            (5, [18]) => Some("SY"),
            (5, [32, 544]) => Some("BA"),
            _ => None,
        }
    }
}

impl Display for Sid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let authority = self.authority();
        if authority >> 32 == 0 {
            write!(f, "S-1-{}", authority)?;
        } else {
            write!(f, "S-1-0x{:012X}", authority)?;
        }
        for sub in self.sub_authorities() { write!(f, "-{}", sub)?; }
        Ok(())
    }
}

impl Serialize for Sid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
