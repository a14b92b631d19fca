//! Four-character record type codes.

use std::fmt;

use serde::{Serialize, Serializer};

/// A record type code such as `MODL` or `CHAR`.
///
/// The first character occupies the most significant byte, so on disk
/// (little-endian) the characters appear reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagCode(pub u32);

impl TagCode {
    /// Header record, format version 33.
    pub const HEADER_33: TagCode = TagCode::from_bytes(*b"MD33");
    /// Header record, format version 34.
    pub const HEADER_34: TagCode = TagCode::from_bytes(*b"MD34");
    /// NUL-terminated string record.
    pub const CHAR: TagCode = TagCode::from_bytes(*b"CHAR");
    /// Root model record.
    pub const MODEL: TagCode = TagCode::from_bytes(*b"MODL");

    /// Build a code from exactly four characters.
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        TagCode(u32::from_be_bytes(bytes))
    }

    /// Build a code from a name of one to four characters.
    ///
    /// Returns `None` for empty or longer names, which never name a record kind.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.is_empty() || name.len() > 4 {
            return None;
        }
        let code = name.bytes().fold(0u32, |acc, b| (acc << 8) | u32::from(b));
        Some(TagCode(code))
    }

    /// Whether this code identifies a container header.
    pub fn is_header(self) -> bool {
        self == Self::HEADER_33 || self == Self::HEADER_34
    }
}

impl fmt::Display for TagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        f.write_str(&String::from_utf8_lossy(&bytes[start..]))
    }
}

impl Serialize for TagCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
