//! Container header, tag index entries, and reference encodings.
//!
//! ```text
//! Container:
//! ┌──────────────────────────────────────────┐
//! │ Header (tag #0)                          │
//! │   magic: u32           MD33 | MD34       │
//! │   index_offset: u32                      │
//! │   index_count: u32                       │
//! │   root ref: count, index, flags (u32×3)  │
//! ├──────────────────────────────────────────┤
//! │ Tag #1 .. #n data, 16-byte aligned       │
//! ├──────────────────────────────────────────┤
//! │ Index: n+1 × (code, offset, count, ver)  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian.

use m3_schema::codec::read_u32;
use m3_schema::TagCode;
use serde::Serialize;

use crate::error::FormatError;

/// Size of the fixed container header.
pub const HEADER_SIZE: usize = 24;

/// Size of one tag index entry.
pub const INDEX_ENTRY_SIZE: usize = 16;

/// Structure version recorded for the header tag by newly built containers.
pub const HEADER_TAG_VERSION: u32 = 11;

/// The fixed fields at the start of every container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: TagCode,
    pub index_offset: u32,
    pub index_count: u32,
    /// Reference to the root model record.
    pub root: Reference,
}

impl Header {
    /// Read and validate the header at the start of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        let word = |i: usize| read_u32(data, i * 4);
        let (Some(magic), Some(index_offset), Some(index_count)) = (word(0), word(1), word(2))
        else {
            return Err(FormatError::TooSmall {
                len: data.len(),
                needed: HEADER_SIZE,
            });
        };
        let magic = TagCode(magic);
        if !magic.is_header() {
            return Err(FormatError::UnrecognizedHeader(magic.0));
        }
        let root = Reference::read(data, 12, false).ok_or(FormatError::TooSmall {
            len: data.len(),
            needed: HEADER_SIZE,
        })?;
        Ok(Self {
            magic,
            index_offset,
            index_count,
            root,
        })
    }

    /// Write the header over the first [`HEADER_SIZE`] bytes of `out`.
    pub fn write_into(&self, out: &mut Vec<u8>) {
        if out.len() < HEADER_SIZE {
            out.resize(HEADER_SIZE, 0);
        }
        let words = [
            self.magic.0,
            self.index_offset,
            self.index_count,
            self.root.count,
            self.root.index,
            self.root.flags.unwrap_or(0),
        ];
        for (i, word) in words.into_iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
    }
}

/// One entry of the tag index table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub code: TagCode,
    pub offset: u32,
    /// Item count as stored; a byte count for strings and vertex data.
    pub count: u32,
    pub version: u32,
}

impl IndexEntry {
    pub fn to_bytes(&self) -> [u8; INDEX_ENTRY_SIZE] {
        let mut buf = [0u8; INDEX_ENTRY_SIZE];
        for (i, word) in [self.code.0, self.offset, self.count, self.version]
            .into_iter()
            .enumerate()
        {
            buf[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        buf
    }

    /// Read the entry at `offset`, or `None` when it runs past the end.
    pub fn read(data: &[u8], offset: usize) -> Option<Self> {
        Some(Self {
            code: TagCode(read_u32(data, offset)?),
            offset: read_u32(data, offset + 4)?,
            count: read_u32(data, offset + 8)?,
            version: read_u32(data, offset + 12)?,
        })
    }

    /// Read `count` consecutive entries starting at `offset`.
    pub fn read_table(data: &[u8], offset: u32, count: u32) -> Result<Vec<Self>, FormatError> {
        let out_of_range = || FormatError::IndexOutOfRange {
            offset,
            count,
            len: data.len(),
        };
        let start = offset as usize;
        let end = (count as usize)
            .checked_mul(INDEX_ENTRY_SIZE)
            .and_then(|size| size.checked_add(start))
            .ok_or_else(out_of_range)?;
        if end > data.len() {
            return Err(out_of_range());
        }
        (0..count as usize)
            .map(|i| Self::read(data, start + i * INDEX_ENTRY_SIZE).ok_or_else(out_of_range))
            .collect()
    }
}

/// A decoded reference: `(count, index)` plus `flags` for the 12-byte form.
///
/// `count` is always the first word, so it can be patched in place without
/// knowing which form is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Reference {
    pub count: u32,
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
}

impl Reference {
    /// Encoded size of the `(count, index, flags)` form.
    pub const SIZE: usize = 12;
    /// Encoded size of the `(count, index)` form.
    pub const SMALL_SIZE: usize = 8;

    pub fn new(count: u32, index: u32) -> Self {
        Self {
            count,
            index,
            flags: Some(0),
        }
    }

    pub fn small(count: u32, index: u32) -> Self {
        Self {
            count,
            index,
            flags: None,
        }
    }

    /// Decode the reference stored at `offset`.
    pub fn read(data: &[u8], offset: usize, small: bool) -> Option<Self> {
        let count = read_u32(data, offset)?;
        let index = read_u32(data, offset + 4)?;
        let flags = if small {
            None
        } else {
            Some(read_u32(data, offset + 8)?)
        };
        Some(Self {
            count,
            index,
            flags,
        })
    }

    /// A reference is followed only when it is non-empty and names a tag
    /// other than the header.
    pub fn is_valid(&self, tag_count: usize) -> bool {
        self.count > 0 && self.index >= 1 && (self.index as usize) < tag_count
    }

    pub fn is_small(&self) -> bool {
        self.flags.is_none()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&self.count.to_le_bytes());
        buf.extend_from_slice(&self.index.to_le_bytes());
        if let Some(flags) = self.flags {
            buf.extend_from_slice(&flags.to_le_bytes());
        }
        buf
    }
}
