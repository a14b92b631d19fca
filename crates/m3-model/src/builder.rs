//! Programmatic construction of model containers.
//!
//! `ContainerBuilder` assembles a valid container from tag payloads: it
//! writes the header record, places every tag on a 16-byte boundary, and
//! appends the index table. Tools use it to produce fixtures and fresh
//! files; [`crate::ModelFile::parse`] reads the result back.
//!
//! # Example
//!
//! ```rust
//! use m3_model::{ContainerBuilder, Reference};
//! use m3_schema::TagCode;
//!
//! let mut builder = ContainerBuilder::new();
//! let name = builder.add_string("Marine");
//!
//! let mut modl = Reference::new(7, name as u32).to_bytes();
//! modl.extend_from_slice(&0u32.to_le_bytes());
//! let root = builder.add_tag(TagCode::MODEL, 23, 1, modl);
//! builder.set_root(root);
//!
//! let bytes = builder.build();
//! assert_eq!(&bytes[..4], b"43DM");
//! ```

use m3_schema::codec::{align_padding, step_padding, PAD_BYTE};
use m3_schema::TagCode;

use crate::header::{Header, IndexEntry, Reference, HEADER_SIZE, HEADER_TAG_VERSION};

/// One tag waiting to be written.
#[derive(Debug, Clone)]
struct PendingTag {
    code: TagCode,
    version: u32,
    count: u32,
    data: Vec<u8>,
}

/// Builds a container tag by tag. Index 0 is reserved for the header.
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    magic: TagCode,
    tags: Vec<PendingTag>,
    root: u32,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    /// Start an MD34 container.
    pub fn new() -> Self {
        Self {
            magic: TagCode::HEADER_34,
            tags: Vec::new(),
            root: 0,
        }
    }

    /// Use a different header magic, e.g. [`TagCode::HEADER_33`].
    pub fn with_magic(mut self, magic: TagCode) -> Self {
        self.magic = magic;
        self
    }

    /// Append a tag; returns its index in the finished container.
    pub fn add_tag(&mut self, code: TagCode, version: u32, count: u32, data: Vec<u8>) -> usize {
        self.tags.push(PendingTag {
            code,
            version,
            count,
            data,
        });
        self.tags.len()
    }

    /// Append a string record. Its count is the encoded length including
    /// the terminating NUL.
    pub fn add_string(&mut self, text: &str) -> usize {
        let mut data = text.as_bytes().to_vec();
        data.push(0);
        let count = data.len() as u32;
        data.resize(data.len() + step_padding(data.len()), PAD_BYTE);
        self.add_tag(TagCode::CHAR, 0, count, data)
    }

    /// Designate the root model record.
    pub fn set_root(&mut self, index: usize) {
        self.root = index as u32;
    }

    /// Number of tags including the header.
    pub fn tag_count(&self) -> usize {
        self.tags.len() + 1
    }

    /// Assemble the container bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0u8; HEADER_SIZE];
        out.resize(HEADER_SIZE + align_padding(HEADER_SIZE), PAD_BYTE);

        let mut entries = vec![IndexEntry {
            code: self.magic,
            offset: 0,
            count: 1,
            version: HEADER_TAG_VERSION,
        }];
        for tag in &self.tags {
            entries.push(IndexEntry {
                code: tag.code,
                offset: out.len() as u32,
                count: tag.count,
                version: tag.version,
            });
            out.extend_from_slice(&tag.data);
            out.resize(out.len() + align_padding(out.len()), PAD_BYTE);
        }

        let index_offset = out.len() as u32;
        for entry in &entries {
            out.extend_from_slice(&entry.to_bytes());
        }
        Header {
            magic: self.magic,
            index_offset,
            index_count: entries.len() as u32,
            root: Reference::new(1, self.root),
        }
        .write_into(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::INDEX_ENTRY_SIZE;

    #[test]
    fn empty_container() {
        let bytes = ContainerBuilder::new().build();
        let header = Header::from_bytes(&bytes).unwrap();
        assert_eq!(header.index_count, 1);
        assert_eq!(header.index_offset, 32);
        assert_eq!(bytes.len(), 32 + INDEX_ENTRY_SIZE);
        assert!(bytes[24..32].iter().all(|&b| b == PAD_BYTE));
    }

    #[test]
    fn tags_are_aligned() {
        let mut builder = ContainerBuilder::new().with_magic(TagCode::HEADER_33);
        let a = builder.add_tag(TagCode::from_name("U32_").unwrap(), 0, 1, vec![1, 0, 0, 0]);
        let b = builder.add_string("abcdefghijklmnop");
        assert_eq!((a, b), (1, 2));
        assert_eq!(builder.tag_count(), 3);

        let bytes = builder.build();
        let header = Header::from_bytes(&bytes).unwrap();
        assert_eq!(header.magic, TagCode::HEADER_33);
        let entries = IndexEntry::read_table(&bytes, header.index_offset, 3).unwrap();
        assert_eq!(entries[1].offset, 32);
        assert_eq!(entries[2].offset, 48);
        assert_eq!(entries[2].count, 17);
        assert_eq!(header.index_offset, 48 + 32);
        assert!(entries.iter().all(|e| e.offset % 16 == 0));
    }

    #[test]
    fn root_reference() {
        let mut builder = ContainerBuilder::new();
        let root = builder.add_tag(TagCode::MODEL, 23, 1, vec![0; 16]);
        builder.set_root(root);
        let header = Header::from_bytes(&builder.build()).unwrap();
        assert_eq!(header.root, Reference::new(1, 1));
    }
}
