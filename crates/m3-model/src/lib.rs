//! Tag graph engine for M3 model containers.
//!
//! Parses a container into [`Tag`] records bound to layouts from an
//! [`m3_schema::SchemaRepository`], resolves the references between them,
//! and supports typed field access, string mutation, and repacking.
//!
//! ## Usage
//!
//! ```text
//! let schema = Arc::new(SchemaRepository::load(path)?);
//! let mut model = ModelFile::parse(&bytes, schema)?;
//! let root = model.root();
//! let name = model.reference_by_name(root, 0, "name")?;
//! model.set_string(name.index(), "Marine")?;
//! model.rebuild_references()?;
//! let repacked = model.to_bytes();
//! ```

mod builder;
mod error;
mod header;
mod model;
mod tag;
pub mod tree;
mod value;

pub use builder::ContainerBuilder;
pub use error::{FieldError, FormatError, RefError};
pub use header::{
    Header, IndexEntry, Reference, HEADER_SIZE, HEADER_TAG_VERSION, INDEX_ENTRY_SIZE,
};
pub use model::ModelFile;
pub use tag::{IncomingRef, Tag};
pub use tree::TagTree;
pub use value::{hex_preview, FieldValue, Scalar, BINARY_DISPLAY_BYTES};
