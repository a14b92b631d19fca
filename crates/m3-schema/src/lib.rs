//! Structure schema engine for M3 model files.
//!
//! Loads the XML document describing every record kind and resolves a
//! structure into a concrete byte layout for a given format version and,
//! for vertex data, a flag mask.
//!
//! ## Resolution
//!
//! ```text
//! StructDef ──(version, flags?)──> Layout
//!   field A (uint32)                 A        @0  size 4
//!   field B (BNDSV0)                 B        @4  size 28  struct
//!     └── BNDS v0                    B.min    @4  size 12  struct
//!                                    B.min.x  @4  size 4
//!                                    ...
//! ```

pub mod codec;
mod error;
mod layout;
mod schema;
mod tag;
mod types;

pub use error::{LayoutError, Result, SchemaError};
pub use layout::{
    FieldLayout, Layout, LayoutKind, LayoutResolver, RefKind, TagLayout, BINARY_CHUNK_BYTES,
    MAX_NESTING_DEPTH, NESTED_DELIMITER, VERTEX_FLAGS_FIELD, VERTEX_FORMAT_STRUCT,
};
pub use schema::{BitDef, FieldDef, FieldKind, SchemaRepository, StructDef};
pub use tag::TagCode;
pub use types::{split_versioned_name, FieldType};
