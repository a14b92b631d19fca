//! Error types for container parsing, field access, and reference lookup.

use std::io;

use m3_schema::{FieldType, LayoutError, TagCode};
use thiserror::Error;

/// Errors that abort loading a container.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("file too small: {len} bytes, a container needs at least {needed}")]
    TooSmall { len: usize, needed: usize },

    #[error("unrecognized header tag {0:#010x}, expected MD33 or MD34")]
    UnrecognizedHeader(u32),

    #[error("tag index at {offset:#x} with {count} entries runs past the end of the file ({len} bytes)")]
    IndexOutOfRange { offset: u32, count: u32, len: usize },

    #[error("tag #{index} has an invalid byte range {start:#x}..{end:#x}")]
    TagRangeInvalid { index: usize, start: usize, end: usize },

    #[error("root record index {index} is outside the tag table ({count} tags)")]
    RootOutOfRange { index: u32, count: u32 },

    #[error("cannot resolve layout of {code}#{index}: {source}")]
    Layout {
        index: usize,
        code: TagCode,
        #[source]
        source: LayoutError,
    },

    #[error("cannot resolve vertex layout: {0}")]
    VertexLayout(#[from] LayoutError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from reading or writing a single field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("field #{field} is not part of the layout of {tag}")]
    NotPartOfLayout { field: usize, tag: String },

    #[error("field `{name}` not found in {tag}")]
    UnknownField { name: String, tag: String },

    #[error("field `{field}` is not a reference ({type_name})")]
    NotAReference { field: String, type_name: String },

    #[error("{tag} does not hold a string")]
    NotAString { tag: String },

    #[error("field `{field}` is not a flag bit")]
    NotABitField { field: String },

    #[error("field `{field}` is {actual} bytes wide, accessor expects {expected}")]
    WidthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("field `{field}` of type {ty} cannot be accessed as {requested}")]
    TypeMismatch {
        field: String,
        ty: FieldType,
        requested: &'static str,
    },

    #[error("value {value} does not fit field `{field}`")]
    ValueOutOfRange { field: String, value: String },

    #[error("cannot parse `{text}` for field `{field}` of type {ty}")]
    InvalidValue {
        field: String,
        ty: FieldType,
        text: String,
    },

    #[error("item {item} out of range, tag has {count} items")]
    ItemOutOfRange { item: usize, count: usize },

    #[error("bytes {offset}..{end} are outside the tag data ({len} bytes)", end = .offset + .size)]
    OutOfBounds {
        offset: usize,
        size: usize,
        len: usize,
    },
}

/// Errors from following a reference field to its target.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RefError {
    #[error("null reference: {tag}[{item}] - {field}")]
    Invalid {
        tag: String,
        item: usize,
        field: String,
    },

    #[error("reference index {index} out of bounds, tag table holds {count} tags")]
    IndexOutOfBounds { index: u32, count: usize },

    #[error(transparent)]
    Field(#[from] FieldError),
}
