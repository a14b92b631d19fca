//! Typed field values and fixed-width scalar access.

use std::fmt;

use serde::Serialize;

use crate::header::Reference;

/// Bytes of a binary field shown before the value is elided.
pub const BINARY_DISPLAY_BYTES: usize = 16;

/// A field's value decoded according to its layout type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Float(f32),
    /// Fixed-point value with its stored integer.
    Fixed { raw: u32, value: f32 },
    Reference(Reference),
    Bit(bool),
    Binary(Vec<u8>),
    String(String),
    /// Placeholder of a nested structure; its fields carry the values.
    Structure,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Unsigned(v) => write!(f, "{v}"),
            FieldValue::Signed(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Fixed { value, .. } => write!(f, "{value}"),
            FieldValue::Reference(r) => match r.flags {
                Some(flags) => write!(f, "idx={}, cnt={}, flag={flags:x}", r.index, r.count),
                None => write!(f, "idx={}, cnt={}", r.index, r.count),
            },
            FieldValue::Bit(on) => f.write_str(if *on { "on" } else { "off" }),
            FieldValue::Binary(bytes) => f.write_str(&hex_preview(bytes, bytes.len())),
            FieldValue::String(s) => f.write_str(s),
            FieldValue::Structure => Ok(()),
        }
    }
}

/// Hex rendering of at most [`BINARY_DISPLAY_BYTES`] bytes in groups of four.
///
/// `size` is the full field size; a trailing `...` marks elided bytes.
pub fn hex_preview(bytes: &[u8], size: usize) -> String {
    let shown = &bytes[..bytes.len().min(BINARY_DISPLAY_BYTES)];
    let mut out = String::with_capacity(shown.len() * 3 + 4);
    for (i, b) in shown.iter().enumerate() {
        if i > 0 {
            out.push(' ');
            if i % 4 == 0 {
                out.push(' ');
            }
        }
        out.push_str(&format!("{b:02x}"));
    }
    if size > BINARY_DISPLAY_BYTES {
        out.push_str(" ...");
    }
    out
}

/// A fixed-width little-endian number that can be read from or written to
/// a field of the same width.
pub trait Scalar: Copy + fmt::Display {
    const WIDTH: usize;

    /// Decode from the first [`Self::WIDTH`] bytes of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than [`Self::WIDTH`].
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// Encode into the first [`Self::WIDTH`] bytes of `out`.
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than [`Self::WIDTH`].
    fn write_le(self, out: &mut [u8]);
}

macro_rules! impl_scalar {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            const WIDTH: usize = std::mem::size_of::<$t>();

            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&bytes[..Self::WIDTH]);
                <$t>::from_le_bytes(buf)
            }

            fn write_le(self, out: &mut [u8]) {
                out[..Self::WIDTH].copy_from_slice(&self.to_le_bytes());
            }
        }
    )*};
}

impl_scalar!(u8, u16, u32, u64, i8, i16, i32, f32);
