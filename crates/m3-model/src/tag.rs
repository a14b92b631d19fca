//! One record of a parsed container and typed access to its fields.
//!
//! Fields are addressed by their index in the tag's resolved layout; every
//! accessor checks that the index belongs to the layout and that the bytes
//! at `item_size * item + field.offset` lie inside the tag's data.

use std::fmt;
use std::ops::Range;

use m3_schema::codec::{
    fixed16_to_float, fixed8_to_float, float_to_fixed16, float_to_fixed8, read_uint, write_uint,
};
use m3_schema::{FieldLayout, FieldType, TagCode, TagLayout};
use serde::Serialize;

use crate::error::FieldError;
use crate::header::{IndexEntry, Reference};
use crate::value::{hex_preview, FieldValue, Scalar};

/// A reference into a tag, recorded during graph resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IncomingRef {
    /// Index of the referencing tag.
    pub tag: usize,
    pub item: usize,
    /// Field index in the referencing tag's layout.
    pub field: usize,
    /// Absolute offset of the reference in the referencing tag's data.
    pub offset: usize,
}

/// A record instance: owned bytes bound to a resolved layout.
#[derive(Debug, Clone)]
pub struct Tag {
    index: usize,
    code: TagCode,
    version: u32,
    raw_count: u32,
    count: usize,
    data: Vec<u8>,
    layout: TagLayout,
    pub(crate) incoming: Vec<IncomingRef>,
    /// Set once a binary-payload reference has forced the opaque layout.
    pub(crate) forced_binary: bool,
}

impl Tag {
    pub(crate) fn new(index: usize, entry: &IndexEntry, data: Vec<u8>, layout: TagLayout) -> Self {
        Self {
            index,
            code: entry.code,
            version: entry.version,
            raw_count: entry.count,
            count: entry.count as usize,
            data,
            layout,
            incoming: Vec::new(),
            forced_binary: false,
        }
    }

    /// Position in the container's tag table.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn code(&self) -> TagCode {
        self.code
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Count as stored in the index table.
    pub fn raw_count(&self) -> u32 {
        self.raw_count
    }

    /// Number of items; differs from [`Tag::raw_count`] for vertex data.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn layout(&self) -> &TagLayout {
        &self.layout
    }

    pub fn fields(&self) -> &[FieldLayout] {
        self.layout.fields()
    }

    pub fn incoming(&self) -> &[IncomingRef] {
        &self.incoming
    }

    pub fn is_string(&self) -> bool {
        self.layout.is_char()
    }

    /// Swap in a reclassified layout. Vertex data is counted in bytes, so its
    /// item count is recomputed from the new item size.
    pub(crate) fn replace_layout(&mut self, layout: TagLayout) {
        self.count = match &layout {
            TagLayout::Vertex { layout, .. } if layout.item_size > 0 => {
                self.raw_count as usize / layout.item_size
            }
            TagLayout::Vertex { .. } => 0,
            _ => self.raw_count as usize,
        };
        self.layout = layout;
    }

    /// Replace the record bytes and stored count.
    pub(crate) fn replace_data(&mut self, data: Vec<u8>, raw_count: u32) {
        self.data = data;
        self.raw_count = raw_count;
        self.count = raw_count as usize;
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Items whose bytes are fully present; used when walking references.
    pub fn complete_items(&self) -> usize {
        match self.layout.item_size() {
            0 => 0,
            size => self.count.min(self.data.len() / size),
        }
    }

    /// Field at `field` in this tag's layout.
    pub fn field(&self, field: usize) -> Result<&FieldLayout, FieldError> {
        self.fields()
            .get(field)
            .ok_or_else(|| FieldError::NotPartOfLayout {
                field,
                tag: self.to_string(),
            })
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.layout.layout().field_index(name)
    }

    /// Like [`Tag::field_index`], failing with [`FieldError::UnknownField`].
    pub fn require_field(&self, name: &str) -> Result<usize, FieldError> {
        self.field_index(name)
            .ok_or_else(|| FieldError::UnknownField {
                name: name.to_string(),
                tag: self.to_string(),
            })
    }

    /// Byte range of `field` in `item`.
    ///
    /// Record-wide layouts (strings, opaque binary) have a single item whose
    /// unsized field spans the whole data.
    pub fn field_range(&self, item: usize, field: usize) -> Result<Range<usize>, FieldError> {
        let f = self.field(field)?;
        let item_size = self.layout.item_size();
        if item_size == 0 {
            if item > 0 {
                return Err(FieldError::ItemOutOfRange { item, count: 1 });
            }
        } else if item >= self.count {
            return Err(FieldError::ItemOutOfRange {
                item,
                count: self.count,
            });
        }

        let size = if item_size == 0 && f.size == 0 {
            self.data.len()
        } else {
            f.size
        };
        let offset = f.data_offset(item_size, item);
        let out_of_bounds = FieldError::OutOfBounds {
            offset,
            size,
            len: self.data.len(),
        };
        match offset.checked_add(size) {
            Some(end) if end <= self.data.len() => Ok(offset..end),
            _ => Err(out_of_bounds),
        }
    }

    fn bytes(&self, item: usize, field: usize) -> Result<&[u8], FieldError> {
        let range = self.field_range(item, field)?;
        Ok(&self.data[range])
    }

    /// Read a field whose width matches `T`.
    pub fn get<T: Scalar>(&self, item: usize, field: usize) -> Result<T, FieldError> {
        let bytes = self.bytes(item, field)?;
        if bytes.len() != T::WIDTH {
            return Err(self.width_mismatch(field, T::WIDTH, bytes.len()));
        }
        Ok(T::from_le_slice(bytes))
    }

    /// Write a field whose width matches `T`.
    pub fn set<T: Scalar>(&mut self, item: usize, field: usize, value: T) -> Result<(), FieldError> {
        let range = self.field_range(item, field)?;
        if range.len() != T::WIDTH {
            return Err(self.width_mismatch(field, T::WIDTH, range.len()));
        }
        value.write_le(&mut self.data[range]);
        Ok(())
    }

    /// The field's bytes as an unsigned integer of the field's own width.
    pub fn uint(&self, item: usize, field: usize) -> Result<u64, FieldError> {
        let range = self.field_range(item, field)?;
        read_uint(&self.data, range.start, range.len())
            .ok_or_else(|| self.width_mismatch(field, 4, range.len()))
    }

    /// Store an unsigned value, rejecting values wider than the field.
    pub fn set_uint(&mut self, item: usize, field: usize, value: u64) -> Result<(), FieldError> {
        let range = self.field_range(item, field)?;
        if !matches!(range.len(), 1 | 2 | 4 | 8) {
            return Err(self.width_mismatch(field, 4, range.len()));
        }
        write_uint(&mut self.data, range.start, range.len(), value).ok_or_else(|| {
            FieldError::ValueOutOfRange {
                field: self.field_name(field),
                value: value.to_string(),
            }
        })
    }

    /// Read a signed field, sign-extending from the field's width.
    pub fn int(&self, item: usize, field: usize) -> Result<i64, FieldError> {
        let raw = self.uint(item, field)?;
        let shift = 64 - 8 * self.field_range(item, field)?.len() as u32;
        Ok(((raw << shift) as i64) >> shift)
    }

    /// Store a signed value in two's complement, rejecting out-of-range values.
    pub fn set_int(&mut self, item: usize, field: usize, value: i64) -> Result<(), FieldError> {
        let width = self.field_range(item, field)?.len();
        if !matches!(width, 1 | 2 | 4 | 8) {
            return Err(self.width_mismatch(field, 4, width));
        }
        let bits = 8 * width as u32;
        let fits = bits == 64 || {
            let min = -(1i64 << (bits - 1));
            let max = (1i64 << (bits - 1)) - 1;
            (min..=max).contains(&value)
        };
        if !fits {
            return Err(FieldError::ValueOutOfRange {
                field: self.field_name(field),
                value: value.to_string(),
            });
        }
        let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        self.set_uint(item, field, value as u64 & mask)
    }

    /// Read a float, decoding fixed-point encodings.
    pub fn float(&self, item: usize, field: usize) -> Result<f32, FieldError> {
        match self.field(field)?.ty {
            FieldType::Float => self.get::<f32>(item, field),
            FieldType::Fixed8 => Ok(fixed8_to_float(self.get::<u8>(item, field)?)),
            FieldType::Fixed16 => Ok(fixed16_to_float(self.get::<u16>(item, field)?)),
            ty => Err(self.type_mismatch(field, ty, "float")),
        }
    }

    /// Write a float, encoding into the field's fixed-point form if needed.
    pub fn set_float(&mut self, item: usize, field: usize, value: f32) -> Result<(), FieldError> {
        match self.field(field)?.ty {
            FieldType::Float => self.set(item, field, value),
            FieldType::Fixed8 => self.set(item, field, float_to_fixed8(value)),
            FieldType::Fixed16 => self.set(item, field, float_to_fixed16(value)),
            ty => Err(self.type_mismatch(field, ty, "float")),
        }
    }

    fn bit_field(&self, field: usize) -> Result<&FieldLayout, FieldError> {
        let f = self.field(field)?;
        if f.ty != FieldType::Bit {
            return Err(FieldError::NotABitField {
                field: f.name.clone(),
            });
        }
        Ok(f)
    }

    /// Whether every bit of the flag's mask is set.
    pub fn bit(&self, item: usize, field: usize) -> Result<bool, FieldError> {
        let mask = u64::from(self.bit_field(field)?.bit_mask);
        Ok(self.uint(item, field)? & mask == mask)
    }

    /// Set or clear a flag bit, preserving the other bits of the word.
    pub fn set_bit(&mut self, item: usize, field: usize, on: bool) -> Result<(), FieldError> {
        let mask = u64::from(self.bit_field(field)?.bit_mask);
        let word = self.uint(item, field)?;
        let word = if on { word | mask } else { word & !mask };
        self.set_uint(item, field, word)
    }

    /// Decoded content of a string record.
    ///
    /// The text runs to the first NUL within the stored count. Filler after
    /// it is not part of the string.
    pub fn string(&self) -> Result<String, FieldError> {
        if !self.is_string() {
            return Err(FieldError::NotAString {
                tag: self.to_string(),
            });
        }
        let stored = &self.data[..self.count.min(self.data.len())];
        let text = stored
            .iter()
            .position(|&b| b == 0)
            .map_or(stored, |nul| &stored[..nul]);
        Ok(String::from_utf8_lossy(text).into_owned())
    }

    /// Raw bytes of a field.
    pub fn binary(&self, item: usize, field: usize) -> Result<&[u8], FieldError> {
        self.bytes(item, field)
    }

    /// Hex preview of a field's bytes.
    pub fn binary_hex(&self, item: usize, field: usize) -> Result<String, FieldError> {
        let bytes = self.bytes(item, field)?;
        Ok(hex_preview(bytes, bytes.len()))
    }

    /// Decode a reference field without following it.
    pub fn read_reference(&self, item: usize, field: usize) -> Result<Reference, FieldError> {
        let f = self.field(field)?;
        if !f.is_reference() {
            return Err(FieldError::NotAReference {
                field: f.name.clone(),
                type_name: f.ty.display_name().to_string(),
            });
        }
        let small = f.ty == FieldType::SmallReference;
        let range = self.field_range(item, field)?;
        Reference::read(&self.data, range.start, small).ok_or(FieldError::OutOfBounds {
            offset: range.start,
            size: range.len(),
            len: self.data.len(),
        })
    }

    /// Decode a field according to its layout type.
    pub fn value(&self, item: usize, field: usize) -> Result<FieldValue, FieldError> {
        let value = match self.field(field)?.ty {
            FieldType::U8 | FieldType::U16 | FieldType::U32 => {
                FieldValue::Unsigned(self.uint(item, field)?)
            }
            FieldType::I8 | FieldType::I16 | FieldType::I32 => {
                FieldValue::Signed(self.int(item, field)?)
            }
            FieldType::Float => FieldValue::Float(self.float(item, field)?),
            FieldType::Fixed8 | FieldType::Fixed16 => FieldValue::Fixed {
                raw: self.uint(item, field)? as u32,
                value: self.float(item, field)?,
            },
            FieldType::Reference | FieldType::SmallReference => {
                FieldValue::Reference(self.read_reference(item, field)?)
            }
            FieldType::Bit => FieldValue::Bit(self.bit(item, field)?),
            FieldType::Binary => FieldValue::Binary(self.binary(item, field)?.to_vec()),
            FieldType::Char => FieldValue::String(self.string()?),
            FieldType::Struct => FieldValue::Structure,
        };
        Ok(value)
    }

    /// Short description of a field: declared defaults and reference target,
    /// or the size for strings and binary.
    pub fn field_info(&self, field: usize) -> Result<String, FieldError> {
        let f = self.field(field)?;
        match f.ty {
            FieldType::Char => return Ok(format!("Size = {}", self.count)),
            FieldType::Binary => {
                let size = if f.size == 0 { self.data.len() } else { f.size };
                return Ok(format!("Size = {size}"));
            }
            _ => {}
        }
        let mut parts = Vec::new();
        if let Some(default) = &f.default {
            parts.push(format!("Default = {default}"));
        }
        if let Some(expected) = &f.expected {
            parts.push(format!("Expected = {expected}"));
        }
        if let Some(ref_to) = &f.ref_to {
            parts.push(format!("Ref to {ref_to}"));
        }
        Ok(parts.join(", "))
    }

    /// Parse `text` according to the field type and store it.
    ///
    /// Integers accept decimal or `0x` hex, flag bits accept `on`/`off`,
    /// references take `count,index[,flags]` and binary takes hex digits
    /// covering the whole field.
    pub fn set_text(&mut self, item: usize, field: usize, text: &str) -> Result<(), FieldError> {
        let ty = self.field(field)?.ty;
        let invalid = || FieldError::InvalidValue {
            field: self.field_name(field),
            ty,
            text: text.to_string(),
        };
        let text = text.trim();
        match ty {
            FieldType::U8 | FieldType::U16 | FieldType::U32 => {
                let value = parse_unsigned(text).ok_or_else(invalid)?;
                self.set_uint(item, field, value)
            }
            FieldType::I8 | FieldType::I16 | FieldType::I32 => {
                let value = text.parse::<i64>().map_err(|_| invalid())?;
                self.set_int(item, field, value)
            }
            FieldType::Float | FieldType::Fixed8 | FieldType::Fixed16 => {
                let value = text.parse::<f32>().map_err(|_| invalid())?;
                self.set_float(item, field, value)
            }
            FieldType::Bit => {
                let on = match text.to_ascii_lowercase().as_str() {
                    "on" | "true" | "1" => true,
                    "off" | "false" | "0" => false,
                    _ => return Err(invalid()),
                };
                self.set_bit(item, field, on)
            }
            FieldType::Reference | FieldType::SmallReference => {
                let words = text
                    .split(',')
                    .map(|w| parse_unsigned(w.trim()).and_then(|v| u32::try_from(v).ok()))
                    .collect::<Option<Vec<u32>>>()
                    .ok_or_else(invalid)?;
                let current = self.read_reference(item, field)?;
                let reference = match (words.as_slice(), current.flags) {
                    ([count, index], flags) => Reference {
                        count: *count,
                        index: *index,
                        flags,
                    },
                    ([count, index, flags], Some(_)) => Reference {
                        count: *count,
                        index: *index,
                        flags: Some(*flags),
                    },
                    _ => return Err(invalid()),
                };
                let range = self.field_range(item, field)?;
                self.data[range].copy_from_slice(&reference.to_bytes());
                Ok(())
            }
            FieldType::Binary => {
                let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                let bytes = decode_hex(&digits).ok_or_else(invalid)?;
                let range = self.field_range(item, field)?;
                if bytes.len() != range.len() {
                    return Err(self.width_mismatch(field, range.len(), bytes.len()));
                }
                self.data[range].copy_from_slice(&bytes);
                Ok(())
            }
            FieldType::Char | FieldType::Struct => Err(self.type_mismatch(field, ty, "text")),
        }
    }

    fn field_name(&self, field: usize) -> String {
        self.fields()
            .get(field)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| format!("#{field}"))
    }

    fn width_mismatch(&self, field: usize, expected: usize, actual: usize) -> FieldError {
        FieldError::WidthMismatch {
            field: self.field_name(field),
            expected,
            actual,
        }
    }

    fn type_mismatch(&self, field: usize, ty: FieldType, requested: &'static str) -> FieldError {
        FieldError::TypeMismatch {
            field: self.field_name(field),
            ty,
            requested,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.code, self.index)
    }
}

fn parse_unsigned(text: &str) -> Option<u64> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

fn decode_hex(digits: &str) -> Option<Vec<u8>> {
    if digits.len() % 2 != 0 || !digits.is_ascii() {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect()
}
