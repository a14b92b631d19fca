//! The closed set of field value types.

use std::fmt;

use serde::Serialize;

/// Value type of a field, resolved once from the schema's type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    /// Raw bytes of a declared size.
    Binary,
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    Float,
    /// `u8` mapped onto `[-1.0, 1.0]`.
    Fixed8,
    /// `u16` scaled by 1/2048.
    Fixed16,
    /// `(count, index, flags)` reference.
    Reference,
    /// `(count, index)` reference.
    SmallReference,
    /// Placeholder for a spliced nested structure.
    Struct,
    /// Whole-record NUL-terminated string.
    Char,
    /// One named bit of the parent scalar.
    Bit,
}

impl FieldType {
    /// Map a schema type name onto a scalar type.
    ///
    /// Returns `None` when the name refers to another structure.
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name {
            "" => FieldType::Binary,
            "uint8" => FieldType::U8,
            "uint16" => FieldType::U16,
            "uint32" | "tag" => FieldType::U32,
            "int8" => FieldType::I8,
            "int16" => FieldType::I16,
            "int32" => FieldType::I32,
            "float" => FieldType::Float,
            "fixed8" => FieldType::Fixed8,
            "fixed16" => FieldType::Fixed16,
            "Reference" => FieldType::Reference,
            "SmallReference" => FieldType::SmallReference,
            _ => return None,
        };
        Some(ty)
    }

    /// Byte width implied by the type alone; zero when the schema must say.
    pub fn intrinsic_size(self) -> usize {
        match self {
            FieldType::U8 | FieldType::I8 | FieldType::Fixed8 => 1,
            FieldType::U16 | FieldType::I16 | FieldType::Fixed16 => 2,
            FieldType::U32 | FieldType::I32 | FieldType::Float => 4,
            FieldType::Reference => 12,
            FieldType::SmallReference => 8,
            FieldType::Binary | FieldType::Struct | FieldType::Char | FieldType::Bit => 0,
        }
    }

    /// Single numeric value types; a structure made of one of these is "simple".
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            FieldType::U8
                | FieldType::U16
                | FieldType::U32
                | FieldType::I8
                | FieldType::I16
                | FieldType::I32
                | FieldType::Float
                | FieldType::Fixed8
                | FieldType::Fixed16
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(self, FieldType::I8 | FieldType::I16 | FieldType::I32)
    }

    pub fn is_reference(self) -> bool {
        matches!(self, FieldType::Reference | FieldType::SmallReference)
    }

    /// Human-readable type label.
    pub fn display_name(self) -> &'static str {
        match self {
            FieldType::Binary => "Binary",
            FieldType::U8 => "uInt8",
            FieldType::U16 => "uInt16",
            FieldType::U32 => "uInt32",
            FieldType::I8 => "Int8",
            FieldType::I16 => "Int16",
            FieldType::I32 => "Int32",
            FieldType::Float => "Float",
            FieldType::Fixed8 => "Fixed8",
            FieldType::Fixed16 => "Fixed16",
            FieldType::Reference => "Reference",
            FieldType::SmallReference => "Reference (small)",
            FieldType::Struct => "Structure",
            FieldType::Char => "String",
            FieldType::Bit => "Flag bit",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Split a nested structure type name into its name and embedded version.
///
/// `"BNDSV0"` and `"Foo V3"` carry versions 0 and 3; names without a
/// `V<digits>` suffix resolve at version 0.
pub fn split_versioned_name(type_name: &str) -> (&str, u32) {
    let digits_start = type_name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);
    if let Some(start) = digits_start {
        let (head, digits) = type_name.split_at(start);
        if let (Some(name), Ok(version)) = (head.strip_suffix('V'), digits.parse::<u32>()) {
            return (name.trim_end(), version);
        }
    }
    (type_name, 0)
}
