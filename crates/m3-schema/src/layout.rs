//! Layout resolution: structure definitions to concrete byte layouts.
//!
//! A [`Layout`] is computed for one structure at one format version (and, for
//! the vertex format, one flag mask). Nested structures are spliced in at the
//! running offset under a dotted name prefix; bit decompositions and long
//! binary fields add pseudo-fields parented to the field they describe. Every
//! field is kept both in a flat list and in a parent/child tree.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::error::LayoutError;
use crate::schema::{FieldDef, FieldKind, SchemaRepository, StructDef};
use crate::tag::TagCode;
use crate::types::FieldType;

/// Binary fields longer than this are split into display rows of this size.
pub const BINARY_CHUNK_BYTES: usize = 16;

/// Limit on nested structure depth.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Structure used to lay out the vertex array.
pub const VERTEX_FORMAT_STRUCT: &str = "VertexFormat";

/// Root record field holding the vertex format flags.
pub const VERTEX_FLAGS_FIELD: &str = "vFlags";

/// Separator between a nested structure's field name and its own fields.
pub const NESTED_DELIMITER: char = '.';

/// What a reference field points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefKind {
    Plain,
    /// Target holds opaque binary payload.
    Binary,
    /// Target is the vertex array.
    Vertices,
}

/// A field placed at a concrete offset within one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldLayout {
    /// Dotted name, e.g. `boundings.min.x`.
    pub name: String,
    pub type_name: String,
    pub ty: FieldType,
    /// Byte offset inside one item.
    pub offset: usize,
    pub size: usize,
    /// Bit mask for [`FieldType::Bit`] pseudo-fields, zero otherwise.
    pub bit_mask: u32,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub ref_kind: Option<RefKind>,
    /// The field that stands for a simple structure's whole item.
    pub self_field: bool,
    pub default: Option<String>,
    pub expected: Option<String>,
    pub ref_to: Option<String>,
    pub hint: Option<String>,
}

impl FieldLayout {
    fn new(name: String, type_name: &str, ty: FieldType, offset: usize, size: usize) -> Self {
        Self {
            name,
            type_name: type_name.to_string(),
            ty,
            offset,
            size,
            bit_mask: 0,
            parent: None,
            children: Vec::new(),
            ref_kind: None,
            self_field: false,
            default: None,
            expected: None,
            ref_to: None,
            hint: None,
        }
    }

    pub fn is_reference(&self) -> bool {
        self.ty.is_reference()
    }

    /// Reference fields that lead to another record.
    pub fn is_outward_reference(&self) -> bool {
        self.is_reference() && !self.self_field
    }

    /// Absolute offset of this field in item `item` of a record.
    pub fn data_offset(&self, item_size: usize, item: usize) -> usize {
        item_size * item + self.offset
    }
}

/// The resolved fields of one record kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    /// Structure or record name the layout was built from.
    pub name: String,
    /// Bytes per item; zero for layouts that span the whole record.
    pub item_size: usize,
    pub fields: Vec<FieldLayout>,
    /// Indices of fields without a parent.
    pub roots: Vec<usize>,
    pub has_refs: bool,
    /// Root-level reference named `name`, used to label items.
    pub name_field: Option<usize>,
}

impl Layout {
    fn single(name: &str, field: FieldLayout) -> Self {
        Self {
            name: name.to_string(),
            item_size: field.size,
            fields: vec![field],
            roots: vec![0],
            has_refs: false,
            name_field: None,
        }
    }

    /// Index of the field with the given dotted name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Layouts with a single field are shown as bare values, not structures.
    pub fn is_single_field(&self) -> bool {
        self.fields.len() == 1
    }
}

/// Coarse classification of a [`TagLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutKind {
    Char,
    Simple,
    Composite,
    OpaqueBinary,
    Vertex,
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LayoutKind::Char => "char",
            LayoutKind::Simple => "simple",
            LayoutKind::Composite => "composite",
            LayoutKind::OpaqueBinary => "opaque-binary",
            LayoutKind::Vertex => "vertex",
        };
        f.write_str(s)
    }
}

/// The layout bound to a record.
///
/// Reclassification after reference resolution replaces the whole value
/// (a record becomes [`TagLayout::OpaqueBinary`] or [`TagLayout::Vertex`]).
#[derive(Debug, Clone, PartialEq)]
pub enum TagLayout {
    /// Whole record is one NUL-terminated string.
    Char(Arc<Layout>),
    /// Each item is one numeric value.
    Simple(Arc<Layout>),
    Composite(Arc<Layout>),
    /// Whole record is uninterpreted bytes.
    OpaqueBinary(Arc<Layout>),
    /// Vertex array laid out for a specific flag mask.
    Vertex { flags: u32, layout: Arc<Layout> },
}

impl TagLayout {
    /// Fixed one-field layout of string records.
    pub fn char_string() -> Self {
        let field = FieldLayout::new("string".into(), "CHAR", FieldType::Char, 0, 0);
        TagLayout::Char(Arc::new(Layout::single("CHAR", field)))
    }

    /// Fallback for records the schema does not describe.
    pub fn opaque_binary(name: &str) -> Self {
        let field = FieldLayout::new("data".into(), "", FieldType::Binary, 0, 0);
        TagLayout::OpaqueBinary(Arc::new(Layout::single(name, field)))
    }

    pub fn layout(&self) -> &Layout {
        match self {
            TagLayout::Char(l)
            | TagLayout::Simple(l)
            | TagLayout::Composite(l)
            | TagLayout::OpaqueBinary(l) => l,
            TagLayout::Vertex { layout, .. } => layout,
        }
    }

    pub fn kind(&self) -> LayoutKind {
        match self {
            TagLayout::Char(_) => LayoutKind::Char,
            TagLayout::Simple(_) => LayoutKind::Simple,
            TagLayout::Composite(_) => LayoutKind::Composite,
            TagLayout::OpaqueBinary(_) => LayoutKind::OpaqueBinary,
            TagLayout::Vertex { .. } => LayoutKind::Vertex,
        }
    }

    pub fn fields(&self) -> &[FieldLayout] {
        &self.layout().fields
    }

    pub fn item_size(&self) -> usize {
        self.layout().item_size
    }

    pub fn is_char(&self) -> bool {
        matches!(self, TagLayout::Char(_))
    }

    pub fn is_opaque_binary(&self) -> bool {
        matches!(self, TagLayout::OpaqueBinary(_))
    }
}

/// Computes layouts from a schema. Resolution is pure: equal inputs give
/// equal layouts.
#[derive(Debug, Clone, Copy)]
pub struct LayoutResolver<'a> {
    schema: &'a SchemaRepository,
}

impl<'a> LayoutResolver<'a> {
    pub fn new(schema: &'a SchemaRepository) -> Self {
        Self { schema }
    }

    /// Resolve `def` at `version`.
    ///
    /// Supplying `flags` applies the fields' mask guards and yields a
    /// [`TagLayout::Vertex`].
    pub fn resolve(
        &self,
        def: &StructDef,
        version: u32,
        flags: Option<u32>,
    ) -> Result<TagLayout, LayoutError> {
        let layout = Arc::new(self.resolve_fields(def, version, flags)?);
        Ok(match flags {
            Some(flags) => TagLayout::Vertex { flags, layout },
            None if def.is_simple() => TagLayout::Simple(layout),
            None => TagLayout::Composite(layout),
        })
    }

    /// Layout for a record of kind `code` stored at `version`.
    pub fn for_tag(&self, code: TagCode, version: u32) -> Result<TagLayout, LayoutError> {
        if code == TagCode::CHAR {
            return Ok(TagLayout::char_string());
        }
        match self.schema.by_tag(code) {
            Some(def) => self.resolve(def, version, None),
            None => Ok(TagLayout::opaque_binary(&code.to_string())),
        }
    }

    /// Vertex array layout for the flag mask read from the root record.
    pub fn vertex_layout(&self, flags: u32) -> Result<TagLayout, LayoutError> {
        let def = self
            .schema
            .by_name(VERTEX_FORMAT_STRUCT)
            .ok_or_else(|| LayoutError::MissingStructure(VERTEX_FORMAT_STRUCT.into()))?;
        self.resolve(def, 0, Some(flags))
    }

    fn resolve_fields(
        &self,
        def: &StructDef,
        version: u32,
        flags: Option<u32>,
    ) -> Result<Layout, LayoutError> {
        let mut walk = Walk {
            schema: self.schema,
            flags,
            fields: Vec::new(),
            roots: Vec::new(),
        };
        let item_size = walk.put_struct(def, version, 0, "", None, 0)?;

        if def.is_simple() {
            if let Some(first) = walk.fields.first_mut() {
                first.self_field = true;
            }
        }
        if let Some(&declared) = def.versions.get(&version) {
            if declared as usize != item_size && flags.is_none() {
                warn!(
                    structure = %def.name,
                    version,
                    declared,
                    computed = item_size,
                    "declared structure size differs from resolved layout"
                );
            }
        }

        let has_refs = walk.fields.iter().any(FieldLayout::is_reference);
        let name_field = walk
            .roots
            .iter()
            .copied()
            .find(|&i| walk.fields[i].name == "name" && walk.fields[i].is_reference());

        Ok(Layout {
            name: def.name.clone(),
            item_size,
            fields: walk.fields,
            roots: walk.roots,
            has_refs,
            name_field,
        })
    }
}

/// Accumulates fields while descending through nested structures.
struct Walk<'a> {
    schema: &'a SchemaRepository,
    flags: Option<u32>,
    fields: Vec<FieldLayout>,
    roots: Vec<usize>,
}

impl Walk<'_> {
    /// Append `field`, linking it under its parent or as a root.
    fn push(&mut self, field: FieldLayout) -> usize {
        let index = self.fields.len();
        match field.parent {
            Some(parent) => self.fields[parent].children.push(index),
            None => self.roots.push(index),
        }
        self.fields.push(field);
        index
    }

    /// Lay out `def`'s fields from `offset`; returns the offset past the last one.
    fn put_struct(
        &mut self,
        def: &StructDef,
        version: u32,
        mut offset: usize,
        prefix: &str,
        parent: Option<usize>,
        depth: usize,
    ) -> Result<usize, LayoutError> {
        for f in &def.fields {
            if !f.applies(version, self.flags) {
                continue;
            }
            let name = format!("{prefix}{}", f.name);
            offset = match &f.kind {
                FieldKind::Nested {
                    name: nested,
                    version: nested_version,
                } => self.put_nested(f, name, nested, *nested_version, offset, parent, depth)?,
                FieldKind::Scalar(ty) => self.put_scalar(f, name, *ty, offset, parent),
            };
        }
        Ok(offset)
    }

    #[allow(clippy::too_many_arguments)]
    fn put_nested(
        &mut self,
        f: &FieldDef,
        name: String,
        nested: &str,
        nested_version: u32,
        offset: usize,
        parent: Option<usize>,
        depth: usize,
    ) -> Result<usize, LayoutError> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(LayoutError::NestingTooDeep {
                field: name,
                limit: MAX_NESTING_DEPTH,
            });
        }
        let def = self
            .schema
            .by_name(nested)
            .ok_or_else(|| LayoutError::UnknownStructure {
                name: nested.to_string(),
                field: name.clone(),
            })?;

        let mut placeholder = FieldLayout::new(name, nested, FieldType::Struct, offset, 0);
        placeholder.parent = parent;
        annotate(&mut placeholder, f);
        let prefix = format!("{}{NESTED_DELIMITER}", placeholder.name);
        let index = self.push(placeholder);

        let end = self.put_struct(def, nested_version, offset, &prefix, Some(index), depth + 1)?;
        self.fields[index].size = end - offset;
        Ok(end)
    }

    fn put_scalar(
        &mut self,
        f: &FieldDef,
        name: String,
        ty: FieldType,
        offset: usize,
        parent: Option<usize>,
    ) -> usize {
        let size = f.size.map_or(ty.intrinsic_size(), |s| s as usize);
        let mut field = FieldLayout::new(name, &f.type_name, ty, offset, size);
        field.parent = parent;
        if ty.is_reference() {
            field.ref_kind = Some(if f.points_to_binary {
                RefKind::Binary
            } else if f.points_to_vertices {
                RefKind::Vertices
            } else {
                RefKind::Plain
            });
        }
        annotate(&mut field, f);
        let base = field.name.clone();
        let index = self.push(field);

        for bit in &f.bits {
            let mut pseudo = FieldLayout::new(
                format!("{base}{NESTED_DELIMITER}{}", bit.name),
                "",
                FieldType::Bit,
                offset,
                size,
            );
            pseudo.bit_mask = bit.mask;
            pseudo.parent = Some(index);
            self.push(pseudo);
        }

        if ty == FieldType::Binary && size > BINARY_CHUNK_BYTES {
            for start in (0..size).step_by(BINARY_CHUNK_BYTES) {
                let len = BINARY_CHUNK_BYTES.min(size - start);
                let mut chunk = FieldLayout::new(
                    format!("{base}[{start:#06x}]"),
                    "",
                    FieldType::Binary,
                    offset + start,
                    len,
                );
                chunk.parent = Some(index);
                self.push(chunk);
            }
        }

        offset + size
    }
}

fn annotate(field: &mut FieldLayout, f: &FieldDef) {
    field.default = f.default.clone();
    field.expected = f.expected.clone();
    field.ref_to = f.ref_to.clone();
    field.hint = f.hint.clone();
}
