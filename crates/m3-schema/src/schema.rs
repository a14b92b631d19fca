//! Structure definitions and the XML schema loader.
//!
//! The schema document describes every record kind as a `<structure>` with
//! an optional description, a per-version size table, and an ordered field
//! list:
//!
//! ```text
//! <structure name="MODL">
//!   <description>Model root</description>
//!   <versions><version number="23" size="784"/></versions>
//!   <fields>
//!     <field name="name" type="Reference" refTo="CHAR"/>
//!     <field name="flags" type="uint32">
//!       <bit name="hasMesh" mask="0x100000"/>
//!     </field>
//!     <field name="boundings" type="BNDSV0"/>
//!   </fields>
//! </structure>
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::tag::TagCode;
use crate::types::{split_versioned_name, FieldType};

/// A named bit inside a scalar field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitDef {
    pub name: String,
    pub mask: u32,
}

/// How a field's type resolves: a scalar, or another structure spliced in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(FieldType),
    Nested {
        /// Structure name with any version suffix removed.
        name: String,
        /// Version to resolve the nested structure at.
        version: u32,
    },
}

/// One field of a structure definition, independent of any file version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    /// Type name exactly as written in the schema.
    pub type_name: String,
    pub kind: FieldKind,
    /// Explicit byte size, when declared.
    pub size: Option<u32>,
    pub default: Option<String>,
    pub expected: Option<String>,
    /// Record kind a reference is expected to point at.
    pub ref_to: Option<String>,
    pub hint: Option<String>,
    pub since_version: Option<u32>,
    /// Inclusive upper version bound.
    pub till_version: Option<u32>,
    /// Vertex-format flag guard.
    pub mask: Option<u32>,
    /// The referenced record holds opaque binary, even if its code says otherwise.
    pub points_to_binary: bool,
    /// The referenced record is the vertex array.
    pub points_to_vertices: bool,
    pub bits: Vec<BitDef>,
}

impl FieldDef {
    /// Whether the field exists at `version` under the optional flag set.
    ///
    /// Mask guards only apply when flags are supplied.
    pub fn applies(&self, version: u32, flags: Option<u32>) -> bool {
        if self.since_version.is_some_and(|since| since > version) {
            return false;
        }
        if self.till_version.is_some_and(|till| till < version) {
            return false;
        }
        match (self.mask, flags) {
            (Some(mask), Some(flags)) => flags & mask == mask,
            _ => true,
        }
    }
}

/// A structure definition: ordered fields plus a per-version size table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDef {
    pub name: String,
    /// Present for names of at most four characters.
    pub tag: Option<TagCode>,
    pub description: String,
    /// Declared item size per version.
    pub versions: BTreeMap<u32, u32>,
    pub fields: Vec<FieldDef>,
}

impl StructDef {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        let name = name.into();
        Self {
            tag: TagCode::from_name(&name),
            name,
            description: String::new(),
            versions: BTreeMap::new(),
            fields,
        }
    }

    /// A structure made of exactly one numeric field acts as a bare value.
    pub fn is_simple(&self) -> bool {
        matches!(
            self.fields.as_slice(),
            [only] if matches!(only.kind, FieldKind::Scalar(ty) if ty.is_numeric())
        )
    }

    /// The value type of a simple structure, or [`FieldType::Struct`].
    pub fn value_type(&self) -> FieldType {
        match self.fields.first() {
            Some(FieldDef {
                kind: FieldKind::Scalar(ty),
                ..
            }) if self.is_simple() => *ty,
            _ => FieldType::Struct,
        }
    }
}

/// All structure definitions, looked up by name or by tag code.
#[derive(Debug, Clone, Default)]
pub struct SchemaRepository {
    by_name: HashMap<String, StructDef>,
    by_tag: HashMap<TagCode, String>,
}

impl SchemaRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a schema document from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_xml(&content)
    }

    /// Parse a schema document.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut repo = Self::new();
        SchemaParser::default().run(xml, &mut repo)?;
        debug!(
            structures = repo.by_name.len(),
            tagged = repo.by_tag.len(),
            "schema loaded"
        );
        Ok(repo)
    }

    /// Add or replace a structure definition.
    pub fn insert(&mut self, def: StructDef) {
        if let Some(tag) = def.tag {
            self.by_tag.insert(tag, def.name.clone());
        }
        if self.by_name.contains_key(&def.name) {
            debug!(name = %def.name, "structure redefined, keeping the later definition");
        }
        self.by_name.insert(def.name.clone(), def);
    }

    pub fn by_name(&self, name: &str) -> Option<&StructDef> {
        self.by_name.get(name)
    }

    pub fn by_tag(&self, tag: TagCode) -> Option<&StructDef> {
        self.by_tag.get(&tag).and_then(|name| self.by_name.get(name))
    }

    /// Number of structures defined.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Iterate over all definitions in no particular order.
    pub fn structs(&self) -> impl Iterator<Item = &StructDef> {
        self.by_name.values()
    }
}

/// Which element's text content is being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    None,
    Description,
    Hint,
}

/// Streaming state while walking the schema document.
struct SchemaParser {
    current: Option<StructDef>,
    field: Option<FieldDef>,
    text: TextTarget,
}

impl Default for SchemaParser {
    fn default() -> Self {
        Self {
            current: None,
            field: None,
            text: TextTarget::None,
        }
    }
}

impl SchemaParser {
    fn run(mut self, xml: &str, repo: &mut SchemaRepository) -> Result<()> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        loop {
            match reader.read_event()? {
                Event::Start(e) => self.start(&e, false, repo)?,
                Event::Empty(e) => self.start(&e, true, repo)?,
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    self.end(&name, repo);
                }
                Event::Text(t) => {
                    let text = t.unescape()?;
                    self.text(text.trim());
                }
                Event::CData(c) => {
                    let text = String::from_utf8_lossy(&c).into_owned();
                    self.text(text.trim());
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(def) = &self.current {
            return Err(SchemaError::Unterminated {
                element: format!("structure name=\"{}\"", def.name),
            });
        }
        Ok(())
    }

    fn start(&mut self, e: &BytesStart<'_>, empty: bool, repo: &mut SchemaRepository) -> Result<()> {
        let element = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        match element.as_str() {
            "structure" => {
                let attrs = Attrs::collect(e)?;
                let name = attrs.required("structure", "name")?;
                self.current = Some(StructDef::new(name, Vec::new()));
                if empty {
                    self.end("structure", repo);
                }
            }
            "description" => self.text = TextTarget::Description,
            "hint" => self.text = TextTarget::Hint,
            "version" => {
                let attrs = Attrs::collect(e)?;
                let def = self.current.as_mut().ok_or_else(|| misplaced("version", "structure"))?;
                let number = attrs.number("number")?.unwrap_or(0);
                let size = attrs.number("size")?.unwrap_or(0);
                def.versions.insert(number, size);
            }
            "field" => {
                if self.current.is_none() {
                    return Err(misplaced("field", "structure"));
                }
                let attrs = Attrs::collect(e)?;
                self.field = Some(attrs.into_field()?);
                if empty {
                    self.end("field", repo);
                }
            }
            "bit" => {
                let attrs = Attrs::collect(e)?;
                let field = self.field.as_mut().ok_or_else(|| misplaced("bit", "field"))?;
                let name = attrs.required("bit", "name")?;
                let mask = attrs.number("mask")?.unwrap_or(0);
                field.bits.push(BitDef { name, mask });
            }
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, element: &str, repo: &mut SchemaRepository) {
        match element {
            "structure" => {
                if let Some(def) = self.current.take() {
                    repo.insert(def);
                }
            }
            "field" => {
                if let (Some(field), Some(def)) = (self.field.take(), self.current.as_mut()) {
                    def.fields.push(field);
                }
            }
            "description" | "hint" => self.text = TextTarget::None,
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.text {
            TextTarget::Description => {
                if let Some(def) = self.current.as_mut() {
                    def.description = text.to_string();
                }
            }
            TextTarget::Hint => {
                if let Some(field) = self.field.as_mut() {
                    match &mut field.hint {
                        Some(hint) => {
                            hint.push('\n');
                            hint.push_str(text);
                        }
                        None => field.hint = Some(text.to_string()),
                    }
                }
            }
            TextTarget::None => {}
        }
    }
}

fn misplaced(element: &str, expected: &str) -> SchemaError {
    SchemaError::Misplaced {
        element: element.into(),
        expected: expected.into(),
    }
}

/// Attributes of one element, unescaped.
struct Attrs(HashMap<String, String>);

impl Attrs {
    fn collect(e: &BytesStart<'_>) -> Result<Self> {
        let mut map = HashMap::new();
        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            map.insert(key, value);
        }
        Ok(Attrs(map))
    }

    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }

    fn required(&self, element: &str, key: &str) -> Result<String> {
        self.get(key).ok_or_else(|| SchemaError::MissingAttribute {
            element: element.into(),
            attribute: key.into(),
        })
    }

    /// Decimal or `0x`-prefixed hexadecimal number.
    fn number(&self, key: &str) -> Result<Option<u32>> {
        let Some(raw) = self.0.get(key) else {
            return Ok(None);
        };
        let trimmed = raw.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => trimmed.parse::<u32>(),
        };
        parsed.map(Some).map_err(|_| SchemaError::InvalidNumber {
            attribute: key.into(),
            value: raw.clone(),
        })
    }

    /// Marker attributes are set unless explicitly `0` or `false`.
    fn flag(&self, key: &str) -> bool {
        self.0
            .get(key)
            .is_some_and(|v| !matches!(v.trim(), "0" | "false" | "no"))
    }

    fn into_field(self) -> Result<FieldDef> {
        let name = self.required("field", "name")?;
        let type_name = self.get("type").unwrap_or_default();
        let size = self.number("size")?;
        let kind = match FieldType::from_name(&type_name) {
            Some(ty) => FieldKind::Scalar(ty),
            // A sized structure is kept opaque instead of being expanded.
            None if size.is_some_and(|s| s > 0) => FieldKind::Scalar(FieldType::Binary),
            None => {
                let (nested, version) = split_versioned_name(&type_name);
                FieldKind::Nested {
                    name: nested.to_string(),
                    version,
                }
            }
        };
        Ok(FieldDef {
            kind,
            size,
            default: self.get("default-value"),
            expected: self.get("expected-value"),
            ref_to: self.get("refTo"),
            hint: None,
            since_version: self.number("since-version")?,
            till_version: self.number("till-version")?,
            mask: self.number("mask")?,
            points_to_binary: self.flag("char-binary"),
            points_to_vertices: self.flag("ref-vertices"),
            bits: Vec::new(),
            name,
            type_name,
        })
    }
}
