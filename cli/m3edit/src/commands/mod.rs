//! CLI command implementations.

pub mod fields;
pub mod get;
pub mod info;
pub mod orphans;
pub mod repack;
pub mod set;
pub mod tags;
pub mod tree;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use m3_model::{ModelFile, Tag};
use m3_schema::SchemaRepository;
use tracing::debug;

use crate::config::{OutputFormat, Settings};

/// State shared by every command: the loaded schema and output format.
pub struct Context {
    pub schema: Arc<SchemaRepository>,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(settings: &Settings) -> Result<Self> {
        let schema = SchemaRepository::load(&settings.schema)
            .with_context(|| format!("loading schema {}", settings.schema.display()))?;
        debug!(structures = schema.len(), path = %settings.schema.display(), "schema loaded");
        Ok(Self {
            schema: Arc::new(schema),
            format: settings.format,
        })
    }

    /// Read and parse a model file; also returns the raw bytes.
    pub fn open(&self, path: &Path) -> Result<(ModelFile, Vec<u8>)> {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let model = ModelFile::parse(&bytes, Arc::clone(&self.schema))
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok((model, bytes))
    }
}

/// Serialize `model` to `path`; returns the written size.
pub fn save(model: &ModelFile, path: &Path) -> Result<usize> {
    let bytes = model.to_bytes();
    fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
    Ok(bytes.len())
}

pub fn lookup_tag(model: &ModelFile, index: usize) -> Result<&Tag> {
    model
        .tag(index)
        .with_context(|| format!("no tag #{index}; the file has {} tags", model.tag_count()))
}

/// Resolve a field given by name or by index.
pub fn lookup_field(tag: &Tag, field: &str) -> Result<usize> {
    if let Ok(index) = field.parse::<usize>() {
        tag.field(index)?;
        return Ok(index);
    }
    Ok(tag.require_field(field)?)
}

#[cfg(test)]
pub(crate) mod fixture {
    //! A small model written to a temporary directory.

    use std::path::PathBuf;
    use std::sync::Arc;

    use m3_model::{ContainerBuilder, Reference};
    use m3_schema::{SchemaRepository, TagCode};

    use super::Context;
    use crate::config::OutputFormat;

    pub const SCHEMA: &str = r#"
<structures>
  <structure name="MODL">
    <versions><version number="2" size="32"/></versions>
    <fields>
      <field name="name" type="Reference" refTo="CHAR"/>
      <field name="vFlags" type="uint32">
        <bit name="hasTangents" mask="0x4"/>
      </field>
      <field name="bones" type="Reference" refTo="BONE"/>
      <field name="scale" type="fixed16"/>
      <field name="alpha" type="fixed8"/>
      <field name="pad" type="uint8"/>
    </fields>
  </structure>
  <structure name="BONE">
    <versions><version number="0" size="16"/></versions>
    <fields>
      <field name="name" type="Reference" refTo="CHAR"/>
      <field name="parent" type="int16"/>
      <field name="flags" type="uint16"/>
    </fields>
  </structure>
  <structure name="REAL">
    <fields><field name="value" type="float"/></fields>
  </structure>
</structures>
"#;

    pub const ROOT: usize = 1;
    pub const ROOT_NAME: usize = 2;
    pub const BONES: usize = 3;
    pub const BONE_NAME: usize = 4;
    pub const LOOSE_REAL: usize = 5;

    pub fn context(format: OutputFormat) -> Context {
        Context {
            schema: Arc::new(SchemaRepository::from_xml(SCHEMA).unwrap()),
            format,
        }
    }

    pub fn bytes() -> Vec<u8> {
        let mut b = ContainerBuilder::new();
        let mut modl = Reference::new(6, ROOT_NAME as u32).to_bytes();
        modl.extend_from_slice(&0x4u32.to_le_bytes());
        modl.extend(Reference::new(1, BONES as u32).to_bytes());
        modl.extend_from_slice(&2048u16.to_le_bytes());
        modl.extend_from_slice(&[255, 0]);
        let root = b.add_tag(TagCode::MODEL, 2, 1, modl);
        b.add_string("Ghost");

        let mut bone = Reference::new(5, BONE_NAME as u32).to_bytes();
        bone.extend_from_slice(&(-1i16).to_le_bytes());
        bone.extend_from_slice(&0u16.to_le_bytes());
        b.add_tag(TagCode::from_name("BONE").unwrap(), 0, 1, bone);
        b.add_string("Head");
        b.add_tag(TagCode::from_name("REAL").unwrap(), 0, 1, 0.5f32.to_le_bytes().to_vec());
        b.set_root(root);
        b.build()
    }

    /// Write the fixture into `dir`; returns its path.
    pub fn write(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("ghost.m3");
        std::fs::write(&path, bytes()).unwrap();
        path
    }
}
