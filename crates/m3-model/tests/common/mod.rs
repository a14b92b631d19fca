//! Shared schema and container fixtures.
#![allow(dead_code)]

use std::sync::Arc;

use m3_model::{ContainerBuilder, Reference};
use m3_schema::{SchemaRepository, TagCode};

pub const SCHEMA: &str = r#"
<structures>
  <structure name="VEC3">
    <versions><version number="0" size="12"/></versions>
    <fields>
      <field name="x" type="float"/>
      <field name="y" type="float"/>
      <field name="z" type="float"/>
    </fields>
  </structure>
  <structure name="MODL">
    <description>Model root</description>
    <versions><version number="23" size="64"/></versions>
    <fields>
      <field name="name" type="Reference" refTo="CHAR"/>
      <field name="vFlags" type="uint32">
        <bit name="hasColor" mask="0x200"/>
      </field>
      <field name="vertices" type="Reference" ref-vertices="1"/>
      <field name="bones" type="Reference" refTo="BONE"/>
      <field name="blob" type="Reference" char-binary="1"/>
      <field name="bounds" type="VEC3V0"/>
    </fields>
  </structure>
  <structure name="BONE">
    <versions><version number="1" size="16"/></versions>
    <fields>
      <field name="name" type="Reference" refTo="CHAR"/>
      <field name="parent" type="int16" default-value="-1"/>
      <field name="flags" type="uint16">
        <bit name="hidden" mask="0x1"/>
      </field>
    </fields>
  </structure>
  <structure name="NODE">
    <fields>
      <field name="next" type="Reference"/>
      <field name="value" type="uint32"/>
    </fields>
  </structure>
  <structure name="U8__">
    <fields><field name="value" type="uint8"/></fields>
  </structure>
  <structure name="REAL">
    <fields><field name="value" type="float"/></fields>
  </structure>
  <structure name="VertexFormat">
    <fields>
      <field name="position" type="VEC3"/>
      <field name="normal" type="uint32" mask="0x2"/>
      <field name="color" type="uint32" mask="0x200"/>
    </fields>
  </structure>
</structures>
"#;

pub const MODEL: usize = 1;
pub const MODEL_NAME: usize = 2;
pub const VERTICES: usize = 3;
pub const BONES: usize = 4;
pub const BONE_ROOT_NAME: usize = 5;
pub const BLOB: usize = 6;
pub const BONE_ARM_NAME: usize = 7;
pub const LOOSE_REAL: usize = 8;
pub const LOOSE_STRING: usize = 9;

pub const VERTEX_FLAGS: u32 = 0x200;
pub const VERTEX_BYTES: usize = 64;

pub fn code(name: &str) -> TagCode {
    TagCode::from_name(name).unwrap()
}

pub fn schema() -> Arc<SchemaRepository> {
    Arc::new(SchemaRepository::from_xml(SCHEMA).unwrap())
}

pub fn string_ref(text: &str, index: usize) -> Reference {
    Reference::new(text.len() as u32 + 1, index as u32)
}

pub fn modl(name: Reference, flags: u32, vertices: Reference, bones: Reference, blob: Reference) -> Vec<u8> {
    let mut data = name.to_bytes();
    data.extend_from_slice(&flags.to_le_bytes());
    data.extend(vertices.to_bytes());
    data.extend(bones.to_bytes());
    data.extend(blob.to_bytes());
    for v in [-1.0f32, 0.0, 2.5] {
        data.extend_from_slice(&v.to_le_bytes());
    }
    data
}

pub fn bone(name: Reference, parent: i16, flags: u16) -> Vec<u8> {
    let mut data = name.to_bytes();
    data.extend_from_slice(&parent.to_le_bytes());
    data.extend_from_slice(&flags.to_le_bytes());
    data
}

pub fn node(next: Reference, value: u32) -> Vec<u8> {
    let mut data = next.to_bytes();
    data.extend_from_slice(&value.to_le_bytes());
    data
}

/// A model with a name, vertex data, two bones, a binary payload, and two
/// tags nothing references.
pub fn fixture_builder() -> ContainerBuilder {
    fixture_builder_with_flags(VERTEX_FLAGS)
}

/// The fixture with a different vertex format in the root record.
pub fn fixture_builder_with_flags(vertex_flags: u32) -> ContainerBuilder {
    let mut b = ContainerBuilder::new();
    let root = b.add_tag(
        TagCode::MODEL,
        23,
        1,
        modl(
            string_ref("Marine", MODEL_NAME),
            vertex_flags,
            Reference::new(VERTEX_BYTES as u32, VERTICES as u32),
            Reference::new(2, BONES as u32),
            Reference::new(12, BLOB as u32),
        ),
    );
    b.add_string("Marine");
    b.add_tag(code("U8__"), 0, VERTEX_BYTES as u32, (0..VERTEX_BYTES as u8).collect());

    let mut bones = bone(string_ref("Root", BONE_ROOT_NAME), -1, 0);
    bones.extend(bone(string_ref("Arm", BONE_ARM_NAME), 0, 1));
    b.add_tag(code("BONE"), 1, 2, bones);

    b.add_string("Root");
    b.add_tag(code("CHAR"), 0, 12, b"\x01\x02\x03\x04payload!".to_vec());
    b.add_string("Arm");
    b.add_tag(code("REAL"), 0, 1, 1.5f32.to_le_bytes().to_vec());
    b.add_string("nobody points here");
    b.set_root(root);
    b
}

pub fn fixture() -> Vec<u8> {
    fixture_builder().build()
}
