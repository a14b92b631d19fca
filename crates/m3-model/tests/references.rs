//! Reference resolution, layout reclassification, and orphan detection.

mod common;

use common::*;
use m3_model::{ContainerBuilder, FieldError, IncomingRef, ModelFile, RefError, Reference};
use m3_schema::{LayoutKind, TagCode, TagLayout};

fn parse() -> ModelFile {
    ModelFile::parse(&fixture(), schema()).unwrap()
}

type Snapshot = (Vec<Vec<IncomingRef>>, Vec<usize>, Vec<LayoutKind>, Vec<usize>);

fn snapshot(model: &ModelFile) -> Snapshot {
    (
        model.tags().iter().map(|t| t.incoming().to_vec()).collect(),
        model.orphans().to_vec(),
        model.tags().iter().map(|t| t.layout().kind()).collect(),
        model.tags().iter().map(|t| t.count()).collect(),
    )
}

#[test]
fn incoming_references_recorded() {
    let model = parse();
    let name_field = model.root().require_field("name").unwrap();
    assert_eq!(
        model.tag(MODEL_NAME).unwrap().incoming(),
        &[IncomingRef {
            tag: MODEL,
            item: 0,
            field: name_field,
            offset: 0,
        }]
    );
    assert_eq!(
        model.tag(BONE_ARM_NAME).unwrap().incoming(),
        &[IncomingRef {
            tag: BONES,
            item: 1,
            field: 0,
            offset: 16,
        }]
    );
    assert_eq!(model.tag(BONES).unwrap().incoming().len(), 1);
    assert!(model.tag(0).unwrap().incoming().is_empty());
}

#[test]
fn orphans_exclude_header_and_root() {
    let model = parse();
    assert_eq!(model.orphans(), &[LOOSE_REAL, LOOSE_STRING]);
    assert!(model.root().incoming().is_empty());
}

#[test]
fn rebuild_is_idempotent() {
    let mut model = parse();
    let first = snapshot(&model);
    model.rebuild_references().unwrap();
    let second = snapshot(&model);
    model.rebuild_references().unwrap();
    assert_eq!(first, second);
    assert_eq!(second, snapshot(&model));
}

#[test]
fn vertex_array_specialized_from_root_flags() {
    let model = parse();
    assert_eq!(model.vertex_flags(), VERTEX_FLAGS);
    assert_eq!(model.vertex_tag(), Some(VERTICES));

    let tag = model.tag(VERTICES).unwrap();
    assert!(matches!(tag.layout(), TagLayout::Vertex { flags: 0x200, .. }));
    assert_eq!(tag.layout().item_size(), 16);
    assert_eq!(tag.count(), VERTEX_BYTES / 16);
    assert_eq!(tag.raw_count(), VERTEX_BYTES as u32);
    assert!(tag.field_index("normal").is_none());

    let color = tag.require_field("color").unwrap();
    assert_eq!(
        tag.get::<u32>(1, color).unwrap(),
        u32::from_le_bytes([28, 29, 30, 31])
    );
}

#[test]
fn vertex_layout_follows_flag_mask() {
    let model = ModelFile::parse(&fixture_builder_with_flags(0).build(), schema()).unwrap();
    let tag = model.tag(VERTICES).unwrap();
    assert_eq!(tag.layout().item_size(), 12);
    assert_eq!(tag.count(), VERTEX_BYTES / 12);
    assert!(tag.field_index("color").is_none());

    let model = ModelFile::parse(&fixture_builder_with_flags(0x202).build(), schema()).unwrap();
    let tag = model.tag(VERTICES).unwrap();
    assert_eq!(tag.layout().item_size(), 20);
    assert_eq!(tag.count(), 3);
}

#[test]
fn binary_payload_forced_opaque() {
    let model = parse();
    let blob = model.tag(BLOB).unwrap();
    assert_eq!(blob.code(), TagCode::CHAR);
    assert_eq!(blob.layout().kind(), LayoutKind::OpaqueBinary);
    assert!(!blob.is_string());
    assert!(matches!(blob.string(), Err(FieldError::NotAString { .. })));
    assert_eq!(blob.raw_count(), 12);
    assert_eq!(&blob.binary(0, 0).unwrap()[..12], b"\x01\x02\x03\x04payload!");
}

#[test]
fn reclassified_tag_drops_its_references() {
    let mut b = ContainerBuilder::new();
    let none = Reference::new(0, 0);
    let root = b.add_tag(TagCode::MODEL, 23, 1, modl(none, 0, none, none, Reference::new(1, 2)));
    b.add_tag(code("BONE"), 1, 1, bone(string_ref("Root", 3), -1, 0));
    b.add_string("Root");
    b.set_root(root);

    let mut model = ModelFile::parse(&b.build(), schema()).unwrap();
    assert_eq!(model.tag(2).unwrap().layout().kind(), LayoutKind::OpaqueBinary);
    assert!(model.tag(3).unwrap().incoming().is_empty());
    assert_eq!(model.orphans(), &[3]);

    let before = snapshot(&model);
    model.rebuild_references().unwrap();
    assert_eq!(before, snapshot(&model));
}

#[test]
fn null_reference_is_invalid() {
    let mut model = parse();
    model.tag_mut(BONES).unwrap().set_text(0, 0, "0,5").unwrap();

    let bones = model.tag(BONES).unwrap();
    assert_eq!(bones.read_reference(0, 0).unwrap(), Reference::new(0, 5));
    assert!(!model.is_reference_valid(bones, 0, 0).unwrap());
    assert!(matches!(
        model.reference(bones, 0, 0),
        Err(RefError::Invalid { item: 0, .. })
    ));

    model.rebuild_references().unwrap();
    assert_eq!(model.orphans(), &[BONE_ROOT_NAME, LOOSE_REAL, LOOSE_STRING]);
}

#[test]
fn out_of_table_indices_are_invalid() {
    let mut model = parse();
    let tags = model.tag_count();
    for text in [format!("4,{tags}"), "4,0".to_string()] {
        model.tag_mut(BONES).unwrap().set_text(1, 0, &text).unwrap();
        let bones = model.tag(BONES).unwrap();
        assert!(matches!(
            model.reference(bones, 1, 0),
            Err(RefError::Invalid { .. })
        ));
    }
}

#[test]
fn reference_lookup_by_name() {
    let model = parse();
    let root = model.root();
    let bones = model.reference_by_name(root, 0, "bones").unwrap();
    assert_eq!(bones.index(), BONES);
    let arm = model.reference_by_name(bones, 1, "name").unwrap();
    assert_eq!(arm.string().unwrap(), "Arm");

    assert!(matches!(
        model.reference_by_name(root, 0, "vFlags"),
        Err(RefError::Field(FieldError::NotAReference { .. }))
    ));
    assert!(matches!(
        model.reference_by_name(root, 0, "missing"),
        Err(RefError::Field(FieldError::UnknownField { .. }))
    ));
    assert!(matches!(
        model.reference(root, 0, 999),
        Err(RefError::Field(FieldError::NotPartOfLayout { field: 999, .. }))
    ));
}

#[test]
fn retargeted_reference_moves_orphan_status() {
    let mut model = parse();
    let name = model.root().require_field("name").unwrap();
    model
        .tag_mut(MODEL)
        .unwrap()
        .set_text(0, name, &format!("19,{LOOSE_STRING}"))
        .unwrap();
    model.rebuild_references().unwrap();
    assert_eq!(model.orphans(), &[MODEL_NAME, LOOSE_REAL]);
    assert_eq!(
        model.reference_by_name(model.root(), 0, "name").unwrap().string().unwrap(),
        "nobody points here"
    );
}

#[test]
fn display_strings() {
    let model = parse();
    let root = model.root();
    let show = |field: &str| {
        let index = root.require_field(field).unwrap();
        model.display_field(root, 0, index).unwrap()
    };
    assert_eq!(show("name"), "idx=2, cnt=7, flag=0 -> CHAR#2 \"Marine\"");
    assert_eq!(show("vFlags"), "512 (0x00000200)");
    assert_eq!(show("vFlags.hasColor"), "0x00000200");
    assert_eq!(show("bounds.z"), "2.5 (0x40200000)");
    assert_eq!(show("bounds"), "");

    let bones = model.tag(BONES).unwrap();
    let parent = bones.require_field("parent").unwrap();
    assert_eq!(model.display_field(bones, 0, parent).unwrap(), "-1 (0xffff)");

    let blob = model.tag(BLOB).unwrap();
    assert_eq!(
        model.display_field(blob, 0, 0).unwrap(),
        "01 02 03 04  70 61 79 6c  6f 61 64 21  aa aa aa aa"
    );
}

#[test]
fn item_names() {
    let model = parse();
    let bones = model.tag(BONES).unwrap();
    assert_eq!(model.item_name(bones, 1), "\"Arm\"");
    assert_eq!(model.item_name(model.root(), 0), "\"Marine\"");
    assert_eq!(model.item_name(model.tag(MODEL_NAME).unwrap(), 0), "\"Marine\"");
    assert_eq!(model.item_name(model.tag(LOOSE_REAL).unwrap(), 0), "");
}

#[test]
fn cyclic_references_resolve() {
    let mut b = ContainerBuilder::new();
    let first = b.add_tag(code("NODE"), 0, 1, node(Reference::new(1, 2), 1));
    b.add_tag(code("NODE"), 0, 1, node(Reference::new(1, 1), 2));
    b.set_root(first);

    let model = ModelFile::parse(&b.build(), schema()).unwrap();
    assert!(model.orphans().is_empty());
    assert_eq!(model.tag(1).unwrap().incoming()[0].tag, 2);
    assert_eq!(model.tag(2).unwrap().incoming()[0].tag, 1);
    assert_eq!(model.vertex_flags(), 0);
    assert_eq!(model.vertex_tag(), None);
}
