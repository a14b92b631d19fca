//! The model/orphan tree view.

mod common;

use common::*;
use m3_model::tree::{NodeKind, MODEL_NODE, ORPHAN_NODE};
use m3_model::{ContainerBuilder, ModelFile, Reference, TagTree};

fn node_chain(len: usize, items: u32) -> ModelFile {
    let mut b = ContainerBuilder::new();
    for i in 1..=len {
        let next = if i < len { i + 1 } else { 0 };
        let mut data = Vec::new();
        for item in 0..items {
            let target = if item == 0 { next } else { 0 };
            data.extend(node(Reference::new(u32::from(target != 0), target as u32), item));
        }
        b.add_tag(code("NODE"), 0, items, data);
    }
    b.set_root(1);
    ModelFile::parse(&b.build(), schema()).unwrap()
}

#[test]
fn fixture_tree() {
    let model = ModelFile::parse(&fixture(), schema()).unwrap();
    let tree = TagTree::build(&model);
    let expected = "\
model
  MODL[0]
    name->CHAR#2 \"Marine\"
    vertices->U8__#3 (4)
      U8__[0]
      U8__[1]
      U8__[2]
      U8__[3]
    bones->BONE#4 (2)
      BONE[0]
        name->CHAR#5 \"Root\"
      BONE[1]
        name->CHAR#7 \"Arm\"
    blob->CHAR#6 (12)
orphan tags (not referenced from others)
  REAL#8 (1)
  CHAR#9 \"nobody points here\"
";
    assert_eq!(tree.render(), expected);
}

#[test]
fn navigation_by_row() {
    let model = ModelFile::parse(&fixture(), schema()).unwrap();
    let tree = TagTree::build(&model);

    let item = tree.child(MODEL_NODE, 0).unwrap();
    assert_eq!(tree.node(item).unwrap().kind, NodeKind::Item { tag: MODEL, item: 0 });
    let bones = tree.child(item, 2).unwrap();
    let node = tree.node(bones).unwrap();
    assert_eq!(
        node.kind,
        NodeKind::Tag {
            tag: BONES,
            duplicate: false,
            truncated: false
        }
    );
    assert_eq!(node.parent, Some(item));
    assert_eq!(node.children.len(), 2);
    assert!(tree.child(item, 4).is_none());

    let orphan = tree.child(ORPHAN_NODE, 1).unwrap();
    assert_eq!(tree.node(orphan).unwrap().label, "CHAR#9 \"nobody points here\"");
    assert!(tree.node(ORPHAN_NODE).unwrap().parent.is_none());
}

#[test]
fn cycles_are_shown_once() {
    let mut b = ContainerBuilder::new();
    b.add_tag(code("NODE"), 0, 1, node(Reference::new(1, 2), 1));
    b.add_tag(code("NODE"), 0, 1, node(Reference::new(1, 1), 2));
    b.set_root(1);
    let model = ModelFile::parse(&b.build(), schema()).unwrap();

    let rendered = TagTree::build(&model).render();
    assert_eq!(
        rendered,
        "\
model
  NODE[0]
    next->NODE#2 (1)
      NODE[0]
        next->NODE#1 (1) (duplicate)
orphan tags (not referenced from others)
"
    );
}

#[test]
fn self_reference_is_a_duplicate() {
    let mut b = ContainerBuilder::new();
    b.add_tag(code("NODE"), 0, 1, node(Reference::new(1, 1), 7));
    b.set_root(1);
    let model = ModelFile::parse(&b.build(), schema()).unwrap();
    let tree = TagTree::build(&model);
    let dup = tree.nodes().iter().find(|n| matches!(n.kind, NodeKind::Tag { duplicate: true, .. }));
    assert_eq!(dup.unwrap().label, "next->NODE#1 (1)");
}

#[test]
fn deep_chains_are_truncated() {
    let model = node_chain(70, 1);
    let tree = TagTree::build(&model);
    let truncated: Vec<usize> = tree
        .nodes()
        .iter()
        .filter_map(|n| match n.kind {
            NodeKind::Tag {
                tag,
                truncated: true,
                ..
            } => Some(tag),
            _ => None,
        })
        .collect();
    assert_eq!(truncated, vec![65]);
    assert!(tree.render().contains("next->NODE#65 (1) (truncated)"));
    assert!(!tree.render().contains("NODE#66"));
}

#[test]
fn many_items_are_grouped() {
    let model = node_chain(1, 45);
    let tree = TagTree::build(&model);
    let groups: Vec<&str> = tree
        .node(MODEL_NODE)
        .unwrap()
        .children
        .iter()
        .map(|&c| tree.node(c).unwrap().label.as_str())
        .collect();
    assert_eq!(groups, ["[00-19]", "[20-39]", "[40-44]"]);

    let last = tree.child(MODEL_NODE, 2).unwrap();
    assert_eq!(tree.node(last).unwrap().kind, NodeKind::Group { start: 40, end: 44 });
    assert_eq!(tree.node(last).unwrap().children.len(), 5);
    let first_item = tree.child(last, 0).unwrap();
    assert_eq!(tree.node(first_item).unwrap().label, "NODE[40]");
}

#[test]
fn single_trailing_item_is_not_grouped() {
    let model = node_chain(1, 41);
    let tree = TagTree::build(&model);
    let labels: Vec<&str> = tree
        .node(MODEL_NODE)
        .unwrap()
        .children
        .iter()
        .map(|&c| tree.node(c).unwrap().label.as_str())
        .collect();
    assert_eq!(labels, ["[00-19]", "[20-39]", "NODE[40]"]);
}

#[test]
fn tree_serializes() {
    let model = ModelFile::parse(&fixture(), schema()).unwrap();
    let tree = TagTree::build(&model);
    let json = serde_json::to_value(&tree).unwrap();
    let nodes = json["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), tree.nodes().len());
    assert_eq!(nodes[0]["kind"]["kind"], "section");
    assert_eq!(nodes[0]["label"], "model");
}
