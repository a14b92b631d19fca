//! Hierarchical view of the reference graph, rooted at the model record.
//!
//! The view has two top-level nodes: `model`, expanding the root record's
//! items and every valid reference they hold, and `orphan tags`, listing
//! each tag nothing references. A tag already shown elsewhere is added again
//! as a duplicate and not expanded. Tags with more than [`GROUP_SIZE`] items
//! get their items grouped.
//!
//! The graph may contain cycles; a visited set stops re-expansion and a depth
//! bound marks any branch deeper than [`MAX_TREE_DEPTH`] as truncated.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::Serialize;

use crate::model::ModelFile;
use crate::tag::Tag;

/// Items per group when a tag has many items.
pub const GROUP_SIZE: usize = 20;

/// Deepest tag nesting expanded below a top-level node.
pub const MAX_TREE_DEPTH: usize = 64;

/// Index of the `model` node.
pub const MODEL_NODE: usize = 0;

/// Index of the `orphan tags` node.
pub const ORPHAN_NODE: usize = 1;

/// What a tree node stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum NodeKind {
    /// One of the two top-level nodes.
    Section,
    Tag {
        tag: usize,
        /// Already shown elsewhere; not expanded here.
        duplicate: bool,
        /// Not expanded because the depth bound was hit.
        truncated: bool,
    },
    Item { tag: usize, item: usize },
    /// Inclusive item range.
    Group { start: usize, end: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub label: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

/// A flattened tree; nodes refer to each other by index.
#[derive(Debug, Clone, Serialize)]
pub struct TagTree {
    nodes: Vec<TreeNode>,
}

impl TagTree {
    /// Build the view over `model`'s current reference graph.
    pub fn build(model: &ModelFile) -> Self {
        let mut builder = TreeBuilder {
            model,
            nodes: Vec::new(),
            seen: HashSet::new(),
        };
        builder.push(None, NodeKind::Section, "model".into());
        builder.push(
            None,
            NodeKind::Section,
            "orphan tags (not referenced from others)".into(),
        );

        let root = model.root();
        builder.seen.insert(root.index());
        builder.expand(MODEL_NODE, root, 0);

        for &orphan in model.orphans() {
            if let Some(tag) = model.tag(orphan) {
                if !builder.seen.contains(&orphan) {
                    builder.add_tag(ORPHAN_NODE, tag, "", 0);
                }
            }
        }
        Self {
            nodes: builder.nodes,
        }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    /// Child node index at `row` under `parent`.
    pub fn child(&self, parent: usize, row: usize) -> Option<usize> {
        self.nodes.get(parent)?.children.get(row).copied()
    }

    /// Indented text rendering, two spaces per level.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for top in [MODEL_NODE, ORPHAN_NODE] {
            self.render_node(top, 0, &mut out);
        }
        out
    }

    fn render_node(&self, index: usize, depth: usize, out: &mut String) {
        let node = &self.nodes[index];
        let marker = match node.kind {
            NodeKind::Tag {
                duplicate: true, ..
            } => " (duplicate)",
            NodeKind::Tag {
                truncated: true, ..
            } => " (truncated)",
            _ => "",
        };
        let _ = writeln!(out, "{:indent$}{}{marker}", "", node.label, indent = depth * 2);
        for &child in &node.children {
            self.render_node(child, depth + 1, out);
        }
    }
}

struct TreeBuilder<'a> {
    model: &'a ModelFile,
    nodes: Vec<TreeNode>,
    seen: HashSet<usize>,
}

impl TreeBuilder<'_> {
    fn push(&mut self, parent: Option<usize>, kind: NodeKind, label: String) -> usize {
        let index = self.nodes.len();
        if let Some(parent) = parent {
            self.nodes[parent].children.push(index);
        }
        self.nodes.push(TreeNode {
            kind,
            label,
            parent,
            children: Vec::new(),
        });
        index
    }

    fn add_tag(&mut self, parent: usize, tag: &Tag, prefix: &str, depth: usize) {
        let duplicate = !self.seen.insert(tag.index());
        let truncated = !duplicate && depth >= MAX_TREE_DEPTH;
        let label = if tag.is_string() {
            format!("{prefix}{tag} {}", self.model.item_name(tag, 0))
        } else {
            format!("{prefix}{tag} ({})", tag.count())
        };
        let node = self.push(
            Some(parent),
            NodeKind::Tag {
                tag: tag.index(),
                duplicate,
                truncated,
            },
            label,
        );
        if !duplicate && !truncated {
            self.expand(node, tag, depth);
        }
    }

    fn expand(&mut self, node: usize, tag: &Tag, depth: usize) {
        // Single-field tags are shown as values, not structures.
        if tag.layout().layout().is_single_field() {
            return;
        }
        let count = tag.count();
        if count <= GROUP_SIZE {
            self.add_items(node, tag, 0..count, depth);
            return;
        }
        for start in (0..count).step_by(GROUP_SIZE) {
            let end = (start + GROUP_SIZE).min(count) - 1;
            let parent = if start == end {
                node
            } else {
                self.push(
                    Some(node),
                    NodeKind::Group { start, end },
                    format!("[{start:02}-{end:02}]"),
                )
            };
            self.add_items(parent, tag, start..end + 1, depth);
        }
    }

    fn add_items(&mut self, parent: usize, tag: &Tag, items: std::ops::Range<usize>, depth: usize) {
        let model = self.model;
        for item in items {
            let item_node = self.push(
                Some(parent),
                NodeKind::Item {
                    tag: tag.index(),
                    item,
                },
                format!("{}[{item}]", tag.code()),
            );
            for (field, f) in tag.fields().iter().enumerate() {
                if !f.is_outward_reference() {
                    continue;
                }
                if let Ok(target) = model.reference(tag, item, field) {
                    let prefix = format!("{}->", f.name);
                    self.add_tag(item_node, target, &prefix, depth + 1);
                }
            }
        }
    }
}
