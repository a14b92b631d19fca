//! The parsed container: tag arena, reference graph, mutation, and repack.

use std::io::{self, Read, Write};
use std::sync::Arc;

use m3_schema::codec::{align_padding, step_padding, write_u32, PAD_BYTE};
use m3_schema::{
    FieldType, LayoutError, LayoutResolver, RefKind, SchemaRepository, TagLayout,
    VERTEX_FLAGS_FIELD,
};
use tracing::{debug, warn};

use crate::error::{FieldError, FormatError, RefError};
use crate::header::{Header, IndexEntry, Reference, HEADER_SIZE, INDEX_ENTRY_SIZE};
use crate::tag::{IncomingRef, Tag};
use crate::value::FieldValue;

/// One followed reference found while walking the tags.
#[derive(Debug, Clone, Copy)]
struct Edge {
    source: usize,
    item: usize,
    field: usize,
    offset: usize,
    target: usize,
    kind: RefKind,
}

/// A parsed model container.
///
/// Owns every [`Tag`]; tags refer to each other only by index into
/// [`ModelFile::tags`]. Index 0 is the header record.
#[derive(Debug, Clone)]
pub struct ModelFile {
    schema: Arc<SchemaRepository>,
    header: Header,
    /// Offset stored in the header tag's own index entry.
    header_entry_offset: u32,
    tags: Vec<Tag>,
    root: usize,
    vertex_flags: u32,
    vertex_tag: Option<usize>,
    orphans: Vec<usize>,
    /// Bytes following the index table, carried through repacking.
    trailer: Vec<u8>,
}

impl ModelFile {
    /// Parse a container, resolve every tag's layout, and build the
    /// reference graph.
    pub fn parse(data: &[u8], schema: Arc<SchemaRepository>) -> Result<Self, FormatError> {
        let header = Header::from_bytes(data)?;
        let entries = IndexEntry::read_table(data, header.index_offset, header.index_count)?;
        if header.root.index >= header.index_count {
            return Err(FormatError::RootOutOfRange {
                index: header.root.index,
                count: header.index_count,
            });
        }

        let index_start = header.index_offset as usize;
        let index_end = index_start + entries.len() * INDEX_ENTRY_SIZE;
        let resolver = LayoutResolver::new(&schema);
        let mut tags = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            // The header record always starts the file.
            let start = if i == 0 { 0 } else { entry.offset as usize };
            let end = entries
                .get(i + 1)
                .map_or(index_start, |next| next.offset as usize);
            let min_end = if i == 0 { HEADER_SIZE } else { start };
            if end < min_end || end > index_start {
                return Err(FormatError::TagRangeInvalid {
                    index: i,
                    start,
                    end,
                });
            }
            let layout = resolver
                .for_tag(entry.code, entry.version)
                .map_err(|source| FormatError::Layout {
                    index: i,
                    code: entry.code,
                    source,
                })?;
            let tag = Tag::new(i, entry, data[start..end].to_vec(), layout);
            if tag.layout().item_size() > 0 && tag.complete_items() < tag.count() {
                warn!(
                    tag = %tag,
                    count = tag.count(),
                    complete = tag.complete_items(),
                    "tag data is shorter than its item count"
                );
            }
            tags.push(tag);
        }

        let root = header.root.index as usize;
        let vertex_flags = read_vertex_flags(&tags[root]);
        let mut model = Self {
            schema,
            header,
            header_entry_offset: entries[0].offset,
            tags,
            root,
            vertex_flags,
            vertex_tag: None,
            orphans: Vec::new(),
            trailer: data[index_end..].to_vec(),
        };
        model.rebuild_references()?;
        debug!(
            tags = model.tags.len(),
            root = %model.tags[root],
            vertex_flags,
            orphans = model.orphans.len(),
            "container parsed"
        );
        Ok(model)
    }

    /// Read a whole container from `reader` and parse it.
    pub fn read_from<R: Read>(
        reader: &mut R,
        schema: Arc<SchemaRepository>,
    ) -> Result<Self, FormatError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::parse(&data, schema)
    }

    pub fn schema(&self) -> &Arc<SchemaRepository> {
        &self.schema
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn tag(&self, index: usize) -> Option<&Tag> {
        self.tags.get(index)
    }

    /// Mutable access for in-place field writes. Call
    /// [`ModelFile::rebuild_references`] after changing a reference.
    pub fn tag_mut(&mut self, index: usize) -> Option<&mut Tag> {
        self.tags.get_mut(index)
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Index of the root model record.
    pub fn root_index(&self) -> usize {
        self.root
    }

    pub fn root(&self) -> &Tag {
        &self.tags[self.root]
    }

    /// Vertex format flags read from the root record at load time.
    pub fn vertex_flags(&self) -> u32 {
        self.vertex_flags
    }

    /// The tag laid out as the vertex array, once resolved.
    pub fn vertex_tag(&self) -> Option<usize> {
        self.vertex_tag
    }

    /// Tags nothing references, excluding the header and the root record.
    pub fn orphans(&self) -> &[usize] {
        &self.orphans
    }

    /// Recompute incoming references, layout reclassifications, and orphans.
    ///
    /// A binary-payload reference forces its target into the opaque layout;
    /// a vertex reference from the root record lays its target out with the
    /// vertex format. Reclassified tags change which references exist, so
    /// the walk repeats until no layout changes. Running it again without a
    /// mutation in between yields the same result.
    pub fn rebuild_references(&mut self) -> Result<(), LayoutError> {
        let schema = Arc::clone(&self.schema);
        let resolver = LayoutResolver::new(&schema);
        let mut passes = 1;
        let mut edges = self.collect_edges();
        while self.reclassify(&edges, &resolver)? {
            edges = self.collect_edges();
            passes += 1;
        }

        for tag in &mut self.tags {
            tag.incoming.clear();
        }
        self.vertex_tag = None;
        for edge in &edges {
            let target = &mut self.tags[edge.target];
            target.incoming.push(IncomingRef {
                tag: edge.source,
                item: edge.item,
                field: edge.field,
                offset: edge.offset,
            });
            if edge.kind == RefKind::Vertices
                && edge.source == self.root
                && matches!(target.layout(), TagLayout::Vertex { .. })
            {
                self.vertex_tag = Some(edge.target);
            }
        }

        let root = self.root;
        self.orphans = self
            .tags
            .iter()
            .filter(|t| t.index() != 0 && t.index() != root && t.incoming.is_empty())
            .map(Tag::index)
            .collect();
        debug!(
            references = edges.len(),
            passes,
            orphans = self.orphans.len(),
            "references rebuilt"
        );
        Ok(())
    }

    fn collect_edges(&self) -> Vec<Edge> {
        let tag_count = self.tags.len();
        let mut edges = Vec::new();
        // References held by the header record are not part of the graph.
        for tag in self.tags.iter().skip(1) {
            let layout = tag.layout().layout();
            if !layout.has_refs {
                continue;
            }
            for item in 0..tag.complete_items() {
                for (field, f) in layout.fields.iter().enumerate() {
                    if !f.is_outward_reference() {
                        continue;
                    }
                    let Ok(reference) = tag.read_reference(item, field) else {
                        continue;
                    };
                    if reference.is_valid(tag_count) {
                        edges.push(Edge {
                            source: tag.index(),
                            item,
                            field,
                            offset: f.data_offset(layout.item_size, item),
                            target: reference.index as usize,
                            kind: f.ref_kind.unwrap_or(RefKind::Plain),
                        });
                    }
                }
            }
        }
        edges
    }

    /// Apply the layout changes implied by `edges`; returns whether any tag
    /// changed.
    fn reclassify(
        &mut self,
        edges: &[Edge],
        resolver: &LayoutResolver<'_>,
    ) -> Result<bool, LayoutError> {
        let mut changed = false;
        for edge in edges {
            match edge.kind {
                RefKind::Binary => {
                    let target = &mut self.tags[edge.target];
                    if target.forced_binary {
                        continue;
                    }
                    debug!(tag = %target, from = %target.layout().kind(), "reclassified as opaque binary");
                    let name = target.code().to_string();
                    target.replace_layout(TagLayout::opaque_binary(&name));
                    target.forced_binary = true;
                    changed = true;
                }
                RefKind::Vertices if edge.source == self.root => {
                    let flags = self.vertex_flags;
                    let target = &mut self.tags[edge.target];
                    let current = matches!(
                        target.layout(),
                        TagLayout::Vertex { flags: f, .. } if *f == flags
                    );
                    if target.forced_binary || current {
                        continue;
                    }
                    target.replace_layout(resolver.vertex_layout(flags)?);
                    debug!(
                        tag = %target,
                        flags,
                        items = target.count(),
                        "laid out as vertex array"
                    );
                    changed = true;
                }
                _ => {}
            }
        }
        Ok(changed)
    }

    /// Follow the reference in `field` of `item`.
    pub fn reference<'a>(
        &'a self,
        tag: &Tag,
        item: usize,
        field: usize,
    ) -> Result<&'a Tag, RefError> {
        let reference = tag.read_reference(item, field)?;
        if !reference.is_valid(self.header.index_count as usize) {
            return Err(RefError::Invalid {
                tag: tag.to_string(),
                item,
                field: tag.field(field)?.name.clone(),
            });
        }
        self.tags
            .get(reference.index as usize)
            .ok_or(RefError::IndexOutOfBounds {
                index: reference.index,
                count: self.tags.len(),
            })
    }

    /// Follow the reference field named `name`.
    pub fn reference_by_name<'a>(
        &'a self,
        tag: &Tag,
        item: usize,
        name: &str,
    ) -> Result<&'a Tag, RefError> {
        let field = tag.require_field(name)?;
        self.reference(tag, item, field)
    }

    /// Whether the reference in `field` can be followed.
    pub fn is_reference_valid(
        &self,
        tag: &Tag,
        item: usize,
        field: usize,
    ) -> Result<bool, FieldError> {
        let reference = tag.read_reference(item, field)?;
        Ok(reference.is_valid(self.header.index_count as usize))
    }

    /// Replace a string record's content.
    ///
    /// The record is re-encoded as UTF-8 plus a NUL and padded with filler.
    /// If the encoded length changed, the count word of every reference to
    /// this record is updated to the new length.
    pub fn set_string(&mut self, index: usize, value: &str) -> Result<(), FieldError> {
        let not_a_string = |label: String| FieldError::NotAString { tag: label };
        let tag = match self.tags.get_mut(index) {
            Some(tag) if tag.is_string() => tag,
            Some(tag) => return Err(not_a_string(tag.to_string())),
            None => return Err(not_a_string(format!("#{index}"))),
        };

        let mut data = value.as_bytes().to_vec();
        data.push(0);
        let count = u32::try_from(data.len()).map_err(|_| FieldError::ValueOutOfRange {
            field: "string".into(),
            value: format!("{} bytes", data.len()),
        })?;
        data.resize(data.len() + step_padding(data.len()), PAD_BYTE);

        let old = tag.raw_count();
        tag.replace_data(data, count);
        if old == count {
            return Ok(());
        }

        let patches: Vec<(usize, usize)> = tag.incoming.iter().map(|r| (r.tag, r.offset)).collect();
        for (source, offset) in patches {
            let Some(src) = self.tags.get_mut(source) else {
                continue;
            };
            if write_u32(src.data_mut(), offset, count).is_none() {
                warn!(tag = %src, offset, "reference count outside tag data, not updated");
            }
        }
        debug!(tag = index, old, new = count, "string length changed");
        Ok(())
    }

    /// Render a field's value the way an editor shows it.
    ///
    /// Scalars show the decoded value and the stored hex, references show
    /// their words and, when valid, the target (with its text if it is a
    /// string).
    pub fn display_field(&self, tag: &Tag, item: usize, field: usize) -> Result<String, FieldError> {
        let f = tag.field(field)?;
        match f.ty {
            FieldType::Char => tag.string(),
            FieldType::Reference | FieldType::SmallReference => {
                let reference = tag.read_reference(item, field)?;
                let mut out = FieldValue::Reference(reference).to_string();
                if let Ok(target) = self.reference(tag, item, field) {
                    out.push_str(&format!(" -> {target}"));
                    if target.is_string() {
                        out.push_str(&format!(" \"{}\"", target.string()?));
                    }
                }
                Ok(out)
            }
            FieldType::Bit => Ok(format!("0x{:0width$x}", f.bit_mask, width = f.size * 2)),
            FieldType::Binary => tag.binary_hex(item, field),
            FieldType::Struct => Ok(String::new()),
            _ => {
                let value = tag.value(item, field)?;
                let raw = tag.uint(item, field)?;
                Ok(format!("{value} (0x{raw:0width$x})", width = f.size * 2))
            }
        }
    }

    /// Display name of an item: a string record's quoted text, or the text
    /// its `name` reference points at. Empty when neither applies.
    pub fn item_name(&self, tag: &Tag, item: usize) -> String {
        if tag.is_string() {
            return tag.string().map(|s| format!("\"{s}\"")).unwrap_or_default();
        }
        let Some(name_field) = tag.layout().layout().name_field else {
            return String::new();
        };
        match self.reference(tag, item, name_field) {
            Ok(target) if target.is_string() => target
                .string()
                .map(|s| format!("\"{s}\""))
                .unwrap_or_default(),
            Ok(target) => target.to_string(),
            Err(_) => String::new(),
        }
    }

    /// Serialize the current tags into a container.
    ///
    /// The header record keeps its bytes with the index location, tag count
    /// and root index rewritten; every other tag follows in index order on a
    /// 16-byte boundary, then the rebuilt index and any trailing bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut entries = Vec::with_capacity(self.tags.len());
        for tag in &self.tags {
            let offset = if tag.index() == 0 {
                self.header_entry_offset
            } else {
                out.len() as u32
            };
            out.extend_from_slice(tag.data());
            out.resize(out.len() + align_padding(out.len()), PAD_BYTE);
            entries.push(IndexEntry {
                code: tag.code(),
                offset,
                count: tag.raw_count(),
                version: tag.version(),
            });
        }

        let index_offset = out.len() as u32;
        for entry in &entries {
            out.extend_from_slice(&entry.to_bytes());
        }
        out.extend_from_slice(&self.trailer);

        let header = Header {
            magic: self.header.magic,
            index_offset,
            index_count: entries.len() as u32,
            root: Reference {
                index: self.root as u32,
                ..self.header.root
            },
        };
        header.write_into(&mut out);
        debug!(bytes = out.len(), tags = entries.len(), "container repacked");
        out
    }

    /// Serialize into `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }
}

fn read_vertex_flags(root: &Tag) -> u32 {
    let Some(field) = root.field_index(VERTEX_FLAGS_FIELD) else {
        debug!(root = %root, "root record has no vertex flags field");
        return 0;
    };
    match root.uint(0, field) {
        Ok(flags) => flags as u32,
        Err(e) => {
            warn!(root = %root, error = %e, "cannot read vertex flags");
            0
        }
    }
}
