//! `m3edit fields`: every field of one item with its decoded value.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Result};
use m3_model::{ModelFile, Tag};
use serde::Serialize;

use super::{lookup_tag, Context};
use crate::config::OutputFormat;

#[derive(Debug, Serialize)]
pub struct FieldRow {
    pub index: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: &'static str,
    pub offset: usize,
    pub size: usize,
    pub value: String,
    pub info: String,
}

pub fn rows(model: &ModelFile, tag: &Tag, item: usize) -> Result<Vec<FieldRow>> {
    let items = tag.count().max(1);
    if item >= items {
        bail!("item {item} out of range; {tag} has {items} item(s)");
    }
    let mut rows = Vec::with_capacity(tag.fields().len());
    for (index, f) in tag.fields().iter().enumerate() {
        // A truncated item still lists its fields.
        let value = model
            .display_field(tag, item, index)
            .unwrap_or_else(|e| format!("<{e}>"));
        rows.push(FieldRow {
            index,
            name: f.name.clone(),
            type_name: f.ty.display_name(),
            offset: f.offset,
            size: f.size,
            value,
            info: tag.field_info(index)?,
        });
    }
    Ok(rows)
}

pub fn render(tag: &Tag, item: usize, rows: &[FieldRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{tag} item {item}");
    for row in rows {
        let _ = write!(
            out,
            "{:>4}  {:<28} {:<18} {}",
            row.index, row.name, row.type_name, row.value
        );
        if !row.info.is_empty() {
            let _ = write!(out, "  [{}]", row.info);
        }
        out.push('\n');
    }
    out
}

pub fn run(ctx: &Context, file: &Path, tag: usize, item: usize) -> Result<()> {
    let (model, _) = ctx.open(file)?;
    let tag = lookup_tag(&model, tag)?;
    let rows = rows(&model, tag, item)?;
    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => print!("{}", render(tag, item, &rows)),
    }
    Ok(())
}
