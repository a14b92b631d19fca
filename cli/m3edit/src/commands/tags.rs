//! `m3edit tags`: the index table with resolved layouts.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use m3_model::ModelFile;
use m3_schema::{LayoutKind, TagCode};
use serde::Serialize;

use super::Context;
use crate::config::OutputFormat;

#[derive(Debug, Serialize)]
pub struct TagRow {
    pub index: usize,
    pub code: TagCode,
    pub version: u32,
    pub count: usize,
    pub raw_count: u32,
    pub layout: LayoutKind,
    pub incoming: usize,
    pub name: String,
}

pub fn rows(model: &ModelFile) -> Vec<TagRow> {
    model
        .tags()
        .iter()
        .map(|tag| TagRow {
            index: tag.index(),
            code: tag.code(),
            version: tag.version(),
            count: tag.count(),
            raw_count: tag.raw_count(),
            layout: tag.layout().kind(),
            incoming: tag.incoming().len(),
            name: if tag.count() > 0 {
                model.item_name(tag, 0)
            } else {
                String::new()
            },
        })
        .collect()
}

pub fn render(rows: &[TagRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5}  {:<4}  {:>3}  {:>7}  {:<13}  {:>4}  NAME",
        "INDEX", "CODE", "VER", "COUNT", "LAYOUT", "REFS"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:>5}  {:<4}  {:>3}  {:>7}  {:<13}  {:>4}  {}",
            row.index,
            row.code.to_string(),
            row.version,
            row.count,
            row.layout.to_string(),
            row.incoming,
            row.name
        );
    }
    out
}

pub fn run(ctx: &Context, file: &Path) -> Result<()> {
    let (model, _) = ctx.open(file)?;
    let rows = rows(&model);
    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => print!("{}", render(&rows)),
    }
    Ok(())
}
