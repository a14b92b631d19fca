//! `m3edit info`: one-screen summary of a model file.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use m3_model::ModelFile;
use m3_schema::TagCode;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::Context;
use crate::config::OutputFormat;

#[derive(Debug, Serialize)]
pub struct Summary {
    pub file: String,
    pub magic: TagCode,
    pub bytes: usize,
    pub tags: usize,
    pub root: String,
    pub vertex_flags: u32,
    pub vertex_tag: Option<String>,
    pub orphans: usize,
    pub sha256: String,
}

pub fn summarize(file: &Path, model: &ModelFile, bytes: &[u8]) -> Summary {
    Summary {
        file: file.display().to_string(),
        magic: model.header().magic,
        bytes: bytes.len(),
        tags: model.tag_count(),
        root: model.root().to_string(),
        vertex_flags: model.vertex_flags(),
        vertex_tag: model
            .vertex_tag()
            .and_then(|i| model.tag(i))
            .map(|t| t.to_string()),
        orphans: model.orphans().len(),
        sha256: sha256_hex(bytes),
    }
}

pub fn render(summary: &Summary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "File:         {}", summary.file);
    let _ = writeln!(out, "Magic:        {}", summary.magic);
    let _ = writeln!(out, "Size:         {} bytes", summary.bytes);
    let _ = writeln!(out, "Tags:         {}", summary.tags);
    let _ = writeln!(out, "Root:         {}", summary.root);
    let _ = writeln!(out, "Vertex flags: 0x{:08x}", summary.vertex_flags);
    let _ = writeln!(
        out,
        "Vertex tag:   {}",
        summary.vertex_tag.as_deref().unwrap_or("none")
    );
    let _ = writeln!(out, "Orphans:      {}", summary.orphans);
    let _ = writeln!(out, "SHA-256:      {}", summary.sha256);
    out
}

pub fn run(ctx: &Context, file: &Path) -> Result<()> {
    let (model, bytes) = ctx.open(file)?;
    let summary = summarize(file, &model, &bytes);
    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print!("{}", render(&summary)),
    }
    Ok(())
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
