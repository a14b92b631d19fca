//! `m3edit orphans`: tags no other tag references.

use std::path::Path;

use anyhow::Result;
use m3_model::ModelFile;
use serde::Serialize;

use super::Context;
use crate::config::OutputFormat;

#[derive(Debug, Serialize)]
pub struct Orphan {
    pub index: usize,
    pub label: String,
    pub count: usize,
    pub bytes: usize,
}

pub fn list(model: &ModelFile) -> Vec<Orphan> {
    model
        .orphans()
        .iter()
        .filter_map(|&i| model.tag(i))
        .map(|tag| Orphan {
            index: tag.index(),
            label: if tag.is_string() {
                format!("{tag} {}", model.item_name(tag, 0))
            } else {
                tag.to_string()
            },
            count: tag.count(),
            bytes: tag.data().len(),
        })
        .collect()
}

pub fn run(ctx: &Context, file: &Path) -> Result<()> {
    let (model, _) = ctx.open(file)?;
    let orphans = list(&model);
    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&orphans)?),
        OutputFormat::Text if orphans.is_empty() => println!("No orphan tags"),
        OutputFormat::Text => {
            for orphan in &orphans {
                println!(
                    "{:>5}  {}  ({} items, {} bytes)",
                    orphan.index, orphan.label, orphan.count, orphan.bytes
                );
            }
        }
    }
    Ok(())
}
