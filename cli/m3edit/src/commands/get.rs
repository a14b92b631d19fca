//! `m3edit get`: print one field.

use std::path::Path;

use anyhow::Result;
use m3_model::ModelFile;

use super::{lookup_field, lookup_tag, Context};
use crate::config::OutputFormat;

/// Display string of `field` in `item` of tag `tag`.
pub fn display(model: &ModelFile, tag: usize, field: &str, item: usize) -> Result<String> {
    let tag = lookup_tag(model, tag)?;
    let field = lookup_field(tag, field)?;
    Ok(model.display_field(tag, item, field)?)
}

pub fn run(ctx: &Context, file: &Path, tag: usize, field: &str, item: usize) -> Result<()> {
    let (model, _) = ctx.open(file)?;
    match ctx.format {
        OutputFormat::Text => println!("{}", display(&model, tag, field, item)?),
        OutputFormat::Json => {
            let target = lookup_tag(&model, tag)?;
            let index = lookup_field(target, field)?;
            let json = serde_json::json!({
                "tag": target.to_string(),
                "item": item,
                "field": target.field(index)?.name,
                "value": target.value(item, index)?,
                "display": model.display_field(target, item, index)?,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}
