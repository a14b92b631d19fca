//! `m3edit tree`: the reference tree rooted at the model record.

use std::path::Path;

use anyhow::Result;
use m3_model::TagTree;

use super::Context;
use crate::config::OutputFormat;

pub fn run(ctx: &Context, file: &Path) -> Result<()> {
    let (model, _) = ctx.open(file)?;
    let tree = TagTree::build(&model);
    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tree)?),
        OutputFormat::Text => print!("{}", tree.render()),
    }
    Ok(())
}
