//! `m3edit set`: write one field, rebuild references, and save.

use std::path::Path;

use anyhow::{Context as _, Result};
use m3_model::ModelFile;
use tracing::info;

use super::{get, lookup_field, lookup_tag, save, Context};

/// Apply one edit; returns the field's new display string.
///
/// String records take their new text through the `string` field; every
/// other field parses `value` according to its type.
pub fn apply(
    model: &mut ModelFile,
    tag: usize,
    field: &str,
    value: &str,
    item: usize,
) -> Result<String> {
    let target = lookup_tag(model, tag)?;
    let index = lookup_field(target, field)?;
    if target.is_string() {
        model.set_string(tag, value)?;
    } else {
        model
            .tag_mut(tag)
            .with_context(|| format!("no tag #{tag}"))?
            .set_text(item, index, value)?;
    }
    model.rebuild_references()?;
    get::display(model, tag, field, item)
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    ctx: &Context,
    file: &Path,
    tag: usize,
    field: &str,
    value: &str,
    item: usize,
    output: &Path,
) -> Result<()> {
    let (mut model, _) = ctx.open(file)?;
    let shown = apply(&mut model, tag, field, value, item)?;
    let written = save(&model, output)?;
    info!(tag, field, item, bytes = written, "field updated");
    println!("{} {field}[{item}] = {shown}", lookup_tag(&model, tag)?);
    println!("Wrote {written} bytes to {}", output.display());
    Ok(())
}
