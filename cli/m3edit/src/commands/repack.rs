//! `m3edit repack`: parse and re-serialize, reporting any byte difference.

use std::path::Path;

use anyhow::Result;
use m3_model::ModelFile;

use super::{save, Context};

#[derive(Debug, PartialEq, Eq)]
pub struct RepackReport {
    pub input_bytes: usize,
    pub output_bytes: usize,
    /// Offset of the first differing byte, if any.
    pub first_difference: Option<usize>,
}

impl RepackReport {
    pub fn identical(&self) -> bool {
        self.first_difference.is_none() && self.input_bytes == self.output_bytes
    }
}

pub fn compare(model: &ModelFile, input: &[u8]) -> RepackReport {
    let output = model.to_bytes();
    let first_difference = input
        .iter()
        .zip(&output)
        .position(|(a, b)| a != b)
        .or_else(|| (input.len() != output.len()).then(|| input.len().min(output.len())));
    RepackReport {
        input_bytes: input.len(),
        output_bytes: output.len(),
        first_difference,
    }
}

pub fn run(ctx: &Context, file: &Path, output: &Path) -> Result<()> {
    let (model, input) = ctx.open(file)?;
    let report = compare(&model, &input);
    save(&model, output)?;
    println!(
        "Repacked {} ({} bytes) -> {} ({} bytes)",
        file.display(),
        report.input_bytes,
        output.display(),
        report.output_bytes
    );
    match report.first_difference {
        None => println!("Output is byte-identical"),
        Some(offset) => println!("Output differs from input at offset {offset:#x}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixture;
    use crate::config::OutputFormat;

    #[test]
    fn unmodified_file_is_identical() {
        let bytes = fixture::bytes();
        let ctx = fixture::context(OutputFormat::Text);
        let model = ModelFile::parse(&bytes, ctx.schema).unwrap();
        let report = compare(&model, &bytes);
        assert!(report.identical());
        assert_eq!(report.output_bytes, bytes.len());
    }

    #[test]
    fn reports_first_difference() {
        let mut bytes = fixture::bytes();
        let ctx = fixture::context(OutputFormat::Text);
        let model = ModelFile::parse(&bytes, ctx.schema.clone()).unwrap();
        // Compare against a corrupted copy of the input.
        bytes[100] ^= 0xff;
        let report = compare(&model, &bytes);
        assert!(!report.identical());
        assert_eq!(report.first_difference, Some(100));
    }

    #[test]
    fn run_writes_copy() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture::write(dir.path());
        let out = dir.path().join("copy.m3");
        run(&fixture::context(OutputFormat::Text), &path, &out).unwrap();
        assert_eq!(std::fs::read(out).unwrap(), fixture::bytes());
    }
}
