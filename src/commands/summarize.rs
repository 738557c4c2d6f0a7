use std::fs;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use crate::cli::SummarizeArgs;
use crate::error::GateError;
use crate::history::{parse_samples, summarize};
use crate::util::write_json_pretty;

pub fn run(args: SummarizeArgs) -> Result<()> {
    if !args.input.is_file() {
        return Err(GateError::Config(format!(
            "sample table does not exist: {}",
            args.input.display()
        ))
        .into());
    }

    let raw = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let rows: Vec<Value> = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;
    let samples = parse_samples(&rows, &args.category_field)
        .with_context(|| format!("invalid sample table {}", args.input.display()))?;

    let summary = summarize(&samples);
    write_json_pretty(&args.output, &summary)?;
    info!(
        path = %args.output.display(),
        rows = samples.len(),
        components = summary.components.len(),
        categories = summary.categories.len(),
        "wrote sample summary"
    );

    Ok(())
}
