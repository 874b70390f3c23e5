//! Output bundle rendering.
//!
//! This module serializes aggregated bundles for downstream consumers,
//! either as one pretty JSON array or as JSON lines.

use crate::models::OutputBundle;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Output format for rendered bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON array (default)
    #[default]
    Json,
    /// One compact JSON bundle per line
    Jsonl,
}

/// Render bundles in the requested format.
pub fn render_bundles(bundles: &[OutputBundle], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(bundles).map_err(Into::into),
        OutputFormat::Jsonl => {
            let mut output = String::new();
            for bundle in bundles {
                output.push_str(&serde_json::to_string(bundle)?);
                output.push('\n');
            }
            Ok(output)
        }
    }
}

/// Write rendered output to a file, or to stdout when no path is given.
pub fn write_output(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            file.write_all(content.as_bytes())
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                handle.write_all(b"\n")?;
            }
        }
    }

    Ok(())
}
