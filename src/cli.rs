//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::input::SourceSpec;
use crate::output::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

/// Frame Aggregator - merge synchronized frames from multiple producers
///
/// Reduces configured nested fields across every frame of a batch
/// (sum, avg, min, max, median, std, mode, count, count_distinct,
/// distinct, any, all) and emits one aggregated `main` frame per batch.
///
/// Examples:
///   frame-aggregator --frames batch.json --aggregations '{"meta.count": "sum"}'
///   frame-aggregator --source cam_1=input/events_1.json --source cam_2=input/events_2.json
///   frame-aggregator --frames batches.json --format jsonl --output aggregated.jsonl
///   frame-aggregator --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON file holding one batch (source id -> frame) or an array of batches
    #[arg(short, long, value_name = "FILE", conflicts_with = "source")]
    pub frames: Option<PathBuf>,

    /// Replay a per-source JSON event array (repeatable)
    ///
    /// Each tick wraps event N of every source into that source's `meta`.
    #[arg(short, long, value_name = "NAME=FILE")]
    pub source: Vec<SourceSpec>,

    /// Number of ticks to replay (default: longest event list)
    #[arg(long, value_name = "COUNT", requires = "source")]
    pub ticks: Option<usize>,

    /// Aggregations as JSON, e.g. '{"meta.count": "sum"}'
    #[arg(short, long, value_name = "JSON", env = "FILTER_AGGREGATIONS")]
    pub aggregations: Option<String>,

    /// Copy non-aggregated top-level fields from the first frame
    #[arg(long, value_name = "BOOL", env = "FILTER_FORWARD_EXTRA_FIELDS")]
    pub forward_extra_fields: Option<String>,

    /// Copy the first frame's image into the aggregated frame
    #[arg(long, value_name = "BOOL", env = "FILTER_FORWARD_IMAGE")]
    pub forward_image: Option<String>,

    /// Suffix output keys with the operation name
    #[arg(long, value_name = "BOOL", env = "FILTER_APPEND_OP_TO_KEY")]
    pub append_op_to_key: Option<String>,

    /// Forward every source frame unchanged next to `main`
    #[arg(long, value_name = "BOOL", env = "FILTER_FORWARD_UPSTREAM_DATA")]
    pub forward_upstream_data: Option<String>,

    /// Log every reduced field at info level
    #[arg(long, value_name = "BOOL", env = "FILTER_DEBUG")]
    pub debug: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .frame-aggregator.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (json, jsonl)
    #[arg(long, default_value = "json", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .frame-aggregator.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        match (&self.frames, self.source.is_empty()) {
            (None, true) => return Err("Either --frames or --source is required".to_string()),
            (Some(_), false) => {
                return Err("Cannot use both --frames and --source".to_string());
            }
            _ => {}
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.ticks == Some(0) {
            return Err("Ticks must be at least 1".to_string());
        }

        if let Some(ref frames) = self.frames {
            if !frames.is_file() {
                return Err(format!("Frames file does not exist: {}", frames.display()));
            }
        }

        for spec in &self.source {
            if !spec.path.is_file() {
                return Err(format!(
                    "Events file for source '{}' does not exist: {}",
                    spec.name,
                    spec.path.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            frames: Some(PathBuf::from("Cargo.toml")),
            source: Vec::new(),
            ticks: None,
            aggregations: None,
            forward_extra_fields: None,
            forward_image: None,
            append_op_to_key: None,
            forward_upstream_data: None,
            debug: None,
            config: None,
            output: None,
            format: OutputFormat::Json,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_flags_and_sources() {
        let args = Args::try_parse_from([
            "frame-aggregator",
            "--source",
            "cam_1=a.json",
            "--source",
            "cam_2=b.json",
            "--aggregations",
            r#"{"meta.count": "sum"}"#,
            "--forward-image",
            "yes",
            "--format",
            "jsonl",
        ])
        .unwrap();

        assert_eq!(args.source.len(), 2);
        assert_eq!(args.source[1].name, "cam_2");
        assert_eq!(args.forward_image.as_deref(), Some("yes"));
        assert_eq!(args.format, OutputFormat::Jsonl);
    }

    #[test]
    fn test_malformed_source_rejected_by_parser() {
        assert!(Args::try_parse_from(["frame-aggregator", "--source", "nofile"]).is_err());
    }

    #[test]
    fn test_validation_requires_input() {
        let mut args = make_args();
        assert!(args.validate().is_ok());

        args.frames = None;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_missing_frames_file() {
        let mut args = make_args();
        args.frames = Some(PathBuf::from("does/not/exist.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_ticks() {
        let mut args = make_args();
        args.ticks = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
