//! Frame Aggregator CLI
//!
//! Drives the aggregation engine from files: reads batches, aggregates each
//! one, and writes the output bundles as JSON.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, unreadable input, write failure)
//!   2 - A batch failed to aggregate (remaining batches are not processed)

use anyhow::{Context, Result};
use frame_aggregator::cli::Args;
use frame_aggregator::config::{Settings, DEFAULT_CONFIG_FILE};
use frame_aggregator::input::{self, EventReplay};
use frame_aggregator::{output, AggregatorConfig, FrameAggregator, FrameSet};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Frame Aggregator v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Aggregation failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .frame-aggregator.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Settings::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Add field paths under [aggregations] to start aggregating.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run every batch through the aggregator. Returns exit code (0 or 2).
fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load and validate configuration once
    let mut settings = load_settings(&args)?;
    settings.merge_with_args(&args);
    let config = AggregatorConfig::from_settings(&settings).context("Invalid configuration")?;

    if config.aggregations.is_empty() {
        warn!("No aggregations configured; main frames will only carry forwarded fields");
    }
    info!(
        "Aggregating {} field(s): extra_fields={} image={} op_suffix={} upstream={}",
        config.aggregations.len(),
        config.forward_extra_fields,
        config.forward_image,
        config.append_op_to_key,
        config.forward_upstream_data
    );

    let batches = load_batches(&args)?;
    let aggregator = FrameAggregator::new(config);

    let mut bundles = Vec::with_capacity(batches.len());
    for (index, frames) in batches.iter().enumerate() {
        match aggregator.process(frames) {
            Ok(bundle) => bundles.push(bundle),
            Err(e) => {
                error!("Batch {} failed: {}", index, e);
                eprintln!("\n⛔ Batch {} failed: {}", index, e);
                return Ok(2);
            }
        }
    }

    let rendered = output::render_bundles(&bundles, args.format)?;
    output::write_output(&rendered, args.output.as_deref())?;

    info!(
        "Aggregated {} batch(es) in {:.3}s",
        bundles.len(),
        start_time.elapsed().as_secs_f64()
    );
    if let Some(ref path) = args.output {
        info!("Output written to {}", path.display());
    }

    Ok(0)
}

/// Read batches from the frames file or replay source events.
fn load_batches(args: &Args) -> Result<Vec<FrameSet>> {
    if let Some(ref path) = args.frames {
        return input::load_frame_sets(path);
    }

    let replay = EventReplay::load(&args.source)?;
    let ticks = args.ticks.unwrap_or_else(|| replay.default_ticks());
    info!("Replaying {} tick(s) from {} source(s)", ticks, args.source.len());
    Ok(replay.batches(ticks).collect())
}

/// Load settings from file or use defaults.
fn load_settings(args: &Args) -> Result<Settings> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Settings::load(config_path);
    }

    // Try default location; a file that exists but doesn't parse is fatal
    match Settings::load_default()? {
        Some(settings) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(settings)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Settings::default())
        }
    }
}
