//! # consolecap - Main Entry Point
//!
//! Supports two subcommands:
//! - **merge**: offline consolidation of a saved store snapshot with a recorded
//!   inspection log
//! - **demo**: the live engine against a scripted (optionally hostile) page

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::time::Duration;

use consolecap::channel::replay_log;
use consolecap::cli::{Args, Command, DemoArgs, MergeArgs};
use consolecap::config::EngineConfig;
use consolecap::demo::{run_demo, DemoOptions};
use consolecap::display::display_record_summary;
use consolecap::domain::ConfigError;
use consolecap::export::{read_events, write_record};
use consolecap::merge::MergedRecord;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ConfigError>() {
        Some(ConfigError::Invalid(_)) => EXIT_USAGE,
        _ => EXIT_ERROR,
    }
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    match args.config {
        Some(ref path) => {
            let config = EngineConfig::from_file(path)?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn export_record(record: &MergedRecord, path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create export file: {}", path.display()))?;
            write_record(record, BufWriter::new(file))?;
        }
        None => write_record(record, std::io::stdout().lock())?,
    }
    Ok(())
}

fn run_merge(mut config: EngineConfig, merge: &MergeArgs, quiet: bool) -> Result<()> {
    if !merge.priority.is_empty() {
        config.priority_markers.clone_from(&merge.priority);
    }

    let store_file = File::open(&merge.store)
        .with_context(|| format!("Failed to open store snapshot: {}", merge.store.display()))?;
    let store = read_events(BufReader::new(store_file))
        .with_context(|| format!("Invalid store snapshot: {}", merge.store.display()))?;

    let channel = match merge.channel {
        Some(ref path) => {
            let origin = store.first().map(|e| e.origin.clone()).unwrap_or_default();
            let file = File::open(path)
                .with_context(|| format!("Failed to open inspection log: {}", path.display()))?;
            let log = replay_log(BufReader::new(file), &origin)?;
            if !quiet {
                eprintln!(
                    "channel: {} events ({} ignored, {} malformed)",
                    log.events.len(),
                    log.ignored,
                    log.skipped
                );
            }
            log.events
        }
        None => Vec::new(),
    };

    let record = config.merger().merge(&store, &channel);
    if !quiet {
        eprintln!("store: {} events", store.len());
        display_record_summary(&record);
    }
    export_record(&record, merge.export.as_deref())
}

async fn run_demo_command(config: EngineConfig, demo: &DemoArgs, quiet: bool) -> Result<()> {
    if !quiet {
        println!("consolecap v{}", env!("CARGO_PKG_VERSION"));
        println!("hostile: {}, channel: {}", demo.hostile, demo.channel);
        if let Some(ref export_path) = demo.export {
            println!("export: {}", export_path.display());
        }
    }

    let options = DemoOptions {
        duration: Duration::from_secs(demo.duration),
        hostile: demo.hostile,
        channel: demo.channel,
        headless: demo.headless,
    };
    let outcome = run_demo(config, options).await?;

    if !quiet || demo.headless {
        eprintln!("\n{}: {} events streamed", outcome.exit_reason, outcome.streamed);
        display_record_summary(&outcome.report.record);
    }

    if let Some(ref path) = demo.export {
        export_record(&outcome.report.record, Some(path))?;
    }
    Ok(())
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    match args.command {
        Command::Merge(ref merge) => run_merge(config, merge, args.quiet),
        Command::Demo(ref demo) => run_demo_command(config, demo, args.quiet).await,
    }
}
