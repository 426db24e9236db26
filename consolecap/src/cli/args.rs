//! CLI argument definitions

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "consolecap",
    version,
    about = "Capture and consolidate console diagnostics from hostile pages",
    after_help = "\
EXAMPLES:
    consolecap demo --hostile --channel              Watch the engine survive a console hijack
    consolecap demo --headless --export record.json  Run unattended and keep the record
    consolecap merge --store store.json --channel devtools.jsonl --export merged.json"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Engine configuration file (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Merge a saved store snapshot with a recorded inspection log
    Merge(MergeArgs),
    /// Run the engine against a simulated page
    Demo(DemoArgs),
}

#[derive(ClapArgs)]
pub struct MergeArgs {
    /// Store snapshot: JSON array of captured events
    #[arg(long, value_name = "FILE")]
    pub store: PathBuf,

    /// Recorded protocol messages, one JSON object per line
    #[arg(long, value_name = "FILE")]
    pub channel: Option<PathBuf>,

    /// Write the merged record here instead of stdout
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Message tokens that win duplicate resolution (repeatable)
    #[arg(long = "priority", value_name = "TOKEN")]
    pub priority: Vec<String>,
}

#[derive(ClapArgs)]
pub struct DemoArgs {
    /// Stop after N seconds
    #[arg(long, default_value = "5")]
    pub duration: u64,

    /// Page replaces its console during boot
    #[arg(long)]
    pub hostile: bool,

    /// Attach the inspection channel
    #[arg(long)]
    pub channel: bool,

    /// Export the final record to file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Print statistics instead of streaming events (requires --export)
    #[arg(long, requires = "export")]
    pub headless: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_headless_requires_export() {
        assert!(Args::try_parse_from(["consolecap", "demo", "--headless"]).is_err());
        let args =
            Args::try_parse_from(["consolecap", "demo", "--headless", "--export", "out.json"]).unwrap();
        let Command::Demo(demo) = args.command else { panic!("expected demo") };
        assert!(demo.headless);
        assert_eq!(demo.duration, 5);
    }

    #[test]
    fn test_merge_accepts_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "consolecap", "merge", "--store", "s.json", "--priority", "[APP]", "--quiet",
        ])
        .unwrap();
        assert!(args.quiet);
        let Command::Merge(merge) = args.command else { panic!("expected merge") };
        assert_eq!(merge.priority, vec!["[APP]".to_string()]);
        assert!(merge.channel.is_none());
    }
}
