use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{EmitMode, Strategy};

#[derive(Parser)]
#[command(name = "archetype-dates")]
#[command(about = "Fill archetype release dates in a JavaScript data file", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Command>,

    #[command(flatten)]
    pub(crate) options: RunOptions,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    /// Look up release dates and write them into the document (default).
    Enrich,

    /// Add null date placeholders to records lacking them. No network access.
    Prepare,

    /// Print the records the document decodes to.
    List,
}

#[derive(Args, Debug, Default, Clone)]
pub(crate) struct RunOptions {
    /// JSON config file; flags given here override it
    #[arg(long, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Document holding the archetype array
    #[arg(short, long, global = true)]
    pub(crate) input: Option<PathBuf>,

    /// Where to write the result (default: the input path)
    #[arg(short, long, global = true)]
    pub(crate) output: Option<PathBuf>,

    #[arg(long, value_enum, global = true)]
    pub(crate) strategy: Option<Strategy>,

    /// How to write back (default: regenerate for direct, patch for indexed)
    #[arg(long, value_enum, global = true)]
    pub(crate) emit: Option<EmitMode>,

    /// Overwrite dates that are already filled in
    #[arg(long, global = true, conflicts_with = "no_refresh")]
    pub(crate) refresh: bool,

    /// Only fill dates that are null or missing
    #[arg(long, global = true)]
    pub(crate) no_refresh: bool,

    /// Name the array is bound to in the document
    #[arg(long, global = true)]
    pub(crate) binding: Option<String>,

    /// Card database base URL
    #[arg(long, global = true)]
    pub(crate) api_base: Option<String>,

    /// Pause after each remote call (ms)
    #[arg(long, global = true)]
    pub(crate) delay_ms: Option<u64>,

    /// Do not write anything; only report what would change.
    #[arg(long, global = true)]
    pub(crate) dry_run: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,
}

impl RunOptions {
    pub(crate) fn refresh_override(&self) -> Option<bool> {
        if self.refresh {
            Some(true)
        } else if self.no_refresh {
            Some(false)
        } else {
            None
        }
    }
}
