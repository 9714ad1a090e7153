// Module declarations
mod cli;
mod config;
mod emit;
mod enrich;
mod error;
mod extract;
mod resolve;
mod scan;
mod source;
mod types;

// Items are re-exported at the crate root so modules can refer to each
// other through `crate::` without spelling out paths.
#[allow(unused_imports)]
pub(crate) use cli::*;
#[allow(unused_imports)]
pub(crate) use config::*;
#[allow(unused_imports)]
pub(crate) use emit::*;
#[allow(unused_imports)]
pub(crate) use enrich::*;
#[allow(unused_imports)]
pub(crate) use error::*;
#[allow(unused_imports)]
pub(crate) use extract::*;
#[allow(unused_imports)]
pub(crate) use resolve::*;
#[allow(unused_imports)]
pub(crate) use source::*;
#[allow(unused_imports)]
pub(crate) use types::*;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default = if verbose {
        "archetype_dates=debug"
    } else {
        "archetype_dates=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn report(summary: &RunSummary, dry_run: bool) {
    let stats = &summary.stats;
    println!();
    println!(
        "Done: records={} enriched={} cached={} failed={} skipped={}",
        summary.records, stats.enriched, stats.cached, stats.failed, stats.skipped
    );
    match (&summary.written, dry_run) {
        (Some(path), _) => println!("✓ Saved to: {}", path.display()),
        (None, true) if summary.changed => println!("Dry run: document would change"),
        (None, _) => println!("No changes"),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.options.verbose);
    let config = resolve_config(&cli.options)?;
    let dry_run = cli.options.dry_run;

    match cli.command.unwrap_or(Command::Enrich) {
        Command::Enrich => {
            let client = YgoProDeckClient::new(&config.api_base, config.timeout())?;
            let summary = run_enrich(&config, &client, dry_run)?;
            report(&summary, dry_run);
        }

        Command::Prepare => {
            let summary = run_prepare(&config, dry_run)?;
            report(&summary, dry_run);
        }

        Command::List => {
            let records = run_list(&config)?;
            let total = records.len();
            for (idx, record) in records.iter().enumerate() {
                let name = record.name().unwrap_or("<unnamed>");
                let first = record.date(FIRST_RELEASE_DATE).unwrap_or("-");
                let latest = record.date(LATEST_RELEASE_DATE).unwrap_or("-");
                println!("[{}/{total}] {name}: {first} to {latest}", idx + 1);
            }
        }
    }
    Ok(())
}
