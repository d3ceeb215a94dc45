mod analyze;
mod bins;
mod load;
mod options;
mod presence;
mod progress;
mod report;

use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use options::Cli;
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Skipped chunks and dropped entries are logged at `warn`, so show
/// them unless `RUST_LOG` says otherwise.
fn logger(env: Env<'_>) -> Builder {
    Builder::from_env(env.default_filter_or("warn"))
}

fn main() -> Result<()> {
    logger(Env::default()).init();
    let cli = Cli::parse();
    match cli {
        Cli::Analyze(analyze) => analyze.run(),
        Cli::Presence(presence) => presence.run(),
        Cli::Bins(bins) => bins.run(),
    }
}
