mod cli;
mod config;
mod download;
mod error;
mod reference;
mod report;
mod utils;
mod workflow;

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

use anyhow::Context;

fn main() -> anyhow::Result<()> {
    // A None config means the user declined the reference download after
    // being shown the manual recovery commands - a clean exit, not an error
    let Some(cfg) = cli::handle_cli().with_context(|| "Error processing command line arguments")?
    else {
        return Ok(());
    };

    workflow::clear_done_marker(cfg.output_dir())?;

    if !workflow::submit(&cfg)? {
        return Err(anyhow!("Workflow engine reported failure"));
    }

    if cfg.dry_run() {
        return Ok(());
    }

    report::final_report(&cfg)
}
