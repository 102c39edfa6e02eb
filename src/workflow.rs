use std::{fs, io, path::Path, process::Command};

use anyhow::Context;

use crate::config::Config;

/// Workflow engine binary, expected on PATH
const ENGINE: &str = "snakemake";

/// Completion sentinel written by the engine under the working
/// subdirectory of the output directory
const WORK_SUBDIR: &str = "work";
const DONE_MARKER: &str = "all.done";

/// Remove the completion sentinel so a re-run is not skipped as
/// already finished. Idempotent.
pub fn clear_done_marker(output_dir: &Path) -> anyhow::Result<()> {
    let marker = output_dir.join(WORK_SUBDIR).join(DONE_MARKER);
    match fs::remove_file(&marker) {
        Ok(()) => {
            debug!("Cleared completion marker {}", marker.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            Err(e).with_context(|| format!("Could not clear marker {}", marker.display()))
        }
    }
}

/// Engine command line for a configuration. Split out from submission
/// so it can be checked without running anything.
pub fn engine_args(cfg: &Config) -> Vec<String> {
    let mut args = vec![
        "--directory".to_string(),
        cfg.output_dir().display().to_string(),
        "--cores".to_string(),
        cfg.cores().to_string(),
        "--config".to_string(),
    ];
    for (k, v) in cfg.workflow_settings() {
        args.push(format!("{}={}", k, v));
    }
    if cfg.unlock() {
        args.push("--unlock".to_string());
    }
    if cfg.dry_run() {
        args.push("--dryrun".to_string());
    }
    args
}

/// Submit the configuration to the workflow engine and block until it
/// finishes. Returns the engine's success status.
pub fn submit(cfg: &Config) -> anyhow::Result<bool> {
    let args = engine_args(cfg);
    info!("Submitting to {} with args: {}", ENGINE, args.join(" "));
    let status = Command::new(ENGINE)
        .args(&args)
        .status()
        .with_context(|| format!("Could not run workflow engine {}", ENGINE))?;
    debug!("Workflow engine exited with {}", status);
    Ok(status.success())
}
