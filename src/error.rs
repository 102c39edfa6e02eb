use std::path::PathBuf;

use thiserror::Error;

/// Failure classes for configuration resolution.
///
/// Each variant carries enough context to print a remedial instruction;
/// none of them are retried. A declined reference download is not an
/// error and is handled separately as a clean early exit.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid input file {}: expected a .bam file", path.display())]
    InvalidInput { path: PathBuf },

    #[error(
        "Missing index file {} for {}: run `{remedy}` or select a different aligner",
        index.display(), fasta.display()
    )]
    MissingIndex {
        fasta: PathBuf,
        index: PathBuf,
        remedy: String,
    },

    #[error(
        "Could not resolve a reference genome: supply --genomes-dir, --combined-fa or --host-fa"
    )]
    ReferenceUnresolved,
}
