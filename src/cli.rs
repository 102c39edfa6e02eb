use std::{
    collections::BTreeSet,
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_parser, Arg, ArgAction,
    Command,
};

use anyhow::Context;

use crate::{
    config::{Aligner, Config},
    error::ResolveError,
    reference::{self, LocalGenomes, RefInput, StdinConfirm, UcscFetch},
    utils::{init_log, LogLevel},
};

const BAM_EXT: &str = "bam";
const DEFAULT_OUTPUT_DIR: &str = "ov_detect_results";

/// Set up definition of command options for clap
fn cli_model() -> Command {
    Command::new(crate_name!())
        .about(crate_description!())
        .version(crate_version!())
        .author(crate_authors!())
        .arg(
            Arg::new("timestamp")
                .short('X')
                .long("timestamp")
                .value_parser(value_parser!(stderrlog::Timestamp))
                .value_name("GRANULARITY")
                .default_value("none")
                .help("Prepend log entries with a timestamp"),
        )
        .arg(
            Arg::new("loglevel")
                .short('l')
                .long("loglevel")
                .value_name("LOGLEVEL")
                .value_parser(value_parser!(LogLevel))
                .ignore_case(true)
                .default_value("warn")
                .help("Set log level"),
        )
        .arg(
            Arg::new("quiet")
                .action(ArgAction::SetTrue)
                .long("quiet")
                .conflicts_with("loglevel")
                .help("Silence all output"),
        )
        .arg(
            Arg::new("output_dir")
                .short('o')
                .long("output-dir")
                .value_parser(value_parser!(PathBuf))
                .value_name("PATH")
                .default_value(DEFAULT_OUTPUT_DIR)
                .help("Set output directory (created if missing)"),
        )
        .arg(
            Arg::new("sample_name")
                .short('s')
                .long("sample-name")
                .value_parser(value_parser!(String))
                .value_name("STRING")
                .help("Set prefix for output file names [default: BAM file name without extension]"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .short_alias('j')
                .alias("cores")
                .value_parser(value_parser!(NonZeroUsize))
                .value_name("INT")
                .help("Set CPU budget for the workflow engine [default: available cores]"),
        )
        .arg(
            Arg::new("virus")
                .short('v')
                .long("virus")
                .value_parser(value_parser!(String))
                .value_name("LIST")
                .help("Comma separated list of virus identifiers to restrict detection to (e.g. HPV18,HBV)"),
        )
        .arg(
            Arg::new("only_detect")
                .long("only-detect")
                .action(ArgAction::SetTrue)
                .help("Skip the integration site stage and only report candidate viruses"),
        )
        .arg(
            Arg::new("aligner")
                .long("aligner")
                .value_parser(value_parser!(Aligner))
                .ignore_case(true)
                .value_name("ALIGNER")
                .help("Aligner for the viral mapping stages (bwa or minimap2) [default: minimap2]"),
        )
        .arg(
            Arg::new("gtf")
                .long("gtf")
                .alias("host-gtf")
                .value_parser(value_parser!(PathBuf))
                .value_name("PATH")
                .help("Gene annotation (GTF) for the host genome"),
        )
        .arg(
            Arg::new("host_fa")
                .short('g')
                .long("genome")
                .alias("host-fa")
                .value_parser(value_parser!(PathBuf))
                .value_name("PATH")
                .help("Host reference FASTA"),
        )
        .arg(
            Arg::new("viruses_fa")
                .long("viruses-fa")
                .value_parser(value_parser!(PathBuf))
                .value_name("PATH")
                .help("Viral reference FASTA, pre-indexed"),
        )
        .arg(
            Arg::new("combined_fa")
                .long("combined-fa")
                .value_parser(value_parser!(PathBuf))
                .value_name("PATH")
                .help("Merged host+virus FASTA, pre-indexed"),
        )
        .arg(
            Arg::new("genomes")
                .long("genomes")
                .alias("genomes-dir")
                .value_parser(value_parser!(String))
                .value_name("PATH_OR_URL")
                .help("Reference bundle root, local directory or remote object store path"),
        )
        .arg(
            Arg::new("unlock")
                .long("unlock")
                .action(ArgAction::SetTrue)
                .help("Clear a stale workflow engine lock and continue"),
        )
        .arg(
            Arg::new("dryrun")
                .short('n')
                .long("dryrun")
                .action(ArgAction::SetTrue)
                .help("Only show the workflow engine plan, execute nothing"),
        )
        .arg(
            Arg::new("input_bam")
                .value_parser(value_parser!(PathBuf))
                .value_name("BAM_FILE")
                .required(true)
                .help("Input BAM file with reads aligned to the host genome"),
        )
}

/// Handle command line options.  Set up Config structure
///
/// Returns None when the user declines the reference download; the
/// recovery instructions have already been printed in that case.
pub fn handle_cli() -> anyhow::Result<Option<Config>> {
    // Get matches from command line
    let m = cli_model().get_matches();

    // Setup logging
    init_log(&m);

    debug!("Processing command line options");

    let bam = m
        .get_one::<PathBuf>("input_bam")
        .expect("Missing input BAM")
        .clone();

    // Checked before any filesystem side effect
    check_bam_extension(&bam)?;
    if !bam.is_file() {
        return Err(anyhow!("Input file {} does not exist", bam.display()));
    }

    let sample_name = m
        .get_one::<String>("sample_name")
        .cloned()
        .unwrap_or_else(|| derive_sample_name(&bam));

    let output_dir = m
        .get_one::<PathBuf>("output_dir")
        .expect("Missing default output dir");
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Could not create output directory {}", output_dir.display()))?;
    let output_dir = output_dir
        .canonicalize()
        .with_context(|| format!("Invalid output directory {}", output_dir.display()))?;

    let cores = resolve_cores(m.get_one::<NonZeroUsize>("threads").copied(), num_cpus::get());
    debug!("Using {} cores", cores);

    let aligner = m.get_one::<Aligner>("aligner").copied();

    let ref_input = RefInput {
        genomes_hint: m.get_one::<String>("genomes").cloned(),
        combined_fa: m.get_one::<PathBuf>("combined_fa").cloned(),
        viruses_fa: m.get_one::<PathBuf>("viruses_fa").cloned(),
        host_fa: m.get_one::<PathBuf>("host_fa").cloned(),
    };
    let Some(refs) = reference::resolve(
        ref_input,
        aligner.unwrap_or_default(),
        &bam,
        &output_dir,
        &mut StdinConfirm,
        &LocalGenomes,
        &UcscFetch,
    )?
    else {
        return Ok(None);
    };

    let mut cfg = Config::new(bam, output_dir, sample_name, cores);

    if let Some(p) = refs.genomes_dir {
        cfg.set_genomes_dir(p)
    }
    if let Some(p) = refs.combined_fa {
        cfg.set_combined_fa(p)
    }
    if let Some(p) = refs.viruses_fa {
        cfg.set_viruses_fa(p)
    }
    if let Some(p) = refs.host_fa {
        cfg.set_host_fa(p)
    }

    if let Some(a) = aligner {
        cfg.set_aligner(a)
    }
    if let Some(list) = m.get_one::<String>("virus") {
        cfg.set_viruses(parse_virus_list(list))
    }
    if let Some(p) = m.get_one::<PathBuf>("gtf") {
        cfg.set_gtf_file(p.clone())
    }
    if m.get_flag("only_detect") {
        cfg.set_only_detect()
    }
    if m.get_flag("unlock") {
        cfg.set_unlock()
    }
    if m.get_flag("dryrun") {
        cfg.set_dry_run()
    }

    Ok(Some(cfg))
}

fn check_bam_extension(p: &Path) -> Result<(), ResolveError> {
    let ok = p
        .extension()
        .map(|e| e.eq_ignore_ascii_case(BAM_EXT))
        .unwrap_or(false);
    if ok {
        Ok(())
    } else {
        Err(ResolveError::InvalidInput { path: p.to_owned() })
    }
}

/// Sample name from the BAM file name with the extension stripped
fn derive_sample_name(p: &Path) -> String {
    p.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sample".to_string())
}

/// Requested cores capped by what the machine reports available
fn resolve_cores(requested: Option<NonZeroUsize>, available: usize) -> usize {
    match requested {
        Some(r) => usize::from(r).min(available),
        None => available,
    }
}

/// Split a comma separated virus list, trimming, uppercasing and
/// deduplicating the identifiers
fn parse_virus_list(s: &str) -> BTreeSet<String> {
    s.split(',')
        .map(|v| v.trim().to_uppercase())
        .filter(|v| !v.is_empty())
        .collect()
}
