use std::{io::BufRead, path::Path};

use anyhow::Context;
use compress_io::compress::CompressIo;

use crate::config::Config;

/// Output artifacts produced by the workflow engine
pub const PRIORITIZED_TSV: &str = "prioritized_oncoviruses.tsv";
pub const BREAKPOINTS_VCF: &str = "breakpoints.vcf";

/// Inspect the expected output artifacts and print the closing summary
pub fn final_report(cfg: &Config) -> anyhow::Result<()> {
    let tsv = cfg.output_dir().join(PRIORITIZED_TSV);
    if !tsv.is_file() {
        return Err(anyhow!(
            "Expected output {} was not produced by the workflow engine",
            tsv.display()
        ));
    }
    let n = count_candidates(&tsv)?;
    info!("{} candidate viruses in {}", n, tsv.display());

    let vcf = cfg.output_dir().join(BREAKPOINTS_VCF);
    println!(
        "{}",
        final_message(cfg.only_detect(), vcf.is_file(), &tsv, &vcf, n)
    );
    Ok(())
}

/// Pick one of the three closing messages from the requested mode and
/// the presence of the breakpoints file
fn final_message(
    only_detect: bool,
    have_breakpoints: bool,
    tsv: &Path,
    vcf: &Path,
    n_candidates: usize,
) -> String {
    if only_detect {
        format!(
            "Detection finished. {} prioritized candidate viruses written to {}",
            n_candidates,
            tsv.display()
        )
    } else if have_breakpoints {
        format!(
            "Pipeline finished. {} prioritized candidate viruses written to {}, \
             putative integration sites written to {}",
            n_candidates,
            tsv.display(),
            vcf.display()
        )
    } else {
        format!(
            "Pipeline finished. {} prioritized candidate viruses written to {}, \
             but no putative integration sites were found",
            n_candidates,
            tsv.display()
        )
    }
}

/// Count candidate rows in the prioritized report, skipping comment
/// lines and the header row. The file may be plain or compressed.
fn count_candidates(p: &Path) -> anyhow::Result<usize> {
    let mut rdr = CompressIo::new()
        .path(p)
        .bufreader()
        .with_context(|| format!("Could not open report file {}", p.display()))?;

    let mut buf = String::new();
    let mut seen_header = false;
    let mut n = 0;
    loop {
        buf.clear();
        if rdr.read_line(&mut buf)? == 0 {
            break;
        }
        let line = buf.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !seen_header {
            seen_header = true;
            continue;
        }
        n += 1;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::Write, path::PathBuf};

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn message_selection_covers_all_modes() {
        let tsv = PathBuf::from("/out/prioritized_oncoviruses.tsv");
        let vcf = PathBuf::from("/out/breakpoints.vcf");

        let detect_only = final_message(true, false, &tsv, &vcf, 2);
        assert!(detect_only.starts_with("Detection finished"));

        let full = final_message(false, true, &tsv, &vcf, 2);
        assert!(full.contains("integration sites written to"));

        let no_sites = final_message(false, false, &tsv, &vcf, 2);
        assert!(no_sites.contains("no putative integration sites"));
    }

    #[test]
    fn candidate_count_skips_comments_and_header() {
        let dir = tempdir().unwrap();
        let p = dir.path().join(PRIORITIZED_TSV);
        let mut f = File::create(&p).unwrap();
        writeln!(f, "# generated by the detection stage").unwrap();
        writeln!(f, "virus\tcoverage\tscore").unwrap();
        writeln!(f, "HPV18\t88.1\t12.3").unwrap();
        writeln!(f, "HBV\t5.2\t0.9").unwrap();
        drop(f);

        assert_eq!(count_candidates(&p).unwrap(), 2);
    }

    #[test]
    fn empty_report_counts_zero() {
        let dir = tempdir().unwrap();
        let p = dir.path().join(PRIORITIZED_TSV);
        let mut f = File::create(&p).unwrap();
        writeln!(f, "virus\tcoverage\tscore").unwrap();
        drop(f);

        assert_eq!(count_candidates(&p).unwrap(), 0);
    }
}
