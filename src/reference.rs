use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};

use crate::{
    config::Aligner,
    download::{self, HG38_FILE, HG38_URL},
    error::ResolveError,
};

/// User confirmation capability. The production implementation asks on
/// the terminal; tests inject canned answers.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Reads one line from stdin. An unreadable or closed input stream
/// counts as a decline.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        print!("{} [y/N] ", prompt);
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(n) if n > 0 => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}

/// Lookup of a reference bundle directory from a user-supplied hint.
/// The hint may be a local path or a remote object-store location;
/// this seam keeps the concrete lookup service out of the resolver.
pub trait GenomesLookup {
    fn lookup(&self, hint: &str) -> Option<PathBuf>;
}

/// Resolves hints that name an existing local directory. Remote
/// object-store hints need an alternative implementation and resolve
/// to None here.
pub struct LocalGenomes;

impl GenomesLookup for LocalGenomes {
    fn lookup(&self, hint: &str) -> Option<PathBuf> {
        let p = Path::new(hint);
        if p.is_dir() {
            let d = p.canonicalize().ok()?;
            debug!("Resolved genomes directory {}", d.display());
            Some(d)
        } else {
            warn!("Could not resolve genomes directory from hint {}", hint);
            None
        }
    }
}

/// Retrieval of the default host reference after the user accepts the
/// download prompt. Production fetches from UCSC; tests substitute a
/// local stub so no network transfer takes place.
pub trait HostFetch {
    fn fetch(&self, dest_dir: &Path) -> anyhow::Result<PathBuf>;
}

pub struct UcscFetch;

impl HostFetch for UcscFetch {
    fn fetch(&self, dest_dir: &Path) -> anyhow::Result<PathBuf> {
        download::fetch_host_reference(dest_dir)
    }
}

/// Reference related command line inputs, prior to resolution
pub struct RefInput {
    pub genomes_hint: Option<String>,
    pub combined_fa: Option<PathBuf>,
    pub viruses_fa: Option<PathBuf>,
    pub host_fa: Option<PathBuf>,
}

/// Resolved reference paths. At least one of genomes_dir, combined_fa
/// or host_fa is set when resolution succeeds.
#[derive(Debug)]
pub struct RefPaths {
    pub genomes_dir: Option<PathBuf>,
    pub combined_fa: Option<PathBuf>,
    pub viruses_fa: Option<PathBuf>,
    pub host_fa: Option<PathBuf>,
}

/// Resolve the reference configuration following the priority chain:
/// genomes directory, then combined FASTA, then separate virus FASTA,
/// then host FASTA (supplied, or downloaded after confirmation when no
/// reference input was given at all).
///
/// Returns None when the user declines the download - the manual
/// recovery commands have been printed and the caller should exit
/// cleanly.
pub fn resolve(
    input: RefInput,
    aligner: Aligner,
    bam: &Path,
    dest_dir: &Path,
    confirm: &mut dyn Confirm,
    lookup: &dyn GenomesLookup,
    fetch: &dyn HostFetch,
) -> anyhow::Result<Option<RefPaths>> {
    let genomes_dir = input
        .genomes_hint
        .as_deref()
        .and_then(|h| lookup.lookup(h));

    let mut host_fa = input.host_fa;

    if genomes_dir.is_none() {
        if let Some(fa) = &input.combined_fa {
            if aligner.requires_prebuilt_index() {
                require_index(fa, "bwt", format!("bwa index {}", fa.display()))?;
            }
            info!("Using combined host+virus reference {}", fa.display());
        } else if let Some(fa) = &input.viruses_fa {
            if aligner.requires_prebuilt_index() {
                require_index(fa, "bwt", format!("bwa index {}", fa.display()))?;
            }
            require_index(fa, "fai", format!("samtools faidx {}", fa.display()))?;
            info!("Using viral reference {}", fa.display());
        }

        // Offer the default host reference only when no reference input
        // of any kind was given on the command line
        if input.genomes_hint.is_none() && input.combined_fa.is_none() && host_fa.is_none() {
            let prompt = format!(
                "No reference genome was provided. Download hg38 from UCSC into {}?",
                dest_dir.display()
            );
            if confirm.confirm(&prompt) {
                host_fa = Some(fetch.fetch(dest_dir)?);
            } else {
                println!("{}", recovery_commands(bam, dest_dir));
                return Ok(None);
            }
        }

        if let Some(fa) = &host_fa {
            if !fa.is_file() {
                return Err(anyhow!("Host reference {} does not exist", fa.display()));
            }
            info!("Using host reference {}", fa.display());
        }
    } else {
        info!(
            "Using pre-indexed genomes directory {}",
            genomes_dir.as_ref().unwrap().display()
        );
    }

    if genomes_dir.is_none() && input.combined_fa.is_none() && host_fa.is_none() {
        return Err(ResolveError::ReferenceUnresolved.into());
    }

    Ok(Some(RefPaths {
        genomes_dir,
        combined_fa: input.combined_fa,
        viruses_fa: input.viruses_fa,
        host_fa,
    }))
}

/// Check for a companion index file made by appending an extension to
/// the FASTA name (ref.fa -> ref.fa.bwt)
fn require_index(fa: &Path, ext: &str, remedy: String) -> Result<(), ResolveError> {
    let mut s = fa.as_os_str().to_owned();
    s.push(".");
    s.push(ext);
    let index = PathBuf::from(s);
    if index.is_file() {
        Ok(())
    } else {
        Err(ResolveError::MissingIndex {
            fasta: fa.to_owned(),
            index,
            remedy,
        })
    }
}

/// Manual recovery commands shown on a declined download. The paths
/// match where the automatic download would have put the reference, so
/// both routes end with the same file in the same place.
fn recovery_commands(bam: &Path, dest_dir: &Path) -> String {
    let gz = dest_dir.join(format!("{}.gz", HG38_FILE));
    let fa = dest_dir.join(HG38_FILE);
    format!(
        "To download the reference manually, run:\n  wget -O {} {}\n  gunzip {}\nThen restart with:\n  {} {} --host-fa {}",
        gz.display(),
        HG38_URL,
        gz.display(),
        env!("CARGO_PKG_NAME"),
        bam.display(),
        fa.display()
    )
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use tempfile::tempdir;

    use super::*;

    struct Answer(bool);

    impl Confirm for Answer {
        fn confirm(&mut self, _prompt: &str) -> bool {
            self.0
        }
    }

    /// Fails the test if the resolver asks anything
    struct NoPrompt;

    impl Confirm for NoPrompt {
        fn confirm(&mut self, prompt: &str) -> bool {
            panic!("unexpected prompt: {}", prompt)
        }
    }

    struct NoGenomes;

    impl GenomesLookup for NoGenomes {
        fn lookup(&self, _hint: &str) -> Option<PathBuf> {
            None
        }
    }

    /// Fails the test if the resolver tries to download anything
    struct NoFetch;

    impl HostFetch for NoFetch {
        fn fetch(&self, _dest_dir: &Path) -> anyhow::Result<PathBuf> {
            panic!("unexpected host reference fetch")
        }
    }

    /// Drops an empty reference file in place of a real download
    struct StubFetch;

    impl HostFetch for StubFetch {
        fn fetch(&self, dest_dir: &Path) -> anyhow::Result<PathBuf> {
            let fa = dest_dir.join(HG38_FILE);
            File::create(&fa)?;
            Ok(fa)
        }
    }

    fn input(
        genomes_hint: Option<&str>,
        combined_fa: Option<PathBuf>,
        viruses_fa: Option<PathBuf>,
        host_fa: Option<PathBuf>,
    ) -> RefInput {
        RefInput {
            genomes_hint: genomes_hint.map(|s| s.to_string()),
            combined_fa,
            viruses_fa,
            host_fa,
        }
    }

    #[test]
    fn combined_fa_with_bwa_needs_bwt_index() {
        let dir = tempdir().unwrap();
        let fa = dir.path().join("ref.fa");
        File::create(&fa).unwrap();

        let err = resolve(
            input(None, Some(fa.clone()), None, None),
            Aligner::Bwa,
            Path::new("sample1.bam"),
            dir.path(),
            &mut NoPrompt,
            &LocalGenomes,
            &NoFetch,
        )
        .unwrap_err();

        match err.downcast_ref::<ResolveError>() {
            Some(ResolveError::MissingIndex { index, .. }) => {
                assert_eq!(index, &dir.path().join("ref.fa.bwt"))
            }
            e => panic!("expected MissingIndex, got {:?}", e),
        }
    }

    #[test]
    fn combined_fa_with_index_resolves() {
        let dir = tempdir().unwrap();
        let fa = dir.path().join("ref.fa");
        File::create(&fa).unwrap();
        File::create(dir.path().join("ref.fa.bwt")).unwrap();

        let r = resolve(
            input(None, Some(fa.clone()), None, None),
            Aligner::Bwa,
            Path::new("sample1.bam"),
            dir.path(),
            &mut NoPrompt,
            &LocalGenomes,
            &NoFetch,
        )
        .unwrap()
        .unwrap();
        assert_eq!(r.combined_fa, Some(fa));
        assert!(r.host_fa.is_none() && r.genomes_dir.is_none());
    }

    #[test]
    fn combined_fa_with_minimap2_needs_no_index() {
        let dir = tempdir().unwrap();
        let fa = dir.path().join("ref.fa");
        File::create(&fa).unwrap();

        let r = resolve(
            input(None, Some(fa), None, None),
            Aligner::Minimap2,
            Path::new("sample1.bam"),
            dir.path(),
            &mut NoPrompt,
            &LocalGenomes,
            &NoFetch,
        )
        .unwrap();
        assert!(r.is_some());
    }

    #[test]
    fn viruses_fa_needs_sequence_index() {
        let dir = tempdir().unwrap();
        let host = dir.path().join("hg38.fa");
        let viruses = dir.path().join("viruses.fa");
        File::create(&host).unwrap();
        File::create(&viruses).unwrap();

        let err = resolve(
            input(None, None, Some(viruses.clone()), Some(host)),
            Aligner::Minimap2,
            Path::new("sample1.bam"),
            dir.path(),
            &mut NoPrompt,
            &LocalGenomes,
            &NoFetch,
        )
        .unwrap_err();

        match err.downcast_ref::<ResolveError>() {
            Some(ResolveError::MissingIndex { index, .. }) => {
                assert_eq!(index, &dir.path().join("viruses.fa.fai"))
            }
            e => panic!("expected MissingIndex, got {:?}", e),
        }
    }

    #[test]
    fn resolvable_genomes_dir_skips_prompt_and_fallbacks() {
        let dir = tempdir().unwrap();
        let genomes = dir.path().join("genomes");
        std::fs::create_dir(&genomes).unwrap();

        let r = resolve(
            input(Some(genomes.to_str().unwrap()), None, None, None),
            Aligner::Bwa,
            Path::new("sample1.bam"),
            dir.path(),
            &mut NoPrompt,
            &LocalGenomes,
            &NoFetch,
        )
        .unwrap()
        .unwrap();
        assert!(r.genomes_dir.is_some());
        assert!(r.combined_fa.is_none());
        assert!(r.host_fa.is_none());
    }

    #[test]
    fn declined_download_is_a_clean_early_exit() {
        let dir = tempdir().unwrap();
        let r = resolve(
            input(None, None, None, None),
            Aligner::Minimap2,
            Path::new("sample1.bam"),
            dir.path(),
            &mut Answer(false),
            &LocalGenomes,
            &NoFetch,
        )
        .unwrap();
        assert!(r.is_none());
    }

    #[test]
    fn accepted_download_records_fetched_host_fa() {
        let dir = tempdir().unwrap();
        let r = resolve(
            input(None, None, None, None),
            Aligner::Minimap2,
            Path::new("sample1.bam"),
            dir.path(),
            &mut Answer(true),
            &LocalGenomes,
            &StubFetch,
        )
        .unwrap()
        .unwrap();
        assert_eq!(r.host_fa, Some(dir.path().join(HG38_FILE)));
        assert!(r.genomes_dir.is_none() && r.combined_fa.is_none());
    }

    #[test]
    fn recovery_commands_name_download_and_restart() {
        let cmds = recovery_commands(Path::new("/data/sample1.bam"), Path::new("/out"));
        let lines: Vec<&str> = cmds.lines().collect();
        assert_eq!(
            lines[1],
            format!("  wget -O /out/hg38.fa.gz {}", HG38_URL)
        );
        assert_eq!(lines[2], "  gunzip /out/hg38.fa.gz");
        assert_eq!(
            lines[4],
            format!(
                "  {} /data/sample1.bam --host-fa /out/hg38.fa",
                env!("CARGO_PKG_NAME")
            )
        );
    }

    #[test]
    fn unresolvable_hint_without_fallback_is_terminal() {
        let dir = tempdir().unwrap();
        let err = resolve(
            input(Some("s3://bucket/genomes"), None, None, None),
            Aligner::Minimap2,
            Path::new("sample1.bam"),
            dir.path(),
            &mut NoPrompt,
            &NoGenomes,
            &NoFetch,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ResolveError>(),
            Some(ResolveError::ReferenceUnresolved)
        ));
    }

    #[test]
    fn supplied_host_fa_must_exist() {
        let dir = tempdir().unwrap();
        let err = resolve(
            input(None, None, None, Some(dir.path().join("missing.fa"))),
            Aligner::Minimap2,
            Path::new("sample1.bam"),
            dir.path(),
            &mut NoPrompt,
            &LocalGenomes,
            &NoFetch,
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
