use std::{
    collections::BTreeSet,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Aligner used by the workflow engine to map reads against the
/// viral/combined references. bwa needs a prebuilt index on disk;
/// minimap2 builds its index on the fly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Aligner {
    Bwa,
    #[default]
    Minimap2,
}

impl Aligner {
    pub fn requires_prebuilt_index(&self) -> bool {
        matches!(self, Self::Bwa)
    }
}

impl FromStr for Aligner {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bwa" => Ok(Self::Bwa),
            "minimap2" => Ok(Self::Minimap2),
            _ => Err("no match (expected bwa or minimap2)"),
        }
    }
}

impl fmt::Display for Aligner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bwa => write!(f, "bwa"),
            Self::Minimap2 => write!(f, "minimap2"),
        }
    }
}

/// Config
///
/// Run configuration for the workflow engine
/// This is generated from the command line arguments
/// Once set it is read only
///
/// input_bam - aligned reads for the sample under study
/// output_dir - output directory (absolute, created by the resolver)
/// sample_name - prefix for output file names
/// cores - CPU budget hint for the engine
/// viruses - optional restriction of detection to named viruses
/// only_detect - stop after virus detection, skip integration sites
/// aligner - requested aligner, only forwarded when set explicitly
/// combined_fa / viruses_fa / host_fa / genomes_dir - resolved references
/// gtf_file - gene annotation for breakpoint effect reporting
/// unlock / dry_run - engine pass-through options, not configuration keys
///
pub struct Config {
    input_bam: PathBuf,
    output_dir: PathBuf,
    sample_name: String,
    cores: usize,
    viruses: Option<BTreeSet<String>>,
    only_detect: bool,
    aligner: Option<Aligner>,
    combined_fa: Option<PathBuf>,
    viruses_fa: Option<PathBuf>,
    host_fa: Option<PathBuf>,
    genomes_dir: Option<PathBuf>,
    gtf_file: Option<PathBuf>,
    unlock: bool,
    dry_run: bool,
}

impl Config {
    pub fn new(input_bam: PathBuf, output_dir: PathBuf, sample_name: String, cores: usize) -> Self {
        Self {
            input_bam,
            output_dir,
            sample_name,
            cores,
            viruses: None,
            only_detect: false,
            aligner: None,
            combined_fa: None,
            viruses_fa: None,
            host_fa: None,
            genomes_dir: None,
            gtf_file: None,
            unlock: false,
            dry_run: false,
        }
    }

    pub fn set_viruses(&mut self, v: BTreeSet<String>) {
        self.viruses = Some(v)
    }

    pub fn set_only_detect(&mut self) {
        self.only_detect = true
    }

    pub fn set_aligner(&mut self, a: Aligner) {
        self.aligner = Some(a)
    }

    pub fn set_combined_fa(&mut self, p: PathBuf) {
        self.combined_fa = Some(p)
    }

    pub fn set_viruses_fa(&mut self, p: PathBuf) {
        self.viruses_fa = Some(p)
    }

    pub fn set_host_fa(&mut self, p: PathBuf) {
        self.host_fa = Some(p)
    }

    pub fn set_genomes_dir(&mut self, p: PathBuf) {
        self.genomes_dir = Some(p)
    }

    pub fn set_gtf_file(&mut self, p: PathBuf) {
        self.gtf_file = Some(p)
    }

    pub fn set_unlock(&mut self) {
        self.unlock = true
    }

    pub fn set_dry_run(&mut self) {
        self.dry_run = true
    }

    pub fn input_bam(&self) -> &Path {
        &self.input_bam
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn sample_name(&self) -> &str {
        &self.sample_name
    }

    pub fn cores(&self) -> usize {
        self.cores
    }

    pub fn viruses(&self) -> Option<&BTreeSet<String>> {
        self.viruses.as_ref()
    }

    pub fn only_detect(&self) -> bool {
        self.only_detect
    }

    pub fn aligner(&self) -> Option<Aligner> {
        self.aligner
    }

    pub fn host_fa(&self) -> Option<&Path> {
        self.host_fa.as_deref()
    }

    pub fn unlock(&self) -> bool {
        self.unlock
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Settings handed to the workflow engine. Keys that were never
    /// configured are omitted entirely so that downstream stages can
    /// distinguish "not configured" from "configured as empty".
    pub fn workflow_settings(&self) -> Vec<(&'static str, String)> {
        let path = |p: &Path| p.display().to_string();

        let mut v = vec![
            ("input_bam", path(&self.input_bam)),
            ("output_dir", path(&self.output_dir)),
            ("sample_name", self.sample_name.clone()),
            ("cores", self.cores.to_string()),
        ];
        if let Some(vs) = &self.viruses {
            let joined: Vec<&str> = vs.iter().map(|s| s.as_str()).collect();
            v.push(("viruses", joined.join(",")));
        }
        if self.only_detect {
            v.push(("only_detect", "true".to_string()));
        }
        if let Some(a) = self.aligner {
            v.push(("aligner", a.to_string()));
        }
        if let Some(p) = &self.combined_fa {
            v.push(("combined_fa", path(p)));
        }
        if let Some(p) = &self.viruses_fa {
            v.push(("viruses_fa", path(p)));
        }
        if let Some(p) = &self.host_fa {
            v.push(("host_fa", path(p)));
        }
        if let Some(p) = &self.genomes_dir {
            v.push(("genomes_dir", path(p)));
        }
        if let Some(p) = &self.gtf_file {
            v.push(("gtf_file", path(p)));
        }
        v
    }
}
