use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use flate2::read::GzDecoder;

/// Default host reference, used when no reference input is supplied
pub const HG38_URL: &str =
    "https://hgdownload.soe.ucsc.edu/goldenPath/hg38/bigZips/latest/hg38.fa.gz";

pub const HG38_FILE: &str = "hg38.fa";

/// Download the default host reference into `dest_dir` and decompress
/// it. Blocking with no transfer timeout; the archive is several GB.
pub fn fetch_host_reference(dest_dir: &Path) -> anyhow::Result<PathBuf> {
    let gz = dest_dir.join(format!("{}.gz", HG38_FILE));
    let fa = dest_dir.join(HG38_FILE);

    info!("Downloading {} to {}", HG38_URL, gz.display());
    let client = reqwest::blocking::Client::builder()
        .timeout(None)
        .build()
        .with_context(|| "Could not build http client")?;
    let mut resp = client
        .get(HG38_URL)
        .send()
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Download of {} failed", HG38_URL))?;
    let mut wrt = BufWriter::new(
        File::create(&gz).with_context(|| format!("Could not create {}", gz.display()))?,
    );
    io::copy(&mut resp, &mut wrt)
        .with_context(|| format!("Error writing downloaded data to {}", gz.display()))?;
    wrt.flush()?;

    info!("Decompressing {} to {}", gz.display(), fa.display());
    let mut rdr = GzDecoder::new(BufReader::new(
        File::open(&gz).with_context(|| format!("Could not open {}", gz.display()))?,
    ));
    let mut out = BufWriter::new(
        File::create(&fa).with_context(|| format!("Could not create {}", fa.display()))?,
    );
    io::copy(&mut rdr, &mut out)
        .with_context(|| format!("Error decompressing {}", gz.display()))?;
    out.flush()?;

    // The compressed archive is no longer needed
    let _ = fs::remove_file(&gz);

    info!("Host reference ready at {}", fa.display());
    Ok(fa)
}
