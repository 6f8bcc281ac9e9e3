//! Fetches an OWL release and converts it to OBO-graph JSON with an
//! external converter.

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_CONVERTER: &str = "ogger";
const OWL_FILE_NAME: &str = "doid.owl";
const JSON_FILE_NAME: &str = "doid.json";

pub fn download_owl(url: &str, dest: impl AsRef<Path>) -> Result<u64> {
    let dest = dest.as_ref();
    let http = HttpClient::builder()
        .timeout(Duration::from_secs(600))
        .build()
        .context("cannot build HTTP client")?;

    let mut response = http
        .get(url)
        .send()
        .with_context(|| format!("cannot download {url}"))?;
    if !response.status().is_success() {
        bail!("download of {url} returned status {}", response.status());
    }

    let mut file =
        File::create(dest).with_context(|| format!("cannot create {:?}", dest))?;
    let bytes = response
        .copy_to(&mut file)
        .with_context(|| format!("cannot write {:?}", dest))?;
    info!(url = %url, bytes, path = ?dest, "ontology downloaded");
    Ok(bytes)
}

/// Runs `<converter> <owl>` and captures its stdout into `dest`.
pub fn convert_to_obograph(converter: &str, owl: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let owl = owl.as_ref();
    let dest = dest.as_ref();
    duct::cmd(converter, [owl.as_os_str()])
        .stdout_path(dest)
        .run()
        .with_context(|| format!("`{converter}` failed to convert {:?}", owl))?;
    info!(converter = %converter, path = ?dest, "ontology converted to JSON");
    Ok(())
}

/// Downloads and converts into `work_dir`, returning the JSON path.
pub fn fetch_snapshot(url: &str, converter: &str, work_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let work_dir = work_dir.as_ref();
    std::fs::create_dir_all(work_dir)
        .with_context(|| format!("cannot create {:?}", work_dir))?;
    let owl = work_dir.join(OWL_FILE_NAME);
    let json = work_dir.join(JSON_FILE_NAME);
    download_owl(url, &owl)?;
    convert_to_obograph(converter, &owl, &json)?;
    Ok(json)
}
