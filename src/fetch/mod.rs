// src/fetch/mod.rs
use anyhow::{anyhow, bail, Context, Result};
use glob::glob;
use reqwest::Client;
use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};
use tokio::fs;
use tracing::{debug, info};
use url::Url;

/// Global confirmed-cases time series published by JHU CSSE.
pub const DEFAULT_SOURCE_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_confirmed_global.csv";

/// Download the table at `url_str` and save it unchanged under `dest_dir`,
/// named after its newest date column. Returns the full path of the saved file.
#[tracing::instrument(level = "info", skip(client, dest_dir), fields(dest = %dest_dir.as_ref().display()))]
pub async fn download_snapshot(
    client: &Client,
    url_str: &str,
    dest_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let dest_dir = dest_dir.as_ref();
    let url = Url::parse(url_str).with_context(|| format!("parsing source URL {}", url_str))?;

    let body = client
        .get(url.as_str())
        .send()
        .await
        .with_context(|| format!("GET {}", url))?
        .error_for_status()?
        .bytes()
        .await
        .with_context(|| format!("reading body from {}", url))?;
    debug!(bytes = body.len(), "downloaded table");

    let latest =
        latest_header_label(&body).with_context(|| format!("reading header from {}", url))?;
    let dest_path = dest_dir.join(snapshot_file_name(&latest));

    fs::create_dir_all(dest_dir)
        .await
        .with_context(|| format!("creating {}", dest_dir.display()))?;
    fs::write(&dest_path, &body)
        .await
        .with_context(|| format!("writing {}", dest_path.display()))?;

    info!(path = %dest_path.display(), latest = %latest, "saved snapshot");
    Ok(dest_path)
}

/// Label of the rightmost column of the header row.
pub fn latest_header_label(body: &[u8]) -> Result<String> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body);
    let mut header = csv::StringRecord::new();
    if !rdr.read_record(&mut header)? {
        bail!("table has no header row");
    }

    header
        .iter()
        .last()
        .map(|s| s.trim().trim_start_matches('\u{feff}').to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("header row has no columns"))
}

/// `3/15/22` → `3.15.22.csv`. Path separators never reach the file system.
pub fn snapshot_file_name(label: &str) -> String {
    format!("{}.csv", label.replace(|c: char| c == '/' || c == '\\', "."))
}

/// Most recently modified `*.csv` directly inside `dir`, if any.
pub fn latest_snapshot(dir: impl AsRef<Path>) -> Result<Option<PathBuf>> {
    let pattern = format!("{}/*.csv", dir.as_ref().display());
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in glob(&pattern).with_context(|| format!("bad glob pattern {}", pattern))? {
        let path = entry?;
        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .with_context(|| format!("reading mtime of {}", path.display()))?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}
