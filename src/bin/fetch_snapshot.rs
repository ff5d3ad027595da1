use anyhow::Result;
use casescraper::{config::Config, fetch};
use reqwest::Client;
use std::{env, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Usage: fetch_snapshot [URL] [DIR]
/// Falls back to `CASES_SOURCE_URL` / `CASES_DATA_DIR` (or their defaults).
#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(filter).init();

    let config = Config::load()?;
    let mut args = env::args().skip(1);
    let url = args.next().unwrap_or(config.source_url);
    let dir = args.next().map(PathBuf::from).unwrap_or(config.data_dir);

    info!(url = %url, dir = %dir.display(), "fetching");
    let client = Client::new();
    let path = fetch::download_snapshot(&client, &url, &dir).await?;
    println!("{}", path.display());
    Ok(())
}
