use anyhow::{anyhow, bail, Context, Result};
use casescraper::{
    config::Config,
    fetch,
    report::{MappingFormat, Presenter, TextPresenter},
    table::load_table,
    Analyzer,
};
use reqwest::Client;
use std::{env, io, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const USAGE: &str = "usage: casescraper [--json] \
[fetch | summary | totals [REGION...] | deltas [REGION...] | date LABEL | window N | daily N]";

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    // ─── 2) config + args ────────────────────────────────────────────
    let config = Config::load()?;
    let mut json = false;
    let args: Vec<String> = env::args()
        .skip(1)
        .filter(|a| {
            let flag = a == "--json";
            json |= flag;
            !flag
        })
        .collect();
    let (command, rest) = match args.split_first() {
        Some((command, rest)) => (command.as_str(), rest),
        None => ("summary", &[][..]),
    };

    if command == "fetch" {
        let client = Client::new();
        let path = fetch::download_snapshot(&client, &config.source_url, &config.data_dir).await?;
        println!("{}", path.display());
        return Ok(());
    }

    // ─── 3) load the table once ──────────────────────────────────────
    let table_path = resolve_table_path(&config)?;
    let table = load_table(&table_path, &config.reader_options())?;
    let analyzer = Analyzer::with_policy(&table, config.duplicate_policy)?;
    info!(
        policy = ?analyzer.policy(),
        regions = analyzer.identifiers().len(),
        "analyzer ready"
    );

    // ─── 4) derive + present ─────────────────────────────────────────
    let format = if json {
        MappingFormat::Json
    } else {
        MappingFormat::Grid
    };
    let mut presenter = TextPresenter::new(io::stdout().lock()).with_mapping_format(format);
    run_command(&analyzer, &config, command, rest, &mut presenter)
}

fn resolve_table_path(config: &Config) -> Result<PathBuf> {
    if let Some(path) = &config.table_path {
        return Ok(path.clone());
    }
    fetch::latest_snapshot(&config.data_dir)?.ok_or_else(|| {
        anyhow!(
            "no snapshot in {}; run `casescraper fetch` or set CASES_TABLE",
            config.data_dir.display()
        )
    })
}

fn run_command(
    analyzer: &Analyzer<'_>,
    config: &Config,
    command: &str,
    rest: &[String],
    presenter: &mut impl Presenter,
) -> Result<()> {
    match command {
        "summary" => {
            let n = config.window_days;
            presenter.present_table(
                &format!("totals, last {n} days"),
                &analyzer.totals_window(n)?,
            )?;
            presenter.present_table("new cases, last day", &analyzer.deltas_window(1)?)?;
        }
        "totals" if rest.is_empty() => {
            presenter.present_table("latest totals", &analyzer.latest_totals())?
        }
        "totals" => presenter.present_mapping("latest totals", &analyzer.totals_for_many(rest))?,
        "deltas" if rest.is_empty() => {
            presenter.present_table("latest new cases", &analyzer.latest_deltas()?)?
        }
        "deltas" => {
            presenter.present_mapping("latest new cases", &analyzer.deltas_for_many(rest)?)?
        }
        "date" => {
            let label = rest.first().ok_or_else(|| anyhow!(USAGE))?;
            match analyzer.slice_by_date(label) {
                Some(slice) => presenter.present_table(label, &slice)?,
                None => warn!(label = %label, "no column with this date label"),
            }
        }
        "window" => {
            let n = parse_days(rest)?;
            presenter.present_table(
                &format!("totals, last {n} days"),
                &analyzer.totals_window(n)?,
            )?;
        }
        "daily" => {
            let n = parse_days(rest)?;
            presenter.present_table(
                &format!("new cases, last {n} days"),
                &analyzer.deltas_window(n)?,
            )?;
        }
        other => bail!("unknown command '{other}'\n{USAGE}"),
    }
    Ok(())
}

fn parse_days(rest: &[String]) -> Result<usize> {
    let raw = rest.first().ok_or_else(|| anyhow!(USAGE))?;
    raw.parse()
        .with_context(|| format!("'{raw}' is not a number of days"))
}
