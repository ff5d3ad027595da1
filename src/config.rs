// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::{
    analyze::DuplicatePolicy,
    fetch::DEFAULT_SOURCE_URL,
    table::{ReaderOptions, DEFAULT_IDENTIFIER_COLUMN, DEFAULT_SKIP_COLUMNS},
};

/// Runtime settings: defaults, then an optional YAML file named by
/// `CASES_CONFIG`, then `CASES_*` environment overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source_url: String,
    /// Where downloaded snapshots are written and searched.
    pub data_dir: PathBuf,
    /// Explicit table to analyse; otherwise the newest snapshot in `data_dir`.
    pub table_path: Option<PathBuf>,
    pub identifier_column: String,
    pub skip_columns: Vec<String>,
    pub window_days: usize,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            data_dir: PathBuf::from("data"),
            table_path: None,
            identifier_column: DEFAULT_IDENTIFIER_COLUMN.to_string(),
            skip_columns: DEFAULT_SKIP_COLUMNS.iter().map(|s| s.to_string()).collect(),
            window_days: 5,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = match env::var("CASES_CONFIG") {
            Ok(path) => Self::from_yaml_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        debug!(?config, "resolved config");
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Apply `CASES_*` overrides looked up through `var`.
    pub fn apply_overrides<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("CASES_SOURCE_URL") {
            self.source_url = v;
        }
        if let Some(v) = var("CASES_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = var("CASES_TABLE") {
            self.table_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("CASES_IDENTIFIER_COLUMN") {
            self.identifier_column = v;
        }
        if let Some(v) = var("CASES_WINDOW_DAYS") {
            self.window_days = v
                .trim()
                .parse()
                .with_context(|| format!("CASES_WINDOW_DAYS={v} is not a number"))?;
        }
        if let Some(v) = var("CASES_DUPLICATES") {
            self.duplicate_policy = v.parse().map_err(|e: String| anyhow!(e))?;
        }
        Ok(())
    }

    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            identifier_column: self.identifier_column.clone(),
            skip_columns: self.skip_columns.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_reader_defaults() {
        let config = Config::default();
        assert_eq!(config.reader_options(), ReaderOptions::default());
        assert_eq!(config.duplicate_policy, DuplicatePolicy::KeepFirst);
        assert_eq!(config.table_path, None);
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        writeln!(tmp, "data_dir: snapshots")?;
        writeln!(tmp, "window_days: 14")?;
        writeln!(tmp, "duplicate_policy: sum")?;
        writeln!(tmp, "skip_columns: [Lat, Long]")?;

        let config = Config::from_yaml_file(tmp.path())?;
        assert_eq!(config.data_dir, PathBuf::from("snapshots"));
        assert_eq!(config.window_days, 14);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Sum);
        assert_eq!(config.skip_columns, vec!["Lat", "Long"]);
        assert_eq!(config.identifier_column, "Country/Region");
        assert_eq!(config.source_url, DEFAULT_SOURCE_URL);
        Ok(())
    }

    #[test]
    fn environment_overrides_win() -> Result<()> {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CASES_TABLE", "10.24.21.csv"),
            ("CASES_WINDOW_DAYS", " 3 "),
            ("CASES_DUPLICATES", "reject"),
            ("CASES_IDENTIFIER_COLUMN", "Admin2"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()))?;

        assert_eq!(config.table_path, Some(PathBuf::from("10.24.21.csv")));
        assert_eq!(config.window_days, 3);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.reader_options().identifier_column, "Admin2");
        Ok(())
    }

    #[test]
    fn bad_override_is_an_error() {
        let mut config = Config::default();
        assert!(config
            .apply_overrides(|k| (k == "CASES_WINDOW_DAYS").then(|| "many".to_string()))
            .is_err());
        assert!(config
            .apply_overrides(|k| (k == "CASES_DUPLICATES").then(|| "newest".to_string()))
            .is_err());
    }
}
