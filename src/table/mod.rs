// src/table/mod.rs
use csv::ReaderBuilder;
use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};
use tracing::{debug, info};

use crate::error::{TableError, TableResult};

pub const DEFAULT_IDENTIFIER_COLUMN: &str = "Country/Region";

/// Metadata columns published alongside the dated counts.
pub const DEFAULT_SKIP_COLUMNS: &[&str] = &["Province/State", "Lat", "Long"];

/// How to split a header row into the identifier column and value columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderOptions {
    pub identifier_column: String,
    /// Columns that are neither the identifier nor a dated value.
    pub skip_columns: Vec<String>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            identifier_column: DEFAULT_IDENTIFIER_COLUMN.to_string(),
            skip_columns: DEFAULT_SKIP_COLUMNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A wide table of cumulative counts: one row per region, one column per day.
///
/// Column order is the only source of chronology; labels are never parsed
/// as dates. The table is immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    identifier_column: String,
    /// One entry per row, in file order. Not guaranteed unique.
    identifiers: Vec<String>,
    /// Value column labels, oldest to newest.
    labels: Vec<String>,
    /// `values[row][col]` pairs with `identifiers[row]` and `labels[col]`.
    values: Vec<Vec<i64>>,
}

impl RawTable {
    /// Build a table, checking that there is at least one value column and
    /// that every row carries one value per label.
    pub fn new(
        identifier_column: impl Into<String>,
        identifiers: Vec<String>,
        labels: Vec<String>,
        values: Vec<Vec<i64>>,
    ) -> TableResult<Self> {
        let identifier_column = identifier_column.into();
        if labels.is_empty() {
            return Err(TableError::malformed(
                "raw table",
                "table has no value columns",
            ));
        }
        if identifiers.len() != values.len() {
            return Err(TableError::malformed(
                "raw table",
                format!(
                    "{} identifiers for {} value rows",
                    identifiers.len(),
                    values.len()
                ),
            ));
        }
        if let Some((row, vals)) = values
            .iter()
            .enumerate()
            .find(|(_, vals)| vals.len() != labels.len())
        {
            return Err(TableError::malformed(
                "raw table",
                format!(
                    "row {} has {} values, expected {}",
                    row + 1,
                    vals.len(),
                    labels.len()
                ),
            ));
        }

        Ok(Self {
            identifier_column,
            identifiers,
            labels,
            values,
        })
    }

    pub fn identifier_column(&self) -> &str {
        &self.identifier_column
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn row_count(&self) -> usize {
        self.identifiers.len()
    }

    pub fn column_count(&self) -> usize {
        self.labels.len()
    }

    /// Label of the newest value column.
    pub fn latest_label(&self) -> &str {
        // `new` guarantees at least one label
        &self.labels[self.labels.len() - 1]
    }

    /// Position of the first column whose label equals `label` exactly.
    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Values of one row, oldest to newest.
    pub fn row(&self, row: usize) -> &[i64] {
        &self.values[row]
    }

    pub fn value(&self, row: usize, col: usize) -> i64 {
        self.values[row][col]
    }
}

/// Open `path` and parse it as a wide case table.
#[tracing::instrument(level = "info", skip(path, options), fields(path = %path.as_ref().display()))]
pub fn load_table<P: AsRef<Path>>(path: P, options: &ReaderOptions) -> TableResult<RawTable> {
    let origin = path.as_ref().display().to_string();
    let file = File::open(path.as_ref()).map_err(|source| TableError::SourceUnavailable {
        origin: origin.clone(),
        source,
    })?;

    let table = read_table(BufReader::new(file), &origin, options)?;
    info!(
        rows = table.row_count(),
        columns = table.column_count(),
        latest = %table.latest_label(),
        "loaded table"
    );
    Ok(table)
}

/// Parse a wide case table from any reader. `origin` only labels errors.
pub fn read_table<R: Read>(
    reader: R,
    origin: &str,
    options: &ReaderOptions,
) -> TableResult<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // ragged rows are reported below with their row number
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| csv_error(origin, e))?
        .iter()
        .map(clean_header)
        .collect();

    let id_idx = headers
        .iter()
        .position(|h| *h == options.identifier_column)
        .ok_or_else(|| {
            TableError::malformed(
                origin,
                format!("identifier column '{}' not found", options.identifier_column),
            )
        })?;

    let value_idx: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(i, h)| *i != id_idx && !options.skip_columns.contains(h))
        .map(|(i, _)| i)
        .collect();
    if value_idx.is_empty() {
        return Err(TableError::malformed(origin, "table has no value columns"));
    }
    let labels: Vec<String> = value_idx.iter().map(|&i| headers[i].clone()).collect();
    debug!(
        identifier = %options.identifier_column,
        value_columns = labels.len(),
        skipped = headers.len() - labels.len() - 1,
        "resolved header"
    );

    let mut identifiers = Vec::new();
    let mut values = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| csv_error(origin, e))?;
        let row_no = idx + 1;
        if record.len() != headers.len() {
            return Err(TableError::malformed(
                origin,
                format!(
                    "row {} has {} fields, expected {}",
                    row_no,
                    record.len(),
                    headers.len()
                ),
            ));
        }

        identifiers.push(record[id_idx].trim().to_string());
        let row = value_idx
            .iter()
            .map(|&i| {
                parse_count(&record[i]).ok_or_else(|| {
                    TableError::malformed(
                        origin,
                        format!(
                            "row {} column '{}': '{}' is not an integer count",
                            row_no, headers[i], &record[i]
                        ),
                    )
                })
            })
            .collect::<TableResult<Vec<i64>>>()?;
        values.push(row);
    }

    RawTable::new(options.identifier_column.clone(), identifiers, labels, values)
}

fn clean_header(raw: &str) -> String {
    raw.trim().trim_start_matches('\u{feff}').to_string()
}

fn parse_count(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

fn csv_error(origin: &str, err: csv::Error) -> TableError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => TableError::SourceUnavailable {
            origin: origin.to_string(),
            source,
        },
        _ => TableError::malformed(origin, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,casescraper::table=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    const SAMPLE: &str = "Province/State,Country/Region,Lat,Long,1/1/22,1/2/22,1/3/22
,Russia,61.52,105.31,100,120,150
Ontario,Canada,51.25,-85.32,10,15,20
Quebec,Canada,52.93,-73.54,5,5,8
";

    #[test]
    fn loads_table_and_skips_metadata_columns() -> Result<()> {
        init_test_logging();
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(SAMPLE.as_bytes())?;

        let table = load_table(tmp.path(), &ReaderOptions::default())?;

        assert_eq!(table.identifier_column(), "Country/Region");
        assert_eq!(table.identifiers(), ["Russia", "Canada", "Canada"]);
        assert_eq!(table.labels(), ["1/1/22", "1/2/22", "1/3/22"]);
        assert_eq!(table.row(0), [100, 120, 150]);
        assert_eq!(table.value(2, 2), 8);
        assert_eq!(table.latest_label(), "1/3/22");
        assert_eq!(table.column_index("1/2/22"), Some(1));
        assert_eq!(table.column_index("01/02/22"), None);
        Ok(())
    }

    #[test]
    fn bare_layout_needs_no_skip_list() -> Result<()> {
        let content = "Country/Region,1/1/2022,1/2/2022,1/3/2022\nX,10,15,20\n";
        let table = read_table(content.as_bytes(), "inline", &ReaderOptions::default())?;
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.row(0), [10, 15, 20]);
        Ok(())
    }

    #[test]
    fn strips_byte_order_mark_from_header() -> Result<()> {
        let content = "\u{feff}Country/Region,1/1/22\nX,3\n";
        let table = read_table(content.as_bytes(), "inline", &ReaderOptions::default())?;
        assert_eq!(table.identifiers(), ["X"]);
        Ok(())
    }

    #[test]
    fn custom_identifier_column() -> Result<()> {
        let options = ReaderOptions {
            identifier_column: "Admin2".to_string(),
            skip_columns: vec!["FIPS".to_string()],
        };
        let content = "FIPS,Admin2,1/1/22\n1001,Autauga,4\n";
        let table = read_table(content.as_bytes(), "inline", &options)?;
        assert_eq!(table.identifier_column(), "Admin2");
        assert_eq!(table.identifiers(), ["Autauga"]);
        assert_eq!(table.labels(), ["1/1/22"]);
        Ok(())
    }

    #[test]
    fn missing_file_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_table(dir.path().join("absent.csv"), &ReaderOptions::default())
            .unwrap_err();
        assert!(matches!(err, TableError::SourceUnavailable { .. }));
    }

    #[test]
    fn missing_identifier_column_is_malformed() {
        let content = "Region,1/1/22\nX,1\n";
        let err = read_table(content.as_bytes(), "inline", &ReaderOptions::default())
            .unwrap_err();
        match err {
            TableError::MalformedTable { reason, .. } => {
                assert!(reason.contains("Country/Region"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_value_columns_is_malformed() {
        let content = "Province/State,Country/Region,Lat,Long\n,X,1.0,2.0\n";
        let err = read_table(content.as_bytes(), "inline", &ReaderOptions::default())
            .unwrap_err();
        assert!(matches!(err, TableError::MalformedTable { .. }));
    }

    #[test]
    fn empty_input_is_malformed() {
        let err = read_table("".as_bytes(), "inline", &ReaderOptions::default()).unwrap_err();
        assert!(matches!(err, TableError::MalformedTable { .. }));
    }

    #[test]
    fn non_integer_cell_is_malformed() {
        let content = "Country/Region,1/1/22,1/2/22\nX,1,\n";
        let err = read_table(content.as_bytes(), "inline", &ReaderOptions::default())
            .unwrap_err();
        match err {
            TableError::MalformedTable { reason, .. } => {
                assert!(reason.contains("row 1"));
                assert!(reason.contains("1/2/22"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ragged_row_is_malformed() {
        let content = "Country/Region,1/1/22,1/2/22\nX,1,2\nY,3\n";
        let err = read_table(content.as_bytes(), "inline", &ReaderOptions::default())
            .unwrap_err();
        match err {
            TableError::MalformedTable { reason, .. } => assert!(reason.contains("row 2")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reloading_yields_equal_but_independent_tables() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(SAMPLE.as_bytes())?;

        let first = load_table(tmp.path(), &ReaderOptions::default())?;
        let second = load_table(tmp.path(), &ReaderOptions::default())?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn constructor_rejects_short_rows() {
        let err = RawTable::new(
            "Country/Region",
            vec!["X".to_string()],
            vec!["1/1/22".to_string(), "1/2/22".to_string()],
            vec![vec![1]],
        )
        .unwrap_err();
        assert!(matches!(err, TableError::MalformedTable { .. }));
    }
}
