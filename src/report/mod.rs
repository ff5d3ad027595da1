// src/report/mod.rs
use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use std::{collections::BTreeMap, io::Write};

use crate::analyze::DerivedTable;

/// Receives derived tables and region mappings for display.
pub trait Presenter {
    fn present_table(&mut self, title: &str, table: &DerivedTable) -> Result<()>;
    fn present_mapping(&mut self, title: &str, mapping: &BTreeMap<String, i64>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MappingFormat {
    #[default]
    Grid,
    Json,
}

/// Writes ASCII grids (and optionally JSON mappings) to any writer.
pub struct TextPresenter<W: Write> {
    out: W,
    mapping_format: MappingFormat,
}

impl<W: Write> TextPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            mapping_format: MappingFormat::Grid,
        }
    }

    pub fn with_mapping_format(mut self, format: MappingFormat) -> Self {
        self.mapping_format = format;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for TextPresenter<W> {
    fn present_table(&mut self, title: &str, table: &DerivedTable) -> Result<()> {
        let grid = render_table(table)?;
        writeln!(self.out, "{title}")?;
        writeln!(self.out, "{grid}")?;
        Ok(())
    }

    fn present_mapping(&mut self, title: &str, mapping: &BTreeMap<String, i64>) -> Result<()> {
        let body = match self.mapping_format {
            MappingFormat::Grid => render_mapping(mapping)?,
            MappingFormat::Json => mapping_to_json(mapping)?,
        };
        writeln!(self.out, "{title}")?;
        writeln!(self.out, "{body}")?;
        Ok(())
    }
}

/// Rows-by-columns grid, identifier first.
pub fn render_table(table: &DerivedTable) -> Result<String> {
    let batch = table
        .to_record_batch()
        .context("converting derived table to record batch")?;
    Ok(pretty_format_batches(&[batch])?.to_string())
}

/// Two-column grid: `region | value`, in key order.
pub fn render_mapping(mapping: &BTreeMap<String, i64>) -> Result<String> {
    let table = DerivedTable::from_columns(
        "region",
        mapping.keys().cloned().collect(),
        vec![("value".to_string(), mapping.values().copied().collect())],
    );
    render_table(&table)
}

pub fn mapping_to_json(mapping: &BTreeMap<String, i64>) -> Result<String> {
    serde_json::to_string_pretty(mapping).context("serialising mapping")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::Analyzer;
    use crate::table::{read_table, ReaderOptions, RawTable};

    fn table() -> RawTable {
        let content = "Country/Region,1/1/2022,1/2/2022,1/3/2022\nX,10,15,20\nY,7,7,9\n";
        read_table(content.as_bytes(), "inline", &ReaderOptions::default()).unwrap()
    }

    #[test]
    fn renders_window_as_grid() -> Result<()> {
        let raw = table();
        let window = Analyzer::new(&raw).totals_window(2)?;
        let grid = render_table(&window)?;

        let header = grid.lines().nth(1).unwrap();
        assert!(header.contains("Country/Region"));
        assert_eq!(header.matches("1/3/2022").count(), 2);
        assert!(grid.lines().any(|l| l.contains("| X ") && l.contains("| 15 ")));
        // two data rows, three separators, one header
        assert_eq!(grid.lines().count(), 6);
        Ok(())
    }

    #[test]
    fn presents_mapping_as_grid_and_json() -> Result<()> {
        let raw = table();
        let mapping = Analyzer::new(&raw).totals_for_many(&["Y", "X", "Z"]);

        let mut grid = TextPresenter::new(Vec::new());
        grid.present_mapping("totals", &mapping)?;
        let text = String::from_utf8(grid.into_inner())?;
        assert!(text.starts_with("totals\n"));
        assert!(text.contains("region"));
        assert!(!text.contains("| Z "));

        let mut json = TextPresenter::new(Vec::new()).with_mapping_format(MappingFormat::Json);
        json.present_mapping("totals", &mapping)?;
        let text = String::from_utf8(json.into_inner())?;
        let body: BTreeMap<String, i64> = serde_json::from_str(text.trim_start_matches("totals\n"))?;
        assert_eq!(body, mapping);
        Ok(())
    }

    #[test]
    fn presents_table_with_title() -> Result<()> {
        let raw = table();
        let mut presenter = TextPresenter::new(Vec::new());
        presenter.present_table("latest", &Analyzer::new(&raw).latest_totals())?;
        let text = String::from_utf8(presenter.into_inner())?;
        assert!(text.starts_with("latest\n+"));
        assert!(text.contains("| Y "));
        Ok(())
    }
}
