// src/analyze/mod.rs
pub mod derived;

pub use derived::DerivedTable;

use serde::Deserialize;
use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    str::FromStr,
};
use tracing::debug;

use crate::error::{TableError, TableResult};
use crate::table::RawTable;

/// What to do when one identifier names several rows (e.g. a country
/// reported per province).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    #[default]
    #[serde(rename = "first")]
    KeepFirst,
    #[serde(rename = "last")]
    KeepLast,
    /// Add the rows together column by column.
    Sum,
    /// Refuse tables with repeated identifiers.
    Reject,
}

impl DuplicatePolicy {
    /// Merge rows sharing an identifier. `rows` must be non-empty.
    /// `Sum` saturates at the `i64` bounds.
    pub(crate) fn merge(self, rows: &[&[i64]]) -> Vec<i64> {
        match self {
            DuplicatePolicy::KeepFirst | DuplicatePolicy::Reject => rows[0].to_vec(),
            DuplicatePolicy::KeepLast => rows[rows.len() - 1].to_vec(),
            DuplicatePolicy::Sum => {
                let mut acc = vec![0i64; rows[0].len()];
                for row in rows {
                    for (a, v) in acc.iter_mut().zip(row.iter()) {
                        *a = a.saturating_add(*v);
                    }
                }
                acc
            }
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(DuplicatePolicy::KeepFirst),
            "last" => Ok(DuplicatePolicy::KeepLast),
            "sum" => Ok(DuplicatePolicy::Sum),
            "reject" => Ok(DuplicatePolicy::Reject),
            other => Err(format!(
                "unknown duplicate policy '{other}' (expected first, last, sum or reject)"
            )),
        }
    }
}

/// A single region's value from a latest-totals or latest-deltas lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionValue {
    pub region: String,
    pub value: i64,
}

impl fmt::Display for RegionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.region, self.value)
    }
}

/// Derivations over one loaded table.
///
/// Every method is a pure function of the borrowed table; results are built
/// fresh on each call. The analyzer holds no mutable state and can be shared
/// across threads.
#[derive(Debug, Clone, Copy)]
pub struct Analyzer<'a> {
    table: &'a RawTable,
    policy: DuplicatePolicy,
}

impl<'a> Analyzer<'a> {
    /// Analyzer resolving repeated identifiers to their first row.
    pub fn new(table: &'a RawTable) -> Self {
        Self {
            table,
            policy: DuplicatePolicy::KeepFirst,
        }
    }

    /// Fails with `DuplicateIdentifier` under `Reject` if any identifier repeats.
    pub fn with_policy(table: &'a RawTable, policy: DuplicatePolicy) -> TableResult<Self> {
        if policy == DuplicatePolicy::Reject {
            let mut seen = HashSet::with_capacity(table.row_count());
            if let Some(dup) = table.identifiers().iter().find(|id| !seen.insert(id.as_str())) {
                return Err(TableError::DuplicateIdentifier {
                    identifier: dup.clone(),
                });
            }
        }
        Ok(Self { table, policy })
    }

    pub fn table(&self) -> &'a RawTable {
        self.table
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Region names in row order.
    pub fn identifiers(&self) -> &'a [String] {
        self.table.identifiers()
    }

    /// Region → newest cumulative count.
    pub fn latest_totals(&self) -> DerivedTable {
        self.select(&[self.last_col()])
    }

    pub fn total_for(&self, identifier: &str) -> Option<RegionValue> {
        let value = self
            .latest_totals()
            .lookup(identifier, self.policy)
            .map(|row| row[0]);
        if value.is_none() {
            debug!(region = identifier, "no total for region");
        }
        value.map(|value| RegionValue {
            region: identifier.to_string(),
            value,
        })
    }

    /// Totals for each known region in `identifiers`; unknown ones are left out.
    /// Keys come back sorted by region name, not in request order.
    pub fn totals_for_many<S: AsRef<str>>(&self, identifiers: &[S]) -> BTreeMap<String, i64> {
        let mut merged = BTreeMap::new();
        for id in identifiers {
            if let Some(hit) = self.total_for(id.as_ref()) {
                merged.insert(hit.region, hit.value);
            }
        }
        merged
    }

    /// Region → newest column minus the one before it.
    pub fn latest_deltas(&self) -> TableResult<DerivedTable> {
        let count = self.table.column_count();
        if count < 2 {
            return Err(TableError::InsufficientColumns {
                requested: 2,
                available: count,
            });
        }
        Ok(self.differences(&[(count - 2, count - 1)]))
    }

    pub fn delta_for(&self, identifier: &str) -> TableResult<Option<RegionValue>> {
        let value = self
            .latest_deltas()?
            .lookup(identifier, self.policy)
            .map(|row| row[0]);
        if value.is_none() {
            debug!(region = identifier, "no delta for region");
        }
        Ok(value.map(|value| RegionValue {
            region: identifier.to_string(),
            value,
        }))
    }

    /// Deltas for each known region, keyed and sorted like
    /// [`totals_for_many`](Self::totals_for_many).
    pub fn deltas_for_many<S: AsRef<str>>(
        &self,
        identifiers: &[S],
    ) -> TableResult<BTreeMap<String, i64>> {
        let mut merged = BTreeMap::new();
        for id in identifiers {
            if let Some(hit) = self.delta_for(id.as_ref())? {
                merged.insert(hit.region, hit.value);
            }
        }
        Ok(merged)
    }

    /// Region → value of the column labelled exactly `label`.
    pub fn slice_by_date(&self, label: &str) -> Option<DerivedTable> {
        match self.table.column_index(label) {
            Some(col) => Some(self.select(&[col])),
            None => {
                debug!(label, "no column with this label");
                None
            }
        }
    }

    /// Same as [`slice_by_date`](Self::slice_by_date) with the label built as
    /// `M/D/Y`, no zero padding. The year is used as given (`22` vs `2022`).
    pub fn slice_by_day(&self, month: u32, day: u32, year: u32) -> Option<DerivedTable> {
        self.slice_by_date(&format!("{month}/{day}/{year}"))
    }

    /// The newest `n` columns, oldest first, followed by the newest column
    /// once more: `n + 1` columns in total.
    pub fn totals_window(&self, n: usize) -> TableResult<DerivedTable> {
        let count = self.table.column_count();
        self.check_window(n, count)?;

        let mut cols: Vec<usize> = (count - n..count).collect();
        cols.push(count - 1);
        debug!(n, columns = cols.len(), "totals window");
        Ok(self.select(&cols))
    }

    /// `n` day-over-day changes, each labelled with the newer day.
    /// Differences saturate at the `i64` bounds.
    pub fn deltas_window(&self, n: usize) -> TableResult<DerivedTable> {
        if n == 0 {
            return Err(TableError::EmptyWindow);
        }
        let available = self.table.column_count();
        if n >= available {
            return Err(TableError::InsufficientColumns {
                requested: n.saturating_add(1),
                available,
            });
        }
        let totals = self.totals_window(n + 1)?;

        let index = totals.index().to_vec();
        let columns = (0..n)
            .map(|i| {
                let older = totals.column(i);
                let newer = totals.column(i + 1);
                let diff: Vec<i64> = newer
                    .iter()
                    .zip(&older)
                    .map(|(b, a)| b.saturating_sub(*a))
                    .collect();
                (totals.columns()[i + 1].clone(), diff)
            })
            .collect();
        debug!(n, "deltas window");
        Ok(DerivedTable::from_columns(
            totals.index_name(),
            index,
            columns,
        ))
    }

    fn last_col(&self) -> usize {
        self.table.column_count() - 1
    }

    fn check_window(&self, n: usize, available: usize) -> TableResult<()> {
        if n == 0 {
            return Err(TableError::EmptyWindow);
        }
        if n > available {
            return Err(TableError::InsufficientColumns {
                requested: n,
                available,
            });
        }
        Ok(())
    }

    /// Attach raw columns `cols` (in the given order) to the identifiers.
    fn select(&self, cols: &[usize]) -> DerivedTable {
        let rows = self.table.row_count();
        let columns = cols
            .iter()
            .map(|&col| {
                let values: Vec<i64> = (0..rows).map(|row| self.table.value(row, col)).collect();
                (self.table.labels()[col].clone(), values)
            })
            .collect();
        DerivedTable::from_columns(
            self.table.identifier_column(),
            self.table.identifiers().to_vec(),
            columns,
        )
    }

    /// One column per `(older, newer)` pair: `newer - older` (saturating),
    /// labelled `newer`.
    fn differences(&self, pairs: &[(usize, usize)]) -> DerivedTable {
        let rows = self.table.row_count();
        let columns = pairs
            .iter()
            .map(|&(older, newer)| {
                let values: Vec<i64> = (0..rows)
                    .map(|row| {
                        self.table
                            .value(row, newer)
                            .saturating_sub(self.table.value(row, older))
                    })
                    .collect();
                (self.table.labels()[newer].clone(), values)
            })
            .collect();
        DerivedTable::from_columns(
            self.table.identifier_column(),
            self.table.identifiers().to_vec(),
            columns,
        )
    }
}
