use arrow::{
    array::{ArrayRef, Int64Array, StringArray},
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use std::{collections::HashMap, sync::Arc};

use super::DuplicatePolicy;
use crate::error::{TableError, TableResult};

/// An identifier-indexed view over some of the raw table's columns.
///
/// Rows follow the raw table's order and duplicates are kept; use
/// [`DerivedTable::collapse`] to merge them. Column labels may repeat.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedTable {
    index_name: String,
    index: Vec<String>,
    columns: Vec<String>,
    /// Row-major, `values[row][col]`.
    values: Vec<Vec<i64>>,
}

impl DerivedTable {
    /// Attach `columns` (label, one value per index entry) to `index`.
    pub(crate) fn from_columns(
        index_name: impl Into<String>,
        index: Vec<String>,
        columns: Vec<(String, Vec<i64>)>,
    ) -> Self {
        let mut values = vec![Vec::with_capacity(columns.len()); index.len()];
        let mut labels = Vec::with_capacity(columns.len());
        for (label, column) in columns {
            debug_assert_eq!(column.len(), index.len());
            for (row, v) in values.iter_mut().zip(column) {
                row.push(v);
            }
            labels.push(label);
        }

        Self {
            index_name: index_name.into(),
            index,
            columns: labels,
            values,
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn index(&self) -> &[String] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.index.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row(&self, row: usize) -> &[i64] {
        &self.values[row]
    }

    /// Values of column `col` in row order.
    pub fn column(&self, col: usize) -> Vec<i64> {
        self.values.iter().map(|row| row[col]).collect()
    }

    /// First row indexed by `identifier`.
    pub fn get(&self, identifier: &str) -> Option<&[i64]> {
        self.index
            .iter()
            .position(|id| id == identifier)
            .map(|row| self.values[row].as_slice())
    }

    /// All rows indexed by `identifier`, merged according to `policy`.
    ///
    /// Under `Reject` a repeated identifier resolves to its first row; the
    /// analyzer refuses such tables up front.
    pub fn lookup(&self, identifier: &str, policy: DuplicatePolicy) -> Option<Vec<i64>> {
        let rows: Vec<&[i64]> = self
            .index
            .iter()
            .zip(&self.values)
            .filter(|(id, _)| id.as_str() == identifier)
            .map(|(_, row)| row.as_slice())
            .collect();
        if rows.is_empty() {
            None
        } else {
            Some(policy.merge(&rows))
        }
    }

    /// One row per distinct identifier, in order of first appearance.
    pub fn collapse(&self, policy: DuplicatePolicy) -> TableResult<DerivedTable> {
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, Vec<&[i64]>> = HashMap::new();
        for (id, row) in self.index.iter().zip(&self.values) {
            let group = groups.entry(id.as_str()).or_insert_with(|| {
                order.push(id.as_str());
                Vec::new()
            });
            group.push(row.as_slice());
        }

        let mut index = Vec::with_capacity(order.len());
        let mut values = Vec::with_capacity(order.len());
        for id in order {
            let rows = &groups[id];
            if rows.len() > 1 && policy == DuplicatePolicy::Reject {
                return Err(TableError::DuplicateIdentifier {
                    identifier: id.to_string(),
                });
            }
            index.push(id.to_string());
            values.push(policy.merge(rows));
        }

        Ok(DerivedTable {
            index_name: self.index_name.clone(),
            index,
            columns: self.columns.clone(),
            values,
        })
    }

    /// Utf8 identifier column followed by one Int64 column per value column.
    pub fn to_record_batch(&self) -> Result<RecordBatch, ArrowError> {
        let mut fields = Vec::with_capacity(self.columns.len() + 1);
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len() + 1);

        fields.push(Field::new(&self.index_name, DataType::Utf8, false));
        arrays.push(Arc::new(StringArray::from(self.index.clone())));
        for (col, label) in self.columns.iter().enumerate() {
            fields.push(Field::new(label, DataType::Int64, false));
            arrays.push(Arc::new(Int64Array::from(self.column(col))));
        }

        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
    }
}
