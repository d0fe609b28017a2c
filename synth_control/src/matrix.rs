//! Wide time × house consumption matrices
//!
//! A [`ConsumptionMatrix`] pairs a dense `nalgebra` matrix with a timestamp
//! row index and a house-id column index. Missing cells are stored as `NaN`,
//! and any non-finite cell counts as missing.

use crate::error::{Result, SynthError};
use chrono::NaiveDateTime;
use nalgebra::{DMatrix, DVector};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Format used for the row index when exporting
const EXPORT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Consumption values indexed by timestamp (rows) and house (columns)
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionMatrix {
    index: Vec<NaiveDateTime>,
    columns: Vec<String>,
    values: DMatrix<f64>,
}

impl ConsumptionMatrix {
    /// Create a matrix, checking that labels match the value dimensions and are unique
    pub fn new(
        index: Vec<NaiveDateTime>,
        columns: Vec<String>,
        values: DMatrix<f64>,
    ) -> Result<Self> {
        if values.nrows() != index.len() || values.ncols() != columns.len() {
            return Err(SynthError::ShapeMismatch(format!(
                "values are {}x{} but labels describe {}x{}",
                values.nrows(),
                values.ncols(),
                index.len(),
                columns.len()
            )));
        }

        let mut seen_times = HashSet::with_capacity(index.len());
        if let Some(dup) = index.iter().find(|t| !seen_times.insert(**t)) {
            return Err(SynthError::DataError(format!(
                "Duplicate timestamp {} in row index",
                dup
            )));
        }

        let mut seen_houses = HashSet::with_capacity(columns.len());
        if let Some(dup) = columns.iter().find(|c| !seen_houses.insert(c.as_str())) {
            return Err(SynthError::DataError(format!(
                "Duplicate house '{}' in column index",
                dup
            )));
        }

        Ok(Self {
            index,
            columns,
            values,
        })
    }

    /// Create a matrix from row vectors (mainly for tests and small panels)
    pub fn from_rows(
        index: Vec<NaiveDateTime>,
        columns: Vec<String>,
        rows: &[Vec<f64>],
    ) -> Result<Self> {
        let ncols = columns.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
            return Err(SynthError::ShapeMismatch(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                ncols
            )));
        }

        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let values = DMatrix::from_row_slice(rows.len(), ncols, &flat);
        Self::new(index, columns, values)
    }

    /// Row index (timestamps)
    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    /// Column index (house identifiers)
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Underlying values
    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    /// Consume the matrix and return its parts
    pub fn into_parts(self) -> (Vec<NaiveDateTime>, Vec<String>, DMatrix<f64>) {
        (self.index, self.columns, self.values)
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        self.values.shape()
    }

    /// Check if the matrix has no cells
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position of a house in the column index
    pub fn column_position(&self, house_id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == house_id)
    }

    /// Value at a timestamp and house; `None` if either label is absent or the cell is missing
    pub fn get(&self, date_time: &NaiveDateTime, house_id: &str) -> Option<f64> {
        let row = self.index.iter().position(|t| t == date_time)?;
        let col = self.column_position(house_id)?;
        let value = self.values[(row, col)];
        value.is_finite().then_some(value)
    }

    /// All values of one house in row order
    pub fn column_values(&self, house_id: &str) -> Option<Vec<f64>> {
        let col = self.column_position(house_id)?;
        Some(self.values.column(col).iter().copied().collect())
    }

    /// Number of missing or non-finite cells in each column
    pub fn missing_per_column(&self) -> Vec<usize> {
        self.values
            .column_iter()
            .map(|col| col.iter().filter(|v| !v.is_finite()).count())
            .collect()
    }

    /// Number of missing or non-finite cells
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_finite()).count()
    }

    /// True when every cell holds a finite value
    pub fn is_dense(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Keep the columns whose house id satisfies the predicate, preserving order
    pub fn retain_columns<F>(&self, keep: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let positions: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| keep(c))
            .map(|(i, _)| i)
            .collect();
        self.take_columns(&positions)
    }

    /// Keep the rows whose timestamp satisfies the predicate, preserving order
    pub fn retain_rows<F>(&self, keep: F) -> Self
    where
        F: Fn(&NaiveDateTime) -> bool,
    {
        let rows: Vec<usize> = (0..self.nrows())
            .filter(|&i| keep(&self.index[i]))
            .collect();
        Self {
            index: rows.iter().map(|&i| self.index[i]).collect(),
            columns: self.columns.clone(),
            values: self.values.select_rows(&rows),
        }
    }

    /// Select houses in the given order; every house must exist
    pub fn select_columns(&self, houses: &[String]) -> Result<Self> {
        let lookup: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let positions = houses
            .iter()
            .map(|h| {
                lookup.get(h.as_str()).copied().ok_or_else(|| {
                    SynthError::HouseMismatch(format!("house '{}' is not in the matrix", h))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if positions.len() != positions.iter().collect::<HashSet<_>>().len() {
            return Err(SynthError::InvalidParameter(
                "house selection contains duplicates".to_string(),
            ));
        }

        Ok(self.take_columns(&positions))
    }

    /// Reorder columns to match `order`, which must be the same house set
    pub fn reindex_columns(&self, order: &[String]) -> Result<Self> {
        if order.len() != self.columns.len() {
            return Err(SynthError::HouseMismatch(format!(
                "cannot reindex {} houses onto {}",
                self.columns.len(),
                order.len()
            )));
        }
        self.select_columns(order)
    }

    /// Rows whose timestamp is in `times` and columns whose house is in `houses`, in existing order
    pub fn subset(&self, times: &[NaiveDateTime], houses: &[String]) -> Self {
        let times: HashSet<&NaiveDateTime> = times.iter().collect();
        let houses: HashSet<&str> = houses.iter().map(String::as_str).collect();

        let rows: Vec<usize> = (0..self.nrows())
            .filter(|&i| times.contains(&self.index[i]))
            .collect();
        let cols: Vec<usize> = (0..self.ncols())
            .filter(|&j| houses.contains(self.columns[j].as_str()))
            .collect();

        Self {
            index: rows.iter().map(|&i| self.index[i]).collect(),
            columns: cols.iter().map(|&j| self.columns[j].clone()).collect(),
            values: self.values.select_rows(&rows).select_columns(&cols),
        }
    }

    /// Replace the values while keeping the labels
    pub fn with_values(&self, values: DMatrix<f64>) -> Result<Self> {
        Self::new(self.index.clone(), self.columns.clone(), values)
    }

    /// Singular values of a dense matrix, in descending order
    pub fn singular_values(&self) -> Result<DVector<f64>> {
        if !self.is_dense() {
            return Err(SynthError::MissingValues {
                matrix: "singular value input".to_string(),
                count: self.missing_count(),
            });
        }
        if self.is_empty() {
            return Err(SynthError::EmptyMatrix(
                "cannot decompose an empty matrix".to_string(),
            ));
        }
        Ok(self.values.clone().singular_values())
    }

    /// Write the matrix as CSV with a `date_time` column followed by one column per house
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(file)
    }

    /// Write the matrix as CSV to any writer; missing cells are left empty
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);

        let mut header = Vec::with_capacity(self.ncols() + 1);
        header.push("date_time");
        header.extend(self.columns.iter().map(String::as_str));
        csv.write_record(&header)?;

        for (i, time) in self.index.iter().enumerate() {
            let mut record = Vec::with_capacity(self.ncols() + 1);
            record.push(time.format(EXPORT_TIME_FORMAT).to_string());
            for j in 0..self.ncols() {
                let value = self.values[(i, j)];
                record.push(if !value.is_finite() {
                    String::new()
                } else {
                    value.to_string()
                });
            }
            csv.write_record(&record)?;
        }

        csv.flush()?;
        Ok(())
    }

    fn take_columns(&self, positions: &[usize]) -> Self {
        Self {
            index: self.index.clone(),
            columns: positions.iter().map(|&j| self.columns[j].clone()).collect(),
            values: self.values.select_columns(positions),
        }
    }
}

impl std::fmt::Display for ConsumptionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "ConsumptionMatrix: {} timestamps x {} houses ({} missing)",
            self.nrows(),
            self.ncols(),
            self.missing_count()
        )
    }
}
