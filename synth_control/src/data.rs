//! Long-format consumption records and their loaders

use crate::error::{Result, SynthError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::Path;

/// Timestamp formats accepted for textual `date_time` values
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M",
];

/// A single consumption reading for one house at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    /// House identifier
    pub house_id: String,
    /// Start of the reading interval
    pub date_time: NaiveDateTime,
    /// Energy consumed in the interval; `None` when the reading is missing
    pub consumption: Option<f64>,
    /// Whether the house belongs to the treatment group
    pub treated: bool,
    /// Demographic label of the house
    pub acorn_category: Option<String>,
}

impl ConsumptionRecord {
    /// Create a record without a demographic label
    pub fn new(
        house_id: impl Into<String>,
        date_time: NaiveDateTime,
        consumption: Option<f64>,
        treated: bool,
    ) -> Self {
        Self {
            house_id: house_id.into(),
            date_time,
            consumption,
            treated,
            acorn_category: None,
        }
    }

    /// Attach a demographic label
    pub fn with_acorn(mut self, category: impl Into<String>) -> Self {
        self.acorn_category = Some(category.into());
        self
    }

    /// Consumption value, treating NaN the same as an absent reading
    pub fn value(&self) -> Option<f64> {
        self.consumption.filter(|v| !v.is_nan())
    }
}

/// Names of the input columns holding each record attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub date_time: String,
    pub house_id: String,
    pub consumption: String,
    pub treated: String,
    pub acorn_category: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            date_time: "date_time".to_string(),
            house_id: "house_id".to_string(),
            consumption: "KWH/hh".to_string(),
            treated: "treated".to_string(),
            acorn_category: "acorn_category".to_string(),
        }
    }
}

/// An owned collection of consumption records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: Vec<ConsumptionRecord>,
}

impl RecordSet {
    /// Create an empty record set
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing records
    pub fn from_records(records: Vec<ConsumptionRecord>) -> Self {
        Self { records }
    }

    /// Append a record
    pub fn push(&mut self, record: ConsumptionRecord) {
        self.records.push(record);
    }

    /// Borrow the records
    pub fn records(&self) -> &[ConsumptionRecord] {
        &self.records
    }

    /// Iterate over the records
    pub fn iter(&self) -> std::slice::Iter<'_, ConsumptionRecord> {
        self.records.iter()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if there are no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted unique house identifiers
    pub fn house_ids(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.house_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Keep only the records matching a predicate
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&ConsumptionRecord) -> bool,
    {
        Self {
            records: self.records.iter().filter(|r| predicate(r)).cloned().collect(),
        }
    }

    /// Records of houses in the given demographic category
    pub fn filter_by_acorn(&self, category: &str) -> Self {
        self.filter(|r| r.acorn_category.as_deref() == Some(category))
    }

    /// Records with `start <= date_time < end`
    pub fn within(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start >= end {
            return Err(SynthError::InvalidParameter(format!(
                "Period start ({}) must be before its end ({})",
                start, end
            )));
        }
        Ok(self.filter(|r| r.date_time >= start && r.date_time < end))
    }

    /// Check that `treated` and `acorn_category` are constant per house
    pub fn validate_house_attributes(&self) -> Result<()> {
        let mut seen: HashMap<&str, (bool, Option<&str>)> = HashMap::new();

        for record in &self.records {
            let attrs = (record.treated, record.acorn_category.as_deref());
            match seen.get(record.house_id.as_str()) {
                None => {
                    seen.insert(record.house_id.as_str(), attrs);
                }
                Some(&(treated, _)) if treated != attrs.0 => {
                    return Err(SynthError::InconsistentHouse {
                        house_id: record.house_id.clone(),
                        detail: "treatment flag differs between records".to_string(),
                    });
                }
                Some(&(_, acorn)) if acorn != attrs.1 => {
                    return Err(SynthError::InconsistentHouse {
                        house_id: record.house_id.clone(),
                        detail: format!(
                            "acorn category differs between records ({:?} vs {:?})",
                            acorn, attrs.1
                        ),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

impl FromIterator<ConsumptionRecord> for RecordSet {
    fn from_iter<I: IntoIterator<Item = ConsumptionRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a ConsumptionRecord;
    type IntoIter = std::slice::Iter<'a, ConsumptionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Data loader for consumption records
#[derive(Debug)]
pub struct RecordLoader;

impl RecordLoader {
    /// Load records from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, columns: &ColumnNames) -> Result<RecordSet> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        Self::from_dataframe(&df, columns)
    }

    /// Convert an existing DataFrame into records
    pub fn from_dataframe(df: &DataFrame, columns: &ColumnNames) -> Result<RecordSet> {
        let times = Self::timestamps(Self::column(df, &columns.date_time)?)?;

        let houses = Self::column(df, &columns.house_id)?.cast(&DataType::Utf8)?;
        let houses: Vec<Option<&str>> = houses.utf8()?.into_iter().collect();

        let values = Self::column(df, &columns.consumption)?.cast(&DataType::Float64)?;
        let values: Vec<Option<f64>> = values.f64()?.into_iter().collect();

        let flags = Self::column(df, &columns.treated)?.cast(&DataType::Utf8)?;
        let flags: Vec<Option<&str>> = flags.utf8()?.into_iter().collect();

        // The demographic column is optional
        let acorn = match df.column(&columns.acorn_category) {
            Ok(series) => Some(series.cast(&DataType::Utf8)?),
            Err(_) => None,
        };
        let acorn: Option<Vec<Option<&str>>> = match &acorn {
            Some(series) => Some(series.utf8()?.into_iter().collect()),
            None => None,
        };

        let mut records = Vec::with_capacity(df.height());
        for (row, date_time) in times.into_iter().enumerate() {
            let house_id = houses[row].ok_or_else(|| {
                SynthError::DataError(format!("Row {}: missing house identifier", row))
            })?;
            let flag = flags[row].ok_or_else(|| {
                SynthError::DataError(format!("Row {}: missing treatment flag", row))
            })?;

            records.push(ConsumptionRecord {
                house_id: house_id.to_string(),
                date_time,
                consumption: values[row],
                treated: parse_flag(flag)?,
                acorn_category: acorn
                    .as_ref()
                    .and_then(|labels| labels[row])
                    .map(str::to_string),
            });
        }

        log::debug!(
            "loaded {} records with columns {:?}",
            records.len(),
            df.get_column_names()
        );

        Ok(RecordSet::from_records(records))
    }

    fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
        df.column(name)
            .map_err(|e| SynthError::DataError(format!("Column '{}' not found: {}", name, e)))
    }

    /// Read a time column stored as text, `Date` or `Datetime`
    fn timestamps(series: &Series) -> Result<Vec<NaiveDateTime>> {
        let name = series.name().to_string();
        let missing = |row: usize| {
            SynthError::DataError(format!("Row {}: missing timestamp in '{}'", row, name))
        };

        match series.dtype() {
            DataType::Datetime(unit, _) => {
                let unit = *unit;
                let raw = series.cast(&DataType::Int64)?;
                let raw = raw.i64()?;
                raw.into_iter()
                    .enumerate()
                    .map(|(row, value)| {
                        let value = value.ok_or_else(|| missing(row))?;
                        from_epoch(value, unit).ok_or_else(|| {
                            SynthError::ParseError(format!(
                                "Row {}: timestamp {} out of range",
                                row, value
                            ))
                        })
                    })
                    .collect()
            }
            DataType::Date => {
                let raw = series.cast(&DataType::Int32)?;
                let raw = raw.i32()?;
                raw.into_iter()
                    .enumerate()
                    .map(|(row, days)| {
                        let days = days.ok_or_else(|| missing(row))?;
                        NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
                            .and_then(|d| d.and_hms_opt(0, 0, 0))
                            .ok_or_else(|| {
                                SynthError::ParseError(format!(
                                    "Row {}: date {} out of range",
                                    row, days
                                ))
                            })
                    })
                    .collect()
            }
            _ => {
                let text = series.cast(&DataType::Utf8)?;
                let text = text.utf8()?;
                text.into_iter()
                    .enumerate()
                    .map(|(row, value)| parse_timestamp(value.ok_or_else(|| missing(row))?))
                    .collect()
            }
        }
    }
}

/// Days between 0001-01-01 and 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn from_epoch(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let (secs, nanos) = match unit {
        TimeUnit::Nanoseconds => (value.div_euclid(1_000_000_000), value.rem_euclid(1_000_000_000)),
        TimeUnit::Microseconds => (
            value.div_euclid(1_000_000),
            value.rem_euclid(1_000_000) * 1_000,
        ),
        TimeUnit::Milliseconds => (value.div_euclid(1_000), value.rem_euclid(1_000) * 1_000_000),
    };
    DateTime::<Utc>::from_timestamp(secs, nanos as u32).map(|dt| dt.naive_utc())
}

/// Parse a textual timestamp
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]`, `YYYY-MM-DDTHH:MM:SS[.f]`,
/// `YYYY-MM-DD HH:MM`, `DD/MM/YYYY HH:MM` and bare dates (midnight).
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_utc());
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }

    Err(SynthError::ParseError(format!(
        "Unrecognised timestamp '{}'",
        value
    )))
}

/// Parse a treatment flag from its textual form
pub fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" | "1.0" => Ok(true),
        "false" | "f" | "no" | "n" | "0" | "0.0" => Ok(false),
        other => Err(SynthError::ParseError(format!(
            "Unrecognised treatment flag '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2013, 1, 1)
            .unwrap()
            .and_hms_opt(0, 30, 0)
            .unwrap();

        assert_eq!(parse_timestamp("2013-01-01 00:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2013-01-01T00:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2013-01-01 00:30:00.0000000").unwrap(), expected);
        assert_eq!(parse_timestamp("2013-01-01T00:30:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("01/01/2013 00:30").unwrap(), expected);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("True").unwrap());
        assert!(parse_flag("1").unwrap());
        assert!(!parse_flag("false").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    fn test_from_epoch_units() {
        let expected = NaiveDate::from_ymd_opt(2012, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let secs = expected.and_utc().timestamp();

        assert_eq!(from_epoch(secs * 1_000, TimeUnit::Milliseconds), Some(expected));
        assert_eq!(from_epoch(secs * 1_000_000, TimeUnit::Microseconds), Some(expected));
        assert_eq!(
            from_epoch(secs * 1_000_000_000, TimeUnit::Nanoseconds),
            Some(expected)
        );
    }
}
