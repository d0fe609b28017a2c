//! Long-to-wide reshaping of consumption records

use crate::data::RecordSet;
use crate::error::{Result, SynthError};
use crate::matrix::ConsumptionMatrix;
use chrono::NaiveDateTime;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// What to do when two records share a timestamp and house
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail with [`SynthError::DuplicateReading`]
    #[default]
    Reject,
    /// Keep the value of the later record in input order
    LastValueWins,
}

/// Pivot records into a time × house matrix
///
/// Rows are the sorted unique timestamps and columns the sorted unique house
/// ids. Cells without a reading are `NaN`.
pub fn pivot(records: &RecordSet, duplicates: DuplicatePolicy) -> Result<ConsumptionMatrix> {
    let index: Vec<NaiveDateTime> = records
        .iter()
        .map(|r| r.date_time)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let columns = records.house_ids();

    let row_of: HashMap<NaiveDateTime, usize> =
        index.iter().enumerate().map(|(i, t)| (*t, i)).collect();
    let col_of: HashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .map(|(j, h)| (h.as_str(), j))
        .collect();

    let mut values = DMatrix::from_element(index.len(), columns.len(), f64::NAN);
    let mut filled = DMatrix::from_element(index.len(), columns.len(), false);

    for record in records {
        let i = row_of[&record.date_time];
        let j = col_of[record.house_id.as_str()];

        if filled[(i, j)] && duplicates == DuplicatePolicy::Reject {
            return Err(SynthError::DuplicateReading {
                house_id: record.house_id.clone(),
                date_time: record.date_time.to_string(),
            });
        }

        filled[(i, j)] = true;
        values[(i, j)] = record.value().unwrap_or(f64::NAN);
    }

    ConsumptionMatrix::new(index, columns, values)
}

/// Partition records into `(treatment, control)` by the treatment flag
pub fn split_by_treatment(records: &RecordSet) -> (RecordSet, RecordSet) {
    let (treatment, control): (Vec<_>, Vec<_>) =
        records.iter().cloned().partition(|r| r.treated);
    (
        RecordSet::from_records(treatment),
        RecordSet::from_records(control),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ConsumptionRecord;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 3, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_duplicate_policy() {
        let records = RecordSet::from_records(vec![
            ConsumptionRecord::new("MAC001", at(0), Some(1.0), false),
            ConsumptionRecord::new("MAC001", at(0), Some(2.0), false),
        ]);

        assert!(matches!(
            pivot(&records, DuplicatePolicy::Reject),
            Err(SynthError::DuplicateReading { .. })
        ));

        let matrix = pivot(&records, DuplicatePolicy::LastValueWins).unwrap();
        assert_eq!(matrix.shape(), (1, 1));
        assert_eq!(matrix.get(&at(0), "MAC001"), Some(2.0));
    }

    #[test]
    fn test_pivot_empty_records() {
        let matrix = pivot(&RecordSet::new(), DuplicatePolicy::Reject).unwrap();
        assert_eq!(matrix.shape(), (0, 0));
    }
}
