//! Missing-data handling for consumption matrices
//!
//! Two strategies are available and exactly one is applied to a matrix:
//! dropping houses with too many missing readings, or filling missing
//! readings with a statistic of the surrounding values.

use crate::error::{Result, SynthError};
use crate::matrix::ConsumptionMatrix;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};

/// Statistic used to fill missing cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStatistic {
    #[default]
    Median,
    Mean,
}

impl FillStatistic {
    /// Compute the statistic over the non-missing values; `NaN` when there are none
    pub fn compute(&self, values: &[f64]) -> f64 {
        let present: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if present.is_empty() {
            return f64::NAN;
        }

        match self {
            FillStatistic::Median => Data::new(present).median(),
            FillStatistic::Mean => present.iter().mean(),
        }
    }
}

/// Direction along which the fill statistic is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Across the houses of each timestamp
    #[default]
    Rows,
    /// Down the timestamps of each house
    Columns,
}

/// How missing readings are resolved before estimation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MissingDataStrategy {
    /// Drop houses whose missing fraction exceeds `threshold`
    Drop { threshold: f64 },
    /// Fill missing cells with `statistic` computed along `axis`
    Impute {
        #[serde(default)]
        statistic: FillStatistic,
        #[serde(default)]
        axis: Axis,
    },
}

impl Default for MissingDataStrategy {
    fn default() -> Self {
        MissingDataStrategy::Impute {
            statistic: FillStatistic::Median,
            axis: Axis::Rows,
        }
    }
}

impl MissingDataStrategy {
    /// Check the strategy parameters
    pub fn validate(&self) -> Result<()> {
        match self {
            MissingDataStrategy::Drop { threshold } => validate_threshold(*threshold),
            MissingDataStrategy::Impute { .. } => Ok(()),
        }
    }

    /// Apply the strategy to one matrix
    pub fn apply(&self, matrix: &ConsumptionMatrix) -> Result<ConsumptionMatrix> {
        match *self {
            MissingDataStrategy::Drop { threshold } => clean_house(matrix, threshold),
            MissingDataStrategy::Impute { statistic, axis } => impute(matrix, statistic, axis),
        }
    }
}

fn validate_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(SynthError::InvalidParameter(format!(
            "missing-data threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    Ok(())
}

/// Drop every house whose fraction of missing timestamps is strictly above `threshold`
///
/// Rows are never removed. A matrix without rows keeps all of its columns.
pub fn clean_house(matrix: &ConsumptionMatrix, threshold: f64) -> Result<ConsumptionMatrix> {
    validate_threshold(threshold)?;

    let nrows = matrix.nrows();
    if nrows == 0 {
        return Ok(matrix.clone());
    }

    let missing = matrix.missing_per_column();
    let dropped: Vec<&str> = matrix
        .columns()
        .iter()
        .zip(&missing)
        .filter(|(_, &count)| count as f64 / nrows as f64 > threshold)
        .map(|(house, _)| house.as_str())
        .collect();

    if !dropped.is_empty() {
        log::debug!(
            "dropping {} of {} houses above {:.2}% missing",
            dropped.len(),
            matrix.ncols(),
            threshold * 100.0
        );
    }

    Ok(matrix.retain_columns(|house| !dropped.contains(&house)))
}

/// Replace missing cells with `statistic` computed over the present values along `axis`
///
/// A row (or column) with no present value stays missing.
pub fn impute(
    matrix: &ConsumptionMatrix,
    statistic: FillStatistic,
    axis: Axis,
) -> Result<ConsumptionMatrix> {
    let mut values = matrix.values().clone();
    let mut unresolved = 0usize;

    match axis {
        Axis::Rows => {
            for i in 0..values.nrows() {
                let row: Vec<f64> = values.row(i).iter().copied().collect();
                let fill = statistic.compute(&row);
                if fill.is_nan() && !row.is_empty() {
                    unresolved += 1;
                }
                for (j, v) in row.iter().enumerate() {
                    if !v.is_finite() {
                        values[(i, j)] = fill;
                    }
                }
            }
        }
        Axis::Columns => {
            for j in 0..values.ncols() {
                let column: Vec<f64> = values.column(j).iter().copied().collect();
                let fill = statistic.compute(&column);
                if fill.is_nan() && !column.is_empty() {
                    unresolved += 1;
                }
                for (i, v) in column.iter().enumerate() {
                    if !v.is_finite() {
                        values[(i, j)] = fill;
                    }
                }
            }
        }
    }

    if unresolved > 0 {
        log::warn!(
            "{} {:?} entirely missing; their cells remain missing after imputation",
            unresolved,
            axis
        );
    }

    matrix.with_values(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_statistic_ignores_missing() {
        let values = [1.0, f64::NAN, 3.0, 10.0];
        assert_eq!(FillStatistic::Median.compute(&values), 3.0);
        assert!((FillStatistic::Mean.compute(&values) - 14.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_row_statistic_even_count_median() {
        assert_eq!(FillStatistic::Median.compute(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_row_statistic_all_missing() {
        assert!(FillStatistic::Median.compute(&[f64::NAN, f64::NAN]).is_nan());
        assert!(FillStatistic::Mean.compute(&[]).is_nan());
    }

    #[test]
    fn test_strategy_validation() {
        assert!(MissingDataStrategy::Drop { threshold: 0.01 }.validate().is_ok());
        assert!(MissingDataStrategy::Drop { threshold: 1.5 }.validate().is_err());
        assert!(MissingDataStrategy::Drop { threshold: f64::NAN }
            .validate()
            .is_err());
        assert!(MissingDataStrategy::default().validate().is_ok());
    }
}
