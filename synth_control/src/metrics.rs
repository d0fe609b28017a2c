//! Metrics for evaluating counterfactual estimates
//!
//! Every metric skips a pair when either value is missing, so one gap never
//! discards the rest of the comparison. Relative metrics treat a zero actual
//! value as missing for that pair.

use crate::error::{Result, SynthError};
use crate::matrix::ConsumptionMatrix;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};
use std::collections::HashMap;

/// Root mean squared error
pub fn rmse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    Ok(pairwise_mean(actual, predicted, |a, p| (a - p).powi(2))?.sqrt())
}

/// Root mean squared percentage error, as a fraction
pub fn rmspe(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    Ok(pairwise_mean(actual, predicted, |a, p| relative_error(a, p).powi(2))?.sqrt())
}

/// Mean percentage error (signed relative bias), as a fraction
pub fn mpe(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    pairwise_mean(actual, predicted, relative_error)
}

/// Mean error (signed absolute bias)
pub fn me(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    pairwise_mean(actual, predicted, |a, p| a - p)
}

fn relative_error(actual: f64, predicted: f64) -> f64 {
    if actual == 0.0 {
        f64::NAN
    } else {
        (actual - predicted) / actual
    }
}

/// Mean of `f(actual, predicted)` over the pairs where it is defined; `NaN` if none are
fn pairwise_mean<F>(actual: &[f64], predicted: &[f64], f: F) -> Result<f64>
where
    F: Fn(f64, f64) -> f64,
{
    let (sum, count) = pairwise_terms(actual, predicted, f)?
        .fold((0.0, 0usize), |(sum, count), term| (sum + term, count + 1));

    if count == 0 {
        Ok(f64::NAN)
    } else {
        Ok(sum / count as f64)
    }
}

fn pairwise_terms<'a, F>(
    actual: &'a [f64],
    predicted: &'a [f64],
    f: F,
) -> Result<impl Iterator<Item = f64> + 'a>
where
    F: Fn(f64, f64) -> f64 + 'a,
{
    if actual.len() != predicted.len() {
        return Err(SynthError::ShapeMismatch(format!(
            "actual has {} values but predicted has {}",
            actual.len(),
            predicted.len()
        )));
    }

    Ok(actual
        .iter()
        .zip(predicted)
        .filter(|(a, p)| !a.is_nan() && !p.is_nan())
        .map(move |(&a, &p)| f(a, p))
        .filter(|term| !term.is_nan()))
}

/// Summary of the error between actual and estimated consumption
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Root Mean Squared Percentage Error (fraction)
    pub rmspe: f64,
    /// Mean Percentage Error (fraction)
    pub mpe: f64,
    /// Mean Error
    pub me: f64,
    /// Number of pairs where both values were present
    pub pairs: usize,
}

impl EvaluationReport {
    /// Compute all metrics for two equally long series
    pub fn from_slices(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        Ok(Self {
            rmse: rmse(actual, predicted)?,
            rmspe: rmspe(actual, predicted)?,
            mpe: mpe(actual, predicted)?,
            me: me(actual, predicted)?,
            pairs: pairwise_terms(actual, predicted, |a, p| a - p)?.count(),
        })
    }
}

impl std::fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Counterfactual Evaluation ({} pairs):", self.pairs)?;
        writeln!(f, "  RMSE:   {:.4}", self.rmse)?;
        writeln!(f, "  RMSPE:  {:.4}%", self.rmspe * 100.0)?;
        writeln!(f, "  MPE:    {:.4}%", self.mpe * 100.0)?;
        writeln!(f, "  ME:     {:.4}", self.me)?;
        Ok(())
    }
}

/// Evaluate an estimate against observed consumption
///
/// Cells are paired by timestamp and house; timestamps present in only one
/// matrix are ignored. Both matrices must cover the same houses.
pub fn evaluate(
    actual: &ConsumptionMatrix,
    predicted: &ConsumptionMatrix,
) -> Result<EvaluationReport> {
    let (actual, predicted) = aligned_values(actual, predicted)?;
    EvaluationReport::from_slices(&actual, &predicted)
}

/// RMSE of each house's series, in the column order of `actual`
pub fn per_house_rmse(
    actual: &ConsumptionMatrix,
    predicted: &ConsumptionMatrix,
) -> Result<Vec<(String, f64)>> {
    let (actual_aligned, predicted_aligned) = align(actual, predicted)?;

    actual_aligned
        .columns()
        .iter()
        .enumerate()
        .map(|(j, house)| {
            let a: Vec<f64> = actual_aligned.values().column(j).iter().copied().collect();
            let p: Vec<f64> = predicted_aligned.values().column(j).iter().copied().collect();
            Ok((house.clone(), rmse(&a, &p)?))
        })
        .collect()
}

/// Median of `(actual - predicted) / predicted` over a subgroup of timestamps and houses
///
/// Cells missing on either side, or with a zero prediction, are skipped.
/// Returns `NaN` if no cell qualifies.
pub fn subgroup_median_relative_error(
    actual: &ConsumptionMatrix,
    predicted: &ConsumptionMatrix,
    times: &[NaiveDateTime],
    houses: &[String],
) -> Result<f64> {
    let actual = actual.subset(times, houses);
    let predicted = predicted.subset(times, houses);
    let (a, p) = aligned_values(&actual, &predicted)?;

    let ratios: Vec<f64> = a
        .iter()
        .zip(&p)
        .filter(|(a, p)| !a.is_nan() && !p.is_nan() && **p != 0.0)
        .map(|(a, p)| (a - p) / p)
        .collect();

    if ratios.is_empty() {
        return Ok(f64::NAN);
    }
    Ok(Data::new(ratios).median())
}

/// Restrict both matrices to shared timestamps and put houses in the same order
fn align(
    actual: &ConsumptionMatrix,
    predicted: &ConsumptionMatrix,
) -> Result<(ConsumptionMatrix, ConsumptionMatrix)> {
    let predicted = predicted.reindex_columns(actual.columns()).map_err(|_| {
        SynthError::HouseMismatch(
            "actual and predicted matrices cover different houses".to_string(),
        )
    })?;

    if actual.index() == predicted.index() {
        return Ok((actual.clone(), predicted));
    }

    let predicted_rows: HashMap<&NaiveDateTime, usize> = predicted
        .index()
        .iter()
        .enumerate()
        .map(|(i, t)| (t, i))
        .collect();
    let (actual_rows, matched_rows): (Vec<usize>, Vec<usize>) = actual
        .index()
        .iter()
        .enumerate()
        .filter_map(|(i, t)| predicted_rows.get(t).map(|&k| (i, k)))
        .unzip();

    if actual_rows.len() < actual.nrows() || matched_rows.len() < predicted.nrows() {
        log::debug!(
            "evaluating on {} shared timestamps ({} actual, {} predicted)",
            actual_rows.len(),
            actual.nrows(),
            predicted.nrows()
        );
    }

    let index: Vec<NaiveDateTime> = actual_rows.iter().map(|&i| actual.index()[i]).collect();
    let actual_values = actual.values().select_rows(&actual_rows);
    let predicted_values = predicted.values().select_rows(&matched_rows);

    Ok((
        ConsumptionMatrix::new(index.clone(), actual.columns().to_vec(), actual_values)?,
        ConsumptionMatrix::new(index, actual.columns().to_vec(), predicted_values)?,
    ))
}

fn aligned_values(
    actual: &ConsumptionMatrix,
    predicted: &ConsumptionMatrix,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let (actual, predicted) = align(actual, predicted)?;
    Ok((
        actual.values().iter().copied().collect(),
        predicted.values().iter().copied().collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_error_zero_actual() {
        assert!(relative_error(0.0, 1.0).is_nan());
        assert_eq!(relative_error(2.0, 1.0), 0.5);
    }

    #[test]
    fn test_pairwise_mean_no_valid_pairs() {
        let result = pairwise_mean(&[f64::NAN], &[1.0], |a, p| a - p).unwrap();
        assert!(result.is_nan());
    }
}
