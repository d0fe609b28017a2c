//! Synthetic-control counterfactual estimation
//!
//! The estimator fits a linear map `X` from control to treatment consumption
//! over period 1,
//!
//! ```text
//! X = pinv(A1) · B1          (least-squares solution of A1 · X ≈ B1)
//! ```
//!
//! and applies it to the period-2 control panel to obtain the untreated
//! counterfactual of the treatment group:
//!
//! ```text
//! B2_hat = A2 · X
//! ```
//!
//! `pinv` is the Moore-Penrose pseudo-inverse computed from an SVD, so `A1`
//! may be non-square or rank-deficient. Inputs must be dense: missing cells
//! are rejected instead of being propagated through the products.

use crate::error::{Result, SynthError};
use crate::matrix::ConsumptionMatrix;
use nalgebra::DMatrix;

/// Default relative cut-off for small singular values in the pseudo-inverse
pub const DEFAULT_PINV_TOLERANCE: f64 = 1e-10;

/// Coefficients mapping control-house consumption onto treatment-house consumption
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticControl {
    control_houses: Vec<String>,
    treatment_houses: Vec<String>,
    coefficients: DMatrix<f64>,
    rank: usize,
}

impl SyntheticControl {
    /// Fit the map on period-1 panels with the default tolerance
    pub fn fit(control1: &ConsumptionMatrix, treatment1: &ConsumptionMatrix) -> Result<Self> {
        Self::fit_with_tolerance(control1, treatment1, DEFAULT_PINV_TOLERANCE)
    }

    /// Fit the map on period-1 panels
    ///
    /// Singular values of `control1` at or below `tolerance` times the largest
    /// singular value are treated as zero.
    pub fn fit_with_tolerance(
        control1: &ConsumptionMatrix,
        treatment1: &ConsumptionMatrix,
        tolerance: f64,
    ) -> Result<Self> {
        if !(tolerance >= 0.0 && tolerance.is_finite()) {
            return Err(SynthError::InvalidParameter(format!(
                "pseudo-inverse tolerance must be a non-negative number, got {}",
                tolerance
            )));
        }

        ensure_populated("control period 1", control1)?;
        ensure_populated("treatment period 1", treatment1)?;

        if control1.nrows() != treatment1.nrows() {
            return Err(SynthError::ShapeMismatch(format!(
                "control period 1 has {} rows but treatment period 1 has {}",
                control1.nrows(),
                treatment1.nrows()
            )));
        }
        if control1.index() != treatment1.index() {
            return Err(SynthError::ShapeMismatch(
                "control and treatment period-1 panels are not indexed by the same timestamps"
                    .to_string(),
            ));
        }

        ensure_dense("control period 1", control1)?;
        ensure_dense("treatment period 1", treatment1)?;

        let (pinv, rank) = pseudo_inverse(control1.values(), tolerance)?;
        if rank < control1.ncols() {
            log::warn!(
                "control panel is rank deficient ({} of {} houses independent); using the minimum-norm fit",
                rank,
                control1.ncols()
            );
        }

        let coefficients = pinv * treatment1.values();
        log::debug!(
            "fitted synthetic control: {} control houses -> {} treatment houses over {} timestamps",
            control1.ncols(),
            treatment1.ncols(),
            control1.nrows()
        );

        Ok(Self {
            control_houses: control1.columns().to_vec(),
            treatment_houses: treatment1.columns().to_vec(),
            coefficients,
            rank,
        })
    }

    /// Apply the fitted map to a period-2 control panel
    ///
    /// `control2` must hold exactly the fitted control houses; its columns
    /// are reordered to the fitted order before multiplying.
    pub fn predict(&self, control2: &ConsumptionMatrix) -> Result<ConsumptionMatrix> {
        ensure_populated("control period 2", control2)?;

        let aligned = control2.reindex_columns(&self.control_houses).map_err(|_| {
            SynthError::HouseMismatch(format!(
                "control period 2 houses do not match the {} fitted control houses",
                self.control_houses.len()
            ))
        })?;
        ensure_dense("control period 2", &aligned)?;

        let values = aligned.values() * &self.coefficients;
        let (index, _, _) = aligned.into_parts();
        ConsumptionMatrix::new(index, self.treatment_houses.clone(), values)
    }

    /// The `(control houses × treatment houses)` coefficient matrix
    pub fn coefficients(&self) -> &DMatrix<f64> {
        &self.coefficients
    }

    pub fn control_houses(&self) -> &[String] {
        &self.control_houses
    }

    pub fn treatment_houses(&self) -> &[String] {
        &self.treatment_houses
    }

    /// Numerical rank of the period-1 control panel
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Whether the control houses were linearly independent over period 1
    pub fn is_full_rank(&self) -> bool {
        self.rank == self.control_houses.len()
    }

    /// Control-house weights making up one treatment house's synthetic series
    pub fn weights_for(&self, treatment_house: &str) -> Option<Vec<(String, f64)>> {
        let col = self
            .treatment_houses
            .iter()
            .position(|h| h == treatment_house)?;
        Some(
            self.control_houses
                .iter()
                .cloned()
                .zip(self.coefficients.column(col).iter().copied())
                .collect(),
        )
    }
}

/// Estimate period-2 treatment consumption from the control group
///
/// Returns a matrix with the row index of `control2` and the houses of
/// `treatment1`.
pub fn estimate(
    control1: &ConsumptionMatrix,
    treatment1: &ConsumptionMatrix,
    control2: &ConsumptionMatrix,
) -> Result<ConsumptionMatrix> {
    SyntheticControl::fit(control1, treatment1)?.predict(control2)
}

/// [`estimate`] with an explicit pseudo-inverse tolerance
pub fn estimate_with_tolerance(
    control1: &ConsumptionMatrix,
    treatment1: &ConsumptionMatrix,
    control2: &ConsumptionMatrix,
    tolerance: f64,
) -> Result<ConsumptionMatrix> {
    SyntheticControl::fit_with_tolerance(control1, treatment1, tolerance)?.predict(control2)
}

/// Moore-Penrose pseudo-inverse and numerical rank of a dense matrix
fn pseudo_inverse(matrix: &DMatrix<f64>, tolerance: f64) -> Result<(DMatrix<f64>, usize)> {
    let svd = matrix.clone().svd(true, true);
    let largest = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    let cutoff = tolerance * largest;

    let rank = svd.rank(cutoff);
    let pinv = svd
        .pseudo_inverse(cutoff)
        .map_err(|e| SynthError::LinalgError(e.to_string()))?;

    Ok((pinv, rank))
}

fn ensure_populated(name: &str, matrix: &ConsumptionMatrix) -> Result<()> {
    if matrix.is_empty() {
        return Err(SynthError::EmptyMatrix(format!(
            "{} has shape {:?}",
            name,
            matrix.shape()
        )));
    }
    Ok(())
}

fn ensure_dense(name: &str, matrix: &ConsumptionMatrix) -> Result<()> {
    let count = matrix.missing_count();
    if count > 0 {
        return Err(SynthError::MissingValues {
            matrix: name.to_string(),
            count,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudo_inverse_of_tall_matrix() {
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let (pinv, rank) = pseudo_inverse(&a, DEFAULT_PINV_TOLERANCE).unwrap();

        assert_eq!(rank, 2);
        assert_eq!(pinv.shape(), (2, 3));

        // A⁺A = I for full column rank
        let identity = &pinv * &a;
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((identity[(i, j)] - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_pseudo_inverse_rank_deficient() {
        // Second column duplicates the first
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        let (pinv, rank) = pseudo_inverse(&a, DEFAULT_PINV_TOLERANCE).unwrap();

        assert_eq!(rank, 1);
        // Penrose condition A A⁺ A = A
        let reconstructed = &a * &pinv * &a;
        assert!((reconstructed - &a).abs().max() < 1e-9);
    }

    #[test]
    fn test_pseudo_inverse_of_zero_matrix() {
        let a = DMatrix::zeros(2, 2);
        let (pinv, rank) = pseudo_inverse(&a, DEFAULT_PINV_TOLERANCE).unwrap();

        assert_eq!(rank, 0);
        assert!(pinv.iter().all(|v| *v == 0.0));
    }
}
