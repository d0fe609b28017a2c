//! Restriction of period panels to the houses observed in both periods

use crate::error::{Result, SynthError};
use crate::matrix::ConsumptionMatrix;
use std::collections::BTreeSet;

/// The four matrices of one estimation run
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSet {
    /// Control group, period 1 (A1)
    pub control1: ConsumptionMatrix,
    /// Treatment group, period 1 (B1)
    pub treatment1: ConsumptionMatrix,
    /// Control group, period 2 (A2)
    pub control2: ConsumptionMatrix,
    /// Treatment group, period 2 (B2)
    pub treatment2: ConsumptionMatrix,
}

impl PanelSet {
    pub fn new(
        control1: ConsumptionMatrix,
        treatment1: ConsumptionMatrix,
        control2: ConsumptionMatrix,
        treatment2: ConsumptionMatrix,
    ) -> Self {
        Self {
            control1,
            treatment1,
            control2,
            treatment2,
        }
    }

    /// Shapes in `(A1, B1, A2, B2)` order, for diagnostics
    pub fn shapes(&self) -> [(usize, usize); 4] {
        [
            self.control1.shape(),
            self.treatment1.shape(),
            self.control2.shape(),
            self.treatment2.shape(),
        ]
    }

    /// Restrict each group to the houses observed in both periods
    pub fn intersect(&self) -> Result<Self> {
        house_intersect(
            &self.control1,
            &self.treatment1,
            &self.control2,
            &self.treatment2,
        )
    }
}

/// Houses present in both matrices, sorted
pub fn common_houses(first: &ConsumptionMatrix, second: &ConsumptionMatrix) -> Vec<String> {
    let first: BTreeSet<&String> = first.columns().iter().collect();
    let second: BTreeSet<&String> = second.columns().iter().collect();
    first.intersection(&second).map(|h| h.to_string()).collect()
}

/// Keep, per group, only the houses observed in both periods
///
/// Columns come out in sorted house-id order, so both periods of a group
/// share the same column order. Row indices are untouched.
pub fn house_intersect(
    control1: &ConsumptionMatrix,
    treatment1: &ConsumptionMatrix,
    control2: &ConsumptionMatrix,
    treatment2: &ConsumptionMatrix,
) -> Result<PanelSet> {
    let control_houses = common_houses(control1, control2);
    if control_houses.is_empty() {
        return Err(SynthError::EmptyIntersection {
            group: "control".to_string(),
        });
    }

    let treatment_houses = common_houses(treatment1, treatment2);
    if treatment_houses.is_empty() {
        return Err(SynthError::EmptyIntersection {
            group: "treatment".to_string(),
        });
    }

    Ok(PanelSet {
        control1: control1.select_columns(&control_houses)?,
        treatment1: treatment1.select_columns(&treatment_houses)?,
        control2: control2.select_columns(&control_houses)?,
        treatment2: treatment2.select_columns(&treatment_houses)?,
    })
}
