//! End-to-end estimation pipeline
//!
//! A [`Pipeline`] wires the stages together explicitly:
//!
//! 1. pivot the four record sets into time × house matrices,
//! 2. resolve missing data in the estimator inputs with the configured strategy,
//! 3. intersect house sets across periods within each group,
//! 4. align period-1 control and treatment rows on shared timestamps,
//! 5. fit the synthetic control and estimate period-2 treatment consumption,
//! 6. score the estimate against observed period-2 treatment consumption.
//!
//! All parameters come from [`PipelineConfig`]; no state is kept between runs.

use crate::data::{ColumnNames, RecordSet};
use crate::error::{Result, SynthError};
use crate::estimator::{SyntheticControl, DEFAULT_PINV_TOLERANCE};
use crate::intersect::PanelSet;
use crate::matrix::ConsumptionMatrix;
use crate::metrics::{evaluate, EvaluationReport};
use crate::missing::MissingDataStrategy;
use crate::reshape::{pivot, split_by_treatment, DuplicatePolicy};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Settings of one estimation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How missing readings are resolved
    pub strategy: MissingDataStrategy,
    /// How repeated readings for a house and timestamp are handled
    pub duplicates: DuplicatePolicy,
    /// Relative singular-value cut-off of the pseudo-inverse
    pub pinv_tolerance: f64,
    /// Input column names used by the loaders
    pub columns: ColumnNames,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: MissingDataStrategy::default(),
            duplicates: DuplicatePolicy::default(),
            pinv_tolerance: DEFAULT_PINV_TOLERANCE,
            columns: ColumnNames::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from JSON; absent fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serialize the configuration as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every parameter
    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()?;
        if !(self.pinv_tolerance >= 0.0 && self.pinv_tolerance.is_finite()) {
            return Err(SynthError::InvalidParameter(format!(
                "pseudo-inverse tolerance must be a non-negative number, got {}",
                self.pinv_tolerance
            )));
        }
        Ok(())
    }

    pub fn with_strategy(mut self, strategy: MissingDataStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_duplicates(mut self, duplicates: DuplicatePolicy) -> Self {
        self.duplicates = duplicates;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.pinv_tolerance = tolerance;
        self
    }

    pub fn with_columns(mut self, columns: ColumnNames) -> Self {
        self.columns = columns;
        self
    }
}

/// A half-open time window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Period {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start >= end {
            return Err(SynthError::InvalidParameter(format!(
                "period start ({}) must be before its end ({})",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, time: &NaiveDateTime) -> bool {
        *time >= self.start && *time < self.end
    }
}

/// Everything produced by one run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Cleaned, intersected and aligned input panels
    pub panels: PanelSet,
    /// Fitted control → treatment map
    pub model: SyntheticControl,
    /// Counterfactual period-2 treatment consumption
    pub estimate: ConsumptionMatrix,
    /// Estimate scored against observed period-2 treatment consumption
    pub report: EvaluationReport,
}

/// Explicit composition of the estimation stages
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline, validating its configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Pivot the four record sets into matrices
    pub fn reshape(
        &self,
        control1: &RecordSet,
        treatment1: &RecordSet,
        control2: &RecordSet,
        treatment2: &RecordSet,
    ) -> Result<PanelSet> {
        let policy = self.config.duplicates;
        Ok(PanelSet::new(
            pivot(control1, policy)?,
            pivot(treatment1, policy)?,
            pivot(control2, policy)?,
            pivot(treatment2, policy)?,
        ))
    }

    /// Apply the missing-data strategy to the estimator inputs
    ///
    /// Observed period-2 treatment consumption is left as is; it is only
    /// scored against, and the metrics skip its gaps pairwise.
    pub fn clean(&self, panels: &PanelSet) -> Result<PanelSet> {
        let strategy = &self.config.strategy;
        Ok(PanelSet::new(
            strategy.apply(&panels.control1)?,
            strategy.apply(&panels.treatment1)?,
            strategy.apply(&panels.control2)?,
            panels.treatment2.clone(),
        ))
    }

    /// Reshape, clean, intersect and align the inputs of an estimation run
    pub fn prepare(
        &self,
        control1: &RecordSet,
        treatment1: &RecordSet,
        control2: &RecordSet,
        treatment2: &RecordSet,
    ) -> Result<PanelSet> {
        let panels = self.reshape(control1, treatment1, control2, treatment2)?;
        log::debug!("before anything {:?}", panels.shapes());

        let panels = self.clean(&panels)?;
        log::debug!("after cleaning {:?}", panels.shapes());

        let panels = panels.intersect()?;
        log::debug!("after house intersection {:?}", panels.shapes());

        let panels = align_period1_rows(panels)?;
        log::debug!("after period-1 row alignment {:?}", panels.shapes());

        Ok(panels)
    }

    /// Split one dataset into groups and periods, then [`prepare`](Self::prepare) it
    pub fn prepare_periods(
        &self,
        records: &RecordSet,
        period1: &Period,
        period2: &Period,
    ) -> Result<PanelSet> {
        if period1.end > period2.start && period2.end > period1.start {
            return Err(SynthError::InvalidParameter(
                "estimation periods must not overlap".to_string(),
            ));
        }
        records.validate_house_attributes()?;

        let (treatment1, control1) =
            split_by_treatment(&records.filter(|r| period1.contains(&r.date_time)));
        let (treatment2, control2) =
            split_by_treatment(&records.filter(|r| period2.contains(&r.date_time)));

        self.prepare(&control1, &treatment1, &control2, &treatment2)
    }

    /// Fit on prepared panels, estimate period 2 and score the estimate
    pub fn estimate(&self, panels: PanelSet) -> Result<PipelineOutput> {
        let model = SyntheticControl::fit_with_tolerance(
            &panels.control1,
            &panels.treatment1,
            self.config.pinv_tolerance,
        )?;
        let estimate = model.predict(&panels.control2)?;
        let report = evaluate(&panels.treatment2, &estimate)?;

        log::info!(
            "estimated {} treatment houses over {} period-2 timestamps (rmse {:.4})",
            estimate.ncols(),
            estimate.nrows(),
            report.rmse
        );

        Ok(PipelineOutput {
            panels,
            model,
            estimate,
            report,
        })
    }

    /// Run every stage on pre-split record sets
    pub fn run(
        &self,
        control1: &RecordSet,
        treatment1: &RecordSet,
        control2: &RecordSet,
        treatment2: &RecordSet,
    ) -> Result<PipelineOutput> {
        let panels = self.prepare(control1, treatment1, control2, treatment2)?;
        self.estimate(panels)
    }

    /// Run every stage on one dataset covering both periods
    pub fn run_periods(
        &self,
        records: &RecordSet,
        period1: &Period,
        period2: &Period,
    ) -> Result<PipelineOutput> {
        let panels = self.prepare_periods(records, period1, period2)?;
        self.estimate(panels)
    }
}

/// Restrict period-1 control and treatment panels to their shared timestamps
fn align_period1_rows(panels: PanelSet) -> Result<PanelSet> {
    if panels.control1.index() == panels.treatment1.index() {
        return Ok(panels);
    }

    let treatment_times: HashSet<&NaiveDateTime> = panels.treatment1.index().iter().collect();
    let shared: HashSet<NaiveDateTime> = panels
        .control1
        .index()
        .iter()
        .filter(|t| treatment_times.contains(t))
        .copied()
        .collect();

    if shared.is_empty() {
        return Err(SynthError::ShapeMismatch(
            "period-1 control and treatment panels share no timestamps".to_string(),
        ));
    }

    Ok(PanelSet {
        control1: panels.control1.retain_rows(|t| shared.contains(t)),
        treatment1: panels.treatment1.retain_rows(|t| shared.contains(t)),
        control2: panels.control2,
        treatment2: panels.treatment2,
    })
}
