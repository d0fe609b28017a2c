//! Synthetic consumption panels with a known counterfactual
//!
//! Control houses follow a noisy daily profile; treatment houses are a fixed
//! non-negative mixture of control houses plus optional noise. In period 2 a
//! multiplicative treatment effect is applied to the treatment group, so the
//! untreated counterfactual is known exactly and estimates can be scored.

use crate::data::{ConsumptionRecord, RecordSet};
use crate::error::{Result, SynthError};
use crate::matrix::ConsumptionMatrix;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Parameters of a simulated two-period panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub control_houses: usize,
    pub treatment_houses: usize,
    /// Readings per house in each period
    pub period1_readings: usize,
    pub period2_readings: usize,
    /// Minutes between readings
    pub interval_minutes: i64,
    pub period1_start: NaiveDateTime,
    pub period2_start: NaiveDateTime,
    /// Standard deviation of the noise added to treatment readings
    pub treatment_noise: f64,
    /// Relative change of treatment consumption in period 2 (e.g. -0.05)
    pub treatment_effect: f64,
    /// Probability that any single reading is missing
    pub missing_rate: f64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let start = |year| {
            NaiveDate::from_ymd_opt(year, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default()
        };
        Self {
            control_houses: 8,
            treatment_houses: 4,
            period1_readings: 48 * 14,
            period2_readings: 48 * 14,
            interval_minutes: 30,
            period1_start: start(2012),
            period2_start: start(2013),
            treatment_noise: 0.0,
            treatment_effect: 0.0,
            missing_rate: 0.0,
            seed: 42,
        }
    }
}

impl SimulationConfig {
    /// Check the parameters
    pub fn validate(&self) -> Result<()> {
        if self.control_houses == 0 || self.treatment_houses == 0 {
            return Err(SynthError::InvalidParameter(
                "both groups need at least one house".to_string(),
            ));
        }
        if self.period1_readings == 0 || self.period2_readings == 0 {
            return Err(SynthError::InvalidParameter(
                "both periods need at least one reading".to_string(),
            ));
        }
        if self.interval_minutes <= 0 {
            return Err(SynthError::InvalidParameter(
                "reading interval must be positive".to_string(),
            ));
        }
        if self.period1_end() > self.period2_start {
            return Err(SynthError::InvalidParameter(
                "period 1 must end before period 2 starts".to_string(),
            ));
        }
        if !(self.treatment_noise >= 0.0 && self.treatment_noise.is_finite()) {
            return Err(SynthError::InvalidParameter(
                "treatment noise must be a non-negative number".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.missing_rate) {
            return Err(SynthError::InvalidParameter(
                "missing rate must be within [0, 1)".to_string(),
            ));
        }
        if self.treatment_effect <= -1.0 {
            return Err(SynthError::InvalidParameter(
                "treatment effect cannot remove all consumption".to_string(),
            ));
        }
        Ok(())
    }

    pub fn period1_end(&self) -> NaiveDateTime {
        self.period1_start + Duration::minutes(self.interval_minutes * self.period1_readings as i64)
    }

    pub fn period2_end(&self) -> NaiveDateTime {
        self.period2_start + Duration::minutes(self.interval_minutes * self.period2_readings as i64)
    }
}

/// A simulated panel and the quantities it was generated from
#[derive(Debug, Clone)]
pub struct SyntheticPanel {
    /// Long-format records of both groups and both periods
    pub records: RecordSet,
    /// Mixing weights, `(control houses × treatment houses)`
    pub mixing: DMatrix<f64>,
    /// Period-2 treatment consumption without noise or treatment effect
    pub counterfactual: ConsumptionMatrix,
}

impl SyntheticPanel {
    /// Generate a panel from a configuration
    pub fn generate(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let noise = Normal::new(0.0, config.treatment_noise)
            .map_err(|e| SynthError::InvalidParameter(e.to_string()))?;
        let jitter = Normal::new(0.0, 0.05)
            .map_err(|e| SynthError::InvalidParameter(e.to_string()))?;

        let control_ids: Vec<String> = (1..=config.control_houses)
            .map(|i| format!("C{:04}", i))
            .collect();
        let treatment_ids: Vec<String> = (1..=config.treatment_houses)
            .map(|i| format!("T{:04}", i))
            .collect();

        // Per-house base load, daily amplitude and phase
        let profiles: Vec<(f64, f64, f64)> = (0..config.control_houses)
            .map(|_| {
                (
                    rng.gen_range(0.1..0.4),
                    rng.gen_range(0.05..0.3),
                    rng.gen_range(0.0..2.0 * PI),
                )
            })
            .collect();

        // Columns of non-negative weights summing to one
        let mut mixing = DMatrix::from_fn(config.control_houses, config.treatment_houses, |_, _| {
            rng.gen_range(0.0..1.0)
        });
        for mut column in mixing.column_iter_mut() {
            let total: f64 = column.sum();
            column /= total;
        }

        let readings_per_day = (24 * 60 / config.interval_minutes).max(1) as f64;
        let mut control_series = |readings: usize| {
            DMatrix::from_fn(readings, config.control_houses, |t, h| {
                let (base, amplitude, phase) = profiles[h];
                let angle = 2.0 * PI * t as f64 / readings_per_day + phase;
                (base + amplitude * angle.sin() + jitter.sample(&mut rng)).max(0.01)
            })
        };
        let control1 = control_series(config.period1_readings);
        let control2 = control_series(config.period2_readings);

        let treatment1 = &control1 * &mixing;
        let clean2 = &control2 * &mixing;

        let times = |start: NaiveDateTime, readings: usize| -> Vec<NaiveDateTime> {
            (0..readings)
                .map(|t| start + Duration::minutes(config.interval_minutes * t as i64))
                .collect()
        };
        let times1 = times(config.period1_start, config.period1_readings);
        let times2 = times(config.period2_start, config.period2_readings);

        let mut records = RecordSet::new();
        let mut emit = |rng: &mut StdRng,
                        times: &[NaiveDateTime],
                        ids: &[String],
                        values: &DMatrix<f64>,
                        treated: bool,
                        scale: f64| {
            for (t, time) in times.iter().enumerate() {
                for (h, id) in ids.iter().enumerate() {
                    let mut value = values[(t, h)] * scale;
                    if treated {
                        value += noise.sample(rng);
                    }
                    let consumption = if rng.gen_bool(config.missing_rate) {
                        None
                    } else {
                        Some(value)
                    };
                    records.push(ConsumptionRecord::new(id.clone(), *time, consumption, treated));
                }
            }
        };

        emit(&mut rng, &times1, &control_ids, &control1, false, 1.0);
        emit(&mut rng, &times2, &control_ids, &control2, false, 1.0);
        emit(&mut rng, &times1, &treatment_ids, &treatment1, true, 1.0);
        emit(
            &mut rng,
            &times2,
            &treatment_ids,
            &clean2,
            true,
            1.0 + config.treatment_effect,
        );

        log::debug!(
            "simulated {} records for {} control and {} treatment houses",
            records.len(),
            config.control_houses,
            config.treatment_houses
        );

        Ok(Self {
            records,
            mixing,
            counterfactual: ConsumptionMatrix::new(times2, treatment_ids, clean2)?,
        })
    }
}
