//! # Energy Synth
//!
//! Workspace facade over [`synth_control`], the synthetic-control estimator for
//! household energy-consumption panels.
//!
//! ## Example
//!
//! ```
//! use energy_synth_workspace::prelude::*;
//!
//! let config = SimulationConfig {
//!     control_houses: 4,
//!     treatment_houses: 2,
//!     period1_readings: 96,
//!     period2_readings: 48,
//!     ..SimulationConfig::default()
//! };
//! let panel = SyntheticPanel::generate(&config).unwrap();
//! let output = run_simulated(&panel, &config, PipelineConfig::default()).unwrap();
//! assert!(output.report.rmse < 1e-6);
//! ```

pub use synth_control;

/// Everything needed for a typical estimation run
pub mod prelude {
    pub use crate::run_simulated;
    pub use synth_control::simulate::{SimulationConfig, SyntheticPanel};
    pub use synth_control::{
        ConsumptionMatrix, EvaluationReport, MissingDataStrategy, Period, Pipeline,
        PipelineConfig, PipelineOutput, RecordSet, Result, SynthError,
    };
}

use synth_control::simulate::{SimulationConfig, SyntheticPanel};
use synth_control::{Period, Pipeline, PipelineConfig, PipelineOutput, Result};

/// Run the full pipeline over a simulated panel, using the periods it was generated with
pub fn run_simulated(
    panel: &SyntheticPanel,
    simulation: &SimulationConfig,
    config: PipelineConfig,
) -> Result<PipelineOutput> {
    let period1 = Period::new(simulation.period1_start, simulation.period1_end())?;
    let period2 = Period::new(simulation.period2_start, simulation.period2_end())?;
    Pipeline::new(config)?.run_periods(&panel.records, &period1, &period2)
}
