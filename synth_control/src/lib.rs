//! # Synth Control
//!
//! A Rust library for estimating the counterfactual energy consumption of a
//! treated group of households with the synthetic-control method.
//!
//! ## Features
//!
//! - Long-format consumption records loaded from CSV or a polars `DataFrame`
//! - Pivoting into time × house consumption matrices
//! - Missing-data handling by dropping sparse houses or imputing a row statistic
//! - House-set intersection across the two study periods
//! - Counterfactual estimation through a Moore-Penrose pseudo-inverse fit
//! - Error metrics (RMSE, RMSPE, ME, MPE) tolerant of missing readings
//! - Descriptive daily, annual and per-interval summaries
//! - Seeded simulation of panels with a known counterfactual
//!
//! ## Method
//!
//! With control consumption `A1` and treatment consumption `B1` over the
//! period before treatment, and control consumption `A2` afterwards:
//!
//! ```text
//! X      = pinv(A1) · B1
//! B2_hat = A2 · X
//! ```
//!
//! `B2_hat` is what the treatment group would have consumed without treatment.
//!
//! ## Quick Start
//!
//! ```no_run
//! use synth_control::data::RecordLoader;
//! use synth_control::pipeline::{Period, Pipeline, PipelineConfig};
//! use synth_control::data::parse_timestamp;
//!
//! # fn main() -> synth_control::Result<()> {
//! // Load configuration and data
//! let config = PipelineConfig::from_json_file("config.json")?;
//! let records = RecordLoader::from_csv("consumption.csv", &config.columns)?;
//!
//! // Before and after the intervention
//! let period1 = Period::new(parse_timestamp("2012-01-01")?, parse_timestamp("2013-01-01")?)?;
//! let period2 = Period::new(parse_timestamp("2013-01-01")?, parse_timestamp("2014-01-01")?)?;
//!
//! // Run the estimation
//! let output = Pipeline::new(config)?.run_periods(&records, &period1, &period2)?;
//! println!("{}", output.report);
//! output.estimate.write_csv("counterfactual.csv")?;
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod error;
pub mod estimator;
pub mod intersect;
pub mod matrix;
pub mod metrics;
pub mod missing;
pub mod pipeline;
pub mod reshape;
pub mod simulate;
pub mod summary;

// Re-export commonly used types
pub use crate::data::{ColumnNames, ConsumptionRecord, RecordLoader, RecordSet};
pub use crate::error::{Result, SynthError};
pub use crate::estimator::{estimate, SyntheticControl};
pub use crate::intersect::{house_intersect, PanelSet};
pub use crate::matrix::ConsumptionMatrix;
pub use crate::metrics::{evaluate, EvaluationReport};
pub use crate::missing::{clean_house, impute, Axis, FillStatistic, MissingDataStrategy};
pub use crate::pipeline::{Period, Pipeline, PipelineConfig, PipelineOutput};
pub use crate::reshape::{pivot, split_by_treatment, DuplicatePolicy};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
