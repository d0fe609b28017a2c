//! Descriptive summaries of consumption panels
//!
//! These helpers aggregate long-format records per day, year or reading
//! interval and split the result by group. Missing readings are skipped in
//! every aggregate.

use crate::data::RecordSet;
use crate::error::{Result, SynthError};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Readings per day at half-hourly resolution
const READINGS_PER_DAY: f64 = 48.0;

/// One aggregate value per group; `None` when the group has no data for the key
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupValues {
    pub treatment: Option<f64>,
    pub control: Option<f64>,
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    treatment: (f64, usize),
    control: (f64, usize),
}

impl GroupAccumulator {
    fn push(&mut self, treated: bool, value: f64) {
        let slot = if treated {
            &mut self.treatment
        } else {
            &mut self.control
        };
        slot.0 += value;
        slot.1 += 1;
    }

    fn finish(&self) -> GroupValues {
        let mean = |(sum, n): (f64, usize)| (n > 0).then(|| sum / n as f64);
        GroupValues {
            treatment: mean(self.treatment),
            control: mean(self.control),
        }
    }
}

fn group_means<K, I>(items: I) -> BTreeMap<K, GroupValues>
where
    K: Ord,
    I: IntoIterator<Item = (K, bool, f64)>,
{
    let mut groups: BTreeMap<K, GroupAccumulator> = BTreeMap::new();
    for (key, treated, value) in items {
        groups.entry(key).or_default().push(treated, value);
    }
    groups
        .into_iter()
        .map(|(key, acc)| (key, acc.finish()))
        .collect()
}

/// Per-house totals over a period key (day, year, ...)
fn house_totals<K, F>(records: &RecordSet, key: F) -> BTreeMap<(K, String), (bool, f64)>
where
    K: Ord,
    F: Fn(&NaiveDateTime) -> K,
{
    let mut totals = BTreeMap::new();
    for record in records {
        let entry = totals
            .entry((key(&record.date_time), record.house_id.clone()))
            .or_insert((record.treated, 0.0));
        if let Some(value) = record.value() {
            entry.1 += value;
        }
    }
    totals
}

/// Mean daily consumption per house, by calendar day and group
///
/// Each house's readings are summed per day, then averaged across the houses
/// of each group.
pub fn household_mean_daily_consumption(records: &RecordSet) -> BTreeMap<NaiveDate, GroupValues> {
    group_means(
        house_totals(records, NaiveDateTime::date)
            .into_iter()
            .map(|((day, _), (treated, total))| (day, treated, total)),
    )
}

/// Mean annual consumption per house, by year and group
pub fn annual_consumption_by_year(records: &RecordSet) -> BTreeMap<i32, GroupValues> {
    group_means(
        house_totals(records, |t| t.year())
            .into_iter()
            .map(|((year, _), (treated, total))| (year, treated, total)),
    )
}

/// `(treatment, control)` mean annual consumption per house for the earliest year
pub fn annual_consumption(records: &RecordSet) -> Result<(f64, f64)> {
    let by_year = annual_consumption_by_year(records);
    let (year, values) = by_year
        .iter()
        .next()
        .ok_or_else(|| SynthError::DataError("no records to aggregate".to_string()))?;

    match (values.treatment, values.control) {
        (Some(treatment), Some(control)) => Ok((treatment, control)),
        _ => Err(SynthError::DataError(format!(
            "year {} lacks readings for one of the groups",
            year
        ))),
    }
}

/// Mean reading across houses at each timestamp, by group
pub fn mean_over_houses_per_interval(records: &RecordSet) -> BTreeMap<NaiveDateTime, GroupValues> {
    group_means(
        records
            .iter()
            .filter_map(|r| r.value().map(|v| (r.date_time, r.treated, v))),
    )
}

/// Average reading per house per day, averaged across the houses reporting that day
pub fn mean_daily_per_house(records: &RecordSet) -> BTreeMap<NaiveDate, f64> {
    let mut per_house: BTreeMap<(NaiveDate, &str), (f64, usize)> = BTreeMap::new();
    for record in records {
        if let Some(value) = record.value() {
            let slot = per_house
                .entry((record.date_time.date(), record.house_id.as_str()))
                .or_default();
            slot.0 += value;
            slot.1 += 1;
        }
    }

    let mut per_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for ((day, _), (sum, n)) in per_house {
        let slot = per_day.entry(day).or_default();
        slot.0 += sum / n as f64;
        slot.1 += 1;
    }

    per_day
        .into_iter()
        .map(|(day, (sum, n))| (day, sum / n as f64))
        .collect()
}

/// Number of distinct houses with at least one record on each day
pub fn unique_houses_per_day(records: &RecordSet) -> BTreeMap<NaiveDate, usize> {
    let mut houses: BTreeMap<NaiveDate, BTreeSet<&str>> = BTreeMap::new();
    for record in records {
        houses
            .entry(record.date_time.date())
            .or_default()
            .insert(record.house_id.as_str());
    }
    houses
        .into_iter()
        .map(|(day, set)| (day, set.len()))
        .collect()
}

/// Household appliances used to put consumption figures in perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Appliance {
    Television,
    Fridge,
    WashingMachine,
    Dryer,
    AirConditioner,
}

impl Appliance {
    pub const ALL: [Appliance; 5] = [
        Appliance::Television,
        Appliance::Fridge,
        Appliance::WashingMachine,
        Appliance::Dryer,
        Appliance::AirConditioner,
    ];

    /// Typical power draw in watts
    pub fn watts(&self) -> f64 {
        match self {
            Appliance::Television => 234.0,
            Appliance::Fridge => 225.0,
            Appliance::WashingMachine => 255.0,
            Appliance::Dryer => 2790.0,
            Appliance::AirConditioner => 3500.0,
        }
    }
}

impl std::fmt::Display for Appliance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Appliance::Television => "TV",
            Appliance::Fridge => "fridge",
            Appliance::WashingMachine => "washing machine",
            Appliance::Dryer => "dryer",
            Appliance::AirConditioner => "AC",
        };
        write!(f, "{}", name)
    }
}

/// Hours of appliance use equivalent to a per-reading consumption in kWh, sustained for a day
pub fn appliance_equivalents(kwh_per_reading: f64) -> Vec<(Appliance, f64)> {
    Appliance::ALL
        .iter()
        .map(|&appliance| {
            (
                appliance,
                kwh_per_reading * 1000.0 * READINGS_PER_DAY / appliance.watts(),
            )
        })
        .collect()
}

/// Smallest index at which the cumulative squared singular values reach `fraction` of the total
///
/// Returns `None` for an empty or all-zero spectrum.
pub fn top_components(singular_values: &[f64], fraction: f64) -> Result<Option<usize>> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(SynthError::InvalidParameter(format!(
            "energy fraction must be within [0, 1], got {}",
            fraction
        )));
    }

    let power: f64 = singular_values.iter().map(|s| s * s).sum();
    if power <= 0.0 {
        return Ok(None);
    }

    let mut cumulative = 0.0;
    for (i, s) in singular_values.iter().enumerate() {
        cumulative += s * s;
        if cumulative >= fraction * power {
            return Ok(Some(i));
        }
    }

    // Rounding can leave the running sum a hair below the total
    Ok(Some(singular_values.len() - 1))
}
