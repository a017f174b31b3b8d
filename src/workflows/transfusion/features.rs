use super::domain::{PatientContext, TransfusionEvent};
use chrono::Datelike;
use std::collections::BTreeMap;

/// Interval assumed when the history holds fewer than two events.
pub const DEFAULT_INTERVAL_DAYS: f64 = 21.0;

/// Canonical column order of the derived features.
pub const FEATURE_COLUMNS: [&str; 11] = [
    "mean_interval_days",
    "hb_trend",
    "units_per_transfusion_avg",
    "days_since_last_transfusion",
    "age",
    "weightKg",
    "month",
    "day_of_week",
    "has_comorbidities",
    "last_hb",
    "last_units",
];

/// Numeric summary of a patient's history, keyed by [`FEATURE_COLUMNS`] plus any supplied labs.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub mean_interval_days: f64,
    pub hb_trend: f64,
    pub units_per_transfusion_avg: f64,
    pub days_since_last_transfusion: f64,
    pub age: f64,
    pub weight_kg: f64,
    pub month: f64,
    /// Monday is 0.
    pub day_of_week: f64,
    pub has_comorbidities: f64,
    pub last_hb: f64,
    pub last_units: f64,
    pub labs: Vec<(&'static str, f64)>,
}

impl FeatureVector {
    /// Value for a named column, or `None` when the column is not produced.
    pub fn get(&self, column: &str) -> Option<f64> {
        let value = match column {
            "mean_interval_days" => self.mean_interval_days,
            "hb_trend" => self.hb_trend,
            "units_per_transfusion_avg" => self.units_per_transfusion_avg,
            "days_since_last_transfusion" => self.days_since_last_transfusion,
            "age" => self.age,
            "weightKg" => self.weight_kg,
            "month" => self.month,
            "day_of_week" => self.day_of_week,
            "has_comorbidities" => self.has_comorbidities,
            "last_hb" => self.last_hb,
            "last_units" => self.last_units,
            other => {
                return self
                    .labs
                    .iter()
                    .find(|(name, _)| *name == other)
                    .map(|(_, value)| *value)
            }
        };
        Some(value)
    }

    /// All produced columns in canonical order, labs last.
    pub fn columns(&self) -> Vec<(&'static str, f64)> {
        FEATURE_COLUMNS
            .iter()
            .filter_map(|name| self.get(name).map(|value| (*name, value)))
            .chain(self.labs.iter().copied())
            .collect()
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.columns()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }
}

/// Derives the feature vector, or `None` when the history is empty.
pub fn derive_features(context: &PatientContext) -> Option<FeatureVector> {
    let history = context.chronological_history();
    let last = *history.last()?;

    let hb_values: Vec<f64> = history.iter().map(|event| event.hb_value).collect();
    let units_total: f64 = history.iter().map(|event| event.units).sum();

    Some(FeatureVector {
        mean_interval_days: mean_interval_days(&history).unwrap_or(DEFAULT_INTERVAL_DAYS),
        hb_trend: least_squares_slope(&hb_values),
        units_per_transfusion_avg: units_total / history.len() as f64,
        days_since_last_transfusion: (context.current_date - last.date).num_days() as f64,
        age: context.age,
        weight_kg: context.weight_kg,
        month: f64::from(context.current_date.month()),
        day_of_week: f64::from(context.current_date.weekday().num_days_from_monday()),
        has_comorbidities: if context.comorbidities.is_empty() { 0.0 } else { 1.0 },
        last_hb: context.last_hb,
        last_units: last.units,
        labs: context.labs.present(),
    })
}

/// Mean gap in days between consecutive events of a date-sorted history.
pub(crate) fn mean_interval_days(history: &[TransfusionEvent]) -> Option<f64> {
    if history.len() < 2 {
        return None;
    }
    let gaps: Vec<f64> = history
        .windows(2)
        .map(|pair| (pair[1].date - pair[0].date).num_days() as f64)
        .collect();
    Some(gaps.iter().sum::<f64>() / gaps.len() as f64)
}

/// Slope of a first-degree fit of `values` against their index.
fn least_squares_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let (numerator, denominator) = values.iter().enumerate().fold(
        (0.0, 0.0),
        |(numerator, denominator), (index, value)| {
            let dx = index as f64 - x_mean;
            (numerator + dx * (value - y_mean), denominator + dx * dx)
        },
    );

    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
