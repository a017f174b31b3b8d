use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default identifier attached to results when the caller omits `patientId`.
pub const UNKNOWN_PATIENT: &str = "unknown";

/// One recorded transfusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransfusionEvent {
    pub date: NaiveDate,
    pub units: f64,
    /// Pre-transfusion hemoglobin, g/dL.
    pub hb_value: f64,
}

/// Optional thalassemia labs echoed alongside the derived features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LabValues {
    pub ferritin: Option<f64>,
    pub sgpt: Option<f64>,
    pub sgot: Option<f64>,
    pub creatinine: Option<f64>,
}

impl LabValues {
    /// Supplied labs in a stable order, skipping absent values.
    pub fn present(&self) -> Vec<(&'static str, f64)> {
        [
            ("ferritin", self.ferritin),
            ("sgpt", self.sgpt),
            ("sgot", self.sgot),
            ("creatinine", self.creatinine),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, value)))
        .collect()
    }
}

/// Validated patient snapshot consumed by the predictors.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientContext {
    pub patient_id: String,
    pub history: Vec<TransfusionEvent>,
    pub last_hb: f64,
    pub age: f64,
    pub weight_kg: f64,
    pub comorbidities: Vec<String>,
    pub current_date: NaiveDate,
    pub labs: LabValues,
}

impl PatientContext {
    /// History ordered by date. Events sharing a date keep their submitted order.
    pub fn chronological_history(&self) -> Vec<TransfusionEvent> {
        let mut events = self.history.clone();
        events.sort_by_key(|event| event.date);
        events
    }

    pub fn most_recent_event(&self) -> Option<TransfusionEvent> {
        self.chronological_history().last().copied()
    }
}

/// How a prediction was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    Ml,
    RuleBased,
}

/// Prediction envelope returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransfusionPrediction {
    pub predicted_next_date: NaiveDate,
    pub confidence: f64,
    pub explanation: String,
    pub method: PredictionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<BTreeMap<String, f64>>,
    pub patient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// History entry as it arrives on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub units: Option<f64>,
    #[serde(default)]
    pub hb_value: Option<f64>,
}

/// Raw prediction request. Required fields are optional here so that validation can name
/// every gap in one response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransfusionPredictionRequest {
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub history: Option<Vec<HistoryEntry>>,
    #[serde(default)]
    pub last_hb: Option<f64>,
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub comorbidities: Option<Vec<String>>,
    #[serde(default)]
    pub current_date: Option<String>,
    #[serde(default)]
    pub ferritin: Option<f64>,
    #[serde(default)]
    pub sgpt: Option<f64>,
    #[serde(default)]
    pub sgot: Option<f64>,
    #[serde(default)]
    pub creatinine: Option<f64>,
}

/// A field that was present but unusable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidField {
    pub field: String,
    pub reason: String,
}

impl InvalidField {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Every violation found in a prediction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRequestError {
    pub missing: Vec<&'static str>,
    pub invalid: Vec<InvalidField>,
}

impl fmt::Display for PredictionRequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("Missing required fields: {}", self.missing.join(", ")));
        }
        if !self.invalid.is_empty() {
            let details: Vec<String> = self
                .invalid
                .iter()
                .map(|issue| format!("{} ({})", issue.field, issue.reason))
                .collect();
            parts.push(format!("Invalid fields: {}", details.join(", ")));
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for PredictionRequestError {}

pub(crate) fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

impl TransfusionPredictionRequest {
    pub fn validate(&self) -> Result<PatientContext, PredictionRequestError> {
        let mut missing = Vec::new();
        let mut invalid = Vec::new();

        let history = match &self.history {
            Some(entries) => Some(validate_history(entries, self.last_hb, &mut invalid)),
            None => {
                missing.push("history");
                None
            }
        };

        let last_hb = required_number(self.last_hb, "lastHb", &mut missing, &mut invalid);
        let age = required_number(self.age, "age", &mut missing, &mut invalid);
        let weight_kg = required_number(self.weight_kg, "weightKg", &mut missing, &mut invalid);

        let current_date = match self.current_date.as_deref() {
            Some(raw) => {
                let parsed = parse_calendar_date(raw);
                if parsed.is_none() {
                    invalid.push(InvalidField::new("currentDate", "expected YYYY-MM-DD"));
                }
                parsed
            }
            None => {
                missing.push("currentDate");
                None
            }
        };

        match (history, last_hb, age, weight_kg, current_date) {
            (Some(history), Some(last_hb), Some(age), Some(weight_kg), Some(current_date))
                if invalid.is_empty() =>
            {
                Ok(PatientContext {
                    patient_id: self
                        .patient_id
                        .clone()
                        .filter(|id| !id.trim().is_empty())
                        .unwrap_or_else(|| UNKNOWN_PATIENT.to_string()),
                    history,
                    last_hb,
                    age,
                    weight_kg,
                    comorbidities: self.comorbidities.clone().unwrap_or_default(),
                    current_date,
                    labs: LabValues {
                        ferritin: supplied_lab(self.ferritin),
                        sgpt: supplied_lab(self.sgpt),
                        sgot: supplied_lab(self.sgot),
                        creatinine: supplied_lab(self.creatinine),
                    },
                })
            }
            _ => Err(PredictionRequestError { missing, invalid }),
        }
    }
}

fn required_number(
    value: Option<f64>,
    field: &'static str,
    missing: &mut Vec<&'static str>,
    invalid: &mut Vec<InvalidField>,
) -> Option<f64> {
    match value {
        None => {
            missing.push(field);
            None
        }
        Some(number) if !number.is_finite() || number < 0.0 => {
            invalid.push(InvalidField::new(field, "must be a non-negative number"));
            None
        }
        Some(number) => Some(number),
    }
}

fn validate_history(
    entries: &[HistoryEntry],
    last_hb: Option<f64>,
    invalid: &mut Vec<InvalidField>,
) -> Vec<TransfusionEvent> {
    let mut events = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let date = match entry.date.as_deref() {
            Some(raw) => match parse_calendar_date(raw) {
                Some(date) => Some(date),
                None => {
                    invalid.push(InvalidField::new(
                        format!("history[{index}].date"),
                        "expected YYYY-MM-DD",
                    ));
                    None
                }
            },
            None => {
                invalid.push(InvalidField::new(format!("history[{index}].date"), "required"));
                None
            }
        };

        let units = entry.units.unwrap_or(1.0);
        if !units.is_finite() || units < 0.0 {
            invalid.push(InvalidField::new(
                format!("history[{index}].units"),
                "must be a non-negative number",
            ));
            continue;
        }

        // Entries without a reading inherit the latest Hb; when that is missing too the
        // request already fails on `lastHb`.
        let hb_value = entry.hb_value.or(last_hb).unwrap_or_default();

        if let Some(date) = date {
            events.push(TransfusionEvent {
                date,
                units,
                hb_value,
            });
        }
    }

    events
}

fn supplied_lab(value: Option<f64>) -> Option<f64> {
    value.filter(|value| value.is_finite() && *value != 0.0)
}
