use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::transfusion::domain::{LabValues, PatientContext, TransfusionEvent};
use crate::workflows::transfusion::features::FEATURE_COLUMNS;
use crate::workflows::transfusion::model::{
    InferenceError, LinearRegressor, ModelArtifact, ModelMetadata, Regressor,
};

pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Three transfusions exactly 21 days apart.
pub(super) fn regular_history() -> Vec<TransfusionEvent> {
    [date(2024, 1, 1), date(2024, 1, 22), date(2024, 2, 12)]
        .into_iter()
        .map(|date| TransfusionEvent {
            date,
            units: 2.0,
            hb_value: 8.6,
        })
        .collect()
}

pub(super) fn patient(history: Vec<TransfusionEvent>) -> PatientContext {
    PatientContext {
        patient_id: "patient_42".to_string(),
        history,
        last_hb: 9.2,
        age: 14.0,
        weight_kg: 38.5,
        comorbidities: Vec::new(),
        current_date: date(2024, 3, 1),
        labs: LabValues::default(),
    }
}

fn canonical_metadata() -> ModelMetadata {
    let mut metadata = ModelMetadata::new(FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect());
    metadata
        .feature_importance
        .insert("mean_interval_days".to_string(), 0.62);
    metadata.feature_importance.insert("last_hb".to_string(), 0.21);
    metadata.model_version = Some("2024.03-test".to_string());
    metadata
}

/// Linear model predicting `mean_interval_days + intercept`.
pub(super) fn interval_model(intercept: f64) -> ModelArtifact {
    let mut coefficients = vec![0.0; FEATURE_COLUMNS.len()];
    coefficients[0] = 1.0;
    ModelArtifact::new(
        canonical_metadata(),
        LinearRegressor {
            intercept,
            coefficients,
        },
    )
    .expect("model is consistent")
}

pub(super) fn artifact_with<R: Regressor + 'static>(regressor: R) -> ModelArtifact {
    ModelArtifact::new(canonical_metadata(), regressor).expect("model is consistent")
}

#[derive(Debug, Clone, Default)]
pub(super) struct CountingRegressor {
    pub(super) calls: Arc<AtomicUsize>,
}

impl Regressor for CountingRegressor {
    fn feature_count(&self) -> usize {
        FEATURE_COLUMNS.len()
    }

    fn predict(&self, _row: &[f64]) -> Result<f64, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(30.0)
    }
}

#[derive(Debug)]
pub(super) struct FailingRegressor;

impl Regressor for FailingRegressor {
    fn feature_count(&self) -> usize {
        FEATURE_COLUMNS.len()
    }

    fn predict(&self, _row: &[f64]) -> Result<f64, InferenceError> {
        Err(InferenceError::Backend("booster unavailable".to_string()))
    }
}

#[derive(Debug)]
pub(super) struct ConstantRegressor(pub(super) f64);

impl Regressor for ConstantRegressor {
    fn feature_count(&self) -> usize {
        FEATURE_COLUMNS.len()
    }

    fn predict(&self, _row: &[f64]) -> Result<f64, InferenceError> {
        Ok(self.0)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
