use super::domain::{
    PatientContext, PredictionMethod, PredictionRequestError, TransfusionPrediction,
    TransfusionPredictionRequest,
};
use super::features::{derive_features, FeatureVector};
use super::model::{InferenceError, ModelArtifact};
use super::rules::{self, MIN_INTERVAL_DAYS};
use chrono::Duration;
use std::sync::Arc;

/// Confidence reported for model-backed predictions.
pub const MODEL_CONFIDENCE: f64 = 0.85;

/// Why the rule-based estimator answered instead of the model.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    ModelUnavailable,
    InsufficientHistory,
    InferenceFailed(String),
}

impl FallbackReason {
    pub fn describe(&self) -> String {
        match self {
            FallbackReason::ModelUnavailable => "model not loaded".to_string(),
            FallbackReason::InsufficientHistory => "no transfusion history".to_string(),
            FallbackReason::InferenceFailed(detail) => format!("model inference failed: {detail}"),
        }
    }
}

/// Model-backed estimate for a patient with at least one recorded transfusion.
pub fn predict_with_model(
    model: &ModelArtifact,
    context: &PatientContext,
    features: &FeatureVector,
) -> Result<TransfusionPrediction, InferenceError> {
    let last = context
        .most_recent_event()
        .ok_or_else(|| InferenceError::Backend("history is empty".to_string()))?;

    let raw_days = model.predict_days(features)?;
    let predicted_days = raw_days.max(MIN_INTERVAL_DAYS).trunc() as i64;
    let predicted_next_date = Duration::try_days(predicted_days)
        .and_then(|offset| last.date.checked_add_signed(offset))
        .ok_or(InferenceError::OutOfRange(raw_days))?;

    let top_feature = model.metadata().top_feature().unwrap_or("mean_interval_days");
    let explanation = format!(
        "ML prediction based on: {top_feature} (primary factor), mean interval {:.1} days, Hb trend {:.2}",
        features.mean_interval_days, features.hb_trend
    );

    Ok(TransfusionPrediction {
        predicted_next_date,
        confidence: MODEL_CONFIDENCE,
        explanation,
        method: PredictionMethod::Ml,
        predicted_days: Some(predicted_days),
        features: Some(features.to_map()),
        patient_id: context.patient_id.clone(),
        fallback_reason: None,
    })
}

/// Picks the model when one is loaded and usable, otherwise the rules.
#[derive(Debug, Clone, Default)]
pub struct TransfusionPredictor {
    model: Option<Arc<ModelArtifact>>,
}

impl TransfusionPredictor {
    pub fn new(model: Option<Arc<ModelArtifact>>) -> Self {
        Self { model }
    }

    pub fn rule_based() -> Self {
        Self::default()
    }

    pub fn model(&self) -> Option<&ModelArtifact> {
        self.model.as_deref()
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Validates a raw request and predicts for it.
    pub fn handle(
        &self,
        request: &TransfusionPredictionRequest,
    ) -> Result<TransfusionPrediction, PredictionRequestError> {
        let context = request.validate()?;
        Ok(self.predict(&context))
    }

    /// Never fails: any problem on the model path degrades to the rule-based estimate.
    pub fn predict(&self, context: &PatientContext) -> TransfusionPrediction {
        let Some(model) = self.model.as_deref() else {
            return fallback(context, FallbackReason::ModelUnavailable);
        };
        let Some(features) = derive_features(context) else {
            return fallback(context, FallbackReason::InsufficientHistory);
        };

        match predict_with_model(model, context, &features) {
            Ok(prediction) => {
                tracing::debug!(
                    patient = %context.patient_id,
                    days = prediction.predicted_days,
                    "model prediction"
                );
                prediction
            }
            Err(error) => {
                tracing::warn!(
                    patient = %context.patient_id,
                    error = %error,
                    "model prediction failed, using rule-based estimate"
                );
                fallback(context, FallbackReason::InferenceFailed(error.to_string()))
            }
        }
    }
}

fn fallback(context: &PatientContext, reason: FallbackReason) -> TransfusionPrediction {
    let estimate = rules::estimate(context);
    tracing::debug!(
        patient = %context.patient_id,
        reason = %reason.describe(),
        "rule-based estimate"
    );
    TransfusionPrediction {
        predicted_next_date: estimate.next_date,
        confidence: estimate.confidence,
        explanation: estimate.explanation,
        method: PredictionMethod::RuleBased,
        predicted_days: None,
        features: None,
        patient_id: context.patient_id.clone(),
        fallback_reason: Some(reason.describe()),
    }
}
