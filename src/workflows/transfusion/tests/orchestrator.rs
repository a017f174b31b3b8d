use super::common::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::workflows::transfusion::domain::{PredictionMethod, TransfusionPredictionRequest};
use crate::workflows::transfusion::model::{LinearRegressor, ModelArtifact, ModelMetadata};
use crate::workflows::transfusion::predictor::{TransfusionPredictor, MODEL_CONFIDENCE};

#[test]
fn without_model_rules_answer() {
    let predictor = TransfusionPredictor::rule_based();

    let prediction = predictor.predict(&patient(regular_history()));

    assert_eq!(prediction.method, PredictionMethod::RuleBased);
    assert_eq!(prediction.predicted_next_date, date(2024, 3, 4));
    assert_eq!(prediction.confidence, 0.75);
    assert_eq!(prediction.fallback_reason.as_deref(), Some("model not loaded"));
    assert!(prediction.features.is_none());
    assert_eq!(prediction.patient_id, "patient_42");
}

#[test]
fn model_predicts_from_last_event() {
    let predictor = TransfusionPredictor::new(Some(Arc::new(interval_model(2.0))));

    let prediction = predictor.predict(&patient(regular_history()));

    assert_eq!(prediction.method, PredictionMethod::Ml);
    assert_eq!(prediction.confidence, MODEL_CONFIDENCE);
    assert_eq!(prediction.predicted_days, Some(23));
    assert_eq!(prediction.predicted_next_date, date(2024, 3, 6));
    assert_eq!(
        prediction.explanation,
        "ML prediction based on: mean_interval_days (primary factor), mean interval 21.0 days, Hb trend 0.00"
    );
    let features = prediction.features.expect("features are echoed");
    assert_eq!(features.get("mean_interval_days"), Some(&21.0));
    assert_eq!(features.get("days_since_last_transfusion"), Some(&18.0));
    assert!(prediction.fallback_reason.is_none());
}

#[test]
fn model_output_is_floored_to_a_week() {
    let predictor = TransfusionPredictor::new(Some(Arc::new(interval_model(-50.0))));

    let prediction = predictor.predict(&patient(regular_history()));

    assert_eq!(prediction.method, PredictionMethod::Ml);
    assert_eq!(prediction.predicted_days, Some(7));
    assert_eq!(prediction.predicted_next_date, date(2024, 2, 19));
}

#[test]
fn fractional_model_output_is_truncated() {
    let predictor = TransfusionPredictor::new(Some(Arc::new(artifact_with(ConstantRegressor(
        19.9,
    )))));

    let prediction = predictor.predict(&patient(regular_history()));

    assert_eq!(prediction.predicted_days, Some(19));
    assert_eq!(prediction.predicted_next_date, date(2024, 3, 2));
}

#[test]
fn empty_history_never_reaches_the_model() {
    let regressor = CountingRegressor::default();
    let calls = regressor.calls.clone();
    let predictor = TransfusionPredictor::new(Some(Arc::new(artifact_with(regressor))));

    let prediction = predictor.predict(&patient(Vec::new()));

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(prediction.method, PredictionMethod::RuleBased);
    assert_eq!(prediction.predicted_next_date, date(2024, 3, 22));
    assert_eq!(prediction.confidence, 0.5);
    assert_eq!(
        prediction.fallback_reason.as_deref(),
        Some("no transfusion history")
    );
}

#[test]
fn model_is_consulted_once_per_prediction() {
    let regressor = CountingRegressor::default();
    let calls = regressor.calls.clone();
    let predictor = TransfusionPredictor::new(Some(Arc::new(artifact_with(regressor))));

    predictor.predict(&patient(regular_history()));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn inference_failure_degrades_to_rules() {
    let predictor = TransfusionPredictor::new(Some(Arc::new(artifact_with(FailingRegressor))));

    let prediction = predictor.predict(&patient(regular_history()));

    assert_eq!(prediction.method, PredictionMethod::RuleBased);
    assert_eq!(prediction.predicted_next_date, date(2024, 3, 4));
    let reason = prediction.fallback_reason.expect("reason recorded");
    assert!(reason.contains("booster unavailable"), "{reason}");
}

#[test]
fn non_finite_output_degrades_to_rules() {
    let predictor = TransfusionPredictor::new(Some(Arc::new(artifact_with(ConstantRegressor(
        f64::NAN,
    )))));

    let prediction = predictor.predict(&patient(regular_history()));

    assert_eq!(prediction.method, PredictionMethod::RuleBased);
    assert!(prediction
        .fallback_reason
        .unwrap_or_default()
        .contains("non-finite"));
}

#[test]
fn oversized_model_output_degrades_to_rules() {
    let predictor = TransfusionPredictor::new(Some(Arc::new(artifact_with(ConstantRegressor(
        1.0e12,
    )))));

    let prediction = predictor.predict(&patient(regular_history()));

    assert_eq!(prediction.method, PredictionMethod::RuleBased);
    assert_eq!(prediction.predicted_next_date, date(2024, 3, 4));
    assert!(prediction
        .fallback_reason
        .unwrap_or_default()
        .contains("out of range"));
}

#[test]
fn unknown_model_column_degrades_to_rules() {
    let metadata = ModelMetadata::new(vec!["serum_iron".to_string()]);
    let artifact = ModelArtifact::new(
        metadata,
        LinearRegressor {
            intercept: 0.0,
            coefficients: vec![1.0],
        },
    )
    .expect("model is consistent");
    let predictor = TransfusionPredictor::new(Some(Arc::new(artifact)));

    let prediction = predictor.predict(&patient(regular_history()));

    assert_eq!(prediction.method, PredictionMethod::RuleBased);
    assert!(prediction
        .fallback_reason
        .unwrap_or_default()
        .contains("serum_iron"));
}

#[test]
fn supplied_labs_can_feed_the_model() {
    let metadata = ModelMetadata::new(vec!["ferritin".to_string()]);
    let artifact = ModelArtifact::new(
        metadata,
        LinearRegressor {
            intercept: 0.0,
            coefficients: vec![0.01],
        },
    )
    .expect("model is consistent");
    let predictor = TransfusionPredictor::new(Some(Arc::new(artifact)));
    let mut context = patient(regular_history());
    context.labs.ferritin = Some(2500.0);

    let prediction = predictor.predict(&context);

    assert_eq!(prediction.method, PredictionMethod::Ml);
    assert_eq!(prediction.predicted_days, Some(25));
    assert!(prediction.explanation.contains("ferritin (primary factor)"));
}

#[test]
fn handle_rejects_incomplete_requests() {
    let predictor = TransfusionPredictor::rule_based();
    let request = TransfusionPredictionRequest {
        last_hb: Some(8.0),
        ..TransfusionPredictionRequest::default()
    };

    let error = predictor.handle(&request).expect_err("request incomplete");

    assert_eq!(error.missing, vec!["history", "age", "weightKg", "currentDate"]);
}
