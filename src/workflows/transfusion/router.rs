use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use super::domain::{TransfusionPrediction, TransfusionPredictionRequest};
use super::predictor::TransfusionPredictor;
use crate::error::AppError;

/// Router exposing the transfusion forecast and the loaded model's metadata.
pub fn transfusion_router(predictor: Arc<TransfusionPredictor>) -> Router {
    Router::new()
        .route("/predict-next-transfusion", post(predict_handler))
        .route("/model-info", get(model_info_handler))
        .with_state(predictor)
}

pub(crate) async fn predict_handler(
    State(predictor): State<Arc<TransfusionPredictor>>,
    payload: Result<Json<TransfusionPredictionRequest>, JsonRejection>,
) -> Result<Json<TransfusionPrediction>, AppError> {
    let Json(request) = payload?;
    let prediction = predictor.handle(&request)?;

    tracing::info!(
        patient = %prediction.patient_id,
        method = ?prediction.method,
        next_date = %prediction.predicted_next_date,
        "transfusion forecast served"
    );

    Ok(Json(prediction))
}

pub(crate) async fn model_info_handler(
    State(predictor): State<Arc<TransfusionPredictor>>,
) -> Response {
    match predictor.model() {
        Some(model) => (StatusCode::OK, Json(model.metadata().info())).into_response(),
        None => {
            let payload = json!({
                "error": "Model not loaded",
                "fallback": "rule_based",
            });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
    }
}
