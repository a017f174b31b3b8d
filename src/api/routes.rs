use super::infra::AppState;
use crate::workflows::donor_matching::donor_router;
use crate::workflows::transfusion::{transfusion_router, TransfusionPredictor};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;

/// Business routes plus health and index. Handler panics become 500 responses.
pub fn service_router(predictor: Arc<TransfusionPredictor>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(healthcheck))
        .with_state(predictor.clone())
        .merge(donor_router())
        .merge(transfusion_router(predictor))
        .layer(CatchPanicLayer::custom(panic_response))
}

pub(crate) fn with_operational_routes(router: Router) -> Router {
    router
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "message": "ThalAI Guardian AI Service",
        "endpoints": {
            "/health": "GET - Health check",
            "/ready": "GET - Readiness check",
            "/metrics": "GET - Prometheus metrics",
            "/model-info": "GET - Loaded transfusion model metadata",
            "/predict-donor": "POST - Rank compatible donors",
            "/predict-next-transfusion": "POST - Forecast the next transfusion date",
        }
    }))
}

pub(crate) async fn healthcheck(
    State(predictor): State<Arc<TransfusionPredictor>>,
) -> Json<serde_json::Value> {
    let model_version = predictor
        .model()
        .map(|model| model.version().unwrap_or("unknown").to_string());

    Json(json!({
        "status": "healthy",
        "modelLoaded": predictor.has_model(),
        "modelVersion": model_version,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Acquire);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unexpected error".to_string()
    };

    tracing::error!(%detail, "request handler panicked");

    let payload = json!({ "error": format!("Prediction failed: {detail}") });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    async fn read_json_body(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    fn state(ready: bool) -> AppState {
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        }
    }

    #[tokio::test]
    async fn healthcheck_reports_missing_model() {
        let Json(payload) = healthcheck(State(Arc::new(TransfusionPredictor::rule_based()))).await;

        assert_eq!(payload["status"], "healthy");
        assert_eq!(payload["modelLoaded"], false);
        assert!(payload["modelVersion"].is_null());
        assert!(payload["timestamp"].is_string());
    }

    #[tokio::test]
    async fn readiness_tracks_flag() {
        let response = readiness_endpoint(Extension(state(false))).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = readiness_endpoint(Extension(state(true))).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json_body(response).await["status"], "ready");
    }

    #[tokio::test]
    async fn operational_routes_are_served_with_state() {
        let router = with_operational_routes(service_router(Arc::new(
            TransfusionPredictor::rule_based(),
        )))
        .layer(Extension(state(true)));

        let response = router
            .oneshot(
                axum::http::Request::get("/metrics")
                    .body(axum::body::Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }

    #[test]
    fn panic_payloads_become_prediction_failures() {
        let response = panic_response(Box::new("regressor exploded"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
