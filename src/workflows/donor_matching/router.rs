use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use super::domain::DonorRankingRequest;
use super::ranking::{rank_donors, DonorRanking};

/// Router exposing the donor ranking endpoint.
pub fn donor_router() -> Router {
    Router::new().route("/predict-donor", post(predict_donor_handler))
}

#[derive(Debug, Serialize)]
struct DonorRankingResponse {
    #[serde(flatten)]
    ranking: DonorRanking,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

pub(crate) async fn predict_donor_handler(
    payload: Result<Json<DonorRankingRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            let payload = json!({
                "error": format!("Invalid request body: {}", rejection.body_text()),
            });
            return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
        }
    };

    let recipient = match request.validate() {
        Ok(recipient) => recipient,
        Err(error) => {
            let payload = json!({
                "error": "Blood type and location are required",
                "missingFields": error.missing_fields(),
            });
            return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
        }
    };

    let ranking = rank_donors(&recipient, &request.donors, Utc::now());
    let message = request.donors.is_empty().then_some("No donors provided");

    tracing::info!(
        total = ranking.total_donors,
        returned = ranking.predictions.len(),
        urgency = recipient.urgency.label(),
        "donor ranking served"
    );

    (
        StatusCode::OK,
        Json(DonorRankingResponse { ranking, message }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::donor_matching::domain::{Donor, Location};
    use tower::ServiceExt;

    async fn read_json_body(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    #[tokio::test]
    async fn handler_rejects_missing_blood_type() {
        let request = DonorRankingRequest {
            location: Some(Location::new("Mumbai", "Maharashtra")),
            donors: vec![Donor {
                donor_id: Some("d-1".to_string()),
                blood_type: Some("O+".to_string()),
                ..Donor::default()
            }],
            ..DonorRankingRequest::default()
        };

        let response = predict_donor_handler(Ok(Json(request))).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = read_json_body(response).await;
        assert_eq!(payload["missingFields"], json!(["bloodType"]));
        assert!(payload.get("predictions").is_none());
    }

    #[tokio::test]
    async fn handler_returns_message_for_empty_roster() {
        let request = DonorRankingRequest {
            blood_type: Some("A+".to_string()),
            location: Some(Location::new("Delhi", "Delhi")),
            ..DonorRankingRequest::default()
        };

        let response = predict_donor_handler(Ok(Json(request))).await;

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json_body(response).await;
        assert_eq!(payload["predictions"], json!([]));
        assert_eq!(payload["message"], "No donors provided");
        assert_eq!(payload["urgency"], "normal");
    }

    #[tokio::test]
    async fn route_rejects_malformed_json() {
        let response = donor_router()
            .oneshot(
                axum::http::Request::post("/predict-donor")
                    .header(axum::http::header::CONTENT_TYPE, "application/json")
                    .body(axum::body::Body::from("{\"bloodType\": "))
                    .unwrap(),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payload = read_json_body(response).await;
        assert!(payload["error"]
            .as_str()
            .unwrap_or_default()
            .starts_with("Invalid request body"));
    }
}
