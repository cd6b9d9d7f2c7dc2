//! Relay server
//!
//! Stateless forwarder between the login form and the classification
//! service. Each request is independent: the feature vector goes to the
//! classifier unchanged and the classifier's prediction comes back verbatim.
//!
//! ```text
//! form ──POST /api/check-human──▶ relay ──POST /predict──▶ classifier
//!      ◀──── { result } ─────────       ◀── { prediction } ─
//! ```

use crate::config::RelayConfig;
use crate::error::GateError;
use crate::relay::types::{
    CheckHumanRequest, CheckHumanResponse, ErrorBody, HealthResponse, PredictRequest,
    PredictResponse,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

/// Body message for every classifier failure; the cause is only logged
pub const UPSTREAM_ERROR_MESSAGE: &str = "Prediction server error";

/// Shared, read-only handler state
#[derive(Clone)]
pub struct RelayState {
    http: reqwest::Client,
    predict_url: Arc<str>,
}

impl RelayState {
    pub fn new(config: &RelayConfig) -> Result<Self, GateError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.classifier_timeout())
            .build()
            .map_err(|e| GateError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            predict_url: Arc::from(config.predict_url()),
        })
    }

    pub fn predict_url(&self) -> &str {
        &self.predict_url
    }
}

/// Relay handler errors
#[derive(Debug)]
pub enum RelayServerError {
    /// The request body is not `{ "features": [20 numbers] }`
    BadRequest(String),
    /// The classifier could not be reached or answered unusably
    Upstream(String),
}

impl IntoResponse for RelayServerError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            RelayServerError::BadRequest(msg) => {
                tracing::debug!("Rejected check request: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            RelayServerError::Upstream(msg) => {
                tracing::error!("Classifier error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    UPSTREAM_ERROR_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<JsonRejection> for RelayServerError {
    fn from(rejection: JsonRejection) -> Self {
        RelayServerError::BadRequest(rejection.body_text())
    }
}

/// Build the relay router
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/check-human", post(check_human))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind the configured port and serve until the process stops
pub async fn serve(config: RelayConfig) -> Result<(), GateError> {
    let state = RelayState::new(&config)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| GateError::ConfigError(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Relay listening on http://{}", addr);
    tracing::info!("Forwarding to {}", state.predict_url());

    serve_on(listener, state).await
}

/// Serve on an already bound listener
pub async fn serve_on(listener: tokio::net::TcpListener, state: RelayState) -> Result<(), GateError> {
    axum::serve(listener, router(state))
        .await
        .map_err(|e| GateError::ConfigError(format!("Relay server stopped: {}", e)))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

async fn check_human(
    State(state): State<RelayState>,
    payload: Result<Json<CheckHumanRequest>, JsonRejection>,
) -> Result<Json<CheckHumanResponse>, RelayServerError> {
    let Json(request) = payload?;
    let request_id = Uuid::new_v4();
    tracing::debug!(%request_id, "forwarding feature vector");

    let prediction = forward(&state, PredictRequest {
        features: request.features,
    })
    .await
    .map_err(|e| RelayServerError::Upstream(format!("[{}] {}", request_id, e)))?;

    tracing::info!(%request_id, %prediction, "classifier answered");
    Ok(Json(CheckHumanResponse { result: prediction }))
}

async fn forward(state: &RelayState, body: PredictRequest) -> Result<serde_json::Value, String> {
    let response = state
        .http
        .post(state.predict_url())
        .json(&body)
        .send()
        .await
        .map_err(|e| format!("request to {} failed: {}", state.predict_url(), e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("classifier answered with status {}", status.as_u16()));
    }

    let body: PredictResponse = response
        .json()
        .await
        .map_err(|e| format!("undecodable classifier response: {}", e))?;

    if body.prediction.is_null() {
        return Err("classifier returned a null prediction".to_string());
    }
    Ok(body.prediction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn unreachable_classifier() -> RelayState {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        RelayState::new(&RelayConfig {
            port: 0,
            classifier_url: format!("http://127.0.0.1:{}", port),
            classifier_timeout_secs: 2,
        })
        .unwrap()
    }

    async fn read_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn check_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/check-human")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(unreachable_classifier());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_classifier_down_returns_generic_500() {
        let app = router(unreachable_classifier());
        let body = serde_json::json!({ "features": vec![0.0; 20] }).to_string();
        let response = app.oneshot(check_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert_eq!(body, serde_json::json!({ "error": UPSTREAM_ERROR_MESSAGE }));
    }

    #[tokio::test]
    async fn test_wrong_vector_length_is_bad_request() {
        let app = router(unreachable_classifier());
        let body = serde_json::json!({ "features": [1.0, 2.0, 3.0] }).to_string();
        let response = app.oneshot(check_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("expected 20 values"));
    }

    #[tokio::test]
    async fn test_missing_features_is_bad_request() {
        let app = router(unreachable_classifier());
        let response = app
            .oneshot(check_request(r#"{ "vector": [] }"#.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cors_preflight_allowed() {
        let app = router(unreachable_classifier());
        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/check-human")
                    .header("origin", "http://localhost:5173")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_success());
        assert!(response
            .headers()
            .contains_key("access-control-allow-origin"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = RelayState::new(&RelayConfig {
            classifier_url: "nowhere".to_string(),
            ..RelayConfig::default()
        });
        assert!(result.is_err());
    }
}
