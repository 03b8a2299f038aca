//! HTTP API предсказателя рейтинга

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};

use crate::error::{PipelineError, Result};
use crate::predictor::Predictor;
use crate::types::PredictionResponse;

pub fn router(predictor: Arc<Predictor>) -> Router {
    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/predict", post(predict))
        .layer(cors)
        .with_state(predictor)
}

pub async fn serve(predictor: Arc<Predictor>, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, router(predictor)).await?;
    Ok(())
}

async fn root() -> Json<Value> {
    Json(serde_json::json!({
        "message": "Player Rating API",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn health(State(predictor): State<Arc<Predictor>>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "features": predictor.feature_names(),
    }))
}

async fn predict(
    State(predictor): State<Arc<Predictor>>,
    Json(request): Json<Value>,
) -> std::result::Result<Json<PredictionResponse>, ApiError> {
    let response = predictor.predict_json(&request)?;
    tracing::info!("Predicted rating {:.2}", response.prediction);
    Ok(Json(response))
}

struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            PipelineError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Prediction failed: {}", self.0);
        } else {
            tracing::warn!("Rejected request: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}
