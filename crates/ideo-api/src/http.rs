use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::error::PipelineError;
use crate::pipeline::Pipeline;

/// Header carrying the caller identity.
pub const IDENTITY_HEADER: &str = "x-user-id";
pub const GENERATE_PATH: &str = "/api/generate-idea";

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.public_message(),
            detail: self.detail(),
        };
        (self.status(), Json(body)).into_response()
    }
}

pub fn router(pipeline: Pipeline) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(IDENTITY_HEADER)]);

    Router::new()
        .route("/healthz", get(healthz))
        .route(
            GENERATE_PATH,
            post(generate_idea)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .layer(cors)
        .with_state(pipeline)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody {
            error: "Méthode non autorisée".to_string(),
            detail: None,
        }),
    )
}

async fn generate_idea(State(pipeline): State<Pipeline>, headers: HeaderMap) -> Response {
    // a non UTF-8 header value counts as absent
    let identity = headers
        .get(IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok());

    match pipeline.run(identity).await {
        Ok(idea) => (StatusCode::OK, Json(idea)).into_response(),
        Err(err) => err.into_response(),
    }
}
