use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::domains::pairing::models::INVALID_NUMBER_MESSAGE;
use crate::domains::pairing::{start_pairing, PairReply};
use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct PairParams {
    pub number: Option<String>,
}

/// Pairing code endpoint
///
/// `GET /pair?number=<phone>` (also served at `/`). Responds once:
/// - 200 `{"code": "ABCD-1234"}` when a pairing code was issued
/// - 400 when the number is missing or invalid
/// - 500 when the backend refused the code request
/// - 503 when no connection could be established
pub async fn pair_handler(
    Extension(state): Extension<AppState>,
    Query(params): Query<PairParams>,
) -> Response {
    start_pairing(state.deps.clone(), params.number)
        .await
        .into_response()
}

impl IntoResponse for PairReply {
    fn into_response(self) -> Response {
        match self {
            PairReply::Code(code) => (StatusCode::OK, Json(json!({ "code": code }))).into_response(),
            PairReply::MissingNumber => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Missing ?number=" })),
            )
                .into_response(),
            PairReply::InvalidNumber => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "code": INVALID_NUMBER_MESSAGE })),
            )
                .into_response(),
            PairReply::PairingFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to get pairing code" })),
            )
                .into_response(),
            PairReply::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Service unavailable" })),
            )
                .into_response(),
        }
    }
}
