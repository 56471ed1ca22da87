//! Renders the error taxonomy over HTTP: owner-mapped status plus a flat
//! `{error, reason, provider}` body.

use {
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    errors::AggregationError,
    serde_json::json,
};

pub struct ApiError(pub AggregationError);

impl From<AggregationError> for ApiError {
    fn from(err: AggregationError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": self.0.to_string(),
            "reason": self.0.message,
            "provider": self.0.provider,
        });
        (status, Json(body)).into_response()
    }
}
