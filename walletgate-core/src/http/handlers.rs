//! HTTP handlers for the broker's two routes

use super::state::AppState;
use crate::error::BrokerError;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Maps a pipeline error onto the wire: 400 for validation failures, 502
/// for storage upload faults, 500 with a generic message for everything
/// else. Internals are logged, never sent.
pub struct ApiError(BrokerError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!(error = %self.0, "handshake failed");
        }
        let body = ErrorResponse {
            error: self.0.client_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        ApiError(err)
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    #[serde(rename = "authRequest")]
    pub auth_request: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInQuery {
    #[serde(rename = "encAuthResponse")]
    pub enc_auth_response: Option<String>,
}

/// GET /auth?authRequest=<token> - render the sign-in page
pub async fn auth(
    State(state): State<AppState>,
    Query(query): Query<AuthQuery>,
) -> ApiResult<Response> {
    let page = state
        .broker
        .handle_auth_request(query.auth_request.as_deref())
        .await?;
    Ok(Html(page.render_html()).into_response())
}

/// GET /signin?encAuthResponse=<token> - finish the handshake
pub async fn signin(
    State(state): State<AppState>,
    Query(query): Query<SignInQuery>,
) -> ApiResult<Response> {
    let redirect = state
        .broker
        .handle_auth_response(query.enc_auth_response.as_deref())
        .await?;
    // 302, per the handshake contract with relying applications.
    Ok((StatusCode::FOUND, [(header::LOCATION, redirect)]).into_response())
}
