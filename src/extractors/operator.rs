//! Resolve the request's operator from an `Authorization: Bearer <token>` header.

use crate::query::Query;
use crate::state::AppState;
use crate::store::Operator;
use crate::error::ApiError;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const BEARER_PREFIX: &str = "Bearer ";

/// The verified operator, or `None` for anonymous requests.
#[derive(Clone, Debug)]
pub struct CurrentOperator(pub Option<Operator>);

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": { "type": "Unauthorized", "message": message } })),
    )
        .into_response()
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentOperator {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(AUTHORIZATION) else {
            return Ok(CurrentOperator(None));
        };
        let token = value
            .to_str()
            .ok()
            .and_then(|v| {
                v.strip_prefix(BEARER_PREFIX)
                    .or_else(|| v.strip_prefix("bearer "))
            })
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| unauthorized("authorization token is invalid"))?;

        let claims = state.domain.signer().verify(token).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            unauthorized("authorization token is invalid")
        })?;
        let binding = state
            .domain
            .binding(&claims.subject_class)
            .ok_or_else(|| unauthorized("user is not authorized"))?;
        match binding
            .store
            .get(&binding.model, &claims.subject_id, &Query::default())
            .await
        {
            Ok(_) => Ok(CurrentOperator(Some(claims.operator()))),
            Err(ApiError::NotFound(_)) => Err(unauthorized("user is not authorized")),
            Err(e) => Err(e.into_response_with(state.settings.debug)),
        }
    }
}
