use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::models::AuthenticatedIdentity;
use crate::services::ServiceError;
use crate::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Authentication gate: verifies the bearer token and attaches the caller's identity.
///
/// Any failure short-circuits with 401 before the handler runs.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    let Some(token) = token else {
        tracing::warn!(path = %req.uri().path(), "Missing bearer token");
        return Err(ServiceError::Unauthenticated.into());
    };

    let identity = state.tokens.verify(token).map_err(|e| {
        tracing::warn!(path = %req.uri().path(), "Invalid or expired session token");
        AppError::from(e)
    })?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .ok_or_else(|| ServiceError::Unauthenticated.into())
    }
}
