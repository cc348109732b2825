use axum::{extract::Request, middleware::Next, response::Response};
use service_core::error::AppError;

use crate::models::AuthenticatedIdentity;
use crate::services::ServiceError;

/// Role gate for admin routes. Layer it inside `auth_middleware` so authentication runs first.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    let identity = req
        .extensions()
        .get::<AuthenticatedIdentity>()
        .ok_or(ServiceError::Unauthenticated)?;

    if !identity.is_admin() {
        tracing::warn!(
            identity_id = %identity.id,
            path = %req.uri().path(),
            "Admin route denied"
        );
        return Err(ServiceError::Forbidden.into());
    }

    Ok(next.run(req).await)
}
