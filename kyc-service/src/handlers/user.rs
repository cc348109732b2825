use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    models::{AuthenticatedIdentity, Identity},
    AppState,
};

/// Current user's profile and KYC status
#[utoipa::path(
    get,
    path = "/api/v1/users/profile",
    responses(
        (status = 200, description = "Profile", body = Identity),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Account no longer exists", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn get_profile(
    State(state): State<AppState>,
    caller: AuthenticatedIdentity,
) -> Result<Json<Identity>, AppError> {
    Ok(Json(state.accounts.lookup(caller.id).await?))
}
