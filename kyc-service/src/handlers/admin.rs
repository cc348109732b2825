use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::kyc::{DecisionResponse, DocumentListResponse, RejectRequest, UserListQuery},
    handlers::kyc::file_response,
    models::{AuthenticatedIdentity, Identity},
    services::KycStats,
    utils::ValidatedJson,
    AppState,
};

/// Pending documents, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/admin/kyc/pending",
    responses(
        (status = 200, description = "Review queue", body = DocumentListResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn pending_documents(
    State(state): State<AppState>,
    admin: AuthenticatedIdentity,
) -> Result<Json<DocumentListResponse>, AppError> {
    let documents = state.aggregator.pending_queue(&admin).await?;
    Ok(Json(documents.into()))
}

/// Approve a document
#[utoipa::path(
    put,
    path = "/api/v1/admin/kyc/{id}/approve",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document approved", body = DecisionResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Document not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn approve_document(
    State(state): State<AppState>,
    admin: AuthenticatedIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<DecisionResponse>, AppError> {
    let outcome = state.aggregator.approve(&admin, id).await?;
    Ok(Json(outcome.into()))
}

/// Reject a document with a reason
#[utoipa::path(
    put,
    path = "/api/v1/admin/kyc/{id}/reject",
    params(("id" = Uuid, Path, description = "Document id")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Document rejected", body = DecisionResponse),
        (status = 400, description = "Missing reason", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Document not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn reject_document(
    State(state): State<AppState>,
    admin: AuthenticatedIdentity,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<RejectRequest>,
) -> Result<Json<DecisionResponse>, AppError> {
    let outcome = state.aggregator.reject(&admin, id, &req.reason).await?;
    Ok(Json(outcome.into()))
}

/// View any document file inline
#[utoipa::path(
    get,
    path = "/api/v1/admin/kyc/documents/{id}/preview",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "File bytes"),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 404, description = "Document or file not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn preview_document(
    State(state): State<AppState>,
    admin: AuthenticatedIdentity,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (document, data) = state.intake.preview(&admin, id).await?;
    Ok(file_response(
        &document,
        data,
        "inline",
        Some("private, max-age=3600"),
    ))
}

/// Accounts, optionally filtered by KYC status, newest first
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Accounts", body = [Identity]),
        (status = 400, description = "Unknown status filter", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AuthenticatedIdentity,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<Identity>>, AppError> {
    let status = query.status()?;
    Ok(Json(state.accounts.list_by_kyc_status(status).await?))
}

/// Identity and document counts per status
#[utoipa::path(
    get,
    path = "/api/v1/admin/dashboard/stats",
    responses(
        (status = 200, description = "Counters", body = KycStats),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("bearer_auth" = []))
)]
pub async fn dashboard_stats(
    State(state): State<AppState>,
    admin: AuthenticatedIdentity,
) -> Result<Json<KycStats>, AppError> {
    Ok(Json(state.aggregator.stats(&admin).await?))
}
