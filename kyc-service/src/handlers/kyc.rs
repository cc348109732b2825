use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{
    dtos::kyc::DocumentListResponse,
    models::{AuthenticatedIdentity, DocumentCategory, VerificationDocument},
    services::{ServiceError, UploadRequest},
    AppState,
};

/// Upload one identity document
///
/// Multipart fields: `document_type` (or `category`) and `file`.
#[utoipa::path(
    post,
    path = "/api/v1/kyc/upload",
    request_body(
        content = Vec<u8>,
        content_type = "multipart/form-data",
        description = "document_type + file"
    ),
    responses(
        (status = 201, description = "Document stored, pending review", body = VerificationDocument),
        (status = 400, description = "Unknown category, unsupported type or file too large", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "KYC",
    security(("bearer_auth" = []))
)]
pub async fn upload_document(
    State(state): State<AppState>,
    caller: AuthenticatedIdentity,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut category = String::new();
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    })? {
        match field.name() {
            Some("document_type") | Some("category") => {
                category = field.text().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Failed to read category: {}", e))
                })?;
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("unnamed").to_string();
                let mime_type = field.content_type().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e))
                })?;
                file = Some((file_name, mime_type, data.to_vec()));
            }
            _ => {}
        }
    }

    // A bad category is reported ahead of a missing file.
    if file.is_none() && category.parse::<DocumentCategory>().is_ok() {
        return Err(ServiceError::invalid("file", "A file is required").into());
    }
    let (file_name, declared_mime_type, data) = file.unwrap_or_default();

    let document = state
        .intake
        .upload(
            caller.id,
            UploadRequest {
                category,
                file_name,
                declared_mime_type,
                data,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(document)))
}

/// List the caller's documents, newest first
#[utoipa::path(
    get,
    path = "/api/v1/kyc/documents",
    responses(
        (status = 200, description = "Documents", body = DocumentListResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "KYC",
    security(("bearer_auth" = []))
)]
pub async fn list_documents(
    State(state): State<AppState>,
    caller: AuthenticatedIdentity,
) -> Result<Json<DocumentListResponse>, AppError> {
    let documents = state.intake.list_for_identity(caller.id).await?;
    Ok(Json(documents.into()))
}

/// One of the caller's documents
#[utoipa::path(
    get,
    path = "/api/v1/kyc/documents/{id}",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document", body = VerificationDocument),
        (status = 404, description = "No such document for this caller", body = ErrorResponse)
    ),
    tag = "KYC",
    security(("bearer_auth" = []))
)]
pub async fn get_document(
    State(state): State<AppState>,
    caller: AuthenticatedIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<VerificationDocument>, AppError> {
    Ok(Json(state.intake.get_owned(&caller, id).await?))
}

/// Download one of the caller's document files
#[utoipa::path(
    get,
    path = "/api/v1/kyc/documents/{id}/download",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "File bytes"),
        (status = 404, description = "No such document for this caller", body = ErrorResponse)
    ),
    tag = "KYC",
    security(("bearer_auth" = []))
)]
pub async fn download_document(
    State(state): State<AppState>,
    caller: AuthenticatedIdentity,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (document, data) = state.intake.download(&caller, id).await?;
    Ok(file_response(&document, data, "attachment", None))
}

/// Builds a file response. `disposition` is `attachment` or `inline`.
pub(crate) fn file_response(
    document: &VerificationDocument,
    data: Vec<u8>,
    disposition: &str,
    cache_control: Option<&'static str>,
) -> Response {
    let file_name: String = document
        .original_name
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .filter(|c| *c != '"' && *c != '\\')
        .collect();
    let content_disposition =
        HeaderValue::from_str(&format!("{}; filename=\"{}\"", disposition, file_name))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    let content_type = HeaderValue::from_str(&document.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let mut response = (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, content_disposition),
        ],
        data,
    )
        .into_response();
    if let Some(cache_control) = cache_control {
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));
    }
    response
}
