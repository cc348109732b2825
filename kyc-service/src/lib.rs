pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{Environment, KycConfig};
use crate::services::{
    AccountDirectory, BlobStore, DocumentIntake, Notifier, RecordStore, TokenService,
    VerificationAggregator,
};
use crate::utils::PasswordHasherConfig;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::register,
        handlers::auth::login,
        handlers::user::get_profile,
        handlers::kyc::upload_document,
        handlers::kyc::list_documents,
        handlers::kyc::get_document,
        handlers::kyc::download_document,
        handlers::admin::pending_documents,
        handlers::admin::approve_document,
        handlers::admin::reject_document,
        handlers::admin::preview_document,
        handlers::admin::list_users,
        handlers::admin::dashboard_stats,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::kyc::RejectRequest,
            dtos::kyc::DocumentListResponse,
            dtos::kyc::DecisionResponse,
            models::Identity,
            models::Role,
            models::KycStatus,
            models::IdDocumentType,
            models::VerificationDocument,
            models::DocumentCategory,
            models::DocumentStatus,
            services::KycStats,
            services::StatusCounts,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Users", description = "Registration, login and profile"),
        (name = "KYC", description = "Identity document upload and retrieval"),
        (name = "Admin", description = "Document review and verification oversight"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<KycConfig>,
    pub store: Arc<dyn RecordStore>,
    pub tokens: TokenService,
    pub accounts: AccountDirectory,
    pub intake: DocumentIntake,
    pub aggregator: VerificationAggregator,
}

impl AppState {
    /// Wires the core services over the given collaborators.
    pub fn new(
        config: KycConfig,
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, AppError> {
        let tokens = TokenService::new(&config.jwt).map_err(AppError::ConfigError)?;
        let hasher = PasswordHasherConfig::new(config.password).map_err(AppError::ConfigError)?;

        Ok(Self {
            accounts: AccountDirectory::new(store.clone(), hasher),
            intake: DocumentIntake::new(
                store.clone(),
                blobs,
                config.storage.max_upload_bytes,
            ),
            aggregator: VerificationAggregator::new(store.clone(), notifier),
            tokens,
            store,
            config: Arc::new(config),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/api/v1/admin/kyc/pending",
            get(handlers::admin::pending_documents),
        )
        .route(
            "/api/v1/admin/kyc/:id/approve",
            put(handlers::admin::approve_document),
        )
        .route(
            "/api/v1/admin/kyc/:id/reject",
            put(handlers::admin::reject_document),
        )
        .route(
            "/api/v1/admin/kyc/documents/:id/preview",
            get(handlers::admin::preview_document),
        )
        .route("/api/v1/admin/users", get(handlers::admin::list_users))
        .route(
            "/api/v1/admin/dashboard/stats",
            get(handlers::admin::dashboard_stats),
        )
        .layer(from_fn(middleware::require_admin));

    // Headroom above the document limit so oversized files reach the size check.
    let upload_body_limit = state.intake.max_upload_bytes().saturating_mul(2);

    let authenticated_routes = Router::new()
        .route("/api/v1/users/profile", get(handlers::user::get_profile))
        .route(
            "/api/v1/kyc/upload",
            post(handlers::kyc::upload_document).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/api/v1/kyc/documents", get(handlers::kyc::list_documents))
        .route(
            "/api/v1/kyc/documents/:id",
            get(handlers::kyc::get_document),
        )
        .route(
            "/api/v1/kyc/documents/:id/download",
            get(handlers::kyc::download_document),
        )
        .merge(admin_routes)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    if state.config.environment == Environment::Dev {
        app = app.merge(
            SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()),
        );
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    app.route("/api/v1/users/register", post(handlers::auth::register))
        .route("/api/v1/users/login", post(handlers::auth::login))
        .merge(authenticated_routes)
        .with_state(state.clone())
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Record store unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let service = state.config.service_name.clone();
    let version = state.config.service_version.clone();

    match state.store.health_check().await {
        Ok(()) => Ok(Json(serde_json::json!({
            "status": "healthy",
            "service": service,
            "version": version,
        }))),
        Err(e) => {
            tracing::error!(error = %e, "Record store health check failed");
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "service": service,
                    "version": version,
                })),
            ))
        }
    }
}
