pub mod auth;
pub mod kyc;

pub use auth::{LoginRequest, LoginResponse, RegisterRequest};
pub use kyc::{DecisionResponse, DocumentListResponse, RejectRequest, UserListQuery};

use serde::Serialize;
use utoipa::ToSchema;

/// Error body shape rendered by `AppError`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Invalid credentials")]
    pub error: String,
    /// Offending input field, for 400 responses.
    pub field: Option<String>,
    pub details: Option<String>,
}
