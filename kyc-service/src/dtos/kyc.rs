use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::{KycStatus, VerificationDocument};
use crate::services::{DecisionOutcome, ServiceError};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RejectRequest {
    /// Shown to the document owner. Blank reasons are refused.
    #[validate(length(max = 500, message = "Reason must be at most 500 characters"))]
    #[schema(example = "The ID number is not legible")]
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentListResponse {
    pub documents: Vec<VerificationDocument>,
    pub total: usize,
}

impl From<Vec<VerificationDocument>> for DocumentListResponse {
    fn from(documents: Vec<VerificationDocument>) -> Self {
        Self {
            total: documents.len(),
            documents,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DecisionResponse {
    pub document: VerificationDocument,
    /// Owner's aggregate status after this decision.
    pub kyc_status: KycStatus,
}

impl From<DecisionOutcome> for DecisionResponse {
    fn from(outcome: DecisionOutcome) -> Self {
        Self {
            document: outcome.document,
            kyc_status: outcome.kyc_status,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserListQuery {
    /// pending, approved or rejected
    pub kyc_status: Option<String>,
}

impl UserListQuery {
    pub fn status(&self) -> Result<Option<KycStatus>, ServiceError> {
        match self.kyc_status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| {
                ServiceError::invalid(
                    "kyc_status",
                    "kyc_status must be pending, approved or rejected",
                )
            }),
        }
    }
}
