use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{
    DocumentStatus, IdentityRecord, KycStatus, ReviewDecision, VerificationDocument,
};
use crate::services::error::ServiceResult;

/// Pure derivation of an identity's aggregate status from its documents.
pub type KycDeriver = fn(&[VerificationDocument]) -> KycStatus;

/// Result of persisting one review decision.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub document: VerificationDocument,
    pub previous_kyc_status: KycStatus,
    pub kyc_status: KycStatus,
}

impl DecisionOutcome {
    pub fn kyc_status_changed(&self) -> bool {
        self.previous_kyc_status != self.kyc_status
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.approved + self.rejected
    }
}

/// Admin dashboard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct KycStats {
    pub total_identities: i64,
    pub identities: StatusCounts,
    pub total_documents: i64,
    pub documents: StatusCounts,
}

/// Persistent home of identities and verification documents.
///
/// Uniqueness of email and document number is enforced here (`Conflict`), and
/// `record_decision` must update the document and the owning identity's aggregate
/// status as one serialized unit per identity.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_identity(&self, record: &IdentityRecord) -> ServiceResult<()>;
    async fn find_identity(&self, id: Uuid) -> ServiceResult<Option<IdentityRecord>>;
    async fn find_identity_by_email(&self, email: &str) -> ServiceResult<Option<IdentityRecord>>;
    async fn email_exists(&self, email: &str) -> ServiceResult<bool>;
    async fn document_number_exists(&self, document_number: &str) -> ServiceResult<bool>;
    /// Newest first.
    async fn list_identities(&self, status: Option<KycStatus>)
        -> ServiceResult<Vec<IdentityRecord>>;

    async fn insert_document(&self, document: &VerificationDocument) -> ServiceResult<()>;
    async fn find_document(&self, id: Uuid) -> ServiceResult<Option<VerificationDocument>>;
    /// Newest first.
    async fn list_documents_for_identity(
        &self,
        identity_id: Uuid,
    ) -> ServiceResult<Vec<VerificationDocument>>;
    /// Oldest first.
    async fn list_documents_by_status(
        &self,
        status: DocumentStatus,
    ) -> ServiceResult<Vec<VerificationDocument>>;

    /// Applies `decision` and recomputes the owner's aggregate status with `derive`.
    /// Returns `None` when the document does not exist.
    async fn record_decision(
        &self,
        document_id: Uuid,
        decision: &ReviewDecision,
        reviewer: Uuid,
        at: DateTime<Utc>,
        derive: KycDeriver,
    ) -> ServiceResult<Option<DecisionOutcome>>;

    /// Recomputes the aggregate status without a decision (after an upload).
    /// Returns `(previous, current)`, or `None` when the identity does not exist.
    async fn refresh_kyc_status(
        &self,
        identity_id: Uuid,
        derive: KycDeriver,
    ) -> ServiceResult<Option<(KycStatus, KycStatus)>>;

    async fn stats(&self) -> ServiceResult<KycStats>;
    async fn health_check(&self) -> ServiceResult<()>;
}
