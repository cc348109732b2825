//! Review decisions and the aggregate KYC status derived from them.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    AuthenticatedIdentity, DocumentCategory, DocumentStatus, KycStatus, ReviewDecision,
    VerificationDocument,
};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::notifier::{Notification, Notifier};
use crate::services::store::{DecisionOutcome, KycStats, RecordStore};

/// Documents needed before an identity can be approved.
pub const REQUIRED_DOCUMENTS: usize = 3;

/// Derives the aggregate status from an identity's full document set.
///
/// Any rejection wins. Approval needs at least three documents, all approved,
/// with every category covered by an approved document. Anything else is pending.
pub fn derive_kyc_status(documents: &[VerificationDocument]) -> KycStatus {
    if documents
        .iter()
        .any(|d| d.status == DocumentStatus::Rejected)
    {
        return KycStatus::Rejected;
    }

    let all_approved = documents
        .iter()
        .all(|d| d.status == DocumentStatus::Approved);
    let covers_categories = DocumentCategory::ALL.iter().all(|category| {
        documents
            .iter()
            .any(|d| d.category == *category && d.status == DocumentStatus::Approved)
    });

    if documents.len() >= REQUIRED_DOCUMENTS && all_approved && covers_categories {
        KycStatus::Approved
    } else {
        KycStatus::Pending
    }
}

/// Applies operator decisions and keeps the owning identity's status in step.
#[derive(Clone)]
pub struct VerificationAggregator {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
}

impl VerificationAggregator {
    pub fn new(store: Arc<dyn RecordStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn approve(
        &self,
        actor: &AuthenticatedIdentity,
        document_id: Uuid,
    ) -> ServiceResult<DecisionOutcome> {
        self.decide(actor, document_id, ReviewDecision::Approve).await
    }

    /// A blank reason is rejected before anything is touched.
    pub async fn reject(
        &self,
        actor: &AuthenticatedIdentity,
        document_id: Uuid,
        reason: &str,
    ) -> ServiceResult<DecisionOutcome> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ServiceError::invalid("reason", "Rejection reason is required"));
        }
        self.decide(
            actor,
            document_id,
            ReviewDecision::Reject {
                reason: reason.to_string(),
            },
        )
        .await
    }

    async fn decide(
        &self,
        actor: &AuthenticatedIdentity,
        document_id: Uuid,
        decision: ReviewDecision,
    ) -> ServiceResult<DecisionOutcome> {
        require_admin(actor)?;

        let outcome = self
            .store
            .record_decision(document_id, &decision, actor.id, Utc::now(), derive_kyc_status)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Document not found".to_string()))?;

        metrics::counter!("kyc_decisions_total", "decision" => decision.status().as_str())
            .increment(1);
        tracing::info!(
            document_id = %document_id,
            identity_id = %outcome.document.identity_id,
            reviewer_id = %actor.id,
            decision = decision.status().as_str(),
            kyc_status = outcome.kyc_status.as_str(),
            "Document reviewed"
        );

        self.dispatch(Notification::document_decided(&outcome.document))
            .await;
        if outcome.kyc_status_changed() {
            tracing::info!(
                identity_id = %outcome.document.identity_id,
                from = outcome.previous_kyc_status.as_str(),
                to = outcome.kyc_status.as_str(),
                "KYC status changed"
            );
            self.dispatch(Notification::kyc_status_changed(
                outcome.document.identity_id,
                outcome.kyc_status,
            ))
            .await;
        }

        Ok(outcome)
    }

    async fn dispatch(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            tracing::warn!(
                identity_id = %notification.identity_id,
                error = %e,
                "Notification dispatch failed"
            );
        }
    }

    /// Every pending document, oldest first.
    pub async fn pending_queue(
        &self,
        actor: &AuthenticatedIdentity,
    ) -> ServiceResult<Vec<VerificationDocument>> {
        require_admin(actor)?;
        self.store
            .list_documents_by_status(DocumentStatus::Pending)
            .await
    }

    pub async fn stats(&self, actor: &AuthenticatedIdentity) -> ServiceResult<KycStats> {
        require_admin(actor)?;
        self.store.stats().await
    }
}

fn require_admin(actor: &AuthenticatedIdentity) -> ServiceResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        tracing::warn!(identity_id = %actor.id, "Non-admin attempted a review operation");
        Err(ServiceError::Forbidden)
    }
}
