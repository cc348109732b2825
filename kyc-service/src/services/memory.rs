use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::{
    DocumentStatus, IdentityRecord, KycStatus, ReviewDecision, Role, VerificationDocument,
};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::store::{DecisionOutcome, KycDeriver, KycStats, RecordStore, StatusCounts};

#[derive(Default)]
struct Tables {
    // Insertion order is kept so equal timestamps still sort deterministically.
    identities: Vec<IdentityRecord>,
    documents: Vec<VerificationDocument>,
}

/// Process-local record store behind a single lock.
///
/// Used by tests and by `STORE_BACKEND=memory` in development.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ServiceResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Record store mutex poisoned: {}", e))
        })
    }

    /// Promotes an identity to a new role. Admin accounts are provisioned out of band.
    pub fn set_role(&self, id: Uuid, role: Role) -> ServiceResult<()> {
        let mut tables = self.lock()?;
        let record = tables
            .identities
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ServiceError::NotFound("Identity not found".to_string()))?;
        record.role = role;
        record.updated_at = Utc::now();
        Ok(())
    }
}

fn newest_first<T>(
    items: impl DoubleEndedIterator<Item = T>,
    created_at: fn(&T) -> DateTime<Utc>,
) -> Vec<T> {
    let mut out: Vec<T> = items.rev().collect();
    out.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    out
}

fn recompute(
    tables: &mut Tables,
    identity_id: Uuid,
    derive: KycDeriver,
    at: DateTime<Utc>,
) -> Option<(KycStatus, KycStatus)> {
    let owned = tables
        .documents
        .iter()
        .filter(|d| d.identity_id == identity_id)
        .cloned()
        .collect::<Vec<_>>();
    let kyc_status = derive(&owned);

    let identity = tables.identities.iter_mut().find(|r| r.id == identity_id)?;
    let previous = identity.kyc_status;
    if previous != kyc_status {
        identity.kyc_status = kyc_status;
        identity.updated_at = at;
    }
    Some((previous, kyc_status))
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert_identity(&self, record: &IdentityRecord) -> ServiceResult<()> {
        let mut tables = self.lock()?;
        if tables
            .identities
            .iter()
            .any(|r| r.profile.email == record.profile.email)
        {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }
        if tables
            .identities
            .iter()
            .any(|r| r.profile.document_number == record.profile.document_number)
        {
            return Err(ServiceError::Conflict(
                "Document number already registered".to_string(),
            ));
        }
        tables.identities.push(record.clone());
        Ok(())
    }

    async fn find_identity(&self, id: Uuid) -> ServiceResult<Option<IdentityRecord>> {
        let tables = self.lock()?;
        Ok(tables.identities.iter().find(|r| r.id == id).cloned())
    }

    async fn find_identity_by_email(&self, email: &str) -> ServiceResult<Option<IdentityRecord>> {
        let tables = self.lock()?;
        Ok(tables
            .identities
            .iter()
            .find(|r| r.profile.email == email)
            .cloned())
    }

    async fn email_exists(&self, email: &str) -> ServiceResult<bool> {
        let tables = self.lock()?;
        Ok(tables.identities.iter().any(|r| r.profile.email == email))
    }

    async fn document_number_exists(&self, document_number: &str) -> ServiceResult<bool> {
        let tables = self.lock()?;
        Ok(tables
            .identities
            .iter()
            .any(|r| r.profile.document_number == document_number))
    }

    async fn list_identities(
        &self,
        status: Option<KycStatus>,
    ) -> ServiceResult<Vec<IdentityRecord>> {
        let tables = self.lock()?;
        let matching = tables
            .identities
            .iter()
            .filter(|r| status.map_or(true, |s| r.kyc_status == s))
            .cloned()
            .collect::<Vec<_>>();
        Ok(newest_first(matching.into_iter(), |r| r.created_at))
    }

    async fn insert_document(&self, document: &VerificationDocument) -> ServiceResult<()> {
        let mut tables = self.lock()?;
        if !tables
            .identities
            .iter()
            .any(|r| r.id == document.identity_id)
        {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "Document references unknown identity {}",
                document.identity_id
            )));
        }
        tables.documents.push(document.clone());
        Ok(())
    }

    async fn find_document(&self, id: Uuid) -> ServiceResult<Option<VerificationDocument>> {
        let tables = self.lock()?;
        Ok(tables.documents.iter().find(|d| d.id == id).cloned())
    }

    async fn list_documents_for_identity(
        &self,
        identity_id: Uuid,
    ) -> ServiceResult<Vec<VerificationDocument>> {
        let tables = self.lock()?;
        let owned = tables
            .documents
            .iter()
            .filter(|d| d.identity_id == identity_id)
            .cloned()
            .collect::<Vec<_>>();
        Ok(newest_first(owned.into_iter(), |d| d.created_at))
    }

    async fn list_documents_by_status(
        &self,
        status: DocumentStatus,
    ) -> ServiceResult<Vec<VerificationDocument>> {
        let tables = self.lock()?;
        let mut matching = tables
            .documents
            .iter()
            .filter(|d| d.status == status)
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by_key(|d| d.created_at);
        Ok(matching)
    }

    async fn record_decision(
        &self,
        document_id: Uuid,
        decision: &ReviewDecision,
        reviewer: Uuid,
        at: DateTime<Utc>,
        derive: KycDeriver,
    ) -> ServiceResult<Option<DecisionOutcome>> {
        let mut tables = self.lock()?;

        let Some(document) = tables.documents.iter_mut().find(|d| d.id == document_id) else {
            return Ok(None);
        };
        document.apply_decision(decision, reviewer, at);
        let document = document.clone();

        let (previous_kyc_status, kyc_status) =
            recompute(&mut tables, document.identity_id, derive, at).ok_or_else(|| {
                ServiceError::Internal(anyhow::anyhow!(
                    "Document {} has no owning identity",
                    document.id
                ))
            })?;

        Ok(Some(DecisionOutcome {
            document,
            previous_kyc_status,
            kyc_status,
        }))
    }

    async fn refresh_kyc_status(
        &self,
        identity_id: Uuid,
        derive: KycDeriver,
    ) -> ServiceResult<Option<(KycStatus, KycStatus)>> {
        let mut tables = self.lock()?;
        Ok(recompute(&mut tables, identity_id, derive, Utc::now()))
    }

    async fn stats(&self) -> ServiceResult<KycStats> {
        let tables = self.lock()?;
        let mut identities = StatusCounts::default();
        for record in &tables.identities {
            match record.kyc_status {
                KycStatus::Pending => identities.pending += 1,
                KycStatus::Approved => identities.approved += 1,
                KycStatus::Rejected => identities.rejected += 1,
            }
        }
        let mut documents = StatusCounts::default();
        for document in &tables.documents {
            match document.status {
                DocumentStatus::Pending => documents.pending += 1,
                DocumentStatus::Approved => documents.approved += 1,
                DocumentStatus::Rejected => documents.rejected += 1,
            }
        }
        Ok(KycStats {
            total_identities: identities.total(),
            identities,
            total_documents: documents.total(),
            documents,
        })
    }

    async fn health_check(&self) -> ServiceResult<()> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentCategory, IdDocumentType, Profile};
    use chrono::Duration;

    fn record(email: &str, document_number: &str) -> IdentityRecord {
        IdentityRecord::new(
            Profile {
                first_name: "Maria".to_string(),
                last_name: "Lopez".to_string(),
                document_type: IdDocumentType::Cedula,
                document_number: document_number.to_string(),
                email: email.to_string(),
                phone_number: "3105556677".to_string(),
                address: "Avenida 3 # 12-40".to_string(),
                facebook_profile: None,
                instagram_profile: None,
                twitter_profile: None,
                linkedin_profile: None,
            },
            "hash".to_string(),
        )
    }

    fn document(identity_id: Uuid, created_at: DateTime<Utc>) -> VerificationDocument {
        let mut doc = VerificationDocument::new_pending(
            identity_id,
            DocumentCategory::FrontFace,
            format!("{}/front.png", identity_id),
            "front.png".to_string(),
            100,
            "image/png".to_string(),
        );
        doc.created_at = created_at;
        doc.updated_at = created_at;
        doc
    }

    #[tokio::test]
    async fn duplicate_email_or_document_number_conflicts() {
        let store = InMemoryStore::new();
        store.insert_identity(&record("a@example.com", "111111")).await.unwrap();

        let same_email = store.insert_identity(&record("a@example.com", "222222")).await;
        assert!(matches!(same_email, Err(ServiceError::Conflict(_))));

        let same_number = store.insert_identity(&record("b@example.com", "111111")).await;
        assert!(matches!(same_number, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn document_listings_are_ordered() {
        let store = InMemoryStore::new();
        let owner = record("order@example.com", "333333");
        store.insert_identity(&owner).await.unwrap();

        let now = Utc::now();
        let older = document(owner.id, now - Duration::minutes(5));
        let newer = document(owner.id, now);
        store.insert_document(&newer).await.unwrap();
        store.insert_document(&older).await.unwrap();

        let owned = store.list_documents_for_identity(owner.id).await.unwrap();
        assert_eq!(owned.iter().map(|d| d.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

        let queue = store
            .list_documents_by_status(DocumentStatus::Pending)
            .await
            .unwrap();
        assert_eq!(queue.iter().map(|d| d.id).collect::<Vec<_>>(), vec![older.id, newer.id]);
    }

    #[tokio::test]
    async fn record_decision_on_unknown_document_is_none() {
        let store = InMemoryStore::new();
        let outcome = store
            .record_decision(
                Uuid::new_v4(),
                &ReviewDecision::Approve,
                Uuid::new_v4(),
                Utc::now(),
                |_| KycStatus::Approved,
            )
            .await
            .unwrap();
        assert!(outcome.is_none());
    }
}
