//! PostgreSQL record store.
//!
//! Enum columns are stored as their lower-case wire names and parsed back on read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{
    DocumentCategory, DocumentStatus, IdentityRecord, KycStatus, Profile, ReviewDecision,
    VerificationDocument,
};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::store::{DecisionOutcome, KycDeriver, KycStats, RecordStore, StatusCounts};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    document_type: String,
    document_number: String,
    email: String,
    phone_number: String,
    address: String,
    facebook_profile: Option<String>,
    instagram_profile: Option<String>,
    twitter_profile: Option<String>,
    linkedin_profile: Option<String>,
    password_hash: String,
    role: String,
    kyc_status: String,
    email_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IdentityRow> for IdentityRecord {
    type Error = ServiceError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        Ok(IdentityRecord {
            id: row.id,
            profile: Profile {
                first_name: row.first_name,
                last_name: row.last_name,
                document_type: row.document_type.parse().map_err(corrupt)?,
                document_number: row.document_number,
                email: row.email,
                phone_number: row.phone_number,
                address: row.address,
                facebook_profile: row.facebook_profile,
                instagram_profile: row.instagram_profile,
                twitter_profile: row.twitter_profile,
                linkedin_profile: row.linkedin_profile,
            },
            password_hash: row.password_hash,
            role: row.role.parse().map_err(corrupt)?,
            kyc_status: row.kyc_status.parse().map_err(corrupt)?,
            email_verified: row.email_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    identity_id: Uuid,
    category: String,
    blob_key: String,
    original_name: String,
    size_bytes: i64,
    mime_type: String,
    status: String,
    rejection_reason: Option<String>,
    reviewed_by: Option<Uuid>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for VerificationDocument {
    type Error = ServiceError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(VerificationDocument {
            id: row.id,
            identity_id: row.identity_id,
            category: row.category.parse::<DocumentCategory>().map_err(corrupt)?,
            blob_key: row.blob_key,
            original_name: row.original_name,
            size_bytes: row.size_bytes,
            mime_type: row.mime_type,
            status: row.status.parse::<DocumentStatus>().map_err(corrupt)?,
            rejection_reason: row.rejection_reason,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn corrupt(message: String) -> ServiceError {
    ServiceError::Internal(anyhow::anyhow!("Corrupt row: {}", message))
}

fn documents(rows: Vec<DocumentRow>) -> ServiceResult<Vec<VerificationDocument>> {
    rows.into_iter().map(VerificationDocument::try_from).collect()
}

fn identities(rows: Vec<IdentityRow>) -> ServiceResult<Vec<IdentityRecord>> {
    rows.into_iter().map(IdentityRecord::try_from).collect()
}

fn count_into(counts: &mut StatusCounts, status: &str, n: i64) -> ServiceResult<()> {
    match status.parse::<DocumentStatus>().map_err(corrupt)? {
        DocumentStatus::Pending => counts.pending = n,
        DocumentStatus::Approved => counts.approved = n,
        DocumentStatus::Rejected => counts.rejected = n,
    }
    Ok(())
}

#[async_trait]
impl RecordStore for Database {
    async fn insert_identity(&self, record: &IdentityRecord) -> ServiceResult<()> {
        let p = &record.profile;
        sqlx::query(
            r#"
            INSERT INTO identities (
                id, first_name, last_name, document_type, document_number, email,
                phone_number, address, facebook_profile, instagram_profile,
                twitter_profile, linkedin_profile, password_hash, role, kyc_status,
                email_verified, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(record.id)
        .bind(&p.first_name)
        .bind(&p.last_name)
        .bind(p.document_type.as_str())
        .bind(&p.document_number)
        .bind(&p.email)
        .bind(&p.phone_number)
        .bind(&p.address)
        .bind(&p.facebook_profile)
        .bind(&p.instagram_profile)
        .bind(&p.twitter_profile)
        .bind(&p.linkedin_profile)
        .bind(&record.password_hash)
        .bind(record.role.as_str())
        .bind(record.kyc_status.as_str())
        .bind(record.email_verified)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            // Lost a race with a concurrent registration for the same email or document.
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                let message = match db.constraint() {
                    Some(c) if c.contains("document_number") => "Document number already registered",
                    _ => "Email already registered",
                };
                ServiceError::Conflict(message.to_string())
            }
            _ => ServiceError::from(e),
        })?;
        Ok(())
    }

    async fn find_identity(&self, id: Uuid) -> ServiceResult<Option<IdentityRecord>> {
        sqlx::query_as::<_, IdentityRow>("SELECT * FROM identities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(IdentityRecord::try_from)
            .transpose()
    }

    async fn find_identity_by_email(&self, email: &str) -> ServiceResult<Option<IdentityRecord>> {
        sqlx::query_as::<_, IdentityRow>("SELECT * FROM identities WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(IdentityRecord::try_from)
            .transpose()
    }

    async fn email_exists(&self, email: &str) -> ServiceResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM identities WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn document_number_exists(&self, document_number: &str) -> ServiceResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM identities WHERE document_number = $1)",
        )
        .bind(document_number)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_identities(
        &self,
        status: Option<KycStatus>,
    ) -> ServiceResult<Vec<IdentityRecord>> {
        let rows = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT * FROM identities
            WHERE ($1::text IS NULL OR kyc_status = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        identities(rows)
    }

    async fn insert_document(&self, document: &VerificationDocument) -> ServiceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO verification_documents (
                id, identity_id, category, blob_key, original_name, size_bytes, mime_type,
                status, rejection_reason, reviewed_by, reviewed_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(document.id)
        .bind(document.identity_id)
        .bind(document.category.as_str())
        .bind(&document.blob_key)
        .bind(&document.original_name)
        .bind(document.size_bytes)
        .bind(&document.mime_type)
        .bind(document.status.as_str())
        .bind(&document.rejection_reason)
        .bind(document.reviewed_by)
        .bind(document.reviewed_at)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_document(&self, id: Uuid) -> ServiceResult<Option<VerificationDocument>> {
        sqlx::query_as::<_, DocumentRow>("SELECT * FROM verification_documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(VerificationDocument::try_from)
            .transpose()
    }

    async fn list_documents_for_identity(
        &self,
        identity_id: Uuid,
    ) -> ServiceResult<Vec<VerificationDocument>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM verification_documents WHERE identity_id = $1 ORDER BY created_at DESC",
        )
        .bind(identity_id)
        .fetch_all(&self.pool)
        .await?;
        documents(rows)
    }

    async fn list_documents_by_status(
        &self,
        status: DocumentStatus,
    ) -> ServiceResult<Vec<VerificationDocument>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM verification_documents WHERE status = $1 ORDER BY created_at ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        documents(rows)
    }

    async fn record_decision(
        &self,
        document_id: Uuid,
        decision: &ReviewDecision,
        reviewer: Uuid,
        at: DateTime<Utc>,
        derive: KycDeriver,
    ) -> ServiceResult<Option<DecisionOutcome>> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<Uuid> =
            sqlx::query_scalar("SELECT identity_id FROM verification_documents WHERE id = $1")
                .bind(document_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(identity_id) = owner else {
            return Ok(None);
        };

        // Decisions on the same identity serialize on this row lock, so the
        // recompute below always sees every committed decision.
        let previous: String =
            sqlx::query_scalar("SELECT kyc_status FROM identities WHERE id = $1 FOR UPDATE")
                .bind(identity_id)
                .fetch_one(&mut *tx)
                .await?;
        let previous_kyc_status = previous.parse::<KycStatus>().map_err(corrupt)?;

        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            UPDATE verification_documents
            SET status = $2, rejection_reason = $3, reviewed_by = $4, reviewed_at = $5, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(document_id)
        .bind(decision.status().as_str())
        .bind(decision.reason())
        .bind(reviewer)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;
        let document = VerificationDocument::try_from(row)?;

        let owned = sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM verification_documents WHERE identity_id = $1",
        )
        .bind(identity_id)
        .fetch_all(&mut *tx)
        .await?;
        let kyc_status = derive(&documents(owned)?);

        if kyc_status != previous_kyc_status {
            sqlx::query("UPDATE identities SET kyc_status = $2, updated_at = $3 WHERE id = $1")
                .bind(identity_id)
                .bind(kyc_status.as_str())
                .bind(at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

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
        let mut tx = self.pool.begin().await?;

        let previous: Option<String> =
            sqlx::query_scalar("SELECT kyc_status FROM identities WHERE id = $1 FOR UPDATE")
                .bind(identity_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(previous) = previous else {
            return Ok(None);
        };
        let previous = previous.parse::<KycStatus>().map_err(corrupt)?;

        let owned = sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM verification_documents WHERE identity_id = $1",
        )
        .bind(identity_id)
        .fetch_all(&mut *tx)
        .await?;
        let current = derive(&documents(owned)?);

        if current != previous {
            sqlx::query("UPDATE identities SET kyc_status = $2, updated_at = NOW() WHERE id = $1")
                .bind(identity_id)
                .bind(current.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(Some((previous, current)))
    }

    async fn stats(&self) -> ServiceResult<KycStats> {
        let identity_counts: Vec<(String, i64)> =
            sqlx::query_as("SELECT kyc_status, COUNT(*) FROM identities GROUP BY kyc_status")
                .fetch_all(&self.pool)
                .await?;
        let document_counts: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM verification_documents GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut identities = StatusCounts::default();
        for (status, n) in identity_counts {
            // Aggregate and document statuses share the same three wire names.
            count_into(&mut identities, &status, n)?;
        }
        let mut documents = StatusCounts::default();
        for (status, n) in document_counts {
            count_into(&mut documents, &status, n)?;
        }

        Ok(KycStats {
            total_identities: identities.total(),
            identities,
            total_documents: documents.total(),
            documents,
        })
    }

    async fn health_check(&self) -> ServiceResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Database health check failed");
                ServiceError::from(e)
            })?;
        Ok(())
    }
}
