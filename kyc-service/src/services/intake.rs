use std::sync::Arc;
use uuid::Uuid;

use crate::models::{AuthenticatedIdentity, DocumentCategory, VerificationDocument};
use crate::services::aggregator::derive_kyc_status;
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::storage::BlobStore;
use crate::services::store::RecordStore;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Accepted declared MIME types, all lower-case.
const ACCEPTED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

const MAX_ORIGINAL_NAME_CHARS: usize = 255;

/// One uploaded file as received at the boundary, not yet validated.
#[derive(Debug)]
pub struct UploadRequest {
    pub category: String,
    pub file_name: String,
    pub declared_mime_type: String,
    pub data: Vec<u8>,
}

/// Validates and stores identity artifacts.
#[derive(Clone)]
pub struct DocumentIntake {
    store: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    max_upload_bytes: usize,
}

impl DocumentIntake {
    pub fn new(
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            store,
            blobs,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Checks category, then MIME type, then size. Nothing is written unless all pass.
    pub async fn upload(
        &self,
        identity_id: Uuid,
        request: UploadRequest,
    ) -> ServiceResult<VerificationDocument> {
        let (category, mime_type) = self.validate(&request).map_err(|(reason, err)| {
            metrics::counter!("kyc_upload_rejections_total", "reason" => reason).increment(1);
            tracing::info!(identity_id = %identity_id, reason, "Upload rejected");
            err
        })?;

        let extension = extension_for(&mime_type);
        let mut document = VerificationDocument::new_pending(
            identity_id,
            category,
            String::new(),
            sanitize_file_name(&request.file_name),
            request.data.len() as i64,
            mime_type,
        );
        document.blob_key = blob_key(&document, extension);

        self.blobs.put(&document.blob_key, &request.data).await?;

        if let Err(e) = self.store.insert_document(&document).await {
            tracing::error!(
                document_id = %document.id,
                error = %e,
                "Failed to persist document, removing stored blob"
            );
            if let Err(cleanup) = self.blobs.delete(&document.blob_key).await {
                tracing::error!(
                    blob_key = %document.blob_key,
                    error = %cleanup,
                    "Compensating blob delete failed, blob orphaned"
                );
            }
            return Err(e);
        }

        // The row is committed; a failed recompute is repaired by the next decision.
        if let Err(e) = self
            .store
            .refresh_kyc_status(identity_id, derive_kyc_status)
            .await
        {
            tracing::error!(identity_id = %identity_id, error = %e, "KYC status recompute failed");
        }

        metrics::counter!("kyc_documents_uploaded_total", "category" => category.as_str())
            .increment(1);
        tracing::info!(
            document_id = %document.id,
            identity_id = %identity_id,
            category = category.as_str(),
            size = document.size_bytes,
            "Document uploaded"
        );

        Ok(document)
    }

    fn validate(
        &self,
        request: &UploadRequest,
    ) -> Result<(DocumentCategory, String), (&'static str, ServiceError)> {
        let category = request.category.parse::<DocumentCategory>().map_err(|_| {
            (
                "category",
                ServiceError::invalid(
                    "category",
                    "Document category must be one of front_face, back_face, portrait",
                ),
            )
        })?;

        let mime_type = normalize_mime(&request.declared_mime_type);
        if !ACCEPTED_MIME_TYPES.contains(&mime_type.as_str()) {
            return Err((
                "mime_type",
                ServiceError::invalid("file", "Only JPEG and PNG images are accepted"),
            ));
        }

        if request.data.len() > self.max_upload_bytes {
            return Err((
                "size",
                ServiceError::invalid(
                    "file",
                    format!(
                        "File exceeds the maximum size of {} bytes",
                        self.max_upload_bytes
                    ),
                ),
            ));
        }

        Ok((category, mime_type))
    }

    /// Newest first.
    pub async fn list_for_identity(
        &self,
        identity_id: Uuid,
    ) -> ServiceResult<Vec<VerificationDocument>> {
        self.store.list_documents_for_identity(identity_id).await
    }

    pub async fn get_by_id(&self, document_id: Uuid) -> ServiceResult<VerificationDocument> {
        self.store
            .find_document(document_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Document not found".to_string()))
    }

    /// Another identity's document is reported as missing.
    pub async fn get_owned(
        &self,
        actor: &AuthenticatedIdentity,
        document_id: Uuid,
    ) -> ServiceResult<VerificationDocument> {
        let document = self.get_by_id(document_id).await?;
        if document.identity_id != actor.id {
            return Err(ServiceError::NotFound("Document not found".to_string()));
        }
        Ok(document)
    }

    pub async fn download(
        &self,
        actor: &AuthenticatedIdentity,
        document_id: Uuid,
    ) -> ServiceResult<(VerificationDocument, Vec<u8>)> {
        let document = self.get_owned(actor, document_id).await?;
        let data = self.blobs.get(&document.blob_key).await?;
        Ok((document, data))
    }

    /// Admin access to any document's bytes.
    pub async fn preview(
        &self,
        actor: &AuthenticatedIdentity,
        document_id: Uuid,
    ) -> ServiceResult<(VerificationDocument, Vec<u8>)> {
        if !actor.is_admin() {
            return Err(ServiceError::Forbidden);
        }
        let document = self.get_by_id(document_id).await?;
        let data = self.blobs.get(&document.blob_key).await?;
        Ok((document, data))
    }
}

fn normalize_mime(declared: &str) -> String {
    declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        _ => "jpg",
    }
}

/// `{identity}/{identity}_{category}_{utc timestamp}_{document}.{ext}`
///
/// The document id keeps keys distinct for uploads within the same timestamp tick.
fn blob_key(document: &VerificationDocument, extension: &str) -> String {
    let stamp = document.created_at.format("%Y%m%dT%H%M%S%.6fZ");
    format!(
        "{id}/{id}_{category}_{stamp}_{document_id}.{extension}",
        id = document.identity_id,
        category = document.category.as_str(),
        document_id = document.id,
    )
}

fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() {
        return "unnamed".to_string();
    }
    base.chars().take(MAX_ORIGINAL_NAME_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DocumentStatus, IdDocumentType, IdentityRecord, KycStatus, Profile, Role,
    };
    use crate::services::memory::InMemoryStore;
    use crate::services::storage::LocalStorage;

    struct Fixture {
        intake: DocumentIntake,
        store: Arc<InMemoryStore>,
        root: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let blobs = Arc::new(LocalStorage::new(root.path()).await.unwrap());
        let intake = DocumentIntake::new(store.clone(), blobs, DEFAULT_MAX_UPLOAD_BYTES);
        Fixture {
            intake,
            store,
            root,
        }
    }

    async fn registered(store: &InMemoryStore) -> IdentityRecord {
        let record = IdentityRecord::new(
            Profile {
                first_name: "Diego".to_string(),
                last_name: "Ramirez".to_string(),
                document_type: IdDocumentType::Cedula,
                document_number: Uuid::new_v4().simple().to_string()[..10].to_string(),
                email: format!("{}@example.com", Uuid::new_v4().simple()),
                phone_number: "3009990000".to_string(),
                address: "Transversal 9 # 3-21".to_string(),
                facebook_profile: None,
                instagram_profile: None,
                twitter_profile: None,
                linkedin_profile: None,
            },
            "hash".to_string(),
        );
        store.insert_identity(&record).await.unwrap();
        record
    }

    fn request(category: &str, mime: &str, len: usize) -> UploadRequest {
        UploadRequest {
            category: category.to_string(),
            file_name: "C:\\photos\\id front.PNG".to_string(),
            declared_mime_type: mime.to_string(),
            data: vec![7u8; len],
        }
    }

    fn stored_files(root: &std::path::Path) -> usize {
        std::fs::read_dir(root)
            .unwrap()
            .flatten()
            .map(|entry| std::fs::read_dir(entry.path()).map(|d| d.count()).unwrap_or(0))
            .sum()
    }

    #[tokio::test]
    async fn upload_stores_pending_document() {
        let f = fixture().await;
        let owner = registered(&f.store).await;

        let doc = f
            .intake
            .upload(owner.id, request("front-face", "IMAGE/PNG", 1024))
            .await
            .unwrap();

        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(doc.category, DocumentCategory::FrontFace);
        assert_eq!(doc.mime_type, "image/png");
        assert_eq!(doc.original_name, "id front.PNG");
        assert_eq!(doc.size_bytes, 1024);
        assert!(doc
            .blob_key
            .starts_with(&format!("{id}/{id}_front_face_", id = owner.id)));
        assert!(doc.blob_key.ends_with(&format!("_{}.png", doc.id)));
        assert_eq!(stored_files(f.root.path()), 1);
    }

    #[test]
    fn blob_keys_differ_within_one_timestamp_tick() {
        let identity_id = Uuid::new_v4();
        let first = VerificationDocument::new_pending(
            identity_id,
            DocumentCategory::Portrait,
            String::new(),
            "a.png".to_string(),
            1,
            "image/png".to_string(),
        );
        let mut second = first.clone();
        second.id = Uuid::new_v4();

        assert_eq!(first.created_at, second.created_at);
        assert_ne!(blob_key(&first, "png"), blob_key(&second, "png"));
    }

    #[tokio::test]
    async fn same_category_uploads_keep_separate_blobs() {
        let f = fixture().await;
        let owner = registered(&f.store).await;

        let first = f
            .intake
            .upload(owner.id, request("portrait", "image/png", 16))
            .await
            .unwrap();
        let second = f
            .intake
            .upload(owner.id, request("portrait", "image/png", 32))
            .await
            .unwrap();

        assert_ne!(first.blob_key, second.blob_key);
        assert_eq!(stored_files(f.root.path()), 2);
        let (_, bytes) = f
            .intake
            .download(
                &AuthenticatedIdentity {
                    id: owner.id,
                    email: owner.profile.email.clone(),
                    role: Role::User,
                },
                first.id,
            )
            .await
            .unwrap();
        assert_eq!(bytes.len(), 16);
    }

    #[tokio::test]
    async fn validation_order_is_category_then_mime_then_size() {
        let f = fixture().await;
        let owner = registered(&f.store).await;
        let too_big = DEFAULT_MAX_UPLOAD_BYTES + 1;

        let field_of = |r: ServiceResult<VerificationDocument>| match r {
            Err(ServiceError::InvalidInput { field, message }) => (field, message),
            other => panic!("expected InvalidInput, got {:?}", other),
        };

        let (field, _) = field_of(
            f.intake
                .upload(owner.id, request("selfie", "application/pdf", too_big))
                .await,
        );
        assert_eq!(field, "category");

        let (_, message) = field_of(
            f.intake
                .upload(owner.id, request("portrait", "application/pdf", too_big))
                .await,
        );
        assert!(message.contains("JPEG"));

        let (_, message) = field_of(
            f.intake
                .upload(owner.id, request("portrait", "image/jpeg", 6 * 1024 * 1024))
                .await,
        );
        assert!(message.contains("maximum size"));

        assert_eq!(stored_files(f.root.path()), 0);
        assert!(f.intake.list_for_identity(owner.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exactly_max_size_is_accepted() {
        let f = fixture().await;
        let owner = registered(&f.store).await;
        let doc = f
            .intake
            .upload(
                owner.id,
                request("back_face", "image/jpg", DEFAULT_MAX_UPLOAD_BYTES),
            )
            .await
            .unwrap();
        assert!(doc.blob_key.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn failed_row_insert_removes_blob() {
        let f = fixture().await;

        // No identity row exists, so the store refuses the document.
        let result = f
            .intake
            .upload(Uuid::new_v4(), request("portrait", "image/png", 64))
            .await;

        assert!(matches!(result, Err(ServiceError::Internal(_))));
        assert_eq!(stored_files(f.root.path()), 0);
    }

    #[tokio::test]
    async fn other_identities_documents_are_not_found() {
        let f = fixture().await;
        let owner = registered(&f.store).await;
        let stranger = registered(&f.store).await;
        let doc = f
            .intake
            .upload(owner.id, request("portrait", "image/png", 16))
            .await
            .unwrap();

        let as_stranger = AuthenticatedIdentity {
            id: stranger.id,
            email: stranger.profile.email.clone(),
            role: Role::User,
        };
        assert!(matches!(
            f.intake.download(&as_stranger, doc.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            f.intake.preview(&as_stranger, doc.id).await,
            Err(ServiceError::Forbidden)
        ));

        let as_owner = AuthenticatedIdentity {
            id: owner.id,
            email: owner.profile.email.clone(),
            role: Role::User,
        };
        let (_, bytes) = f.intake.download(&as_owner, doc.id).await.unwrap();
        assert_eq!(bytes.len(), 16);
    }

    #[tokio::test]
    async fn upload_recomputes_aggregate() {
        let f = fixture().await;
        let owner = registered(&f.store).await;
        f.intake
            .upload(owner.id, request("portrait", "image/png", 16))
            .await
            .unwrap();

        let stored = f.store.find_identity(owner.id).await.unwrap().unwrap();
        assert_eq!(stored.kyc_status, KycStatus::Pending);
    }
}
