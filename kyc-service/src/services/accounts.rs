use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Identity, IdentityRecord, KycStatus, Profile};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::store::RecordStore;
use crate::utils::{Password, PasswordHashString, PasswordHasherConfig};

/// Registration, credential checks and identity lookup.
///
/// The only component that ever sees a password hash.
#[derive(Clone)]
pub struct AccountDirectory {
    store: Arc<dyn RecordStore>,
    hasher: PasswordHasherConfig,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AccountDirectory {
    pub fn new(store: Arc<dyn RecordStore>, hasher: PasswordHasherConfig) -> Self {
        Self { store, hasher }
    }

    pub async fn register(
        &self,
        mut profile: Profile,
        password: Password,
    ) -> ServiceResult<Identity> {
        profile.email = normalize_email(&profile.email);
        profile.document_number = profile.document_number.trim().to_string();

        if self.store.email_exists(&profile.email).await? {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }
        if self
            .store
            .document_number_exists(&profile.document_number)
            .await?
        {
            return Err(ServiceError::Conflict(
                "Document number already registered".to_string(),
            ));
        }

        let hasher = self.hasher;
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))??;

        let record = IdentityRecord::new(profile, password_hash.into_string());
        self.store.insert_identity(&record).await?;

        tracing::info!(identity_id = %record.id, "Identity registered");
        Ok(record.sanitized())
    }

    /// Unknown email and wrong password fail identically.
    pub async fn authenticate(&self, email: &str, password: Password) -> ServiceResult<Identity> {
        let email = normalize_email(email);

        let Some(record) = self.store.find_identity_by_email(&email).await? else {
            tracing::warn!("Login failed: unknown email");
            return Err(ServiceError::Unauthenticated);
        };

        let hasher = self.hasher;
        let stored = PasswordHashString::new(record.password_hash.clone());
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))?;

        if verified.is_err() {
            tracing::warn!(identity_id = %record.id, "Login failed: wrong password");
            return Err(ServiceError::Unauthenticated);
        }

        tracing::info!(identity_id = %record.id, "Identity authenticated");
        Ok(record.sanitized())
    }

    pub async fn lookup(&self, identity_id: Uuid) -> ServiceResult<Identity> {
        self.store
            .find_identity(identity_id)
            .await?
            .map(Identity::from)
            .ok_or_else(|| ServiceError::NotFound("Identity not found".to_string()))
    }

    /// Newest first; `None` lists every identity.
    pub async fn list_by_kyc_status(
        &self,
        status: Option<KycStatus>,
    ) -> ServiceResult<Vec<Identity>> {
        Ok(self
            .store
            .list_identities(status)
            .await?
            .into_iter()
            .map(Identity::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PasswordConfig;
    use crate::models::{IdDocumentType, Role};
    use crate::services::memory::InMemoryStore;

    fn directory() -> AccountDirectory {
        let hasher = PasswordHasherConfig::new(PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();
        AccountDirectory::new(Arc::new(InMemoryStore::new()), hasher)
    }

    fn profile(email: &str, document_number: &str) -> Profile {
        Profile {
            first_name: "Sofia".to_string(),
            last_name: "Martinez".to_string(),
            document_type: IdDocumentType::Cedula,
            document_number: document_number.to_string(),
            email: email.to_string(),
            phone_number: "3017778899".to_string(),
            address: "Calle 80 # 11-22".to_string(),
            facebook_profile: None,
            instagram_profile: None,
            twitter_profile: None,
            linkedin_profile: None,
        }
    }

    fn password(p: &str) -> Password {
        Password::new(p.to_string())
    }

    #[tokio::test]
    async fn register_creates_pending_user() {
        let accounts = directory();
        let identity = accounts
            .register(profile("  Sofia@Example.COM ", "10203040"), password("s3cretpass"))
            .await
            .unwrap();

        assert_eq!(identity.email, "sofia@example.com");
        assert_eq!(identity.role, Role::User);
        assert_eq!(identity.kyc_status, KycStatus::Pending);
        assert!(!identity.email_verified);
        assert_eq!(accounts.lookup(identity.id).await.unwrap(), identity);
    }

    #[tokio::test]
    async fn register_twice_conflicts() {
        let accounts = directory();
        accounts
            .register(profile("dup@example.com", "10203040"), password("s3cretpass"))
            .await
            .unwrap();

        let same_email = accounts
            .register(profile("DUP@example.com", "99999999"), password("s3cretpass"))
            .await;
        assert!(matches!(same_email, Err(ServiceError::Conflict(_))));

        let same_document = accounts
            .register(profile("other@example.com", "10203040"), password("s3cretpass"))
            .await;
        assert!(matches!(same_document, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_fail_identically() {
        let accounts = directory();
        accounts
            .register(profile("known@example.com", "55555555"), password("right-password"))
            .await
            .unwrap();

        let wrong_password = accounts
            .authenticate("known@example.com", password("wrong-password"))
            .await
            .unwrap_err();
        let unknown_email = accounts
            .authenticate("nobody@example.com", password("right-password"))
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, ServiceError::Unauthenticated));
        assert!(matches!(unknown_email, ServiceError::Unauthenticated));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());

        let ok = accounts
            .authenticate("KNOWN@example.com", password("right-password"))
            .await
            .unwrap();
        assert_eq!(ok.email, "known@example.com");
    }

    #[tokio::test]
    async fn lookup_unknown_is_not_found() {
        let result = directory().lookup(Uuid::new_v4()).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }
}
