use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::services::error::{ServiceError, ServiceResult};

/// Opaque byte storage addressed by relative keys such as `{identity}/{file}`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, data: &[u8]) -> ServiceResult<()>;
    /// `NotFound` when no blob exists under `key`.
    async fn get(&self, key: &str) -> ServiceResult<Vec<u8>>;
    /// Deleting a missing blob succeeds.
    async fn delete(&self, key: &str) -> ServiceResult<()>;
}

/// Blob store rooted at a local directory.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> ServiceResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        tracing::info!(root = %base_path.display(), "Local blob storage ready");
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve(&self, key: &str) -> ServiceResult<PathBuf> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "Refusing blob key outside storage root: {}",
                key
            )));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalStorage {
    async fn put(&self, key: &str, data: &[u8]) -> ServiceResult<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> ServiceResult<Vec<u8>> {
        let path = self.resolve(key)?;
        match fs::read(path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ServiceError::NotFound("Document file not found".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> ServiceResult<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
