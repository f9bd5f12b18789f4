//! Uploaded files
//!
//! The bytes live in the object store under `<purpose>/<user_id>/<uuid>.<ext>`;
//! an `Asset` row records who owns them and what they are for.

use crate::db::repositories::AssetRepository;
use crate::models::{Asset, AssetPurpose, User};
use crate::services::error::{ServiceError, ServiceResult};
use crate::storage::DynObjectStore;
use std::sync::Arc;
use std::time::Duration;

/// A file received from the client
#[derive(Debug, Clone)]
pub struct Upload {
    pub purpose: AssetPurpose,
    pub content_type: String,
    pub original_name: String,
    pub bytes: Vec<u8>,
}

pub struct AssetService {
    asset_repo: Arc<dyn AssetRepository>,
    store: DynObjectStore,
    max_file_size: u64,
    url_ttl: Duration,
}

impl AssetService {
    pub fn new(
        asset_repo: Arc<dyn AssetRepository>,
        store: DynObjectStore,
        max_file_size: u64,
        url_ttl: Duration,
    ) -> Self {
        Self {
            asset_repo,
            store,
            max_file_size,
            url_ttl,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub async fn upload(&self, owner: &User, upload: Upload) -> ServiceResult<Asset> {
        let content_type = normalize_content_type(&upload.content_type);
        if !upload.purpose.allows(&content_type) {
            return Err(ServiceError::validation(format!(
                "Content type {} is not allowed for {}",
                content_type, upload.purpose
            )));
        }
        if upload.bytes.is_empty() {
            return Err(ServiceError::validation("File is empty"));
        }
        if upload.bytes.len() as u64 > self.max_file_size {
            return Err(ServiceError::validation(format!(
                "File exceeds the maximum size of {} bytes",
                self.max_file_size
            )));
        }

        let key = format!(
            "{}/{}/{}.{}",
            upload.purpose,
            owner.id,
            uuid::Uuid::new_v4(),
            extension_for(&content_type)
        );
        let size = upload.bytes.len() as i64;
        let original_name = clean_file_name(&upload.original_name);

        self.store.put(&key, upload.bytes, &content_type).await?;
        let asset = match self
            .asset_repo
            .create(owner.id, &key, upload.purpose, &content_type, size, &original_name)
            .await
        {
            Ok(asset) => asset,
            Err(e) => {
                if let Err(cleanup) = self.store.delete(&key).await {
                    tracing::warn!(%key, "Failed to remove orphaned object: {:#}", cleanup);
                }
                return Err(e.into());
            }
        };
        tracing::info!(asset_id = asset.id, owner_id = owner.id, %key, size, "File uploaded");
        Ok(asset)
    }

    /// Download URL for the owner or an admin
    pub async fn url(&self, user: &User, id: i64) -> ServiceResult<String> {
        let asset = self.get_accessible(user, id).await?;
        Ok(self.store.url(&asset.key, self.url_ttl)?)
    }

    pub async fn delete(&self, user: &User, id: i64) -> ServiceResult<()> {
        let asset = self.get_accessible(user, id).await?;
        self.asset_repo.delete(asset.id).await?;
        if let Err(e) = self.store.delete(&asset.key).await {
            tracing::warn!(asset_id = id, key = %asset.key, "Failed to delete stored object: {:#}", e);
        }
        Ok(())
    }

    pub async fn list_mine(&self, user: &User) -> ServiceResult<Vec<Asset>> {
        Ok(self.asset_repo.list_by_owner(user.id).await?)
    }

    async fn get_accessible(&self, user: &User, id: i64) -> ServiceResult<Asset> {
        match self.asset_repo.get_by_id(id).await? {
            Some(a) if a.owner_id == user.id || user.is_admin() => Ok(a),
            Some(_) => Err(ServiceError::forbidden("Not your file")),
            None => Err(ServiceError::not_found("File")),
        }
    }
}

/// `image/PNG; charset=x` -> `image/png`
fn normalize_content_type(raw: &str) -> String {
    raw.split(';').next().unwrap_or("").trim().to_lowercase()
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "video/mp4" => "mp4",
        _ => "bin",
    }
}

/// Last path component of a client-supplied name, at most 255 characters
fn clean_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).take(255).collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_user, setup_pool};
    use crate::db::repositories::SqlxAssetRepository;
    use crate::models::UserRole;
    use crate::storage::LocalStore;
    use tempfile::TempDir;

    fn upload(purpose: AssetPurpose, content_type: &str, bytes: &[u8]) -> Upload {
        Upload {
            purpose,
            content_type: content_type.to_string(),
            original_name: "C:\\Users\\amina\\cv.pdf".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_helpers() {
        assert_eq!(normalize_content_type(" Image/PNG; q=1"), "image/png");
        assert_eq!(extension_for("application/pdf"), "pdf");
        assert_eq!(clean_file_name("C:\\Users\\amina\\cv.pdf"), "cv.pdf");
        assert_eq!(clean_file_name("../../etc/passwd"), "passwd");
        assert_eq!(clean_file_name("  "), "upload");
    }

    #[tokio::test]
    async fn test_upload_url_delete() {
        let pool = setup_pool().await;
        let dir = TempDir::new().unwrap();
        let owner = seed_user(&pool, "y@example.com", UserRole::Youth).await;
        let other = seed_user(&pool, "o@example.com", UserRole::Youth).await;
        let admin = seed_user(&pool, "admin@example.com", UserRole::Admin).await;
        let store: DynObjectStore = Arc::new(LocalStore::new(dir.path().to_path_buf(), "/files".into()));
        let svc = AssetService::new(
            SqlxAssetRepository::boxed(pool.clone()),
            store.clone(),
            1024,
            Duration::from_secs(60),
        );

        let asset = svc
            .upload(&owner, upload(AssetPurpose::Resume, "application/pdf", b"%PDF"))
            .await
            .unwrap();
        assert!(asset.key.starts_with(&format!("resume/{}/", owner.id)));
        assert!(asset.key.ends_with(".pdf"));
        assert_eq!(asset.original_name, "cv.pdf");
        assert_eq!(asset.size, 4);
        assert!(store.exists(&asset.key).await.unwrap());

        assert_eq!(svc.url(&owner, asset.id).await.unwrap(), format!("/files/{}", asset.key));
        assert!(svc.url(&admin, asset.id).await.is_ok());
        assert!(matches!(svc.url(&other, asset.id).await, Err(ServiceError::Forbidden(_))));
        assert!(matches!(svc.delete(&other, asset.id).await, Err(ServiceError::Forbidden(_))));

        svc.delete(&owner, asset.id).await.unwrap();
        assert!(!store.exists(&asset.key).await.unwrap());
        assert!(matches!(svc.url(&owner, asset.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let pool = setup_pool().await;
        let dir = TempDir::new().unwrap();
        let owner = seed_user(&pool, "y@example.com", UserRole::Youth).await;
        let svc = AssetService::new(
            SqlxAssetRepository::boxed(pool.clone()),
            Arc::new(LocalStore::new(dir.path().to_path_buf(), "/files".into())),
            8,
            Duration::from_secs(60),
        );

        for bad in [
            upload(AssetPurpose::Avatar, "application/pdf", b"%PDF"),
            upload(AssetPurpose::Resume, "application/pdf", b""),
            upload(AssetPurpose::Resume, "application/pdf", b"0123456789"),
        ] {
            assert!(matches!(svc.upload(&owner, bad).await, Err(ServiceError::Validation(_))));
        }
        assert!(svc.list_mine(&owner).await.unwrap().is_empty());
    }
}
