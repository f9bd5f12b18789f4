//! Object storage for uploaded files
//!
//! `LocalStore` keeps objects on disk and lets the app serve them under
//! `/files`. `S3Store` talks to any S3-compatible endpoint.

pub mod local;
pub mod s3;
pub mod sigv4;

pub use local::LocalStore;
pub use s3::S3Store;

use crate::config::{StorageConfig, StorageDriver};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

const MAX_KEY_LEN: usize = 512;

static KEY_CHARS: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._\-/]*$"));

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Object contents, `None` when the key does not exist
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Deleting a missing key succeeds
    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// URL the client can download the object from for at least `ttl`
    fn url(&self, key: &str, ttl: Duration) -> Result<String>;
}

pub type DynObjectStore = Arc<dyn ObjectStore>;

/// Reject keys that could escape the store root or need escaping
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        bail!("Invalid object key length");
    }
    let pattern = KEY_CHARS
        .as_ref()
        .map_err(|e| anyhow!("Invalid key pattern: {}", e))?;
    if !pattern.is_match(key) {
        bail!("Invalid characters in object key: {}", key);
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        bail!("Invalid path segment in object key: {}", key);
    }
    Ok(())
}

pub fn create_store(config: &StorageConfig) -> Result<DynObjectStore> {
    match config.driver {
        StorageDriver::Local => {
            tracing::info!(path = %config.local_path.display(), "Using local object storage");
            Ok(Arc::new(LocalStore::new(
                config.local_path.clone(),
                config.public_base_url.clone(),
            )))
        }
        StorageDriver::S3 => {
            let store = S3Store::from_config(config)?;
            tracing::info!(endpoint = %store.endpoint(), bucket = %store.bucket(), "Using S3 object storage");
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("avatar/1/4f1c.png").is_ok());
        assert!(validate_key("resume/12/a-b_c.v2.pdf").is_ok());

        for bad in [
            "",
            "/etc/passwd",
            "../secret",
            "avatar/../../x",
            "avatar//x",
            "avatar/./x",
            "avatar/x/",
            "avatar\\x",
            "avatar/a b.png",
            ".hidden",
        ] {
            assert!(validate_key(bad).is_err(), "{:?} should be rejected", bad);
        }
        assert!(validate_key(&"a".repeat(MAX_KEY_LEN + 1)).is_err());
    }

    #[test]
    fn test_create_local_store() {
        let config = StorageConfig::default();
        let store = create_store(&config).unwrap();
        assert_eq!(
            store.url("avatar/1/x.png", Duration::from_secs(60)).unwrap(),
            "/files/avatar/1/x.png"
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Accepted keys never contain a parent or absolute component
        #[test]
        fn accepted_keys_stay_inside_root(key in "[a-z./\\\\-]{1,20}") {
            if validate_key(&key).is_ok() {
                let path = std::path::Path::new(&key);
                prop_assert!(path.is_relative());
                prop_assert!(path.components().all(|c| matches!(c, std::path::Component::Normal(_))));
            }
        }

        /// Keys built the way uploads build them are always accepted
        #[test]
        fn upload_keys_are_valid(user in 1i64..1_000_000, ext in "(png|jpg|pdf|mp4|docx)") {
            let key = format!("avatar/{}/{}.{}", user, uuid::Uuid::new_v4(), ext);
            prop_assert!(validate_key(&key).is_ok());
        }
    }
}
