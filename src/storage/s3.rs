//! S3-compatible object store (AWS S3, MinIO)
//!
//! Path-style addressing: `<endpoint>/<bucket>/<key>`.

use super::sigv4::{sha256_hex, uri_encode, SignableRequest, Signer};
use super::{validate_key, ObjectStore};
use crate::config::StorageConfig;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, StatusCode};
use std::time::Duration;

pub struct S3Store {
    client: reqwest::Client,
    /// `scheme://authority` without a trailing slash
    endpoint: String,
    /// Authority part of the endpoint, signed as the `host` header
    host: String,
    bucket: String,
    signer: Signer,
}

/// Split `http://host:port/` into (`http://host:port`, `host:port`)
fn parse_endpoint(endpoint: &str) -> Result<(String, String)> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    let rest = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .ok_or_else(|| anyhow!("S3 endpoint must start with http:// or https://"))?;
    if rest.is_empty() || rest.contains('/') {
        bail!("S3 endpoint must be scheme://host[:port] without a path: {}", endpoint);
    }
    Ok((endpoint.to_string(), rest.to_string()))
}

impl S3Store {
    pub fn new(
        endpoint: &str,
        bucket: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self> {
        let (endpoint, host) = parse_endpoint(endpoint)?;
        if bucket.trim().is_empty() {
            bail!("S3 bucket name is required");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            host,
            bucket: bucket.trim().to_string(),
            signer: Signer::new(access_key, secret_key, region),
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("storage.{} is required for the s3 driver", name))
        };
        Self::new(
            &required(&config.endpoint, "endpoint")?,
            &required(&config.bucket, "bucket")?,
            &config.region,
            &required(&config.access_key, "access_key")?,
            &required(&config.secret_key, "secret_key")?,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_path(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        Ok(format!("/{}/{}", self.bucket, key))
    }

    /// Send a signed request for `key`
    async fn send(
        &self,
        method: Method,
        key: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response> {
        let path = self.object_path(key)?;
        let now = Utc::now();
        let payload_hash = sha256_hex(&body);
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let mut headers = vec![
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date),
        ];
        if let Some(ct) = content_type {
            headers.push(("content-type".to_string(), ct.to_string()));
        }
        let authorization = self.signer.authorization(
            &SignableRequest {
                method: method.as_str(),
                host: &self.host,
                path: &path,
                query: Vec::new(),
                headers: headers.clone(),
                payload_hash: &payload_hash,
            },
            now,
        )?;

        let url = format!("{}{}", self.endpoint, uri_encode(&path, false));
        let mut request = self
            .client
            .request(method.clone(), &url)
            .header("authorization", authorization);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if !body.is_empty() {
            request = request.body(body);
        }
        request
            .send()
            .await
            .with_context(|| format!("S3 {} {} failed", method, key))
    }
}

async fn error_for(response: reqwest::Response, action: &str, key: &str) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow!("S3 {} of {} returned {}: {}", action, key, status, body.trim())
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let response = self.send(Method::PUT, key, bytes, Some(content_type)).await?;
        if !response.status().is_success() {
            return Err(error_for(response, "upload", key).await);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let response = self.send(Method::GET, key, Vec::new(), None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .with_context(|| format!("Failed to read S3 object {}", key))?;
                Ok(Some(bytes.to_vec()))
            }
            _ => Err(error_for(response, "download", key).await),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let response = self.send(Method::DELETE, key, Vec::new(), None).await?;
        if !(response.status().is_success() || response.status() == StatusCode::NOT_FOUND) {
            return Err(error_for(response, "delete", key).await);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let response = self.send(Method::HEAD, key, Vec::new(), None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => bail!("S3 stat of {} returned {}", key, s),
        }
    }

    /// Presigned GET URL, valid for `ttl` (at most seven days)
    fn url(&self, key: &str, ttl: Duration) -> Result<String> {
        let path = self.object_path(key)?;
        let query = self
            .signer
            .presign_query("GET", &self.host, &path, ttl.as_secs(), Utc::now())?;
        Ok(format!("{}{}?{}", self.endpoint, uri_encode(&path, false), query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> S3Store {
        S3Store::new("http://localhost:9000/", "uploads", "us-east-1", "minio", "minio-secret").unwrap()
    }

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(
            parse_endpoint("http://localhost:9000/").unwrap(),
            ("http://localhost:9000".to_string(), "localhost:9000".to_string())
        );
        assert!(parse_endpoint("localhost:9000").is_err());
        assert!(parse_endpoint("https://s3.example.com/bucket").is_err());
        assert!(parse_endpoint("https://").is_err());
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let mut config = StorageConfig {
            endpoint: Some("http://localhost:9000".into()),
            bucket: Some("uploads".into()),
            access_key: Some("minio".into()),
            secret_key: None,
            ..Default::default()
        };
        assert!(S3Store::from_config(&config).is_err());
        config.secret_key = Some("secret".into());
        assert_eq!(S3Store::from_config(&config).unwrap().bucket(), "uploads");
    }

    #[test]
    fn test_presigned_url_shape() {
        let url = store().url("avatar/1/a.png", Duration::from_secs(900)).unwrap();
        assert!(url.starts_with("http://localhost:9000/uploads/avatar/1/a.png?X-Amz-Algorithm=AWS4-HMAC-SHA256"));
        assert!(url.contains("X-Amz-Expires=900"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(store().url("../x", Duration::from_secs(900)).is_err());
    }

    /// Needs a MinIO server, e.g. `docker run -p 9000:9000 minio/minio server /data`
    /// with a bucket named `youthbridge-test`.
    #[tokio::test]
    #[ignore]
    async fn test_round_trip_against_minio() {
        let store = S3Store::new(
            "http://localhost:9000",
            "youthbridge-test",
            "us-east-1",
            "minioadmin",
            "minioadmin",
        )
        .unwrap();
        let key = format!("test/{}.txt", uuid::Uuid::new_v4());

        store.put(&key, b"hello".to_vec(), "text/plain").await.unwrap();
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some(&b"hello"[..]));

        let url = store.url(&key, Duration::from_secs(60)).unwrap();
        let body = reqwest::get(url).await.unwrap().text().await.unwrap();
        assert_eq!(body, "hello");

        store.delete(&key).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
    }
}
