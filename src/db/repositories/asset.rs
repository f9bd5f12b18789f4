//! Uploaded asset repository

use crate::db::{parse_column, DynDatabasePool, InsertId};
use crate::models::{Asset, AssetPurpose};
use crate::with_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const ASSET_COLUMNS: &str =
    "id, owner_id, object_key, purpose, content_type, size_bytes, original_name, created_at";

macro_rules! row_to_asset {
    ($row:expr) => {{
        let row = $row;
        let purpose: String = row.get("purpose");
        Asset {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            key: row.get("object_key"),
            purpose: parse_column::<AssetPurpose>(&purpose, "assets.purpose")?,
            content_type: row.get("content_type"),
            size: row.get("size_bytes"),
            original_name: row.get("original_name"),
            created_at: row.get("created_at"),
        }
    }};
}

#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn create(
        &self,
        owner_id: i64,
        key: &str,
        purpose: AssetPurpose,
        content_type: &str,
        size: i64,
        original_name: &str,
    ) -> Result<Asset>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Asset>>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Asset>>;
}

pub struct SqlxAssetRepository {
    pool: DynDatabasePool,
}

impl SqlxAssetRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AssetRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AssetRepository for SqlxAssetRepository {
    async fn create(
        &self,
        owner_id: i64,
        key: &str,
        purpose: AssetPurpose,
        content_type: &str,
        size: i64,
        original_name: &str,
    ) -> Result<Asset> {
        let id = with_pool!(self.pool, |p| {
            sqlx::query(
                "INSERT INTO assets (owner_id, object_key, purpose, content_type, size_bytes, \
                 original_name, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(owner_id)
            .bind(key)
            .bind(purpose.as_str())
            .bind(content_type)
            .bind(size)
            .bind(original_name)
            .bind(Utc::now())
            .execute(p)
            .await
            .context("Failed to record asset")?
            .inserted_id()
        });

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Asset not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Asset>> {
        let sql = format!("SELECT {} FROM assets WHERE id = ?", ASSET_COLUMNS);
        with_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get asset")?;
            Ok(match row {
                Some(row) => Some(row_to_asset!(&row)),
                None => None,
            })
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM assets WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete asset")?;
        });
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Asset>> {
        let sql = format!(
            "SELECT {} FROM assets WHERE owner_id = ? ORDER BY created_at DESC, id DESC",
            ASSET_COLUMNS
        );
        with_pool!(self.pool, |p| {
            let rows = sqlx::query(&sql)
                .bind(owner_id)
                .fetch_all(p)
                .await
                .context("Failed to list assets")?;
            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                out.push(row_to_asset!(row));
            }
            Ok(out)
        })
    }
}
