//! Organization repository

use crate::db::{parse_column, DynDatabasePool, Filter, InsertId, SqlArg};
use crate::models::{ListParams, Organization, OrganizationInput, OrganizationKind};
use crate::{bind_args, with_pool};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const ORG_COLUMNS: &str = "id, owner_id, kind, name, slug, description, industry, location, \
     website, logo_asset_id, verified, created_at, updated_at";

macro_rules! row_to_org {
    ($row:expr) => {{
        let row = $row;
        let kind: String = row.get("kind");
        Organization {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            kind: parse_column::<OrganizationKind>(&kind, "organizations.kind")?,
            name: row.get("name"),
            slug: row.get("slug"),
            description: row.get("description"),
            industry: row.get("industry"),
            location: row.get("location"),
            website: row.get("website"),
            logo_asset_id: row.get("logo_asset_id"),
            verified: row.get("verified"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }};
}

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn create(
        &self,
        owner_id: i64,
        kind: OrganizationKind,
        slug: &str,
        input: &OrganizationInput,
    ) -> Result<Organization>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Organization>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Organization>>;

    async fn get_by_owner(&self, owner_id: i64) -> Result<Option<Organization>>;

    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    async fn update(&self, id: i64, input: &OrganizationInput) -> Result<Organization>;

    async fn set_verified(&self, id: i64, verified: bool) -> Result<()>;

    async fn list(
        &self,
        kind: Option<OrganizationKind>,
        verified_only: bool,
        params: &ListParams,
    ) -> Result<(Vec<Organization>, i64)>;
}

pub struct SqlxOrganizationRepository {
    pool: DynDatabasePool,
}

impl SqlxOrganizationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn OrganizationRepository> {
        Arc::new(Self::new(pool))
    }

    async fn get_where(&self, column: &str, value: SqlArg) -> Result<Option<Organization>> {
        let sql = format!("SELECT {} FROM organizations WHERE {} = ?", ORG_COLUMNS, column);
        let args = [value];
        with_pool!(self.pool, |p| {
            let row = bind_args!(sqlx::query(&sql), args)
                .fetch_optional(p)
                .await
                .context("Failed to get organization")?;
            Ok(match row {
                Some(row) => Some(row_to_org!(&row)),
                None => None,
            })
        })
    }
}

#[async_trait]
impl OrganizationRepository for SqlxOrganizationRepository {
    async fn create(
        &self,
        owner_id: i64,
        kind: OrganizationKind,
        slug: &str,
        input: &OrganizationInput,
    ) -> Result<Organization> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO organizations (owner_id, kind, name, slug, description, industry,
                    location, website, logo_asset_id, verified, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(owner_id)
            .bind(kind.as_str())
            .bind(&input.name)
            .bind(slug)
            .bind(&input.description)
            .bind(&input.industry)
            .bind(&input.location)
            .bind(&input.website)
            .bind(input.logo_asset_id)
            .bind(false)
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create organization")?
            .inserted_id()
        });

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Organization not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Organization>> {
        self.get_where("id", SqlArg::Int(id)).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Organization>> {
        self.get_where("slug", SqlArg::Text(slug.to_string())).await
    }

    async fn get_by_owner(&self, owner_id: i64) -> Result<Option<Organization>> {
        self.get_where("owner_id", SqlArg::Int(owner_id)).await
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        with_pool!(self.pool, |p| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM organizations WHERE slug = ?")
                .bind(slug)
                .fetch_one(p)
                .await
                .context("Failed to check organization slug")?;
            Ok(row.get::<i64, _>("count") > 0)
        })
    }

    async fn update(&self, id: i64, input: &OrganizationInput) -> Result<Organization> {
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE organizations
                SET name = ?, description = ?, industry = ?, location = ?, website = ?,
                    logo_asset_id = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.industry)
            .bind(&input.location)
            .bind(&input.website)
            .bind(input.logo_asset_id)
            .bind(Utc::now())
            .bind(id)
            .execute(p)
            .await
            .context("Failed to update organization")?;
        });

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Organization not found after update"))
    }

    async fn set_verified(&self, id: i64, verified: bool) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query("UPDATE organizations SET verified = ?, updated_at = ? WHERE id = ?")
                .bind(verified)
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .context("Failed to set organization verification")?;
        });
        Ok(())
    }

    async fn list(
        &self,
        kind: Option<OrganizationKind>,
        verified_only: bool,
        params: &ListParams,
    ) -> Result<(Vec<Organization>, i64)> {
        let mut cond = Filter::new();
        if let Some(kind) = kind {
            cond.push("kind = ?", [SqlArg::Text(kind.to_string())]);
        }
        if verified_only {
            cond.push("verified = ?", [SqlArg::Bool(true)]);
        }

        let list_sql = format!(
            "SELECT {} FROM organizations{} ORDER BY name ASC, id ASC LIMIT ? OFFSET ?",
            ORG_COLUMNS,
            cond.where_sql()
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM organizations{}", cond.where_sql());

        with_pool!(self.pool, |p| {
            let rows = bind_args!(sqlx::query(&list_sql), cond.args())
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list organizations")?;
            let total: i64 = bind_args!(sqlx::query(&count_sql), cond.args())
                .fetch_one(p)
                .await
                .context("Failed to count organizations")?
                .get("count");

            let mut orgs = Vec::with_capacity(rows.len());
            for row in &rows {
                orgs.push(row_to_org!(row));
            }
            Ok((orgs, total))
        })
    }
}
