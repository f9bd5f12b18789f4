//! Startup repository

use crate::config::DatabaseDriver;
use crate::db::{
    decode_list, encode_keys, encode_list, fold_key, parse_column, search_document,
    DynDatabasePool, Filter, InsertId, SqlArg,
};
use crate::models::{ListParams, Startup, StartupFilter, StartupInput, StartupStage, StartupStatus};
use crate::{bind_args, with_pool};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const STARTUP_COLUMNS: &str = "s.id, s.founder_id, s.name, s.slug, s.pitch, s.sector, s.stage, \
     s.tags, s.funding_goal, s.status, s.review_note, s.view_count, s.created_at, s.updated_at, \
     (SELECT COUNT(*) FROM startup_supporters ss WHERE ss.startup_id = s.id) AS supporters";

macro_rules! row_to_startup {
    ($row:expr) => {{
        let row = $row;
        let tags: String = row.get("tags");
        let stage: String = row.get("stage");
        let status: String = row.get("status");
        Startup {
            id: row.get("id"),
            founder_id: row.get("founder_id"),
            name: row.get("name"),
            slug: row.get("slug"),
            pitch: row.get("pitch"),
            sector: row.get("sector"),
            stage: parse_column::<StartupStage>(&stage, "startups.stage")?,
            tags: decode_list(&tags),
            funding_goal: row.get("funding_goal"),
            status: parse_column::<StartupStatus>(&status, "startups.status")?,
            review_note: row.get("review_note"),
            view_count: row.get("view_count"),
            supporters: row.get("supporters"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }};
}

#[async_trait]
pub trait StartupRepository: Send + Sync {
    /// Insert a startup awaiting review
    async fn create(&self, founder_id: i64, slug: &str, input: &StartupInput) -> Result<Startup>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Startup>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Startup>>;

    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    /// Replace the editable fields. A rejected startup goes back to pending.
    async fn update(&self, id: i64, input: &StartupInput) -> Result<Startup>;

    /// Move a startup out of `from`. Returns None when it is no longer in that status.
    async fn set_review(
        &self,
        id: i64,
        from: StartupStatus,
        status: StartupStatus,
        note: Option<&str>,
    ) -> Result<Option<Startup>>;

    async fn increment_view(&self, id: i64) -> Result<()>;

    async fn list(&self, filter: &StartupFilter, params: &ListParams) -> Result<(Vec<Startup>, i64)>;

    /// Returns false when the user already supported the startup
    async fn support(&self, startup_id: i64, user_id: i64) -> Result<bool>;

    /// Returns false when there was nothing to remove
    async fn unsupport(&self, startup_id: i64, user_id: i64) -> Result<bool>;

    /// Approved startups not founded by the user; `supporters` is the popularity count
    async fn recommendation_candidates(&self, user_id: i64) -> Result<Vec<Startup>>;
}

pub struct SqlxStartupRepository {
    pool: DynDatabasePool,
}

impl SqlxStartupRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn StartupRepository> {
        Arc::new(Self::new(pool))
    }

    async fn get_where(&self, column: &str, value: SqlArg) -> Result<Option<Startup>> {
        let sql = format!("SELECT {} FROM startups s WHERE s.{} = ?", STARTUP_COLUMNS, column);
        let args = [value];
        with_pool!(self.pool, |p| {
            let row = bind_args!(sqlx::query(&sql), args)
                .fetch_optional(p)
                .await
                .context("Failed to get startup")?;
            Ok(match row {
                Some(row) => Some(row_to_startup!(&row)),
                None => None,
            })
        })
    }

    async fn reload(&self, id: i64) -> Result<Startup> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Startup {} not found", id))
    }
}

#[async_trait]
impl StartupRepository for SqlxStartupRepository {
    async fn create(&self, founder_id: i64, slug: &str, input: &StartupInput) -> Result<Startup> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO startups (founder_id, name, slug, pitch, sector, stage, tags,
                    funding_goal, status, review_note, view_count, created_at, updated_at,
                    search_text, sector_key, tag_keys)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 0, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(founder_id)
            .bind(&input.name)
            .bind(slug)
            .bind(&input.pitch)
            .bind(&input.sector)
            .bind(input.stage.as_str())
            .bind(encode_list(&input.tags))
            .bind(input.funding_goal)
            .bind(StartupStatus::Pending.as_str())
            .bind(now)
            .bind(now)
            .bind(search_document(&[&input.name, &input.pitch]))
            .bind(fold_key(&input.sector))
            .bind(encode_keys(&input.tags))
            .execute(p)
            .await
            .context("Failed to create startup")?
            .inserted_id()
        });
        self.reload(id).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Startup>> {
        self.get_where("id", SqlArg::Int(id)).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Startup>> {
        self.get_where("slug", SqlArg::Text(slug.to_string())).await
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        with_pool!(self.pool, |p| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM startups WHERE slug = ?")
                .bind(slug)
                .fetch_one(p)
                .await
                .context("Failed to check startup slug")?;
            Ok(row.get::<i64, _>("count") > 0)
        })
    }

    async fn update(&self, id: i64, input: &StartupInput) -> Result<Startup> {
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE startups
                SET name = ?, pitch = ?, sector = ?, stage = ?, tags = ?, funding_goal = ?,
                    status = CASE WHEN status = 'rejected' THEN 'pending' ELSE status END,
                    updated_at = ?, search_text = ?, sector_key = ?, tag_keys = ?
                WHERE id = ?
                "#,
            )
            .bind(&input.name)
            .bind(&input.pitch)
            .bind(&input.sector)
            .bind(input.stage.as_str())
            .bind(encode_list(&input.tags))
            .bind(input.funding_goal)
            .bind(Utc::now())
            .bind(search_document(&[&input.name, &input.pitch]))
            .bind(fold_key(&input.sector))
            .bind(encode_keys(&input.tags))
            .bind(id)
            .execute(p)
            .await
            .context("Failed to update startup")?;
        });
        self.reload(id).await
    }

    async fn set_review(
        &self,
        id: i64,
        from: StartupStatus,
        status: StartupStatus,
        note: Option<&str>,
    ) -> Result<Option<Startup>> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query(
                "UPDATE startups SET status = ?, review_note = ?, updated_at = ? WHERE id = ? AND status = ?",
            )
            .bind(status.as_str())
            .bind(note)
            .bind(Utc::now())
            .bind(id)
            .bind(from.as_str())
            .execute(p)
            .await
            .context("Failed to review startup")?
            .rows_affected()
        });
        if affected == 0 {
            return Ok(None);
        }
        self.reload(id).await.map(Some)
    }

    async fn increment_view(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query("UPDATE startups SET view_count = view_count + 1 WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to increment startup views")?;
        });
        Ok(())
    }

    async fn list(&self, filter: &StartupFilter, params: &ListParams) -> Result<(Vec<Startup>, i64)> {
        let mut cond = Filter::new();
        if let Some(status) = filter.status {
            cond.push("s.status = ?", [SqlArg::Text(status.to_string())]);
        }
        if let Some(founder_id) = filter.founder_id {
            cond.push("s.founder_id = ?", [SqlArg::Int(founder_id)]);
        }
        if let Some(sector) = filter.sector.as_deref().filter(|s| !s.trim().is_empty()) {
            cond.push_key("s.sector_key", sector);
        }
        if let Some(stage) = filter.stage {
            cond.push("s.stage = ?", [SqlArg::Text(stage.to_string())]);
        }
        if let Some(tag) = filter.tag.as_deref().filter(|s| !s.trim().is_empty()) {
            cond.push_json_term("s.tag_keys", tag);
        }
        if let Some(q) = filter.q.as_deref().filter(|s| !s.trim().is_empty()) {
            cond.push_search("s.search_text", q);
        }

        let list_sql = format!(
            "SELECT {} FROM startups s{} ORDER BY s.created_at DESC, s.id DESC LIMIT ? OFFSET ?",
            STARTUP_COLUMNS,
            cond.where_sql()
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM startups s{}", cond.where_sql());

        with_pool!(self.pool, |p| {
            let rows = bind_args!(sqlx::query(&list_sql), cond.args())
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list startups")?;
            let total: i64 = bind_args!(sqlx::query(&count_sql), cond.args())
                .fetch_one(p)
                .await
                .context("Failed to count startups")?
                .get("count");

            let mut startups = Vec::with_capacity(rows.len());
            for row in &rows {
                startups.push(row_to_startup!(row));
            }
            Ok((startups, total))
        })
    }

    async fn support(&self, startup_id: i64, user_id: i64) -> Result<bool> {
        let sql = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                "INSERT OR IGNORE INTO startup_supporters (startup_id, user_id, created_at) VALUES (?, ?, ?)"
            }
            DatabaseDriver::Mysql => {
                "INSERT IGNORE INTO startup_supporters (startup_id, user_id, created_at) VALUES (?, ?, ?)"
            }
        };
        with_pool!(self.pool, |p| {
            let result = sqlx::query(sql)
                .bind(startup_id)
                .bind(user_id)
                .bind(Utc::now())
                .execute(p)
                .await
                .context("Failed to support startup")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn unsupport(&self, startup_id: i64, user_id: i64) -> Result<bool> {
        with_pool!(self.pool, |p| {
            let result =
                sqlx::query("DELETE FROM startup_supporters WHERE startup_id = ? AND user_id = ?")
                    .bind(startup_id)
                    .bind(user_id)
                    .execute(p)
                    .await
                    .context("Failed to unsupport startup")?;
            Ok(result.rows_affected() > 0)
        })
    }

    async fn recommendation_candidates(&self, user_id: i64) -> Result<Vec<Startup>> {
        let sql = format!(
            "SELECT {} FROM startups s WHERE s.status = 'approved' AND s.founder_id <> ?",
            STARTUP_COLUMNS
        );
        with_pool!(self.pool, |p| {
            let rows = sqlx::query(&sql)
                .bind(user_id)
                .fetch_all(p)
                .await
                .context("Failed to load startup candidates")?;
            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                out.push(row_to_startup!(row));
            }
            Ok(out)
        })
    }
}
