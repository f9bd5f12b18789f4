//! Moderation report repository

use crate::db::{parse_column, DynDatabasePool, Filter, InsertId, SqlArg};
use crate::models::{ListParams, Report, ReportStatus, ReportTarget};
use crate::{bind_args, with_pool};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sqlx::Row;
use std::sync::Arc;

const REPORT_COLUMNS: &str = "id, reporter_id, target_type, target_id, reason, details, status, \
     resolution_note, resolved_by, created_at, updated_at";

macro_rules! row_to_report {
    ($row:expr) => {{
        let row = $row;
        let target_type: String = row.get("target_type");
        let status: String = row.get("status");
        Report {
            id: row.get("id"),
            reporter_id: row.get("reporter_id"),
            target_type: parse_column::<ReportTarget>(&target_type, "reports.target_type")?,
            target_id: row.get("target_id"),
            reason: row.get("reason"),
            details: row.get("details"),
            status: parse_column::<ReportStatus>(&status, "reports.status")?,
            resolution_note: row.get("resolution_note"),
            resolved_by: row.get("resolved_by"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }};
}

/// Admin report listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub target_type: Option<ReportTarget>,
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn create(
        &self,
        reporter_id: i64,
        target_type: ReportTarget,
        target_id: i64,
        reason: &str,
        details: Option<&str>,
    ) -> Result<Report>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Report>>;

    /// Whether the reporter already has a non-final report on the target
    async fn has_open(&self, reporter_id: i64, target_type: ReportTarget, target_id: i64) -> Result<bool>;

    async fn list(&self, filter: &ReportFilter, params: &ListParams) -> Result<(Vec<Report>, i64)>;

    /// Move a report out of `from`. Returns None when it is no longer in that status.
    async fn transition(
        &self,
        id: i64,
        from: ReportStatus,
        status: ReportStatus,
        resolved_by: i64,
        note: Option<&str>,
    ) -> Result<Option<Report>>;
}

pub struct SqlxReportRepository {
    pool: DynDatabasePool,
}

impl SqlxReportRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReportRepository> {
        Arc::new(Self::new(pool))
    }

    async fn reload(&self, id: i64) -> Result<Report> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Report {} not found", id))
    }
}

#[async_trait]
impl ReportRepository for SqlxReportRepository {
    async fn create(
        &self,
        reporter_id: i64,
        target_type: ReportTarget,
        target_id: i64,
        reason: &str,
        details: Option<&str>,
    ) -> Result<Report> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO reports (reporter_id, target_type, target_id, reason, details, status,
                    resolution_note, resolved_by, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?)
                "#,
            )
            .bind(reporter_id)
            .bind(target_type.as_str())
            .bind(target_id)
            .bind(reason)
            .bind(details)
            .bind(ReportStatus::Open.as_str())
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create report")?
            .inserted_id()
        });
        self.reload(id).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Report>> {
        let sql = format!("SELECT {} FROM reports WHERE id = ?", REPORT_COLUMNS);
        with_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get report")?;
            Ok(match row {
                Some(row) => Some(row_to_report!(&row)),
                None => None,
            })
        })
    }

    async fn has_open(&self, reporter_id: i64, target_type: ReportTarget, target_id: i64) -> Result<bool> {
        with_pool!(self.pool, |p| {
            let row = sqlx::query(
                "SELECT COUNT(*) AS count FROM reports \
                 WHERE reporter_id = ? AND target_type = ? AND target_id = ? \
                 AND status IN ('open', 'reviewing')",
            )
            .bind(reporter_id)
            .bind(target_type.as_str())
            .bind(target_id)
            .fetch_one(p)
            .await
            .context("Failed to check open reports")?;
            Ok(row.get::<i64, _>("count") > 0)
        })
    }

    async fn list(&self, filter: &ReportFilter, params: &ListParams) -> Result<(Vec<Report>, i64)> {
        let mut cond = Filter::new();
        if let Some(status) = filter.status {
            cond.push("status = ?", [SqlArg::Text(status.to_string())]);
        }
        if let Some(target) = filter.target_type {
            cond.push("target_type = ?", [SqlArg::Text(target.to_string())]);
        }

        let list_sql = format!(
            "SELECT {} FROM reports{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            REPORT_COLUMNS,
            cond.where_sql()
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM reports{}", cond.where_sql());

        with_pool!(self.pool, |p| {
            let rows = bind_args!(sqlx::query(&list_sql), cond.args())
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list reports")?;
            let total: i64 = bind_args!(sqlx::query(&count_sql), cond.args())
                .fetch_one(p)
                .await
                .context("Failed to count reports")?
                .get("count");

            let mut reports = Vec::with_capacity(rows.len());
            for row in &rows {
                reports.push(row_to_report!(row));
            }
            Ok((reports, total))
        })
    }

    async fn transition(
        &self,
        id: i64,
        from: ReportStatus,
        status: ReportStatus,
        resolved_by: i64,
        note: Option<&str>,
    ) -> Result<Option<Report>> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query(
                "UPDATE reports SET status = ?, resolved_by = ?, \
                 resolution_note = COALESCE(?, resolution_note), updated_at = ? \
                 WHERE id = ? AND status = ?",
            )
            .bind(status.as_str())
            .bind(resolved_by)
            .bind(note)
            .bind(Utc::now())
            .bind(id)
            .bind(from.as_str())
            .execute(p)
            .await
            .context("Failed to update report")?
            .rows_affected()
        });
        if affected == 0 {
            return Ok(None);
        }
        self.reload(id).await.map(Some)
    }
}
