//! Job application repository

use crate::db::{parse_column, DynDatabasePool, Filter, InsertId, SqlArg};
use crate::models::{Application, ApplicationStatus, ApplicationWithJob};
use crate::{bind_args, with_pool};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const APPLICATION_COLUMNS: &str = "a.id, a.job_id, a.applicant_id, a.cover_letter, \
     a.resume_asset_id, a.status, a.status_note, a.created_at, a.updated_at";

macro_rules! row_to_application {
    ($row:expr) => {{
        let row = $row;
        let status: String = row.get("status");
        Application {
            id: row.get("id"),
            job_id: row.get("job_id"),
            applicant_id: row.get("applicant_id"),
            cover_letter: row.get("cover_letter"),
            resume_asset_id: row.get("resume_asset_id"),
            status: parse_column::<ApplicationStatus>(&status, "applications.status")?,
            status_note: row.get("status_note"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }};
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn create(
        &self,
        job_id: i64,
        applicant_id: i64,
        cover_letter: &str,
        resume_asset_id: Option<i64>,
    ) -> Result<Application>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Application>>;

    async fn get_for(&self, job_id: i64, applicant_id: i64) -> Result<Option<Application>>;

    /// Move an application out of `from`. Returns None when it is no longer in that status.
    async fn update_status(
        &self,
        id: i64,
        from: ApplicationStatus,
        status: ApplicationStatus,
        note: Option<&str>,
    ) -> Result<Option<Application>>;

    async fn count_for_job(&self, job_id: i64) -> Result<i64>;

    /// The applicant's applications, newest first
    async fn list_by_applicant(&self, applicant_id: i64) -> Result<Vec<ApplicationWithJob>>;

    async fn list_by_job(
        &self,
        job_id: i64,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<Application>>;
}

pub struct SqlxApplicationRepository {
    pool: DynDatabasePool,
}

impl SqlxApplicationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ApplicationRepository> {
        Arc::new(Self::new(pool))
    }

    async fn reload(&self, id: i64) -> Result<Application> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Application {} not found", id))
    }
}

#[async_trait]
impl ApplicationRepository for SqlxApplicationRepository {
    async fn create(
        &self,
        job_id: i64,
        applicant_id: i64,
        cover_letter: &str,
        resume_asset_id: Option<i64>,
    ) -> Result<Application> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO applications (job_id, applicant_id, cover_letter, resume_asset_id,
                    status, status_note, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, NULL, ?, ?)
                "#,
            )
            .bind(job_id)
            .bind(applicant_id)
            .bind(cover_letter)
            .bind(resume_asset_id)
            .bind(ApplicationStatus::Pending.as_str())
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create application")?
            .inserted_id()
        });
        self.reload(id).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Application>> {
        let sql = format!("SELECT {} FROM applications a WHERE a.id = ?", APPLICATION_COLUMNS);
        with_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get application")?;
            Ok(match row {
                Some(row) => Some(row_to_application!(&row)),
                None => None,
            })
        })
    }

    async fn get_for(&self, job_id: i64, applicant_id: i64) -> Result<Option<Application>> {
        let sql = format!(
            "SELECT {} FROM applications a WHERE a.job_id = ? AND a.applicant_id = ?",
            APPLICATION_COLUMNS
        );
        with_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(job_id)
                .bind(applicant_id)
                .fetch_optional(p)
                .await
                .context("Failed to get application")?;
            Ok(match row {
                Some(row) => Some(row_to_application!(&row)),
                None => None,
            })
        })
    }

    async fn update_status(
        &self,
        id: i64,
        from: ApplicationStatus,
        status: ApplicationStatus,
        note: Option<&str>,
    ) -> Result<Option<Application>> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query(
                "UPDATE applications SET status = ?, status_note = ?, updated_at = ? \
                 WHERE id = ? AND status = ?",
            )
            .bind(status.as_str())
            .bind(note)
            .bind(Utc::now())
            .bind(id)
            .bind(from.as_str())
            .execute(p)
            .await
            .context("Failed to update application status")?
            .rows_affected()
        });
        if affected == 0 {
            return Ok(None);
        }
        self.reload(id).await.map(Some)
    }

    async fn count_for_job(&self, job_id: i64) -> Result<i64> {
        with_pool!(self.pool, |p| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM applications WHERE job_id = ?")
                .bind(job_id)
                .fetch_one(p)
                .await
                .context("Failed to count applications")?;
            Ok(row.get("count"))
        })
    }

    async fn list_by_applicant(&self, applicant_id: i64) -> Result<Vec<ApplicationWithJob>> {
        let sql = format!(
            "SELECT {}, j.title AS job_title, j.slug AS job_slug \
             FROM applications a JOIN jobs j ON j.id = a.job_id \
             WHERE a.applicant_id = ? ORDER BY a.created_at DESC, a.id DESC",
            APPLICATION_COLUMNS
        );
        with_pool!(self.pool, |p| {
            let rows = sqlx::query(&sql)
                .bind(applicant_id)
                .fetch_all(p)
                .await
                .context("Failed to list applications")?;
            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                out.push(ApplicationWithJob {
                    application: row_to_application!(row),
                    job_title: row.get("job_title"),
                    job_slug: row.get("job_slug"),
                });
            }
            Ok(out)
        })
    }

    async fn list_by_job(
        &self,
        job_id: i64,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<Application>> {
        let mut cond = Filter::new();
        cond.push("a.job_id = ?", [SqlArg::Int(job_id)]);
        if let Some(status) = status {
            cond.push("a.status = ?", [SqlArg::Text(status.to_string())]);
        }
        let sql = format!(
            "SELECT {} FROM applications a{} ORDER BY a.created_at ASC, a.id ASC",
            APPLICATION_COLUMNS,
            cond.where_sql()
        );
        with_pool!(self.pool, |p| {
            let rows = bind_args!(sqlx::query(&sql), cond.args())
                .fetch_all(p)
                .await
                .context("Failed to list job applications")?;
            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                out.push(row_to_application!(row));
            }
            Ok(out)
        })
    }
}
