//! Job posting repository

use crate::db::{
    decode_list, encode_keys, encode_list, fold_key, parse_column, search_document,
    DynDatabasePool, Filter, InsertId, SqlArg,
};
use crate::models::{EmploymentType, Job, JobFilter, JobInput, JobStatus, ListParams};
use crate::{bind_args, with_pool};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

const JOB_COLUMNS: &str = "j.id, j.organization_id, j.title, j.slug, j.description, j.location, \
     j.employment_type, j.remote, j.salary_min, j.salary_max, j.skills, j.status, j.deadline, \
     j.created_at, j.updated_at";

macro_rules! row_to_job {
    ($row:expr) => {{
        let row = $row;
        let skills: String = row.get("skills");
        let employment_type: String = row.get("employment_type");
        let status: String = row.get("status");
        Job {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            title: row.get("title"),
            slug: row.get("slug"),
            description: row.get("description"),
            location: row.get("location"),
            employment_type: parse_column::<EmploymentType>(&employment_type, "jobs.employment_type")?,
            remote: row.get("remote"),
            salary_min: row.get("salary_min"),
            salary_max: row.get("salary_max"),
            skills: decode_list(&skills),
            status: parse_column::<JobStatus>(&status, "jobs.status")?,
            deadline: row.get("deadline"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }};
}

/// A job with its application count attached
#[derive(Debug, Clone)]
pub struct JobWithCount {
    pub job: Job,
    pub count: i64,
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a job in `draft` status
    async fn create(&self, organization_id: i64, slug: &str, input: &JobInput) -> Result<Job>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Job>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Job>>;

    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    async fn update(&self, id: i64, input: &JobInput) -> Result<Job>;

    async fn set_status(&self, id: i64, status: JobStatus) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Open jobs whose deadline is after `now`, newest first
    async fn list_open(
        &self,
        filter: &JobFilter,
        params: &ListParams,
        now: DateTime<Utc>,
    ) -> Result<(Vec<Job>, i64)>;

    async fn list_by_organization(&self, organization_id: i64) -> Result<Vec<Job>>;

    /// Open, non-expired jobs the user has not applied to, with application counts
    async fn recommendation_candidates(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobWithCount>>;
}

pub struct SqlxJobRepository {
    pool: DynDatabasePool,
}

impl SqlxJobRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn JobRepository> {
        Arc::new(Self::new(pool))
    }

    async fn get_where(&self, column: &str, value: SqlArg) -> Result<Option<Job>> {
        let sql = format!("SELECT {} FROM jobs j WHERE j.{} = ?", JOB_COLUMNS, column);
        let args = [value];
        with_pool!(self.pool, |p| {
            let row = bind_args!(sqlx::query(&sql), args)
                .fetch_optional(p)
                .await
                .context("Failed to get job")?;
            Ok(match row {
                Some(row) => Some(row_to_job!(&row)),
                None => None,
            })
        })
    }
}

#[async_trait]
impl JobRepository for SqlxJobRepository {
    async fn create(&self, organization_id: i64, slug: &str, input: &JobInput) -> Result<Job> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO jobs (organization_id, title, slug, description, location,
                    employment_type, remote, salary_min, salary_max, skills, status, deadline,
                    created_at, updated_at, search_text, location_key, skill_keys)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(organization_id)
            .bind(&input.title)
            .bind(slug)
            .bind(&input.description)
            .bind(&input.location)
            .bind(input.employment_type.as_str())
            .bind(input.remote)
            .bind(input.salary_min)
            .bind(input.salary_max)
            .bind(encode_list(&input.skills))
            .bind(JobStatus::Draft.as_str())
            .bind(input.deadline)
            .bind(now)
            .bind(now)
            .bind(search_document(&[&input.title, &input.description]))
            .bind(fold_key(&input.location))
            .bind(encode_keys(&input.skills))
            .execute(p)
            .await
            .context("Failed to create job")?
            .inserted_id()
        });

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Job not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Job>> {
        self.get_where("id", SqlArg::Int(id)).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Job>> {
        self.get_where("slug", SqlArg::Text(slug.to_string())).await
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        with_pool!(self.pool, |p| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM jobs WHERE slug = ?")
                .bind(slug)
                .fetch_one(p)
                .await
                .context("Failed to check job slug")?;
            Ok(row.get::<i64, _>("count") > 0)
        })
    }

    async fn update(&self, id: i64, input: &JobInput) -> Result<Job> {
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE jobs
                SET title = ?, description = ?, location = ?, employment_type = ?, remote = ?,
                    salary_min = ?, salary_max = ?, skills = ?, deadline = ?, updated_at = ?,
                    search_text = ?, location_key = ?, skill_keys = ?
                WHERE id = ?
                "#,
            )
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.location)
            .bind(input.employment_type.as_str())
            .bind(input.remote)
            .bind(input.salary_min)
            .bind(input.salary_max)
            .bind(encode_list(&input.skills))
            .bind(input.deadline)
            .bind(Utc::now())
            .bind(search_document(&[&input.title, &input.description]))
            .bind(fold_key(&input.location))
            .bind(encode_keys(&input.skills))
            .bind(id)
            .execute(p)
            .await
            .context("Failed to update job")?;
        });

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Job not found after update"))
    }

    async fn set_status(&self, id: i64, status: JobStatus) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query("UPDATE jobs SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .context("Failed to set job status")?;
        });
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM jobs WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete job")?;
        });
        Ok(())
    }

    async fn list_open(
        &self,
        filter: &JobFilter,
        params: &ListParams,
        now: DateTime<Utc>,
    ) -> Result<(Vec<Job>, i64)> {
        let mut cond = Filter::new();
        cond.push("j.status = ?", [SqlArg::Text(JobStatus::Open.to_string())]);
        cond.push("(j.deadline IS NULL OR j.deadline > ?)", [SqlArg::Time(now)]);
        if let Some(kind) = filter.employment_type {
            cond.push("j.employment_type = ?", [SqlArg::Text(kind.to_string())]);
        }
        if let Some(remote) = filter.remote {
            cond.push("j.remote = ?", [SqlArg::Bool(remote)]);
        }
        if let Some(location) = filter.location.as_deref().filter(|s| !s.trim().is_empty()) {
            cond.push_search("j.location_key", location);
        }
        if let Some(skill) = filter.skill.as_deref().filter(|s| !s.trim().is_empty()) {
            cond.push_json_term("j.skill_keys", skill);
        }
        if let Some(q) = filter.q.as_deref().filter(|s| !s.trim().is_empty()) {
            cond.push_search("j.search_text", q);
        }

        let list_sql = format!(
            "SELECT {} FROM jobs j{} ORDER BY j.created_at DESC, j.id DESC LIMIT ? OFFSET ?",
            JOB_COLUMNS,
            cond.where_sql()
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM jobs j{}", cond.where_sql());

        with_pool!(self.pool, |p| {
            let rows = bind_args!(sqlx::query(&list_sql), cond.args())
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list jobs")?;
            let total: i64 = bind_args!(sqlx::query(&count_sql), cond.args())
                .fetch_one(p)
                .await
                .context("Failed to count jobs")?
                .get("count");

            let mut jobs = Vec::with_capacity(rows.len());
            for row in &rows {
                jobs.push(row_to_job!(row));
            }
            Ok((jobs, total))
        })
    }

    async fn list_by_organization(&self, organization_id: i64) -> Result<Vec<Job>> {
        let sql = format!(
            "SELECT {} FROM jobs j WHERE j.organization_id = ? ORDER BY j.created_at DESC, j.id DESC",
            JOB_COLUMNS
        );
        with_pool!(self.pool, |p| {
            let rows = sqlx::query(&sql)
                .bind(organization_id)
                .fetch_all(p)
                .await
                .context("Failed to list organization jobs")?;
            let mut jobs = Vec::with_capacity(rows.len());
            for row in &rows {
                jobs.push(row_to_job!(row));
            }
            Ok(jobs)
        })
    }

    async fn recommendation_candidates(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<JobWithCount>> {
        let sql = format!(
            r#"
            SELECT {},
                (SELECT COUNT(*) FROM applications a WHERE a.job_id = j.id) AS popularity
            FROM jobs j
            WHERE j.status = 'open'
              AND (j.deadline IS NULL OR j.deadline > ?)
              AND NOT EXISTS (
                SELECT 1 FROM applications mine
                WHERE mine.job_id = j.id AND mine.applicant_id = ?)
            "#,
            JOB_COLUMNS
        );
        with_pool!(self.pool, |p| {
            let rows = sqlx::query(&sql)
                .bind(now)
                .bind(user_id)
                .fetch_all(p)
                .await
                .context("Failed to load job candidates")?;
            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                out.push(JobWithCount {
                    job: row_to_job!(row),
                    count: row.get("popularity"),
                });
            }
            Ok(out)
        })
    }
}
