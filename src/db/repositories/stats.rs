//! Aggregate queries for analytics
//!
//! Only plain `COUNT(*)` values come back from the database. Averages and
//! rates are computed by the analytics service so that both drivers decode
//! the same column types.

use crate::db::{parse_column, DynDatabasePool};
use crate::models::EnrollmentStatus;
use crate::with_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::sync::Arc;

/// One bucket of a grouped count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    pub key: String,
    pub count: i64,
}

/// A job and how many applications it received
#[derive(Debug, Clone, Serialize)]
pub struct JobTally {
    pub job_id: i64,
    pub title: String,
    pub status: String,
    pub applications: i64,
}

/// Status and progress of one enrollment in an institution's course
#[derive(Debug, Clone)]
pub struct EnrollmentFact {
    pub course_id: i64,
    pub status: EnrollmentStatus,
    pub progress: i64,
}

#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// `SELECT column, COUNT(*) FROM table GROUP BY column`
    async fn count_by(&self, table: &'static str, column: &'static str) -> Result<Vec<GroupCount>>;

    async fn count_where(&self, table: &'static str, condition: &'static str) -> Result<i64>;

    async fn job_tallies(&self, organization_id: i64) -> Result<Vec<JobTally>>;

    async fn applications_by_status(&self, organization_id: i64) -> Result<Vec<GroupCount>>;

    async fn enrollment_facts(&self, organization_id: i64) -> Result<Vec<EnrollmentFact>>;
}

pub struct SqlxStatsRepository {
    pool: DynDatabasePool,
}

impl SqlxStatsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn StatsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl StatsRepository for SqlxStatsRepository {
    async fn count_by(&self, table: &'static str, column: &'static str) -> Result<Vec<GroupCount>> {
        let sql = format!(
            "SELECT {col} AS bucket, COUNT(*) AS count FROM {table} GROUP BY {col} ORDER BY {col}",
            col = column,
            table = table
        );
        with_pool!(self.pool, |p| {
            let rows = sqlx::query(&sql)
                .fetch_all(p)
                .await
                .with_context(|| format!("Failed to count {} by {}", table, column))?;
            Ok(rows
                .iter()
                .map(|row| GroupCount {
                    key: row.get("bucket"),
                    count: row.get("count"),
                })
                .collect())
        })
    }

    async fn count_where(&self, table: &'static str, condition: &'static str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) AS count FROM {} WHERE {}", table, condition);
        with_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .fetch_one(p)
                .await
                .with_context(|| format!("Failed to count {}", table))?;
            Ok(row.get("count"))
        })
    }

    async fn job_tallies(&self, organization_id: i64) -> Result<Vec<JobTally>> {
        let sql = r#"
            SELECT j.id, j.title, j.status,
                (SELECT COUNT(*) FROM applications a WHERE a.job_id = j.id) AS applications
            FROM jobs j
            WHERE j.organization_id = ?
            ORDER BY j.created_at DESC, j.id DESC
        "#;
        with_pool!(self.pool, |p| {
            let rows = sqlx::query(sql)
                .bind(organization_id)
                .fetch_all(p)
                .await
                .context("Failed to tally jobs")?;
            Ok(rows
                .iter()
                .map(|row| JobTally {
                    job_id: row.get("id"),
                    title: row.get("title"),
                    status: row.get("status"),
                    applications: row.get("applications"),
                })
                .collect())
        })
    }

    async fn applications_by_status(&self, organization_id: i64) -> Result<Vec<GroupCount>> {
        let sql = r#"
            SELECT a.status AS bucket, COUNT(*) AS count
            FROM applications a JOIN jobs j ON j.id = a.job_id
            WHERE j.organization_id = ?
            GROUP BY a.status
            ORDER BY a.status
        "#;
        with_pool!(self.pool, |p| {
            let rows = sqlx::query(sql)
                .bind(organization_id)
                .fetch_all(p)
                .await
                .context("Failed to count applications by status")?;
            Ok(rows
                .iter()
                .map(|row| GroupCount {
                    key: row.get("bucket"),
                    count: row.get("count"),
                })
                .collect())
        })
    }

    async fn enrollment_facts(&self, organization_id: i64) -> Result<Vec<EnrollmentFact>> {
        let sql = r#"
            SELECT e.course_id, e.status, e.progress
            FROM enrollments e JOIN courses c ON c.id = e.course_id
            WHERE c.organization_id = ?
        "#;
        with_pool!(self.pool, |p| {
            let rows = sqlx::query(sql)
                .bind(organization_id)
                .fetch_all(p)
                .await
                .context("Failed to load enrollment facts")?;
            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                let status: String = row.get("status");
                out.push(EnrollmentFact {
                    course_id: row.get("course_id"),
                    status: parse_column::<EnrollmentStatus>(&status, "enrollments.status")?,
                    progress: row.get("progress"),
                });
            }
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{
        course_input, job_input, seed_course, seed_job, seed_org, seed_user, setup_pool,
    };
    use crate::db::repositories::{
        ApplicationRepository, EnrollmentRepository, SqlxApplicationRepository,
        SqlxEnrollmentRepository,
    };
    use crate::models::{CourseStatus, JobStatus, OrganizationKind, UserRole};

    #[tokio::test]
    async fn test_count_by_and_where() {
        let pool = setup_pool().await;
        seed_user(&pool, "a@example.com", UserRole::Youth).await;
        seed_user(&pool, "b@example.com", UserRole::Youth).await;
        seed_user(&pool, "c@example.com", UserRole::Company).await;
        let repo = SqlxStatsRepository::new(pool);

        let by_role = repo.count_by("users", "role").await.unwrap();
        assert_eq!(
            by_role,
            vec![
                GroupCount { key: "company".into(), count: 1 },
                GroupCount { key: "youth".into(), count: 2 },
            ]
        );
        assert_eq!(repo.count_where("users", "status = 'active'").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_company_and_institution_aggregates() {
        let pool = setup_pool().await;
        let hr = seed_user(&pool, "hr@acme.com", UserRole::Company).await;
        let inst = seed_user(&pool, "i@academy.org", UserRole::Institution).await;
        let y1 = seed_user(&pool, "y1@example.com", UserRole::Youth).await;
        let y2 = seed_user(&pool, "y2@example.com", UserRole::Youth).await;
        let company = seed_org(&pool, hr.id, OrganizationKind::Company, "acme").await;
        let academy = seed_org(&pool, inst.id, OrganizationKind::Institution, "academy").await;

        let job = seed_job(&pool, company.id, "dev", &job_input("Dev", &[]), JobStatus::Open).await;
        seed_job(&pool, company.id, "ops", &job_input("Ops", &[]), JobStatus::Draft).await;
        let apps = SqlxApplicationRepository::new(pool.clone());
        apps.create(job.id, y1.id, "", None).await.unwrap();
        apps.create(job.id, y2.id, "", None).await.unwrap();

        let course = seed_course(
            &pool,
            academy.id,
            "rust",
            &course_input("Rust", "Programming", &[]),
            CourseStatus::Published,
        )
        .await;
        let enrollments = SqlxEnrollmentRepository::new(pool.clone());
        let e = enrollments.create(course.id, y1.id).await.unwrap().unwrap();
        enrollments
            .update_progress(e.id, 40, EnrollmentStatus::Active, None)
            .await
            .unwrap();

        let repo = SqlxStatsRepository::new(pool);
        let tallies = repo.job_tallies(company.id).await.unwrap();
        assert_eq!(tallies.len(), 2);
        let dev = tallies.iter().find(|t| t.job_id == job.id).unwrap();
        assert_eq!(dev.applications, 2);

        let by_status = repo.applications_by_status(company.id).await.unwrap();
        assert_eq!(by_status, vec![GroupCount { key: "pending".into(), count: 2 }]);

        let facts = repo.enrollment_facts(academy.id).await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].progress, 40);
        assert!(repo.enrollment_facts(company.id).await.unwrap().is_empty());
    }
}
