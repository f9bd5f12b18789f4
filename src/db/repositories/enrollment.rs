//! Enrollment repository

use crate::config::DatabaseDriver;
use crate::db::{parse_column, DynDatabasePool, InsertId, SqlArg};
use crate::models::{Enrollment, EnrollmentStatus, EnrollmentWithCourse};
use crate::{bind_args, with_pool};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

const ENROLLMENT_COLUMNS: &str =
    "e.id, e.course_id, e.user_id, e.status, e.progress, e.enrolled_at, e.completed_at";

macro_rules! row_to_enrollment {
    ($row:expr) => {{
        let row = $row;
        let status: String = row.get("status");
        Enrollment {
            id: row.get("id"),
            course_id: row.get("course_id"),
            user_id: row.get("user_id"),
            status: parse_column::<EnrollmentStatus>(&status, "enrollments.status")?,
            progress: row.get("progress"),
            enrolled_at: row.get("enrolled_at"),
            completed_at: row.get("completed_at"),
        }
    }};
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Insert an active enrollment if the course has a free seat.
    ///
    /// The seat check and the insert are one statement. Returns None when
    /// the course is full or does not exist.
    async fn create(&self, course_id: i64, user_id: i64) -> Result<Option<Enrollment>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Enrollment>>;

    /// The single row for a (course, user) pair, whatever its status
    async fn get_for(&self, course_id: i64, user_id: i64) -> Result<Option<Enrollment>>;

    /// Bring a dropped enrollment back to active with progress reset.
    ///
    /// Returns None when the enrollment is no longer dropped or the course
    /// has no free seat.
    async fn reactivate(&self, id: i64, course_id: i64) -> Result<Option<Enrollment>>;

    /// Record progress on an active enrollment. Returns None when it is no longer active.
    async fn update_progress(
        &self,
        id: i64,
        progress: i64,
        status: EnrollmentStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Enrollment>>;

    /// Move an enrollment out of `from`. Returns None when it is no longer in that status.
    async fn set_status(
        &self,
        id: i64,
        from: EnrollmentStatus,
        status: EnrollmentStatus,
    ) -> Result<Option<Enrollment>>;

    /// Enrollments of any status
    async fn count_for_course(&self, course_id: i64) -> Result<i64>;

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<EnrollmentWithCourse>>;

    async fn list_by_course(&self, course_id: i64) -> Result<Vec<Enrollment>>;
}

pub struct SqlxEnrollmentRepository {
    pool: DynDatabasePool,
}

impl SqlxEnrollmentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EnrollmentRepository> {
        Arc::new(Self::new(pool))
    }

    async fn reload(&self, id: i64) -> Result<Enrollment> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Enrollment {} not found", id))
    }
}

#[async_trait]
impl EnrollmentRepository for SqlxEnrollmentRepository {
    async fn create(&self, course_id: i64, user_id: i64) -> Result<Option<Enrollment>> {
        let inserted = with_pool!(self.pool, |p| {
            let result = sqlx::query(
                r#"
                INSERT INTO enrollments (course_id, user_id, status, progress, enrolled_at)
                SELECT c.id, ?, ?, 0, ?
                FROM courses c
                LEFT JOIN enrollments a ON a.course_id = c.id AND a.status = ?
                WHERE c.id = ?
                GROUP BY c.id, c.capacity
                HAVING c.capacity IS NULL OR COUNT(a.id) < c.capacity
                "#,
            )
            .bind(user_id)
            .bind(EnrollmentStatus::Active.as_str())
            .bind(Utc::now())
            .bind(EnrollmentStatus::Active.as_str())
            .bind(course_id)
            .execute(p)
            .await
            .context("Failed to create enrollment")?;
            (result.rows_affected() > 0).then(|| result.inserted_id())
        });
        match inserted {
            Some(id) => self.reload(id).await.map(Some),
            None => Ok(None),
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Enrollment>> {
        let sql = format!("SELECT {} FROM enrollments e WHERE e.id = ?", ENROLLMENT_COLUMNS);
        with_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get enrollment")?;
            Ok(match row {
                Some(row) => Some(row_to_enrollment!(&row)),
                None => None,
            })
        })
    }

    async fn get_for(&self, course_id: i64, user_id: i64) -> Result<Option<Enrollment>> {
        let sql = format!(
            "SELECT {} FROM enrollments e WHERE e.course_id = ? AND e.user_id = ?",
            ENROLLMENT_COLUMNS
        );
        with_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(course_id)
                .bind(user_id)
                .fetch_optional(p)
                .await
                .context("Failed to get enrollment")?;
            Ok(match row {
                Some(row) => Some(row_to_enrollment!(&row)),
                None => None,
            })
        })
    }

    async fn reactivate(&self, id: i64, course_id: i64) -> Result<Option<Enrollment>> {
        let active = || SqlArg::Text(EnrollmentStatus::Active.to_string());
        let dropped = SqlArg::Text(EnrollmentStatus::Dropped.to_string());
        let now = SqlArg::Time(Utc::now());
        // MySQL refuses a subquery on the table being updated, so it counts
        // seats through a derived table instead.
        let (sql, args) = match self.pool.driver() {
            DatabaseDriver::Sqlite => (
                r#"
                UPDATE enrollments
                SET status = ?, progress = 0, enrolled_at = ?, completed_at = NULL
                WHERE id = ? AND status = ?
                  AND EXISTS (
                    SELECT 1 FROM courses c
                    WHERE c.id = ? AND (c.capacity IS NULL OR c.capacity >
                        (SELECT COUNT(*) FROM enrollments a WHERE a.course_id = c.id AND a.status = ?)))
                "#,
                vec![active(), now, SqlArg::Int(id), dropped, SqlArg::Int(course_id), active()],
            ),
            DatabaseDriver::Mysql => (
                r#"
                UPDATE enrollments e
                JOIN courses c ON c.id = e.course_id
                JOIN (SELECT COUNT(*) AS seats FROM enrollments WHERE course_id = ? AND status = ?) n
                SET e.status = ?, e.progress = 0, e.enrolled_at = ?, e.completed_at = NULL
                WHERE e.id = ? AND e.status = ? AND (c.capacity IS NULL OR n.seats < c.capacity)
                "#,
                vec![SqlArg::Int(course_id), active(), active(), now, SqlArg::Int(id), dropped],
            ),
        };
        let affected = with_pool!(self.pool, |p| {
            bind_args!(sqlx::query(sql), args)
                .execute(p)
                .await
                .context("Failed to reactivate enrollment")?
                .rows_affected()
        });
        if affected == 0 {
            return Ok(None);
        }
        self.reload(id).await.map(Some)
    }

    async fn update_progress(
        &self,
        id: i64,
        progress: i64,
        status: EnrollmentStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Enrollment>> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query(
                "UPDATE enrollments SET progress = ?, status = ?, completed_at = ? \
                 WHERE id = ? AND status = ?",
            )
            .bind(progress)
            .bind(status.as_str())
            .bind(completed_at)
            .bind(id)
            .bind(EnrollmentStatus::Active.as_str())
            .execute(p)
            .await
            .context("Failed to update enrollment progress")?
            .rows_affected()
        });
        if affected == 0 {
            return Ok(None);
        }
        self.reload(id).await.map(Some)
    }

    async fn set_status(
        &self,
        id: i64,
        from: EnrollmentStatus,
        status: EnrollmentStatus,
    ) -> Result<Option<Enrollment>> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query("UPDATE enrollments SET status = ? WHERE id = ? AND status = ?")
                .bind(status.as_str())
                .bind(id)
                .bind(from.as_str())
                .execute(p)
                .await
                .context("Failed to set enrollment status")?
                .rows_affected()
        });
        if affected == 0 {
            return Ok(None);
        }
        self.reload(id).await.map(Some)
    }

    async fn count_for_course(&self, course_id: i64) -> Result<i64> {
        with_pool!(self.pool, |p| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM enrollments WHERE course_id = ?")
                .bind(course_id)
                .fetch_one(p)
                .await
                .context("Failed to count enrollments")?;
            Ok(row.get("count"))
        })
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<EnrollmentWithCourse>> {
        let sql = format!(
            "SELECT {}, c.title AS course_title, c.slug AS course_slug \
             FROM enrollments e JOIN courses c ON c.id = e.course_id \
             WHERE e.user_id = ? ORDER BY e.enrolled_at DESC, e.id DESC",
            ENROLLMENT_COLUMNS
        );
        with_pool!(self.pool, |p| {
            let rows = sqlx::query(&sql)
                .bind(user_id)
                .fetch_all(p)
                .await
                .context("Failed to list user enrollments")?;
            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                out.push(EnrollmentWithCourse {
                    enrollment: row_to_enrollment!(row),
                    course_title: row.get("course_title"),
                    course_slug: row.get("course_slug"),
                });
            }
            Ok(out)
        })
    }

    async fn list_by_course(&self, course_id: i64) -> Result<Vec<Enrollment>> {
        let sql = format!(
            "SELECT {} FROM enrollments e WHERE e.course_id = ? ORDER BY e.enrolled_at ASC, e.id ASC",
            ENROLLMENT_COLUMNS
        );
        with_pool!(self.pool, |p| {
            let rows = sqlx::query(&sql)
                .bind(course_id)
                .fetch_all(p)
                .await
                .context("Failed to list course enrollments")?;
            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                out.push(row_to_enrollment!(row));
            }
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{
        course_input, seed_course, seed_org, seed_user, setup_pool,
    };
    use crate::models::{CourseStatus, OrganizationKind, UserRole};

    fn active_count(list: &[Enrollment]) -> usize {
        list.iter().filter(|e| e.status == EnrollmentStatus::Active).count()
    }

    #[tokio::test]
    async fn test_enrollment_lifecycle() {
        let pool = setup_pool().await;
        let owner = seed_user(&pool, "inst@example.com", UserRole::Institution).await;
        let youth = seed_user(&pool, "y@example.com", UserRole::Youth).await;
        let org = seed_org(&pool, owner.id, OrganizationKind::Institution, "academy").await;
        let course = seed_course(
            &pool,
            org.id,
            "rust",
            &course_input("Rust", "Programming", &[]),
            CourseStatus::Published,
        )
        .await;
        let repo = SqlxEnrollmentRepository::new(pool);

        let e = repo.create(course.id, youth.id).await.unwrap().unwrap();
        assert_eq!(e.status, EnrollmentStatus::Active);
        assert_eq!(e.progress, 0);
        assert_eq!(active_count(&repo.list_by_course(course.id).await.unwrap()), 1);
        assert!(repo.create(course.id, youth.id).await.is_err());
        assert!(repo.create(9999, youth.id).await.unwrap().is_none());

        let now = Utc::now();
        let done = repo
            .update_progress(e.id, 100, EnrollmentStatus::Completed, Some(now))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, EnrollmentStatus::Completed);
        assert!(done.completed_at.is_some());
        assert!(repo
            .update_progress(e.id, 50, EnrollmentStatus::Active, None)
            .await
            .unwrap()
            .is_none());
        assert_eq!(active_count(&repo.list_by_course(course.id).await.unwrap()), 0);
        assert_eq!(repo.count_for_course(course.id).await.unwrap(), 1);

        assert!(repo
            .set_status(e.id, EnrollmentStatus::Active, EnrollmentStatus::Dropped)
            .await
            .unwrap()
            .is_none());
        let dropped = repo
            .set_status(e.id, EnrollmentStatus::Completed, EnrollmentStatus::Dropped)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dropped.status, EnrollmentStatus::Dropped);

        let back = repo.reactivate(e.id, course.id).await.unwrap().unwrap();
        assert_eq!(back.id, e.id);
        assert_eq!(back.status, EnrollmentStatus::Active);
        assert_eq!(back.progress, 0);
        assert!(back.completed_at.is_none());
        assert!(repo.reactivate(e.id, course.id).await.unwrap().is_none());

        let mine = repo.list_by_user(youth.id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].course_title, "Rust");
        assert_eq!(repo.list_by_course(course.id).await.unwrap().len(), 1);
        assert_eq!(
            repo.get_for(course.id, youth.id).await.unwrap().map(|e| e.id),
            Some(e.id)
        );
    }

    #[tokio::test]
    async fn test_seat_check_is_part_of_the_write() {
        let pool = setup_pool().await;
        let owner = seed_user(&pool, "inst@example.com", UserRole::Institution).await;
        let first = seed_user(&pool, "a@example.com", UserRole::Youth).await;
        let second = seed_user(&pool, "b@example.com", UserRole::Youth).await;
        let org = seed_org(&pool, owner.id, OrganizationKind::Institution, "academy").await;
        let mut input = course_input("Rust", "Programming", &[]);
        input.capacity = Some(1);
        let course = seed_course(&pool, org.id, "rust", &input, CourseStatus::Published).await;
        let repo = SqlxEnrollmentRepository::new(pool);

        let taken = repo.create(course.id, first.id).await.unwrap().unwrap();
        assert!(repo.create(course.id, second.id).await.unwrap().is_none());
        assert!(repo.get_for(course.id, second.id).await.unwrap().is_none());

        repo.set_status(taken.id, EnrollmentStatus::Active, EnrollmentStatus::Dropped)
            .await
            .unwrap()
            .unwrap();
        let seated = repo.create(course.id, second.id).await.unwrap().unwrap();
        assert_eq!(seated.user_id, second.id);

        // the seat went to someone else while the first enrollment was dropped
        assert!(repo.reactivate(taken.id, course.id).await.unwrap().is_none());
        assert_eq!(active_count(&repo.list_by_course(course.id).await.unwrap()), 1);
    }
}
