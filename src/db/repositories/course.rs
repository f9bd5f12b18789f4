//! Course repository

use crate::db::{
    decode_list, encode_keys, encode_list, fold_key, parse_column, search_document,
    DynDatabasePool, Filter, InsertId, SqlArg,
};
use crate::models::{
    Course, CourseFilter, CourseInput, CourseLevel, CourseMode, CourseStatus, ListParams,
};
use crate::{bind_args, with_pool};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const COURSE_COLUMNS: &str = "c.id, c.organization_id, c.title, c.slug, c.description, \
     c.category, c.tags, c.level, c.mode, c.duration_weeks, c.capacity, c.status, \
     c.created_at, c.updated_at";

macro_rules! row_to_course {
    ($row:expr) => {{
        let row = $row;
        let tags: String = row.get("tags");
        let level: String = row.get("level");
        let mode: String = row.get("mode");
        let status: String = row.get("status");
        Course {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            title: row.get("title"),
            slug: row.get("slug"),
            description: row.get("description"),
            category: row.get("category"),
            tags: decode_list(&tags),
            level: parse_column::<CourseLevel>(&level, "courses.level")?,
            mode: parse_column::<CourseMode>(&mode, "courses.mode")?,
            duration_weeks: row.get("duration_weeks"),
            capacity: row.get("capacity"),
            status: parse_column::<CourseStatus>(&status, "courses.status")?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }};
}

/// A course with a popularity count attached
#[derive(Debug, Clone)]
pub struct CourseWithCount {
    pub course: Course,
    /// Active plus completed enrollments
    pub count: i64,
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Insert a course in `draft` status
    async fn create(&self, organization_id: i64, slug: &str, input: &CourseInput) -> Result<Course>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Course>>;

    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    async fn update(&self, id: i64, input: &CourseInput) -> Result<Course>;

    async fn set_status(&self, id: i64, status: CourseStatus) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Published courses matching the filter, newest first
    async fn list_published(
        &self,
        filter: &CourseFilter,
        params: &ListParams,
    ) -> Result<(Vec<Course>, i64)>;

    /// All courses of one organization regardless of status
    async fn list_by_organization(&self, organization_id: i64) -> Result<Vec<Course>>;

    /// Published courses the user is not actively enrolled in and has not completed
    async fn recommendation_candidates(&self, user_id: i64) -> Result<Vec<CourseWithCount>>;
}

pub struct SqlxCourseRepository {
    pool: DynDatabasePool,
}

impl SqlxCourseRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(pool))
    }

    async fn get_where(&self, column: &str, value: SqlArg) -> Result<Option<Course>> {
        let sql = format!("SELECT {} FROM courses c WHERE c.{} = ?", COURSE_COLUMNS, column);
        let args = [value];
        with_pool!(self.pool, |p| {
            let row = bind_args!(sqlx::query(&sql), args)
                .fetch_optional(p)
                .await
                .context("Failed to get course")?;
            Ok(match row {
                Some(row) => Some(row_to_course!(&row)),
                None => None,
            })
        })
    }
}

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(&self, organization_id: i64, slug: &str, input: &CourseInput) -> Result<Course> {
        let now = Utc::now();
        let id = with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO courses (organization_id, title, slug, description, category, tags,
                    level, mode, duration_weeks, capacity, status, created_at, updated_at,
                    search_text, category_key, tag_keys)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(organization_id)
            .bind(&input.title)
            .bind(slug)
            .bind(&input.description)
            .bind(&input.category)
            .bind(encode_list(&input.tags))
            .bind(input.level.as_str())
            .bind(input.mode.as_str())
            .bind(input.duration_weeks)
            .bind(input.capacity)
            .bind(CourseStatus::Draft.as_str())
            .bind(now)
            .bind(now)
            .bind(search_document(&[&input.title, &input.description]))
            .bind(fold_key(&input.category))
            .bind(encode_keys(&input.tags))
            .execute(p)
            .await
            .context("Failed to create course")?
            .inserted_id()
        });

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Course not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        self.get_where("id", SqlArg::Int(id)).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Course>> {
        self.get_where("slug", SqlArg::Text(slug.to_string())).await
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        with_pool!(self.pool, |p| {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM courses WHERE slug = ?")
                .bind(slug)
                .fetch_one(p)
                .await
                .context("Failed to check course slug")?;
            Ok(row.get::<i64, _>("count") > 0)
        })
    }

    async fn update(&self, id: i64, input: &CourseInput) -> Result<Course> {
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE courses
                SET title = ?, description = ?, category = ?, tags = ?, level = ?, mode = ?,
                    duration_weeks = ?, capacity = ?, updated_at = ?,
                    search_text = ?, category_key = ?, tag_keys = ?
                WHERE id = ?
                "#,
            )
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.category)
            .bind(encode_list(&input.tags))
            .bind(input.level.as_str())
            .bind(input.mode.as_str())
            .bind(input.duration_weeks)
            .bind(input.capacity)
            .bind(Utc::now())
            .bind(search_document(&[&input.title, &input.description]))
            .bind(fold_key(&input.category))
            .bind(encode_keys(&input.tags))
            .bind(id)
            .execute(p)
            .await
            .context("Failed to update course")?;
        });

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Course not found after update"))
    }

    async fn set_status(&self, id: i64, status: CourseStatus) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query("UPDATE courses SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .context("Failed to set course status")?;
        });
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM courses WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete course")?;
        });
        Ok(())
    }

    async fn list_published(
        &self,
        filter: &CourseFilter,
        params: &ListParams,
    ) -> Result<(Vec<Course>, i64)> {
        let mut cond = Filter::new();
        cond.push("c.status = ?", [SqlArg::Text(CourseStatus::Published.to_string())]);
        if let Some(category) = filter.category.as_deref().filter(|s| !s.trim().is_empty()) {
            cond.push_key("c.category_key", category);
        }
        if let Some(level) = filter.level {
            cond.push("c.level = ?", [SqlArg::Text(level.to_string())]);
        }
        if let Some(mode) = filter.mode {
            cond.push("c.mode = ?", [SqlArg::Text(mode.to_string())]);
        }
        if let Some(tag) = filter.tag.as_deref().filter(|s| !s.trim().is_empty()) {
            cond.push_json_term("c.tag_keys", tag);
        }
        if let Some(q) = filter.q.as_deref().filter(|s| !s.trim().is_empty()) {
            cond.push_search("c.search_text", q);
        }

        let list_sql = format!(
            "SELECT {} FROM courses c{} ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?",
            COURSE_COLUMNS,
            cond.where_sql()
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM courses c{}", cond.where_sql());

        with_pool!(self.pool, |p| {
            let rows = bind_args!(sqlx::query(&list_sql), cond.args())
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list courses")?;
            let total: i64 = bind_args!(sqlx::query(&count_sql), cond.args())
                .fetch_one(p)
                .await
                .context("Failed to count courses")?
                .get("count");

            let mut courses = Vec::with_capacity(rows.len());
            for row in &rows {
                courses.push(row_to_course!(row));
            }
            Ok((courses, total))
        })
    }

    async fn list_by_organization(&self, organization_id: i64) -> Result<Vec<Course>> {
        let sql = format!(
            "SELECT {} FROM courses c WHERE c.organization_id = ? ORDER BY c.created_at DESC, c.id DESC",
            COURSE_COLUMNS
        );
        with_pool!(self.pool, |p| {
            let rows = sqlx::query(&sql)
                .bind(organization_id)
                .fetch_all(p)
                .await
                .context("Failed to list organization courses")?;
            let mut courses = Vec::with_capacity(rows.len());
            for row in &rows {
                courses.push(row_to_course!(row));
            }
            Ok(courses)
        })
    }

    async fn recommendation_candidates(&self, user_id: i64) -> Result<Vec<CourseWithCount>> {
        let sql = format!(
            r#"
            SELECT {},
                (SELECT COUNT(*) FROM enrollments e
                 WHERE e.course_id = c.id AND e.status IN ('active', 'completed')) AS popularity
            FROM courses c
            WHERE c.status = 'published'
              AND NOT EXISTS (
                SELECT 1 FROM enrollments mine
                WHERE mine.course_id = c.id AND mine.user_id = ?
                  AND mine.status IN ('active', 'completed'))
            "#,
            COURSE_COLUMNS
        );
        with_pool!(self.pool, |p| {
            let rows = sqlx::query(&sql)
                .bind(user_id)
                .fetch_all(p)
                .await
                .context("Failed to load course candidates")?;
            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                out.push(CourseWithCount {
                    course: row_to_course!(row),
                    count: row.get("popularity"),
                });
            }
            Ok(out)
        })
    }
}
