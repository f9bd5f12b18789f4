//! User repository
//!
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing it for SQLite and MySQL

use crate::db::{parse_column, search_document, DynDatabasePool, Filter, InsertId, SqlArg};
use crate::models::{ListParams, User, UserRole, UserStatus};
use crate::{bind_args, with_pool};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sqlx::Row;
use std::sync::Arc;

const USER_COLUMNS: &str =
    "id, email, password_hash, role, status, display_name, created_at, updated_at";

macro_rules! row_to_user {
    ($row:expr) => {{
        let row = $row;
        let role: String = row.get("role");
        let status: String = row.get("status");
        User {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            role: parse_column::<UserRole>(&role, "users.role")?,
            status: parse_column::<UserStatus>(&status, "users.status")?,
            display_name: row.get("display_name"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }};
}

/// Admin user listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    /// Substring of email or display name
    pub q: Option<String>,
}

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; the returned copy carries the generated id
    async fn create(&self, user: &User) -> Result<User>;

    /// Insert a self-registered account.
    ///
    /// The account is stored as admin when the table is empty. A requested
    /// admin role is refused with None once any user exists. Both checks
    /// are part of the insert.
    async fn create_account(&self, user: &User) -> Result<Option<User>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Look up by email (case-insensitive)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist display name, password hash, role and status
    async fn update(&self, user: &User) -> Result<User>;

    async fn set_status(&self, id: i64, status: UserStatus) -> Result<()>;

    async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<(Vec<User>, i64)>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let email = user.email.to_lowercase();

        let id = with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO users
                    (email, password_hash, role, status, display_name, search_text, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&email)
            .bind(&user.password_hash)
            .bind(user.role.to_string())
            .bind(user.status.to_string())
            .bind(&user.display_name)
            .bind(search_document(&[&email, &user.display_name]))
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create user")?
            .inserted_id()
        });

        Ok(User {
            id,
            email,
            created_at: now,
            updated_at: now,
            ..user.clone()
        })
    }

    async fn create_account(&self, user: &User) -> Result<Option<User>> {
        let now = Utc::now();
        let email = user.email.to_lowercase();
        let admin = UserRole::Admin.to_string();
        // MySQL accepts the target table only as a derived table here
        let sql = r#"
            INSERT INTO users
                (email, password_hash, role, status, display_name, search_text, created_at, updated_at)
            SELECT ?, ?, CASE WHEN n.total > 0 THEN ? ELSE ? END, ?, ?, ?, ?, ?
            FROM (SELECT COUNT(*) AS total FROM users) n
            WHERE ? <> ? OR n.total = 0
            "#;

        let inserted = with_pool!(self.pool, |p| {
            let result = sqlx::query(sql)
                .bind(&email)
                .bind(&user.password_hash)
                .bind(user.role.to_string())
                .bind(&admin)
                .bind(user.status.to_string())
                .bind(&user.display_name)
                .bind(search_document(&[&email, &user.display_name]))
                .bind(now)
                .bind(now)
                .bind(user.role.to_string())
                .bind(&admin)
                .execute(p)
                .await
                .context("Failed to create account")?;
            (result.rows_affected() > 0).then(|| result.inserted_id())
        });

        match inserted {
            Some(id) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        with_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get user by ID")?;
            Ok(match row {
                Some(row) => Some(row_to_user!(&row)),
                None => None,
            })
        })
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        with_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(email.trim().to_lowercase())
                .fetch_optional(p)
                .await
                .context("Failed to get user by email")?;
            Ok(match row {
                Some(row) => Some(row_to_user!(&row)),
                None => None,
            })
        })
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE users
                SET password_hash = ?, role = ?, status = ?, display_name = ?, search_text = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&user.password_hash)
            .bind(user.role.to_string())
            .bind(user.status.to_string())
            .bind(&user.display_name)
            .bind(search_document(&[&user.email, &user.display_name]))
            .bind(now)
            .bind(user.id)
            .execute(p)
            .await
            .context("Failed to update user")?;
        });

        self.get_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    async fn set_status(&self, id: i64, status: UserStatus) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status.to_string())
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .context("Failed to update user status")?;
        });
        Ok(())
    }

    async fn list(&self, filter: &UserFilter, params: &ListParams) -> Result<(Vec<User>, i64)> {
        let mut cond = Filter::new();
        if let Some(role) = filter.role {
            cond.push("role = ?", [SqlArg::Text(role.to_string())]);
        }
        if let Some(status) = filter.status {
            cond.push("status = ?", [SqlArg::Text(status.to_string())]);
        }
        if let Some(q) = filter.q.as_deref().filter(|q| !q.trim().is_empty()) {
            cond.push_search("search_text", q);
        }

        let list_sql = format!(
            "SELECT {} FROM users{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            USER_COLUMNS,
            cond.where_sql()
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM users{}", cond.where_sql());

        with_pool!(self.pool, |p| {
            let rows = bind_args!(sqlx::query(&list_sql), cond.args())
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list users")?;
            let total: i64 = bind_args!(sqlx::query(&count_sql), cond.args())
                .fetch_one(p)
                .await
                .context("Failed to count users")?
                .get("count");

            let mut users = Vec::with_capacity(rows.len());
            for row in &rows {
                users.push(row_to_user!(row));
            }
            Ok((users, total))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn test_user(email: &str, role: UserRole) -> User {
        User::new(email.to_string(), "hash".to_string(), role, "Tester".to_string())
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = setup_test_repo().await;

        let created = repo
            .create(&test_user("Ada@Example.com", UserRole::Youth))
            .await
            .expect("Failed to create user");
        assert!(created.id > 0);
        assert_eq!(created.email, "ada@example.com");

        let by_id = repo.get_by_id(created.id).await.unwrap().expect("missing");
        assert_eq!(by_id.role, UserRole::Youth);
        assert_eq!(by_id.status, UserStatus::Active);

        let by_email = repo.get_by_email("ADA@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id));

        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = setup_test_repo().await;
        repo.create(&test_user("a@example.com", UserRole::Youth)).await.unwrap();
        assert!(repo.create(&test_user("A@example.com", UserRole::Company)).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_set_status() {
        let repo = setup_test_repo().await;
        let mut user = repo.create(&test_user("a@example.com", UserRole::Youth)).await.unwrap();

        user.display_name = "Renamed".to_string();
        user.password_hash = "new-hash".to_string();
        let updated = repo.update(&user).await.unwrap();
        assert_eq!(updated.display_name, "Renamed");
        assert_eq!(updated.password_hash, "new-hash");

        repo.set_status(user.id, UserStatus::Suspended).await.unwrap();
        let reloaded = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert!(reloaded.is_suspended());
    }

    #[tokio::test]
    async fn test_list_with_filters() {
        let repo = setup_test_repo().await;
        repo.create(&test_user("admin@example.com", UserRole::Admin)).await.unwrap();
        repo.create(&test_user("acme@example.com", UserRole::Company)).await.unwrap();
        repo.create(&test_user("y1@example.com", UserRole::Youth)).await.unwrap();
        repo.create(&test_user("y2@example.com", UserRole::Youth)).await.unwrap();

        let (_, total) = repo.list(&UserFilter::default(), &ListParams::default()).await.unwrap();
        assert_eq!(total, 4);

        let filter = UserFilter {
            role: Some(UserRole::Youth),
            ..Default::default()
        };
        let (users, total) = repo.list(&filter, &ListParams::new(1, 1)).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(users.len(), 1);

        let filter = UserFilter {
            q: Some("ACME".to_string()),
            ..Default::default()
        };
        let (users, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(users[0].role, UserRole::Company);
    }

    #[tokio::test]
    async fn test_list_matches_accented_display_name() {
        let repo = setup_test_repo().await;
        let mut user = test_user("alvaro@example.com", UserRole::Youth);
        user.display_name = "ÁLVARO Núñez".to_string();
        let created = repo.create(&user).await.unwrap();
        repo.create(&test_user("other@example.com", UserRole::Youth)).await.unwrap();

        let filter = UserFilter {
            q: Some("álvaro".to_string()),
            ..Default::default()
        };
        let (users, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(users[0].id, created.id);

        let mut renamed = created.clone();
        renamed.display_name = "Émile".to_string();
        repo.update(&renamed).await.unwrap();
        let filter = UserFilter {
            q: Some("ÉMILE".to_string()),
            ..Default::default()
        };
        let (_, total) = repo.list(&filter, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_create_account_promotes_only_the_first() {
        let repo = setup_test_repo().await;

        let first = repo
            .create_account(&test_user("root@example.com", UserRole::Youth))
            .await
            .unwrap()
            .expect("first account inserted");
        assert_eq!(first.role, UserRole::Admin);

        let second = repo
            .create_account(&test_user("y@example.com", UserRole::Youth))
            .await
            .unwrap()
            .expect("second account inserted");
        assert_eq!(second.role, UserRole::Youth);

        let refused = repo
            .create_account(&test_user("x@example.com", UserRole::Admin))
            .await
            .unwrap();
        assert!(refused.is_none());
        assert!(repo.get_by_email("x@example.com").await.unwrap().is_none());
    }
}
