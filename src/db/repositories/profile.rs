//! Youth profile repository

use crate::config::DatabaseDriver;
use crate::db::{decode_list, encode_list, DynDatabasePool};
use crate::models::{Profile, ProfileInput};
use crate::with_pool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const PROFILE_COLUMNS: &str = "user_id, full_name, headline, bio, location, education_level, \
     skills, interests, avatar_asset_id, resume_asset_id, updated_at";

macro_rules! row_to_profile {
    ($row:expr) => {{
        let row = $row;
        let skills: String = row.get("skills");
        let interests: String = row.get("interests");
        Profile {
            user_id: row.get("user_id"),
            full_name: row.get("full_name"),
            headline: row.get("headline"),
            bio: row.get("bio"),
            location: row.get("location"),
            education_level: row.get("education_level"),
            skills: decode_list(&skills),
            interests: decode_list(&interests),
            avatar_asset_id: row.get("avatar_asset_id"),
            resume_asset_id: row.get("resume_asset_id"),
            updated_at: row.get("updated_at"),
        }
    }};
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get(&self, user_id: i64) -> Result<Option<Profile>>;

    /// Insert or replace the profile of `user_id`
    async fn upsert(&self, user_id: i64, input: &ProfileInput) -> Result<Profile>;
}

pub struct SqlxProfileRepository {
    pool: DynDatabasePool,
}

impl SqlxProfileRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProfileRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ProfileRepository for SqlxProfileRepository {
    async fn get(&self, user_id: i64) -> Result<Option<Profile>> {
        let sql = format!("SELECT {} FROM profiles WHERE user_id = ?", PROFILE_COLUMNS);
        with_pool!(self.pool, |p| {
            let row = sqlx::query(&sql)
                .bind(user_id)
                .fetch_optional(p)
                .await
                .context("Failed to get profile")?;
            Ok(row.map(|row| row_to_profile!(&row)))
        })
    }

    async fn upsert(&self, user_id: i64, input: &ProfileInput) -> Result<Profile> {
        let conflict = match self.pool.driver() {
            DatabaseDriver::Sqlite => "ON CONFLICT(user_id) DO UPDATE SET \
                full_name = excluded.full_name, headline = excluded.headline, bio = excluded.bio, \
                location = excluded.location, education_level = excluded.education_level, \
                skills = excluded.skills, interests = excluded.interests, \
                avatar_asset_id = excluded.avatar_asset_id, resume_asset_id = excluded.resume_asset_id, \
                updated_at = excluded.updated_at",
            DatabaseDriver::Mysql => "ON DUPLICATE KEY UPDATE \
                full_name = VALUES(full_name), headline = VALUES(headline), bio = VALUES(bio), \
                location = VALUES(location), education_level = VALUES(education_level), \
                skills = VALUES(skills), interests = VALUES(interests), \
                avatar_asset_id = VALUES(avatar_asset_id), resume_asset_id = VALUES(resume_asset_id), \
                updated_at = VALUES(updated_at)",
        };
        let sql = format!(
            "INSERT INTO profiles ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) {}",
            PROFILE_COLUMNS, conflict
        );

        with_pool!(self.pool, |p| {
            sqlx::query(&sql)
                .bind(user_id)
                .bind(&input.full_name)
                .bind(&input.headline)
                .bind(&input.bio)
                .bind(&input.location)
                .bind(&input.education_level)
                .bind(encode_list(&input.skills))
                .bind(encode_list(&input.interests))
                .bind(input.avatar_asset_id)
                .bind(input.resume_asset_id)
                .bind(Utc::now())
                .execute(p)
                .await
                .context("Failed to save profile")?;
        });

        self.get(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Profile not found after save"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_user, setup_pool};
    use crate::models::UserRole;

    #[tokio::test]
    async fn test_upsert_inserts_then_replaces() {
        let pool = setup_pool().await;
        let user = seed_user(&pool, "y@example.com", UserRole::Youth).await;
        let repo = SqlxProfileRepository::new(pool);

        assert!(repo.get(user.id).await.unwrap().is_none());

        let mut input = ProfileInput {
            full_name: "Amina".to_string(),
            skills: vec!["rust".to_string(), "sql".to_string()],
            interests: vec!["fintech".to_string()],
            ..Default::default()
        };
        let created = repo.upsert(user.id, &input).await.unwrap();
        assert_eq!(created.full_name, "Amina");
        assert_eq!(created.skills, vec!["rust", "sql"]);

        input.headline = "Backend learner".to_string();
        input.skills = vec!["go".to_string()];
        let updated = repo.upsert(user.id, &input).await.unwrap();
        assert_eq!(updated.headline, "Backend learner");
        assert_eq!(updated.skills, vec!["go"]);
        assert_eq!(updated.interests, vec!["fintech"]);
    }
}
