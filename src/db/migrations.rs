//! Database migrations
//!
//! Migrations are embedded in the binary as SQL strings, one variant per
//! dialect. Applied versions are tracked in the `_migrations` table so
//! `run_migrations` is safe to call on every start.
//!
//! Timestamps are always written by the application (never by column
//! defaults) so SQLite stores them in one text format and comparisons
//! between them stay ordered.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::DynDatabasePool;
use crate::config::DatabaseDriver;
use crate::with_pool;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users_and_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'active',
                display_name VARCHAR(100) NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'active',
                display_name VARCHAR(100) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL
            );
            CREATE INDEX idx_users_role ON users(role);
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at DATETIME(6) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 2,
        name: "create_assets",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS assets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                object_key VARCHAR(255) NOT NULL UNIQUE,
                purpose VARCHAR(20) NOT NULL,
                content_type VARCHAR(100) NOT NULL,
                size_bytes INTEGER NOT NULL,
                original_name VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_assets_owner ON assets(owner_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS assets (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                owner_id BIGINT NOT NULL,
                object_key VARCHAR(255) NOT NULL UNIQUE,
                purpose VARCHAR(20) NOT NULL,
                content_type VARCHAR(100) NOT NULL,
                size_bytes BIGINT NOT NULL,
                original_name VARCHAR(255) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_assets_owner ON assets(owner_id);
        "#,
    },
    Migration {
        version: 3,
        name: "create_profiles_and_organizations",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id INTEGER PRIMARY KEY,
                full_name VARCHAR(100) NOT NULL,
                headline VARCHAR(200) NOT NULL DEFAULT '',
                bio TEXT NOT NULL DEFAULT '',
                location VARCHAR(100) NOT NULL DEFAULT '',
                education_level VARCHAR(50) NOT NULL DEFAULT '',
                skills TEXT NOT NULL DEFAULT '[]',
                interests TEXT NOT NULL DEFAULT '[]',
                avatar_asset_id INTEGER,
                resume_asset_id INTEGER,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (avatar_asset_id) REFERENCES assets(id) ON DELETE SET NULL,
                FOREIGN KEY (resume_asset_id) REFERENCES assets(id) ON DELETE SET NULL
            );
            CREATE TABLE IF NOT EXISTS organizations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL UNIQUE,
                kind VARCHAR(20) NOT NULL,
                name VARCHAR(150) NOT NULL,
                slug VARCHAR(180) NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                industry VARCHAR(100) NOT NULL DEFAULT '',
                location VARCHAR(100) NOT NULL DEFAULT '',
                website VARCHAR(255) NOT NULL DEFAULT '',
                logo_asset_id INTEGER,
                verified BOOLEAN NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (logo_asset_id) REFERENCES assets(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_organizations_kind ON organizations(kind);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id BIGINT PRIMARY KEY,
                full_name VARCHAR(100) NOT NULL,
                headline VARCHAR(200) NOT NULL DEFAULT '',
                bio TEXT NOT NULL,
                location VARCHAR(100) NOT NULL DEFAULT '',
                education_level VARCHAR(50) NOT NULL DEFAULT '',
                skills TEXT NOT NULL,
                interests TEXT NOT NULL,
                avatar_asset_id BIGINT,
                resume_asset_id BIGINT,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (avatar_asset_id) REFERENCES assets(id) ON DELETE SET NULL,
                FOREIGN KEY (resume_asset_id) REFERENCES assets(id) ON DELETE SET NULL
            );
            CREATE TABLE IF NOT EXISTS organizations (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                owner_id BIGINT NOT NULL UNIQUE,
                kind VARCHAR(20) NOT NULL,
                name VARCHAR(150) NOT NULL,
                slug VARCHAR(180) NOT NULL UNIQUE,
                description TEXT NOT NULL,
                industry VARCHAR(100) NOT NULL DEFAULT '',
                location VARCHAR(100) NOT NULL DEFAULT '',
                website VARCHAR(255) NOT NULL DEFAULT '',
                logo_asset_id BIGINT,
                verified BOOLEAN NOT NULL DEFAULT FALSE,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (logo_asset_id) REFERENCES assets(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_organizations_kind ON organizations(kind);
        "#,
    },
    Migration {
        version: 4,
        name: "create_courses_and_enrollments",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS courses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                organization_id INTEGER NOT NULL,
                title VARCHAR(200) NOT NULL,
                slug VARCHAR(230) NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                category VARCHAR(100) NOT NULL DEFAULT '',
                tags TEXT NOT NULL DEFAULT '[]',
                level VARCHAR(20) NOT NULL,
                mode VARCHAR(20) NOT NULL,
                duration_weeks INTEGER NOT NULL DEFAULT 0,
                capacity INTEGER,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_courses_org ON courses(organization_id);
            CREATE INDEX IF NOT EXISTS idx_courses_status ON courses(status);
            CREATE TABLE IF NOT EXISTS enrollments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                course_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'active',
                progress INTEGER NOT NULL DEFAULT 0,
                enrolled_at TIMESTAMP NOT NULL,
                completed_at TIMESTAMP,
                UNIQUE (course_id, user_id),
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_enrollments_user ON enrollments(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS courses (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                organization_id BIGINT NOT NULL,
                title VARCHAR(200) NOT NULL,
                slug VARCHAR(230) NOT NULL UNIQUE,
                description TEXT NOT NULL,
                category VARCHAR(100) NOT NULL DEFAULT '',
                tags TEXT NOT NULL,
                level VARCHAR(20) NOT NULL,
                mode VARCHAR(20) NOT NULL,
                duration_weeks BIGINT NOT NULL DEFAULT 0,
                capacity BIGINT,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_courses_org ON courses(organization_id);
            CREATE INDEX idx_courses_status ON courses(status);
            CREATE TABLE IF NOT EXISTS enrollments (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                course_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'active',
                progress BIGINT NOT NULL DEFAULT 0,
                enrolled_at DATETIME(6) NOT NULL,
                completed_at DATETIME(6) NULL,
                UNIQUE KEY uq_enrollment (course_id, user_id),
                FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_enrollments_user ON enrollments(user_id);
        "#,
    },
    Migration {
        version: 5,
        name: "create_jobs_and_applications",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                organization_id INTEGER NOT NULL,
                title VARCHAR(200) NOT NULL,
                slug VARCHAR(230) NOT NULL UNIQUE,
                description TEXT NOT NULL DEFAULT '',
                location VARCHAR(100) NOT NULL DEFAULT '',
                employment_type VARCHAR(20) NOT NULL,
                remote BOOLEAN NOT NULL DEFAULT 0,
                salary_min INTEGER,
                salary_max INTEGER,
                skills TEXT NOT NULL DEFAULT '[]',
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                deadline TIMESTAMP,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_org ON jobs(organization_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE TABLE IF NOT EXISTS applications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL,
                applicant_id INTEGER NOT NULL,
                cover_letter TEXT NOT NULL DEFAULT '',
                resume_asset_id INTEGER,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                status_note TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                UNIQUE (job_id, applicant_id),
                FOREIGN KEY (job_id) REFERENCES jobs(id) ON DELETE CASCADE,
                FOREIGN KEY (applicant_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (resume_asset_id) REFERENCES assets(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_applications_applicant ON applications(applicant_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                organization_id BIGINT NOT NULL,
                title VARCHAR(200) NOT NULL,
                slug VARCHAR(230) NOT NULL UNIQUE,
                description TEXT NOT NULL,
                location VARCHAR(100) NOT NULL DEFAULT '',
                employment_type VARCHAR(20) NOT NULL,
                remote BOOLEAN NOT NULL DEFAULT FALSE,
                salary_min BIGINT,
                salary_max BIGINT,
                skills TEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                deadline DATETIME(6) NULL,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_jobs_org ON jobs(organization_id);
            CREATE INDEX idx_jobs_status ON jobs(status);
            CREATE TABLE IF NOT EXISTS applications (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                job_id BIGINT NOT NULL,
                applicant_id BIGINT NOT NULL,
                cover_letter TEXT NOT NULL,
                resume_asset_id BIGINT,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                status_note TEXT,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                UNIQUE KEY uq_application (job_id, applicant_id),
                FOREIGN KEY (job_id) REFERENCES jobs(id) ON DELETE CASCADE,
                FOREIGN KEY (applicant_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (resume_asset_id) REFERENCES assets(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_applications_applicant ON applications(applicant_id);
        "#,
    },
    Migration {
        version: 6,
        name: "create_messages",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id INTEGER NOT NULL,
                recipient_id INTEGER NOT NULL,
                body TEXT NOT NULL,
                read_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (sender_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (recipient_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender_id);
            CREATE INDEX IF NOT EXISTS idx_messages_recipient ON messages(recipient_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS messages (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                sender_id BIGINT NOT NULL,
                recipient_id BIGINT NOT NULL,
                body TEXT NOT NULL,
                read_at DATETIME(6) NULL,
                created_at DATETIME(6) NOT NULL,
                FOREIGN KEY (sender_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (recipient_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_messages_sender ON messages(sender_id);
            CREATE INDEX idx_messages_recipient ON messages(recipient_id);
        "#,
    },
    Migration {
        version: 7,
        name: "create_startups",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS startups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                founder_id INTEGER NOT NULL,
                name VARCHAR(150) NOT NULL,
                slug VARCHAR(180) NOT NULL UNIQUE,
                pitch TEXT NOT NULL DEFAULT '',
                sector VARCHAR(100) NOT NULL DEFAULT '',
                stage VARCHAR(20) NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                funding_goal INTEGER,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                review_note TEXT,
                view_count INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (founder_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_startups_founder ON startups(founder_id);
            CREATE INDEX IF NOT EXISTS idx_startups_status ON startups(status);
            CREATE TABLE IF NOT EXISTS startup_supporters (
                startup_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL,
                PRIMARY KEY (startup_id, user_id),
                FOREIGN KEY (startup_id) REFERENCES startups(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS startups (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                founder_id BIGINT NOT NULL,
                name VARCHAR(150) NOT NULL,
                slug VARCHAR(180) NOT NULL UNIQUE,
                pitch TEXT NOT NULL,
                sector VARCHAR(100) NOT NULL DEFAULT '',
                stage VARCHAR(20) NOT NULL,
                tags TEXT NOT NULL,
                funding_goal BIGINT,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                review_note TEXT,
                view_count BIGINT NOT NULL DEFAULT 0,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (founder_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_startups_founder ON startups(founder_id);
            CREATE INDEX idx_startups_status ON startups(status);
            CREATE TABLE IF NOT EXISTS startup_supporters (
                startup_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                created_at DATETIME(6) NOT NULL,
                PRIMARY KEY (startup_id, user_id),
                FOREIGN KEY (startup_id) REFERENCES startups(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 8,
        name: "create_reports",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                reporter_id INTEGER NOT NULL,
                target_type VARCHAR(20) NOT NULL,
                target_id INTEGER NOT NULL,
                reason VARCHAR(500) NOT NULL,
                details TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'open',
                resolution_note TEXT,
                resolved_by INTEGER,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (reporter_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (resolved_by) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_reports_status ON reports(status);
            CREATE INDEX IF NOT EXISTS idx_reports_target ON reports(target_type, target_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS reports (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                reporter_id BIGINT NOT NULL,
                target_type VARCHAR(20) NOT NULL,
                target_id BIGINT NOT NULL,
                reason VARCHAR(500) NOT NULL,
                details TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'open',
                resolution_note TEXT,
                resolved_by BIGINT,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (reporter_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (resolved_by) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_reports_status ON reports(status);
            CREATE INDEX idx_reports_target ON reports(target_type, target_id);
        "#,
    },
    Migration {
        version: 9,
        name: "add_folded_search_columns",
        up_sqlite: r#"
            ALTER TABLE users ADD COLUMN search_text TEXT NOT NULL DEFAULT '';
            ALTER TABLE courses ADD COLUMN search_text TEXT NOT NULL DEFAULT '';
            ALTER TABLE courses ADD COLUMN category_key VARCHAR(100) NOT NULL DEFAULT '';
            ALTER TABLE courses ADD COLUMN tag_keys TEXT NOT NULL DEFAULT '[]';
            ALTER TABLE jobs ADD COLUMN search_text TEXT NOT NULL DEFAULT '';
            ALTER TABLE jobs ADD COLUMN location_key VARCHAR(100) NOT NULL DEFAULT '';
            ALTER TABLE jobs ADD COLUMN skill_keys TEXT NOT NULL DEFAULT '[]';
            ALTER TABLE startups ADD COLUMN search_text TEXT NOT NULL DEFAULT '';
            ALTER TABLE startups ADD COLUMN sector_key VARCHAR(100) NOT NULL DEFAULT '';
            ALTER TABLE startups ADD COLUMN tag_keys TEXT NOT NULL DEFAULT '[]';
            UPDATE users SET search_text = LOWER(email || char(10) || display_name);
            UPDATE courses SET search_text = LOWER(title || char(10) || description),
                category_key = LOWER(TRIM(category)), tag_keys = LOWER(tags);
            UPDATE jobs SET search_text = LOWER(title || char(10) || description),
                location_key = LOWER(TRIM(location)), skill_keys = LOWER(skills);
            UPDATE startups SET search_text = LOWER(name || char(10) || pitch),
                sector_key = LOWER(TRIM(sector)), tag_keys = LOWER(tags);
        "#,
        up_mysql: r#"
            ALTER TABLE users ADD COLUMN search_text TEXT NULL;
            ALTER TABLE courses ADD COLUMN search_text TEXT NULL;
            ALTER TABLE courses ADD COLUMN category_key VARCHAR(100) NOT NULL DEFAULT '';
            ALTER TABLE courses ADD COLUMN tag_keys TEXT NULL;
            ALTER TABLE jobs ADD COLUMN search_text TEXT NULL;
            ALTER TABLE jobs ADD COLUMN location_key VARCHAR(100) NOT NULL DEFAULT '';
            ALTER TABLE jobs ADD COLUMN skill_keys TEXT NULL;
            ALTER TABLE startups ADD COLUMN search_text TEXT NULL;
            ALTER TABLE startups ADD COLUMN sector_key VARCHAR(100) NOT NULL DEFAULT '';
            ALTER TABLE startups ADD COLUMN tag_keys TEXT NULL;
            UPDATE users SET search_text = LOWER(CONCAT(email, CHAR(10 USING utf8mb4), display_name));
            UPDATE courses SET search_text = LOWER(CONCAT(title, CHAR(10 USING utf8mb4), description)),
                category_key = LOWER(TRIM(category)), tag_keys = LOWER(tags);
            UPDATE jobs SET search_text = LOWER(CONCAT(title, CHAR(10 USING utf8mb4), description)),
                location_key = LOWER(TRIM(location)), skill_keys = LOWER(skills);
            UPDATE startups SET search_text = LOWER(CONCAT(name, CHAR(10 USING utf8mb4), pitch)),
                sector_key = LOWER(TRIM(sector)), tag_keys = LOWER(tags);
        "#,
    },
];

/// Run all pending migrations
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i64> = applied.iter().map(|m| m.version).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&(migration.version as i64)) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at DATETIME(6) NOT NULL
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

/// Get list of already applied migrations
async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    with_pool!(pool, |p| {
        let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
            .fetch_all(p)
            .await
            .context("Failed to read applied migrations")?;

        Ok(rows
            .iter()
            .map(|row| MigrationRecord {
                version: row.get("version"),
                name: row.get("name"),
                applied_at: row.get("applied_at"),
            })
            .collect())
    })
}

/// Apply a single migration and record it
async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => migration.up_sqlite,
        DatabaseDriver::Mysql => migration.up_mysql,
    };

    with_pool!(pool, |p| {
        for statement in split_sql_statements(sql) {
            sqlx::query(statement)
                .execute(p)
                .await
                .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
        }

        sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
            .bind(migration.version as i64)
            .bind(migration.name)
            .bind(Utc::now())
            .execute(p)
            .await
            .context("Failed to record migration")?;

        Ok(())
    })
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, dropping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Get pending migrations count
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}
