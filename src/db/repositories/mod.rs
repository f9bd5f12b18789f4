//! Database repositories
//!
//! One repository per aggregate. Each exposes an `async_trait` interface and
//! a `Sqlx*` implementation that works on either supported driver.

pub mod application;
pub mod asset;
pub mod course;
pub mod enrollment;
pub mod job;
pub mod message;
pub mod organization;
pub mod profile;
pub mod report;
pub mod session;
pub mod startup;
pub mod stats;
pub mod user;

pub use application::{ApplicationRepository, SqlxApplicationRepository};
pub use asset::{AssetRepository, SqlxAssetRepository};
pub use course::{CourseRepository, CourseWithCount, SqlxCourseRepository};
pub use enrollment::{EnrollmentRepository, SqlxEnrollmentRepository};
pub use job::{JobRepository, JobWithCount, SqlxJobRepository};
pub use message::{MessageRepository, SqlxMessageRepository};
pub use organization::{OrganizationRepository, SqlxOrganizationRepository};
pub use profile::{ProfileRepository, SqlxProfileRepository};
pub use report::{ReportFilter, ReportRepository, SqlxReportRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use startup::{SqlxStartupRepository, StartupRepository};
pub use stats::{EnrollmentFact, GroupCount, JobTally, SqlxStatsRepository, StatsRepository};
pub use user::{SqlxUserRepository, UserFilter, UserRepository};

/// Fixtures shared by repository and service tests
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{
        Course, CourseInput, CourseLevel, CourseMode, CourseStatus, EmploymentType, Job, JobInput,
        JobStatus, Organization, OrganizationKind, User, UserRole,
    };

    /// In-memory pool with the schema applied
    pub async fn setup_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    pub async fn seed_user(pool: &DynDatabasePool, email: &str, role: UserRole) -> User {
        SqlxUserRepository::new(pool.clone())
            .create(&User::new(
                email.to_string(),
                "hash".to_string(),
                role,
                email.split('@').next().unwrap_or(email).to_string(),
            ))
            .await
            .expect("Failed to seed user")
    }

    pub async fn seed_org(
        pool: &DynDatabasePool,
        owner_id: i64,
        kind: OrganizationKind,
        slug: &str,
    ) -> Organization {
        SqlxOrganizationRepository::new(pool.clone())
            .create(owner_id, kind, slug, &crate::models::OrganizationInput {
                name: slug.to_string(),
                ..Default::default()
            })
            .await
            .expect("Failed to seed organization")
    }

    pub fn course_input(title: &str, category: &str, tags: &[&str]) -> CourseInput {
        CourseInput {
            title: title.to_string(),
            description: format!("About {}", title),
            category: category.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            level: CourseLevel::Beginner,
            mode: CourseMode::Online,
            duration_weeks: 4,
            capacity: None,
        }
    }

    pub async fn seed_course(
        pool: &DynDatabasePool,
        organization_id: i64,
        slug: &str,
        input: &CourseInput,
        status: CourseStatus,
    ) -> Course {
        let repo = SqlxCourseRepository::new(pool.clone());
        let course = repo
            .create(organization_id, slug, input)
            .await
            .expect("Failed to seed course");
        repo.set_status(course.id, status)
            .await
            .expect("Failed to set course status");
        repo.get_by_id(course.id).await.unwrap().expect("course vanished")
    }

    pub fn job_input(title: &str, skills: &[&str]) -> JobInput {
        JobInput {
            title: title.to_string(),
            description: format!("About {}", title),
            location: "Nairobi".to_string(),
            employment_type: EmploymentType::Internship,
            remote: false,
            salary_min: None,
            salary_max: None,
            skills: skills.iter().map(|s| s.to_string()).collect(),
            deadline: None,
        }
    }

    pub async fn seed_job(
        pool: &DynDatabasePool,
        organization_id: i64,
        slug: &str,
        input: &JobInput,
        status: JobStatus,
    ) -> Job {
        let repo = SqlxJobRepository::new(pool.clone());
        let job = repo
            .create(organization_id, slug, input)
            .await
            .expect("Failed to seed job");
        repo.set_status(job.id, status)
            .await
            .expect("Failed to set job status");
        repo.get_by_id(job.id).await.unwrap().expect("job vanished")
    }
}
