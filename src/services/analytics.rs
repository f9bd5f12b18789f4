//! Dashboard analytics
//!
//! Grouped counts come from the stats repository; averages and rates are
//! derived here.

use crate::cache::SharedCache;
use crate::db::repositories::{
    CourseRepository, GroupCount, JobTally, OrganizationRepository, StatsRepository,
};
use crate::models::{EnrollmentStatus, Organization, OrganizationKind, User};
use crate::services::error::{ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const OVERVIEW_KEY: &str = "analytics:overview";

/// Platform-wide counts for the admin dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminOverview {
    pub users_by_role: Vec<GroupCount>,
    pub users_by_status: Vec<GroupCount>,
    pub organizations_by_kind: Vec<GroupCount>,
    pub verified_organizations: i64,
    pub jobs_by_status: Vec<GroupCount>,
    pub applications_by_status: Vec<GroupCount>,
    pub courses_by_status: Vec<GroupCount>,
    pub enrollments_by_status: Vec<GroupCount>,
    pub startups_by_status: Vec<GroupCount>,
    pub startups_by_stage: Vec<GroupCount>,
    /// Reports not yet resolved or dismissed
    pub open_reports: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyAnalytics {
    pub organization_id: i64,
    pub jobs: Vec<JobTally>,
    pub applications_by_status: Vec<GroupCount>,
    pub total_applications: i64,
    pub average_applications_per_job: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseStats {
    pub course_id: i64,
    pub title: String,
    pub status: String,
    pub enrollments: i64,
    pub completed: i64,
    /// Completed share of all enrollments, 0..=1
    pub completion_rate: f64,
    pub average_progress: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstitutionAnalytics {
    pub organization_id: i64,
    pub courses: Vec<CourseStats>,
    pub enrollments_by_status: Vec<GroupCount>,
}

pub struct AnalyticsService {
    stats_repo: Arc<dyn StatsRepository>,
    org_repo: Arc<dyn OrganizationRepository>,
    course_repo: Arc<dyn CourseRepository>,
    cache: SharedCache,
}

impl AnalyticsService {
    pub fn new(
        stats_repo: Arc<dyn StatsRepository>,
        org_repo: Arc<dyn OrganizationRepository>,
        course_repo: Arc<dyn CourseRepository>,
        cache: SharedCache,
    ) -> Self {
        Self {
            stats_repo,
            org_repo,
            course_repo,
            cache,
        }
    }

    pub async fn admin_overview(&self) -> ServiceResult<AdminOverview> {
        match self.cache.get::<AdminOverview>(OVERVIEW_KEY).await {
            Ok(Some(hit)) => return Ok(hit),
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring unreadable analytics cache entry: {:#}", e),
        }

        let s = &self.stats_repo;
        let overview = AdminOverview {
            users_by_role: s.count_by("users", "role").await?,
            users_by_status: s.count_by("users", "status").await?,
            organizations_by_kind: s.count_by("organizations", "kind").await?,
            verified_organizations: s.count_where("organizations", "verified = 1").await?,
            jobs_by_status: s.count_by("jobs", "status").await?,
            applications_by_status: s.count_by("applications", "status").await?,
            courses_by_status: s.count_by("courses", "status").await?,
            enrollments_by_status: s.count_by("enrollments", "status").await?,
            startups_by_status: s.count_by("startups", "status").await?,
            startups_by_stage: s.count_by("startups", "stage").await?,
            open_reports: s
                .count_where("reports", "status IN ('open', 'reviewing')")
                .await?,
        };

        if let Err(e) = self
            .cache
            .set(OVERVIEW_KEY, &overview, self.cache.default_ttl())
            .await
        {
            tracing::warn!("Failed to cache analytics overview: {:#}", e);
        }
        Ok(overview)
    }

    pub async fn company(&self, user: &User) -> ServiceResult<CompanyAnalytics> {
        let org = self.own_org(user, OrganizationKind::Company).await?;
        let jobs = self.stats_repo.job_tallies(org.id).await?;
        let applications_by_status = self.stats_repo.applications_by_status(org.id).await?;

        let total_applications: i64 = jobs.iter().map(|j| j.applications).sum();
        Ok(CompanyAnalytics {
            organization_id: org.id,
            average_applications_per_job: ratio(total_applications, jobs.len() as i64),
            total_applications,
            jobs,
            applications_by_status,
        })
    }

    pub async fn institution(&self, user: &User) -> ServiceResult<InstitutionAnalytics> {
        let org = self.own_org(user, OrganizationKind::Institution).await?;
        let courses = self.course_repo.list_by_organization(org.id).await?;
        let facts = self.stats_repo.enrollment_facts(org.id).await?;

        #[derive(Default)]
        struct Acc {
            total: i64,
            completed: i64,
            progress: i64,
        }
        let mut per_course: HashMap<i64, Acc> = HashMap::new();
        let mut by_status: BTreeMap<&'static str, i64> = BTreeMap::new();
        for fact in &facts {
            let acc = per_course.entry(fact.course_id).or_default();
            acc.total += 1;
            acc.progress += fact.progress;
            if fact.status == EnrollmentStatus::Completed {
                acc.completed += 1;
            }
            *by_status.entry(fact.status.as_str()).or_default() += 1;
        }

        let courses = courses
            .into_iter()
            .map(|course| {
                let acc = per_course.remove(&course.id).unwrap_or_default();
                CourseStats {
                    course_id: course.id,
                    title: course.title,
                    status: course.status.to_string(),
                    enrollments: acc.total,
                    completed: acc.completed,
                    completion_rate: ratio(acc.completed, acc.total),
                    average_progress: ratio(acc.progress, acc.total),
                }
            })
            .collect();

        Ok(InstitutionAnalytics {
            organization_id: org.id,
            courses,
            enrollments_by_status: by_status
                .into_iter()
                .map(|(key, count)| GroupCount {
                    key: key.to_string(),
                    count,
                })
                .collect(),
        })
    }

    async fn own_org(&self, user: &User, kind: OrganizationKind) -> ServiceResult<Organization> {
        if OrganizationKind::for_role(user.role) != Some(kind) {
            return Err(ServiceError::forbidden(format!("Only {} accounts have these analytics", kind)));
        }
        self.org_repo
            .get_by_owner(user.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Organization"))
    }
}

fn ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator <= 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::test_support::{
        course_input, job_input, seed_course, seed_job, seed_org, seed_user, setup_pool,
    };
    use crate::db::repositories::{
        ApplicationRepository, EnrollmentRepository, SqlxApplicationRepository,
        SqlxCourseRepository, SqlxEnrollmentRepository, SqlxOrganizationRepository,
        SqlxStatsRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::{CourseStatus, JobStatus, UserRole};
    use chrono::Utc;
    use std::time::Duration;

    fn service(pool: &DynDatabasePool) -> AnalyticsService {
        AnalyticsService::new(
            SqlxStatsRepository::boxed(pool.clone()),
            SqlxOrganizationRepository::boxed(pool.clone()),
            SqlxCourseRepository::boxed(pool.clone()),
            Arc::new(MemoryCache::new(10, Duration::from_secs(60))),
        )
    }

    #[test]
    fn test_ratio_handles_empty() {
        assert_eq!(ratio(3, 0), 0.0);
        assert_eq!(ratio(3, 2), 1.5);
    }

    #[tokio::test]
    async fn test_overview_is_cached() {
        let pool = setup_pool().await;
        seed_user(&pool, "admin@example.com", UserRole::Admin).await;
        seed_user(&pool, "y@example.com", UserRole::Youth).await;
        let svc = service(&pool);

        let overview = svc.admin_overview().await.unwrap();
        assert_eq!(overview.users_by_role.iter().map(|g| g.count).sum::<i64>(), 2);
        assert_eq!(overview.open_reports, 0);
        assert_eq!(overview.verified_organizations, 0);

        seed_user(&pool, "z@example.com", UserRole::Youth).await;
        let again = svc.admin_overview().await.unwrap();
        assert_eq!(again.users_by_role.iter().map(|g| g.count).sum::<i64>(), 2);
    }

    #[tokio::test]
    async fn test_company_analytics() {
        let pool = setup_pool().await;
        let hr = seed_user(&pool, "hr@acme.com", UserRole::Company).await;
        let y1 = seed_user(&pool, "y1@example.com", UserRole::Youth).await;
        let y2 = seed_user(&pool, "y2@example.com", UserRole::Youth).await;
        let org = seed_org(&pool, hr.id, OrganizationKind::Company, "acme").await;
        let dev = seed_job(&pool, org.id, "dev", &job_input("Dev", &[]), JobStatus::Open).await;
        seed_job(&pool, org.id, "ops", &job_input("Ops", &[]), JobStatus::Open).await;
        let apps = SqlxApplicationRepository::new(pool.clone());
        apps.create(dev.id, y1.id, "", None).await.unwrap();
        apps.create(dev.id, y2.id, "", None).await.unwrap();
        let svc = service(&pool);

        let stats = svc.company(&hr).await.unwrap();
        assert_eq!(stats.jobs.len(), 2);
        assert_eq!(stats.total_applications, 2);
        assert_eq!(stats.average_applications_per_job, 1.0);
        assert!(matches!(svc.company(&y1).await, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_institution_analytics() {
        let pool = setup_pool().await;
        let inst = seed_user(&pool, "i@academy.org", UserRole::Institution).await;
        let y1 = seed_user(&pool, "y1@example.com", UserRole::Youth).await;
        let y2 = seed_user(&pool, "y2@example.com", UserRole::Youth).await;
        let org = seed_org(&pool, inst.id, OrganizationKind::Institution, "academy").await;
        let course = seed_course(&pool, org.id, "rust", &course_input("Rust", "Programming", &[]), CourseStatus::Published).await;
        seed_course(&pool, org.id, "empty", &course_input("Empty", "Programming", &[]), CourseStatus::Draft).await;

        let enrollments = SqlxEnrollmentRepository::new(pool.clone());
        let a = enrollments.create(course.id, y1.id).await.unwrap().unwrap();
        let b = enrollments.create(course.id, y2.id).await.unwrap().unwrap();
        enrollments
            .update_progress(a.id, 100, EnrollmentStatus::Completed, Some(Utc::now()))
            .await
            .unwrap();
        enrollments
            .update_progress(b.id, 50, EnrollmentStatus::Active, None)
            .await
            .unwrap();

        let stats = service(&pool).institution(&inst).await.unwrap();
        let rust = stats.courses.iter().find(|c| c.course_id == course.id).unwrap();
        assert_eq!(rust.enrollments, 2);
        assert_eq!(rust.completed, 1);
        assert_eq!(rust.completion_rate, 0.5);
        assert_eq!(rust.average_progress, 75.0);
        let empty = stats.courses.iter().find(|c| c.course_id != course.id).unwrap();
        assert_eq!(empty.enrollments, 0);
        assert_eq!(empty.completion_rate, 0.0);
        assert_eq!(
            stats.enrollments_by_status,
            vec![
                GroupCount { key: "active".into(), count: 1 },
                GroupCount { key: "completed".into(), count: 1 },
            ]
        );
    }
}
