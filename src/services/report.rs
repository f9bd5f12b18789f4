//! Content reports and their moderation

use crate::db::repositories::{
    CourseRepository, JobRepository, MessageRepository, ReportFilter, ReportRepository,
    StartupRepository, UserRepository,
};
use crate::models::{ListParams, PagedResult, Report, ReportStatus, ReportTarget, User};
use crate::services::error::{ServiceError, ServiceResult};
use serde::Deserialize;
use std::sync::Arc;

/// Body of a new report
#[derive(Debug, Clone, Deserialize)]
pub struct ReportInput {
    pub target_type: ReportTarget,
    pub target_id: i64,
    pub reason: String,
    #[serde(default)]
    pub details: Option<String>,
}

/// Repositories that can tell whether a report target exists
pub struct ReportTargets {
    pub users: Arc<dyn UserRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub courses: Arc<dyn CourseRepository>,
    pub startups: Arc<dyn StartupRepository>,
    pub messages: Arc<dyn MessageRepository>,
}

pub struct ReportService {
    report_repo: Arc<dyn ReportRepository>,
    targets: ReportTargets,
}

impl ReportService {
    pub fn new(report_repo: Arc<dyn ReportRepository>, targets: ReportTargets) -> Self {
        Self {
            report_repo,
            targets,
        }
    }

    pub async fn file(&self, reporter: &User, input: ReportInput) -> ServiceResult<Report> {
        let reason = input.reason.trim();
        let len = reason.chars().count();
        if !(3..=500).contains(&len) {
            return Err(ServiceError::validation("Reason must be 3 to 500 characters"));
        }
        let details = input.details.as_deref().map(str::trim).filter(|d| !d.is_empty());
        if details.is_some_and(|d| d.chars().count() > 5000) {
            return Err(ServiceError::validation("Details are too long"));
        }

        if !self.target_exists(reporter, input.target_type, input.target_id).await? {
            return Err(ServiceError::not_found("Report target"));
        }
        if self
            .report_repo
            .has_open(reporter.id, input.target_type, input.target_id)
            .await?
        {
            return Err(ServiceError::conflict("You already reported this"));
        }

        let report = self
            .report_repo
            .create(reporter.id, input.target_type, input.target_id, reason, details)
            .await?;
        tracing::info!(
            report_id = report.id,
            target_type = %input.target_type,
            target_id = input.target_id,
            "Report filed"
        );
        Ok(report)
    }

    pub async fn list(&self, filter: &ReportFilter, params: &ListParams) -> ServiceResult<PagedResult<Report>> {
        let (items, total) = self.report_repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Admin moves a report along `open -> reviewing -> resolved | dismissed`
    pub async fn transition(
        &self,
        admin: &User,
        id: i64,
        status: ReportStatus,
        note: Option<&str>,
    ) -> ServiceResult<Report> {
        let report = self
            .report_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Report"))?;
        if !report.status.can_move_to(status) {
            return Err(ServiceError::validation(format!(
                "Cannot move report from {} to {}",
                report.status, status
            )));
        }
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        let updated = self
            .report_repo
            .transition(id, report.status, status, admin.id, note)
            .await?
            .ok_or_else(|| ServiceError::conflict("Report was moderated by someone else"))?;
        tracing::info!(report_id = id, from = %report.status, to = %status, admin_id = admin.id, "Report moderated");
        Ok(updated)
    }

    async fn target_exists(&self, reporter: &User, target: ReportTarget, id: i64) -> ServiceResult<bool> {
        let t = &self.targets;
        Ok(match target {
            ReportTarget::User => t.users.get_by_id(id).await?.is_some(),
            ReportTarget::Job => t.jobs.get_by_id(id).await?.is_some(),
            ReportTarget::Course => t.courses.get_by_id(id).await?.is_some(),
            ReportTarget::Startup => t.startups.get_by_id(id).await?.is_some(),
            // only messages the reporter took part in
            ReportTarget::Message => t
                .messages
                .get_by_id(id)
                .await?
                .is_some_and(|m| m.sender_id == reporter.id || m.recipient_id == reporter.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_user, setup_pool};
    use crate::db::repositories::{
        SqlxCourseRepository, SqlxJobRepository, SqlxMessageRepository, SqlxReportRepository,
        SqlxStartupRepository, SqlxUserRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::UserRole;

    fn service(pool: &DynDatabasePool) -> ReportService {
        ReportService::new(
            SqlxReportRepository::boxed(pool.clone()),
            ReportTargets {
                users: SqlxUserRepository::boxed(pool.clone()),
                jobs: SqlxJobRepository::boxed(pool.clone()),
                courses: SqlxCourseRepository::boxed(pool.clone()),
                startups: SqlxStartupRepository::boxed(pool.clone()),
                messages: SqlxMessageRepository::boxed(pool.clone()),
            },
        )
    }

    fn about(target_type: ReportTarget, target_id: i64, reason: &str) -> ReportInput {
        ReportInput {
            target_type,
            target_id,
            reason: reason.to_string(),
            details: None,
        }
    }

    #[tokio::test]
    async fn test_file_report_rules() {
        let pool = setup_pool().await;
        let reporter = seed_user(&pool, "r@example.com", UserRole::Youth).await;
        let spammer = seed_user(&pool, "s@example.com", UserRole::Company).await;
        let svc = service(&pool);

        assert!(matches!(
            svc.file(&reporter, about(ReportTarget::User, spammer.id, "  x ")).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            svc.file(&reporter, about(ReportTarget::Job, 42, "Scam job")).await,
            Err(ServiceError::NotFound(_))
        ));

        let report = svc
            .file(&reporter, about(ReportTarget::User, spammer.id, "Spam messages"))
            .await
            .unwrap();
        assert_eq!(report.status, ReportStatus::Open);
        assert!(matches!(
            svc.file(&reporter, about(ReportTarget::User, spammer.id, "Again")).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_only_participants_report_messages() {
        let pool = setup_pool().await;
        let a = seed_user(&pool, "a@example.com", UserRole::Youth).await;
        let b = seed_user(&pool, "b@example.com", UserRole::Company).await;
        let c = seed_user(&pool, "c@example.com", UserRole::Youth).await;
        let msg = SqlxMessageRepository::new(pool.clone())
            .create(b.id, a.id, "buy now")
            .await
            .unwrap();
        let svc = service(&pool);

        assert!(matches!(
            svc.file(&c, about(ReportTarget::Message, msg.id, "Spam")).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(svc.file(&a, about(ReportTarget::Message, msg.id, "Spam")).await.is_ok());
    }

    #[tokio::test]
    async fn test_moderation_flow() {
        let pool = setup_pool().await;
        let admin = seed_user(&pool, "admin@example.com", UserRole::Admin).await;
        let reporter = seed_user(&pool, "r@example.com", UserRole::Youth).await;
        let svc = service(&pool);
        let report = svc
            .file(&reporter, about(ReportTarget::User, admin.id, "Rude"))
            .await
            .unwrap();

        let r = svc.transition(&admin, report.id, ReportStatus::Reviewing, None).await.unwrap();
        assert_eq!(r.status, ReportStatus::Reviewing);
        let r = svc
            .transition(&admin, report.id, ReportStatus::Dismissed, Some("No evidence"))
            .await
            .unwrap();
        assert_eq!(r.resolved_by, Some(admin.id));
        assert_eq!(r.resolution_note.as_deref(), Some("No evidence"));

        assert!(matches!(
            svc.transition(&admin, report.id, ReportStatus::Resolved, None).await,
            Err(ServiceError::Validation(_))
        ));
        // a closed report no longer blocks a new one
        assert!(svc.file(&reporter, about(ReportTarget::User, admin.id, "Rude again")).await.is_ok());

        let open = ReportFilter {
            status: Some(ReportStatus::Open),
            ..Default::default()
        };
        assert_eq!(svc.list(&open, &ListParams::default()).await.unwrap().total, 1);
    }
}
