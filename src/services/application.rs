//! Job application service
//!
//! Youth apply to open jobs, the hiring company moves applications along
//! the pipeline, and the applicant may withdraw until a final status.

use crate::db::repositories::{
    ApplicationRepository, AssetRepository, JobRepository, OrganizationRepository, UserRepository,
};
use crate::models::{
    Application, ApplicationStatus, ApplicationWithJob, AssetPurpose, Job, User, UserRole,
};
use crate::services::error::{conflict_on_unique, ServiceError, ServiceResult};
use crate::services::notification::Notifier;
use chrono::Utc;
use std::sync::Arc;

const MAX_COVER_LETTER: usize = 5000;
const MAX_NOTE: usize = 1000;

pub struct ApplicationService {
    application_repo: Arc<dyn ApplicationRepository>,
    job_repo: Arc<dyn JobRepository>,
    org_repo: Arc<dyn OrganizationRepository>,
    user_repo: Arc<dyn UserRepository>,
    asset_repo: Arc<dyn AssetRepository>,
    notifier: Notifier,
}

impl ApplicationService {
    pub fn new(
        application_repo: Arc<dyn ApplicationRepository>,
        job_repo: Arc<dyn JobRepository>,
        org_repo: Arc<dyn OrganizationRepository>,
        user_repo: Arc<dyn UserRepository>,
        asset_repo: Arc<dyn AssetRepository>,
        notifier: Notifier,
    ) -> Self {
        Self {
            application_repo,
            job_repo,
            org_repo,
            user_repo,
            asset_repo,
            notifier,
        }
    }

    pub async fn apply(
        &self,
        user: &User,
        job_id: i64,
        cover_letter: &str,
        resume_asset_id: Option<i64>,
    ) -> ServiceResult<Application> {
        if user.role != UserRole::Youth {
            return Err(ServiceError::forbidden("Only youth accounts can apply"));
        }
        let job = self.job(job_id).await?;
        if !job.accepts_applications(Utc::now()) {
            return Err(ServiceError::validation("Job is not accepting applications"));
        }

        let cover_letter = cover_letter.trim();
        if cover_letter.chars().count() > MAX_COVER_LETTER {
            return Err(ServiceError::validation("Cover letter is too long"));
        }
        if let Some(asset_id) = resume_asset_id {
            match self.asset_repo.get_by_id(asset_id).await? {
                Some(a) if a.owner_id == user.id && a.purpose == AssetPurpose::Resume => {}
                _ => return Err(ServiceError::validation(format!("Unknown resume asset {}", asset_id))),
            }
        }
        if self.application_repo.get_for(job_id, user.id).await?.is_some() {
            return Err(ServiceError::conflict("You already applied to this job"));
        }

        let application = self
            .application_repo
            .create(job_id, user.id, cover_letter, resume_asset_id)
            .await
            .map_err(|e| conflict_on_unique(e, "You already applied to this job"))?;
        tracing::info!(application_id = application.id, job_id, applicant_id = user.id, "Application submitted");
        Ok(application)
    }

    /// Move an application along the hiring pipeline and tell the applicant
    pub async fn update_status(
        &self,
        user: &User,
        application_id: i64,
        status: ApplicationStatus,
        note: Option<&str>,
    ) -> ServiceResult<Application> {
        let application = self.get(application_id).await?;
        let job = self.job(application.job_id).await?;
        if !self.owns_job(user, &job).await? {
            return Err(ServiceError::forbidden("Not your job posting"));
        }
        if !application.status.company_can_move_to(status) {
            return Err(ServiceError::validation(format!(
                "Cannot move application from {} to {}",
                application.status, status
            )));
        }

        let note = note.map(str::trim).filter(|n| !n.is_empty());
        if note.is_some_and(|n| n.chars().count() > MAX_NOTE) {
            return Err(ServiceError::validation("Note is too long"));
        }

        let updated = self
            .application_repo
            .update_status(application.id, application.status, status, note)
            .await?
            .ok_or_else(changed_concurrently)?;
        tracing::info!(
            application_id,
            from = %application.status,
            to = %status,
            "Application status changed"
        );

        if let Some(applicant) = self.user_repo.get_by_id(application.applicant_id).await? {
            self.notifier.application_status_changed(
                &applicant.email,
                &applicant.display_name,
                &job.title,
                status,
                note,
            );
        }
        Ok(updated)
    }

    pub async fn withdraw(&self, user: &User, application_id: i64) -> ServiceResult<Application> {
        let application = self.get(application_id).await?;
        if application.applicant_id != user.id {
            return Err(ServiceError::forbidden("Not your application"));
        }
        if !application.status.can_withdraw() {
            return Err(ServiceError::validation(format!(
                "Application is already {}",
                application.status
            )));
        }
        self.application_repo
            .update_status(application.id, application.status, ApplicationStatus::Withdrawn, None)
            .await?
            .ok_or_else(changed_concurrently)
    }

    pub async fn list_mine(&self, user: &User) -> ServiceResult<Vec<ApplicationWithJob>> {
        Ok(self.application_repo.list_by_applicant(user.id).await?)
    }

    /// Applications for a job, for the company that posted it
    pub async fn list_for_job(
        &self,
        user: &User,
        job_id: i64,
        status: Option<ApplicationStatus>,
    ) -> ServiceResult<Vec<Application>> {
        let job = self.job(job_id).await?;
        if !self.owns_job(user, &job).await? {
            return Err(ServiceError::forbidden("Not your job posting"));
        }
        Ok(self.application_repo.list_by_job(job_id, status).await?)
    }

    async fn get(&self, id: i64) -> ServiceResult<Application> {
        self.application_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Application"))
    }

    async fn job(&self, id: i64) -> ServiceResult<Job> {
        self.job_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Job"))
    }

    async fn owns_job(&self, user: &User, job: &Job) -> ServiceResult<bool> {
        if user.is_admin() {
            return Ok(true);
        }
        Ok(self
            .org_repo
            .get_by_id(job.organization_id)
            .await?
            .is_some_and(|org| org.owner_id == user.id))
    }
}

fn changed_concurrently() -> ServiceError {
    ServiceError::conflict("Application status changed, reload and try again")
}
