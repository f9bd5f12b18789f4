//! Job posting service

use crate::db::repositories::{ApplicationRepository, JobRepository, OrganizationRepository};
use crate::models::{
    Job, JobFilter, JobInput, JobStatus, ListParams, OrganizationKind, PagedResult, User,
};
use crate::services::error::{conflict_on_unique, ServiceError, ServiceResult};
use crate::services::slug::unique_slug;
use crate::services::terms::normalize_terms;
use chrono::Utc;
use std::sync::Arc;

pub struct JobService {
    job_repo: Arc<dyn JobRepository>,
    application_repo: Arc<dyn ApplicationRepository>,
    org_repo: Arc<dyn OrganizationRepository>,
}

impl JobService {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        application_repo: Arc<dyn ApplicationRepository>,
        org_repo: Arc<dyn OrganizationRepository>,
    ) -> Self {
        Self {
            job_repo,
            application_repo,
            org_repo,
        }
    }

    pub async fn create(&self, user: &User, input: JobInput) -> ServiceResult<Job> {
        let org = self
            .org_repo
            .get_by_owner(user.id)
            .await?
            .filter(|o| o.kind == OrganizationKind::Company)
            .ok_or_else(|| ServiceError::forbidden("Only companies with an organization can post jobs"))?;

        let input = validate(input)?;
        let repo = self.job_repo.clone();
        let slug = unique_slug(&format!("{} {}", input.title, org.name), "job", |s| {
            let repo = repo.clone();
            async move { repo.slug_exists(&s).await }
        })
        .await?;

        let job = self
            .job_repo
            .create(org.id, &slug, &input)
            .await
            .map_err(|e| conflict_on_unique(e, "A job with this slug already exists"))?;
        tracing::info!(job_id = job.id, org_id = org.id, "Job created");
        Ok(job)
    }

    pub async fn update(&self, user: &User, id: i64, input: JobInput) -> ServiceResult<Job> {
        let job = self.get_owned(user, id).await?;
        let input = validate(input)?;
        Ok(self.job_repo.update(job.id, &input).await?)
    }

    pub async fn set_status(&self, user: &User, id: i64, status: JobStatus) -> ServiceResult<Job> {
        let job = self.get_owned(user, id).await?;
        if job.status == status {
            return Ok(job);
        }
        if status == JobStatus::Open && job.deadline.is_some_and(|d| d <= Utc::now()) {
            return Err(ServiceError::validation("Deadline has passed; update it before opening"));
        }
        if status == JobStatus::Draft && self.application_repo.count_for_job(id).await? > 0 {
            return Err(ServiceError::conflict(
                "A job with applications cannot go back to draft",
            ));
        }
        self.job_repo.set_status(id, status).await?;
        tracing::info!(job_id = id, from = %job.status, to = %status, "Job status changed");
        self.get_by_id(id).await
    }

    pub async fn delete(&self, user: &User, id: i64) -> ServiceResult<()> {
        self.get_owned(user, id).await?;
        if self.application_repo.count_for_job(id).await? > 0 {
            return Err(ServiceError::conflict("Job has applications; close it instead"));
        }
        self.job_repo.delete(id).await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Job> {
        self.job_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Job"))
    }

    /// Detail view. Drafts are visible to their owner and admins only.
    pub async fn get_by_slug(&self, viewer: Option<&User>, slug: &str) -> ServiceResult<Job> {
        let job = self
            .job_repo
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| ServiceError::not_found("Job"))?;
        if job.status != JobStatus::Draft {
            return Ok(job);
        }
        match viewer {
            Some(user) if self.can_manage(user, &job).await? => Ok(job),
            _ => Err(ServiceError::not_found("Job")),
        }
    }

    pub async fn list_open(&self, filter: &JobFilter, params: &ListParams) -> ServiceResult<PagedResult<Job>> {
        let (items, total) = self.job_repo.list_open(filter, params, Utc::now()).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn list_mine(&self, user: &User) -> ServiceResult<Vec<Job>> {
        match self.org_repo.get_by_owner(user.id).await? {
            Some(org) if org.kind == OrganizationKind::Company => {
                Ok(self.job_repo.list_by_organization(org.id).await?)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// The job, if `user` may manage it
    pub async fn get_owned(&self, user: &User, id: i64) -> ServiceResult<Job> {
        let job = self.get_by_id(id).await?;
        if !self.can_manage(user, &job).await? {
            return Err(ServiceError::forbidden("Not your job posting"));
        }
        Ok(job)
    }

    async fn can_manage(&self, user: &User, job: &Job) -> ServiceResult<bool> {
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

fn validate(input: JobInput) -> ServiceResult<JobInput> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(ServiceError::validation("Job title is required"));
    }
    if title.chars().count() > 200 {
        return Err(ServiceError::validation("Job title is too long"));
    }
    if input.salary_min.is_some_and(|v| v < 0) || input.salary_max.is_some_and(|v| v < 0) {
        return Err(ServiceError::validation("Salary cannot be negative"));
    }
    if let (Some(min), Some(max)) = (input.salary_min, input.salary_max) {
        if min > max {
            return Err(ServiceError::validation("salary_min cannot exceed salary_max"));
        }
    }
    Ok(JobInput {
        title,
        description: input.description.trim().to_string(),
        location: input.location.trim().to_string(),
        skills: normalize_terms(&input.skills),
        ..input
    })
}
