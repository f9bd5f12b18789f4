//! Youth startup showcase
//!
//! Startups start out pending and become public once an admin approves
//! them. Editing a rejected startup sends it back for review.

use crate::db::repositories::StartupRepository;
use crate::models::{
    ListParams, PagedResult, Startup, StartupFilter, StartupInput, StartupStatus, User, UserRole,
};
use crate::services::error::{conflict_on_unique, ServiceError, ServiceResult};
use crate::services::slug::unique_slug;
use crate::services::terms::normalize_terms;
use std::sync::Arc;

const MAX_PITCH_LEN: usize = 5000;

pub struct StartupService {
    startup_repo: Arc<dyn StartupRepository>,
}

impl StartupService {
    pub fn new(startup_repo: Arc<dyn StartupRepository>) -> Self {
        Self { startup_repo }
    }

    pub async fn create(&self, founder: &User, input: StartupInput) -> ServiceResult<Startup> {
        if founder.role != UserRole::Youth {
            return Err(ServiceError::forbidden("Only youth accounts can register startups"));
        }
        let input = validate(input)?;
        let repo = self.startup_repo.clone();
        let slug = unique_slug(&input.name, "startup", |s| {
            let repo = repo.clone();
            async move { repo.slug_exists(&s).await }
        })
        .await?;

        let startup = self
            .startup_repo
            .create(founder.id, &slug, &input)
            .await
            .map_err(|e| conflict_on_unique(e, "A startup with this slug already exists"))?;
        tracing::info!(startup_id = startup.id, founder_id = founder.id, "Startup submitted");
        Ok(startup)
    }

    pub async fn update(&self, founder: &User, id: i64, input: StartupInput) -> ServiceResult<Startup> {
        let startup = self.get_by_id(id).await?;
        if startup.founder_id != founder.id {
            return Err(ServiceError::forbidden("Not your startup"));
        }
        let input = validate(input)?;
        Ok(self.startup_repo.update(id, &input).await?)
    }

    /// Listing for `viewer`: admins see every startup, everyone else the approved ones
    pub async fn list(
        &self,
        viewer: Option<&User>,
        filter: StartupFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Startup>> {
        let filter = StartupFilter {
            status: if viewer.is_some_and(User::is_admin) {
                filter.status
            } else {
                Some(StartupStatus::Approved)
            },
            founder_id: None,
            ..filter
        };
        let (items, total) = self.startup_repo.list(&filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn list_mine(&self, founder: &User, params: &ListParams) -> ServiceResult<PagedResult<Startup>> {
        let filter = StartupFilter {
            founder_id: Some(founder.id),
            ..Default::default()
        };
        let (items, total) = self.startup_repo.list(&filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Startup> {
        self.startup_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Startup"))
    }

    /// Detail view. Counts a view when the startup is public.
    pub async fn view(&self, viewer: Option<&User>, slug: &str) -> ServiceResult<Startup> {
        let mut startup = self
            .startup_repo
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| ServiceError::not_found("Startup"))?;

        if startup.status == StartupStatus::Approved {
            self.startup_repo.increment_view(startup.id).await?;
            startup.view_count += 1;
            return Ok(startup);
        }
        match viewer {
            Some(user) if user.is_admin() || user.id == startup.founder_id => Ok(startup),
            _ => Err(ServiceError::not_found("Startup")),
        }
    }

    /// Back an approved startup. Supporting twice is a no-op.
    pub async fn support(&self, user: &User, id: i64) -> ServiceResult<Startup> {
        let startup = self.get_by_id(id).await?;
        if startup.status != StartupStatus::Approved {
            return Err(ServiceError::not_found("Startup"));
        }
        if startup.founder_id == user.id {
            return Err(ServiceError::validation("You cannot support your own startup"));
        }
        if self.startup_repo.support(id, user.id).await? {
            tracing::debug!(startup_id = id, user_id = user.id, "Startup supported");
        }
        self.get_by_id(id).await
    }

    pub async fn unsupport(&self, user: &User, id: i64) -> ServiceResult<Startup> {
        self.get_by_id(id).await?;
        self.startup_repo.unsupport(id, user.id).await?;
        self.get_by_id(id).await
    }

    /// Admin decision on a pending startup
    pub async fn review(&self, id: i64, approve: bool, note: Option<&str>) -> ServiceResult<Startup> {
        let startup = self.get_by_id(id).await?;
        if startup.status != StartupStatus::Pending {
            return Err(ServiceError::validation(format!(
                "Startup is already {}",
                startup.status
            )));
        }
        let status = if approve {
            StartupStatus::Approved
        } else {
            StartupStatus::Rejected
        };
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        let reviewed = self
            .startup_repo
            .set_review(id, StartupStatus::Pending, status, note)
            .await?
            .ok_or_else(|| ServiceError::conflict("Startup was reviewed by someone else"))?;
        tracing::info!(startup_id = id, %status, "Startup reviewed");
        Ok(reviewed)
    }
}

fn validate(input: StartupInput) -> ServiceResult<StartupInput> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::validation("Startup name is required"));
    }
    if name.chars().count() > 150 {
        return Err(ServiceError::validation("Startup name is too long"));
    }
    if input.pitch.chars().count() > MAX_PITCH_LEN {
        return Err(ServiceError::validation("Pitch is too long"));
    }
    if input.funding_goal.is_some_and(|g| g < 0) {
        return Err(ServiceError::validation("Funding goal cannot be negative"));
    }
    Ok(StartupInput {
        name,
        pitch: input.pitch.trim().to_string(),
        sector: input.sector.trim().to_string(),
        tags: normalize_terms(&input.tags),
        ..input
    })
}
