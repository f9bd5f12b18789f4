//! Organization service (companies and institutions)

use crate::db::repositories::{AssetRepository, OrganizationRepository};
use crate::models::{
    AssetPurpose, ListParams, Organization, OrganizationInput, OrganizationKind, PagedResult, User,
};
use crate::services::error::{conflict_on_unique, ServiceError, ServiceResult};
use crate::services::slug::unique_slug;
use std::sync::Arc;

pub struct OrganizationService {
    org_repo: Arc<dyn OrganizationRepository>,
    asset_repo: Arc<dyn AssetRepository>,
}

impl OrganizationService {
    pub fn new(org_repo: Arc<dyn OrganizationRepository>, asset_repo: Arc<dyn AssetRepository>) -> Self {
        Self {
            org_repo,
            asset_repo,
        }
    }

    /// Create the caller's organization. Its kind follows the caller's role.
    pub async fn create(&self, owner: &User, input: OrganizationInput) -> ServiceResult<Organization> {
        let kind = OrganizationKind::for_role(owner.role).ok_or_else(|| {
            ServiceError::forbidden("Only company and institution accounts own organizations")
        })?;
        if self.org_repo.get_by_owner(owner.id).await?.is_some() {
            return Err(ServiceError::conflict("You already have an organization"));
        }

        let input = self.validate(owner.id, input).await?;
        let repo = self.org_repo.clone();
        let slug = unique_slug(&input.name, "organization", |s| {
            let repo = repo.clone();
            async move { repo.slug_exists(&s).await }
        })
        .await?;

        let org = self
            .org_repo
            .create(owner.id, kind, &slug, &input)
            .await
            .map_err(|e| conflict_on_unique(e, "Organization already exists"))?;
        tracing::info!(org_id = org.id, owner_id = owner.id, %kind, "Organization created");
        Ok(org)
    }

    pub async fn update(&self, owner: &User, id: i64, input: OrganizationInput) -> ServiceResult<Organization> {
        let org = self.get_by_id(id).await?;
        if org.owner_id != owner.id && !owner.is_admin() {
            return Err(ServiceError::forbidden("Not your organization"));
        }
        let input = self.validate(org.owner_id, input).await?;
        Ok(self.org_repo.update(id, &input).await?)
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Organization> {
        self.org_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Organization"))
    }

    pub async fn get_by_slug(&self, slug: &str) -> ServiceResult<Organization> {
        self.org_repo
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| ServiceError::not_found("Organization"))
    }

    /// The caller's organization, if it exists
    pub async fn find_mine(&self, owner: &User) -> ServiceResult<Option<Organization>> {
        Ok(self.org_repo.get_by_owner(owner.id).await?)
    }

    /// The caller's organization of the given kind, or an error explaining why not
    pub async fn require_mine(&self, owner: &User, kind: OrganizationKind) -> ServiceResult<Organization> {
        if OrganizationKind::for_role(owner.role) != Some(kind) {
            return Err(ServiceError::forbidden(format!(
                "Only {} accounts can do this",
                kind
            )));
        }
        self.find_mine(owner)
            .await?
            .ok_or_else(|| ServiceError::validation("Create your organization first"))
    }

    pub async fn list(
        &self,
        kind: Option<OrganizationKind>,
        verified_only: bool,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Organization>> {
        let (items, total) = self.org_repo.list(kind, verified_only, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn set_verified(&self, id: i64, verified: bool) -> ServiceResult<Organization> {
        self.get_by_id(id).await?;
        self.org_repo.set_verified(id, verified).await?;
        tracing::info!(org_id = id, verified, "Organization verification changed");
        self.get_by_id(id).await
    }

    async fn validate(&self, owner_id: i64, input: OrganizationInput) -> ServiceResult<OrganizationInput> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::validation("Organization name is required"));
        }
        if name.chars().count() > 150 {
            return Err(ServiceError::validation("Organization name is too long"));
        }
        let website = input.website.trim().to_string();
        if !website.is_empty() && !(website.starts_with("http://") || website.starts_with("https://")) {
            return Err(ServiceError::validation("Website must start with http:// or https://"));
        }
        if let Some(asset_id) = input.logo_asset_id {
            match self.asset_repo.get_by_id(asset_id).await? {
                Some(a) if a.owner_id == owner_id && a.purpose == AssetPurpose::Logo => {}
                _ => return Err(ServiceError::validation(format!("Unknown logo asset {}", asset_id))),
            }
        }
        Ok(OrganizationInput {
            name,
            website,
            description: input.description.trim().to_string(),
            industry: input.industry.trim().to_string(),
            location: input.location.trim().to_string(),
            logo_asset_id: input.logo_asset_id,
        })
    }
}
