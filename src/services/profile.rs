//! Youth profile service

use crate::db::repositories::{AssetRepository, ProfileRepository};
use crate::models::{AssetPurpose, Profile, ProfileInput, User, UserRole};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::terms::normalize_terms;
use std::sync::Arc;

pub struct ProfileService {
    profile_repo: Arc<dyn ProfileRepository>,
    asset_repo: Arc<dyn AssetRepository>,
}

impl ProfileService {
    pub fn new(profile_repo: Arc<dyn ProfileRepository>, asset_repo: Arc<dyn AssetRepository>) -> Self {
        Self {
            profile_repo,
            asset_repo,
        }
    }

    /// `None` when the user never saved a profile
    pub async fn get(&self, user_id: i64) -> ServiceResult<Option<Profile>> {
        Ok(self.profile_repo.get(user_id).await?)
    }

    pub async fn get_public(&self, user_id: i64) -> ServiceResult<Profile> {
        self.get(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Profile"))
    }

    pub async fn upsert(&self, user: &User, input: ProfileInput) -> ServiceResult<Profile> {
        if user.role != UserRole::Youth {
            return Err(ServiceError::forbidden("Only youth accounts have profiles"));
        }

        let full_name = input.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err(ServiceError::validation("Full name is required"));
        }
        if full_name.chars().count() > 100 {
            return Err(ServiceError::validation("Full name is too long"));
        }
        if input.headline.chars().count() > 200 {
            return Err(ServiceError::validation("Headline is too long"));
        }

        self.check_asset(user.id, input.avatar_asset_id, AssetPurpose::Avatar).await?;
        self.check_asset(user.id, input.resume_asset_id, AssetPurpose::Resume).await?;

        let input = ProfileInput {
            full_name,
            headline: input.headline.trim().to_string(),
            bio: input.bio.trim().to_string(),
            location: input.location.trim().to_string(),
            education_level: input.education_level.trim().to_string(),
            skills: normalize_terms(&input.skills),
            interests: normalize_terms(&input.interests),
            ..input
        };
        Ok(self.profile_repo.upsert(user.id, &input).await?)
    }

    async fn check_asset(
        &self,
        owner_id: i64,
        asset_id: Option<i64>,
        purpose: AssetPurpose,
    ) -> ServiceResult<()> {
        let Some(id) = asset_id else {
            return Ok(());
        };
        match self.asset_repo.get_by_id(id).await? {
            Some(asset) if asset.owner_id == owner_id && asset.purpose == purpose => Ok(()),
            Some(asset) if asset.owner_id == owner_id => Err(ServiceError::validation(format!(
                "Asset {} is not a {} upload",
                id, purpose
            ))),
            _ => Err(ServiceError::validation(format!("Unknown asset {}", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_user, setup_pool};
    use crate::db::repositories::{SqlxAssetRepository, SqlxProfileRepository};

    #[tokio::test]
    async fn test_upsert_normalizes_terms() {
        let pool = setup_pool().await;
        let youth = seed_user(&pool, "y@example.com", UserRole::Youth).await;
        let service = ProfileService::new(
            SqlxProfileRepository::boxed(pool.clone()),
            SqlxAssetRepository::boxed(pool),
        );

        assert!(service.get(youth.id).await.unwrap().is_none());
        let profile = service
            .upsert(&youth, ProfileInput {
                full_name: "  Amina Odhiambo ".into(),
                skills: vec!["Rust".into(), " rust".into(), "".into(), "SQL".into()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(profile.full_name, "Amina Odhiambo");
        assert_eq!(profile.skills, vec!["Rust", "SQL"]);
        assert_eq!(service.get_public(youth.id).await.unwrap().user_id, youth.id);
    }

    #[tokio::test]
    async fn test_only_youth_and_own_assets() {
        let pool = setup_pool().await;
        let company = seed_user(&pool, "c@example.com", UserRole::Company).await;
        let youth = seed_user(&pool, "y@example.com", UserRole::Youth).await;
        let assets = SqlxAssetRepository::new(pool.clone());
        let foreign = assets
            .create(company.id, "avatar/1/a.png", AssetPurpose::Avatar, "image/png", 10, "a.png")
            .await
            .unwrap();
        let service = ProfileService::new(
            SqlxProfileRepository::boxed(pool.clone()),
            SqlxAssetRepository::boxed(pool),
        );

        let input = ProfileInput {
            full_name: "Someone".into(),
            ..Default::default()
        };
        assert!(matches!(
            service.upsert(&company, input.clone()).await,
            Err(ServiceError::Forbidden(_))
        ));

        let with_foreign = ProfileInput {
            avatar_asset_id: Some(foreign.id),
            ..input.clone()
        };
        assert!(matches!(
            service.upsert(&youth, with_foreign).await,
            Err(ServiceError::Validation(_))
        ));

        assert!(matches!(
            service.upsert(&youth, ProfileInput::default()).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.get_public(company.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
