//! Course service
//!
//! Institutions manage the courses of their own organization; everyone
//! else sees published courses only.

use crate::db::repositories::{CourseRepository, EnrollmentRepository, OrganizationRepository};
use crate::models::{
    Course, CourseFilter, CourseInput, CourseStatus, ListParams, OrganizationKind, PagedResult, User,
};
use crate::services::error::{conflict_on_unique, ServiceError, ServiceResult};
use crate::services::slug::unique_slug;
use crate::services::terms::normalize_terms;
use std::sync::Arc;

const MAX_DURATION_WEEKS: i64 = 520;

pub struct CourseService {
    course_repo: Arc<dyn CourseRepository>,
    enrollment_repo: Arc<dyn EnrollmentRepository>,
    org_repo: Arc<dyn OrganizationRepository>,
}

impl CourseService {
    pub fn new(
        course_repo: Arc<dyn CourseRepository>,
        enrollment_repo: Arc<dyn EnrollmentRepository>,
        org_repo: Arc<dyn OrganizationRepository>,
    ) -> Self {
        Self {
            course_repo,
            enrollment_repo,
            org_repo,
        }
    }

    pub async fn create(&self, user: &User, input: CourseInput) -> ServiceResult<Course> {
        let org = self
            .org_repo
            .get_by_owner(user.id)
            .await?
            .filter(|o| o.kind == OrganizationKind::Institution)
            .ok_or_else(|| ServiceError::forbidden("Only institutions with an organization can create courses"))?;

        let input = validate(input)?;
        let repo = self.course_repo.clone();
        let slug = unique_slug(&input.title, "course", |s| {
            let repo = repo.clone();
            async move { repo.slug_exists(&s).await }
        })
        .await?;

        let course = self
            .course_repo
            .create(org.id, &slug, &input)
            .await
            .map_err(|e| conflict_on_unique(e, "A course with this slug already exists"))?;
        tracing::info!(course_id = course.id, org_id = org.id, "Course created");
        Ok(course)
    }

    pub async fn update(&self, user: &User, id: i64, input: CourseInput) -> ServiceResult<Course> {
        let course = self.get_owned(user, id).await?;
        let input = validate(input)?;
        Ok(self.course_repo.update(course.id, &input).await?)
    }

    pub async fn set_status(&self, user: &User, id: i64, status: CourseStatus) -> ServiceResult<Course> {
        let course = self.get_owned(user, id).await?;
        if course.status == status {
            return Ok(course);
        }
        if status == CourseStatus::Draft && self.enrollment_repo.count_for_course(id).await? > 0 {
            return Err(ServiceError::conflict(
                "A course with enrollments cannot go back to draft",
            ));
        }
        self.course_repo.set_status(id, status).await?;
        tracing::info!(course_id = id, from = %course.status, to = %status, "Course status changed");
        self.get_by_id(id).await
    }

    pub async fn delete(&self, user: &User, id: i64) -> ServiceResult<()> {
        self.get_owned(user, id).await?;
        if self.enrollment_repo.count_for_course(id).await? > 0 {
            return Err(ServiceError::conflict(
                "Course has enrollments; archive it instead",
            ));
        }
        self.course_repo.delete(id).await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Course> {
        self.course_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Course"))
    }

    /// Detail view. Unpublished courses are visible to their owner and admins only.
    pub async fn get_by_slug(&self, viewer: Option<&User>, slug: &str) -> ServiceResult<Course> {
        let course = self
            .course_repo
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| ServiceError::not_found("Course"))?;
        if course.status == CourseStatus::Published {
            return Ok(course);
        }
        match viewer {
            Some(user) if self.can_manage(user, &course).await? => Ok(course),
            _ => Err(ServiceError::not_found("Course")),
        }
    }

    pub async fn list_published(
        &self,
        filter: &CourseFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<Course>> {
        let (items, total) = self.course_repo.list_published(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Every course of the caller's institution
    pub async fn list_mine(&self, user: &User) -> ServiceResult<Vec<Course>> {
        match self.org_repo.get_by_owner(user.id).await? {
            Some(org) if org.kind == OrganizationKind::Institution => {
                Ok(self.course_repo.list_by_organization(org.id).await?)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// The course, if `user` may manage it
    pub async fn get_owned(&self, user: &User, id: i64) -> ServiceResult<Course> {
        let course = self.get_by_id(id).await?;
        if !self.can_manage(user, &course).await? {
            return Err(ServiceError::forbidden("Not your course"));
        }
        Ok(course)
    }

    async fn can_manage(&self, user: &User, course: &Course) -> ServiceResult<bool> {
        if user.is_admin() {
            return Ok(true);
        }
        Ok(self
            .org_repo
            .get_by_id(course.organization_id)
            .await?
            .is_some_and(|org| org.owner_id == user.id))
    }
}

fn validate(input: CourseInput) -> ServiceResult<CourseInput> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(ServiceError::validation("Course title is required"));
    }
    if title.chars().count() > 200 {
        return Err(ServiceError::validation("Course title is too long"));
    }
    if !(0..=MAX_DURATION_WEEKS).contains(&input.duration_weeks) {
        return Err(ServiceError::validation(format!(
            "Duration must be between 0 and {} weeks",
            MAX_DURATION_WEEKS
        )));
    }
    if matches!(input.capacity, Some(c) if c < 1) {
        return Err(ServiceError::validation("Capacity must be at least 1"));
    }
    Ok(CourseInput {
        title,
        description: input.description.trim().to_string(),
        category: input.category.trim().to_string(),
        tags: normalize_terms(&input.tags),
        ..input
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{course_input, seed_org, seed_user, setup_pool};
    use crate::db::repositories::{
        SqlxCourseRepository, SqlxEnrollmentRepository, SqlxOrganizationRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::UserRole;

    fn service(pool: &DynDatabasePool) -> CourseService {
        CourseService::new(
            SqlxCourseRepository::boxed(pool.clone()),
            SqlxEnrollmentRepository::boxed(pool.clone()),
            SqlxOrganizationRepository::boxed(pool.clone()),
        )
    }

    #[tokio::test]
    async fn test_institution_manages_course() {
        let pool = setup_pool().await;
        let inst = seed_user(&pool, "i@example.com", UserRole::Institution).await;
        seed_org(&pool, inst.id, OrganizationKind::Institution, "academy").await;
        let svc = service(&pool);

        let mut input = course_input("Intro to Rust", "Programming", &["Rust", "rust", "systems"]);
        let course = svc.create(&inst, input.clone()).await.unwrap();
        assert_eq!(course.slug, "intro-to-rust");
        assert_eq!(course.tags, vec!["Rust", "systems"]);
        assert_eq!(course.status, CourseStatus::Draft);

        let published = svc.set_status(&inst, course.id, CourseStatus::Published).await.unwrap();
        assert_eq!(published.status, CourseStatus::Published);

        input.capacity = Some(0);
        assert!(matches!(
            svc.update(&inst, course.id, input.clone()).await,
            Err(ServiceError::Validation(_))
        ));
        input.capacity = Some(25);
        let updated = svc.update(&inst, course.id, input).await.unwrap();
        assert_eq!(updated.capacity, Some(25));

        assert_eq!(svc.list_mine(&inst).await.unwrap().len(), 1);
        svc.delete(&inst, course.id).await.unwrap();
        assert!(matches!(svc.get_by_id(course.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_others_cannot_manage_or_see_drafts() {
        let pool = setup_pool().await;
        let inst = seed_user(&pool, "i@example.com", UserRole::Institution).await;
        let rival = seed_user(&pool, "r@example.com", UserRole::Institution).await;
        let company = seed_user(&pool, "c@example.com", UserRole::Company).await;
        seed_org(&pool, inst.id, OrganizationKind::Institution, "academy").await;
        seed_org(&pool, company.id, OrganizationKind::Company, "acme").await;
        let svc = service(&pool);

        let course = svc
            .create(&inst, course_input("Design", "Art", &[]))
            .await
            .unwrap();

        assert!(matches!(
            svc.create(&company, course_input("X", "", &[])).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            svc.set_status(&rival, course.id, CourseStatus::Published).await,
            Err(ServiceError::Forbidden(_))
        ));

        assert!(matches!(svc.get_by_slug(None, "design").await, Err(ServiceError::NotFound(_))));
        assert!(matches!(
            svc.get_by_slug(Some(&rival), "design").await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(svc.get_by_slug(Some(&inst), "design").await.unwrap().id, course.id);

        let page = svc
            .list_published(&CourseFilter::default(), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }
}
