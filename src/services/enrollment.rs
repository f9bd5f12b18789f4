//! Enrollment service

use crate::db::repositories::{CourseRepository, EnrollmentRepository, OrganizationRepository};
use crate::models::{
    CourseStatus, Enrollment, EnrollmentStatus, EnrollmentWithCourse, User, UserRole,
};
use crate::services::error::{conflict_on_unique, ServiceError, ServiceResult};
use chrono::Utc;
use std::sync::Arc;

pub struct EnrollmentService {
    enrollment_repo: Arc<dyn EnrollmentRepository>,
    course_repo: Arc<dyn CourseRepository>,
    org_repo: Arc<dyn OrganizationRepository>,
}

impl EnrollmentService {
    pub fn new(
        enrollment_repo: Arc<dyn EnrollmentRepository>,
        course_repo: Arc<dyn CourseRepository>,
        org_repo: Arc<dyn OrganizationRepository>,
    ) -> Self {
        Self {
            enrollment_repo,
            course_repo,
            org_repo,
        }
    }

    /// Enroll a youth user in a published course.
    ///
    /// A dropped enrollment is reactivated with its progress reset. Seats are
    /// claimed by the write itself, so concurrent enrollments cannot overfill
    /// a course.
    pub async fn enroll(&self, user: &User, course_id: i64) -> ServiceResult<Enrollment> {
        if user.role != UserRole::Youth {
            return Err(ServiceError::forbidden("Only youth accounts can enroll"));
        }
        let course = self
            .course_repo
            .get_by_id(course_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Course"))?;
        if course.status != CourseStatus::Published {
            return Err(ServiceError::validation("Course is not open for enrollment"));
        }

        let existing = self.enrollment_repo.get_for(course_id, user.id).await?;
        if let Some(e) = &existing {
            if e.status != EnrollmentStatus::Dropped {
                return Err(ServiceError::conflict("Already enrolled in this course"));
            }
        }

        let claimed = match &existing {
            Some(dropped) => self.enrollment_repo.reactivate(dropped.id, course_id).await?,
            None => self
                .enrollment_repo
                .create(course_id, user.id)
                .await
                .map_err(|e| conflict_on_unique(e, "Already enrolled in this course"))?,
        };
        let enrollment = match claimed {
            Some(enrollment) => enrollment,
            None => return Err(self.not_claimed(existing.as_ref()).await),
        };
        tracing::info!(course_id, user_id = user.id, "Enrolled");
        Ok(enrollment)
    }

    /// Set progress, clamped to 0..=100. Reaching 100 completes the enrollment.
    pub async fn update_progress(
        &self,
        user: &User,
        enrollment_id: i64,
        progress: i64,
    ) -> ServiceResult<Enrollment> {
        let enrollment = self.get_own(user, enrollment_id).await?;
        if enrollment.status != EnrollmentStatus::Active {
            return Err(ServiceError::validation(format!(
                "Enrollment is {}",
                enrollment.status
            )));
        }

        let progress = progress.clamp(0, 100);
        let (status, completed_at) = if progress == 100 {
            (EnrollmentStatus::Completed, Some(Utc::now()))
        } else {
            (EnrollmentStatus::Active, None)
        };
        self.enrollment_repo
            .update_progress(enrollment.id, progress, status, completed_at)
            .await?
            .ok_or_else(changed_concurrently)
    }

    pub async fn drop_enrollment(&self, user: &User, enrollment_id: i64) -> ServiceResult<Enrollment> {
        let enrollment = self.get_own(user, enrollment_id).await?;
        if enrollment.status != EnrollmentStatus::Active {
            return Err(ServiceError::validation("Only active enrollments can be dropped"));
        }
        let dropped = self
            .enrollment_repo
            .set_status(enrollment.id, EnrollmentStatus::Active, EnrollmentStatus::Dropped)
            .await?
            .ok_or_else(changed_concurrently)?;
        tracing::info!(enrollment_id, user_id = user.id, "Enrollment dropped");
        Ok(dropped)
    }

    pub async fn list_mine(&self, user: &User) -> ServiceResult<Vec<EnrollmentWithCourse>> {
        Ok(self.enrollment_repo.list_by_user(user.id).await?)
    }

    /// Enrollments of a course, for the institution that runs it
    pub async fn list_for_course(&self, user: &User, course_id: i64) -> ServiceResult<Vec<Enrollment>> {
        let course = self
            .course_repo
            .get_by_id(course_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Course"))?;
        let owns = self
            .org_repo
            .get_by_id(course.organization_id)
            .await?
            .is_some_and(|org| org.owner_id == user.id);
        if !owns && !user.is_admin() {
            return Err(ServiceError::forbidden("Not your course"));
        }
        Ok(self.enrollment_repo.list_by_course(course_id).await?)
    }

    /// Why a seat could not be claimed: someone re-enrolled first, or the course filled up
    async fn not_claimed(&self, existing: Option<&Enrollment>) -> ServiceError {
        if let Some(dropped) = existing {
            match self.enrollment_repo.get_by_id(dropped.id).await {
                Ok(Some(current)) if current.status != EnrollmentStatus::Dropped => {
                    return ServiceError::conflict("Already enrolled in this course");
                }
                Err(e) => return e.into(),
                _ => {}
            }
        }
        ServiceError::conflict("Course is full")
    }

    async fn get_own(&self, user: &User, enrollment_id: i64) -> ServiceResult<Enrollment> {
        match self.enrollment_repo.get_by_id(enrollment_id).await? {
            Some(e) if e.user_id == user.id => Ok(e),
            Some(_) => Err(ServiceError::forbidden("Not your enrollment")),
            None => Err(ServiceError::not_found("Enrollment")),
        }
    }
}

fn changed_concurrently() -> ServiceError {
    ServiceError::conflict("Enrollment changed, reload and try again")
}
