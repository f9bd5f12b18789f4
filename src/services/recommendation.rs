//! Personalized recommendations
//!
//! Candidates are ranked by a weighted sum of three components:
//!
//! ```text
//! score = tag_weight * overlap + popularity_weight * popularity + recency_weight * recency
//! ```
//!
//! `overlap` counts profile terms shared with the item (case-insensitive),
//! `popularity` is the item's count relative to the most popular candidate,
//! and `recency` halves every `half_life_days`.

use crate::cache::SharedCache;
use crate::config::RecommendationConfig;
use crate::db::repositories::{CourseRepository, JobRepository, ProfileRepository, StartupRepository};
use crate::models::{Course, Job, Profile, Startup, User};
use crate::services::error::ServiceResult;
use crate::services::terms::term_set;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

pub const MAX_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Courses,
    Startups,
    Jobs,
}

impl RecommendationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Courses => "courses",
            Self::Startups => "startups",
            Self::Jobs => "jobs",
        }
    }
}

/// The parts a score was built from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub overlap: usize,
    pub popularity: f64,
    pub recency: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation<T> {
    pub item: T,
    pub score: f64,
    pub components: ScoreComponents,
}

/// An item to rank, with what the scorer needs to know about it
pub struct Candidate<T> {
    pub id: i64,
    pub item: T,
    pub terms: HashSet<String>,
    pub count: i64,
    pub created_at: DateTime<Utc>,
}

/// Pure scoring, configured by weights
#[derive(Debug, Clone)]
pub struct Scorer {
    weights: RecommendationConfig,
}

impl Scorer {
    pub fn new(weights: RecommendationConfig) -> Self {
        Self { weights }
    }

    pub fn components(
        &self,
        profile_terms: &HashSet<String>,
        item_terms: &HashSet<String>,
        count: i64,
        max_count: i64,
        age_days: f64,
    ) -> ScoreComponents {
        let popularity = if max_count > 0 {
            (count.max(0) as f64 / max_count as f64).min(1.0)
        } else {
            0.0
        };
        let half_life = if self.weights.half_life_days > 0.0 {
            self.weights.half_life_days
        } else {
            1.0
        };
        ScoreComponents {
            overlap: profile_terms.intersection(item_terms).count(),
            popularity,
            recency: 0.5_f64.powf(age_days.max(0.0) / half_life),
        }
    }

    pub fn score(&self, c: &ScoreComponents) -> f64 {
        self.weights.tag_weight * c.overlap as f64
            + self.weights.popularity_weight * c.popularity
            + self.weights.recency_weight * c.recency
    }

    /// Score every candidate and keep the best `limit`.
    ///
    /// Ties on score go to the newer item, then to the lower id.
    pub fn rank<T>(
        &self,
        profile_terms: &HashSet<String>,
        candidates: Vec<Candidate<T>>,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Vec<Recommendation<T>> {
        let max_count = candidates.iter().map(|c| c.count).max().unwrap_or(0);

        let mut scored: Vec<(Recommendation<T>, DateTime<Utc>, i64)> = candidates
            .into_iter()
            .map(|c| {
                let age_days = (now - c.created_at).num_seconds() as f64 / 86_400.0;
                let components = self.components(profile_terms, &c.terms, c.count, max_count, age_days);
                let rec = Recommendation {
                    score: self.score(&components),
                    components,
                    item: c.item,
                };
                (rec, c.created_at, c.id)
            })
            .collect();

        scored.sort_by(|(a, a_at, a_id), (b, b_at, b_id)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b_at.cmp(a_at))
                .then_with(|| a_id.cmp(b_id))
        });
        scored.truncate(limit);
        scored.into_iter().map(|(rec, _, _)| rec).collect()
    }
}

pub struct RecommendationService {
    profile_repo: Arc<dyn ProfileRepository>,
    course_repo: Arc<dyn CourseRepository>,
    job_repo: Arc<dyn JobRepository>,
    startup_repo: Arc<dyn StartupRepository>,
    cache: SharedCache,
    scorer: Scorer,
    default_limit: usize,
}

impl RecommendationService {
    pub fn new(
        profile_repo: Arc<dyn ProfileRepository>,
        course_repo: Arc<dyn CourseRepository>,
        job_repo: Arc<dyn JobRepository>,
        startup_repo: Arc<dyn StartupRepository>,
        cache: SharedCache,
        config: RecommendationConfig,
    ) -> Self {
        let default_limit = config.default_limit.clamp(1, MAX_LIMIT);
        Self {
            profile_repo,
            course_repo,
            job_repo,
            startup_repo,
            cache,
            scorer: Scorer::new(config),
            default_limit,
        }
    }

    fn limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).clamp(1, MAX_LIMIT)
    }

    pub async fn courses(&self, user: &User, limit: Option<usize>) -> ServiceResult<Vec<Recommendation<Course>>> {
        let limit = self.limit(limit);
        let key = cache_key(user.id, RecommendationKind::Courses);
        if let Some(hit) = self.cached::<Course>(&key, limit).await {
            return Ok(hit);
        }

        let profile = self.profile_repo.get(user.id).await?;
        let terms = profile.as_ref().map(Profile::all_terms).unwrap_or_default();
        let candidates = self
            .course_repo
            .recommendation_candidates(user.id)
            .await?
            .into_iter()
            .map(|c| Candidate {
                id: c.course.id,
                terms: term_set(c.course.tags.iter().chain(std::iter::once(&c.course.category))),
                count: c.count,
                created_at: c.course.created_at,
                item: c.course,
            })
            .collect();

        let ranked = self.scorer.rank(&term_set(&terms), candidates, Utc::now(), MAX_LIMIT);
        Ok(self.store(&key, ranked, limit).await)
    }

    pub async fn startups(&self, user: &User, limit: Option<usize>) -> ServiceResult<Vec<Recommendation<Startup>>> {
        let limit = self.limit(limit);
        let key = cache_key(user.id, RecommendationKind::Startups);
        if let Some(hit) = self.cached::<Startup>(&key, limit).await {
            return Ok(hit);
        }

        let profile = self.profile_repo.get(user.id).await?;
        let terms = profile.as_ref().map(Profile::all_terms).unwrap_or_default();
        let candidates = self
            .startup_repo
            .recommendation_candidates(user.id)
            .await?
            .into_iter()
            .map(|s| Candidate {
                id: s.id,
                terms: term_set(s.tags.iter().chain(std::iter::once(&s.sector))),
                count: s.supporters,
                created_at: s.created_at,
                item: s,
            })
            .collect();

        let ranked = self.scorer.rank(&term_set(&terms), candidates, Utc::now(), MAX_LIMIT);
        Ok(self.store(&key, ranked, limit).await)
    }

    pub async fn jobs(&self, user: &User, limit: Option<usize>) -> ServiceResult<Vec<Recommendation<Job>>> {
        let limit = self.limit(limit);
        let key = cache_key(user.id, RecommendationKind::Jobs);
        if let Some(hit) = self.cached::<Job>(&key, limit).await {
            return Ok(hit);
        }

        let profile = self.profile_repo.get(user.id).await?;
        let skills = profile.map(|p| p.skills).unwrap_or_default();
        let now = Utc::now();
        let candidates = self
            .job_repo
            .recommendation_candidates(user.id, now)
            .await?
            .into_iter()
            .map(|c| Candidate {
                id: c.job.id,
                terms: term_set(&c.job.skills),
                count: c.count,
                created_at: c.job.created_at,
                item: c.job,
            })
            .collect();

        let ranked = self.scorer.rank(&term_set(&skills), candidates, now, MAX_LIMIT);
        Ok(self.store(&key, ranked, limit).await)
    }

    /// Drop cached results for a user, e.g. after a profile change
    pub fn invalidate(&self, user_id: i64) {
        if let Err(e) = self.cache.delete_prefix(&format!("recommendations:{}:", user_id)) {
            tracing::warn!(user_id, "Failed to invalidate recommendations: {:#}", e);
        }
    }

    async fn cached<T: DeserializeOwned>(&self, key: &str, limit: usize) -> Option<Vec<Recommendation<T>>> {
        match self.cache.get::<Vec<Recommendation<T>>>(key).await {
            Ok(Some(mut hit)) => {
                hit.truncate(limit);
                Some(hit)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(%key, "Ignoring unreadable cache entry: {:#}", e);
                None
            }
        }
    }

    /// Cache the full ranking and return the first `limit` entries
    async fn store<T: Serialize>(
        &self,
        key: &str,
        mut ranked: Vec<Recommendation<T>>,
        limit: usize,
    ) -> Vec<Recommendation<T>> {
        if let Err(e) = self.cache.set(key, &ranked, self.cache.default_ttl()).await {
            tracing::warn!(%key, "Failed to cache recommendations: {:#}", e);
        }
        ranked.truncate(limit);
        ranked
    }
}

fn cache_key(user_id: i64, kind: RecommendationKind) -> String {
    format!("recommendations:{}:{}", user_id, kind.as_str())
}
