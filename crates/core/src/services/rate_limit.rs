//! Per-user action rate limiting.
//!
//! Fixed windows stored at `rateLimits/{userId}_{action}`. Each check reads and
//! writes the window inside one store transaction, so concurrent checks for the
//! same user and action never over-admit.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use wildwatch_common::{AppError, AppResult, RateLimitConfig, RateLimitRule};
use wildwatch_db::{DocumentStore, paths, records::RateLimitRecord, run_transaction, to_data};

/// A rate-limited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RateLimitedAction {
    Observation,
    BlogPost,
    Comment,
    Follow,
}

impl RateLimitedAction {
    /// Key used in the window document ID.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Observation => "observation",
            Self::BlogPost => "blogPost",
            Self::Comment => "comment",
            Self::Follow => "follow",
        }
    }

    /// Limit configured for this action.
    #[must_use]
    pub const fn rule(self, config: &RateLimitConfig) -> RateLimitRule {
        match self {
            Self::Observation => config.observation,
            Self::BlogPost => config.blog_post,
            Self::Comment => config.comment,
            Self::Follow => config.follow,
        }
    }
}

/// An admitted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    /// Actions still allowed in the current window.
    pub remaining: u32,
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
}

/// Rate limit service for business logic.
#[derive(Clone)]
pub struct RateLimitService {
    store: Arc<dyn DocumentStore>,
    config: RateLimitConfig,
}

impl RateLimitService {
    /// Create a new rate limit service.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Admit and count one action, or fail with [`AppError::RateLimited`].
    pub async fn check_and_record(
        &self,
        user_id: &str,
        action: RateLimitedAction,
    ) -> AppResult<RateLimitStatus> {
        self.check_and_record_at(user_id, action, Utc::now()).await
    }

    /// [`Self::check_and_record`] with an explicit clock.
    pub async fn check_and_record_at(
        &self,
        user_id: &str,
        action: RateLimitedAction,
        now: DateTime<Utc>,
    ) -> AppResult<RateLimitStatus> {
        let rule = action.rule(&self.config);
        let fresh_reset_at = i64::try_from(rule.window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|window| now.checked_add_signed(window))
            .ok_or_else(|| {
                AppError::Config(format!("rate limit window for {} out of range", action.as_str()))
            })?;
        let path = paths::rate_limit(user_id, action.as_str())?;

        let result = run_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let current = tx
                    .get(&path)
                    .await?
                    .decode::<RateLimitRecord>()?
                    .filter(|record| now < record.reset_at)
                    .unwrap_or(RateLimitRecord {
                        count: 0,
                        reset_at: fresh_reset_at,
                    });

                if current.count >= rule.max_requests {
                    return Err(AppError::RateLimited {
                        retry_after_secs: retry_after_secs(now, current.reset_at),
                    });
                }

                let next = RateLimitRecord {
                    count: current.count + 1,
                    reset_at: current.reset_at,
                };
                tx.set(&path, to_data(&next)?).await?;
                Ok(next)
            })
        })
        .await;

        match result {
            Ok(record) => Ok(RateLimitStatus {
                remaining: rule.max_requests.saturating_sub(record.count),
                limit: rule.max_requests,
                reset_at: record.reset_at,
            }),
            Err(e) => {
                if let AppError::RateLimited { retry_after_secs } = e {
                    tracing::debug!(user_id, action = action.as_str(), retry_after_secs, "Rate limited");
                }
                Err(e)
            }
        }
    }
}

/// Whole seconds until `reset_at`, rounded up.
fn retry_after_secs(now: DateTime<Utc>, reset_at: DateTime<Utc>) -> u64 {
    let millis = (reset_at - now).num_milliseconds().max(0);
    u64::try_from(millis).map_or(0, |ms| ms.div_ceil(1000))
}
