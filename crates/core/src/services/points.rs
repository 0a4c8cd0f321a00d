//! Points awarding.

use std::sync::Arc;

use serde::Serialize;
use wildwatch_common::{AppError, AppResult, PointsConfig};
use wildwatch_db::{DocumentStore, Update, paths, records::UserRecord, run_transaction};

use crate::services::badge::{BadgeTable, BadgeTier, NextBadge};
use crate::services::notification::NotificationService;

/// Something a user can earn points for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PointsAction {
    ObservationSubmitted,
    ObservationVerified,
    BlogPostPublished,
    CommentPosted,
}

impl PointsAction {
    /// Points configured for this action.
    #[must_use]
    pub const fn points(self, config: &PointsConfig) -> u64 {
        match self {
            Self::ObservationSubmitted => config.observation_submitted,
            Self::ObservationVerified => config.observation_verified,
            Self::BlogPostPublished => config.blog_post_published,
            Self::CommentPosted => config.comment_posted,
        }
    }
}

/// Outcome of [`PointsService::award_points`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsAward {
    pub previous: u64,
    pub total: u64,
    pub awarded: u64,
    /// Set when the award moved the user into a new tier.
    pub badge_earned: Option<&'static BadgeTier>,
}

/// A user's standing on the badge ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsProgress {
    pub points: u64,
    pub badge: &'static BadgeTier,
    pub next: NextBadge<'static>,
}

/// Points service for business logic.
#[derive(Clone)]
pub struct PointsService {
    store: Arc<dyn DocumentStore>,
    config: PointsConfig,
    badges: BadgeTable<'static>,
    notifications: Option<NotificationService>,
}

impl PointsService {
    /// Create a new points service using the default badge tiers.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: PointsConfig) -> Self {
        Self {
            store,
            config,
            badges: BadgeTable::DEFAULT,
            notifications: None,
        }
    }

    /// Use a custom badge table.
    #[must_use]
    pub fn with_badges(mut self, badges: BadgeTable<'static>) -> Self {
        self.badges = badges;
        self
    }

    /// Set the notification service used to announce earned badges.
    pub fn set_notifications(&mut self, notifications: NotificationService) {
        self.notifications = Some(notifications);
    }

    /// Add the configured points for `action` to a user's total.
    pub async fn award_points(&self, user_id: &str, action: PointsAction) -> AppResult<PointsAward> {
        let awarded = action.points(&self.config);
        let increment = i64::try_from(awarded)
            .map_err(|_| AppError::Config(format!("points for {action:?} out of range")))?;
        let path = paths::user(user_id)?;
        let owner = user_id.to_string();

        let previous = run_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let user = tx
                    .get(&path)
                    .await?
                    .decode::<UserRecord>()?
                    .ok_or(AppError::UserNotFound(owner))?;
                tx.update(&path, Update::new().increment("points", increment))
                    .await?;
                Ok(user.points)
            })
        })
        .await?;

        let total = previous.saturating_add(awarded);
        let badge_earned = self.badges.tier_crossed(previous, total);

        tracing::debug!(user_id, ?action, previous, total, "Awarded points");
        if let Some(badge) = badge_earned {
            tracing::info!(user_id, badge = badge.id, "Badge earned");
            self.announce_badge(user_id, badge);
        }

        Ok(PointsAward {
            previous,
            total,
            awarded,
            badge_earned,
        })
    }

    /// Current points, badge, and distance to the next badge.
    pub async fn progress(&self, user_id: &str) -> AppResult<PointsProgress> {
        let user = self
            .store
            .get(&paths::user(user_id)?)
            .await?
            .decode::<UserRecord>()?
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;

        Ok(PointsProgress {
            points: user.points,
            badge: self.badges.badge_for_points(user.points),
            next: self.badges.next_badge(user.points),
        })
    }

    fn announce_badge(&self, user_id: &str, badge: &'static BadgeTier) {
        let Some(notifications) = self.notifications.clone() else {
            return;
        };
        let user_id = user_id.to_string();

        tokio::spawn(async move {
            if let Err(e) = notifications.notify_badge_earned(&user_id, badge).await {
                tracing::warn!(
                    error = %e,
                    user_id = %user_id,
                    badge = badge.id,
                    "Failed to send badge notification"
                );
            }
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wildwatch_db::{MemoryStore, to_data};

    async fn service_with_points(points: u64) -> (MemoryStore, PointsService) {
        let store = MemoryStore::new();
        store
            .set(
                &paths::user("u1").unwrap(),
                to_data(&UserRecord {
                    points,
                    ..Default::default()
                })
                .unwrap(),
            )
            .await
            .unwrap();
        let service = PointsService::new(Arc::new(store.clone()), PointsConfig::default());
        (store, service)
    }

    #[test]
    fn test_action_points_follow_config() {
        let config = PointsConfig {
            observation_submitted: 1,
            observation_verified: 2,
            blog_post_published: 3,
            comment_posted: 4,
        };
        assert_eq!(PointsAction::ObservationSubmitted.points(&config), 1);
        assert_eq!(PointsAction::ObservationVerified.points(&config), 2);
        assert_eq!(PointsAction::BlogPostPublished.points(&config), 3);
        assert_eq!(PointsAction::CommentPosted.points(&config), 4);
    }

    #[tokio::test]
    async fn test_award_points_persists_total() {
        let (store, service) = service_with_points(5).await;
        let award = service
            .award_points("u1", PointsAction::CommentPosted)
            .await
            .unwrap();

        assert_eq!(award.previous, 5);
        assert_eq!(award.awarded, 2);
        assert_eq!(award.total, 7);
        assert!(award.badge_earned.is_none());

        let user = store
            .get(&paths::user("u1").unwrap())
            .await
            .unwrap()
            .decode::<UserRecord>()
            .unwrap()
            .unwrap();
        assert_eq!(user.points, 7);
    }

    #[tokio::test]
    async fn test_award_points_reports_badge() {
        let (_store, service) = service_with_points(95).await;
        let award = service
            .award_points("u1", PointsAction::ObservationSubmitted)
            .await
            .unwrap();

        assert_eq!(award.total, 105);
        assert_eq!(award.badge_earned.unwrap().id, "observer");
    }

    #[tokio::test]
    async fn test_award_points_unknown_user() {
        let service = PointsService::new(Arc::new(MemoryStore::new()), PointsConfig::default());
        let result = service
            .award_points("ghost", PointsAction::CommentPosted)
            .await;
        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_progress() {
        let (_store, service) = service_with_points(250).await;
        let progress = service.progress("u1").await.unwrap();

        assert_eq!(progress.points, 250);
        assert_eq!(progress.badge.id, "observer");
        assert_eq!(progress.next.tier.id, "contributor");
        assert_eq!(progress.next.points_needed, 250);
    }
}
