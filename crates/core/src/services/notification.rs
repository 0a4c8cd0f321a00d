//! Notification service.

use std::sync::Arc;

use chrono::Utc;
use wildwatch_common::{AppError, AppResult, IdGenerator};
use wildwatch_db::{
    DocumentStore, ListOrder, Update, paths,
    records::{NotificationKind, NotificationRecord},
    to_data,
};

use crate::services::badge::BadgeTier;

/// A stored notification with its ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: String,
    pub record: NotificationRecord,
}

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn DocumentStore>,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            id_gen: IdGenerator::new(),
        }
    }

    /// Tell a creator they gained a follower.
    pub async fn notify_new_follower(
        &self,
        creator_id: &str,
        follower_id: &str,
    ) -> AppResult<Notification> {
        self.create(
            creator_id,
            NotificationRecord {
                kind: NotificationKind::NewFollower,
                actor_id: Some(follower_id.to_string()),
                badge_id: None,
                message: "You have a new follower".to_string(),
                read: false,
                created_at: Utc::now(),
            },
        )
        .await
    }

    /// Tell a user they unlocked a badge.
    pub async fn notify_badge_earned(
        &self,
        user_id: &str,
        badge: &BadgeTier,
    ) -> AppResult<Notification> {
        self.create(
            user_id,
            NotificationRecord {
                kind: NotificationKind::BadgeEarned,
                actor_id: None,
                badge_id: Some(badge.id.to_string()),
                message: format!("You earned the {} badge", badge.name),
                read: false,
                created_at: Utc::now(),
            },
        )
        .await
    }

    async fn create(&self, user_id: &str, record: NotificationRecord) -> AppResult<Notification> {
        let id = self.id_gen.generate();
        let path = paths::notification(user_id, &id)?;
        self.store.set(&path, to_data(&record)?).await?;

        tracing::debug!(user_id, notification_id = %id, kind = ?record.kind, "Created notification");
        Ok(Notification { id, record })
    }

    /// Most recent notifications first.
    pub async fn list(&self, user_id: &str, limit: u64) -> AppResult<Vec<Notification>> {
        // IDs sort by creation time.
        let snapshots = self
            .store
            .list(&paths::notifications_of(user_id)?, ListOrder::Descending, limit)
            .await?;

        snapshots
            .iter()
            .map(|snapshot| {
                let record = snapshot
                    .decode::<NotificationRecord>()?
                    .ok_or_else(|| AppError::NotFound(snapshot.path.to_string()))?;
                Ok(Notification {
                    id: snapshot.path.id().to_string(),
                    record,
                })
            })
            .collect()
    }

    /// Mark one notification as read.
    pub async fn mark_read(&self, user_id: &str, notification_id: &str) -> AppResult<()> {
        let path = paths::notification(user_id, notification_id)?;
        self.store
            .update(&path, Update::new().set("read", true))
            .await
    }

    /// Number of unread notifications.
    pub async fn unread_count(&self, user_id: &str) -> AppResult<u64> {
        let snapshots = self
            .store
            .list(&paths::notifications_of(user_id)?, ListOrder::Ascending, u64::MAX)
            .await?;

        let mut unread = 0;
        for snapshot in &snapshots {
            if let Some(record) = snapshot.decode::<NotificationRecord>()?
                && !record.read
            {
                unread += 1;
            }
        }
        Ok(unread)
    }
}
