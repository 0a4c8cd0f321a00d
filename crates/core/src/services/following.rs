//! Following service.
//!
//! A follow is stored twice: `users/{follower}/following/{creator}` and
//! `creators/{creator}/members/{follower}`. Both markers and the creator's
//! `followerCount` change together inside one store transaction.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use wildwatch_common::{AppError, AppResult};
use wildwatch_db::{
    DocumentStore, Update, paths, records::FollowMarker, run_transaction, to_data,
};

use crate::services::creator::CreatorService;
use crate::services::notification::NotificationService;

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    store: Arc<dyn DocumentStore>,
    creators: CreatorService,
    notifications: Option<NotificationService>,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, creators: CreatorService) -> Self {
        Self {
            store,
            creators,
            notifications: None,
        }
    }

    /// Set the notification service used to announce new followers.
    pub fn set_notifications(&mut self, notifications: NotificationService) {
        self.notifications = Some(notifications);
    }

    /// Follow a creator.
    ///
    /// Fails with [`AppError::AlreadyFollowing`] if the relationship exists.
    /// Store failures, including transaction conflicts, are returned unchanged.
    pub async fn follow_creator(&self, follower_id: &str, creator_id: &str) -> AppResult<()> {
        self.creators.ensure_creator_profile(creator_id).await?;

        let following = paths::following(follower_id, creator_id)?;
        let member = paths::member(creator_id, follower_id)?;
        let creator = paths::creator(creator_id)?;
        let marker = to_data(&FollowMarker {
            created_at: Utc::now(),
        })?;

        run_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                if tx.get(&following).await?.exists() {
                    return Err(AppError::AlreadyFollowing);
                }
                tx.set(&following, marker.clone()).await?;
                tx.set(&member, marker).await?;
                tx.update(&creator, Update::new().increment("followerCount", 1))
                    .await
            })
        })
        .await?;

        tracing::info!(follower_id, creator_id, "Followed creator");
        self.announce_new_follower(creator_id, follower_id);
        Ok(())
    }

    /// Unfollow a creator.
    ///
    /// Fails with [`AppError::NotFollowing`] if there is no relationship. The
    /// follower count is not floored at zero.
    pub async fn unfollow_creator(&self, follower_id: &str, creator_id: &str) -> AppResult<()> {
        self.creators.ensure_creator_profile(creator_id).await?;

        let following = paths::following(follower_id, creator_id)?;
        let member = paths::member(creator_id, follower_id)?;
        let creator = paths::creator(creator_id)?;

        run_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                if !tx.get(&following).await?.exists() {
                    return Err(AppError::NotFollowing);
                }
                tx.delete(&following).await?;
                tx.delete(&member).await?;
                tx.update(&creator, Update::new().increment("followerCount", -1))
                    .await
            })
        })
        .await?;

        tracing::info!(follower_id, creator_id, "Unfollowed creator");
        Ok(())
    }

    /// Whether `follower_id` follows `creator_id`. Not transactional.
    pub async fn get_follow_status(&self, follower_id: &str, creator_id: &str) -> AppResult<bool> {
        let snapshot = self
            .store
            .get(&paths::following(follower_id, creator_id)?)
            .await?;
        Ok(snapshot.exists())
    }

    /// Watch the follow relationship and report it to `callback`.
    ///
    /// Without a follower the callback runs once with `false` before this
    /// returns and no watch is registered. Otherwise the callback receives the
    /// current status and then the status after every committed change, until
    /// the returned subscription is unsubscribed or dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe_follow_status<F>(
        &self,
        follower_id: Option<&str>,
        creator_id: &str,
        mut callback: F,
    ) -> AppResult<FollowStatusSubscription>
    where
        F: FnMut(bool) + Send + 'static,
    {
        let Some(follower_id) = follower_id else {
            callback(false);
            return Ok(FollowStatusSubscription { task: None });
        };

        let path = paths::following(follower_id, creator_id)?;
        let store = Arc::clone(&self.store);

        let task = tokio::spawn(async move {
            let mut receiver = match store.watch(&path).await {
                Ok(receiver) => receiver,
                Err(e) => {
                    tracing::warn!(error = %e, path = %path, "Failed to watch follow status");
                    return;
                }
            };

            loop {
                let exists = receiver.borrow_and_update().exists();
                callback(exists);
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        });

        Ok(FollowStatusSubscription { task: Some(task) })
    }

    /// IDs of users following a creator.
    pub async fn list_members(&self, creator_id: &str, limit: u64) -> AppResult<Vec<String>> {
        self.creators.list_members(creator_id, limit).await
    }

    /// IDs of creators a user follows.
    pub async fn list_following(&self, follower_id: &str, limit: u64) -> AppResult<Vec<String>> {
        self.creators.list_following(follower_id, limit).await
    }

    /// Best effort. Never affects the follow that triggered it.
    fn announce_new_follower(&self, creator_id: &str, follower_id: &str) {
        let Some(notifications) = self.notifications.clone() else {
            return;
        };
        let creator_id = creator_id.to_string();
        let follower_id = follower_id.to_string();

        tokio::spawn(async move {
            if let Err(e) = notifications
                .notify_new_follower(&creator_id, &follower_id)
                .await
            {
                tracing::warn!(
                    error = %e,
                    creator_id = %creator_id,
                    follower_id = %follower_id,
                    "Failed to send new follower notification"
                );
            }
        });
    }
}

/// Handle for a [`FollowingService::subscribe_follow_status`] watch.
///
/// Dropping the handle also stops the watch.
#[derive(Debug)]
#[must_use = "dropping the subscription stops the watch"]
pub struct FollowStatusSubscription {
    task: Option<JoinHandle<()>>,
}

impl FollowStatusSubscription {
    /// Stop the watch. The callback is not invoked afterwards.
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    /// Whether a store watch backs this subscription.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for FollowStatusSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}
