//! Creator profile service.

use std::sync::Arc;

use serde::Deserialize;
use validator::Validate;
use wildwatch_common::{AppError, AppResult};
use wildwatch_db::{
    DocumentStore, ListOrder, Update, paths,
    records::{CreatorProfile, UserRecord},
    run_transaction, to_data,
};

/// Input for updating a creator profile.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCreatorProfileInput {
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,

    #[validate(length(max = 500))]
    pub bio: Option<String>,

    #[validate(url)]
    pub avatar_url: Option<String>,
}

/// Creator profile service for business logic.
#[derive(Clone)]
pub struct CreatorService {
    store: Arc<dyn DocumentStore>,
}

impl CreatorService {
    /// Create a new creator service.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Return the creator's profile, provisioning it from the user record if absent.
    ///
    /// Runs outside any follow transaction. A missing user record is
    /// [`AppError::UserNotFound`].
    pub async fn ensure_creator_profile(&self, creator_id: &str) -> AppResult<CreatorProfile> {
        let path = paths::creator(creator_id)?;
        if let Some(profile) = self.store.get(&path).await?.decode::<CreatorProfile>()? {
            return Ok(profile);
        }

        let user = self
            .store
            .get(&paths::user(creator_id)?)
            .await?
            .decode::<UserRecord>()?
            .ok_or_else(|| AppError::UserNotFound(creator_id.to_string()))?;

        let fresh = CreatorProfile::from_user(&user);
        let data = to_data(&fresh)?;

        // Create only if still absent. Never overwrite existing counters.
        let (profile, created) = run_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                if let Some(existing) = tx.get(&path).await?.decode::<CreatorProfile>()? {
                    return Ok((existing, false));
                }
                tx.set(&path, data).await?;
                Ok((fresh, true))
            })
        })
        .await?;

        if created {
            tracing::info!(creator_id, "Provisioned creator profile");
        }
        Ok(profile)
    }

    /// Get a creator profile without provisioning it.
    pub async fn get_profile(&self, creator_id: &str) -> AppResult<CreatorProfile> {
        let path = paths::creator(creator_id)?;
        self.store
            .get(&path)
            .await?
            .decode::<CreatorProfile>()?
            .ok_or_else(|| AppError::NotFound(format!("Creator profile: {creator_id}")))
    }

    /// Update the editable profile fields.
    pub async fn update_profile(
        &self,
        creator_id: &str,
        input: UpdateCreatorProfileInput,
    ) -> AppResult<CreatorProfile> {
        input.validate()?;
        self.ensure_creator_profile(creator_id).await?;

        let mut update = Update::new();
        if let Some(name) = input.name {
            update = update.set("name", name);
        }
        if let Some(bio) = input.bio {
            update = update.set("bio", bio);
        }
        if let Some(avatar_url) = input.avatar_url {
            update = update.set("avatarUrl", avatar_url);
        }

        if !update.is_empty() {
            self.store.update(&paths::creator(creator_id)?, update).await?;
            tracing::debug!(creator_id, "Updated creator profile");
        }

        self.get_profile(creator_id).await
    }

    /// Count a newly published post.
    pub async fn increment_post_count(&self, creator_id: &str) -> AppResult<()> {
        self.adjust_post_count(creator_id, 1).await
    }

    /// Count a removed post. Not floored at zero.
    pub async fn decrement_post_count(&self, creator_id: &str) -> AppResult<()> {
        self.adjust_post_count(creator_id, -1).await
    }

    async fn adjust_post_count(&self, creator_id: &str, by: i64) -> AppResult<()> {
        self.ensure_creator_profile(creator_id).await?;
        self.store
            .update(&paths::creator(creator_id)?, Update::new().increment("postCount", by))
            .await
    }

    /// IDs of users following a creator.
    pub async fn list_members(&self, creator_id: &str, limit: u64) -> AppResult<Vec<String>> {
        let members = self
            .store
            .list(&paths::members_of(creator_id)?, ListOrder::Ascending, limit)
            .await?;
        Ok(members.iter().map(|s| s.path.id().to_string()).collect())
    }

    /// IDs of creators a user follows.
    pub async fn list_following(&self, user_id: &str, limit: u64) -> AppResult<Vec<String>> {
        let following = self
            .store
            .list(&paths::following_of(user_id)?, ListOrder::Ascending, limit)
            .await?;
        Ok(following.iter().map(|s| s.path.id().to_string()).collect())
    }
}
