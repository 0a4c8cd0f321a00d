//! Typed schemas for each logical document path.
//!
//! Field names are camelCase in storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `users/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Gamification points. Only ever increased.
    #[serde(default)]
    pub points: u64,
}

/// `creators/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorProfile {
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Number of `creators/{id}/members/*` documents.
    #[serde(default)]
    pub follower_count: i64,
    #[serde(default)]
    pub post_count: i64,
}

impl CreatorProfile {
    /// Provision a profile from the creator's user record.
    #[must_use]
    pub fn from_user(user: &UserRecord) -> Self {
        Self {
            name: user
                .display_name
                .clone()
                .unwrap_or_else(|| "Anonymous".to_string()),
            avatar_url: user.photo_url.clone(),
            bio: user.bio.clone(),
            follower_count: 0,
            post_count: 0,
        }
    }
}

/// Existence marker stored at both `users/{f}/following/{c}` and
/// `creators/{c}/members/{f}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowMarker {
    pub created_at: DateTime<Utc>,
}

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    NewFollower,
    BadgeEarned,
}

/// `users/{id}/notifications/{notificationId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub kind: NotificationKind,
    /// User who caused the notification, if any.
    #[serde(default)]
    pub actor_id: Option<String>,
    /// Badge identifier for [`NotificationKind::BadgeEarned`].
    #[serde(default)]
    pub badge_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// `rateLimits/{userId}_{action}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
    /// Actions recorded in the current window.
    pub count: u32,
    /// When the current window ends.
    pub reset_at: DateTime<Utc>,
}
