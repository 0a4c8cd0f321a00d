//! Business logic services.

#![allow(missing_docs)]

pub mod badge;
pub mod creator;
pub mod following;
pub mod notification;
pub mod points;
pub mod rate_limit;

pub use badge::{
    BadgeTable, BadgeTier, DEFAULT_TIERS, NextBadge, PointTotal, badge_for_points,
    badge_tier_crossed, next_badge,
};
pub use creator::{CreatorService, UpdateCreatorProfileInput};
pub use following::{FollowStatusSubscription, FollowingService};
pub use notification::{Notification, NotificationService};
pub use points::{PointsAction, PointsAward, PointsProgress, PointsService};
pub use rate_limit::{RateLimitService, RateLimitStatus, RateLimitedAction};
