//! Core business logic for wildwatch.

pub mod services;

pub use services::*;

use std::sync::Arc;

use wildwatch_common::Config;
use wildwatch_db::DocumentStore;

/// Every service, wired to one store.
#[derive(Clone)]
pub struct Services {
    pub creators: CreatorService,
    pub following: FollowingService,
    pub notifications: NotificationService,
    pub points: PointsService,
    pub rate_limits: RateLimitService,
}

impl Services {
    /// Build the services with notifications enabled.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        let notifications = NotificationService::new(Arc::clone(&store));
        let creators = CreatorService::new(Arc::clone(&store));

        let mut following = FollowingService::new(Arc::clone(&store), creators.clone());
        following.set_notifications(notifications.clone());

        let mut points = PointsService::new(Arc::clone(&store), config.points.clone());
        points.set_notifications(notifications.clone());

        let rate_limits = RateLimitService::new(store, config.rate_limit.clone());

        Self {
            creators,
            following,
            notifications,
            points,
            rate_limits,
        }
    }
}
