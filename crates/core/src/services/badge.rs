//! Badge progression.
//!
//! Badges are a pure function of a user's point total. Nothing here touches
//! storage.

use serde::{Deserialize, Serialize};
use wildwatch_common::{AppError, AppResult};

/// A named milestone unlocked at a point threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BadgeTier {
    pub id: &'static str,
    pub name: &'static str,
    pub threshold: u64,
}

impl BadgeTier {
    #[must_use]
    pub const fn new(id: &'static str, name: &'static str, threshold: u64) -> Self {
        Self {
            id,
            name,
            threshold,
        }
    }
}

/// Default tiers, lowest first.
pub const DEFAULT_TIERS: [BadgeTier; 5] = [
    BadgeTier::new("newcomer", "Newcomer", 0),
    BadgeTier::new("observer", "Observer", 100),
    BadgeTier::new("contributor", "Contributor", 500),
    BadgeTier::new("expert", "Expert", 1000),
    BadgeTier::new("guardian", "Guardian", 5000),
];

/// A user's accumulated points. Never negative.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PointTotal(u64);

impl PointTotal {
    #[must_use]
    pub const fn new(points: u64) -> Self {
        Self(points)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for PointTotal {
    fn from(points: u64) -> Self {
        Self(points)
    }
}

impl TryFrom<i64> for PointTotal {
    type Error = AppError;

    fn try_from(points: i64) -> AppResult<Self> {
        u64::try_from(points)
            .map(Self)
            .map_err(|_| AppError::Validation(format!("point total must not be negative: {points}")))
    }
}

/// Distance to the next badge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextBadge<'a> {
    /// The next tier, or the top tier once it is reached.
    pub tier: &'a BadgeTier,
    pub points_needed: u64,
    /// `100 * points / tier.threshold`; exactly 100 at the top tier.
    pub progress_percent: f64,
}

/// An ordered set of tiers.
///
/// Invariants: non-empty, the first threshold is 0, thresholds strictly increase.
#[derive(Debug, Clone, Copy)]
pub struct BadgeTable<'a> {
    tiers: &'a [BadgeTier],
}

impl BadgeTable<'static> {
    /// The production tier table.
    pub const DEFAULT: Self = Self {
        tiers: &DEFAULT_TIERS,
    };
}

impl Default for BadgeTable<'static> {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl<'a> BadgeTable<'a> {
    /// Validate and wrap a tier list.
    pub fn new(tiers: &'a [BadgeTier]) -> AppResult<Self> {
        let Some(first) = tiers.first() else {
            return Err(AppError::Validation("badge table must not be empty".to_string()));
        };
        if first.threshold != 0 {
            return Err(AppError::Validation(format!(
                "lowest badge tier must start at 0 points, got {}",
                first.threshold
            )));
        }
        if let Some(pair) = tiers.windows(2).find(|w| w[0].threshold >= w[1].threshold) {
            return Err(AppError::Validation(format!(
                "badge thresholds must strictly increase: {} ({}) then {} ({})",
                pair[0].id, pair[0].threshold, pair[1].id, pair[1].threshold
            )));
        }
        Ok(Self { tiers })
    }

    /// All tiers, lowest first.
    #[must_use]
    pub const fn tiers(&self) -> &'a [BadgeTier] {
        self.tiers
    }

    /// Number of tiers whose threshold is at most `points`. At least 1.
    fn reached(&self, points: u64) -> usize {
        self.tiers.partition_point(|tier| tier.threshold <= points)
    }

    /// The highest tier whose threshold is at most `points`.
    #[must_use]
    pub fn badge_for_points(&self, points: u64) -> &'a BadgeTier {
        &self.tiers[self.reached(points).saturating_sub(1)]
    }

    /// The lowest tier whose threshold exceeds `points`.
    #[must_use]
    pub fn next_badge(&self, points: u64) -> NextBadge<'a> {
        match self.tiers.get(self.reached(points)) {
            Some(tier) => NextBadge {
                tier,
                points_needed: tier.threshold - points,
                progress_percent: 100.0 * points as f64 / tier.threshold as f64,
            },
            None => NextBadge {
                tier: &self.tiers[self.tiers.len() - 1],
                points_needed: 0,
                progress_percent: 100.0,
            },
        }
    }

    /// The tier reached at `new_points`, if it differs from the one at `old_points`.
    #[must_use]
    pub fn tier_crossed(&self, old_points: u64, new_points: u64) -> Option<&'a BadgeTier> {
        let before = self.badge_for_points(old_points);
        let after = self.badge_for_points(new_points);
        (before.id != after.id).then_some(after)
    }
}

/// [`BadgeTable::badge_for_points`] over the default tiers.
#[must_use]
pub fn badge_for_points(points: u64) -> &'static BadgeTier {
    BadgeTable::DEFAULT.badge_for_points(points)
}

/// [`BadgeTable::next_badge`] over the default tiers.
#[must_use]
pub fn next_badge(points: u64) -> NextBadge<'static> {
    BadgeTable::DEFAULT.next_badge(points)
}

/// [`BadgeTable::tier_crossed`] over the default tiers.
#[must_use]
pub fn badge_tier_crossed(old_points: u64, new_points: u64) -> Option<&'static BadgeTier> {
    BadgeTable::DEFAULT.tier_crossed(old_points, new_points)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_valid() {
        assert!(BadgeTable::new(&DEFAULT_TIERS).is_ok());
    }

    #[test]
    fn test_badge_for_points_examples() {
        assert_eq!(badge_for_points(0).id, "newcomer");
        assert_eq!(badge_for_points(99).id, "newcomer");
        assert_eq!(badge_for_points(100).id, "observer");
        assert_eq!(badge_for_points(499).id, "observer");
        assert_eq!(badge_for_points(500).id, "contributor");
        assert_eq!(badge_for_points(1000).id, "expert");
        assert_eq!(badge_for_points(5000).id, "guardian");
        assert_eq!(badge_for_points(1_000_000).id, "guardian");
        assert_eq!(badge_for_points(u64::MAX).id, "guardian");
    }

    #[test]
    fn test_badge_for_points_is_highest_reached_tier() {
        for points in 0..=6000 {
            let tier = badge_for_points(points);
            assert!(tier.threshold <= points);
            assert!(
                DEFAULT_TIERS
                    .iter()
                    .filter(|t| t.threshold <= points)
                    .all(|t| t.threshold <= tier.threshold)
            );
        }
    }

    #[test]
    fn test_next_badge_progress() {
        let next = next_badge(0);
        assert_eq!(next.tier.id, "observer");
        assert_eq!(next.points_needed, 100);
        assert!(next.progress_percent.abs() < f64::EPSILON);

        let next = next_badge(250);
        assert_eq!(next.tier.id, "contributor");
        assert_eq!(next.points_needed, 250);
        assert!((next.progress_percent - 50.0).abs() < f64::EPSILON);

        let next = next_badge(4999);
        assert_eq!(next.tier.id, "guardian");
        assert_eq!(next.points_needed, 1);
    }

    #[test]
    fn test_next_badge_top_tier_is_terminal() {
        for points in [5000, 5001, 1_000_000] {
            let next = next_badge(points);
            assert_eq!(next.tier.id, "guardian");
            assert_eq!(next.points_needed, 0);
            assert!((next.progress_percent - 100.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_tier_crossed() {
        assert_eq!(badge_tier_crossed(99, 100).unwrap().id, "observer");
        assert!(badge_tier_crossed(100, 150).is_none());
        assert!(badge_tier_crossed(0, 0).is_none());
        // Skipping tiers reports the tier reached.
        assert_eq!(badge_tier_crossed(50, 1200).unwrap().id, "expert");
    }

    #[test]
    fn test_point_total_rejects_negative() {
        assert!(matches!(
            PointTotal::try_from(-1_i64),
            Err(AppError::Validation(_))
        ));
        assert_eq!(PointTotal::try_from(42_i64).unwrap().get(), 42);
        assert_eq!(PointTotal::from(7_u64), PointTotal::new(7));
    }

    #[test]
    fn test_custom_table_validation() {
        const EMPTY: [BadgeTier; 0] = [];
        assert!(BadgeTable::new(&EMPTY).is_err());

        let no_zero = [BadgeTier::new("a", "A", 10)];
        assert!(BadgeTable::new(&no_zero).is_err());

        let not_increasing = [
            BadgeTier::new("a", "A", 0),
            BadgeTier::new("b", "B", 50),
            BadgeTier::new("c", "C", 50),
        ];
        assert!(BadgeTable::new(&not_increasing).is_err());
    }

    #[test]
    fn test_custom_table() {
        let tiers = [
            BadgeTier::new("egg", "Egg", 0),
            BadgeTier::new("chick", "Chick", 10),
        ];
        let table = BadgeTable::new(&tiers).unwrap();

        assert_eq!(table.badge_for_points(9).id, "egg");
        assert_eq!(table.badge_for_points(10).id, "chick");
        assert_eq!(table.next_badge(5).points_needed, 5);
        assert_eq!(table.next_badge(10).tier.id, "chick");
        assert_eq!(table.tier_crossed(9, 10).unwrap().id, "chick");
        assert_eq!(table.tiers().len(), 2);
    }

    #[test]
    fn test_single_tier_table() {
        let tiers = [BadgeTier::new("only", "Only", 0)];
        let table = BadgeTable::new(&tiers).unwrap();

        assert_eq!(table.badge_for_points(0).id, "only");
        let next = table.next_badge(0);
        assert_eq!(next.tier.id, "only");
        assert_eq!(next.points_needed, 0);
    }
}
