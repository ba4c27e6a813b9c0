//! Usage/entitlement gate
//!
//! [`evaluate`] is a pure function of plan tier and current usage. It is
//! advisory: callers check it before invoking identification or creating a
//! tour; the orchestrator does not enforce it.

use chrono::{DateTime, Utc};
use psm_common::Result;
use serde::{Serialize, Serializer};
use sqlx::SqlitePool;

use crate::db;
use crate::models::{PlanTier, User};

/// A quota, or no quota at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Limited(u32),
    Unlimited,
}

impl Limit {
    /// Whether one more use is allowed after `used`
    pub fn allows(&self, used: u32) -> bool {
        match self {
            Limit::Unlimited => true,
            Limit::Limited(max) => used < *max,
        }
    }

    /// Uses left, `None` when unlimited
    pub fn remaining(&self, used: u32) -> Option<u32> {
        match self {
            Limit::Unlimited => None,
            Limit::Limited(max) => Some(max.saturating_sub(used)),
        }
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Limit::Limited(max) => serializer.serialize_u32(*max),
            Limit::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

/// Per-tier quotas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierLimits {
    pub identifications_per_day: Limit,
    pub private_tours: Limit,
    pub public_tours: Limit,
}

impl TierLimits {
    pub fn for_tier(tier: PlanTier) -> Self {
        match tier {
            PlanTier::Free => Self {
                identifications_per_day: Limit::Limited(5),
                private_tours: Limit::Limited(1),
                public_tours: Limit::Limited(0),
            },
            PlanTier::Pro => Self {
                identifications_per_day: Limit::Unlimited,
                private_tours: Limit::Unlimited,
                public_tours: Limit::Limited(5),
            },
            PlanTier::Premium => Self {
                identifications_per_day: Limit::Unlimited,
                private_tours: Limit::Unlimited,
                public_tours: Limit::Unlimited,
            },
        }
    }
}

/// Current usage counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    /// Identification attempts in the last 24 hours
    pub identifications_today: u32,
    pub private_tours: u32,
    pub public_tours: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entitlement {
    pub tier: PlanTier,
    pub can_identify: bool,
    pub can_create_private_tour: bool,
    pub can_create_public_tour: bool,
    pub limits: TierLimits,
    pub usage: UsageSnapshot,
    /// Identifications left today, `None` when unlimited
    pub identifications_remaining: Option<u32>,
}

/// Decide what a user on `tier` may do next
pub fn evaluate(tier: PlanTier, usage: UsageSnapshot) -> Entitlement {
    let limits = TierLimits::for_tier(tier);
    Entitlement {
        tier,
        can_identify: limits.identifications_per_day.allows(usage.identifications_today),
        can_create_private_tour: limits.private_tours.allows(usage.private_tours),
        can_create_public_tour: limits.public_tours.allows(usage.public_tours),
        identifications_remaining: limits
            .identifications_per_day
            .remaining(usage.identifications_today),
        limits,
        usage,
    }
}

/// Gather a user's usage from the database and evaluate it
pub async fn entitlement_for_user(
    pool: &SqlitePool,
    user: &User,
    now: DateTime<Utc>,
) -> Result<Entitlement> {
    let usage = UsageSnapshot {
        identifications_today: db::usage::identifications_in_last_day(pool, user.id, now).await?,
        private_tours: db::tours::count_tours(pool, user.id, false).await?,
        public_tours: db::tours::count_tours(pool, user.id, true).await?,
    };
    Ok(evaluate(user.effective_tier(now), usage))
}
