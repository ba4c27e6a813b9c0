//! Users and subscription tiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subscription plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
    Premium,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
            PlanTier::Premium => "premium",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free" => Some(PlanTier::Free),
            "pro" => Some(PlanTier::Pro),
            "premium" => Some(PlanTier::Premium),
            _ => None,
        }
    }
}

/// Subscription lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(SubscriptionStatus::Active),
            "cancelled" => Some(SubscriptionStatus::Cancelled),
            "expired" => Some(SubscriptionStatus::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub subscription_plan: PlanTier,
    pub subscription_status: SubscriptionStatus,
    pub subscription_end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    #[serde(default = "default_plan")]
    pub subscription_plan: PlanTier,
    #[serde(default = "default_status")]
    pub subscription_status: SubscriptionStatus,
    #[serde(default)]
    pub subscription_end_date: Option<DateTime<Utc>>,
}

fn default_plan() -> PlanTier {
    PlanTier::Free
}

fn default_status() -> SubscriptionStatus {
    SubscriptionStatus::Active
}

impl NewUser {
    pub fn free(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            subscription_plan: PlanTier::Free,
            subscription_status: SubscriptionStatus::Active,
            subscription_end_date: None,
        }
    }
}

impl User {
    /// Plan in force at `now`; lapsed subscriptions fall back to free
    pub fn effective_tier(&self, now: DateTime<Utc>) -> PlanTier {
        if self.subscription_status != SubscriptionStatus::Active {
            return PlanTier::Free;
        }
        match self.subscription_end_date {
            Some(end) if end <= now => PlanTier::Free,
            _ => self.subscription_plan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(plan: PlanTier, status: SubscriptionStatus, end: Option<DateTime<Utc>>) -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@example.org".to_string(),
            name: "A".to_string(),
            subscription_plan: plan,
            subscription_status: status,
            subscription_end_date: end,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_active_plan_applies() {
        let now = Utc::now();
        let u = user(PlanTier::Premium, SubscriptionStatus::Active, Some(now + Duration::days(3)));
        assert_eq!(u.effective_tier(now), PlanTier::Premium);
    }

    #[test]
    fn test_lapsed_plan_falls_back_to_free() {
        let now = Utc::now();
        let expired = user(PlanTier::Pro, SubscriptionStatus::Active, Some(now - Duration::days(1)));
        assert_eq!(expired.effective_tier(now), PlanTier::Free);

        let cancelled = user(PlanTier::Pro, SubscriptionStatus::Cancelled, None);
        assert_eq!(cancelled.effective_tier(now), PlanTier::Free);
    }
}
