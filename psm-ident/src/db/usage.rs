//! Identification usage log (rolling daily counts)

use chrono::{DateTime, Utc};
use psm_common::time;
use psm_common::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Kind of identification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    Name,
    Photo,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::Name => "name",
            UsageKind::Photo => "photo",
        }
    }
}

pub async fn record_identification(
    pool: &SqlitePool,
    user_id: Uuid,
    kind: UsageKind,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("INSERT INTO identification_usage (user_id, method, created_at) VALUES (?, ?, ?)")
        .bind(user_id.to_string())
        .bind(kind.as_str())
        .bind(time::to_db(at))
        .execute(pool)
        .await?;
    Ok(())
}

/// Attempts in the 24 hours ending at `now`
pub async fn identifications_in_last_day(
    pool: &SqlitePool,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<u32> {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM identification_usage WHERE user_id = ? AND created_at > ? AND created_at <= ?",
    )
    .bind(user_id.to_string())
    .bind(time::to_db(time::rolling_day_start(now)))
    .bind(time::to_db(now))
    .fetch_one(pool)
    .await?;

    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}
