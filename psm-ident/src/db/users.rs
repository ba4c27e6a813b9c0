//! User persistence

use psm_common::time;
use psm_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{NewUser, PlanTier, SubscriptionStatus, User};

/// Create a user unless the email is already registered
///
/// Returns the stored user and whether it was created by this call.
pub async fn create_user(pool: &SqlitePool, new: &NewUser) -> Result<(User, bool)> {
    let email = new.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::InvalidInput(format!("Invalid email address: '{}'", email)));
    }
    let name = new.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("User name must not be empty".to_string()));
    }

    let id = Uuid::new_v4();
    let inserted = sqlx::query(
        r#"
        INSERT INTO users (
            guid, email, name, subscription_plan, subscription_status,
            subscription_end_date, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(email) DO NOTHING
        "#,
    )
    .bind(id.to_string())
    .bind(email)
    .bind(name)
    .bind(new.subscription_plan.as_str())
    .bind(new.subscription_status.as_str())
    .bind(new.subscription_end_date.map(time::to_db))
    .bind(time::to_db(time::now()))
    .execute(pool)
    .await?;

    let created = inserted.rows_affected() == 1;
    let user = find_by_email(pool, email)
        .await?
        .ok_or_else(|| Error::Internal(format!("User '{}' missing after insert", email)))?;

    if created {
        tracing::info!(user_id = %user.id, plan = user.subscription_plan.as_str(), "Created user");
    }
    Ok((user, created))
}

pub async fn get_user(pool: &SqlitePool, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT guid, email, name, subscription_plan, subscription_status,
               subscription_end_date, created_at
        FROM users WHERE guid = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|r| user_from_row(&r)).transpose()
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT guid, email, name, subscription_plan, subscription_status,
               subscription_end_date, created_at
        FROM users WHERE email = ?
        "#,
    )
    .bind(email.trim())
    .fetch_optional(pool)
    .await?;

    row.map(|r| user_from_row(&r)).transpose()
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let guid: String = row.try_get("guid")?;
    let plan: String = row.try_get("subscription_plan")?;
    let status: String = row.try_get("subscription_status")?;
    let end_date: Option<String> = row.try_get("subscription_end_date")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(User {
        id: Uuid::parse_str(&guid)?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        subscription_plan: PlanTier::parse(&plan)
            .ok_or_else(|| Error::Internal(format!("Unknown plan '{}'", plan)))?,
        subscription_status: SubscriptionStatus::parse(&status)
            .ok_or_else(|| Error::Internal(format!("Unknown subscription status '{}'", status)))?,
        subscription_end_date: end_date.as_deref().map(time::from_db).transpose()?,
        created_at: time::from_db(&created_at)?,
    })
}
