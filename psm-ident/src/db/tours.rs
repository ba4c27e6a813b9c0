//! Tour and tour stop persistence

use psm_common::time;
use psm_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::models::{NewTour, Tour, TourStop};

pub async fn insert_tour(pool: &SqlitePool, new: &NewTour) -> Result<Tour> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Tour name must not be empty".to_string()));
    }

    let tour = Tour {
        id: Uuid::new_v4(),
        user_id: new.user_id,
        name: name.to_string(),
        description: new.description.trim().to_string(),
        is_public: new.is_public,
        created_at: time::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO tours (guid, user_id, name, description, is_public, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(tour.id.to_string())
    .bind(tour.user_id.to_string())
    .bind(&tour.name)
    .bind(&tour.description)
    .bind(tour.is_public)
    .bind(time::to_db(tour.created_at))
    .execute(pool)
    .await?;

    tracing::info!(tour_id = %tour.id, is_public = tour.is_public, "Created tour");
    Ok(tour)
}

pub async fn get_tour(pool: &SqlitePool, id: Uuid) -> Result<Option<Tour>> {
    let row = sqlx::query(
        "SELECT guid, user_id, name, description, is_public, created_at FROM tours WHERE guid = ?",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?;

    row.map(|r| tour_from_row(&r)).transpose()
}

/// Number of tours a user owns with the given visibility
pub async fn count_tours(pool: &SqlitePool, user_id: Uuid, is_public: bool) -> Result<u32> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM tours WHERE user_id = ? AND is_public = ?")
            .bind(user_id.to_string())
            .bind(is_public)
            .fetch_one(pool)
            .await?;

    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

/// Stops of a tour in order
pub async fn list_stops(pool: &SqlitePool, tour_id: Uuid) -> Result<Vec<TourStop>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, tour_id, sighting_id, stop_order, custom_notes
        FROM tour_stops
        WHERE tour_id = ?
        ORDER BY stop_order, created_at
        "#,
    )
    .bind(tour_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(stop_from_row).collect()
}

/// Append a stop at the end of the tour
pub async fn add_stop(
    pool: &SqlitePool,
    tour_id: Uuid,
    sighting_id: Uuid,
    custom_notes: Option<&str>,
) -> Result<TourStop> {
    let mut tx = pool.begin().await?;

    let tour_exists: Option<(String,)> = sqlx::query_as("SELECT guid FROM tours WHERE guid = ?")
        .bind(tour_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
    if tour_exists.is_none() {
        return Err(Error::NotFound(format!("Tour {}", tour_id)));
    }

    let sighting_exists: Option<(String,)> =
        sqlx::query_as("SELECT guid FROM sightings WHERE guid = ?")
            .bind(sighting_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
    if sighting_exists.is_none() {
        return Err(Error::NotFound(format!("Sighting {}", sighting_id)));
    }

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tour_stops WHERE tour_id = ?")
        .bind(tour_id.to_string())
        .fetch_one(&mut *tx)
        .await?;

    let stop = TourStop {
        id: Uuid::new_v4(),
        tour_id,
        sighting_id,
        order: count,
        custom_notes: custom_notes
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
    };

    sqlx::query(
        r#"
        INSERT INTO tour_stops (guid, tour_id, sighting_id, stop_order, custom_notes, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(stop.id.to_string())
    .bind(tour_id.to_string())
    .bind(sighting_id.to_string())
    .bind(stop.order)
    .bind(&stop.custom_notes)
    .bind(time::to_db(time::now()))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(stop)
}

/// Remove one stop and close the gap in the ordering
pub async fn remove_stop(pool: &SqlitePool, stop_id: Uuid) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let tour: Option<(String,)> = sqlx::query_as("SELECT tour_id FROM tour_stops WHERE guid = ?")
        .bind(stop_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;

    let Some((tour_id,)) = tour else {
        return Ok(false);
    };

    sqlx::query("DELETE FROM tour_stops WHERE guid = ?")
        .bind(stop_id.to_string())
        .execute(&mut *tx)
        .await?;

    renumber_stops(&mut *tx, &tour_id).await?;
    tx.commit().await?;
    Ok(true)
}

/// Delete a tour's stops, then the tour
pub async fn delete_tour(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM tour_stops WHERE tour_id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM tours WHERE guid = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(deleted.rows_affected() > 0)
}

/// Rewrite `stop_order` as 0..n-1 keeping the current relative order
pub(crate) async fn renumber_stops(conn: &mut SqliteConnection, tour_id: &str) -> Result<()> {
    let stops: Vec<(String,)> = sqlx::query_as(
        "SELECT guid FROM tour_stops WHERE tour_id = ? ORDER BY stop_order, created_at",
    )
    .bind(tour_id)
    .fetch_all(&mut *conn)
    .await?;

    for (position, (guid,)) in stops.iter().enumerate() {
        sqlx::query("UPDATE tour_stops SET stop_order = ? WHERE guid = ?")
            .bind(position as i64)
            .bind(guid)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

fn tour_from_row(row: &SqliteRow) -> Result<Tour> {
    let guid: String = row.try_get("guid")?;
    let user_id: String = row.try_get("user_id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Tour {
        id: Uuid::parse_str(&guid)?,
        user_id: Uuid::parse_str(&user_id)?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_public: row.try_get("is_public")?,
        created_at: time::from_db(&created_at)?,
    })
}

fn stop_from_row(row: &SqliteRow) -> Result<TourStop> {
    let guid: String = row.try_get("guid")?;
    let tour_id: String = row.try_get("tour_id")?;
    let sighting_id: String = row.try_get("sighting_id")?;

    Ok(TourStop {
        id: Uuid::parse_str(&guid)?,
        tour_id: Uuid::parse_str(&tour_id)?,
        sighting_id: Uuid::parse_str(&sighting_id)?,
        order: row.try_get("stop_order")?,
        custom_notes: row.try_get("custom_notes")?,
    })
}
