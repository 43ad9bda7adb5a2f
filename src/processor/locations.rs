use crate::db::{queries, DbPool};
use crate::models::location::Location;
use anyhow::Result;
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

/// Top-N distinct subscriber locations, busiest first. Only active users
/// with both city/state and coordinates populated count; the cap bounds how
/// many feed queries one cycle can issue.
pub async fn top_active_locations(pool: &DbPool, limit: i64) -> Result<Vec<Location>> {
    let locations = sqlx::query_as::<_, Location>(queries::SELECT_TOP_ACTIVE_LOCATIONS)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    debug!("Aggregated {} active locations", locations.len());
    Ok(locations)
}

/// Active users subscribed at a given city/state, the target set for one
/// alert's fan-out.
pub async fn users_at_location(pool: &DbPool, city: &str, state: &str) -> Result<Vec<Uuid>> {
    let rows = sqlx::query(queries::SELECT_USERS_AT_LOCATION)
        .bind(city)
        .bind(state)
        .fetch_all(pool)
        .await?;

    rows.iter().map(|r| Ok(r.try_get("id")?)).collect()
}
