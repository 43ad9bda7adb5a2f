use crate::db::{queries, DbPool};
use anyhow::Result;
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct SweepSummary {
    pub alerts_deactivated: u64,
    pub alerts_deleted: u64,
    pub tokens_deactivated: u64,
}

/// Retention pass, run once per poll cycle. Three set-based statements, each
/// idempotent and safe to run alongside normal upserts: a row touched
/// between read and write is simply picked up next cycle.
///
/// - alerts whose validity window has elapsed are deactivated;
/// - alerts inactive past the retention horizon are hard-deleted;
/// - device tokens unused past the staleness horizon are deactivated.
pub async fn sweep(
    pool: &DbPool,
    alert_retention_days: i32,
    token_stale_days: i32,
) -> Result<SweepSummary> {
    let deactivated = sqlx::query(queries::DEACTIVATE_EXPIRED_ALERTS)
        .execute(pool)
        .await?
        .rows_affected();

    let deleted = sqlx::query(queries::DELETE_RETIRED_ALERTS)
        .bind(alert_retention_days)
        .execute(pool)
        .await?
        .rows_affected();

    let stale_tokens = sqlx::query(queries::DEACTIVATE_STALE_TOKENS)
        .bind(token_stale_days)
        .execute(pool)
        .await?
        .rows_affected();

    let summary = SweepSummary {
        alerts_deactivated: deactivated,
        alerts_deleted: deleted,
        tokens_deactivated: stale_tokens,
    };

    if deactivated > 0 || deleted > 0 || stale_tokens > 0 {
        info!(
            "Retention sweep: {} alerts deactivated, {} deleted, {} stale tokens deactivated",
            deactivated, deleted, stale_tokens
        );
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use sqlx::PgPool;
    use uuid::Uuid;

    async fn insert_alert(
        pool: &PgPool,
        id: &str,
        active: bool,
        end_time: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
    ) {
        sqlx::query(
            r#"
            INSERT INTO weather_alerts
                (alert_id, title, description, severity, alert_type, source,
                 location_city, location_state, end_time, is_active, created_at, updated_at)
            VALUES ($1, 'Test alert', '', 'moderate', 'Flood Advisory', 'NOAA',
                    'Austin', 'TX', $2, $3, $4, NOW())
            "#,
        )
        .bind(id)
        .bind(end_time)
        .bind(active)
        .bind(created_at)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn is_active(pool: &PgPool, id: &str) -> Option<bool> {
        sqlx::query_scalar("SELECT is_active FROM weather_alerts WHERE alert_id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn elapsed_windows_are_deactivated(pool: PgPool) {
        let now = Utc::now();
        insert_alert(&pool, "expired", true, Some(now - Duration::seconds(1)), now).await;
        insert_alert(&pool, "ongoing", true, Some(now + Duration::hours(1)), now).await;
        insert_alert(&pool, "open-ended", true, None, now).await;

        let summary = sweep(&pool, 30, 90).await.unwrap();

        assert_eq!(summary.alerts_deactivated, 1);
        assert_eq!(is_active(&pool, "expired").await, Some(false));
        assert_eq!(is_active(&pool, "ongoing").await, Some(true));
        assert_eq!(is_active(&pool, "open-ended").await, Some(true));
    }

    #[sqlx::test]
    async fn retention_horizon_deletes_only_old_inactive_rows(pool: PgPool) {
        let now = Utc::now();
        insert_alert(&pool, "old-inactive", false, None, now - Duration::days(31)).await;
        insert_alert(&pool, "young-inactive", false, None, now - Duration::days(29)).await;
        insert_alert(&pool, "old-active", true, None, now - Duration::days(31)).await;

        let summary = sweep(&pool, 30, 90).await.unwrap();

        assert_eq!(summary.alerts_deleted, 1);
        assert_eq!(is_active(&pool, "old-inactive").await, None);
        assert_eq!(is_active(&pool, "young-inactive").await, Some(false));
        assert_eq!(is_active(&pool, "old-active").await, Some(true));
    }

    #[sqlx::test]
    async fn stale_tokens_are_deactivated(pool: PgPool) {
        let now = Utc::now();
        for (token, last_used) in [
            ("stale-token", now - Duration::days(91)),
            ("fresh-token", now - Duration::days(1)),
        ] {
            sqlx::query(
                r#"
                INSERT INTO device_tokens (token, user_id, platform, is_active, last_used, created_at)
                VALUES ($1, $2, 'android', TRUE, $3, NOW())
                "#,
            )
            .bind(token)
            .bind(Uuid::new_v4())
            .bind(last_used)
            .execute(&pool)
            .await
            .unwrap();
        }

        let summary = sweep(&pool, 30, 90).await.unwrap();

        assert_eq!(summary.tokens_deactivated, 1);
        let still_active: Vec<String> =
            sqlx::query_scalar("SELECT token FROM device_tokens WHERE is_active")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(still_active, vec!["fresh-token"]);
    }
}
