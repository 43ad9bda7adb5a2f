use crate::db::{queries, DbPool};
use crate::models::alert::NewAlert;
use anyhow::Result;
use sqlx::types::Json;
use sqlx::Row;

/// `is_new` for a fresh insert, otherwise the row already existed and was
/// updated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub is_new: bool,
}

/// Atomic insert-or-update keyed on the external alert id. A single
/// statement, so concurrent cycles observing the same alert cannot create
/// duplicates; `xmax = 0` on the returned row distinguishes a fresh insert
/// from an update of an existing row. `is_new` is what gates notification
/// fan-out: one fan-out per alert lifetime, no matter how many cycles
/// re-observe it.
///
/// The update arm deliberately leaves `is_active` alone so a deactivated
/// alert is not resurrected by a late re-fetch.
pub async fn upsert_alert(pool: &DbPool, alert: &NewAlert) -> Result<UpsertOutcome> {
    let row = sqlx::query(queries::UPSERT_ALERT)
        .bind(&alert.alert_id)
        .bind(&alert.title)
        .bind(&alert.description)
        .bind(alert.severity)
        .bind(&alert.alert_type)
        .bind(&alert.source)
        .bind(&alert.location_city)
        .bind(&alert.location_state)
        .bind(alert.start_time)
        .bind(alert.end_time)
        .bind(Json(&alert.metadata))
        .fetch_one(pool)
        .await?;

    let is_new: bool = row.try_get("inserted")?;
    Ok(UpsertOutcome { is_new })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::alert::Severity;
    use serde_json::json;
    use sqlx::PgPool;

    fn alert(id: &str) -> NewAlert {
        NewAlert {
            alert_id: id.to_string(),
            title: "Tornado Warning issued for Travis County".to_string(),
            description: "Take cover now.".to_string(),
            severity: Severity::High,
            alert_type: "Tornado Warning".to_string(),
            source: "NOAA".to_string(),
            location_city: "Austin".to_string(),
            location_state: "TX".to_string(),
            start_time: None,
            end_time: None,
            metadata: json!({"urgency": "Immediate"}),
        }
    }

    #[sqlx::test]
    async fn upsert_is_new_exactly_once(pool: PgPool) {
        let first = upsert_alert(&pool, &alert("urn:oid:1")).await.unwrap();
        assert!(first.is_new);

        let second = upsert_alert(&pool, &alert("urn:oid:1")).await.unwrap();
        assert!(!second.is_new);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM weather_alerts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    async fn concurrent_upserts_of_one_alert_yield_one_insert(pool: PgPool) {
        let a = alert("urn:oid:2");
        let (r1, r2, r3) = tokio::join!(
            upsert_alert(&pool, &a),
            upsert_alert(&pool, &a),
            upsert_alert(&pool, &a),
        );
        let outcomes = [r1.unwrap(), r2.unwrap(), r3.unwrap()];

        assert_eq!(outcomes.iter().filter(|o| o.is_new).count(), 1);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM weather_alerts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    async fn update_refreshes_content_without_resurrecting(pool: PgPool) {
        upsert_alert(&pool, &alert("urn:oid:3")).await.unwrap();
        sqlx::query("UPDATE weather_alerts SET is_active = FALSE WHERE alert_id = $1")
            .bind("urn:oid:3")
            .execute(&pool)
            .await
            .unwrap();

        let mut refreshed = alert("urn:oid:3");
        refreshed.title = "Updated headline".to_string();
        let outcome = upsert_alert(&pool, &refreshed).await.unwrap();
        assert!(!outcome.is_new);

        let row =
            sqlx::query("SELECT title, is_active FROM weather_alerts WHERE alert_id = $1")
                .bind("urn:oid:3")
                .fetch_one(&pool)
                .await
                .unwrap();
        let title: String = row.try_get("title").unwrap();
        let is_active: bool = row.try_get("is_active").unwrap();
        assert_eq!(title, "Updated headline");
        // a late feed echo must not revive a deactivated alert
        assert!(!is_active);
    }
}
