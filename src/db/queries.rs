// SQL for the engine. Every write is scoped to a single row by natural key
// (alert_id or token); the registration endpoint shares device_tokens with
// us, so token updates always match on the token value itself.

pub const UPSERT_ALERT: &str = r#"
INSERT INTO weather_alerts (
    alert_id, title, description, severity, alert_type, source,
    location_city, location_state, start_time, end_time, metadata,
    is_active, created_at, updated_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, TRUE, NOW(), NOW())
ON CONFLICT (alert_id) DO UPDATE
SET title = EXCLUDED.title,
    description = EXCLUDED.description,
    severity = EXCLUDED.severity,
    alert_type = EXCLUDED.alert_type,
    location_city = EXCLUDED.location_city,
    location_state = EXCLUDED.location_state,
    start_time = EXCLUDED.start_time,
    end_time = EXCLUDED.end_time,
    metadata = EXCLUDED.metadata,
    updated_at = NOW()
RETURNING (xmax = 0) AS inserted;
"#;

pub const SELECT_TOP_ACTIVE_LOCATIONS: &str = r#"
SELECT location_city, location_state, latitude, longitude, COUNT(*) AS user_count
FROM users
WHERE is_active
  AND location_city IS NOT NULL
  AND location_state IS NOT NULL
  AND latitude IS NOT NULL
  AND longitude IS NOT NULL
GROUP BY location_city, location_state, latitude, longitude
ORDER BY user_count DESC
LIMIT $1;
"#;

pub const SELECT_USERS_AT_LOCATION: &str = r#"
SELECT id FROM users
WHERE is_active AND location_city = $1 AND location_state = $2;
"#;

pub const SELECT_ACTIVE_TOKENS_FOR_USER: &str = r#"
SELECT token, user_id, platform, device_info, is_active, last_used, created_at
FROM device_tokens
WHERE user_id = $1 AND is_active;
"#;

pub const UPSERT_DEVICE_TOKEN: &str = r#"
INSERT INTO device_tokens (token, user_id, platform, device_info, is_active, last_used, created_at)
VALUES ($1, $2, $3, $4, TRUE, NOW(), NOW())
ON CONFLICT (token) DO UPDATE
SET user_id = $2,
    platform = $3,
    device_info = $4,
    is_active = TRUE,
    last_used = NOW();
"#;

pub const DEACTIVATE_DEVICE_TOKEN: &str = r#"
UPDATE device_tokens SET is_active = FALSE WHERE token = $1;
"#;

pub const TOUCH_DEVICE_TOKENS: &str = r#"
UPDATE device_tokens SET last_used = NOW() WHERE token = ANY($1);
"#;

pub const INSERT_NOTIFICATION_LOG: &str = r#"
INSERT INTO notification_log (user_id, title, body, data, success, sent_at)
VALUES ($1, $2, $3, $4, $5, NOW());
"#;

pub const DEACTIVATE_EXPIRED_ALERTS: &str = r#"
UPDATE weather_alerts
SET is_active = FALSE, updated_at = NOW()
WHERE is_active AND end_time IS NOT NULL AND end_time < NOW();
"#;

pub const DELETE_RETIRED_ALERTS: &str = r#"
DELETE FROM weather_alerts
WHERE NOT is_active AND created_at < NOW() - make_interval(days => $1);
"#;

pub const DEACTIVATE_STALE_TOKENS: &str = r#"
UPDATE device_tokens
SET is_active = FALSE
WHERE is_active AND last_used < NOW() - make_interval(days => $1);
"#;
