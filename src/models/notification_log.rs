use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only audit row, one per dispatch attempt per user. Never read back
/// into dispatch decisions; statistics only.
#[derive(Debug, FromRow)]
#[allow(dead_code)]
pub struct NotificationLogEntry {
    pub id: i64,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub data: Option<Json<Value>>,
    pub success: bool,
    pub sent_at: DateTime<Utc>,
}
