use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

/// Coarse severity taxonomy. Ordered so that the dispatch gate is a plain
/// comparison: anything `>= High` gets pushed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, sqlx::Type, Serialize, Deserialize,
)]
#[sqlx(type_name = "alert_severity", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    /// Total mapping from the feed's severity vocabulary. Unrecognized,
    /// empty, or missing values fall open to `Moderate` so a vocabulary
    /// change upstream never blocks storage.
    pub fn from_feed(raw: Option<&str>) -> Severity {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("extreme") => Severity::Critical,
            Some("severe") => Severity::High,
            Some("moderate") => Severity::Moderate,
            Some("minor") => Severity::Low,
            _ => Severity::Moderate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Moderate => "moderate",
            Severity::Low => "low",
        }
    }

    /// Only high-severity alerts trigger push fan-out; routine alerts are
    /// stored but stay quiet.
    pub fn warrants_push(&self) -> bool {
        *self >= Severity::High
    }
}

#[derive(Debug, FromRow)]
#[allow(dead_code)]
pub struct Alert {
    pub alert_id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub alert_type: String,
    pub source: String,
    pub location_city: String,
    pub location_state: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub metadata: Option<Json<Value>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Normalized alert ready for upsert, produced by the normalizer from one
/// raw feed entry plus the location it was fetched for.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub alert_id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub alert_type: String,
    pub source: String,
    pub location_city: String,
    pub location_state: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub metadata: Value,
}
