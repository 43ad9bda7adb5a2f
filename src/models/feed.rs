use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;

/// GeoJSON envelope returned by the alert feed for one geographic point.
#[derive(Debug, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub features: Vec<FeedFeature>,
}

#[derive(Debug, Deserialize)]
pub struct FeedFeature {
    pub properties: FeedAlert,
}

/// One raw alert as the feed reports it. Timestamps arrive as RFC 3339 with
/// arbitrary offsets; malformed ones are tolerated as None rather than
/// failing the whole body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedAlert {
    pub id: Option<String>,
    pub event: Option<String>,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub severity: Option<String>,
    pub urgency: Option<String>,
    pub certainty: Option<String>,
    pub area_desc: Option<String>,
    #[serde(default, deserialize_with = "parse_ts_option")]
    pub onset: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "parse_ts_option")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "parse_ts_option")]
    pub ends: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub other: HashMap<String, Value>,
}

impl FeedAlert {
    /// The validity window end: `ends` when present, else `expires`.
    pub fn window_end(&self) -> Option<DateTime<Utc>> {
        self.ends.or(self.expires)
    }
}

fn parse_ts_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let v: Option<String> = Option::deserialize(deserializer)?;
    Ok(v.and_then(|s| {
        DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }))
}
