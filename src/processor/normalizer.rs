use crate::models::alert::{NewAlert, Severity};
use crate::models::feed::FeedAlert;
use crate::models::location::Location;
use serde_json::json;

const DEFAULT_SOURCE: &str = "NOAA";

/// Maps one raw feed alert plus the location it was fetched for into the
/// canonical record. Returns None when the alert carries no usable external
/// id, since without the dedup key it cannot be stored.
pub fn normalize(raw: &FeedAlert, location: &Location) -> Option<NewAlert> {
    let alert_id = raw.id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;

    let title = raw
        .headline
        .as_deref()
        .or(raw.event.as_deref())
        .unwrap_or("Weather Alert")
        .to_string();

    let alert_type = raw.event.as_deref().unwrap_or("Unknown").to_string();

    let metadata = json!({
        "urgency": raw.urgency,
        "certainty": raw.certainty,
        "areaDesc": raw.area_desc,
        "instruction": raw.instruction,
        "externalId": raw.id,
    });

    Some(NewAlert {
        alert_id: alert_id.to_string(),
        title,
        description: raw.description.clone().unwrap_or_default(),
        severity: Severity::from_feed(raw.severity.as_deref()),
        alert_type,
        source: DEFAULT_SOURCE.to_string(),
        location_city: location.location_city.clone(),
        location_state: location.location_state.clone(),
        start_time: raw.onset,
        end_time: raw.window_end(),
        metadata,
    })
}
