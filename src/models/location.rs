use sqlx::FromRow;

/// One distinct subscriber location, grouped exactly on city/state and raw
/// coordinates. No geo-clustering: two users a fraction of a degree apart
/// count as two locations. That bounds feed-query volume cheaply at the cost
/// of the occasional redundant nearby query.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Location {
    pub location_city: String,
    pub location_state: String,
    pub latitude: f64,
    pub longitude: f64,
    pub user_count: i64,
}
