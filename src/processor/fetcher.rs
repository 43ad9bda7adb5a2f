use crate::feed::AlertFeed;
use crate::models::feed::FeedAlert;
use crate::models::location::Location;
use futures::future::join_all;
use tracing::warn;

/// Fetches every location in fixed-size concurrency batches. All fetches in
/// one batch run concurrently; the next batch starts only once the whole
/// batch has resolved. The feed is rate-sensitive, so this caps simultaneous
/// outbound connections without a general worker pool.
///
/// A failing location (timeout, non-2xx, malformed body) is logged and
/// yields an empty alert list; it never aborts its siblings.
pub async fn fetch_all(
    feed: &dyn AlertFeed,
    locations: &[Location],
    batch_size: usize,
) -> Vec<(Location, Vec<FeedAlert>)> {
    let batch_size = batch_size.max(1);
    let mut results = Vec::with_capacity(locations.len());

    for batch in locations.chunks(batch_size) {
        let fetches = batch.iter().map(|location| async move {
            match feed.fetch_active(location).await {
                Ok(alerts) => (location.clone(), alerts),
                Err(e) => {
                    warn!(
                        "Feed fetch failed for {}, {}: {}",
                        location.location_city, location.location_state, e
                    );
                    (location.clone(), Vec::new())
                }
            }
        });
        results.extend(join_all(fetches).await);
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeFeed {
        // cities that should fail
        failing: Vec<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFeed {
        fn new(failing: &[&str]) -> Self {
            Self {
                failing: failing.iter().map(|s| s.to_string()).collect(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AlertFeed for FakeFeed {
        async fn fetch_active(&self, location: &Location) -> anyhow::Result<Vec<FeedAlert>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.calls
                .lock()
                .unwrap()
                .push(location.location_city.clone());

            if self.failing.contains(&location.location_city) {
                return Err(anyhow!("feed returned 503"));
            }
            Ok(vec![FeedAlert {
                id: Some(format!("alert-{}", location.location_city)),
                event: Some("Flood Warning".to_string()),
                ..Default::default()
            }])
        }
    }

    fn location(city: &str) -> Location {
        Location {
            location_city: city.to_string(),
            location_state: "TX".to_string(),
            latitude: 30.2672,
            longitude: -97.7431,
            user_count: 1,
        }
    }

    #[tokio::test]
    async fn failing_locations_do_not_abort_siblings() {
        let feed = FakeFeed::new(&["b", "d", "f"]);
        let locations: Vec<Location> =
            ["a", "b", "c", "d", "e", "f", "g"].iter().map(|c| location(c)).collect();

        let results = fetch_all(&feed, &locations, 5).await;

        assert_eq!(results.len(), 7);
        let with_alerts: Vec<&str> = results
            .iter()
            .filter(|(_, alerts)| !alerts.is_empty())
            .map(|(l, _)| l.location_city.as_str())
            .collect();
        assert_eq!(with_alerts, vec!["a", "c", "e", "g"]);
    }

    #[tokio::test]
    async fn all_locations_are_fetched_in_order_of_batches() {
        let feed = FakeFeed::new(&[]);
        let locations: Vec<Location> = (0..12).map(|i| location(&format!("c{}", i))).collect();

        let results = fetch_all(&feed, &locations, 5).await;

        assert_eq!(results.len(), 12);
        assert_eq!(feed.calls.lock().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_batch_size() {
        let feed = FakeFeed::new(&[]);
        let locations: Vec<Location> = (0..20).map(|i| location(&format!("c{}", i))).collect();

        fetch_all(&feed, &locations, 5).await;

        assert!(feed.max_in_flight.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test]
    async fn zero_batch_size_is_clamped() {
        let feed = FakeFeed::new(&[]);
        let results = fetch_all(&feed, &[location("a")], 0).await;
        assert_eq!(results.len(), 1);
    }
}
