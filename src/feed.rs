use crate::config::AppConfig;
use crate::models::feed::{FeedAlert, FeedResponse};
use crate::models::location::Location;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// The external alert feed, queried by geographic point. Kept behind a trait
/// so the fetch pipeline can run against a fake in tests.
#[async_trait]
pub trait AlertFeed: Send + Sync {
    async fn fetch_active(&self, location: &Location) -> Result<Vec<FeedAlert>>;
}

/// NWS-style feed client. The feed requires an identifying User-Agent and is
/// rate-sensitive, so every request carries the configured header and a hard
/// timeout.
pub struct NwsFeedClient {
    client: reqwest::Client,
    base_url: String,
}

impl NwsFeedClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.feed_timeout_secs))
            .user_agent(config.feed_user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: config.feed_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AlertFeed for NwsFeedClient {
    async fn fetch_active(&self, location: &Location) -> Result<Vec<FeedAlert>> {
        let url = format!(
            "{}/alerts/active?point={:.4},{:.4}",
            self.base_url, location.latitude, location.longitude
        );
        debug!(
            "Fetching alerts for {}, {} ({})",
            location.location_city, location.location_state, url
        );

        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/geo+json")
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(anyhow!(
                "feed returned {} for {}, {}",
                resp.status(),
                location.location_city,
                location.location_state
            ));
        }

        let body: FeedResponse = resp.json().await?;
        Ok(body.features.into_iter().map(|f| f.properties).collect())
    }
}
