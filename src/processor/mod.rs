pub mod dispatcher;
pub mod fetcher;
pub mod locations;
pub mod normalizer;
pub mod retention;
pub mod store;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::feed::AlertFeed;
use crate::models::alert::NewAlert;
use crate::push::PushGateway;
use crate::scheduler::{CycleSummary, PollCycle};
use anyhow::Result;
use async_trait::async_trait;
use dispatcher::NotificationContent;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

const MAX_BODY_CHARS: usize = 200;

/// One full poll cycle: aggregate locations, fetch the feed in bounded
/// batches, normalize and upsert each alert, fan out notifications for newly
/// seen high-severity alerts, then run the retention sweep.
pub struct PollEngine {
    pool: DbPool,
    feed: Arc<dyn AlertFeed>,
    gateway: Arc<dyn PushGateway>,
    config: AppConfig,
}

impl PollEngine {
    pub fn new(
        pool: DbPool,
        feed: Arc<dyn AlertFeed>,
        gateway: Arc<dyn PushGateway>,
        config: AppConfig,
    ) -> Self {
        Self {
            pool,
            feed,
            gateway,
            config,
        }
    }

    /// Store one alert and, when it is brand new and severe enough, notify
    /// every user at the location it was fetched for. Failures here are
    /// contained to this alert.
    async fn store_and_notify(&self, alert: &NewAlert, summary: &mut CycleSummary) {
        let outcome = match store::upsert_alert(&self.pool, alert).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Upsert failed for alert {}: {}", alert.alert_id, e);
                return;
            }
        };

        if outcome.is_new {
            summary.alerts_new += 1;
        } else {
            summary.alerts_updated += 1;
        }

        // One fan-out per alert lifetime, and only for high severity.
        if !outcome.is_new || !alert.severity.warrants_push() {
            return;
        }

        let users = match locations::users_at_location(
            &self.pool,
            &alert.location_city,
            &alert.location_state,
        )
        .await
        {
            Ok(users) => users,
            Err(e) => {
                warn!(
                    "User lookup failed for {}, {}: {}",
                    alert.location_city, alert.location_state, e
                );
                return;
            }
        };

        if users.is_empty() {
            return;
        }

        let content = notification_content(alert);
        let results = dispatcher::dispatch(
            &self.pool,
            self.gateway.as_ref(),
            &users,
            &content,
            self.config.dispatch_batch_size,
            self.config.max_tokens_per_send,
        )
        .await;

        summary.notifications_attempted += results.len();
        summary.notifications_delivered += results.iter().filter(|r| r.success).count();
        for r in results.iter().filter(|r| !r.success) {
            warn!(
                "User {} not notified for alert {}: {}",
                r.user_id,
                alert.alert_id,
                r.error.as_deref().unwrap_or("unknown")
            );
        }
    }
}

#[async_trait]
impl PollCycle for PollEngine {
    async fn run_cycle(&self) -> Result<CycleSummary> {
        let mut summary = CycleSummary::default();

        let locations =
            locations::top_active_locations(&self.pool, self.config.max_locations).await?;
        summary.locations_polled = locations.len();

        let fetched = fetcher::fetch_all(
            self.feed.as_ref(),
            &locations,
            self.config.fetch_batch_size,
        )
        .await;

        for (location, raw_alerts) in fetched {
            summary.alerts_fetched += raw_alerts.len();
            for raw in &raw_alerts {
                let Some(alert) = normalizer::normalize(raw, &location) else {
                    warn!(
                        "Skipping alert without usable id from {}, {}",
                        location.location_city, location.location_state
                    );
                    continue;
                };
                self.store_and_notify(&alert, &mut summary).await;
            }
        }

        let sweep = retention::sweep(
            &self.pool,
            self.config.alert_retention_days,
            self.config.token_stale_days,
        )
        .await?;
        summary.alerts_deactivated = sweep.alerts_deactivated;
        summary.alerts_deleted = sweep.alerts_deleted;
        summary.tokens_deactivated = sweep.tokens_deactivated;

        info!(
            "Cycle complete: {} locations, {} alerts fetched ({} new, {} updated), {} notifications ({} delivered), retention {}/{}/{}",
            summary.locations_polled,
            summary.alerts_fetched,
            summary.alerts_new,
            summary.alerts_updated,
            summary.notifications_attempted,
            summary.notifications_delivered,
            summary.alerts_deactivated,
            summary.alerts_deleted,
            summary.tokens_deactivated
        );

        Ok(summary)
    }
}

fn notification_content(alert: &NewAlert) -> NotificationContent {
    let mut body: String = alert.description.chars().take(MAX_BODY_CHARS).collect();
    if body.is_empty() {
        body = alert.title.clone();
    }

    let mut data = HashMap::new();
    data.insert("alertId".to_string(), alert.alert_id.clone());
    data.insert("severity".to_string(), alert.severity.as_str().to_string());
    data.insert("alertType".to_string(), alert.alert_type.clone());

    NotificationContent {
        title: alert.title.clone(),
        body,
        data,
    }
}
