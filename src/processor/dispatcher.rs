use crate::db::{queries, DbPool};
use crate::push::{PushGateway, PushNotification};
use crate::registry;
use anyhow::Result;
use futures::future::join_all;
use serde_json::json;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
}

/// Per-user outcome. Failures are captured here, never raised across the
/// fan-out boundary.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub user_id: Uuid,
    pub success: bool,
    pub error: Option<String>,
}

/// What one user's token fan-out produced.
#[derive(Debug, Default)]
pub struct TokenSendReport {
    pub delivered: Vec<String>,
    pub dead: Vec<String>,
    pub transient_failures: usize,
}

/// Fans a notification out to every target user, in bounded concurrent
/// batches. Each user is handled independently: no token, a gateway error,
/// or an audit failure for one user never aborts the rest.
pub async fn dispatch(
    pool: &DbPool,
    gateway: &dyn PushGateway,
    user_ids: &[Uuid],
    content: &NotificationContent,
    batch_size: usize,
    max_tokens_per_send: usize,
) -> Vec<DispatchResult> {
    let batch_size = batch_size.max(1);
    let mut results = Vec::with_capacity(user_ids.len());

    for batch in user_ids.chunks(batch_size) {
        let sends = batch
            .iter()
            .map(|&user_id| dispatch_user(pool, gateway, user_id, content, max_tokens_per_send));
        results.extend(join_all(sends).await);
    }

    let delivered = results.iter().filter(|r| r.success).count();
    info!(
        "Dispatched \"{}\" to {} users ({} delivered)",
        content.title,
        user_ids.len(),
        delivered
    );

    results
}

async fn dispatch_user(
    pool: &DbPool,
    gateway: &dyn PushGateway,
    user_id: Uuid,
    content: &NotificationContent,
    max_tokens_per_send: usize,
) -> DispatchResult {
    let tokens = match registry::active_tokens_for_user(pool, user_id).await {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!("Token lookup failed for user {}: {}", user_id, e);
            return audited_result(pool, user_id, content, false, Some(e.to_string())).await;
        }
    };

    if tokens.is_empty() {
        return audited_result(pool, user_id, content, false, Some("no_tokens".to_string())).await;
    }

    let token_values: Vec<String> = tokens.into_iter().map(|t| t.token).collect();
    let report = match send_to_tokens(gateway, &token_values, content, max_tokens_per_send).await {
        Ok(report) => report,
        Err(e) => {
            warn!("Push send failed for user {}: {}", user_id, e);
            return audited_result(pool, user_id, content, false, Some(e.to_string())).await;
        }
    };

    // Prune dead destinations immediately, one row per token.
    for token in &report.dead {
        match registry::deactivate_token(pool, token).await {
            Ok(()) => info!("Deactivated unregistered token for user {}", user_id),
            Err(e) => {
                warn!("Failed to deactivate dead token for user {}: {}", user_id, e);
            }
        }
    }

    if !report.delivered.is_empty() {
        if let Err(e) = registry::touch_tokens(pool, &report.delivered).await {
            warn!("Failed to bump last_used for user {}: {}", user_id, e);
        }
    }

    if report.transient_failures > 0 {
        // Transient provider errors: tokens stay active, next alert retries.
        warn!(
            "{} transient send failures for user {}",
            report.transient_failures, user_id
        );
    }

    let success = !report.delivered.is_empty();
    let error = (!success).then(|| "no_delivery".to_string());
    audited_result(pool, user_id, content, success, error).await
}

/// Sends one user's tokens through the gateway, chunked at the provider's
/// hard per-call ceiling, and folds the per-token outcomes into a single
/// report. Gateway-level errors propagate; per-token failures do not.
pub async fn send_to_tokens(
    gateway: &dyn PushGateway,
    tokens: &[String],
    content: &NotificationContent,
    max_tokens_per_send: usize,
) -> Result<TokenSendReport> {
    let notification = PushNotification {
        title: content.title.clone(),
        body: content.body.clone(),
    };

    let mut report = TokenSendReport::default();
    for chunk in tokens.chunks(max_tokens_per_send.max(1)) {
        let multicast = gateway
            .send_multicast(chunk, &notification, &content.data)
            .await?;
        for r in multicast.results {
            if r.delivered() {
                report.delivered.push(r.token);
            } else if r.is_permanent_failure() {
                report.dead.push(r.token);
            } else {
                report.transient_failures += 1;
            }
        }
    }

    Ok(report)
}

/// Writes the audit row and folds the outcome into a DispatchResult. An
/// audit write failure is logged but does not change the outcome.
async fn audited_result(
    pool: &DbPool,
    user_id: Uuid,
    content: &NotificationContent,
    success: bool,
    error: Option<String>,
) -> DispatchResult {
    let data = json!(content.data);
    if let Err(e) = sqlx::query(queries::INSERT_NOTIFICATION_LOG)
        .bind(user_id)
        .bind(&content.title)
        .bind(&content.body)
        .bind(sqlx::types::Json(&data))
        .bind(success)
        .execute(pool)
        .await
    {
        warn!("Failed to write notification audit for {}: {}", user_id, e);
    }

    DispatchResult {
        user_id,
        success,
        error,
    }
}
