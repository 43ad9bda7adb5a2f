use crate::db::{queries, DbPool};
use crate::models::device_token::{DeviceToken, Platform};
use anyhow::Result;
use serde_json::Value;
use sqlx::types::Json;
use uuid::Uuid;

/// Device registry persistence. The registration endpoint (HTTP layer, not
/// this service) writes here too, so every statement matches on the token
/// value itself rather than trusting any cached view.

pub async fn active_tokens_for_user(pool: &DbPool, user_id: Uuid) -> Result<Vec<DeviceToken>> {
    let tokens = sqlx::query_as::<_, DeviceToken>(queries::SELECT_ACTIVE_TOKENS_FOR_USER)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(tokens)
}

/// Upsert-by-token. Re-registering an existing token reassigns it to the
/// given user and reactivates it; devices get resold and reinstalled, so
/// tokens can legitimately move between accounts.
#[allow(dead_code)] // called from the registration endpoint's service layer
pub async fn register_token(
    pool: &DbPool,
    token: &str,
    user_id: Uuid,
    platform: Platform,
    device_info: Option<Value>,
) -> Result<()> {
    sqlx::query(queries::UPSERT_DEVICE_TOKEN)
        .bind(token)
        .bind(user_id)
        .bind(platform)
        .bind(device_info.map(Json))
        .execute(pool)
        .await?;
    Ok(())
}

/// Soft deactivation; rows are never deleted so re-registration can revive
/// them.
pub async fn deactivate_token(pool: &DbPool, token: &str) -> Result<()> {
    sqlx::query(queries::DEACTIVATE_DEVICE_TOKEN)
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Bumps last_used for tokens that just received a successful send, keeping
/// them clear of the staleness sweep.
pub async fn touch_tokens(pool: &DbPool, tokens: &[String]) -> Result<()> {
    sqlx::query(queries::TOUCH_DEVICE_TOKENS)
        .bind(tokens)
        .execute(pool)
        .await?;
    Ok(())
}
