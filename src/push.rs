use crate::config::AppConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
}

/// Outcome of one multicast call, per token. `error_code` is the provider's
/// failure string for tokens that were not delivered.
#[derive(Debug, Clone)]
pub struct TokenSendResult {
    pub token: String,
    pub message_id: Option<String>,
    pub error_code: Option<String>,
}

impl TokenSendResult {
    pub fn delivered(&self) -> bool {
        self.error_code.is_none()
    }

    /// Permanently dead destination: the registry entry should be
    /// deactivated. Transient codes leave the token alone.
    pub fn is_permanent_failure(&self) -> bool {
        matches!(
            self.error_code.as_deref(),
            Some("NotRegistered")
                | Some("InvalidRegistration")
                | Some("MismatchSenderId")
                | Some("UNREGISTERED")
                | Some("INVALID_ARGUMENT")
        )
    }
}

#[derive(Debug, Default)]
pub struct MulticastReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<TokenSendResult>,
}

/// Thin capability over the multicast push provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send_multicast(
        &self,
        tokens: &[String],
        notification: &PushNotification,
        data: &HashMap<String, String>,
    ) -> Result<MulticastReport>;

    /// Topic broadcast, used by the system-announcement path outside the
    /// poll cycle.
    #[allow(dead_code)]
    async fn send_to_topic(
        &self,
        topic: &str,
        notification: &PushNotification,
        data: &HashMap<String, String>,
    ) -> Result<String>;
}

#[derive(Serialize)]
struct MulticastRequest<'a> {
    registration_ids: &'a [String],
    notification: &'a PushNotification,
    data: &'a HashMap<String, String>,
}

#[derive(Serialize)]
struct TopicRequest<'a> {
    to: String,
    notification: &'a PushNotification,
    data: &'a HashMap<String, String>,
}

#[derive(Deserialize)]
struct FcmResponse {
    #[serde(default)]
    success: usize,
    #[serde(default)]
    failure: usize,
    #[serde(default)]
    results: Vec<FcmResult>,
    message_id: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct FcmResult {
    message_id: Option<String>,
    error: Option<String>,
}

/// FCM legacy HTTP client. Tokens are sent as `registration_ids`; the
/// response carries one result per token, in order.
pub struct FcmClient {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
}

impl FcmClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        if config.push_server_key.is_empty() {
            return Err(anyhow!("PUSH_SERVER_KEY is not set"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.push_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.push_endpoint.clone(),
            server_key: config.push_server_key.clone(),
        })
    }

    async fn post<B: Serialize>(&self, body: &B) -> Result<FcmResponse> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(anyhow!("push gateway returned {}", resp.status()));
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl PushGateway for FcmClient {
    async fn send_multicast(
        &self,
        tokens: &[String],
        notification: &PushNotification,
        data: &HashMap<String, String>,
    ) -> Result<MulticastReport> {
        let body = MulticastRequest {
            registration_ids: tokens,
            notification,
            data,
        };
        let resp = self.post(&body).await?;

        debug!(
            "Multicast to {} tokens: {} ok, {} failed",
            tokens.len(),
            resp.success,
            resp.failure
        );

        if resp.results.len() != tokens.len() {
            warn!(
                "Push gateway returned {} results for {} tokens",
                resp.results.len(),
                tokens.len()
            );
        }

        Ok(MulticastReport {
            success_count: resp.success,
            failure_count: resp.failure,
            results: fold_results(tokens, resp.results),
        })
    }

    async fn send_to_topic(
        &self,
        topic: &str,
        notification: &PushNotification,
        data: &HashMap<String, String>,
    ) -> Result<String> {
        let body = TopicRequest {
            to: format!("/topics/{}", topic),
            notification,
            data,
        };
        let resp = self.post(&body).await?;

        resp.message_id
            .map(message_id_string)
            .ok_or_else(|| anyhow!("push gateway returned no message id for topic {}", topic))
    }
}

/// Pairs tokens with the provider's per-token results, in order. A truncated
/// response must not lose outcomes: tokens without a matching result get a
/// synthetic transient error, so they are neither counted delivered nor
/// pruned.
fn fold_results(tokens: &[String], results: Vec<FcmResult>) -> Vec<TokenSendResult> {
    let mut results = results.into_iter();
    tokens
        .iter()
        .map(|token| match results.next() {
            Some(r) => TokenSendResult {
                token: token.clone(),
                message_id: r.message_id,
                error_code: r.error,
            },
            None => TokenSendResult {
                token: token.clone(),
                message_id: None,
                error_code: Some("MissingResult".to_string()),
            },
        })
        .collect()
}

/// The provider reports topic message ids as either a JSON string or a
/// number; return the bare value either way.
fn message_id_string(id: serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(token: &str, error: Option<&str>) -> TokenSendResult {
        TokenSendResult {
            token: token.to_string(),
            message_id: error.is_none().then(|| "mid-1".to_string()),
            error_code: error.map(str::to_string),
        }
    }

    #[test]
    fn unregistered_tokens_are_permanent_failures() {
        assert!(result("t1", Some("NotRegistered")).is_permanent_failure());
        assert!(result("t2", Some("InvalidRegistration")).is_permanent_failure());
        assert!(result("t3", Some("MismatchSenderId")).is_permanent_failure());
        assert!(result("t4", Some("UNREGISTERED")).is_permanent_failure());
    }

    #[test]
    fn transient_failures_are_not_permanent() {
        assert!(!result("t1", Some("Unavailable")).is_permanent_failure());
        assert!(!result("t2", Some("InternalServerError")).is_permanent_failure());
        assert!(!result("t3", None).is_permanent_failure());
    }

    #[test]
    fn delivered_means_no_error_code() {
        assert!(result("t1", None).delivered());
        assert!(!result("t1", Some("Unavailable")).delivered());
    }

    #[test]
    fn truncated_provider_response_keeps_every_token() {
        let tokens = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let results = vec![FcmResult {
            message_id: Some("1:0408".to_string()),
            error: None,
        }];

        let folded = fold_results(&tokens, results);

        assert_eq!(folded.len(), 3);
        assert!(folded[0].delivered());
        assert_eq!(folded[1].error_code.as_deref(), Some("MissingResult"));
        assert!(!folded[1].delivered());
        // unmatched tokens are transient, never pruned
        assert!(!folded[1].is_permanent_failure());
        assert!(!folded[2].is_permanent_failure());
    }

    #[test]
    fn message_ids_come_back_unquoted() {
        assert_eq!(message_id_string(serde_json::json!("abc-123")), "abc-123");
        assert_eq!(message_id_string(serde_json::json!(7234917)), "7234917");
    }

    #[test]
    fn fcm_response_parses_mixed_results() {
        let body = r#"
        {
            "multicast_id": 216,
            "success": 2,
            "failure": 1,
            "canonical_ids": 0,
            "results": [
                {"message_id": "1:0408"},
                {"error": "NotRegistered"},
                {"message_id": "1:0409"}
            ]
        }
        "#;
        let resp: FcmResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.success, 2);
        assert_eq!(resp.failure, 1);
        assert_eq!(resp.results.len(), 3);
        assert_eq!(resp.results[1].error.as_deref(), Some("NotRegistered"));
    }
}
