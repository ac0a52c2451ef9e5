//! Telegram Bot API transport.
//!
//! Two endpoints are used: `sendMessage` (POST JSON) and `getUpdates` (GET with an
//! `offset` cursor). Network and HTTP-status failures are retried with exponential
//! backoff; an `ok: false` body is reported as `BridgeError::Api` without retrying.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use super::{InboundMessage, Transport};
use crate::config::TelegramCredentials;
use crate::errors::BridgeError;

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounded exponential backoff: waits `base_delay * 2^n` after failed attempt `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<Option<T>, BridgeError> {
        if self.ok {
            Ok(self.result)
        } else {
            Err(BridgeError::Api {
                description: self
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// HTTP transport for one bot.
#[derive(Debug, Clone)]
pub struct TelegramTransport {
    client: reqwest::Client,
    bot_url: String,
    retry: RetryPolicy,
}

impl TelegramTransport {
    pub fn new(api_base: &str, credentials: &TelegramCredentials) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            bot_url: format!(
                "{}/bot{}",
                api_base.trim_end_matches('/'),
                credentials.bot_token
            ),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.bot_url, method)
    }

    async fn retrying<T, F, Fut>(&self, method: &str, op: F) -> Result<T, BridgeError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, reqwest::Error>>,
    {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < attempts => {
                    tracing::warn!(method, attempt = attempt + 1, error = %e, "Request failed, retrying");
                    tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(BridgeError::Http {
                        attempts,
                        source: e,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), BridgeError> {
        let url = self.method_url("sendMessage");
        let body = SendMessageBody {
            chat_id,
            text,
            parse_mode: "HTML",
        };
        let (url, body) = (&url, &body);
        let response: ApiResponse<serde_json::Value> = self
            .retrying("sendMessage", || async move {
                self.client
                    .post(url)
                    .json(body)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await
            })
            .await?;
        response.into_result().map(|_| ())
    }

    async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<InboundMessage>, BridgeError> {
        let url = self.method_url("getUpdates");
        let url = &url;
        let response: ApiResponse<Vec<Update>> = self
            .retrying("getUpdates", || async move {
                let mut request = self.client.get(url);
                if let Some(offset) = offset {
                    request = request.query(&[("offset", offset)]);
                }
                request.send().await?.error_for_status()?.json().await
            })
            .await?;
        let updates = response.into_result()?.unwrap_or_default();
        Ok(updates
            .into_iter()
            .map(|u| {
                let (chat_id, text) = match u.message {
                    Some(m) => (Some(m.chat.id.to_string()), m.text),
                    None => (None, None),
                };
                InboundMessage {
                    update_id: u.update_id,
                    chat_id,
                    text,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.delay_after(0), Duration::from_secs(1));
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
    }

    #[test]
    fn test_method_url_includes_token() {
        let creds = TelegramCredentials {
            bot_token: "123:abc".into(),
            chat_id: "42".into(),
        };
        let transport = TelegramTransport::new("https://api.telegram.org/", &creds).unwrap();
        assert_eq!(
            transport.method_url("getUpdates"),
            "https://api.telegram.org/bot123:abc/getUpdates"
        );
    }

    #[test]
    fn test_api_error_body_maps_to_api_error() {
        let body: ApiResponse<Vec<Update>> =
            serde_json::from_str(r#"{"ok":false,"description":"Unauthorized"}"#).unwrap();
        match body.into_result() {
            Err(BridgeError::Api { description }) => assert_eq!(description, "Unauthorized"),
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_update_without_message_parses() {
        let body: ApiResponse<Vec<Update>> = serde_json::from_str(
            r#"{"ok":true,"result":[{"update_id":7},{"update_id":8,"message":{"chat":{"id":42},"text":"go"}}]}"#,
        )
        .unwrap();
        let updates = body.into_result().unwrap().unwrap();
        assert_eq!(updates.len(), 2);
        assert!(updates[0].message.is_none());
        assert_eq!(updates[1].message.as_ref().unwrap().chat.id, 42);
    }
}
