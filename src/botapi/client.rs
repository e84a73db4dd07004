// SPDX-License-Identifier: MIT

//! Bot API client over HTTP.
//!
//! Wraps the handful of methods the bot needs: long polling, sending and
//! editing messages, and acknowledging callback queries. The API host can
//! be overridden with `BOT_API_URL` for local test servers.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use url::Url;

use super::error::TransportError;
use super::types::{Message, OutgoingMessage, Update, User};

const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Envelope every Bot API method responds with.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

pub struct BotClient {
    client: Client,
    base: Url,
}

impl BotClient {
    /// Create a client for the given bot token.
    ///
    /// Optionally uses `BOT_API_URL` to point at a different API host.
    pub fn new(token: &str) -> Result<Self, TransportError> {
        if token.is_empty() {
            return Err(TransportError::config("bot token must not be empty"));
        }
        let root = env::var("BOT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let base = Url::parse(&format!("{}/bot{}/", root.trim_end_matches('/'), token))?;

        // Long polls are held open server-side; keep the client timeout above
        // the poll timeout so the connection is not cut mid-poll.
        let client = Client::builder()
            .timeout(Duration::from_secs(70))
            .build()?;

        Ok(Self { client, base })
    }

    /// Create a client from the `BOT_TOKEN` environment variable.
    pub fn from_env() -> Result<Self, TransportError> {
        let token =
            env::var("BOT_TOKEN").map_err(|_| TransportError::config("BOT_TOKEN must be set"))?;
        Self::new(&token)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: Value,
    ) -> Result<T, TransportError> {
        let url = self.base.join(method)?;
        let response: ApiResponse<T> = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(TransportError::api(
                method,
                response
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        response
            .result
            .ok_or_else(|| TransportError::api(method, "response carried no result"))
    }

    pub async fn get_me(&self) -> Result<User, TransportError> {
        self.call("getMe", json!({})).await
    }

    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<(), TransportError> {
        let _: bool = self
            .call(
                "deleteWebhook",
                json!({ "drop_pending_updates": drop_pending_updates }),
            )
            .await?;
        Ok(())
    }

    /// Long-poll for updates. Blocks up to `timeout_secs` server-side.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError> {
        let mut payload = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }
        self.call("getUpdates", payload).await
    }

    pub async fn send_message(&self, message: &OutgoingMessage) -> Result<Message, TransportError> {
        self.call("sendMessage", serde_json::to_value(message)?).await
    }

    pub async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut payload = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            payload["text"] = json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_token() {
        assert!(matches!(
            BotClient::new(""),
            Err(TransportError::Config(_))
        ));
    }

    #[test]
    fn test_base_url_contains_token() {
        let client = BotClient::new("123:abc").unwrap();
        assert!(client.base.as_str().ends_with("/bot123:abc/"));
    }

    #[test]
    fn test_api_response_error_shape() {
        let raw = r#"{"ok": false, "description": "Unauthorized"}"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        assert!(!response.ok);
        assert_eq!(response.description.as_deref(), Some("Unauthorized"));
    }
}
