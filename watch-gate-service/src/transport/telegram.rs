//! Telegram Bot API over long polling.

use super::{ChatTransport, InboundMessage, TransportError, Update};
use crate::config::TelegramConfig;
use crate::models::UserIdentity;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::time::Duration;

pub struct TelegramTransport {
    client: Client,
    api_base: String,
    token: Secret<String>,
    poll_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
    update_id: i64,
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    chat: RawChat,
    from: Option<RawUser>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: i64,
}

impl RawUpdate {
    fn into_update(self) -> Update {
        let message = self.message.and_then(|message| {
            let text = message.text?;
            let user_id = message.from.map(|from| from.id).unwrap_or(message.chat.id);
            Some(InboundMessage {
                chat_id: message.chat.id,
                user: UserIdentity::from(user_id),
                text,
            })
        });

        Update {
            update_id: self.update_id,
            message,
        }
    }
}

impl TelegramTransport {
    /// `http_timeout` bounds `sendMessage`; polls get the long-poll timeout
    /// on top of it.
    pub fn new(config: &TelegramConfig, http_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(http_timeout + Duration::from_secs(config.poll_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token.expose_secret(), method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            // The URL carries the bot token.
            .map_err(|e| TransportError::Connection(e.without_url().to_string()))?;

        let status = response.status();
        let parsed: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TransportError::Malformed(e.without_url().to_string()))?;

        if !status.is_success() || !parsed.ok {
            return Err(TransportError::Api {
                status: status.as_u16(),
                description: parsed.description.unwrap_or_default(),
            });
        }

        parsed
            .result
            .ok_or_else(|| TransportError::Malformed(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn poll(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        let raw: Vec<RawUpdate> = self
            .call(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": self.poll_timeout_secs,
                    "allowed_updates": ["message"],
                }),
            )
            .await?;

        Ok(raw.into_iter().map(RawUpdate::into_update).collect())
    }

    async fn send(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                json!({
                    "chat_id": chat_id,
                    "text": text,
                    "disable_web_page_preview": true,
                }),
            )
            .await?;
        Ok(())
    }
}
