use anyhow::Context;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::time::Duration;

use super::traits::{Channel, InboundEvent, MessageId, OutboundDocument};
use crate::config::TelegramConfig;
use crate::sessions::UserId;

/// Delay before retrying after a failed `getUpdates` call.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Extra time on top of the long-poll timeout before the HTTP client gives up.
const HTTP_TIMEOUT_SLACK: Duration = Duration::from_secs(30);

/// Telegram channel that long-polls the Bot API for updates
pub struct TelegramChannel {
    bot_token: String,
    api_base_url: String,
    poll_timeout_secs: u64,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: String, config: &TelegramConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs) + HTTP_TIMEOUT_SLACK)
            .build()
            .context("Failed to build Telegram HTTP client")?;

        Ok(Self {
            bot_token,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            poll_timeout_secs: config.poll_timeout_secs,
            client,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base_url, self.bot_token)
    }

    /// Check the HTTP status and the Bot API `ok` flag; return `result`.
    async fn into_result(method: &str, resp: reqwest::Response) -> anyhow::Result<Value> {
        let status = resp.status();
        if !status.is_success() {
            let err = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram {method} failed ({status}): {err}");
        }

        let data: Value = resp
            .json()
            .await
            .with_context(|| format!("Telegram {method} returned invalid JSON"))?;
        if data.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = data
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            anyhow::bail!("Telegram {method} failed: {description}");
        }
        Ok(data.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn call(&self, method: &str, body: &Value) -> anyhow::Result<Value> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Telegram {method} request failed"))?;
        Self::into_result(method, resp).await
    }

    /// Name of the bot behind the token (`getMe`).
    pub async fn bot_username(&self) -> anyhow::Result<String> {
        let me = self.call("getMe", &serde_json::json!({})).await?;
        me.get("username")
            .and_then(Value::as_str)
            .map(str::to_string)
            .context("getMe response has no username")
    }
}

/// Turn one `getUpdates` entry into an inbound event.
///
/// Only text messages with a sender are accepted; photos, stickers, edits
/// and everything else are ignored.
pub fn parse_update(update: &Value) -> Option<InboundEvent> {
    let message = update.get("message")?;
    let text = message.get("text").and_then(Value::as_str)?;

    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)?;
    let user_id = message
        .get("from")
        .and_then(|f| f.get("id"))
        .and_then(Value::as_i64)?;
    let message_id = message
        .get("message_id")
        .and_then(Value::as_i64)
        .map(|id| MessageId(id.to_string()));
    let received_at = message
        .get("date")
        .and_then(Value::as_i64)
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or_else(Utc::now);

    Some(InboundEvent {
        user: UserId::new(user_id.to_string()),
        chat_id: chat_id.to_string(),
        message_id,
        text: text.to_string(),
        channel: "telegram".to_string(),
        received_at,
    })
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> anyhow::Result<MessageId> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let sent = self.call("sendMessage", &body).await?;
        let id = sent
            .get("message_id")
            .and_then(Value::as_i64)
            .context("sendMessage response has no message_id")?;
        Ok(MessageId(id.to_string()))
    }

    async fn send_document(
        &self,
        chat_id: &str,
        document: OutboundDocument,
    ) -> anyhow::Result<()> {
        let size = document.bytes.len();
        let part = Part::bytes(document.bytes)
            .file_name(document.file_name.clone())
            .mime_str(document.mime_type)
            .context("Invalid document MIME type")?;

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);

        if let Some(caption) = document.caption {
            form = form.text("caption", caption);
        }

        let resp = self
            .client
            .post(self.api_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .context("Telegram sendDocument request failed")?;
        Self::into_result("sendDocument", resp).await?;

        tracing::info!(
            chat = chat_id,
            file = %document.file_name,
            bytes = size,
            "Telegram document sent"
        );
        Ok(())
    }

    async fn delete_message(&self, chat_id: &str, message: &MessageId) -> anyhow::Result<()> {
        let message_id: i64 = message
            .0
            .parse()
            .with_context(|| format!("Invalid Telegram message id: {message}"))?;
        let body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
        });
        self.call("deleteMessage", &body).await?;
        Ok(())
    }

    async fn listen(&self, tx: tokio::sync::mpsc::Sender<InboundEvent>) -> anyhow::Result<()> {
        let mut offset: i64 = 0;

        tracing::info!("Telegram channel listening for messages...");

        loop {
            let body = serde_json::json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message"],
            });

            let updates = match self.call("getUpdates", &body).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!("Telegram poll error: {e:#}");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            let Some(updates) = updates.as_array() else {
                continue;
            };

            for update in updates {
                // Advance offset past this update
                if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                    offset = uid + 1;
                }

                let Some(event) = parse_update(update) else {
                    tracing::debug!("Ignoring non-text Telegram update");
                    continue;
                };

                if tx.send(event).await.is_err() {
                    return Ok(());
                }
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.bot_username().await.is_ok()
    }
}
