use std::sync::Arc;

use super::commands::Command;
use super::replies;
use crate::channels::{Channel, InboundEvent, OutboundDocument};
use crate::render::DocumentRenderer;
use crate::sessions::{SessionStore, UserId, UserLocks};

/// What handling one inbound event amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Informational reply only (start, help, unknown command).
    Replied,
    /// Fragment stored; `count` is the new total.
    Accumulated { count: usize },
    /// Status reported.
    Status { fragments: usize },
    /// Session discarded.
    Cancelled { discarded: usize },
    /// Convert requested with nothing pending.
    NothingToConvert,
    /// PDF delivered and the rendered fragments dropped.
    Converted { fragments: usize, bytes: usize },
    /// Rendering failed; session kept.
    RenderFailed,
    /// PDF rendered but the transport refused it; session kept.
    DeliveryFailed,
    /// Fragment not stored (empty or over a limit).
    Rejected,
    /// Command addressed to another bot; no reply sent.
    Ignored,
}

/// Routes inbound events to session and render operations.
pub struct Dispatcher {
    store: Arc<dyn SessionStore>,
    locks: UserLocks,
    renderer: Arc<DocumentRenderer>,
    channel: Arc<dyn Channel>,
    document_name: String,
    bot_username: Option<String>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn SessionStore>,
        renderer: Arc<DocumentRenderer>,
        channel: Arc<dyn Channel>,
        document_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            locks: UserLocks::new(),
            renderer,
            channel,
            document_name: document_name.into(),
            bot_username: None,
        }
    }

    /// Only accept `/command@suffix` forms naming this bot.
    #[must_use]
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Handle one event end to end, replying over the channel.
    pub async fn dispatch(&self, event: InboundEvent) -> DispatchOutcome {
        let command = Command::parse_for(&event.text, self.bot_username.as_deref());
        tracing::debug!(
            user = %event.user,
            channel = %event.channel,
            command = command.name(),
            "dispatching message"
        );

        let chat = event.chat_id.as_str();
        match command {
            Command::Start | Command::Help => {
                self.reply(chat, &replies::welcome()).await;
                DispatchOutcome::Replied
            }
            Command::Unknown(name) => {
                self.reply(chat, &replies::unknown_command(&name)).await;
                DispatchOutcome::Replied
            }
            Command::Text(text) => self.accumulate(&event.user, chat, &text).await,
            Command::Status => self.status(&event.user, chat).await,
            Command::Cancel => self.cancel(&event.user, chat).await,
            Command::Convert => self.convert(&event.user, chat).await,
            Command::ForOtherBot => DispatchOutcome::Ignored,
        }
    }

    async fn accumulate(&self, user: &UserId, chat: &str, text: &str) -> DispatchOutcome {
        match self.store.append(user, text) {
            Ok(count) => {
                tracing::debug!(user = %user, fragments = count, "fragment stored");
                self.reply(chat, &replies::fragment_received(count)).await;
                DispatchOutcome::Accumulated { count }
            }
            Err(e) => {
                tracing::info!(user = %user, "fragment rejected: {e}");
                self.reply(chat, &replies::rejected(&e)).await;
                DispatchOutcome::Rejected
            }
        }
    }

    async fn status(&self, user: &UserId, chat: &str) -> DispatchOutcome {
        match self.store.stats(user) {
            Some(stats) => {
                self.reply(chat, &replies::status(&stats)).await;
                DispatchOutcome::Status {
                    fragments: stats.fragments,
                }
            }
            None => {
                self.reply(chat, replies::status_empty()).await;
                DispatchOutcome::Status { fragments: 0 }
            }
        }
    }

    async fn cancel(&self, user: &UserId, chat: &str) -> DispatchOutcome {
        let discarded = {
            let _guard = self.locks.lock(user).await;
            let discarded = self.store.count(user);
            self.store.clear(user);
            discarded
        };

        tracing::info!(user = %user, fragments = discarded, "session cancelled");
        self.reply(chat, &replies::cancelled(discarded)).await;
        DispatchOutcome::Cancelled { discarded }
    }

    async fn convert(&self, user: &UserId, chat: &str) -> DispatchOutcome {
        let _guard = self.locks.lock(user).await;

        let Some(snapshot) = self.store.snapshot(user) else {
            self.reply(chat, replies::nothing_to_convert()).await;
            return DispatchOutcome::NothingToConvert;
        };
        let fragments = snapshot.count;

        let progress = match self
            .channel
            .send_text(chat, &replies::converting(fragments))
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(user = %user, "failed to send progress notice: {e:#}");
                None
            }
        };

        let rendered = self.renderer.render(&snapshot.joined).await;

        if let Some(id) = progress {
            if let Err(e) = self.channel.delete_message(chat, &id).await {
                tracing::debug!(user = %user, "failed to delete progress notice: {e:#}");
            }
        }

        let pdf = match rendered {
            Ok(pdf) => pdf,
            Err(e) => {
                tracing::error!(user = %user, fragments, "render failed: {e}");
                self.reply(chat, replies::render_failed()).await;
                return DispatchOutcome::RenderFailed;
            }
        };

        let bytes = pdf.len();
        let document = OutboundDocument::pdf(self.document_name.clone(), pdf)
            .with_caption(replies::converted_caption(fragments));

        if let Err(e) = self.channel.send_document(chat, document).await {
            tracing::warn!(user = %user, fragments, bytes, "document delivery failed: {e:#}");
            self.reply(chat, replies::delivery_failed()).await;
            return DispatchOutcome::DeliveryFailed;
        }

        self.store.commit(user, fragments);
        tracing::info!(user = %user, fragments, bytes, "document delivered");
        DispatchOutcome::Converted { fragments, bytes }
    }

    async fn reply(&self, chat: &str, text: &str) {
        if let Err(e) = self.channel.send_text(chat, text).await {
            tracing::warn!(
                channel = self.channel.name(),
                chat,
                "failed to send reply: {e:#}"
            );
        }
    }
}
