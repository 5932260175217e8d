pub mod ordering;
pub mod telegram;
pub mod traits;

pub use ordering::UserTurns;
pub use telegram::TelegramChannel;
pub use traits::{Channel, InboundEvent, MessageId, OutboundDocument, PDF_MIME_TYPE};

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::render::create_renderer;
use crate::sessions::create_session_store;

/// Inbound events buffered between the listener and the dispatcher.
const EVENT_QUEUE_CAPACITY: usize = 100;

/// Build the Telegram channel and run the bot until Ctrl-C.
pub async fn start_channels(config: Config) -> Result<()> {
    let token = config.require_bot_token()?.to_string();
    let telegram = Arc::new(TelegramChannel::new(token, &config.telegram)?);

    let username = match telegram.bot_username().await {
        Ok(username) => {
            tracing::info!("Connected to Telegram as @{username}");
            Some(username)
        }
        Err(e) => {
            tracing::warn!("Telegram health check failed, polling anyway: {e:#}");
            None
        }
    };

    let renderer = Arc::new(create_renderer(&config.renderer)?);
    let store = create_session_store(config.sessions.limits());
    tracing::info!(
        store = store.name(),
        engine = renderer.engine_name(),
        timeout_secs = renderer.timeout().as_secs(),
        "Renderer ready"
    );

    let channel: Arc<dyn Channel> = telegram;
    let mut dispatcher = Dispatcher::new(
        store,
        renderer,
        Arc::clone(&channel),
        config.renderer.document_name.clone(),
    );
    if let Some(username) = username {
        dispatcher = dispatcher.with_bot_username(username);
    }
    let dispatcher = Arc::new(dispatcher);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    run_event_loop(channel, dispatcher, shutdown).await
}

/// Pump events from `channel` into `dispatcher`, one task per event, until
/// the listener stops or `shutdown` resolves. Events from one user are
/// handled strictly in arrival order; different users run concurrently.
/// In-flight events are allowed to finish before returning.
pub async fn run_event_loop(
    channel: Arc<dyn Channel>,
    dispatcher: Arc<Dispatcher>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<InboundEvent>(EVENT_QUEUE_CAPACITY);

    let listener = {
        let channel = Arc::clone(&channel);
        tokio::spawn(async move { channel.listen(tx).await })
    };

    let mut in_flight = JoinSet::new();
    let mut turns = UserTurns::default();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let mut turn = turns.next(&event.user);
                let dispatcher = Arc::clone(&dispatcher);
                in_flight.spawn(async move {
                    turn.wait().await;
                    let user = event.user.clone();
                    let outcome = dispatcher.dispatch(event).await;
                    tracing::debug!(user = %user, ?outcome, "event handled");
                    drop(turn);
                });
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!("Event task panicked: {e}");
                }
            }
            () = &mut shutdown => {
                tracing::info!("Shutdown requested, stopping {} listener", channel.name());
                break;
            }
        }
    }

    listener.abort();
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Event task panicked: {e}");
        }
    }

    match listener.await {
        Ok(result) => result.with_context(|| format!("{} listener failed", channel.name())),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(anyhow::anyhow!("{} listener panicked: {e}", channel.name())),
    }
}

/// Check that the configured bot token is accepted by Telegram.
pub async fn doctor_channels(config: Config) -> Result<()> {
    let token = config.require_bot_token()?.to_string();
    let telegram = TelegramChannel::new(token, &config.telegram)?;

    println!("mdpdf doctor");
    println!();
    println!("  API:        {}", config.telegram.api_base_url);
    match telegram.bot_username().await {
        Ok(username) => {
            println!("  Telegram:   ok (@{username})");
            Ok(())
        }
        Err(e) => {
            println!("  Telegram:   FAILED");
            Err(e.context("Telegram health check failed"))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingChannel;
    use super::*;
    use crate::dispatch::replies;
    use crate::render::testing::{renderer_with, EchoEngine};
    use crate::sessions::{SessionLimits, UserId};
    use chrono::Utc;
    use std::time::Duration;

    fn event(user: &str, text: &str) -> InboundEvent {
        InboundEvent {
            user: UserId::new(user),
            chat_id: user.to_string(),
            message_id: None,
            text: text.to_string(),
            channel: "recording".to_string(),
            received_at: Utc::now(),
        }
    }

    fn dispatcher_for(channel: &Arc<RecordingChannel>) -> Arc<Dispatcher> {
        let renderer = renderer_with(Arc::new(EchoEngine::default()), Duration::from_secs(5));
        Arc::new(Dispatcher::new(
            create_session_store(SessionLimits::default()),
            Arc::new(renderer),
            Arc::clone(channel) as Arc<dyn Channel>,
            "out.pdf",
        ))
    }

    #[tokio::test]
    async fn event_loop_handles_every_event_then_stops() {
        let channel = Arc::new(RecordingChannel::with_inbound(vec![
            event("1", "/start"),
            event("2", "# Alpha"),
            event("3", "/status"),
        ]));
        let dispatcher = dispatcher_for(&channel);

        run_event_loop(
            Arc::clone(&channel) as Arc<dyn Channel>,
            Arc::clone(&dispatcher),
            std::future::pending(),
        )
        .await
        .unwrap();

        let texts = channel.texts();
        assert_eq!(texts.len(), 3);
        assert!(texts.iter().any(|t| t.contains("Fragment #1")));
        assert!(texts.iter().any(|t| t == replies::status_empty()));
        assert_eq!(dispatcher.store().count(&UserId::new("2")), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn event_loop_keeps_fragment_order_per_user() {
        let events = (0..150).map(|i| event("9", &format!("f{i}"))).collect();
        let channel = Arc::new(RecordingChannel::with_inbound(events));
        let dispatcher = dispatcher_for(&channel);

        run_event_loop(
            Arc::clone(&channel) as Arc<dyn Channel>,
            Arc::clone(&dispatcher),
            std::future::pending(),
        )
        .await
        .unwrap();

        let expected = (0..150)
            .map(|i| format!("f{i}"))
            .collect::<Vec<_>>()
            .join("\n\n");
        let snapshot = dispatcher.store().snapshot(&UserId::new("9")).unwrap();
        assert_eq!(snapshot.count, 150);
        assert_eq!(snapshot.joined, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn convert_sees_every_earlier_fragment() {
        let mut events = Vec::new();
        for i in 0..40 {
            events.push(event("9", &format!("alpha{i}")));
            events.push(event("9", &format!("beta{i}")));
            events.push(event("9", "/convert"));
        }
        // A second user interleaved to keep the loop concurrent.
        events.push(event("5", "other"));

        let channel = Arc::new(RecordingChannel::with_inbound(events));
        let dispatcher = dispatcher_for(&channel);

        run_event_loop(
            Arc::clone(&channel) as Arc<dyn Channel>,
            Arc::clone(&dispatcher),
            std::future::pending(),
        )
        .await
        .unwrap();

        let documents = channel.documents();
        assert_eq!(documents.len(), 40);
        for (i, doc) in documents.iter().enumerate() {
            let html = String::from_utf8(doc.bytes.clone()).unwrap();
            assert!(html.contains(&format!("<p>alpha{i}</p>")), "document {i}");
            assert!(html.contains(&format!("<p>beta{i}</p>")), "document {i}");
            assert_eq!(doc.caption.as_deref(), Some("Converted 2 fragments."));
        }
        assert_eq!(dispatcher.store().count(&UserId::new("9")), 0);
        assert_eq!(dispatcher.store().count(&UserId::new("5")), 1);
    }

    #[tokio::test]
    async fn event_loop_stops_on_shutdown() {
        struct Silent;

        #[async_trait::async_trait]
        impl Channel for Silent {
            fn name(&self) -> &str {
                "silent"
            }
            async fn send_text(&self, _: &str, _: &str) -> Result<MessageId> {
                Ok(MessageId("0".into()))
            }
            async fn send_document(&self, _: &str, _: OutboundDocument) -> Result<()> {
                Ok(())
            }
            async fn delete_message(&self, _: &str, _: &MessageId) -> Result<()> {
                Ok(())
            }
            async fn listen(&self, _tx: mpsc::Sender<InboundEvent>) -> Result<()> {
                std::future::pending().await
            }
        }

        let recording = Arc::new(RecordingChannel::default());
        let dispatcher = dispatcher_for(&recording);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run_event_loop(Arc::new(Silent), dispatcher, async {}),
        )
        .await
        .expect("event loop should stop on shutdown");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn doctor_requires_token() {
        let err = doctor_channels(Config::default()).await.unwrap_err();
        assert!(err.to_string().to_lowercase().contains("token"));
    }

    #[tokio::test]
    async fn start_requires_token() {
        let err = start_channels(Config::default()).await.unwrap_err();
        assert!(err.to_string().to_lowercase().contains("token"));
    }
}
