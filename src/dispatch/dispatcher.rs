//! Dispatcher — routes inbound events to user sessions and persists the
//! collection after every state change.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::channels::{Channel, InboundEvent, InboundKind, OutboundEvent};
use crate::conversation::{UiHint, prompts};
use crate::error::ChannelError;
use crate::store::{SessionCollection, SnapshotStore};

use super::registry::SessionRegistry;

/// Command names understood by the dispatcher.
pub mod commands {
    pub const START: &str = "start";
    pub const SHOW_DATA: &str = "show_data";
}

pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    store: Arc<SnapshotStore>,
}

impl Dispatcher {
    pub fn new(registry: Arc<SessionRegistry>, store: Arc<SnapshotStore>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Process one inbound event.
    ///
    /// Returns `None` when there is nothing to send back (blank text). The
    /// registry lock is held until the snapshot has been written, so
    /// snapshots reach disk in the order events were processed.
    pub async fn handle(&self, event: &InboundEvent) -> Option<OutboundEvent> {
        let user_id = event.user_id;
        let mut guard = self.registry.lock().await;

        let (response, mutated) = match &event.kind {
            InboundKind::Command(name) => match name.as_str() {
                commands::START => {
                    let reply = guard.get_or_create(user_id).on_greet();
                    (OutboundEvent::new(reply, UiHint::ShowKeyboard), true)
                }
                commands::SHOW_DATA => {
                    let reply = guard.get_or_create(user_id).on_show_facts();
                    (OutboundEvent::text(reply), false)
                }
                other => {
                    debug!(user_id, command = other, "Unknown command");
                    (OutboundEvent::text(prompts::UNKNOWN_COMMAND), false)
                }
            },
            InboundKind::Text(content) => {
                if content.trim().is_empty() {
                    return None;
                }
                let session = guard.get_or_create(user_id);
                let reply = session.on_text(content);
                debug!(user_id, state = %session.state, "Text processed");
                if reply.finished {
                    info!(user_id, facts = session.facts.len(), "Conversation finished");
                }
                (OutboundEvent::new(reply.text, reply.ui_hint), true)
            }
        };

        if mutated {
            self.persist(guard.sessions()).await;
        }

        Some(response)
    }

    /// Write the full collection. Failures are logged; the in-memory state
    /// stays authoritative and the next mutating event writes again.
    async fn persist(&self, sessions: &SessionCollection) {
        if let Err(e) = self.store.save(sessions).await {
            error!(
                path = %self.store.path().display(),
                error = %e,
                "Failed to persist sessions"
            );
        }
    }

    /// Pull events from `channel` one at a time until its stream ends.
    pub async fn run(&self, channel: &dyn Channel) -> Result<(), ChannelError> {
        let mut stream = channel.start().await?;
        info!(channel = channel.name(), "Dispatcher started");

        while let Some(event) = stream.next().await {
            let Some(response) = self.handle(&event).await else {
                continue;
            };
            if let Err(e) = channel.respond(&event, response).await {
                warn!(
                    channel = channel.name(),
                    user_id = event.user_id,
                    error = %e,
                    "Failed to deliver reply"
                );
            }
        }

        info!(channel = channel.name(), "Inbound stream ended");
        channel.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::channels::MessageStream;
    use crate::conversation::ConversationState;

    fn test_dispatcher() -> (Dispatcher, Arc<SnapshotStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SnapshotStore::new(dir.path().join("state.json")));
        let dispatcher = Dispatcher::new(Arc::new(SessionRegistry::new()), Arc::clone(&store));
        (dispatcher, store, dir)
    }

    fn command(user_id: i64, name: &str) -> InboundEvent {
        InboundEvent::new("test", user_id, InboundKind::Command(name.into()))
    }

    fn text(user_id: i64, content: &str) -> InboundEvent {
        InboundEvent::new("test", user_id, InboundKind::Text(content.into()))
    }

    #[tokio::test]
    async fn start_greets_and_shows_keyboard() {
        let (dispatcher, store, _dir) = test_dispatcher();
        let response = dispatcher.handle(&command(1, "start")).await.unwrap();
        assert_eq!(response.ui_hint, UiHint::ShowKeyboard);
        assert!(response.reply.contains("I will hold a more complex conversation"));
        // Greeting counts as a state change.
        assert!(store.path().exists());
    }

    #[tokio::test]
    async fn show_data_does_not_persist() {
        let (dispatcher, store, _dir) = test_dispatcher();
        let response = dispatcher.handle(&command(1, "show_data")).await.unwrap();
        assert_eq!(response.ui_hint, UiHint::None);
        assert!(response.reply.starts_with("This is what you already told me:"));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn unknown_command_gets_static_reply() {
        let (dispatcher, store, _dir) = test_dispatcher();
        let response = dispatcher.handle(&command(1, "dance")).await.unwrap();
        assert_eq!(response, OutboundEvent::text("Unknown command."));
        assert!(!store.path().exists());
        assert!(dispatcher.registry().is_empty().await);
    }

    #[tokio::test]
    async fn blank_text_is_ignored() {
        let (dispatcher, store, _dir) = test_dispatcher();
        assert!(dispatcher.handle(&text(1, "")).await.is_none());
        assert!(dispatcher.handle(&text(1, "   ")).await.is_none());
        assert!(!store.path().exists());
        assert!(dispatcher.registry().is_empty().await);
    }

    #[tokio::test]
    async fn text_updates_session_and_snapshot() {
        let (dispatcher, store, _dir) = test_dispatcher();
        dispatcher.handle(&command(9, "start")).await;
        dispatcher.handle(&text(9, "Age")).await;
        let response = dispatcher.handle(&text(9, "30")).await.unwrap();
        assert_eq!(response.ui_hint, UiHint::ShowKeyboard);

        let on_disk = store.load().await.unwrap();
        assert_eq!(on_disk[&9].facts.get("age").map(String::as_str), Some("30"));
        assert_eq!(on_disk, dispatcher.registry().snapshot().await);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let (dispatcher, _store, _dir) = test_dispatcher();
        dispatcher.handle(&text(1, "Age")).await;
        dispatcher.handle(&text(2, "Favourite colour")).await;
        dispatcher.handle(&text(1, "30")).await;

        let one = dispatcher.registry().get_or_create(1).await;
        let two = dispatcher.registry().get_or_create(2).await;
        assert_eq!(one.facts.get("age").map(String::as_str), Some("30"));
        assert_eq!(two.pending_category(), Some("favourite colour"));
        assert!(two.facts.is_empty());
    }

    #[tokio::test]
    async fn done_removes_keyboard() {
        let (dispatcher, _store, _dir) = test_dispatcher();
        let response = dispatcher.handle(&text(3, "Done")).await.unwrap();
        assert_eq!(response.ui_hint, UiHint::RemoveKeyboard);
        assert_eq!(
            dispatcher.registry().get_or_create(3).await.state,
            ConversationState::Terminated
        );
    }

    #[tokio::test]
    async fn persist_failure_does_not_lose_state() {
        let dir = TempDir::new().unwrap();
        // The snapshot's parent is a regular file, so every save fails.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let store = Arc::new(SnapshotStore::new(blocker.join("state.json")));
        let dispatcher = Dispatcher::new(Arc::new(SessionRegistry::new()), Arc::clone(&store));

        dispatcher.handle(&text(1, "Age")).await.unwrap();
        let response = dispatcher.handle(&text(1, "30")).await.unwrap();
        assert!(response.reply.contains("age - 30"));
        assert_eq!(
            dispatcher
                .registry()
                .get_or_create(1)
                .await
                .facts
                .get("age")
                .map(String::as_str),
            Some("30")
        );

        // Once the path is writable again the next save carries everything.
        std::fs::remove_file(&blocker).unwrap();
        dispatcher.handle(&text(1, "Favourite colour")).await.unwrap();
        dispatcher.handle(&text(1, "Blue")).await.unwrap();

        let on_disk = store.load().await.unwrap();
        let facts = &on_disk[&1].facts;
        assert_eq!(facts.get("age").map(String::as_str), Some("30"));
        assert_eq!(facts.get("favourite colour").map(String::as_str), Some("blue"));
    }

    /// Channel fed from a fixed list that records every reply.
    struct ScriptedChannel {
        events: Vec<InboundEvent>,
        sent: Mutex<Vec<OutboundEvent>>,
    }

    #[async_trait]
    impl Channel for ScriptedChannel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            Ok(Box::pin(futures::stream::iter(self.events.clone())))
        }

        async fn respond(
            &self,
            _msg: &InboundEvent,
            response: OutboundEvent,
        ) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(response);
            Ok(())
        }

        async fn health_check(&self) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn run_replies_to_each_event_in_order() {
        let (dispatcher, _store, _dir) = test_dispatcher();
        let channel = ScriptedChannel {
            events: vec![
                command(5, "start"),
                text(5, ""),
                text(5, "Age"),
                text(5, "41"),
                command(5, "show_data"),
                text(5, "Done"),
            ],
            sent: Mutex::new(Vec::new()),
        };

        dispatcher.run(&channel).await.unwrap();

        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 5, "blank text gets no reply");
        assert_eq!(sent[0].ui_hint, UiHint::ShowKeyboard);
        assert!(sent[1].reply.contains("Your age?"));
        assert!(sent[3].reply.contains("age - 41"));
        assert_eq!(sent[4].ui_hint, UiHint::RemoveKeyboard);
    }
}
