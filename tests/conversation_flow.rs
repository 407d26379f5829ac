//! End-to-end conversation tests.
//!
//! Each test drives a real `Dispatcher` backed by a snapshot file in a temp
//! directory, then restarts from that file to check what survived.

use std::sync::Arc;

use tempfile::TempDir;

use factbot::channels::{InboundEvent, OutboundEvent};
use factbot::conversation::{ConversationState, UiHint};
use factbot::dispatch::{Dispatcher, SessionRegistry};
use factbot::error::StoreError;
use factbot::store::SnapshotStore;

/// Build a dispatcher over whatever snapshot is already at `dir/state.json`.
async fn boot(dir: &TempDir) -> Dispatcher {
    let store = Arc::new(SnapshotStore::new(dir.path().join("state.json")));
    let sessions = store.load().await.expect("snapshot should load");
    Dispatcher::new(Arc::new(SessionRegistry::from_sessions(sessions)), store)
}

async fn send(dispatcher: &Dispatcher, user_id: i64, text: &str) -> Option<OutboundEvent> {
    dispatcher
        .handle(&InboundEvent::from_text("test", user_id, text))
        .await
}

#[tokio::test]
async fn facts_survive_a_restart() {
    let dir = TempDir::new().unwrap();

    {
        let bot = boot(&dir).await;
        let greeting = send(&bot, 42, "/start").await.unwrap();
        assert!(greeting.reply.contains("I will hold a more complex conversation"));
        assert_eq!(greeting.ui_hint, UiHint::ShowKeyboard);

        let ask = send(&bot, 42, "Age").await.unwrap();
        assert!(ask.reply.contains("Your age?"));

        let saved = send(&bot, 42, "30").await.unwrap();
        assert_eq!(saved.ui_hint, UiHint::ShowKeyboard);
        assert!(saved.reply.contains("age - 30"));
    }

    let bot = boot(&dir).await;
    let greeting = send(&bot, 42, "/start").await.unwrap();
    assert!(greeting.reply.contains("You already told me your"));
    assert!(greeting.reply.contains("age"));

    let shown = send(&bot, 42, "/show_data").await.unwrap();
    assert!(shown.reply.contains("age - 30"));
    assert_eq!(shown.ui_hint, UiHint::None);
}

#[tokio::test]
async fn pending_category_survives_a_restart() {
    let dir = TempDir::new().unwrap();

    {
        let bot = boot(&dir).await;
        send(&bot, 7, "Something else...").await.unwrap();
        send(&bot, 7, "Most impressive skill").await.unwrap();
    }

    let bot = boot(&dir).await;
    let session = bot.registry().get_or_create(7).await;
    assert_eq!(session.pending_category(), Some("most impressive skill"));

    send(&bot, 7, "Rust programming").await.unwrap();
    let session = bot.registry().get_or_create(7).await;
    assert_eq!(session.state, ConversationState::Choosing);
    assert_eq!(
        session.facts.get("most impressive skill").map(String::as_str),
        Some("rust programming")
    );
}

#[tokio::test]
async fn finished_user_is_greeted_as_returning() {
    let dir = TempDir::new().unwrap();

    {
        let bot = boot(&dir).await;
        send(&bot, 1, "Favourite colour").await.unwrap();
        send(&bot, 1, "Green").await.unwrap();
        let done = send(&bot, 1, "Done").await.unwrap();
        assert_eq!(done.ui_hint, UiHint::RemoveKeyboard);
        assert!(done.reply.contains("I learned these facts about you"));
        assert!(done.reply.contains("favourite colour - green"));
    }

    let bot = boot(&dir).await;
    assert_eq!(
        bot.registry().get_or_create(1).await.state,
        ConversationState::Terminated
    );

    let greeting = send(&bot, 1, "/start").await.unwrap();
    assert!(greeting.reply.contains("favourite colour"));
    assert_eq!(
        bot.registry().get_or_create(1).await.state,
        ConversationState::Choosing
    );
}

#[tokio::test]
async fn show_data_alone_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let bot = boot(&dir).await;

    send(&bot, 5, "/show_data").await.unwrap();
    send(&bot, 5, "/help").await.unwrap();
    assert!(!dir.path().join("state.json").exists());
}

#[tokio::test]
async fn corrupt_snapshot_refuses_to_load() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("state.json"), "{\"users\": [1, 2").unwrap();

    let store = SnapshotStore::new(dir.path().join("state.json"));
    let err = store.load().await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
}

#[tokio::test]
async fn many_users_share_one_snapshot() {
    let dir = TempDir::new().unwrap();
    let bot = Arc::new(boot(&dir).await);

    let mut handles = Vec::new();
    for user_id in 0..8i64 {
        let bot = Arc::clone(&bot);
        handles.push(tokio::spawn(async move {
            send(&bot, user_id, "Number of siblings").await.unwrap();
            send(&bot, user_id, &user_id.to_string()).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let restarted = boot(&dir).await;
    let snapshot = restarted.registry().snapshot().await;
    assert_eq!(snapshot.len(), 8);
    for (user_id, session) in &snapshot {
        assert_eq!(
            session.facts.get("number of siblings"),
            Some(&user_id.to_string())
        );
    }
}
