//! File-backed snapshot of every user session.
//!
//! The whole collection is written as one JSON document. Writes go to a
//! sibling `.tmp` file which is synced and then renamed over the snapshot,
//! so a reader only ever sees the old or the new document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::conversation::{ConversationState, Facts, UserSession};
use crate::error::StoreError;

use super::SessionCollection;

/// Persisted state tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum StateTag {
    Choosing,
    TypingCategory,
    TypingValue,
    /// Older snapshots mark a finished conversation with an empty state.
    #[serde(alias = "")]
    Terminated,
}

/// One user's record in the snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    state: StateTag,
    #[serde(default)]
    choice: String,
    #[serde(default)]
    data: Facts,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    users: HashMap<i64, SessionRecord>,
}

impl From<&UserSession> for SessionRecord {
    fn from(session: &UserSession) -> Self {
        let (state, choice) = match &session.state {
            ConversationState::Choosing => (StateTag::Choosing, String::new()),
            ConversationState::TypingCategory => (StateTag::TypingCategory, String::new()),
            ConversationState::TypingValue { category } => {
                (StateTag::TypingValue, category.clone())
            }
            ConversationState::Terminated => (StateTag::Terminated, String::new()),
        };
        Self {
            state,
            choice,
            data: session.facts.clone(),
        }
    }
}

impl From<SessionRecord> for UserSession {
    fn from(record: SessionRecord) -> Self {
        let state = match record.state {
            StateTag::Choosing => ConversationState::Choosing,
            StateTag::TypingCategory => ConversationState::TypingCategory,
            // An empty choice is kept as-is; the state machine recovers from it.
            StateTag::TypingValue => ConversationState::TypingValue {
                category: record.choice,
            },
            StateTag::Terminated => ConversationState::Terminated,
        };
        Self {
            state,
            facts: record.data,
        }
    }
}

/// Durable store for the session collection.
pub struct SnapshotStore {
    path: PathBuf,
    /// Serializes loads and saves so the tmp-then-rename sequence never overlaps.
    io_lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Load the snapshot. A missing or blank file is an empty collection.
    pub async fn load(&self) -> Result<SessionCollection, StoreError> {
        let _guard = self.io_lock.lock().await;

        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No snapshot yet, starting empty");
                return Ok(SessionCollection::new());
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(SessionCollection::new());
        }

        let document: SnapshotDocument =
            serde_json::from_slice(&content).map_err(|e| StoreError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let sessions: SessionCollection = document
            .users
            .into_iter()
            .map(|(user_id, record)| (user_id, UserSession::from(record)))
            .collect();

        tracing::debug!(
            path = %self.path.display(),
            users = sessions.len(),
            "Snapshot loaded"
        );
        Ok(sessions)
    }

    /// Write the full collection atomically.
    pub async fn save(&self, sessions: &SessionCollection) -> Result<(), StoreError> {
        let document = SnapshotDocument {
            users: sessions
                .iter()
                .map(|(user_id, session)| (*user_id, SessionRecord::from(session)))
                .collect(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        let _guard = self.io_lock.lock().await;
        self.write_atomically(json.as_bytes())
            .await
            .map_err(|source| StoreError::PersistFailed {
                path: self.path.clone(),
                source,
            })?;

        tracing::debug!(
            path = %self.path.display(),
            users = sessions.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    async fn write_atomically(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let tmp_path = self.tmp_path();
        let mut tmp_file = fs::File::create(&tmp_path).await?;
        tmp_file.write_all(bytes).await?;
        tmp_file.sync_all().await?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path).await
    }
}
