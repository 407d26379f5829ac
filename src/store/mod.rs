//! Persistence for user sessions.

pub mod snapshot;

use std::collections::HashMap;

use crate::conversation::UserSession;

pub use snapshot::SnapshotStore;

/// Every known session, keyed by the gateway's numeric user id.
pub type SessionCollection = HashMap<i64, UserSession>;
