//! Fact-collecting conversation — a guided dialogue that asks the user for
//! labeled facts about themselves.
//!
//! The user picks a preset category from the keyboard (or types a custom
//! one), then sends its value. Facts are stored per user in a `UserSession`
//! which the session registry owns and the snapshot store persists.

pub mod prompts;
pub mod session;
pub mod state;

pub use session::{Facts, Reply, UiHint, UserSession};
pub use state::ConversationState;
