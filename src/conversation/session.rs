//! Per-user session — the facts collected so far and the dialogue state
//! machine that drives their collection.

use indexmap::IndexMap;

use super::prompts::{self, labels};
use super::state::ConversationState;

/// Collected facts, keyed by normalized category, in the order they were
/// first given.
pub type Facts = IndexMap<String, String>;

/// What the gateway should do with its keyboard affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiHint {
    #[default]
    None,
    ShowKeyboard,
    RemoveKeyboard,
}

/// Outcome of feeding free text to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub ui_hint: UiHint,
    /// Set when the terminating keyword ended the conversation.
    pub finished: bool,
}

impl Reply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ui_hint: UiHint::None,
            finished: false,
        }
    }

    fn with_keyboard(text: impl Into<String>) -> Self {
        Self {
            ui_hint: UiHint::ShowKeyboard,
            ..Self::plain(text)
        }
    }
}

/// Dialogue state plus collected facts for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSession {
    pub state: ConversationState,
    pub facts: Facts,
}

impl UserSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_facts(facts: Facts) -> Self {
        Self {
            state: ConversationState::Choosing,
            facts,
        }
    }

    pub fn pending_category(&self) -> Option<&str> {
        self.state.pending_category()
    }

    /// Handle `/start`: reset to `Choosing` and greet, mentioning what is
    /// already known.
    pub fn on_greet(&mut self) -> String {
        self.state = ConversationState::Choosing;
        prompts::greet(&self.facts)
    }

    /// Handle `/show_data`. Never mutates.
    pub fn on_show_facts(&self) -> String {
        prompts::show_facts(&self.facts)
    }

    /// Handle a free-text message.
    ///
    /// The terminating keyword is checked before anything else and works
    /// from every state.
    pub fn on_text(&mut self, text: &str) -> Reply {
        if text == labels::DONE {
            self.state = ConversationState::Terminated;
            return Reply {
                text: prompts::farewell(&self.facts),
                ui_hint: UiHint::RemoveKeyboard,
                finished: true,
            };
        }

        match std::mem::take(&mut self.state) {
            ConversationState::Choosing | ConversationState::Terminated => {
                self.handle_choosing(text)
            }
            ConversationState::TypingCategory => self.handle_typing_category(text),
            ConversationState::TypingValue { category } => {
                self.handle_typing_value(category, text)
            }
        }
    }

    // `self.state` is `Choosing` on entry to every handler below.

    fn handle_choosing(&mut self, text: &str) -> Reply {
        if prompts::is_preset_category(text) {
            let category = prompts::normalize(text);
            if let Some(existing) = self.facts.get(&category) {
                // Known preset: surface the value but stay put.
                return Reply::plain(prompts::already_known(&category, existing));
            }
            let reply = prompts::ask_value(&category);
            self.state = ConversationState::TypingValue { category };
            return Reply::plain(reply);
        }

        if text == labels::SOMETHING_ELSE {
            self.state = ConversationState::TypingCategory;
            return Reply::plain(prompts::ASK_CUSTOM_CATEGORY);
        }

        Reply::with_keyboard(prompts::CHOOSE_GUIDANCE)
    }

    fn handle_typing_category(&mut self, text: &str) -> Reply {
        let category = prompts::normalize(text);
        if category.is_empty() {
            self.state = ConversationState::TypingCategory;
            return Reply::plain(prompts::ASK_CUSTOM_CATEGORY);
        }
        let reply = match self.facts.get(&category) {
            Some(existing) => prompts::already_known(&category, existing),
            None => prompts::ask_value(&category),
        };
        self.state = ConversationState::TypingValue { category };
        Reply::plain(reply)
    }

    fn handle_typing_value(&mut self, category: String, text: &str) -> Reply {
        if category.is_empty() {
            tracing::warn!("Value received without a pending category; back to choosing");
            return Reply::with_keyboard(prompts::MISSING_CATEGORY);
        }
        self.facts.insert(category, prompts::normalize(text));
        Reply::with_keyboard(prompts::value_saved(&self.facts))
    }
}
