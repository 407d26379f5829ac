//! Dialogue state — which kind of input the bot is waiting for.

/// The states of a fact-collecting conversation.
///
/// `Choosing` is the hub: picking a category moves to one of the typing
/// states, storing a value returns here. `Terminated` is entered from any
/// state by the terminating keyword and left again on the next `/start`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Choosing,
    /// Waiting for the name of a custom category.
    TypingCategory,
    /// Waiting for the value of `category`.
    TypingValue { category: String },
    Terminated,
}

impl ConversationState {
    /// Stable name, also used as the persisted state tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Choosing => "choosing",
            Self::TypingCategory => "typing_category",
            Self::TypingValue { .. } => "typing_value",
            Self::Terminated => "terminated",
        }
    }

    /// The category awaiting a value, if any.
    pub fn pending_category(&self) -> Option<&str> {
        match self {
            Self::TypingValue { category } if !category.is_empty() => Some(category.as_str()),
            _ => None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_choosing() {
        assert_eq!(ConversationState::default(), ConversationState::Choosing);
    }

    #[test]
    fn pending_category_only_in_typing_value() {
        use ConversationState::*;
        assert_eq!(Choosing.pending_category(), None);
        assert_eq!(TypingCategory.pending_category(), None);
        assert_eq!(Terminated.pending_category(), None);
        let typing = TypingValue {
            category: "age".into(),
        };
        assert_eq!(typing.pending_category(), Some("age"));
    }

    #[test]
    fn empty_category_is_not_pending() {
        let state = ConversationState::TypingValue {
            category: String::new(),
        };
        assert_eq!(state.pending_category(), None);
    }

    #[test]
    fn display_matches_name() {
        use ConversationState::*;
        let states = [
            Choosing,
            TypingCategory,
            TypingValue {
                category: "age".into(),
            },
            Terminated,
        ];
        for state in states {
            assert_eq!(format!("{state}"), state.name());
        }
    }

    #[test]
    fn only_terminated_is_terminated() {
        assert!(ConversationState::Terminated.is_terminated());
        assert!(!ConversationState::Choosing.is_terminated());
        assert!(!ConversationState::TypingCategory.is_terminated());
    }
}
