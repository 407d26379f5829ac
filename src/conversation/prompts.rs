//! Fixed keyboard labels and reply texts for the fact-collecting dialogue.

use super::session::Facts;

/// Keyboard labels shown to the user.
pub mod labels {
    pub const AGE: &str = "Age";
    pub const FAVOURITE_COLOUR: &str = "Favourite colour";
    pub const NUMBER_OF_SIBLINGS: &str = "Number of siblings";
    /// Sentinel that switches to free-form category entry.
    pub const SOMETHING_ELSE: &str = "Something else...";
    /// Ends the conversation from any state. Matched case-sensitively.
    pub const DONE: &str = "Done";
}

/// Preset categories offered on the keyboard.
pub const PRESET_CATEGORIES: &[&str] = &[
    labels::AGE,
    labels::FAVOURITE_COLOUR,
    labels::NUMBER_OF_SIBLINGS,
];

/// Main keyboard layout, row by row.
pub const MAIN_KEYBOARD: &[&[&str]] = &[
    &[labels::AGE, labels::FAVOURITE_COLOUR],
    &[labels::NUMBER_OF_SIBLINGS, labels::SOMETHING_ELSE],
    &[labels::DONE],
];

const GREETING: &str = "Hi! My name is Doctor Botter.";

pub const UNKNOWN_COMMAND: &str = "Unknown command.";

pub const ASK_CUSTOM_CATEGORY: &str =
    "Alright, please send me the category first, for example \"Most impressive skill\"";

pub const CHOOSE_GUIDANCE: &str =
    "Please choose one of the options on the keyboard or type \"Done\".";

pub const MISSING_CATEGORY: &str =
    "I am not sure what category this belongs to. Please choose one of the options.";

/// Shown by `/show_data` when nothing has been collected yet.
pub const NO_FACTS_MARKER: &str = "nothing yet";

/// Lower-case and trim user input before it is used as a category or value.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Whether `text` is one of the preset keyboard categories.
pub fn is_preset_category(text: &str) -> bool {
    PRESET_CATEGORIES.contains(&text)
}

/// Render facts as a block of `key - value` lines wrapped in newlines.
///
/// An empty map renders as two bare newlines so surrounding sentences keep
/// their spacing.
pub fn render_facts(facts: &Facts) -> String {
    if facts.is_empty() {
        return "\n\n".to_string();
    }
    let lines: Vec<String> = facts.iter().map(|(k, v)| format!("{k} - {v}")).collect();
    format!("\n{}\n", lines.join("\n"))
}

pub fn greet(facts: &Facts) -> String {
    if facts.is_empty() {
        return format!(
            "{GREETING} I will hold a more complex conversation with you. \
             Why don't you tell me something about yourself?"
        );
    }
    let known: Vec<&str> = facts.keys().map(String::as_str).collect();
    format!(
        "{GREETING} You already told me your {}. Why don't you tell me something more \
         about yourself? Or change anything I already know.",
        known.join(", ")
    )
}

pub fn show_facts(facts: &Facts) -> String {
    if facts.is_empty() {
        return format!("This is what you already told me: {NO_FACTS_MARKER}");
    }
    format!("This is what you already told me: {}", render_facts(facts))
}

pub fn already_known(category: &str, value: &str) -> String {
    format!("Your {category}? I already know the following about that: {value}")
}

pub fn ask_value(category: &str) -> String {
    format!("Your {category}? Yes, I would love to hear about that!")
}

pub fn value_saved(facts: &Facts) -> String {
    format!(
        "Neat! Just so you know, this is what you already told me:{}\
         You can tell me more, or change your opinion on something.",
        render_facts(facts)
    )
}

pub fn farewell(facts: &Facts) -> String {
    format!(
        "I learned these facts about you: {}Until next time!",
        render_facts(facts)
    )
}
