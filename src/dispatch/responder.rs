//! Canned replies for conversational intents

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::Result;
use crate::command::Intent;

/// What the user can say, read back for the help intent
pub const HELP_TEXT: &str = "You can say things like: create task buy milk, \
    complete task buy milk, add expense 12 dollars for lunch, add income 500 from salary, \
    list my tasks, show my financial summary, go to the dashboard, or tell me a joke.";

/// Short hint spoken when nothing matched
pub const NOT_UNDERSTOOD_HINT: &str =
    "Try saying create task, add expense, list my tasks, or help.";

const JOKES: &[&str] = &[
    "Why did the to-do list go to therapy? It had too many unresolved issues.",
    "I told my budget a joke. It didn't laugh, it just kept cutting back.",
    "Why don't calendars ever get lonely? Their days are always booked.",
    "My task list and I have a lot in common. We both keep getting longer.",
];

/// Produces reply text for `joke` and `help`
#[async_trait]
pub trait IntentResponder: Send + Sync {
    /// Reply to a conversational intent
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot produce a reply
    async fn respond(&self, intent: Intent, text: &str) -> Result<String>;

    /// Responder name for logging
    fn name(&self) -> &'static str;
}

/// Fixed templates; jokes rotate in order
#[derive(Debug, Default)]
pub struct TemplateResponder {
    next_joke: AtomicUsize,
}

impl TemplateResponder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IntentResponder for TemplateResponder {
    async fn respond(&self, intent: Intent, _text: &str) -> Result<String> {
        let reply = match intent {
            Intent::Joke => {
                let i = self.next_joke.fetch_add(1, Ordering::Relaxed);
                JOKES[i % JOKES.len()]
            }
            Intent::Help => HELP_TEXT,
            _ => NOT_UNDERSTOOD_HINT,
        };
        Ok(reply.to_string())
    }

    fn name(&self) -> &'static str {
        "template"
    }
}
