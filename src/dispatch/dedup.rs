//! Replay cache for dispatched command ids
//!
//! A client retrying a command reuses its id; within the TTL window the
//! first outcome is returned again instead of mutating storage twice.

use std::time::Duration;

use mini_moka::sync::Cache;

use super::DispatchOutcome;

/// Default replay window (5 minutes)
pub const DEDUP_TTL_SECS: u64 = 300;

/// Maximum remembered command ids
const DEDUP_MAX_ENTRIES: u64 = 10_000;

#[derive(Debug, Hash, Eq, PartialEq, Clone)]
struct CommandKey {
    user_id: String,
    command_id: String,
}

/// TTL cache of dispatch outcomes keyed by (user, command id)
#[derive(Clone, Debug)]
pub struct CommandDedup {
    outcomes: Cache<CommandKey, DispatchOutcome>,
}

impl Default for CommandDedup {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEDUP_TTL_SECS))
    }
}

impl CommandDedup {
    /// Create a cache that remembers outcomes for `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            outcomes: Cache::builder()
                .max_capacity(DEDUP_MAX_ENTRIES)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Outcome previously recorded for this command, if still in the window
    #[must_use]
    pub fn get(&self, user_id: &str, command_id: &str) -> Option<DispatchOutcome> {
        self.outcomes.get(&CommandKey {
            user_id: user_id.to_string(),
            command_id: command_id.to_string(),
        })
    }

    /// Remember the outcome of a command
    pub fn insert(&self, user_id: &str, command_id: &str, outcome: DispatchOutcome) {
        self.outcomes.insert(
            CommandKey {
                user_id: user_id.to_string(),
                command_id: command_id.to_string(),
            },
            outcome,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DomainMutationResult;

    fn outcome(text: &str) -> DispatchOutcome {
        DispatchOutcome {
            result: DomainMutationResult::Reply {
                text: text.to_string(),
            },
            feedback: text.to_string(),
            processing_time_ms: 1,
            replayed: false,
        }
    }

    #[test]
    fn remembers_per_user_and_command() {
        let dedup = CommandDedup::default();
        dedup.insert("alice", "c-1", outcome("first"));

        assert_eq!(dedup.get("alice", "c-1").map(|o| o.feedback), Some("first".to_string()));
        assert!(dedup.get("alice", "c-2").is_none());
        assert!(dedup.get("bob", "c-1").is_none());
    }

    #[test]
    fn entries_expire() {
        let dedup = CommandDedup::new(Duration::from_millis(20));
        dedup.insert("alice", "c-1", outcome("first"));
        std::thread::sleep(Duration::from_millis(60));
        assert!(dedup.get("alice", "c-1").is_none());
    }
}
