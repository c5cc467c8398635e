//! Executors that carry a recognized command to the dispatcher

use async_trait::async_trait;

use crate::Result;
use crate::command::RecognizedCommand;
use crate::dispatch::{DispatchOutcome, DispatchRequest, Dispatcher};

/// Executes one recognized command and returns its outcome
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute a command
    ///
    /// # Errors
    ///
    /// Returns error if the command could not reach the dispatcher. Errors
    /// for which [`crate::Error::is_transient`] holds are retried.
    async fn execute(&self, command: &RecognizedCommand) -> Result<DispatchOutcome>;

    /// Executor name for logging
    fn name(&self) -> &'static str;
}

/// Dispatches in-process against a local database
#[derive(Clone)]
pub struct LocalCommandExecutor {
    dispatcher: Dispatcher,
    user_id: String,
}

impl LocalCommandExecutor {
    #[must_use]
    pub fn new(dispatcher: Dispatcher, user_id: impl Into<String>) -> Self {
        Self {
            dispatcher,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl CommandExecutor for LocalCommandExecutor {
    async fn execute(&self, command: &RecognizedCommand) -> Result<DispatchOutcome> {
        Ok(self
            .dispatcher
            .dispatch(&self.user_id, DispatchRequest::from_command(command))
            .await)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandExtractor;
    use crate::db::{TaskRepo, UserRepo, init_memory};
    use crate::dispatch::DomainMutationResult;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn local_executor_dispatches_for_its_user() {
        let pool = init_memory().unwrap();
        UserRepo::new(pool.clone()).find_or_create("alice").unwrap();
        let executor = LocalCommandExecutor::new(Dispatcher::new(pool.clone()), "alice");

        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let extraction = CommandExtractor::default().extract("create task buy milk", today);
        let command = RecognizedCommand::new("create task buy milk", extraction, 0.9, "en-US");

        let outcome = executor.execute(&command).await.unwrap();
        assert!(matches!(outcome.result, DomainMutationResult::TaskCreated { .. }));
        assert_eq!(TaskRepo::new(pool).count_pending("alice").unwrap(), 1);
        assert_eq!(executor.name(), "local");
    }
}
