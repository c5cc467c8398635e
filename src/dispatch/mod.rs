//! Command dispatch
//!
//! Turns an intent plus entities into one storage mutation or read, writes
//! a voice command log row, and composes the spoken feedback. Dispatch never
//! fails: validation problems become [`DomainMutationResult::NeedsClarification`]
//! and storage failures become [`DomainMutationResult::Error`].

mod dedup;
mod responder;

pub use dedup::{CommandDedup, DEDUP_TTL_SECS};
pub use responder::{HELP_TEXT, IntentResponder, NOT_UNDERSTOOD_HINT, TemplateResponder};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::command::entities::{DEFAULT_EXPENSE_CATEGORY, DEFAULT_INCOME_CATEGORY};
use crate::command::{Entities, Intent, RecognizedCommand};
use crate::db::{
    DbPool, FinancialRecord, FinancialRepo, FinancialSummary, NewFinancialRecord, NewTask,
    NewVoiceCommandLog, RecordType, Task, TaskRepo, TaskStatus, VoiceCommandRepo,
};
use crate::feedback;

/// Most tasks a `task_list` result carries
pub const TASK_LIST_LIMIT: usize = 5;

/// One command to dispatch on behalf of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    /// Client-generated idempotency key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    pub text: String,
    pub intent: Intent,
    #[serde(default)]
    pub entities: Entities,
    pub confidence: f32,
}

impl DispatchRequest {
    #[must_use]
    pub fn from_command(command: &RecognizedCommand) -> Self {
        Self {
            command_id: Some(command.id.to_string()),
            text: command.raw_text.clone(),
            intent: command.intent,
            entities: command.entities.clone(),
            confidence: command.confidence,
        }
    }
}

/// What a dispatched command did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum DomainMutationResult {
    TaskCreated { task: Task },
    TaskCompleted { task: Task },
    TaskList { tasks: Vec<Task>, total_pending: usize },
    FinancialRecorded { record: FinancialRecord },
    Summary { summary: FinancialSummary },
    Navigation { destination: String },
    Reply { text: String },
    NeedsClarification { question: String },
    NotUnderstood { hint: String },
    Error { message: String },
}

impl DomainMutationResult {
    /// False only for storage or backend failures
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Error { .. })
    }

    /// Error message, if this is a failure
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message),
            _ => None,
        }
    }

    fn clarify(question: &str) -> Self {
        Self::NeedsClarification {
            question: question.to_string(),
        }
    }
}

/// Result plus everything the caller reports back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub result: DomainMutationResult,
    pub feedback: String,
    pub processing_time_ms: u64,
    /// True when this is a cached outcome for a repeated command id
    pub replayed: bool,
}

/// Executes commands against storage
#[derive(Clone)]
pub struct Dispatcher {
    tasks: TaskRepo,
    financial: FinancialRepo,
    voice_log: VoiceCommandRepo,
    responder: Arc<dyn IntentResponder>,
    dedup: CommandDedup,
}

impl Dispatcher {
    /// Create a dispatcher with template replies and the default replay window
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self {
            tasks: TaskRepo::new(pool.clone()),
            financial: FinancialRepo::new(pool.clone()),
            voice_log: VoiceCommandRepo::new(pool),
            responder: Arc::new(TemplateResponder::new()),
            dedup: CommandDedup::default(),
        }
    }

    /// Use a different responder for `joke` / `help`
    #[must_use]
    pub fn with_responder(mut self, responder: Arc<dyn IntentResponder>) -> Self {
        self.responder = responder;
        self
    }

    /// Set how long repeated command ids are replayed
    #[must_use]
    pub fn with_dedup_ttl(mut self, ttl: Duration) -> Self {
        self.dedup = CommandDedup::new(ttl);
        self
    }

    /// Name of the active responder
    #[must_use]
    pub fn responder_name(&self) -> &'static str {
        self.responder.name()
    }

    /// Dispatch one command for `user_id`
    ///
    /// The caller guarantees the user exists. A repeated `command_id`
    /// inside the replay window returns the first outcome with
    /// `replayed = true` and touches nothing.
    pub async fn dispatch(&self, user_id: &str, request: DispatchRequest) -> DispatchOutcome {
        let started = Instant::now();

        if let Some(command_id) = request.command_id.as_deref()
            && let Some(mut previous) = self.dedup.get(user_id, command_id)
        {
            tracing::info!(user_id, command_id, "replaying duplicate command");
            previous.replayed = true;
            return previous;
        }

        let today = Local::now().date_naive();
        let result = self.execute(user_id, &request, today).await;
        let feedback = feedback::compose(&result);
        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.log(user_id, &request, &result, processing_time_ms);

        tracing::info!(
            user_id,
            intent = %request.intent,
            success = result.is_success(),
            processing_time_ms,
            "command dispatched"
        );

        let outcome = DispatchOutcome {
            result,
            feedback,
            processing_time_ms,
            replayed: false,
        };

        // Failures are not remembered so a retry can still succeed
        if let Some(command_id) = request.command_id.as_deref()
            && outcome.result.is_success()
        {
            self.dedup.insert(user_id, command_id, outcome.clone());
        }

        outcome
    }

    /// Financial summary over an explicit range (or all time)
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn summary(
        &self,
        user_id: &str,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<FinancialSummary> {
        self.financial.summary(user_id, range)
    }

    async fn execute(
        &self,
        user_id: &str,
        request: &DispatchRequest,
        today: NaiveDate,
    ) -> DomainMutationResult {
        let entities = &request.entities;

        let result = match request.intent {
            Intent::TaskCreate => self.create_task(user_id, request),
            Intent::TaskComplete => self.complete_task(user_id, entities),
            Intent::ExpenseAdd => self.record(user_id, request, RecordType::Expense),
            Intent::IncomeAdd => self.record(user_id, request, RecordType::Income),
            Intent::TaskList => self.list_tasks(user_id),
            Intent::FinancialSummary => {
                let range = entities.period.map(|p| p.range(today));
                self.financial
                    .summary(user_id, range)
                    .map(|summary| DomainMutationResult::Summary { summary })
            }
            Intent::Navigate => Ok(entities.destination.as_ref().map_or_else(
                || DomainMutationResult::clarify("Where would you like to go?"),
                |destination| DomainMutationResult::Navigation {
                    destination: destination.clone(),
                },
            )),
            Intent::Joke | Intent::Help => self
                .responder
                .respond(request.intent, &request.text)
                .await
                .map(|text| DomainMutationResult::Reply { text }),
            Intent::Unknown => Ok(DomainMutationResult::NotUnderstood {
                hint: NOT_UNDERSTOOD_HINT.to_string(),
            }),
        };

        result.unwrap_or_else(|e| {
            tracing::error!(error = %e, user_id, intent = %request.intent, "dispatch failed");
            DomainMutationResult::Error {
                message: e.to_string(),
            }
        })
    }

    fn create_task(&self, user_id: &str, request: &DispatchRequest) -> Result<DomainMutationResult> {
        let entities = &request.entities;
        let Some(title) = entities.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(DomainMutationResult::clarify(
                "What task would you like to create?",
            ));
        };

        let task = self.tasks.create(
            user_id,
            &NewTask {
                title: title.to_string(),
                description: entities.description.clone(),
                priority: entities.priority.unwrap_or_default(),
                due_date: entities.due_date,
                created_via_voice: true,
                voice_transcription: Some(request.text.clone()),
            },
        )?;

        Ok(DomainMutationResult::TaskCreated { task })
    }

    fn complete_task(&self, user_id: &str, entities: &Entities) -> Result<DomainMutationResult> {
        let Some(title) = entities.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(DomainMutationResult::clarify(
                "Which task would you like to complete?",
            ));
        };

        Ok(match self.tasks.complete_matching(user_id, title)? {
            Some(task) => DomainMutationResult::TaskCompleted { task },
            None => DomainMutationResult::NeedsClarification {
                question: format!(
                    "I couldn't find a pending task called \"{title}\". Which task did you mean?"
                ),
            },
        })
    }

    fn record(
        &self,
        user_id: &str,
        request: &DispatchRequest,
        record_type: RecordType,
    ) -> Result<DomainMutationResult> {
        let entities = &request.entities;
        let Some(amount) = entities.amount.filter(|a| a.is_positive()) else {
            return Ok(DomainMutationResult::clarify(match record_type {
                RecordType::Expense => "How much was the expense?",
                RecordType::Income => "How much income did you receive?",
            }));
        };

        let default_category = match record_type {
            RecordType::Expense => DEFAULT_EXPENSE_CATEGORY,
            RecordType::Income => DEFAULT_INCOME_CATEGORY,
        };
        let category = entities
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(default_category);

        let record = self.financial.create(
            user_id,
            &NewFinancialRecord {
                record_type,
                amount,
                category: category.to_string(),
                description: entities.description.clone(),
                date: None,
                created_via_voice: true,
                voice_transcription: Some(request.text.clone()),
            },
        )?;

        Ok(DomainMutationResult::FinancialRecorded { record })
    }

    fn list_tasks(&self, user_id: &str) -> Result<DomainMutationResult> {
        let tasks = self.tasks.list(
            user_id,
            Some(TaskStatus::Pending),
            Some(TASK_LIST_LIMIT),
        )?;
        let total_pending = self.tasks.count_pending(user_id)?;
        Ok(DomainMutationResult::TaskList {
            tasks,
            total_pending,
        })
    }

    fn log(
        &self,
        user_id: &str,
        request: &DispatchRequest,
        result: &DomainMutationResult,
        processing_time_ms: u64,
    ) {
        let action_result = serde_json::to_value(result).ok();
        let entry = NewVoiceCommandLog {
            user_id,
            command_id: request.command_id.as_deref(),
            transcription: &request.text,
            intent: request.intent,
            entities: &request.entities,
            confidence: request.confidence,
            success: result.is_success(),
            error: result.error_message(),
            action_result,
            processing_time_ms,
        };

        // A failed log write does not undo the mutation
        if let Err(e) = self.voice_log.create(&entry) {
            tracing::warn!(error = %e, user_id, "failed to write voice command log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Amount, Period, Priority};
    use crate::db::{UserRepo, init_memory};

    fn setup() -> (Dispatcher, DbPool) {
        let pool = init_memory().unwrap();
        UserRepo::new(pool.clone()).find_or_create("alice").unwrap();
        (Dispatcher::new(pool.clone()), pool)
    }

    fn request(intent: Intent, text: &str, entities: Entities) -> DispatchRequest {
        DispatchRequest {
            command_id: None,
            text: text.to_string(),
            intent,
            entities,
            confidence: 0.9,
        }
    }

    fn log_count(pool: &DbPool) -> usize {
        VoiceCommandRepo::new(pool.clone())
            .list_for_user("alice", 100)
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn task_create_round_trips_priority() {
        let (dispatcher, pool) = setup();
        let entities = Entities {
            title: Some("X".to_string()),
            priority: Some(Priority::High),
            ..Entities::default()
        };

        let outcome = dispatcher
            .dispatch("alice", request(Intent::TaskCreate, "create task x urgent", entities))
            .await;
        let DomainMutationResult::TaskCreated { task } = outcome.result else {
            panic!("expected task_created, got {:?}", outcome.result);
        };
        assert!(task.created_via_voice);
        assert_eq!(task.voice_transcription.as_deref(), Some("create task x urgent"));

        let stored = TaskRepo::new(pool.clone()).list("alice", None, None).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].priority, Priority::High);
        assert_eq!(log_count(&pool), 1);
    }

    #[tokio::test]
    async fn expense_records_exact_amount() {
        let (dispatcher, _pool) = setup();
        let entities = Entities {
            amount: Amount::parse("4.50"),
            category: Some("food".to_string()),
            ..Entities::default()
        };

        let outcome = dispatcher
            .dispatch("alice", request(Intent::ExpenseAdd, "add expense 4.50 for food", entities))
            .await;
        let DomainMutationResult::FinancialRecorded { record } = &outcome.result else {
            panic!("expected financial_recorded");
        };
        assert_eq!(record.record_type, RecordType::Expense);
        assert_eq!(record.amount.to_string(), "4.50");
        assert_eq!(record.category, "food");
        assert_eq!(outcome.feedback, "Added expense of $4.50 for food.");
    }

    #[tokio::test]
    async fn income_defaults_category() {
        let (dispatcher, _pool) = setup();
        let entities = Entities {
            amount: Amount::parse("100"),
            ..Entities::default()
        };

        let outcome = dispatcher
            .dispatch("alice", request(Intent::IncomeAdd, "add income 100", entities))
            .await;
        let DomainMutationResult::FinancialRecorded { record } = outcome.result else {
            panic!("expected financial_recorded");
        };
        assert_eq!(record.category, DEFAULT_INCOME_CATEGORY);
    }

    #[tokio::test]
    async fn missing_entities_ask_for_clarification() {
        let (dispatcher, pool) = setup();

        for intent in [
            Intent::TaskCreate,
            Intent::TaskComplete,
            Intent::ExpenseAdd,
            Intent::IncomeAdd,
            Intent::Navigate,
        ] {
            let outcome = dispatcher
                .dispatch("alice", request(intent, "hmm", Entities::default()))
                .await;
            assert!(
                matches!(outcome.result, DomainMutationResult::NeedsClarification { .. }),
                "{intent}"
            );
            assert!(outcome.result.is_success());
        }

        // every attempt is still logged
        assert_eq!(log_count(&pool), 5);
    }

    #[tokio::test]
    async fn complete_unknown_task_asks_which() {
        let (dispatcher, _pool) = setup();
        let entities = Entities {
            title: Some("walk the dog".to_string()),
            ..Entities::default()
        };
        let outcome = dispatcher
            .dispatch("alice", request(Intent::TaskComplete, "complete task walk the dog", entities))
            .await;
        let DomainMutationResult::NeedsClarification { question } = outcome.result else {
            panic!("expected needs_clarification");
        };
        assert!(question.contains("walk the dog"));
    }

    #[tokio::test]
    async fn task_list_caps_at_five() {
        let (dispatcher, pool) = setup();
        let repo = TaskRepo::new(pool);
        for i in 0..8 {
            repo.create(
                "alice",
                &NewTask {
                    title: format!("task {i}"),
                    ..NewTask::default()
                },
            )
            .unwrap();
        }

        let outcome = dispatcher
            .dispatch("alice", request(Intent::TaskList, "list tasks", Entities::default()))
            .await;
        let DomainMutationResult::TaskList {
            tasks,
            total_pending,
        } = outcome.result
        else {
            panic!("expected task_list");
        };
        assert_eq!(tasks.len(), TASK_LIST_LIMIT);
        assert_eq!(total_pending, 8);
    }

    #[tokio::test]
    async fn summary_respects_period() {
        let (dispatcher, _pool) = setup();
        for amount in ["10", "2.50"] {
            let entities = Entities {
                amount: Amount::parse(amount),
                category: Some("food".to_string()),
                ..Entities::default()
            };
            dispatcher
                .dispatch("alice", request(Intent::ExpenseAdd, "spent", entities))
                .await;
        }

        let entities = Entities {
            period: Some(Period::Today),
            ..Entities::default()
        };
        let outcome = dispatcher
            .dispatch("alice", request(Intent::FinancialSummary, "summary for today", entities))
            .await;
        let DomainMutationResult::Summary { summary } = outcome.result else {
            panic!("expected summary");
        };
        assert_eq!(summary.total_expenses, Amount::from_cents(1250));
        assert_eq!(summary.start, summary.end);
    }

    #[tokio::test]
    async fn unknown_is_a_valid_outcome() {
        let (dispatcher, pool) = setup();
        let outcome = dispatcher
            .dispatch("alice", request(Intent::Unknown, "banana", Entities::default()))
            .await;
        assert!(matches!(outcome.result, DomainMutationResult::NotUnderstood { .. }));
        assert!(outcome.feedback.starts_with("Sorry, I didn't understand"));

        let logs = VoiceCommandRepo::new(pool).list_for_user("alice", 10).unwrap();
        assert!(logs[0].success);
        assert_eq!(logs[0].intent, Intent::Unknown);
    }

    #[tokio::test]
    async fn navigation_and_replies() {
        let (dispatcher, _pool) = setup();
        let entities = Entities {
            destination: Some("settings".to_string()),
            ..Entities::default()
        };
        let outcome = dispatcher
            .dispatch("alice", request(Intent::Navigate, "open settings", entities))
            .await;
        assert_eq!(
            outcome.result,
            DomainMutationResult::Navigation {
                destination: "settings".to_string()
            }
        );

        let outcome = dispatcher
            .dispatch("alice", request(Intent::Help, "help", Entities::default()))
            .await;
        assert_eq!(outcome.feedback, HELP_TEXT);
    }

    #[tokio::test]
    async fn repeated_command_id_is_replayed() {
        let (dispatcher, pool) = setup();
        let mut req = request(
            Intent::TaskCreate,
            "create task buy milk",
            Entities {
                title: Some("buy milk".to_string()),
                ..Entities::default()
            },
        );
        req.command_id = Some("cmd-1".to_string());

        let first = dispatcher.dispatch("alice", req.clone()).await;
        let second = dispatcher.dispatch("alice", req).await;

        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(first.result, second.result);
        assert_eq!(TaskRepo::new(pool.clone()).count_pending("alice").unwrap(), 1);
        assert_eq!(
            VoiceCommandRepo::new(pool)
                .count_for_command("alice", "cmd-1")
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn storage_failure_becomes_error_result_and_is_logged() {
        let (dispatcher, pool) = setup();
        pool.get().unwrap().execute_batch("DROP TABLE tasks").unwrap();

        let mut req = request(
            Intent::TaskCreate,
            "create task buy milk",
            Entities {
                title: Some("buy milk".to_string()),
                ..Entities::default()
            },
        );
        req.command_id = Some("cmd-2".to_string());

        let outcome = dispatcher.dispatch("alice", req.clone()).await;
        assert!(!outcome.result.is_success());
        assert_eq!(outcome.feedback, feedback::EXECUTION_FAILED);

        let logs = VoiceCommandRepo::new(pool).list_for_user("alice", 10).unwrap();
        assert_eq!(logs.len(), 1);
        assert!(!logs[0].success);
        assert!(logs[0].error.is_some());

        // failures are not cached, so a retry runs again
        let retry = dispatcher.dispatch("alice", req).await;
        assert!(!retry.replayed);
    }

    #[test]
    fn result_serializes_with_type_tag() {
        let json = serde_json::to_value(DomainMutationResult::TaskList {
            tasks: Vec::new(),
            total_pending: 0,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "task_list", "tasks": [], "totalPending": 0}));
    }
}
