//! FIFO command queue
//!
//! A single consumer task drains an unbounded channel, so commands execute
//! strictly in the order they were enqueued. Each command is retried on
//! transient failure, its feedback is spoken, and an [`ExecutionReport`] is
//! published before the next command starts. A failed command never stops
//! the loop.

mod executor;
mod retry;

pub use executor::{CommandExecutor, LocalCommandExecutor};
pub use retry::{RetryPolicy, delay_for_attempt, is_recoverable};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::command::{Intent, RecognizedCommand};
use crate::dispatch::{DispatchOutcome, DomainMutationResult};
use crate::feedback::EXECUTION_FAILED;
use crate::voice::FeedbackSpeaker;
use crate::{Error, Result};

/// Default pause between consecutive commands
pub const DEFAULT_INTER_COMMAND_DELAY: Duration = Duration::from_millis(500);

/// Queue tuning
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Pause after each command before the next starts
    pub inter_command_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            inter_command_delay: DEFAULT_INTER_COMMAND_DELAY,
            retry: RetryPolicy::default(),
        }
    }
}

/// What happened to one queued command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    /// Position in enqueue order, starting at 1
    pub sequence: u64,
    pub command_id: Uuid,
    pub text: String,
    pub intent: Intent,
    /// Spoken feedback
    pub feedback: String,
    /// Result from the dispatcher, absent when execution failed outright
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DomainMutationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Executions attempted, including the first
    pub attempts: u32,
}

impl ExecutionReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
            && self
                .result
                .as_ref()
                .is_some_and(DomainMutationResult::is_success)
    }
}

enum Message {
    Command { sequence: u64, command: Box<RecognizedCommand> },
    Shutdown,
}

/// Sending side of the queue
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::UnboundedSender<Message>,
    pending: Arc<AtomicUsize>,
    next_sequence: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl QueueHandle {
    /// Append a command; returns its sequence number
    ///
    /// Never blocks and never drops an accepted command.
    ///
    /// # Errors
    ///
    /// Returns error if the queue has been shut down
    pub fn enqueue(&self, command: RecognizedCommand) -> Result<u64> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Queue("queue is shut down".to_string()));
        }

        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(sequence, command_id = %command.id, intent = %command.intent, "command enqueued");

        if self
            .tx
            .send(Message::Command {
                sequence,
                command: Box::new(command),
            })
            .is_err()
        {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Queue("queue consumer has stopped".to_string()));
        }

        Ok(sequence)
    }

    /// Commands accepted but not yet finished
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Stop accepting commands
    ///
    /// Commands already enqueued still execute; the consumer's join handle
    /// resolves once they have drained.
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("command queue shutting down");
            let _ = self.tx.send(Message::Shutdown);
        }
    }

    /// Whether [`Self::shutdown`] has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// The queue's single consumer
pub struct CommandQueue {
    executor: Arc<dyn CommandExecutor>,
    speaker: Option<Arc<FeedbackSpeaker>>,
    config: QueueConfig,
    pending: Arc<AtomicUsize>,
    reports: mpsc::UnboundedSender<ExecutionReport>,
}

impl CommandQueue {
    /// Start the consumer task
    ///
    /// Returns the handle used to enqueue, the report feed, and the
    /// consumer's join handle. Exactly one consumer exists per queue.
    #[must_use]
    pub fn spawn(
        executor: Arc<dyn CommandExecutor>,
        speaker: Option<Arc<FeedbackSpeaker>>,
        config: QueueConfig,
    ) -> (
        QueueHandle,
        mpsc::UnboundedReceiver<ExecutionReport>,
        JoinHandle<()>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        let handle = QueueHandle {
            tx,
            pending: Arc::clone(&pending),
            next_sequence: Arc::new(AtomicU64::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        };

        tracing::info!(executor = executor.name(), "command queue started");

        let queue = Self {
            executor,
            speaker,
            config,
            pending,
            reports: reports_tx,
        };
        let join = tokio::spawn(queue.run(rx));

        (handle, reports_rx, join)
    }

    async fn run(self, mut rx: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = rx.recv().await {
            match message {
                Message::Command { sequence, command } => {
                    self.process(sequence, &command).await;
                }
                // Anything already buffered still drains after close
                Message::Shutdown => rx.close(),
            }
        }

        tracing::info!("command queue drained");
    }

    async fn process(&self, sequence: u64, command: &RecognizedCommand) {
        let (outcome, attempts) = self.execute_with_retry(command).await;

        let report = match outcome {
            Ok(outcome) => ExecutionReport {
                sequence,
                command_id: command.id,
                text: command.raw_text.clone(),
                intent: command.intent,
                feedback: outcome.feedback,
                result: Some(outcome.result),
                error: None,
                attempts,
            },
            Err(e) => {
                tracing::error!(sequence, command_id = %command.id, error = %e, attempts, "command failed");
                ExecutionReport {
                    sequence,
                    command_id: command.id,
                    text: command.raw_text.clone(),
                    intent: command.intent,
                    feedback: EXECUTION_FAILED.to_string(),
                    result: None,
                    error: Some(e.to_string()),
                    attempts,
                }
            }
        };

        if let Some(speaker) = &self.speaker {
            drop(speaker.say(report.feedback.clone()));
        }

        tracing::info!(
            sequence,
            command_id = %command.id,
            intent = %command.intent,
            success = report.is_success(),
            "command executed"
        );

        let _ = self.reports.send(report);
        self.pending.fetch_sub(1, Ordering::SeqCst);

        if !self.config.inter_command_delay.is_zero() {
            tokio::time::sleep(self.config.inter_command_delay).await;
        }
    }

    async fn execute_with_retry(&self, command: &RecognizedCommand) -> (Result<DispatchOutcome>, u32) {
        let policy = &self.config.retry;
        let mut attempt = 0;

        loop {
            match self.executor.execute(command).await {
                Ok(outcome) => return (Ok(outcome), attempt + 1),
                Err(e) if e.is_transient() && attempt < policy.max_retries => {
                    let delay = delay_for_attempt(policy, attempt);
                    tracing::warn!(
                        command_id = %command.id,
                        error = %e,
                        attempt = attempt + 1,
                        delay_ms = ?delay.as_millis(),
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return (Err(e), attempt + 1),
            }
        }
    }
}
