//! Client voice session
//!
//! Final transcripts from the capture adapter are turned into commands and
//! enqueued; notices are spoken. The session ends when capture stops.

use std::sync::Arc;

use chrono::Local;
use tokio::sync::mpsc;

use crate::Result;
use crate::command::{CommandExtractor, RecognizedCommand};
use crate::queue::QueueHandle;
use crate::voice::{CaptureAdapter, CaptureEvent, FeedbackSpeaker, Transcript};

/// Wires capture → extractor → queue
pub struct VoiceSession {
    capture: CaptureAdapter,
    extractor: CommandExtractor,
    queue: QueueHandle,
    speaker: Option<Arc<FeedbackSpeaker>>,
}

impl VoiceSession {
    #[must_use]
    pub fn new(capture: CaptureAdapter, extractor: CommandExtractor, queue: QueueHandle) -> Self {
        Self {
            capture,
            extractor,
            queue,
            speaker: None,
        }
    }

    /// Speak capture notices (low confidence, recognizer errors)
    #[must_use]
    pub fn with_speaker(mut self, speaker: Arc<FeedbackSpeaker>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    /// Extract and enqueue one final transcript
    ///
    /// # Errors
    ///
    /// Returns error if the queue has been shut down
    pub fn submit(&self, transcript: &Transcript) -> Result<RecognizedCommand> {
        let today = Local::now().date_naive();
        let extraction = self.extractor.extract(&transcript.text, today);
        let command = RecognizedCommand::new(
            transcript.text.trim(),
            extraction,
            transcript.confidence,
            self.extractor.language(),
        );

        tracing::info!(
            command_id = %command.id,
            intent = %command.intent,
            confidence = command.confidence,
            "command recognized"
        );

        self.queue.enqueue(command.clone())?;
        Ok(command)
    }

    /// Listen until capture stops, then shut the queue down
    ///
    /// Returns the number of commands enqueued.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<CaptureEvent>) -> usize {
        let mut submitted = 0;
        self.capture.start_listening();

        while let Some(event) = events.recv().await {
            match event {
                CaptureEvent::Final(transcript) => match self.submit(&transcript) {
                    Ok(_) => submitted += 1,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping command, queue closed");
                        break;
                    }
                },
                CaptureEvent::Interim(transcript) => {
                    tracing::trace!(text = %transcript.text, "interim transcript");
                }
                CaptureEvent::Notice(message) => {
                    tracing::info!(%message, "capture notice");
                    if let Some(speaker) = &self.speaker {
                        drop(speaker.say(message));
                    }
                }
                CaptureEvent::StateChanged(state) => {
                    tracing::debug!(?state, "capture state changed");
                }
                CaptureEvent::Stopped => break,
            }
        }

        self.capture.stop_listening().await;
        self.queue.shutdown();
        tracing::info!(submitted, "voice session ended");
        submitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Intent;
    use crate::dispatch::{DispatchOutcome, DomainMutationResult};
    use crate::queue::{CommandExecutor, CommandQueue, QueueConfig};
    use crate::voice::{CaptureConfig, ConsoleRecognizer};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Intent, String)>>);

    #[async_trait]
    impl CommandExecutor for Recorder {
        async fn execute(&self, command: &RecognizedCommand) -> Result<DispatchOutcome> {
            self.0
                .lock()
                .unwrap()
                .push((command.intent, command.raw_text.clone()));
            Ok(DispatchOutcome {
                result: DomainMutationResult::Reply {
                    text: "ok".to_string(),
                },
                feedback: "ok".to_string(),
                processing_time_ms: 0,
                replayed: false,
            })
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn console_lines_flow_through_queue_in_order() {
        let input: &[u8] = b"create task buy milk\n\nadd expense 4.50 for food\nlist my tasks\n";
        let recognizer = Arc::new(ConsoleRecognizer::from_reader(input));
        let (capture, events) = CaptureAdapter::new(
            recognizer,
            CaptureConfig {
                restart_delay: Duration::from_millis(1),
                ..CaptureConfig::default()
            },
        );

        let recorder = Arc::new(Recorder::default());
        let (queue, mut reports, join) = CommandQueue::spawn(
            Arc::clone(&recorder) as _,
            None,
            QueueConfig {
                inter_command_delay: Duration::ZERO,
                ..QueueConfig::default()
            },
        );

        let session = VoiceSession::new(capture, CommandExtractor::default(), queue);
        let submitted = tokio::time::timeout(Duration::from_secs(2), session.run(events))
            .await
            .unwrap();
        assert_eq!(submitted, 3);

        join.await.unwrap();
        let mut sequences = Vec::new();
        while let Ok(report) = reports.try_recv() {
            sequences.push(report.sequence);
        }
        assert_eq!(sequences, vec![1, 2, 3]);

        let executed = recorder.0.lock().unwrap().clone();
        let intents: Vec<Intent> = executed.iter().map(|(i, _)| *i).collect();
        assert_eq!(
            intents,
            vec![Intent::TaskCreate, Intent::ExpenseAdd, Intent::TaskList]
        );
    }
}
