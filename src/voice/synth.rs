//! Spoken feedback
//!
//! Feedback is never queued: a new utterance cancels whatever is still
//! playing, so at most one is audible at a time.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::{AbortHandle, JoinHandle};

use crate::Result;

/// Prosody settings for one utterance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechOptions {
    /// Speaking rate, 0.1 to 10
    pub rate: f32,
    /// Pitch, 0 to 2
    pub pitch: f32,
    /// Volume, 0 to 1
    pub volume: f32,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

impl SpeechOptions {
    /// Clamp every field into its valid range
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            rate: self.rate.clamp(0.1, 10.0),
            pitch: self.pitch.clamp(0.0, 2.0),
            volume: self.volume.clamp(0.0, 1.0),
        }
    }
}

/// Device or engine that renders speech
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    /// Speak `text`, resolving when the utterance finishes
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails to render the utterance
    async fn speak(&self, text: &str, options: SpeechOptions) -> Result<()>;

    /// Silence any utterance in progress
    fn cancel(&self);
}

/// Speaks feedback, cancelling the previous utterance first
pub struct FeedbackSpeaker {
    output: Arc<dyn SpeechOutput>,
    options: SpeechOptions,
    current: Mutex<Option<AbortHandle>>,
}

impl FeedbackSpeaker {
    #[must_use]
    pub fn new(output: Arc<dyn SpeechOutput>) -> Self {
        Self::with_options(output, SpeechOptions::default())
    }

    #[must_use]
    pub fn with_options(output: Arc<dyn SpeechOutput>, options: SpeechOptions) -> Self {
        Self {
            output,
            options: options.clamped(),
            current: Mutex::new(None),
        }
    }

    /// Speak with the default options
    pub fn say(&self, text: impl Into<String>) -> JoinHandle<Result<()>> {
        self.speak(text, self.options)
    }

    /// Cancel any current utterance and start speaking `text`
    ///
    /// The returned handle resolves when this utterance finishes; it is
    /// cancelled if another `speak` call supersedes it.
    pub fn speak(&self, text: impl Into<String>, options: SpeechOptions) -> JoinHandle<Result<()>> {
        let text = text.into();
        let options = options.clamped();

        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = current.take()
            && !previous.is_finished()
        {
            tracing::debug!("cancelling previous utterance");
            previous.abort();
            self.output.cancel();
        }

        let output = Arc::clone(&self.output);
        let handle = tokio::spawn(async move {
            tracing::trace!(text = %text, "speaking");
            output.speak(&text, options).await
        });
        *current = Some(handle.abort_handle());
        handle
    }

    /// Silence the current utterance, if any
    pub fn cancel(&self) {
        let current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = current {
            handle.abort();
            self.output.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingOutput {
        completed: Mutex<Vec<String>>,
        options: Mutex<Vec<SpeechOptions>>,
        cancels: AtomicUsize,
    }

    #[async_trait]
    impl SpeechOutput for RecordingOutput {
        async fn speak(&self, text: &str, options: SpeechOptions) -> Result<()> {
            self.options.lock().unwrap().push(options);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.completed.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn newer_utterance_cancels_older() {
        let output = Arc::new(RecordingOutput::default());
        let speaker = FeedbackSpeaker::new(Arc::clone(&output) as _);

        let first = speaker.say("A");
        tokio::task::yield_now().await;
        let second = speaker.say("B");

        second.await.unwrap().unwrap();
        assert!(first.await.unwrap_err().is_cancelled());
        assert_eq!(*output.completed.lock().unwrap(), vec!["B".to_string()]);
        assert_eq!(output.cancels.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn finished_utterance_is_not_cancelled() {
        let output = Arc::new(RecordingOutput::default());
        let speaker = FeedbackSpeaker::new(Arc::clone(&output) as _);

        speaker.say("A").await.unwrap().unwrap();
        speaker.say("B").await.unwrap().unwrap();

        assert_eq!(output.completed.lock().unwrap().len(), 2);
        assert_eq!(output.cancels.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn options_are_clamped() {
        let output = Arc::new(RecordingOutput::default());
        let speaker = FeedbackSpeaker::new(Arc::clone(&output) as _);

        let options = SpeechOptions {
            rate: 50.0,
            pitch: -1.0,
            volume: 3.0,
        };
        speaker.speak("loud", options).await.unwrap().unwrap();

        let seen = output.options.lock().unwrap()[0];
        assert!((seen.rate - 10.0).abs() < f32::EPSILON);
        assert!(seen.pitch.abs() < f32::EPSILON);
        assert!((seen.volume - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn cancel_silences_current() {
        let output = Arc::new(RecordingOutput::default());
        let speaker = FeedbackSpeaker::new(Arc::clone(&output) as _);

        let handle = speaker.say("A");
        speaker.cancel();

        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(output.completed.lock().unwrap().is_empty());
    }
}
