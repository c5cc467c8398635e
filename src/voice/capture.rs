//! Speech capture from a streaming recognizer
//!
//! The adapter keeps a *desired* listening flag separate from the
//! recognizer's actual state. When a recognition session ends on its own
//! while the user still wants to listen, a new session is started after a
//! short delay. Fatal errors (no recognizer, permission denied) clear the
//! desired flag so the adapter settles in [`CaptureState::Idle`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use super::Transcript;

/// Events produced by a recognition session
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// Interim or final text
    Result(Transcript),
    /// Recognizer reported a problem
    Error(RecognitionError),
    /// Session ended; the recognizer must be started again to hear more
    End,
}

/// Failure reported by a speech recognizer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognitionError {
    #[error("no speech detected")]
    NoSpeech,
    #[error("speech recognition is not supported on this device")]
    NotSupported,
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("recognition aborted")]
    Aborted,
    #[error("audio input unavailable: {0}")]
    AudioCapture(String),
    #[error("network error during recognition: {0}")]
    Network(String),
    #[error("recognition error: {0}")]
    Other(String),
}

impl RecognitionError {
    /// Whether capture must stop instead of restarting
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NotSupported | Self::PermissionDenied | Self::AudioCapture(_)
        )
    }
}

/// A streaming speech recognizer
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Begin a recognition session
    ///
    /// Events arrive on the returned channel until [`RecognitionEvent::End`]
    /// or the sender is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RecognitionError::NotSupported`] or
    /// [`RecognitionError::PermissionDenied`] when no session can start
    async fn start(
        &self,
        language: &str,
    ) -> std::result::Result<mpsc::Receiver<RecognitionEvent>, RecognitionError>;

    /// Ask the current session to end
    async fn stop(&self);
}

/// Capture settings
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// BCP 47 language tag passed to the recognizer
    pub language: String,
    /// Final transcripts below this confidence are reported, not executed
    pub confidence_threshold: f32,
    /// Pause before restarting after an unexpected end
    pub restart_delay: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            confidence_threshold: 0.5,
            restart_delay: Duration::from_millis(100),
        }
    }
}

/// Observable capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Listening,
}

/// Output of the capture adapter
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// Partial text for display only
    Interim(Transcript),
    /// Final text at or above the confidence threshold
    Final(Transcript),
    /// User-facing notice (low confidence, recognizer errors)
    Notice(String),
    StateChanged(CaptureState),
    /// Capture ended for good, by request or after a fatal error
    Stopped,
}

struct Shared {
    recognizer: Arc<dyn SpeechRecognizer>,
    config: CaptureConfig,
    desired: AtomicBool,
    generation: AtomicU64,
    state: watch::Sender<CaptureState>,
    events: mpsc::UnboundedSender<CaptureEvent>,
}

impl Shared {
    fn emit(&self, event: CaptureEvent) {
        // Receiver gone means nobody is listening for events; capture continues
        let _ = self.events.send(event);
    }

    fn set_state(&self, state: CaptureState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            self.emit(CaptureEvent::StateChanged(state));
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.desired.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }
}

/// Bridges a [`SpeechRecognizer`] to final transcripts
pub struct CaptureAdapter {
    shared: Arc<Shared>,
}

impl CaptureAdapter {
    /// Create an adapter and the receiver for its events
    #[must_use]
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        config: CaptureConfig,
    ) -> (Self, mpsc::UnboundedReceiver<CaptureEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(CaptureState::Idle);

        let shared = Arc::new(Shared {
            recognizer,
            config,
            desired: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            state,
            events,
        });

        (Self { shared }, rx)
    }

    /// Start listening; a no-op if already listening
    pub fn start_listening(&self) {
        if self.shared.desired.swap(true, Ordering::SeqCst) {
            return;
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(generation, "capture started");
        tokio::spawn(run(Arc::clone(&self.shared), generation));
    }

    /// Stop listening; a no-op if not listening
    pub async fn stop_listening(&self) {
        if !self.shared.desired.swap(false, Ordering::SeqCst) {
            return;
        }

        tracing::debug!("capture stopping");
        self.shared.recognizer.stop().await;
    }

    /// Whether the user wants capture to be running
    #[must_use]
    pub fn wants_listening(&self) -> bool {
        self.shared.desired.load(Ordering::SeqCst)
    }

    /// Current recognizer state
    #[must_use]
    pub fn state(&self) -> CaptureState {
        *self.shared.state.borrow()
    }

    /// Watch state transitions
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<CaptureState> {
        self.shared.state.subscribe()
    }
}

async fn run(shared: Arc<Shared>, generation: u64) {
    while shared.is_current(generation) {
        let mut session = match shared.recognizer.start(&shared.config.language).await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::warn!(error = %e, "recognizer failed to start");
                shared.emit(CaptureEvent::Notice(e.to_string()));
                if e.is_fatal() {
                    shared.desired.store(false, Ordering::SeqCst);
                    break;
                }
                tokio::time::sleep(shared.config.restart_delay).await;
                continue;
            }
        };

        // stop_listening() may have raced the start
        if !shared.is_current(generation) {
            shared.recognizer.stop().await;
            break;
        }

        shared.set_state(CaptureState::Listening);
        let fatal = drain_session(&shared, &mut session).await;
        if fatal {
            shared.desired.store(false, Ordering::SeqCst);
            // The session may still be open after a fatal error
            shared.recognizer.stop().await;
        }
        shared.set_state(CaptureState::Idle);

        if fatal {
            break;
        }
        if !shared.is_current(generation) {
            break;
        }

        tracing::debug!(delay = ?shared.config.restart_delay, "recognition ended, restarting");
        tokio::time::sleep(shared.config.restart_delay).await;
    }

    tracing::debug!(generation, "capture loop finished");
    if !shared.desired.load(Ordering::SeqCst) && shared.generation.load(Ordering::SeqCst) == generation {
        shared.emit(CaptureEvent::Stopped);
    }
}

/// Forward one session's events; returns true on a fatal error
async fn drain_session(shared: &Shared, session: &mut mpsc::Receiver<RecognitionEvent>) -> bool {
    while let Some(event) = session.recv().await {
        match event {
            RecognitionEvent::Result(transcript) if !transcript.is_final => {
                shared.emit(CaptureEvent::Interim(transcript));
            }
            RecognitionEvent::Result(transcript) => {
                if transcript.text.trim().is_empty() {
                    continue;
                }
                if transcript.confidence < shared.config.confidence_threshold {
                    tracing::debug!(
                        confidence = transcript.confidence,
                        threshold = shared.config.confidence_threshold,
                        "low confidence transcript"
                    );
                    shared.emit(CaptureEvent::Notice(format!(
                        "Low confidence ({:.0}%), please try again.",
                        transcript.confidence * 100.0
                    )));
                } else {
                    shared.emit(CaptureEvent::Final(transcript));
                }
            }
            RecognitionEvent::Error(e) => {
                tracing::warn!(error = %e, fatal = e.is_fatal(), "recognition error");
                shared.emit(CaptureEvent::Notice(e.to_string()));
                if e.is_fatal() {
                    return true;
                }
            }
            RecognitionEvent::End => break,
        }
    }

    false
}
