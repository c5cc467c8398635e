//! Speech input and output
//!
//! Capture turns a streaming recognizer into final transcripts
//! ([`CaptureAdapter`]); synthesis speaks feedback with at most one
//! utterance audible ([`FeedbackSpeaker`]). Remote STT/TTS backends live in
//! [`stt`] and [`tts`].

mod capture;
mod console;
pub mod stt;
mod synth;
pub mod tts;

pub use capture::{
    CaptureAdapter, CaptureConfig, CaptureEvent, CaptureState, RecognitionError, RecognitionEvent,
    SpeechRecognizer,
};
pub use console::{ConsoleRecognizer, ConsoleSpeechOutput};
pub use stt::{SpeechToText, WhisperStt};
pub use synth::{FeedbackSpeaker, SpeechOptions, SpeechOutput};
pub use tts::{OpenAiTts, TextToSpeech};

use serde::{Deserialize, Serialize};

/// Text produced by a speech recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub text: String,
    /// Recognizer confidence in `[0, 1]`; 1.0 when the backend reports none
    pub confidence: f32,
    /// Interim results may still change; only final ones become commands
    pub is_final: bool,
}

impl Transcript {
    /// A final transcript
    #[must_use]
    pub fn final_result(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            is_final: true,
        }
    }

    /// An interim (partial) transcript
    #[must_use]
    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: 0.0,
            is_final: false,
        }
    }
}
