//! Speech-to-text (STT) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::Transcript;
use crate::{Error, Result};

/// Default `OpenAI` API base URL
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Transcribes a recorded utterance
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe encoded audio (WAV, `WebM`, Ogg or MP3)
    ///
    /// `language` is a BCP 47 tag hint; backends may ignore it.
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable or rejects the audio
    async fn transcribe(&self, audio: &[u8], language: Option<&str>) -> Result<Transcript>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Response from `OpenAI` Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// `OpenAI` Whisper transcription backend
pub struct WhisperStt {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl WhisperStt {
    /// Create a new Whisper backend
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }

    /// Point the backend at a different API host
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SpeechToText for WhisperStt {
    async fn transcribe(&self, audio: &[u8], language: Option<&str>) -> Result<Transcript> {
        if audio.is_empty() {
            return Err(Error::Stt("empty audio".to_string()));
        }

        let (file_name, mime) = sniff_audio(audio);
        tracing::debug!(audio_bytes = audio.len(), mime, "starting Whisper transcription");

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name(file_name)
                    .mime_str(mime)
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        if let Some(lang) = language.and_then(primary_subtag) {
            form = form.text("language", lang);
        }

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        let text = result.text.trim().to_string();
        tracing::info!(transcript = %text, "transcription complete");
        Ok(Transcript::final_result(text, 1.0))
    }

    fn name(&self) -> &'static str {
        "whisper"
    }
}

/// Guess a file name and MIME type from the container magic bytes
fn sniff_audio(audio: &[u8]) -> (&'static str, &'static str) {
    match audio {
        [b'R', b'I', b'F', b'F', ..] => ("audio.wav", "audio/wav"),
        [b'O', b'g', b'g', b'S', ..] => ("audio.ogg", "audio/ogg"),
        [b'I', b'D', b'3', ..] | [0xFF, 0xFB | 0xF3 | 0xF2, ..] => ("audio.mp3", "audio/mpeg"),
        _ => ("audio.webm", "audio/webm"),
    }
}

/// "en-US" → "en"; Whisper takes ISO 639-1 codes
fn primary_subtag(tag: &str) -> Option<String> {
    let primary = tag.split(['-', '_']).next()?.trim().to_lowercase();
    (primary.len() == 2).then_some(primary)
}
