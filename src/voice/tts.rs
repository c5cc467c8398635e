//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::stt::OPENAI_BASE_URL;
use crate::{Error, Result};

/// Voices the `OpenAI` speech endpoint accepts
pub const OPENAI_VOICES: &[&str] = &[
    "alloy", "ash", "coral", "echo", "fable", "nova", "onyx", "sage", "shimmer",
];

/// Synthesizes speech audio from text
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize `text`, returning MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// `OpenAI` speech backend
pub struct OpenAiTts {
    client: reqwest::Client,
    api_key: SecretString,
    voice: String,
    speed: f32,
    model: String,
    base_url: String,
}

impl OpenAiTts {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString, voice: String, speed: f32) -> Result<Self> {
        Self::with_model(api_key, voice, speed, "tts-1".to_string())
    }

    /// Create a new TTS instance using `OpenAI` with custom model
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn with_model(
        api_key: SecretString,
        voice: String,
        speed: f32,
        model: String,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed: speed.clamp(0.25, 4.0),
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
impl TextToSpeech for OpenAiTts {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        if text.trim().is_empty() {
            return Err(Error::Tts("nothing to synthesize".to_string()));
        }

        let voice = match voice {
            Some(v) if OPENAI_VOICES.contains(&v) => v,
            Some(v) => {
                tracing::debug!(voice = v, fallback = %self.voice, "unknown voice, using default");
                self.voice.as_str()
            }
            None => self.voice.as_str(),
        };

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(chars = text.len(), audio_bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tts(server: &MockServer) -> OpenAiTts {
        OpenAiTts::new(SecretString::from("sk-test".to_string()), "alloy".to_string(), 1.0)
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn returns_audio_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .and(body_partial_json(serde_json::json!({"input": "Task created", "voice": "nova"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xFB, 0x90]))
            .expect(1)
            .mount(&server)
            .await;

        let audio = tts(&server).synthesize("Task created", Some("nova")).await.unwrap();
        assert_eq!(audio, vec![0xFF, 0xFB, 0x90]);
    }

    #[tokio::test]
    async fn unknown_voice_falls_back_to_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .and(body_partial_json(serde_json::json!({"voice": "alloy"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let audio = tts(&server).synthesize("hello", Some("robot")).await.unwrap();
        assert_eq!(audio.len(), 3);
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let server = MockServer::start().await;
        assert!(tts(&server).synthesize("  ", None).await.is_err());
    }

    #[tokio::test]
    async fn api_error_maps_to_tts_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = tts(&server).synthesize("hello", None).await.unwrap_err();
        assert!(matches!(err, Error::Tts(msg) if msg.contains("500")));
    }
}
