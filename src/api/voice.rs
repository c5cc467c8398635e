//! Voice command endpoints
//!
//! Commands arrive either as recorded audio (transcribed server-side) or as
//! text already recognized on the client. Both paths end in the dispatcher.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Local;
use serde::{Deserialize, Serialize};

use super::auth::CurrentUser;
use super::{ApiError, ApiState};
use crate::command::{CommandExtractor, Entities, Intent, RecognizedCommand};
use crate::db::VoiceCommandLog;
use crate::dispatch::{DispatchOutcome, DispatchRequest, DomainMutationResult};

/// Default and maximum page size for the command history
const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 100;

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/process-command", post(process_command))
        .route("/command", post(command))
        .route("/speak", post(speak))
        .route("/commands", get(commands))
        .route("/status", get(status))
        .with_state(state)
}

/// Text command, optionally pre-extracted by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    /// When absent the server extracts from `text`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Entities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl CommandRequest {
    #[must_use]
    pub fn from_command(command: &RecognizedCommand) -> Self {
        Self {
            text: command.raw_text.clone(),
            command_id: Some(command.id.to_string()),
            intent: Some(command.intent),
            entities: Some(command.entities.clone()),
            confidence: Some(command.confidence),
            language: Some(command.language.clone()),
        }
    }
}

/// Recorded command audio
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessCommandRequest {
    /// Base64-encoded audio
    pub audio_data: String,
    #[serde(default)]
    pub command_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Outcome of a voice command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub transcription: String,
    pub intent: Intent,
    pub confidence: f32,
    /// Milliseconds spent dispatching
    pub processing_time: u64,
    pub action_result: DomainMutationResult,
    pub feedback: String,
    pub replayed: bool,
}

impl CommandResponse {
    fn new(request: &DispatchRequest, outcome: DispatchOutcome) -> Self {
        Self {
            transcription: request.text.clone(),
            intent: request.intent,
            confidence: request.confidence,
            processing_time: outcome.processing_time_ms,
            action_result: outcome.result,
            feedback: outcome.feedback,
            replayed: outcome.replayed,
        }
    }

    /// Convert back into the dispatcher's outcome
    #[must_use]
    pub fn into_outcome(self) -> DispatchOutcome {
        DispatchOutcome {
            result: self.action_result,
            feedback: self.feedback,
            processing_time_ms: self.processing_time,
            replayed: self.replayed,
        }
    }
}

/// Speech synthesis request
#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Which backends are loaded
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceStatus {
    pub stt_loaded: bool,
    pub tts_loaded: bool,
    pub responder_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stt_backend: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_backend: Option<&'static str>,
    pub responder: &'static str,
    pub language: String,
}

/// Transcribe recorded audio, then dispatch it
async fn process_command(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<ProcessCommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let stt = state
        .stt
        .as_ref()
        .ok_or(ApiError::NotConfigured("speech-to-text is not configured"))?;

    let audio = BASE64
        .decode(request.audio_data.trim())
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 audio: {e}")))?;
    if audio.is_empty() {
        return Err(ApiError::BadRequest("empty audio data".to_string()));
    }

    let language = request.language.unwrap_or_else(|| state.language.clone());
    let transcript = stt.transcribe(&audio, Some(language.as_str())).await?;

    tracing::debug!(
        user_id,
        backend = stt.name(),
        confidence = transcript.confidence,
        "audio transcribed"
    );

    let command = CommandRequest {
        text: transcript.text,
        command_id: request.command_id,
        intent: None,
        entities: None,
        confidence: Some(transcript.confidence),
        language: Some(language),
    };
    execute(&state, &user_id, command).await.map(Json)
}

/// Dispatch a text command
async fn command(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    if request.text.trim().is_empty() && request.intent.is_none() {
        return Err(ApiError::BadRequest("command text is empty".to_string()));
    }
    execute(&state, &user_id, request).await.map(Json)
}

async fn execute(
    state: &ApiState,
    user_id: &str,
    request: CommandRequest,
) -> Result<CommandResponse, ApiError> {
    let text = request.text.trim().to_string();
    let confidence = request.confidence.unwrap_or(1.0).clamp(0.0, 1.0);

    let (intent, entities) = match request.intent {
        Some(intent) => (intent, request.entities.unwrap_or_default()),
        None => {
            let language = request.language.as_deref().unwrap_or(&state.language);
            let extraction = CommandExtractor::for_language(language)
                .extract(&text, Local::now().date_naive());
            (extraction.intent, extraction.entities)
        }
    };

    let dispatch = DispatchRequest {
        command_id: request.command_id,
        text,
        intent,
        entities,
        confidence,
    };
    let outcome = state.dispatcher.dispatch(user_id, dispatch.clone()).await;

    if let Some(message) = outcome.result.error_message() {
        return Err(ApiError::DispatchFailed(message.to_string()));
    }

    Ok(CommandResponse::new(&dispatch, outcome))
}

/// Synthesize speech, returned as MP3
async fn speak(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SpeakRequest>,
) -> Result<Response, ApiError> {
    let tts = state
        .tts
        .as_ref()
        .ok_or(ApiError::NotConfigured("text-to-speech is not configured"))?;

    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("empty text".to_string()));
    }

    let audio = tts.synthesize(&request.text, request.voice.as_deref()).await?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}

/// Recent command log for the caller, newest first
async fn commands(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<VoiceCommandLog>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    Ok(Json(state.voice_log.list_for_user(&user_id, limit)?))
}

async fn status(State(state): State<Arc<ApiState>>) -> Json<VoiceStatus> {
    Json(VoiceStatus {
        stt_loaded: state.stt.is_some(),
        tts_loaded: state.tts.is_some(),
        responder_loaded: true,
        stt_backend: state.stt.as_ref().map(|s| s.name()),
        tts_backend: state.tts.as_ref().map(|t| t.name()),
        responder: state.dispatcher.responder_name(),
        language: state.language.clone(),
    })
}
