//! HTTP API server for the voxtask gateway

mod auth;
mod error;
pub mod financial;
pub mod health;
pub mod rate_limit;
pub mod tasks;
pub mod voice;

pub use auth::CurrentUser;
pub use error::{ApiError, ApiErrorBody, ErrorDetail};

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use secrecy::SecretString;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::config::DEFAULT_LANGUAGE;
use crate::db::{DbPool, FinancialRepo, TaskRepo, UserRepo, VoiceCommandRepo};
use crate::dispatch::{Dispatcher, IntentResponder};
use crate::voice::{SpeechToText, TextToSpeech};

/// Header naming the user a request acts for
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared state for API handlers
pub struct ApiState {
    pub db: DbPool,
    pub dispatcher: Dispatcher,
    pub users: UserRepo,
    pub tasks: TaskRepo,
    pub financial: FinancialRepo,
    pub voice_log: VoiceCommandRepo,
    pub api_key: Option<SecretString>,
    pub stt: Option<Arc<dyn SpeechToText>>,
    pub tts: Option<Arc<dyn TextToSpeech>>,
    /// Default language for server-side extraction
    pub language: String,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    db: DbPool,
    port: u16,
    api_key: Option<SecretString>,
    stt: Option<Arc<dyn SpeechToText>>,
    tts: Option<Arc<dyn TextToSpeech>>,
    responder: Option<Arc<dyn IntentResponder>>,
    dedup_ttl: Option<Duration>,
    language: String,
    rate_limit_per_minute: Option<u32>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(db: DbPool, port: u16) -> Self {
        Self {
            db,
            port,
            api_key: None,
            stt: None,
            tts: None,
            responder: None,
            dedup_ttl: None,
            language: DEFAULT_LANGUAGE.to_string(),
            rate_limit_per_minute: None,
        }
    }

    /// Require `Authorization: Bearer <key>` on API routes
    #[must_use]
    pub fn api_key(mut self, key: Option<SecretString>) -> Self {
        self.api_key = key;
        self
    }

    /// Set the speech-to-text backend for `process-command`
    #[must_use]
    pub fn stt(mut self, stt: Arc<dyn SpeechToText>) -> Self {
        self.stt = Some(stt);
        self
    }

    /// Set the text-to-speech backend for `speak`
    #[must_use]
    pub fn tts(mut self, tts: Arc<dyn TextToSpeech>) -> Self {
        self.tts = Some(tts);
        self
    }

    /// Replace the template responder for `joke` / `help`
    #[must_use]
    pub fn responder(mut self, responder: Arc<dyn IntentResponder>) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Set the replay window for repeated command ids
    #[must_use]
    pub const fn dedup_ttl(mut self, ttl: Duration) -> Self {
        self.dedup_ttl = Some(ttl);
        self
    }

    /// Set the default extraction language
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Limit requests per minute across all clients
    #[must_use]
    pub const fn rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.rate_limit_per_minute = requests_per_minute;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let mut dispatcher = Dispatcher::new(self.db.clone());
        if let Some(responder) = self.responder {
            dispatcher = dispatcher.with_responder(responder);
        }
        if let Some(ttl) = self.dedup_ttl {
            dispatcher = dispatcher.with_dedup_ttl(ttl);
        }

        let state = Arc::new(ApiState {
            dispatcher,
            users: UserRepo::new(self.db.clone()),
            tasks: TaskRepo::new(self.db.clone()),
            financial: FinancialRepo::new(self.db.clone()),
            voice_log: VoiceCommandRepo::new(self.db.clone()),
            db: self.db,
            api_key: self.api_key,
            stt: self.stt,
            tts: self.tts,
            language: self.language,
            rate_limiter: self.rate_limit_per_minute.map(rate_limit::create_limiter),
        });

        ApiServer {
            state,
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Shared handler state
    #[must_use]
    pub const fn state(&self) -> &Arc<ApiState> {
        &self.state
    }

    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let api = Router::new()
            .nest("/api/voice", voice::router(self.state.clone()))
            .nest("/api/tasks", tasks::router(self.state.clone()))
            .nest("/api/financial", financial::router(self.state.clone()))
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                auth::require_api_key,
            ));

        let router = api
            .merge(health::router(self.state.clone()))
            .layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                rate_limit::rate_limit_middleware,
            ));

        // CORS layer for cross-origin requests from frontend
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        if self.state.api_key.is_none() {
            tracing::warn!("API key not configured - allowing unauthenticated access");
        }

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(
            port = self.port,
            stt = self.state.stt.is_some(),
            tts = self.state.tts.is_some(),
            "API server listening"
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
