//! Remote command executor
//!
//! Sends recognized commands to a gateway's `POST /api/voice/command`
//! endpoint on behalf of one user.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::api::voice::{CommandRequest, CommandResponse};
use crate::api::{ApiErrorBody, USER_ID_HEADER};
use crate::command::RecognizedCommand;
use crate::dispatch::DispatchOutcome;
use crate::queue::CommandExecutor;
use crate::{Error, Result};

/// Request timeout for one command
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes commands against a remote gateway
#[derive(Debug, Clone)]
pub struct HttpCommandExecutor {
    client: Client,
    base_url: String,
    user_id: String,
    api_key: Option<SecretString>,
}

impl HttpCommandExecutor {
    /// Create an executor for `user_id` against the gateway at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id: user_id.into(),
            api_key: None,
        })
    }

    /// Send `Authorization: Bearer <key>` with every request
    #[must_use]
    pub fn with_api_key(mut self, key: Option<SecretString>) -> Self {
        self.api_key = key;
        self
    }

    /// Gateway base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CommandExecutor for HttpCommandExecutor {
    async fn execute(&self, command: &RecognizedCommand) -> Result<DispatchOutcome> {
        let url = format!("{}/api/voice/command", self.base_url);

        let mut req = self
            .client
            .post(&url)
            .header(USER_ID_HEADER, &self.user_id)
            .json(&CommandRequest::from_command(command));

        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map_or(body, |b| b.error.message);
            tracing::debug!(status = status.as_u16(), %message, "command rejected by gateway");
            return Err(Error::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let body: CommandResponse = response.json().await?;
        Ok(body.into_outcome())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
