//! TOML configuration file loading
//!
//! Supports `~/.config/voxtask/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VoxtaskConfigFile {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Speech configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Client command queue
    #[serde(default)]
    pub queue: QueueFileConfig,

    /// Server-side dispatch
    #[serde(default)]
    pub dispatch: DispatchFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Bearer key required on every API request
    pub api_key: Option<String>,

    /// Requests per minute per client (unset disables limiting)
    pub rate_limit_per_minute: Option<u32>,

    /// `SQLite` database path
    pub db_path: Option<String>,
}

/// Speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// BCP-47 language tag (e.g. "en-US")
    pub language: Option<String>,

    /// Final transcripts below this confidence are rejected
    pub confidence_threshold: Option<f32>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}

/// Command queue configuration
#[derive(Debug, Default, Deserialize)]
pub struct QueueFileConfig {
    /// Pause between commands in milliseconds
    pub inter_command_delay_ms: Option<u64>,

    /// Retries for transient failures
    pub max_retries: Option<u32>,

    /// First retry delay in milliseconds
    pub retry_base_delay_ms: Option<u64>,
}

/// Dispatch configuration
#[derive(Debug, Default, Deserialize)]
pub struct DispatchFileConfig {
    /// How long repeated command ids are replayed, in seconds
    pub dedup_ttl_secs: Option<u64>,
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the content is not valid TOML for this schema
pub fn parse_config(content: &str) -> Result<VoxtaskConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `VoxtaskConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file() -> VoxtaskConfigFile {
    config_file_path().map_or_else(VoxtaskConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
#[must_use]
pub fn load_config_file_from(path: &Path) -> VoxtaskConfigFile {
    if !path.exists() {
        return VoxtaskConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VoxtaskConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VoxtaskConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voxtask/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voxtask").join("config.toml"))
}
