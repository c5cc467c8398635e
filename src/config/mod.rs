//! Configuration management for the voxtask gateway
//!
//! Values resolve env > TOML file > default. Environment lookups go through
//! an injectable function so tests never touch the process environment.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::dispatch::DEDUP_TTL_SECS;
use crate::queue::{QueueConfig, RetryPolicy};
use crate::voice::CaptureConfig;
use crate::{Error, Result};
use file::VoxtaskConfigFile;

/// Default API server port
pub const DEFAULT_PORT: u16 = 18790;

/// Default recognition language
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (database)
    pub data_dir: PathBuf,

    /// `SQLite` database file
    pub db_path: PathBuf,

    /// HTTP API server configuration
    pub api_server: ApiServerConfig,

    /// Speech configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Client queue tuning
    pub queue: QueueConfig,

    /// How long repeated command ids are replayed
    pub dedup_ttl: Duration,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Bearer key required on API requests (from `VOXTASK_API_KEY`)
    pub api_key: Option<SecretString>,

    /// Requests per minute per client; `None` disables rate limiting
    pub rate_limit_per_minute: Option<u32>,
}

/// Speech configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// BCP-47 language tag
    pub language: String,

    /// Minimum confidence for a final transcript
    pub confidence_threshold: f32,

    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            confidence_threshold: CaptureConfig::default().confidence_threshold,
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
        }
    }
}

impl VoiceConfig {
    /// Capture settings for this language and threshold
    #[must_use]
    pub fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            language: self.language.clone(),
            confidence_threshold: self.confidence_threshold,
            ..CaptureConfig::default()
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` key for Whisper STT and speech TTS
    pub openai: Option<SecretString>,
}

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        let config = Self::from_sources(fc, |key| std::env::var(key).ok())?;

        std::fs::create_dir_all(&config.data_dir).ok();
        Ok(config)
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn from_sources(fc: VoxtaskConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
        };

        let api_server = ApiServerConfig {
            port: parse_env(&env, "VOXTASK_PORT")?
                .or(fc.server.port)
                .unwrap_or(DEFAULT_PORT),
            api_key: env("VOXTASK_API_KEY")
                .or(fc.server.api_key)
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
            rate_limit_per_minute: parse_env(&env, "VOXTASK_RATE_LIMIT")?
                .or(fc.server.rate_limit_per_minute)
                .filter(|&n| n > 0),
        };

        let defaults = VoiceConfig::default();
        let confidence_threshold = parse_env(&env, "VOXTASK_CONFIDENCE_THRESHOLD")?
            .or(fc.voice.confidence_threshold)
            .unwrap_or(defaults.confidence_threshold);
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(Error::Config(format!(
                "confidence threshold must be between 0 and 1, got {confidence_threshold}"
            )));
        }

        let voice = VoiceConfig {
            language: env("VOXTASK_LANGUAGE")
                .or(fc.voice.language)
                .unwrap_or(defaults.language),
            confidence_threshold,
            stt_model: env("VOXTASK_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(defaults.stt_model),
            tts_model: env("VOXTASK_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(defaults.tts_model),
            tts_voice: env("VOXTASK_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(defaults.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(defaults.tts_speed).clamp(0.25, 4.0),
        };

        let retry_defaults = RetryPolicy::default();
        let queue = QueueConfig {
            inter_command_delay: fc
                .queue
                .inter_command_delay_ms
                .map_or(QueueConfig::default().inter_command_delay, Duration::from_millis),
            retry: RetryPolicy {
                max_retries: fc.queue.max_retries.unwrap_or(retry_defaults.max_retries),
                base_delay: fc
                    .queue
                    .retry_base_delay_ms
                    .map_or(retry_defaults.base_delay, Duration::from_millis),
                max_delay: retry_defaults.max_delay,
            },
        };

        let dedup_ttl = Duration::from_secs(
            parse_env(&env, "VOXTASK_DEDUP_TTL_SECS")?
                .or(fc.dispatch.dedup_ttl_secs)
                .unwrap_or(DEDUP_TTL_SECS),
        );

        // ~/.local/share/voxtask on Linux
        let data_dir = env("VOXTASK_DATA_DIR").map_or_else(
            || {
                directories::BaseDirs::new()
                    .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("voxtask"))
            },
            PathBuf::from,
        );

        let db_path = env("VOXTASK_DB_PATH")
            .or(fc.server.db_path)
            .map_or_else(|| data_dir.join("voxtask.db"), PathBuf::from);

        Ok(Self {
            data_dir,
            db_path,
            api_server,
            voice,
            api_keys,
            queue,
            dedup_ttl,
        })
    }
}

fn parse_env<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid value for {key}: {raw}")))
        })
        .transpose()
}
