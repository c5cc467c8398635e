//! Voice command log repository

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;
use uuid::Uuid;

use super::{DbPool, connect, parse_datetime};
use crate::command::{Entities, Intent};
use crate::{Error, Result};

/// One dispatched voice command and how it went
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCommandLog {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    pub transcription: String,
    pub intent: Intent,
    pub entities: Entities,
    pub confidence: f32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_result: Option<serde_json::Value>,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new log row
#[derive(Debug, Clone)]
pub struct NewVoiceCommandLog<'a> {
    pub user_id: &'a str,
    pub command_id: Option<&'a str>,
    pub transcription: &'a str,
    pub intent: Intent,
    pub entities: &'a Entities,
    pub confidence: f32,
    pub success: bool,
    pub error: Option<&'a str>,
    pub action_result: Option<serde_json::Value>,
    pub processing_time_ms: u64,
}

#[allow(clippy::cast_possible_truncation)]
fn row_to_log(row: &rusqlite::Row<'_>) -> rusqlite::Result<VoiceCommandLog> {
    let entities: String = row.get(5)?;
    let action_result: Option<String> = row.get(10)?;
    let processing_time_ms: i64 = row.get(11)?;

    Ok(VoiceCommandLog {
        id: row.get(0)?,
        user_id: row.get(1)?,
        command_id: row.get(2)?,
        transcription: row.get(3)?,
        intent: Intent::parse(&row.get::<_, String>(4)?),
        entities: serde_json::from_str(&entities).unwrap_or_default(),
        confidence: row.get::<_, f64>(6)? as f32,
        success: row.get(7)?,
        error: row.get(8)?,
        action_result: action_result.and_then(|s| serde_json::from_str(&s).ok()),
        processing_time_ms: u64::try_from(processing_time_ms).unwrap_or_default(),
        created_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

/// Voice command log repository
#[derive(Clone)]
pub struct VoiceCommandRepo {
    pool: DbPool,
}

impl VoiceCommandRepo {
    /// Create a new voice command repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append a log row
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn create(&self, entry: &NewVoiceCommandLog<'_>) -> Result<VoiceCommandLog> {
        let conn = connect(&self.pool)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let entities = serde_json::to_string(entry.entities)?;
        let action_result = entry
            .action_result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let processing_time_ms = i64::try_from(entry.processing_time_ms).unwrap_or(i64::MAX);

        conn.execute(
            "INSERT INTO voice_commands (id, user_id, command_id, transcription, intent, entities,
                                         confidence, success, error, created_at, action_result,
                                         processing_time_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                id,
                entry.user_id,
                entry.command_id,
                entry.transcription,
                entry.intent.as_str(),
                entities,
                f64::from(entry.confidence),
                entry.success,
                entry.error,
                now.to_rfc3339(),
                action_result,
                processing_time_ms,
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(VoiceCommandLog {
            id,
            user_id: entry.user_id.to_string(),
            command_id: entry.command_id.map(str::to_string),
            transcription: entry.transcription.to_string(),
            intent: entry.intent,
            entities: entry.entities.clone(),
            confidence: entry.confidence,
            success: entry.success,
            error: entry.error.map(str::to_string),
            action_result: entry.action_result.clone(),
            processing_time_ms: entry.processing_time_ms,
            created_at: now,
        })
    }

    /// Most recent commands for a user, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<VoiceCommandLog>> {
        let conn = connect(&self.pool)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, command_id, transcription, intent, entities, confidence,
                        success, error, created_at, action_result, processing_time_ms
                 FROM voice_commands WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let logs = stmt
            .query_map(params![user_id, limit], row_to_log)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(logs)
    }

    /// Number of rows logged for a command id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count_for_command(&self, user_id: &str, command_id: &str) -> Result<usize> {
        let conn = connect(&self.pool)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM voice_commands WHERE user_id = ?1 AND command_id = ?2",
                [user_id, command_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or_default())
    }
}
