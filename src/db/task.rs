//! Task repository

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DbPool, connect, parse_date, parse_datetime};
use crate::command::Priority;
use crate::{Error, Result};

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A stored task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: Priority,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub created_via_voice: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_transcription: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields for a new task
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_via_voice: bool,
    #[serde(default)]
    pub voice_transcription: Option<String>,
}

const TASK_COLUMNS: &str = "id, user_id, title, description, priority, status, due_date, \
     created_via_voice, voice_transcription, created_at, completed_at";

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        priority: Priority::parse(&row.get::<_, String>(4)?).unwrap_or_default(),
        status: TaskStatus::parse(&row.get::<_, String>(5)?).unwrap_or_default(),
        due_date: row.get::<_, Option<String>>(6)?.as_deref().and_then(parse_date),
        created_via_voice: row.get(7)?,
        voice_transcription: row.get(8)?,
        created_at: parse_datetime(&row.get::<_, String>(9)?),
        completed_at: row.get::<_, Option<String>>(10)?.as_deref().map(parse_datetime),
    })
}

/// Task repository
#[derive(Clone)]
pub struct TaskRepo {
    pool: DbPool,
}

impl TaskRepo {
    /// Create a new task repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a pending task
    ///
    /// # Errors
    ///
    /// Returns error if the title is blank or the insert fails
    pub fn create(&self, user_id: &str, task: &NewTask) -> Result<Task> {
        let title = task.title.trim();
        if title.is_empty() {
            return Err(Error::Dispatch("task title must not be empty".to_string()));
        }

        let conn = connect(&self.pool)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO tasks (id, user_id, title, description, priority, status, due_date,
                                created_via_voice, voice_transcription, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7, ?8, ?9)",
            params![
                id,
                user_id,
                title,
                task.description,
                task.priority.as_str(),
                task.due_date.map(|d| d.to_string()),
                task.created_via_voice,
                task.voice_transcription,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::debug!(task_id = %id, user_id, "task created");

        Ok(Task {
            id,
            user_id: user_id.to_string(),
            title: title.to_string(),
            description: task.description.clone(),
            priority: task.priority,
            status: TaskStatus::Pending,
            due_date: task.due_date,
            created_via_voice: task.created_via_voice,
            voice_transcription: task.voice_transcription.clone(),
            created_at: now,
            completed_at: None,
        })
    }

    /// List a user's tasks, newest due date first, undated last
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(
        &self,
        user_id: &str,
        status: Option<TaskStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Task>> {
        let conn = connect(&self.pool)?;
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY due_date IS NULL, due_date DESC, created_at DESC
             LIMIT ?3"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::Database(e.to_string()))?;

        let tasks = stmt
            .query_map(params![user_id, status.map(TaskStatus::as_str), limit], row_to_task)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(tasks)
    }

    /// Number of pending tasks for a user
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count_pending(&self, user_id: &str) -> Result<usize> {
        let conn = connect(&self.pool)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM tasks WHERE user_id = ?1 AND status = 'pending'",
                [user_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Complete the oldest pending task whose title matches
    ///
    /// A case-insensitive exact match wins over a substring match. Returns
    /// `None` when no pending task matches.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn complete_matching(&self, user_id: &str, title: &str) -> Result<Option<Task>> {
        let needle = title.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let conn = connect(&self.pool)?;
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE user_id = ?1 AND status = 'pending' AND instr(lower(title), ?2) > 0
             ORDER BY lower(title) = ?2 DESC, created_at ASC
             LIMIT 1"
        );
        let found = conn
            .query_row(&sql, params![user_id, needle], row_to_task)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        let Some(mut task) = found else {
            return Ok(None);
        };

        let now = Utc::now();
        conn.execute(
            "UPDATE tasks SET status = 'completed', completed_at = ?1 WHERE id = ?2",
            params![now.to_rfc3339(), task.id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::debug!(task_id = %task.id, user_id, "task completed");
        task.status = TaskStatus::Completed;
        task.completed_at = Some(now);
        Ok(Some(task))
    }
}
