//! User repository

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde::Serialize;

use super::{DbPool, connect, parse_datetime};
use crate::{Error, Result};

/// A user; commands, tasks and records are scoped to one
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        created_at: parse_datetime(&row.get::<_, String>(1)?),
        updated_at: parse_datetime(&row.get::<_, String>(2)?),
    })
}

/// User repository
#[derive(Clone)]
pub struct UserRepo {
    pool: DbPool,
}

impl UserRepo {
    /// Create a new user repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find or create a user
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_or_create(&self, id: &str) -> Result<User> {
        if id.trim().is_empty() {
            return Err(Error::Auth("user id must not be empty".to_string()));
        }

        if let Some(user) = self.find(id)? {
            return Ok(user);
        }

        let conn = connect(&self.pool)?;
        let now = Utc::now();
        let stamp = now.to_rfc3339();

        conn.execute(
            "INSERT INTO users (id, created_at, updated_at) VALUES (?1, ?2, ?2)",
            [id, stamp.as_str()],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::info!(user_id = id, "user created");
        Ok(User {
            id: id.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Find a user by ID (returns None if not found)
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find(&self, id: &str) -> Result<Option<User>> {
        let conn = connect(&self.pool)?;

        conn.query_row(
            "SELECT id, created_at, updated_at FROM users WHERE id = ?1",
            [id],
            row_to_user,
        )
        .optional()
        .map_err(|e| Error::Database(e.to_string()))
    }

    /// List all users
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_all(&self) -> Result<Vec<User>> {
        let conn = connect(&self.pool)?;

        let mut stmt = conn
            .prepare("SELECT id, created_at, updated_at FROM users ORDER BY created_at DESC")
            .map_err(|e| Error::Database(e.to_string()))?;

        let users = stmt
            .query_map([], row_to_user)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn setup() -> UserRepo {
        let pool = init_memory().unwrap();
        UserRepo::new(pool)
    }

    #[test]
    fn test_find_or_create_user() {
        let repo = setup();

        let user = repo.find_or_create("user-123").unwrap();
        assert_eq!(user.id, "user-123");

        // Should return same user
        let user2 = repo.find_or_create("user-123").unwrap();
        assert_eq!(user.id, user2.id);
        assert_eq!(repo.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_find_missing_user() {
        let repo = setup();
        assert!(repo.find("nobody").unwrap().is_none());
    }

    #[test]
    fn test_empty_id_rejected() {
        let repo = setup();
        assert!(repo.find_or_create("  ").is_err());
    }
}
