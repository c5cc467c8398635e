//! Financial record repository

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DbPool, connect, parse_date, parse_datetime};
use crate::command::Amount;
use crate::{Error, Result};

/// Income or expense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Income,
    Expense,
}

impl RecordType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }
}

/// A stored income or expense entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialRecord {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub amount: Amount,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub date: NaiveDate,
    pub created_via_voice: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_transcription: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new record
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFinancialRecord {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub amount: Amount,
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to today
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub created_via_voice: bool,
    #[serde(default)]
    pub voice_transcription: Option<String>,
}

/// Aggregate over a user's records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub total_income: Amount,
    pub total_expenses: Amount,
    pub net: Amount,
    pub record_count: usize,
    /// Expense totals per category
    pub expenses_by_category: BTreeMap<String, Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
}

const RECORD_COLUMNS: &str = "id, user_id, type, amount_cents, category, description, date, \
     created_via_voice, voice_transcription, created_at";

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<FinancialRecord> {
    let type_str: String = row.get(2)?;
    let record_type = RecordType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown record type: {type_str}").into(),
        )
    })?;

    Ok(FinancialRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        record_type,
        amount: Amount::from_cents(row.get(3)?),
        category: row.get(4)?,
        description: row.get(5)?,
        date: parse_date(&row.get::<_, String>(6)?).unwrap_or_else(|| Utc::now().date_naive()),
        created_via_voice: row.get(7)?,
        voice_transcription: row.get(8)?,
        created_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

/// Financial record repository
#[derive(Clone)]
pub struct FinancialRepo {
    pool: DbPool,
}

impl FinancialRepo {
    /// Create a new financial repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a record
    ///
    /// # Errors
    ///
    /// Returns error if the amount is not positive, the category is blank,
    /// or the insert fails
    pub fn create(&self, user_id: &str, record: &NewFinancialRecord) -> Result<FinancialRecord> {
        if !record.amount.is_positive() {
            return Err(Error::Dispatch("amount must be positive".to_string()));
        }
        let category = record.category.trim().to_lowercase();
        if category.is_empty() {
            return Err(Error::Dispatch("category must not be empty".to_string()));
        }

        let conn = connect(&self.pool)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let date = record.date.unwrap_or_else(|| now.date_naive());

        conn.execute(
            "INSERT INTO financial_records (id, user_id, type, amount_cents, category, description,
                                            date, created_via_voice, voice_transcription, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                user_id,
                record.record_type.as_str(),
                record.amount.cents(),
                category,
                record.description,
                date.to_string(),
                record.created_via_voice,
                record.voice_transcription,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        tracing::debug!(
            record_id = %id,
            user_id,
            record_type = record.record_type.as_str(),
            amount = %record.amount,
            "financial record created"
        );

        Ok(FinancialRecord {
            id,
            user_id: user_id.to_string(),
            record_type: record.record_type,
            amount: record.amount,
            category,
            description: record.description.clone(),
            date,
            created_via_voice: record.created_via_voice,
            voice_transcription: record.voice_transcription.clone(),
            created_at: now,
        })
    }

    /// List records, newest first, optionally within an inclusive date range
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(
        &self,
        user_id: &str,
        range: Option<(NaiveDate, NaiveDate)>,
        limit: Option<usize>,
    ) -> Result<Vec<FinancialRecord>> {
        let conn = connect(&self.pool)?;
        let (start, end) = range_params(range);
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM financial_records
             WHERE user_id = ?1 AND (?2 IS NULL OR date >= ?2) AND (?3 IS NULL OR date <= ?3)
             ORDER BY date DESC, created_at DESC
             LIMIT ?4"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::Database(e.to_string()))?;

        let records = stmt
            .query_map(params![user_id, start, end, limit], row_to_record)
            .map_err(|e| Error::Database(e.to_string()))?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(records)
    }

    /// Totals over all records, or over an inclusive date range
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn summary(
        &self,
        user_id: &str,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<FinancialSummary> {
        let conn = connect(&self.pool)?;
        let (start, end) = range_params(range);

        let mut stmt = conn
            .prepare(
                "SELECT type, category, SUM(amount_cents), COUNT(*) FROM financial_records
                 WHERE user_id = ?1 AND (?2 IS NULL OR date >= ?2) AND (?3 IS NULL OR date <= ?3)
                 GROUP BY type, category",
            )
            .map_err(|e| Error::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![user_id, start, end], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut summary = FinancialSummary {
            start: range.map(|(s, _)| s),
            end: range.map(|(_, e)| e),
            ..FinancialSummary::default()
        };

        for row in rows {
            let (record_type, category, cents, count) =
                row.map_err(|e| Error::Database(e.to_string()))?;
            let amount = Amount::from_cents(cents);
            summary.record_count += usize::try_from(count).unwrap_or_default();

            match RecordType::parse(&record_type) {
                Some(RecordType::Income) => summary.total_income = summary.total_income + amount,
                Some(RecordType::Expense) => {
                    summary.total_expenses = summary.total_expenses + amount;
                    let entry = summary.expenses_by_category.entry(category).or_default();
                    *entry = *entry + amount;
                }
                None => tracing::warn!(record_type = %record_type, "skipping record with unknown type"),
            }
        }

        summary.net = summary.total_income - summary.total_expenses;
        Ok(summary)
    }
}

fn range_params(range: Option<(NaiveDate, NaiveDate)>) -> (Option<String>, Option<String>) {
    range.map_or((None, None), |(start, end)| {
        (Some(start.to_string()), Some(end.to_string()))
    })
}
