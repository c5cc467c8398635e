//! Spoken command model and intent extraction
//!
//! A final transcript is turned into a [`RecognizedCommand`]: exactly one
//! [`Intent`] plus the [`Entities`] that intent needs. Extraction is a pure
//! function of the text; see [`extractor`] for the rule table.

mod amount;
pub mod entities;
pub mod extractor;

pub use amount::Amount;
pub use extractor::{CommandExtractor, Extraction, RuleInfo};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Categorical action a spoken command maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    TaskCreate,
    TaskComplete,
    ExpenseAdd,
    IncomeAdd,
    Navigate,
    TaskList,
    FinancialSummary,
    Joke,
    Help,
    #[default]
    Unknown,
}

impl Intent {
    /// Stable identifier used in storage and on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreate => "task_create",
            Self::TaskComplete => "task_complete",
            Self::ExpenseAdd => "expense_add",
            Self::IncomeAdd => "income_add",
            Self::Navigate => "navigate",
            Self::TaskList => "task_list",
            Self::FinancialSummary => "financial_summary",
            Self::Joke => "joke",
            Self::Help => "help",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a stored identifier; unrecognized values map to `Unknown`
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "task_create" => Self::TaskCreate,
            "task_complete" => Self::TaskComplete,
            "expense_add" => Self::ExpenseAdd,
            "income_add" => Self::IncomeAdd,
            "navigate" => Self::Navigate,
            "task_list" => Self::TaskList,
            "financial_summary" => Self::FinancialSummary,
            "joke" => Self::Joke,
            "help" => Self::Help,
            _ => Self::Unknown,
        }
    }

    /// Whether executing this intent mutates stored state
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::TaskCreate | Self::TaskComplete | Self::ExpenseAdd | Self::IncomeAdd
        )
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Reporting period for financial summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Today,
    Week,
    Month,
    Year,
    LastWeek,
    LastMonth,
    LastYear,
}

impl Period {
    /// Inclusive date range
    ///
    /// Current periods end on `today`; previous periods cover the whole
    /// calendar week (Monday to Sunday), month, or year before it.
    #[must_use]
    pub fn range(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let week_start =
            today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
        let month_start = today.with_day(1).unwrap_or(today);
        let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);

        match self {
            Self::Today => (today, today),
            Self::Week => (week_start, today),
            Self::Month => (month_start, today),
            Self::Year => (year_start, today),
            Self::LastWeek => (week_start - Duration::days(7), week_start - Duration::days(1)),
            Self::LastMonth => {
                let end = month_start - Duration::days(1);
                (end.with_day(1).unwrap_or(end), end)
            }
            Self::LastYear => {
                let end = year_start - Duration::days(1);
                (NaiveDate::from_ymd_opt(end.year(), 1, 1).unwrap_or(end), end)
            }
        }
    }
}

/// Named values pulled out of command text
///
/// Serialized as a JSON object with absent fields omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
}

impl Entities {
    /// True when no entity was extracted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A command recognized from speech, waiting to be executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedCommand {
    /// Idempotency key; reused on every retry of this command
    pub id: Uuid,
    pub raw_text: String,
    pub intent: Intent,
    pub entities: Entities,
    pub confidence: f32,
    pub language: String,
    pub timestamp: DateTime<Utc>,
}

impl RecognizedCommand {
    /// Build a command from an extraction result
    #[must_use]
    pub fn new(raw_text: impl Into<String>, extraction: Extraction, confidence: f32, language: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            raw_text: raw_text.into(),
            intent: extraction.intent,
            entities: extraction.entities,
            confidence: confidence.clamp(0.0, 1.0),
            language: language.into(),
            timestamp: Utc::now(),
        }
    }
}
