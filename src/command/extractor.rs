//! Ordered rule table mapping transcripts to intents
//!
//! Rules are evaluated top to bottom and the first trigger that matches
//! wins; there is no scoring across rules. Precedence is specific before
//! generic:
//!
//! 1. `task_complete`, `task_create` (explicit task verbs)
//! 2. `financial_summary` (questions about totals, checked before the money
//!    verbs so "how much have I spent" is a query, not a new expense)
//! 3. `income_paid`, `expense_add`, `income_add` ("got paid" is income, so it
//!    is claimed before the bare "paid" of the expense trigger)
//! 4. `task_list`, `joke`, `help`
//! 5. `navigate` last, since "open" / "show" / "go to" also appear inside
//!    task titles ("create task go to the bank")

use std::sync::LazyLock;

use chrono::{Local, NaiveDate};
use regex::{Captures, Regex};

use super::entities;
use super::{Entities, Intent, RecognizedCommand};

/// Inputs available to an entity extractor
pub struct ExtractionContext<'a> {
    /// Full normalized text
    pub text: &'a str,
    /// Text following the trigger phrase
    pub remainder: &'a str,
    /// Trigger captures (rules may name a `title` group)
    pub captures: &'a Captures<'a>,
    /// Reference date for relative due dates
    pub today: NaiveDate,
}

type EntityExtractor = fn(&ExtractionContext<'_>) -> Entities;

/// One `(predicate, intent, entity extractor)` entry
struct Rule {
    name: &'static str,
    intent: Intent,
    trigger: Regex,
    extract: EntityExtractor,
}

impl Rule {
    fn new(name: &'static str, intent: Intent, trigger: &str, extract: EntityExtractor) -> Self {
        Self {
            name,
            intent,
            trigger: Regex::new(trigger).expect("valid regex"),
            extract,
        }
    }
}

/// Public description of a rule, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleInfo {
    pub name: &'static str,
    pub intent: Intent,
}

/// Result of running the rule table over one transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub intent: Intent,
    pub entities: Entities,
    /// Name of the rule that matched, if any
    pub rule: Option<&'static str>,
}

impl Extraction {
    /// The terminal "nothing matched" result
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            entities: Entities::default(),
            rule: None,
        }
    }
}

static ENGLISH_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(
            "task_complete",
            Intent::TaskComplete,
            r"\b(?:complete|finish|close|check off)\s+(?:the\s+|my\s+)?task\b|\bmark\s+(?:the\s+)?(?:task\s+)?(?P<title>.+?)\s+as\s+(?:done|complete|completed|finished)\b",
            task_entities,
        ),
        Rule::new(
            "task_create",
            Intent::TaskCreate,
            r"\b(?:create|add|make|new)\s+(?:(?:a|an|new)\s+)*task\b|\badd\s+(?:a\s+)?to-?do\b|\bremind me to\b",
            task_entities,
        ),
        Rule::new(
            "financial_summary",
            Intent::FinancialSummary,
            r"\b(?:financial summary|summary|balance|net worth|my finances|how much money)\b|\bhow much (?:did|have) i (?:spend|spent|earn|earned|make|made)\b",
            summary_entities,
        ),
        Rule::new(
            "income_paid",
            Intent::IncomeAdd,
            r"\b(?:got|get|getting|been)\s+paid\b",
            income_entities,
        ),
        Rule::new(
            "expense_add",
            Intent::ExpenseAdd,
            r"\b(?:add|log|record)\s+(?:an?\s+)?expense\b|\b(?:spent|paid)\b",
            expense_entities,
        ),
        Rule::new(
            "income_add",
            Intent::IncomeAdd,
            r"\b(?:add|log|record)\s+(?:an?\s+)?income\b|\b(?:received|earned)\b",
            income_entities,
        ),
        Rule::new(
            "task_list",
            Intent::TaskList,
            r"\b(?:list|show|read)\s+(?:me\s+)?(?:all\s+)?(?:my\s+)?(?:pending\s+)?tasks\b|\bwhat are my tasks\b|\bmy tasks\b|\bpending tasks\b",
            no_entities,
        ),
        Rule::new(
            "joke",
            Intent::Joke,
            r"\btell\s+(?:me\s+)?a\s+joke\b|\bmake me laugh\b|^joke$",
            no_entities,
        ),
        Rule::new(
            "help",
            Intent::Help,
            r"^(?:help|help me|what can you do|what can i say|what can i do)$",
            no_entities,
        ),
        Rule::new(
            "navigate",
            Intent::Navigate,
            r"\b(?:go to|navigate to|take me to|switch to|open|show)\b",
            navigate_entities,
        ),
    ]
});

fn task_entities(ctx: &ExtractionContext<'_>) -> Entities {
    let title_source = ctx
        .captures
        .name("title")
        .map_or(ctx.remainder, |m| m.as_str());

    Entities {
        title: entities::task_title(title_source),
        priority: Some(entities::priority(title_source)),
        due_date: entities::due_date(title_source, ctx.today),
        ..Entities::default()
    }
}

fn expense_entities(ctx: &ExtractionContext<'_>) -> Entities {
    Entities {
        amount: entities::amount(ctx.text),
        category: Some(entities::expense_category(ctx.remainder).to_string()),
        description: entities::description(ctx.remainder),
        ..Entities::default()
    }
}

fn income_entities(ctx: &ExtractionContext<'_>) -> Entities {
    Entities {
        amount: entities::amount(ctx.text),
        category: Some(entities::income_category(ctx.remainder).to_string()),
        description: entities::description(ctx.remainder),
        ..Entities::default()
    }
}

fn summary_entities(ctx: &ExtractionContext<'_>) -> Entities {
    Entities {
        period: entities::period(ctx.text),
        ..Entities::default()
    }
}

fn navigate_entities(ctx: &ExtractionContext<'_>) -> Entities {
    Entities {
        destination: entities::destination(ctx.remainder),
        ..Entities::default()
    }
}

fn no_entities(_ctx: &ExtractionContext<'_>) -> Entities {
    Entities::default()
}

/// Turns final transcripts into recognized commands
#[derive(Clone)]
pub struct CommandExtractor {
    language: String,
    rules: &'static [Rule],
}

impl std::fmt::Debug for CommandExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExtractor")
            .field("language", &self.language)
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl Default for CommandExtractor {
    fn default() -> Self {
        Self::for_language("en-US")
    }
}

impl CommandExtractor {
    /// Create an extractor for a BCP 47 language tag
    ///
    /// Only English rules exist; other languages fall back to them.
    #[must_use]
    pub fn for_language(language: &str) -> Self {
        let primary = language.split(['-', '_']).next().unwrap_or_default();
        if !primary.eq_ignore_ascii_case("en") {
            tracing::debug!(language, "no rule set for language, using English rules");
        }

        Self {
            language: language.to_string(),
            rules: &ENGLISH_RULES,
        }
    }

    /// Language tag this extractor was built for
    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Rules in evaluation order
    #[must_use]
    pub fn rules(&self) -> Vec<RuleInfo> {
        self.rules
            .iter()
            .map(|r| RuleInfo {
                name: r.name,
                intent: r.intent,
            })
            .collect()
    }

    /// Run the rule table over `transcript`
    ///
    /// Relative due dates resolve against `today`. Returns
    /// [`Extraction::unknown`] when no rule matches.
    #[must_use]
    pub fn extract(&self, transcript: &str, today: NaiveDate) -> Extraction {
        let text = entities::normalize(transcript);
        if text.is_empty() {
            return Extraction::unknown();
        }

        for rule in self.rules {
            let Some(captures) = rule.trigger.captures(&text) else {
                continue;
            };
            let end = captures.get(0).map_or(0, |m| m.end());
            let remainder = text[end..].trim();

            let ctx = ExtractionContext {
                text: &text,
                remainder,
                captures: &captures,
                today,
            };
            let entities = (rule.extract)(&ctx);

            tracing::trace!(rule = rule.name, intent = %rule.intent, "rule matched");
            return Extraction {
                intent: rule.intent,
                entities,
                rule: Some(rule.name),
            };
        }

        tracing::debug!(text = %text, "no rule matched");
        Extraction::unknown()
    }

    /// Extract and wrap into a [`RecognizedCommand`] with a fresh id
    #[must_use]
    pub fn recognize(&self, transcript: &str, confidence: f32) -> RecognizedCommand {
        let extraction = self.extract(transcript, Local::now().date_naive());
        RecognizedCommand::new(transcript.trim(), extraction, confidence, self.language.clone())
    }
}
