//! Entity extraction helpers
//!
//! Each function reads one kind of entity out of normalized (lower-cased,
//! trimmed) command text. They never fail; a missing entity is `None`.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;

use super::{Amount, Period, Priority};

/// Category used when an expense names no known category
pub const DEFAULT_EXPENSE_CATEGORY: &str = "general";

/// Category used when income names no known category
pub const DEFAULT_INCOME_CATEGORY: &str = "other";

/// Amount patterns, tried in order: `$NN.NN`, `NN dollars`, bare `NN`
static AMOUNT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\$\s?(\d[\d,]*(?:\.\d{1,2})?)",
        r"(\d[\d,]*(?:\.\d{1,2})?)\s*(?:dollars?|bucks|usd)\b",
        r"\b(\d[\d,]*(?:\.\d{1,2})?)\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static EXPENSE_CATEGORIES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    keyword_table(&[
        (
            "food",
            "food|groceries|grocery|lunch|dinner|breakfast|restaurant|coffee|snacks?|meals?",
        ),
        (
            "transport",
            "gas|fuel|uber|lyft|taxi|bus|train|parking|transport|transportation",
        ),
        (
            "entertainment",
            "movies?|cinema|concert|games?|netflix|spotify|entertainment",
        ),
        (
            "utilities",
            "electric|electricity|water|internet|utilities|utility|phone bill",
        ),
        ("shopping", "clothes|shopping|amazon|shoes"),
        ("health", "doctor|pharmacy|medicine|gym|health|dentist"),
        ("housing", "rent|mortgage|housing"),
        ("education", "books?|course|tuition|education"),
    ])
});

static INCOME_CATEGORIES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    keyword_table(&[
        ("salary", "salary|paycheck|wages?"),
        ("freelance", "freelance|client|contract|consulting"),
        ("investment", "dividends?|interest|investments?|stocks?"),
        ("gift", "gifts?|present"),
        ("refund", "refunds?"),
    ])
});

static DESTINATIONS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    keyword_table(&[
        ("dashboard", "dashboard|home|main page|overview"),
        ("tasks", "tasks?|task list|to-?dos?"),
        ("finance", "finances?|financial|money|budget|expenses"),
        ("chat", "chat|messages|conversations?"),
        ("settings", "settings|preferences|options"),
        ("voice", "voice|voice commands"),
        ("analytics", "analytics|stats|statistics|reports?"),
    ])
});

static DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:for|on)\s+(.+)$").expect("valid regex"));

static LEADING_FILLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:to|called|named|titled|that says|saying)\s+|^[:\-]\s*").expect("valid regex")
});

/// Priority or due-date qualifier opening a task phrase
static LEADING_QUALIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?:it's|it\s+is)\s+)?(?:urgent|important)\s+|^(?:with\s+)?(?:a\s+)?(?:high|low|medium|normal)\s+priority\s+|^(?:due\s+|by\s+)?(?:today|tomorrow|next\s+week)\s+",
    )
    .expect("valid regex")
});

/// Priority or due-date qualifier closing a task phrase
static TRAILING_QUALIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|\s+)(?:(?:with\s+)?(?:a\s+)?(?:high|low|medium|normal)\s+priority|(?:it's\s+|it\s+is\s+)?(?:urgent|important)|(?:due\s+|by\s+|for\s+)?(?:today|tomorrow|next\s+week))$",
    )
    .expect("valid regex")
});

static PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(this|last|past)\s+)?(today|week|month|year)\b").expect("valid regex")
});

static COMPLETION_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+as\s+(?:done|complete|completed|finished)$").expect("valid regex")
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

fn keyword_table(entries: &[(&'static str, &str)]) -> Vec<(&'static str, Regex)> {
    entries
        .iter()
        .map(|(name, words)| {
            let pattern = format!(r"\b(?:{words})\b");
            (*name, Regex::new(&pattern).expect("valid regex"))
        })
        .collect()
}

fn first_keyword(table: &[(&'static str, Regex)], text: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(name, _)| *name)
}

/// Lower-case, collapse whitespace, and drop trailing sentence punctuation
#[must_use]
pub fn normalize(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let collapsed = WHITESPACE.replace_all(&lower, " ");
    collapsed
        .trim_end_matches(['.', '!', '?', ','])
        .trim()
        .to_string()
}

/// Peel priority and due-date qualifiers off both ends of a task phrase
///
/// Returns the remaining core and the qualifiers in the order they were
/// removed. Words in the middle ("call urgent care") stay part of the core.
fn peel_qualifiers(text: &str) -> (String, Vec<String>) {
    let mut core = text.trim().to_string();
    let mut qualifiers = Vec::new();

    loop {
        let before = core.clone();

        core = LEADING_FILLER.replace(&core, "").into_owned();
        if let Some(m) = LEADING_QUALIFIER.find(&core) {
            qualifiers.push(m.as_str().trim().to_string());
            core = core[m.end()..].to_string();
        }
        if let Some(m) = TRAILING_QUALIFIER.find(&core) {
            qualifiers.push(m.as_str().trim().to_string());
            core.truncate(m.start());
        }
        core = core
            .trim_matches(|c: char| c == ',' || c == '-' || c.is_whitespace())
            .to_string();

        if core == before {
            break;
        }
    }

    (core, qualifiers)
}

fn qualifier_priority(qualifier: &str) -> Option<Priority> {
    if qualifier.ends_with("priority") {
        if qualifier.contains("high") {
            Some(Priority::High)
        } else if qualifier.contains("low") {
            Some(Priority::Low)
        } else {
            Some(Priority::Medium)
        }
    } else if qualifier.ends_with("urgent") || qualifier.ends_with("important") {
        Some(Priority::High)
    } else {
        None
    }
}

/// Priority from a leading or trailing qualifier
///
/// "urgent"/"important"/"high priority" → high, "low priority" → low,
/// anything else → medium.
#[must_use]
pub fn priority(text: &str) -> Priority {
    let (_, qualifiers) = peel_qualifiers(text);
    qualifiers
        .iter()
        .find_map(|q| qualifier_priority(q))
        .unwrap_or(Priority::Medium)
}

/// Resolve a leading or trailing "today" / "tomorrow" / "next week" against `today`
#[must_use]
pub fn due_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let (_, qualifiers) = peel_qualifiers(text);
    qualifiers.iter().find_map(|q| {
        if q.ends_with("next week") {
            Some(today + Duration::days(7))
        } else if q.ends_with("tomorrow") {
            Some(today + Duration::days(1))
        } else if q.ends_with("today") {
            Some(today)
        } else {
            None
        }
    })
}

/// Task title from the text following a trigger phrase
///
/// Strips leading fillers ("to", "called") and the priority / due-date
/// qualifiers that were already captured as their own entities.
#[must_use]
pub fn task_title(remainder: &str) -> Option<String> {
    let without_suffix = COMPLETION_SUFFIX.replace(remainder.trim(), "");
    let collapsed = WHITESPACE.replace_all(without_suffix.trim(), " ");
    let (title, _) = peel_qualifiers(&collapsed);
    (!title.is_empty()).then_some(title)
}

/// First amount in the text, trying currency patterns before bare numbers
#[must_use]
pub fn amount(text: &str) -> Option<Amount> {
    AMOUNT_PATTERNS.iter().find_map(|re| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| Amount::parse(m.as_str()))
    })
}

/// Expense category from the fixed keyword table
#[must_use]
pub fn expense_category(text: &str) -> &'static str {
    first_keyword(&EXPENSE_CATEGORIES, text).unwrap_or(DEFAULT_EXPENSE_CATEGORY)
}

/// Income category from the fixed keyword table
#[must_use]
pub fn income_category(text: &str) -> &'static str {
    first_keyword(&INCOME_CATEGORIES, text).unwrap_or(DEFAULT_INCOME_CATEGORY)
}

/// Text following "for" / "on"
#[must_use]
pub fn description(text: &str) -> Option<String> {
    DESCRIPTION
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Known page for a navigation request, else the cleaned remainder
#[must_use]
pub fn destination(remainder: &str) -> Option<String> {
    if let Some(page) = first_keyword(&DESTINATIONS, remainder) {
        return Some(page.to_string());
    }

    let cleaned = remainder
        .trim_start_matches("the ")
        .trim_start_matches("my ")
        .trim_end_matches(" page")
        .trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Reporting period named in a summary request
///
/// "last week" / "past month" name the previous calendar period; a bare
/// or "this" period names the current one.
#[must_use]
pub fn period(text: &str) -> Option<Period> {
    let caps = PERIOD.captures(text)?;
    let previous = caps.get(1).is_some_and(|m| m.as_str() != "this");

    match (caps.get(2)?.as_str(), previous) {
        ("today", _) => Some(Period::Today),
        ("week", false) => Some(Period::Week),
        ("week", true) => Some(Period::LastWeek),
        ("month", false) => Some(Period::Month),
        ("month", true) => Some(Period::LastMonth),
        ("year", false) => Some(Period::Year),
        ("year", true) => Some(Period::LastYear),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn normalizes_case_space_and_punctuation() {
        assert_eq!(normalize("  Create   Task Buy Milk. "), "create task buy milk");
        assert_eq!(normalize("Help!"), "help");
    }

    #[test]
    fn priority_keywords() {
        assert_eq!(priority("urgent call the bank"), Priority::High);
        assert_eq!(priority("file taxes high priority"), Priority::High);
        assert_eq!(priority("water plants low priority"), Priority::Low);
        assert_eq!(priority("water plants"), Priority::Medium);
    }

    #[test]
    fn due_dates_resolve_relative_to_today() {
        let today = date(2026, 10, 16);
        assert_eq!(due_date("call mom tomorrow", today), Some(date(2026, 10, 17)));
        assert_eq!(due_date("review next week", today), Some(date(2026, 10, 23)));
        assert_eq!(due_date("pay rent today", today), Some(today));
        assert_eq!(due_date("pay rent", today), None);
    }

    #[test]
    fn qualifiers_inside_a_title_are_not_entities() {
        let today = date(2026, 10, 16);
        assert_eq!(priority("call urgent care"), Priority::Medium);
        assert_eq!(priority("read important email"), Priority::Medium);
        assert_eq!(due_date("read today's news", today), None);
        assert_eq!(due_date("plan today's agenda tomorrow", today), Some(date(2026, 10, 17)));
    }

    #[test]
    fn task_title_strips_fillers_and_qualifiers() {
        assert_eq!(task_title("buy milk").as_deref(), Some("buy milk"));
        assert_eq!(task_title("to call mom tomorrow").as_deref(), Some("call mom"));
        assert_eq!(
            task_title("called finish report high priority").as_deref(),
            Some("finish report")
        );
        assert_eq!(task_title("urgent fix the sink").as_deref(), Some("fix the sink"));
        assert_eq!(task_title("groceries as done").as_deref(), Some("groceries"));
        assert_eq!(task_title("  ").as_deref(), None);
        assert_eq!(task_title("tomorrow").as_deref(), None);
        assert_eq!(
            task_title("water plants low priority next week").as_deref(),
            Some("water plants")
        );
    }

    #[test]
    fn task_title_keeps_qualifier_words_mid_phrase() {
        assert_eq!(task_title("call urgent care").as_deref(), Some("call urgent care"));
        assert_eq!(task_title("read important email").as_deref(), Some("read important email"));
        assert_eq!(task_title("read today's news").as_deref(), Some("read today's news"));
    }

    #[test]
    fn amount_prefers_currency_patterns() {
        assert_eq!(amount("$4.50 for coffee"), Amount::parse("4.50"));
        assert_eq!(amount("20 dollars on lunch"), Amount::parse("20"));
        assert_eq!(amount("spent 3 times 12 bucks"), Amount::parse("12"));
        assert_eq!(amount("15.25 for parking"), Amount::parse("15.25"));
        assert_eq!(amount("nothing here"), None);
    }

    #[test]
    fn categories_fall_back_to_defaults() {
        assert_eq!(expense_category("4.50 for food"), "food");
        assert_eq!(expense_category("40 for uber home"), "transport");
        assert_eq!(expense_category("10 for a widget"), DEFAULT_EXPENSE_CATEGORY);
        assert_eq!(income_category("2000 from salary"), "salary");
        assert_eq!(income_category("50 from a stranger"), DEFAULT_INCOME_CATEGORY);
    }

    #[test]
    fn description_follows_for_or_on() {
        assert_eq!(description("20 dollars on lunch with sam").as_deref(), Some("lunch with sam"));
        assert_eq!(description("4.50 for food").as_deref(), Some("food"));
        assert_eq!(description("4.50").as_deref(), None);
    }

    #[test]
    fn destinations_map_synonyms() {
        assert_eq!(destination("the dashboard").as_deref(), Some("dashboard"));
        assert_eq!(destination("my budget").as_deref(), Some("finance"));
        assert_eq!(destination("the calendar page").as_deref(), Some("calendar"));
        assert_eq!(destination("").as_deref(), None);
    }

    #[test]
    fn periods() {
        assert_eq!(period("summary for this month"), Some(Period::Month));
        assert_eq!(period("how much did i spend today"), Some(Period::Today));
        assert_eq!(period("balance"), None);
        assert_eq!(period("what did i spend this week"), Some(Period::Week));
        assert_eq!(period("what did i spend last week"), Some(Period::LastWeek));
        assert_eq!(period("summary for the past month"), Some(Period::LastMonth));
        assert_eq!(period("income last year"), Some(Period::LastYear));
    }
}
