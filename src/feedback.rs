//! Spoken confirmation text for dispatch results

use crate::command::Amount;
use crate::db::{FinancialSummary, RecordType, Task};
use crate::dispatch::DomainMutationResult;

/// Spoken when a command could not be executed at all
pub const EXECUTION_FAILED: &str = "Sorry, there was an error processing your command.";

/// Pending tasks read aloud before summarizing the rest
const SPOKEN_TASKS: usize = 3;

/// Compose the sentence spoken back to the user
#[must_use]
pub fn compose(result: &DomainMutationResult) -> String {
    match result {
        DomainMutationResult::TaskCreated { task } => task_created(task),
        DomainMutationResult::TaskCompleted { task } => {
            format!("Marked \"{}\" as done.", task.title)
        }
        DomainMutationResult::TaskList {
            tasks,
            total_pending,
        } => task_list(tasks, *total_pending),
        DomainMutationResult::FinancialRecorded { record } => match record.record_type {
            RecordType::Expense => format!(
                "Added expense of {} for {}.",
                dollars(record.amount),
                record.category
            ),
            RecordType::Income => format!(
                "Added income of {} from {}.",
                dollars(record.amount),
                record.category
            ),
        },
        DomainMutationResult::Summary { summary } => summary_sentence(summary),
        DomainMutationResult::Navigation { destination } => {
            format!("Opening {destination}.")
        }
        DomainMutationResult::Reply { text } => text.clone(),
        DomainMutationResult::NeedsClarification { question } => question.clone(),
        DomainMutationResult::NotUnderstood { hint } => {
            format!("Sorry, I didn't understand that. {hint}")
        }
        DomainMutationResult::Error { .. } => EXECUTION_FAILED.to_string(),
    }
}

fn task_created(task: &Task) -> String {
    match task.due_date {
        Some(due) => format!("Created task \"{}\", due {}.", task.title, due.format("%B %-d")),
        None => format!("Created task \"{}\".", task.title),
    }
}

fn task_list(tasks: &[Task], total_pending: usize) -> String {
    if total_pending == 0 || tasks.is_empty() {
        return "You have no pending tasks.".to_string();
    }

    let noun = if total_pending == 1 { "task" } else { "tasks" };
    let titles: Vec<&str> = tasks
        .iter()
        .take(SPOKEN_TASKS)
        .map(|t| t.title.as_str())
        .collect();

    let mut sentence = format!(
        "You have {total_pending} pending {noun}: {}",
        titles.join(", ")
    );
    let remaining = total_pending.saturating_sub(titles.len());
    if remaining > 0 {
        sentence.push_str(&format!(", and {remaining} more"));
    }
    sentence.push('.');
    sentence
}

fn summary_sentence(summary: &FinancialSummary) -> String {
    if summary.record_count == 0 {
        return "You have no financial records for that period.".to_string();
    }

    let net = if summary.net.cents() < 0 {
        format!("a net loss of {}", dollars(Amount::ZERO - summary.net))
    } else {
        format!("a net of {}", dollars(summary.net))
    };

    format!(
        "Income {}, expenses {}, for {net}.",
        dollars(summary.total_income),
        dollars(summary.total_expenses)
    )
}

fn dollars(amount: Amount) -> String {
    format!("${amount}")
}
