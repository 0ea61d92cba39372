// src/models/attempt.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents one row of the 'user_question_attempts' ledger.
///
/// A (question, user) pair accumulates many rows over time. At most one of
/// them is a draft (`is_submitted = false`); submitted rows are never touched
/// again.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub question_id: i64,
    pub user_id: i64,

    /// Selected option, `None` while nothing is selected.
    #[serde(rename = "option_id")]
    pub question_option_id: Option<i64>,

    /// Only meaningful once submitted.
    #[serde(rename = "attempt_value")]
    pub is_correct: bool,

    pub is_marked: bool,
    pub is_submitted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attempt {
    /// Ranking key used to pick "the" answer for a question: a submitted row
    /// always outranks a draft, then the most recent row wins. The id breaks
    /// ties between equal timestamps.
    pub fn precedence(&self) -> (bool, DateTime<Utc>, i64) {
        (self.is_submitted, self.created_at, self.id)
    }

    /// Recency key among rows of the same submission status.
    pub fn recency(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.id)
    }
}

/// Keeps the top-ranked attempt per question.
pub fn resolve_latest<I>(attempts: I) -> HashMap<i64, Attempt>
where
    I: IntoIterator<Item = Attempt>,
{
    let mut latest: HashMap<i64, Attempt> = HashMap::new();
    for attempt in attempts {
        match latest.get(&attempt.question_id) {
            Some(current) if current.precedence() >= attempt.precedence() => {}
            _ => {
                latest.insert(attempt.question_id, attempt);
            }
        }
    }
    latest
}

/// Values for a freshly created ledger row.
#[derive(Debug, Clone, Default)]
pub struct NewAttempt {
    pub question_id: i64,
    pub user_id: i64,
    pub question_option_id: Option<i64>,
    pub is_marked: bool,
}

/// Columns a draft update may touch. Everything else (notably `created_at`)
/// is left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    SelectedOption,
    Correctness,
    Marked,
}

/// Result of finalizing a draft, shaped for client display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitOutcome {
    pub attempt_value: bool,
    pub answer_id: i64,
    pub true_answer_id: Option<i64>,
    pub true_answer_streak: i64,
}

/// Per-user attempt counters for the analytics page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptSummary {
    pub total: i64,
    pub total_true: i64,
    pub total_false: i64,
}

/// DTO for selecting an option on a question.
#[derive(Debug, Deserialize, Validate)]
pub struct AnswerQuestionRequest {
    #[validate(range(min = 1))]
    pub question_id: i64,
    #[validate(range(min = 1))]
    pub option_id: i64,
}

/// DTO for the single-question transitions (clear, submit, mark).
#[derive(Debug, Deserialize, Validate)]
pub struct QuestionRequest {
    #[validate(range(min = 1))]
    pub question_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkAction {
    Add,
    Remove,
}

/// DTO for toggling the review flag.
#[derive(Debug, Deserialize, Validate)]
pub struct MarkRequest {
    #[validate(range(min = 1))]
    pub question_id: i64,
    pub action: MarkAction,
}

/// DTO for resolving many questions at once.
#[derive(Debug, Deserialize, Validate)]
pub struct QuestionBatchRequest {
    #[validate(length(min = 1, max = 500))]
    pub question_ids: Vec<i64>,
}
