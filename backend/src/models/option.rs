// src/models/option.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'question_options' table in the database.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: i64,

    /// The question this option belongs to.
    pub question_id: i64,

    pub body: String,

    /// Exactly one option per question is expected to carry `true`; nothing
    /// enforces it at write time.
    pub is_correct_answer: bool,
}
