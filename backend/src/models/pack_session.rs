// src/models/pack_session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::page::PageParams;

/// Represents the 'question_packs' table (only what sessions need).
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct QuestionPack {
    pub id: i64,
    pub name: String,
    /// Time limit in minutes, informational only.
    pub time_limit: i32,
    pub is_active: bool,
}

/// Represents the 'question_pack_attempts' table: one timed take of a pack.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PackSession {
    pub id: i64,
    pub question_pack_id: i64,
    pub user_id: i64,
    pub is_finished: bool,
    /// Not derived from the attempt ledger yet; stays 0.
    pub score: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Filters for listing pack sessions.
#[derive(Debug, Clone, Default)]
pub struct PackSessionFilter {
    pub user_id: Option<i64>,
    pub question_pack_id: Option<i64>,
    pub is_finished: Option<bool>,
    pub page: PageParams,
}

impl PackSessionFilter {
    pub fn matches(&self, session: &PackSession) -> bool {
        self.user_id.is_none_or(|id| session.user_id == id)
            && self.question_pack_id.is_none_or(|id| session.question_pack_id == id)
            && self.is_finished.is_none_or(|f| session.is_finished == f)
    }
}

/// Query string accepted by the session list endpoint. The user is always
/// the caller.
#[derive(Debug, Deserialize)]
pub struct PackSessionQuery {
    pub question_pack_id: Option<i64>,
    pub is_finished: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PackSessionQuery {
    pub fn into_filter(self, user_id: i64) -> PackSessionFilter {
        PackSessionFilter {
            user_id: Some(user_id),
            question_pack_id: self.question_pack_id,
            is_finished: self.is_finished,
            page: PageParams {
                page: self.page,
                limit: self.limit,
            },
        }
    }
}

/// DTO for starting a pack.
#[derive(Debug, Deserialize, Validate)]
pub struct TakePackRequest {
    #[validate(range(min = 1))]
    pub question_pack_id: i64,
}

/// DTO for finishing a pack session.
#[derive(Debug, Deserialize, Validate)]
pub struct FinishPackRequest {
    #[validate(range(min = 1))]
    pub question_pack_attempt_id: i64,
}
