// src/store/mod.rs

//! Storage seams for the attempt ledger and its collaborators.
//!
//! Every component the lifecycle services talk to is a trait here, with a
//! Postgres implementation for production and an in-memory one that
//! enforces the same invariants for tests and local runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    attempt::{Attempt, DraftField, NewAttempt},
    option::QuestionOption,
    pack_session::{PackSession, PackSessionFilter, QuestionPack},
    point::UserPoint,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No row matched; the payload names what was looked up.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness or state guard rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row"),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Conflict(db.message().to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// History of a user's answer rows per question.
#[async_trait]
pub trait AttemptLedger: Send + Sync {
    /// Inserts a new row. Fails with `Conflict` when the row would be a
    /// second draft for the same (question, user).
    async fn create(&self, attempt: NewAttempt) -> StoreResult<Attempt>;

    /// Writes only `fields` of `attempt` onto its draft row.
    /// `NotFound` when the row is gone or no longer a draft.
    async fn update_draft(&self, attempt: &Attempt, fields: &[DraftField]) -> StoreResult<Attempt>;

    /// Finalizes a draft: records correctness, sets submitted and clears
    /// the mark. Guarded on the row still being a draft that still selects
    /// `expected_option_id`; a lost race yields `Conflict`.
    async fn submit_draft(
        &self,
        attempt_id: i64,
        expected_option_id: i64,
        is_correct: bool,
    ) -> StoreResult<Attempt>;

    async fn latest_draft(&self, question_id: i64, user_id: i64) -> StoreResult<Attempt>;

    async fn latest_submitted(&self, question_id: i64, user_id: i64) -> StoreResult<Attempt>;

    /// At most one row per question: rank 1 of `is_submitted DESC,
    /// created_at DESC, id DESC` within each question.
    async fn latest_submitted_bulk(&self, question_ids: &[i64], user_id: i64) -> StoreResult<Vec<Attempt>>;

    /// Questions among `question_ids` whose current draft is marked.
    async fn marked_questions(&self, question_ids: &[i64], user_id: i64) -> StoreResult<Vec<i64>>;

    async fn total_by_user(&self, user_id: i64) -> StoreResult<i64>;

    /// Counts submitted rows with the given correctness.
    async fn total_by_user_and_correctness(&self, user_id: i64, is_correct: bool) -> StoreResult<i64>;

    /// Correct submissions that have no point award recorded yet, oldest
    /// first.
    async fn unawarded_correct(&self) -> StoreResult<Vec<Attempt>>;
}

/// Read access to answer options.
#[async_trait]
pub trait OptionStore: Send + Sync {
    async fn get(&self, option_id: i64) -> StoreResult<QuestionOption>;

    /// The designated correct option. `None` when the question has none;
    /// the lowest id when it has several.
    async fn correct_option(&self, question_id: i64) -> StoreResult<Option<QuestionOption>>;
}

/// Per-user running score.
#[async_trait]
pub trait PointLedger: Send + Sync {
    async fn get_by_user(&self, user_id: i64) -> StoreResult<UserPoint>;

    /// Atomically adds `delta`, creating the entry on first use.
    async fn upsert_add(&self, user_id: i64, delta: i64) -> StoreResult<UserPoint>;

    /// `upsert_add` keyed by the attempt that earned the points. Returns
    /// `false` without touching the total when that attempt was already paid.
    async fn award(&self, attempt_id: i64, user_id: i64, delta: i64) -> StoreResult<bool>;

    /// Leaderboard page ordered by points, plus the total entry count.
    async fn list(&self, offset: i64, limit: i64) -> StoreResult<(Vec<UserPoint>, i64)>;
}

/// Question pack sessions.
#[async_trait]
pub trait PackSessionStore: Send + Sync {
    async fn find_pack(&self, pack_id: i64) -> StoreResult<QuestionPack>;

    /// Starts a session unless one is already open for (pack, user).
    /// The flag tells whether a new row was created.
    async fn open_session(
        &self,
        pack_id: i64,
        user_id: i64,
        started_at: DateTime<Utc>,
    ) -> StoreResult<(PackSession, bool)>;

    async fn get(&self, session_id: i64) -> StoreResult<PackSession>;

    /// Marks the session finished. An already finished session is returned
    /// unchanged.
    async fn finish(&self, session_id: i64, finished_at: DateTime<Utc>) -> StoreResult<PackSession>;

    async fn list(&self, filter: &PackSessionFilter) -> StoreResult<(Vec<PackSession>, i64)>;
}
