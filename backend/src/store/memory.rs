// src/store/memory.rs

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{AttemptLedger, OptionStore, PackSessionStore, PointLedger, StoreError, StoreResult};
use crate::models::{
    attempt::{Attempt, DraftField, NewAttempt, resolve_latest},
    option::QuestionOption,
    pack_session::{PackSession, PackSessionFilter, QuestionPack},
    point::UserPoint,
};

#[derive(Default)]
struct Tables {
    attempts: Vec<Attempt>,
    options: HashMap<i64, QuestionOption>,
    points: HashMap<i64, UserPoint>,
    awarded_attempts: HashSet<i64>,
    packs: HashMap<i64, QuestionPack>,
    sessions: Vec<PackSession>,
}

impl Tables {
    fn attempt_mut(&mut self, id: i64) -> Option<&mut Attempt> {
        self.attempts.iter_mut().find(|a| a.id == id)
    }

    fn latest(&self, question_id: i64, user_id: i64, is_submitted: bool) -> Option<&Attempt> {
        self.attempts
            .iter()
            .filter(|a| a.question_id == question_id && a.user_id == user_id && a.is_submitted == is_submitted)
            .max_by_key(|a| a.recency())
    }
}

/// In-process store holding the same tables as the Postgres schema, with
/// the same uniqueness guarantees.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_option(&self, id: i64, question_id: i64, body: &str, is_correct_answer: bool) {
        self.tables.write().await.options.insert(
            id,
            QuestionOption {
                id,
                question_id,
                body: body.to_string(),
                is_correct_answer,
            },
        );
    }

    pub async fn insert_pack(&self, id: i64, name: &str, time_limit: i32, is_active: bool) {
        self.tables.write().await.packs.insert(
            id,
            QuestionPack {
                id,
                name: name.to_string(),
                time_limit,
                is_active,
            },
        );
    }

    /// Full history for one (question, user), oldest first.
    pub async fn attempts_for(&self, question_id: i64, user_id: i64) -> Vec<Attempt> {
        self.tables
            .read()
            .await
            .attempts
            .iter()
            .filter(|a| a.question_id == question_id && a.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AttemptLedger for MemoryStore {
    async fn create(&self, attempt: NewAttempt) -> StoreResult<Attempt> {
        let mut tables = self.tables.write().await;

        if tables.latest(attempt.question_id, attempt.user_id, false).is_some() {
            return Err(StoreError::Conflict(
                "a draft attempt already exists for this question".to_string(),
            ));
        }

        let now = Utc::now();
        let created = Attempt {
            id: tables.attempts.len() as i64 + 1,
            question_id: attempt.question_id,
            user_id: attempt.user_id,
            question_option_id: attempt.question_option_id,
            is_correct: false,
            is_marked: attempt.is_marked,
            is_submitted: false,
            created_at: now,
            updated_at: now,
        };
        tables.attempts.push(created.clone());

        Ok(created)
    }

    async fn update_draft(&self, attempt: &Attempt, fields: &[DraftField]) -> StoreResult<Attempt> {
        let mut tables = self.tables.write().await;

        let row = tables
            .attempt_mut(attempt.id)
            .filter(|row| !row.is_submitted)
            .ok_or(StoreError::NotFound("draft attempt"))?;

        for field in fields {
            match field {
                DraftField::SelectedOption => row.question_option_id = attempt.question_option_id,
                DraftField::Correctness => row.is_correct = attempt.is_correct,
                DraftField::Marked => row.is_marked = attempt.is_marked,
            }
        }
        row.updated_at = Utc::now();

        Ok(row.clone())
    }

    async fn submit_draft(
        &self,
        attempt_id: i64,
        expected_option_id: i64,
        is_correct: bool,
    ) -> StoreResult<Attempt> {
        let mut tables = self.tables.write().await;

        let row = tables.attempt_mut(attempt_id).ok_or(StoreError::NotFound("attempt"))?;
        if row.is_submitted || row.question_option_id != Some(expected_option_id) {
            return Err(StoreError::Conflict(
                "attempt changed before it could be submitted".to_string(),
            ));
        }

        row.is_correct = is_correct;
        row.is_submitted = true;
        row.is_marked = false;
        row.updated_at = Utc::now();

        Ok(row.clone())
    }

    async fn latest_draft(&self, question_id: i64, user_id: i64) -> StoreResult<Attempt> {
        self.tables
            .read()
            .await
            .latest(question_id, user_id, false)
            .cloned()
            .ok_or(StoreError::NotFound("draft attempt"))
    }

    async fn latest_submitted(&self, question_id: i64, user_id: i64) -> StoreResult<Attempt> {
        self.tables
            .read()
            .await
            .latest(question_id, user_id, true)
            .cloned()
            .ok_or(StoreError::NotFound("submitted attempt"))
    }

    async fn latest_submitted_bulk(&self, question_ids: &[i64], user_id: i64) -> StoreResult<Vec<Attempt>> {
        let wanted: HashSet<i64> = question_ids.iter().copied().collect();
        let tables = self.tables.read().await;

        let candidates = tables
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && wanted.contains(&a.question_id))
            .cloned();

        let mut latest: Vec<Attempt> = resolve_latest(candidates).into_values().collect();
        latest.sort_by_key(|a| a.question_id);

        Ok(latest)
    }

    async fn marked_questions(&self, question_ids: &[i64], user_id: i64) -> StoreResult<Vec<i64>> {
        let tables = self.tables.read().await;

        let mut marked: Vec<i64> = question_ids
            .iter()
            .copied()
            .collect::<HashSet<_>>()
            .into_iter()
            .filter(|&question_id| {
                tables
                    .latest(question_id, user_id, false)
                    .is_some_and(|draft| draft.is_marked)
            })
            .collect();
        marked.sort_unstable();

        Ok(marked)
    }

    async fn total_by_user(&self, user_id: i64) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables.attempts.iter().filter(|a| a.user_id == user_id).count() as i64)
    }

    async fn total_by_user_and_correctness(&self, user_id: i64, is_correct: bool) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.is_submitted && a.is_correct == is_correct)
            .count() as i64)
    }

    async fn unawarded_correct(&self) -> StoreResult<Vec<Attempt>> {
        let tables = self.tables.read().await;
        Ok(tables
            .attempts
            .iter()
            .filter(|a| a.is_submitted && a.is_correct && !tables.awarded_attempts.contains(&a.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OptionStore for MemoryStore {
    async fn get(&self, option_id: i64) -> StoreResult<QuestionOption> {
        self.tables
            .read()
            .await
            .options
            .get(&option_id)
            .cloned()
            .ok_or(StoreError::NotFound("option"))
    }

    async fn correct_option(&self, question_id: i64) -> StoreResult<Option<QuestionOption>> {
        let tables = self.tables.read().await;
        Ok(tables
            .options
            .values()
            .filter(|o| o.question_id == question_id && o.is_correct_answer)
            .min_by_key(|o| o.id)
            .cloned())
    }
}

#[async_trait]
impl PointLedger for MemoryStore {
    async fn get_by_user(&self, user_id: i64) -> StoreResult<UserPoint> {
        self.tables
            .read()
            .await
            .points
            .get(&user_id)
            .cloned()
            .ok_or(StoreError::NotFound("user point"))
    }

    async fn upsert_add(&self, user_id: i64, delta: i64) -> StoreResult<UserPoint> {
        let mut tables = self.tables.write().await;
        Ok(add_points(&mut tables, user_id, delta))
    }

    async fn award(&self, attempt_id: i64, user_id: i64, delta: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if !tables.awarded_attempts.insert(attempt_id) {
            return Ok(false);
        }
        add_points(&mut tables, user_id, delta);
        Ok(true)
    }

    async fn list(&self, offset: i64, limit: i64) -> StoreResult<(Vec<UserPoint>, i64)> {
        let tables = self.tables.read().await;

        let mut points: Vec<UserPoint> = tables.points.values().cloned().collect();
        points.sort_by(|a, b| b.points.cmp(&a.points).then(a.user_id.cmp(&b.user_id)));
        let total = points.len() as i64;

        let page = points
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();

        Ok((page, total))
    }
}

fn add_points(tables: &mut Tables, user_id: i64, delta: i64) -> UserPoint {
    let now = Utc::now();
    let entry = tables.points.entry(user_id).or_insert(UserPoint {
        user_id,
        points: 0,
        updated_at: now,
    });
    entry.points += delta;
    entry.updated_at = now;
    entry.clone()
}

#[async_trait]
impl PackSessionStore for MemoryStore {
    async fn find_pack(&self, pack_id: i64) -> StoreResult<QuestionPack> {
        self.tables
            .read()
            .await
            .packs
            .get(&pack_id)
            .cloned()
            .ok_or(StoreError::NotFound("question pack"))
    }

    async fn open_session(
        &self,
        pack_id: i64,
        user_id: i64,
        started_at: DateTime<Utc>,
    ) -> StoreResult<(PackSession, bool)> {
        let mut tables = self.tables.write().await;

        if let Some(open) = tables
            .sessions
            .iter()
            .find(|s| s.question_pack_id == pack_id && s.user_id == user_id && !s.is_finished)
        {
            return Ok((open.clone(), false));
        }

        let session = PackSession {
            id: tables.sessions.len() as i64 + 1,
            question_pack_id: pack_id,
            user_id,
            is_finished: false,
            score: 0.0,
            started_at,
            finished_at: None,
            created_at: Utc::now(),
        };
        tables.sessions.push(session.clone());

        Ok((session, true))
    }

    async fn get(&self, session_id: i64) -> StoreResult<PackSession> {
        self.tables
            .read()
            .await
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .ok_or(StoreError::NotFound("pack session"))
    }

    async fn finish(&self, session_id: i64, finished_at: DateTime<Utc>) -> StoreResult<PackSession> {
        let mut tables = self.tables.write().await;

        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or(StoreError::NotFound("pack session"))?;

        if !session.is_finished {
            session.is_finished = true;
            session.finished_at = Some(finished_at);
        }

        Ok(session.clone())
    }

    async fn list(&self, filter: &PackSessionFilter) -> StoreResult<(Vec<PackSession>, i64)> {
        let tables = self.tables.read().await;

        let mut matching: Vec<PackSession> = tables
            .sessions
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        let total = matching.len() as i64;

        let page = matching
            .into_iter()
            .skip(filter.page.offset() as usize)
            .take(filter.page.limit() as usize)
            .collect();

        Ok((page, total))
    }
}
