// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{AttemptLedger, OptionStore, PackSessionStore, PointLedger, StoreError, StoreResult};
use crate::models::{
    attempt::{Attempt, DraftField, NewAttempt},
    option::QuestionOption,
    pack_session::{PackSession, PackSessionFilter, QuestionPack},
    point::UserPoint,
};

const ATTEMPT_COLUMNS: &str = "id, question_id, user_id, question_option_id, is_correct, is_marked, \
                               is_submitted, created_at, updated_at";

const SESSION_COLUMNS: &str =
    "id, question_pack_id, user_id, is_finished, score, started_at, finished_at, created_at";

/// Postgres-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AttemptLedger for PgStore {
    async fn create(&self, attempt: NewAttempt) -> StoreResult<Attempt> {
        // The partial unique index on drafts turns a second draft into 23505.
        let created = sqlx::query_as::<_, Attempt>(&format!(
            r#"
            INSERT INTO user_question_attempts (question_id, user_id, question_option_id, is_marked)
            VALUES ($1, $2, $3, $4)
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(attempt.question_id)
        .bind(attempt.user_id)
        .bind(attempt.question_option_id)
        .bind(attempt.is_marked)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(
                question_id = attempt.question_id,
                user_id = attempt.user_id,
                "Failed to create attempt: {:?}",
                e
            );
            StoreError::from(e)
        })?;

        Ok(created)
    }

    async fn update_draft(&self, attempt: &Attempt, fields: &[DraftField]) -> StoreResult<Attempt> {
        let mut query_builder = QueryBuilder::<Postgres>::new("UPDATE user_question_attempts SET ");

        let mut set = query_builder.separated(", ");
        for field in fields {
            match field {
                DraftField::SelectedOption => {
                    set.push("question_option_id = ");
                    set.push_bind_unseparated(attempt.question_option_id);
                }
                DraftField::Correctness => {
                    set.push("is_correct = ");
                    set.push_bind_unseparated(attempt.is_correct);
                }
                DraftField::Marked => {
                    set.push("is_marked = ");
                    set.push_bind_unseparated(attempt.is_marked);
                }
            }
        }
        set.push("updated_at = NOW()");

        query_builder.push(" WHERE id = ");
        query_builder.push_bind(attempt.id);
        query_builder.push(" AND is_submitted = FALSE RETURNING ");
        query_builder.push(ATTEMPT_COLUMNS);

        query_builder
            .build_query_as::<Attempt>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("draft attempt"))
    }

    async fn submit_draft(
        &self,
        attempt_id: i64,
        expected_option_id: i64,
        is_correct: bool,
    ) -> StoreResult<Attempt> {
        let submitted = sqlx::query_as::<_, Attempt>(&format!(
            r#"
            UPDATE user_question_attempts
            SET is_correct = $3, is_submitted = TRUE, is_marked = FALSE, updated_at = NOW()
            WHERE id = $1 AND is_submitted = FALSE AND question_option_id = $2
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(attempt_id)
        .bind(expected_option_id)
        .bind(is_correct)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(attempt) = submitted {
            return Ok(attempt);
        }

        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM user_question_attempts WHERE id = $1")
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?;

        match exists {
            Some(_) => Err(StoreError::Conflict(
                "attempt changed before it could be submitted".to_string(),
            )),
            None => Err(StoreError::NotFound("attempt")),
        }
    }

    async fn latest_draft(&self, question_id: i64, user_id: i64) -> StoreResult<Attempt> {
        self.latest_with_status(question_id, user_id, false)
            .await?
            .ok_or(StoreError::NotFound("draft attempt"))
    }

    async fn latest_submitted(&self, question_id: i64, user_id: i64) -> StoreResult<Attempt> {
        self.latest_with_status(question_id, user_id, true)
            .await?
            .ok_or(StoreError::NotFound("submitted attempt"))
    }

    async fn latest_submitted_bulk(&self, question_ids: &[i64], user_id: i64) -> StoreResult<Vec<Attempt>> {
        if question_ids.is_empty() {
            return Ok(Vec::new());
        }

        // Filter before ranking so the window only sees this user's rows for
        // the requested questions.
        let attempts = sqlx::query_as::<_, Attempt>(&format!(
            r#"
            SELECT {ATTEMPT_COLUMNS}
            FROM (
                SELECT {ATTEMPT_COLUMNS},
                       ROW_NUMBER() OVER (
                           PARTITION BY question_id
                           ORDER BY is_submitted DESC, created_at DESC, id DESC
                       ) AS rn
                FROM user_question_attempts
                WHERE user_id = $1 AND question_id = ANY($2)
            ) ranked
            WHERE ranked.rn = 1
            ORDER BY question_id
            "#
        ))
        .bind(user_id)
        .bind(question_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(user_id, "Failed to resolve latest answers: {:?}", e);
            StoreError::from(e)
        })?;

        Ok(attempts)
    }

    async fn marked_questions(&self, question_ids: &[i64], user_id: i64) -> StoreResult<Vec<i64>> {
        if question_ids.is_empty() {
            return Ok(Vec::new());
        }

        let marked = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT question_id
            FROM user_question_attempts
            WHERE user_id = $1 AND question_id = ANY($2)
              AND is_submitted = FALSE AND is_marked = TRUE
            ORDER BY question_id
            "#,
        )
        .bind(user_id)
        .bind(question_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        Ok(marked)
    }

    async fn total_by_user(&self, user_id: i64) -> StoreResult<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(id) FROM user_question_attempts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }

    async fn total_by_user_and_correctness(&self, user_id: i64, is_correct: bool) -> StoreResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(id)
            FROM user_question_attempts
            WHERE user_id = $1 AND is_submitted = TRUE AND is_correct = $2
            "#,
        )
        .bind(user_id)
        .bind(is_correct)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn unawarded_correct(&self) -> StoreResult<Vec<Attempt>> {
        let attempts = sqlx::query_as::<_, Attempt>(&format!(
            r#"
            SELECT {ATTEMPT_COLUMNS}
            FROM user_question_attempts a
            WHERE a.is_submitted = TRUE AND a.is_correct = TRUE
              AND NOT EXISTS (SELECT 1 FROM point_awards pa WHERE pa.attempt_id = a.id)
            ORDER BY a.id
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(attempts)
    }
}

impl PgStore {
    async fn latest_with_status(
        &self,
        question_id: i64,
        user_id: i64,
        is_submitted: bool,
    ) -> StoreResult<Option<Attempt>> {
        let attempt = sqlx::query_as::<_, Attempt>(&format!(
            r#"
            SELECT {ATTEMPT_COLUMNS}
            FROM user_question_attempts
            WHERE question_id = $1 AND user_id = $2 AND is_submitted = $3
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(question_id)
        .bind(user_id)
        .bind(is_submitted)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }
}

#[async_trait]
impl OptionStore for PgStore {
    async fn get(&self, option_id: i64) -> StoreResult<QuestionOption> {
        sqlx::query_as::<_, QuestionOption>(
            "SELECT id, question_id, body, is_correct_answer FROM question_options WHERE id = $1",
        )
        .bind(option_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("option"))
    }

    async fn correct_option(&self, question_id: i64) -> StoreResult<Option<QuestionOption>> {
        let option = sqlx::query_as::<_, QuestionOption>(
            r#"
            SELECT id, question_id, body, is_correct_answer
            FROM question_options
            WHERE question_id = $1 AND is_correct_answer = TRUE
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(option)
    }
}

const UPSERT_POINTS: &str = r#"
    INSERT INTO user_points (user_id, points)
    VALUES ($1, $2)
    ON CONFLICT (user_id) DO UPDATE SET
        points = user_points.points + EXCLUDED.points,
        updated_at = NOW()
    RETURNING user_id, points, updated_at
"#;

#[async_trait]
impl PointLedger for PgStore {
    async fn get_by_user(&self, user_id: i64) -> StoreResult<UserPoint> {
        sqlx::query_as::<_, UserPoint>("SELECT user_id, points, updated_at FROM user_points WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("user point"))
    }

    async fn upsert_add(&self, user_id: i64, delta: i64) -> StoreResult<UserPoint> {
        let point = sqlx::query_as::<_, UserPoint>(UPSERT_POINTS)
            .bind(user_id)
            .bind(delta)
            .fetch_one(&self.pool)
            .await?;

        Ok(point)
    }

    async fn award(&self, attempt_id: i64, user_id: i64, delta: i64) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            INSERT INTO point_awards (attempt_id, user_id, points)
            VALUES ($1, $2, $3)
            ON CONFLICT (attempt_id) DO NOTHING
            "#,
        )
        .bind(attempt_id)
        .bind(user_id)
        .bind(delta)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query_as::<_, UserPoint>(UPSERT_POINTS)
            .bind(user_id)
            .bind(delta)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn list(&self, offset: i64, limit: i64) -> StoreResult<(Vec<UserPoint>, i64)> {
        let points = sqlx::query_as::<_, UserPoint>(
            r#"
            SELECT user_id, points, updated_at
            FROM user_points
            ORDER BY points DESC, user_id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_points")
            .fetch_one(&self.pool)
            .await?;

        Ok((points, total))
    }
}

fn push_session_filters(query_builder: &mut QueryBuilder<'_, Postgres>, filter: &PackSessionFilter) {
    query_builder.push(" WHERE TRUE");
    if let Some(user_id) = filter.user_id {
        query_builder.push(" AND user_id = ");
        query_builder.push_bind(user_id);
    }
    if let Some(pack_id) = filter.question_pack_id {
        query_builder.push(" AND question_pack_id = ");
        query_builder.push_bind(pack_id);
    }
    if let Some(is_finished) = filter.is_finished {
        query_builder.push(" AND is_finished = ");
        query_builder.push_bind(is_finished);
    }
}

#[async_trait]
impl PackSessionStore for PgStore {
    async fn find_pack(&self, pack_id: i64) -> StoreResult<QuestionPack> {
        sqlx::query_as::<_, QuestionPack>("SELECT id, name, time_limit, is_active FROM question_packs WHERE id = $1")
            .bind(pack_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("question pack"))
    }

    async fn open_session(
        &self,
        pack_id: i64,
        user_id: i64,
        started_at: DateTime<Utc>,
    ) -> StoreResult<(PackSession, bool)> {
        let created = sqlx::query_as::<_, PackSession>(&format!(
            r#"
            INSERT INTO question_pack_attempts (question_pack_id, user_id, started_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (question_pack_id, user_id) WHERE is_finished = FALSE DO NOTHING
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(pack_id)
        .bind(user_id)
        .bind(started_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(session) = created {
            return Ok((session, true));
        }

        let open = sqlx::query_as::<_, PackSession>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM question_pack_attempts
            WHERE question_pack_id = $1 AND user_id = $2 AND is_finished = FALSE
            "#
        ))
        .bind(pack_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::Conflict("open pack session finished concurrently".to_string()))?;

        Ok((open, false))
    }

    async fn get(&self, session_id: i64) -> StoreResult<PackSession> {
        sqlx::query_as::<_, PackSession>(&format!(
            "SELECT {SESSION_COLUMNS} FROM question_pack_attempts WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("pack session"))
    }

    async fn finish(&self, session_id: i64, finished_at: DateTime<Utc>) -> StoreResult<PackSession> {
        let finished = sqlx::query_as::<_, PackSession>(&format!(
            r#"
            UPDATE question_pack_attempts
            SET is_finished = TRUE, finished_at = $2
            WHERE id = $1 AND is_finished = FALSE
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(finished_at)
        .fetch_optional(&self.pool)
        .await?;

        match finished {
            Some(session) => Ok(session),
            None => PackSessionStore::get(self, session_id).await,
        }
    }

    async fn list(&self, filter: &PackSessionFilter) -> StoreResult<(Vec<PackSession>, i64)> {
        let mut query_builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {SESSION_COLUMNS} FROM question_pack_attempts"
        ));
        push_session_filters(&mut query_builder, filter);
        query_builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        query_builder.push_bind(filter.page.limit());
        query_builder.push(" OFFSET ");
        query_builder.push_bind(filter.page.offset());

        let sessions = query_builder
            .build_query_as::<PackSession>()
            .fetch_all(&self.pool)
            .await?;

        let mut count_builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM question_pack_attempts");
        push_session_filters(&mut count_builder, filter);

        let total = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok((sessions, total))
    }
}
