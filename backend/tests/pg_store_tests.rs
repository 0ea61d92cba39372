// tests/pg_store_tests.rs
//
// Runs against a live Postgres: `DATABASE_URL=... cargo test -- --ignored`.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use quiz_ledger::{
    models::attempt::{DraftField, NewAttempt},
    store::{AttemptLedger, OptionStore, PackSessionStore, PgStore, PointLedger, StoreError},
};
use sqlx::postgres::PgPoolOptions;

async fn store() -> PgStore {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    PgStore::new(pool)
}

/// IDs that do not collide with earlier runs against the same database.
fn unique_id() -> i64 {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    (nanos % 1_000_000_000_000) as i64
}

async fn seed_option(store: &PgStore, question_id: i64, is_correct: bool) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO question_options (question_id, body, is_correct_answer) VALUES ($1, 'x', $2) RETURNING id",
    )
    .bind(question_id)
    .bind(is_correct)
    .fetch_one(store.pool())
    .await
    .unwrap()
}

#[tokio::test]
#[ignore]
async fn draft_lifecycle_against_postgres() {
    let store = store().await;
    let (question_id, user_id) = (unique_id(), unique_id());
    let wrong = seed_option(&store, question_id, false).await;
    let right = seed_option(&store, question_id, true).await;

    let draft = store
        .create(NewAttempt {
            question_id,
            user_id,
            question_option_id: Some(wrong),
            is_marked: false,
        })
        .await
        .unwrap();

    let second = store
        .create(NewAttempt {
            question_id,
            user_id,
            ..NewAttempt::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(second, StoreError::Conflict(_)));

    let mut edited = draft.clone();
    edited.question_option_id = Some(right);
    let updated = store
        .update_draft(&edited, &[DraftField::SelectedOption])
        .await
        .unwrap();
    assert_eq!(updated.id, draft.id);
    assert_eq!(updated.created_at, draft.created_at);

    // Stale expectation loses against the update above.
    let stale = store.submit_draft(draft.id, wrong, false).await.unwrap_err();
    assert!(matches!(stale, StoreError::Conflict(_)));

    let submitted = store.submit_draft(draft.id, right, true).await.unwrap();
    assert!(submitted.is_submitted && submitted.is_correct);

    assert!(store.latest_draft(question_id, user_id).await.unwrap_err().is_not_found());
    assert_eq!(store.latest_submitted(question_id, user_id).await.unwrap().id, draft.id);
    assert_eq!(store.correct_option(question_id).await.unwrap().map(|o| o.id), Some(right));
}

#[tokio::test]
#[ignore]
async fn bulk_resolution_prefers_submitted_rows() {
    let store = store().await;
    let user_id = unique_id();
    let (q1, q2, q3) = (unique_id(), unique_id() + 1, unique_id() + 2);
    let o1 = seed_option(&store, q1, true).await;

    let submitted = store
        .create(NewAttempt {
            question_id: q1,
            user_id,
            question_option_id: Some(o1),
            is_marked: false,
        })
        .await
        .unwrap();
    store.submit_draft(submitted.id, o1, true).await.unwrap();
    store
        .create(NewAttempt {
            question_id: q1,
            user_id,
            ..NewAttempt::default()
        })
        .await
        .unwrap();
    store
        .create(NewAttempt {
            question_id: q2,
            user_id,
            is_marked: true,
            ..NewAttempt::default()
        })
        .await
        .unwrap();

    let latest = store.latest_submitted_bulk(&[q1, q2, q3], user_id).await.unwrap();
    assert_eq!(latest.len(), 2);
    let for_q1 = latest.iter().find(|a| a.question_id == q1).unwrap();
    assert_eq!(for_q1.id, submitted.id);

    assert_eq!(store.marked_questions(&[q1, q2, q3], user_id).await.unwrap(), vec![q2]);
    assert_eq!(store.total_by_user(user_id).await.unwrap(), 3);
    assert_eq!(store.total_by_user_and_correctness(user_id, true).await.unwrap(), 1);
}

#[tokio::test]
#[ignore]
async fn award_is_idempotent_against_postgres() {
    let store = store().await;
    let (question_id, user_id) = (unique_id(), unique_id());
    let option = seed_option(&store, question_id, true).await;
    let attempt = store
        .create(NewAttempt {
            question_id,
            user_id,
            question_option_id: Some(option),
            is_marked: false,
        })
        .await
        .unwrap();

    store.submit_draft(attempt.id, option, true).await.unwrap();
    let due = store.unawarded_correct().await.unwrap();
    assert!(due.iter().any(|a| a.id == attempt.id));

    assert!(store.award(attempt.id, user_id, 3).await.unwrap());
    assert!(!store.award(attempt.id, user_id, 3).await.unwrap());
    let due = store.unawarded_correct().await.unwrap();
    assert!(due.iter().all(|a| a.id != attempt.id));
    assert_eq!(store.get_by_user(user_id).await.unwrap().points, 3);
}

#[tokio::test]
#[ignore]
async fn one_open_session_per_pack_and_user() {
    let store = store().await;
    let user_id = unique_id();
    let pack_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO question_packs (name, time_limit, is_active) VALUES ('pg', 30, TRUE) RETURNING id",
    )
    .fetch_one(store.pool())
    .await
    .unwrap();

    let (first, created) = store.open_session(pack_id, user_id, Utc::now()).await.unwrap();
    assert!(created);
    let (again, created) = store.open_session(pack_id, user_id, Utc::now()).await.unwrap();
    assert!(!created);
    assert_eq!(again.id, first.id);

    let finished = store.finish(first.id, Utc::now()).await.unwrap();
    assert!(finished.is_finished);
    let (next, created) = store.open_session(pack_id, user_id, Utc::now()).await.unwrap();
    assert!(created);
    assert_ne!(next.id, first.id);
}
