// tests/attempt_api_tests.rs

mod common;

use std::time::Duration;

use common::spawn_app;
use serde_json::{Value, json};

/// Awards land asynchronously; poll the balance for a while.
async fn wait_for_points(app: &common::TestApp, user_id: i64, expected: i64) -> i64 {
    let mut points = 0;
    for _ in 0..50 {
        let body: Value = app.get(user_id, "/api/analytic/point").await.json().await.unwrap();
        points = body["points"].as_i64().unwrap();
        if points == expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    points
}

#[tokio::test]
async fn unknown_path_is_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn missing_or_bad_token_is_401() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/question/answer"))
        .json(&json!({"question_id": 1, "option_id": 10}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = app
        .client
        .get(app.url("/api/analytic/point"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn answer_change_submit_flow() {
    let app = spawn_app().await;

    let first: Value = app
        .post(1, "/api/question/answer", json!({"question_id": 1, "option_id": 10}))
        .await
        .json()
        .await
        .unwrap();
    let second: Value = app
        .post(1, "/api/question/answer", json!({"question_id": 1, "option_id": 11}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["id"], second["id"]);
    assert_eq!(second["option_id"], 11);
    assert_eq!(second["is_submitted"], false);

    let response = app
        .post(1, "/api/question/submit-answer", json!({"question_id": 1}))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let outcome: Value = response.json().await.unwrap();
    assert_eq!(
        outcome,
        json!({
            "attempt_value": true,
            "answer_id": 11,
            "true_answer_id": 11,
            "true_answer_streak": 0
        })
    );

    assert_eq!(app.store.attempts_for(1, 1).await.len(), 1);
    assert_eq!(wait_for_points(&app, 1, 3).await, 3);
}

#[tokio::test]
async fn submit_without_answer_is_400() {
    let app = spawn_app().await;

    let response = app
        .post(1, "/api/question/submit-answer", json!({"question_id": 1}))
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "empty answer");
}

#[tokio::test]
async fn option_of_another_question_is_400() {
    let app = spawn_app().await;

    let response = app
        .post(1, "/api/question/answer", json!({"question_id": 1, "option_id": 20}))
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn invalid_payload_is_400() {
    let app = spawn_app().await;

    let response = app
        .post(1, "/api/question/answer", json!({"question_id": 0, "option_id": 10}))
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .post(1, "/api/question/answers", json!({"question_ids": []}))
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn latest_answer_is_404_before_any_attempt() {
    let app = spawn_app().await;

    let response = app.get(1, "/api/question/answer/1").await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn latest_answer_prefers_submitted_row() {
    let app = spawn_app().await;

    app.post(1, "/api/question/answer", json!({"question_id": 1, "option_id": 11}))
        .await;
    app.post(1, "/api/question/submit-answer", json!({"question_id": 1}))
        .await;
    app.post(1, "/api/question/answer", json!({"question_id": 1, "option_id": 10}))
        .await;

    let latest: Value = app.get(1, "/api/question/answer/1").await.json().await.unwrap();
    assert_eq!(latest["is_submitted"], true);
    assert_eq!(latest["option_id"], 11);
    assert_eq!(latest["attempt_value"], true);
}

#[tokio::test]
async fn bulk_answers_are_keyed_by_question() {
    let app = spawn_app().await;

    app.post(1, "/api/question/answer", json!({"question_id": 1, "option_id": 10}))
        .await;
    app.post(1, "/api/question/submit-answer", json!({"question_id": 1}))
        .await;
    app.post(1, "/api/question/answer", json!({"question_id": 2, "option_id": 20}))
        .await;

    let latest: Value = app
        .post(1, "/api/question/answers", json!({"question_ids": [1, 2, 3]}))
        .await
        .json()
        .await
        .unwrap();

    let map = latest.as_object().unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["1"]["is_submitted"], true);
    assert_eq!(map["2"]["is_submitted"], false);
    assert!(!map.contains_key("3"));
}

#[tokio::test]
async fn mark_flow() {
    let app = spawn_app().await;

    let marked: Value = app
        .post(1, "/api/question/mark", json!({"question_id": 2}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(marked["is_marked"], true);
    assert_eq!(marked["option_id"], Value::Null);

    let marks: Value = app
        .post(1, "/api/question/marks", json!({"question_ids": [1, 2]}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(marks, json!([2]));

    let removed: Value = app
        .put(1, "/api/question/add-remove-mark", json!({"question_id": 2, "action": "remove"}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(removed["is_marked"], false);

    // Nothing to unmark on an untouched question.
    let response = app
        .put(1, "/api/question/add-remove-mark", json!({"question_id": 1, "action": "remove"}))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.json::<Value>().await.unwrap(), Value::Null);

    let response = app
        .put(1, "/api/question/add-remove-mark", json!({"question_id": 1, "action": "toggle"}))
        .await;
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn clear_answer_drops_selection() {
    let app = spawn_app().await;

    app.post(1, "/api/question/answer", json!({"question_id": 1, "option_id": 11}))
        .await;
    let cleared: Value = app
        .post(1, "/api/question/clear-answer", json!({"question_id": 1}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["option_id"], Value::Null);

    let response = app
        .post(1, "/api/question/submit-answer", json!({"question_id": 1}))
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn attempt_summary_and_point_list() {
    let app = spawn_app().await;

    for (user, option) in [(1, 11), (2, 11), (3, 10)] {
        app.post(user, "/api/question/answer", json!({"question_id": 1, "option_id": option}))
            .await;
        app.post(user, "/api/question/submit-answer", json!({"question_id": 1}))
            .await;
    }
    app.post(1, "/api/question/answer", json!({"question_id": 2, "option_id": 20}))
        .await;
    app.post(1, "/api/question/submit-answer", json!({"question_id": 2}))
        .await;

    let summary: Value = app.get(3, "/api/analytic/attempt").await.json().await.unwrap();
    assert_eq!(summary, json!({"total": 1, "total_true": 0, "total_false": 1}));

    assert_eq!(wait_for_points(&app, 1, 6).await, 6);
    assert_eq!(wait_for_points(&app, 2, 3).await, 3);
    assert_eq!(wait_for_points(&app, 3, 0).await, 0);

    let list: Value = app
        .get(3, "/api/analytic/point-list?page=1&limit=1")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(list["total"], 2);
    assert_eq!(list["limit"], 1);
    assert_eq!(list["data"][0]["user_id"], 1);
    assert_eq!(list["data"][0]["points"], 6);
}

#[tokio::test]
async fn concurrent_answers_keep_a_single_draft() {
    let app = spawn_app().await;

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8 {
        let client = app.client.clone();
        let url = app.url("/api/question/answer");
        let token = app.token(5);
        let option = if i % 2 == 0 { 10 } else { 11 };
        tasks.spawn(async move {
            client
                .post(url)
                .bearer_auth(token)
                .json(&json!({"question_id": 1, "option_id": option}))
                .send()
                .await
                .unwrap()
                .status()
                .as_u16()
        });
    }
    while let Some(status) = tasks.join_next().await {
        assert_eq!(status.unwrap(), 200);
    }

    assert_eq!(app.store.attempts_for(1, 5).await.len(), 1);
}

#[tokio::test]
async fn huge_page_number_yields_empty_page() {
    let app = spawn_app().await;
    app.post(1, "/api/question/answer", json!({"question_id": 1, "option_id": 11}))
        .await;
    app.post(1, "/api/question/submit-answer", json!({"question_id": 1}))
        .await;
    assert_eq!(wait_for_points(&app, 1, 3).await, 3);

    let response = app
        .get(1, "/api/analytic/point-list?page=9223372036854775807&limit=100")
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let list: Value = response.json().await.unwrap();
    assert_eq!(list["total"], 1);
    assert!(list["data"].as_array().unwrap().is_empty());

    let response = app
        .get(1, "/api/question-pack/attempt?page=9223372036854775807&limit=100")
        .await;
    assert_eq!(response.status().as_u16(), 200);
}
