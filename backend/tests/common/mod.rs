// tests/common/mod.rs

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::sync::Arc;

use quiz_ledger::{
    config::Config,
    routes,
    services::{attempt::AttemptService, award, pack_session::PackSessionService},
    state::AppState,
    store::MemoryStore,
    utils::{jwt::sign_jwt, retry::RetryConfig},
};

const JWT_SECRET: &str = "test_secret_for_integration_tests";

pub struct TestApp {
    pub address: String,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Bearer token for `user_id`, signed with the app's secret.
    pub fn token(&self, user_id: i64) -> String {
        sign_jwt(user_id, "user", JWT_SECRET, 600).expect("Failed to sign token")
    }

    pub async fn post(&self, user_id: i64, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(self.token(user_id))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn put(&self, user_id: i64, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(self.token(user_id))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, user_id: i64, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(self.token(user_id))
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// Spawns the app on a random port, backed by an in-memory store.
///
/// Seeds question 1 (option 10 wrong, option 11 right), question 2
/// (option 20 right), an active pack 1 and an inactive pack 2.
pub async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    store.insert_option(10, 1, "Doric", false).await;
    store.insert_option(11, 1, "Ionic", true).await;
    store.insert_option(20, 2, "Corinthian", true).await;
    store.insert_pack(1, "Orders", 30, true).await;
    store.insert_pack(2, "Retired", 30, false).await;

    let config = Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        rust_log: "error".to_string(),
        server_port: 0,
        db_max_connections: 1,
        award_max_attempts: 3,
    };

    // The worker runs for the lifetime of the test runtime.
    let (awards, _worker) = award::spawn(store.clone(), RetryConfig::with_max_attempts(3));

    let state = AppState {
        attempts: Arc::new(AttemptService::new(store.clone(), store.clone(), awards)),
        packs: Arc::new(PackSessionService::new(store.clone())),
        points: store.clone(),
        config,
    };

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        client: reqwest::Client::new(),
    }
}
