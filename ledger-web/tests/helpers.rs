//! Integration test helpers
//!
//! Every test spawns its own server over a private in-memory database.

#![allow(dead_code)]

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ledger_core::LedgerConfig;
use ledger_web::{create_app, AppState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::LazyLock;
use tokio::net::TcpListener;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin123";
pub const PASSWORD: &str = "secret123";

// Initialise tracing only once
static TRACING: LazyLock<()> = LazyLock::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    } else {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(std::io::sink)
            .finish();
        tracing::subscriber::set_global_default(subscriber).ok();
    }
});

/// Running test server
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.address, path)
    }

    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.api_client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post<Body>(&self, path: &str, token: &str, body: &Body) -> reqwest::Response
    where
        Body: serde::Serialize,
    {
        self.api_client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn put<Body>(&self, path: &str, token: &str, body: &Body) -> reqwest::Response
    where
        Body: serde::Serialize,
    {
        self.api_client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn delete(&self, path: &str, token: &str) -> reqwest::Response {
        self.api_client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_register(&self, username: &str, password: &str) -> reqwest::Response {
        self.api_client
            .post(self.url("/register"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_login(&self, username: &str, password: &str) -> reqwest::Response {
        self.api_client
            .post(self.url("/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Log in and return the bearer token
    pub async fn login(&self, username: &str, password: &str) -> String {
        let response = self.post_login(username, password).await;
        assert_eq!(response.status().as_u16(), 200, "login failed for {}", username);
        let body: Value = response.json().await.unwrap();
        body["data"]["access_token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    /// Register a basic user, log in, and return `(id, token)`
    pub async fn register_and_login(&self, username: &str) -> (i64, String) {
        let response = self.post_register(username, PASSWORD).await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        let id = body["data"]["id"].as_i64().unwrap();
        (id, self.login(username, PASSWORD).await)
    }

    /// Create an entry and return its id
    pub async fn create_entry(&self, token: &str, body: &Value) -> i64 {
        let response = self.post("/ledger", token, body).await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        body["data"]["id"].as_i64().unwrap()
    }

    pub async fn set_role(&self, admin_token: &str, user_id: i64, role: &str) -> reqwest::Response {
        self.put(
            &format!("/admin/users/{}/role", user_id),
            admin_token,
            &json!({ "role": role }),
        )
        .await
    }
}

/// A complete, valid entry body
pub fn entry_body(project_name: &str) -> Value {
    json!({
        "province": "上海",
        "project_name": project_name,
        "date": "2024-03-01",
        "location": "会议室A",
        "personnel": "张三",
        "nature": "会议纪要",
        "specific_matters": "讨论项目进度。确认下周计划",
        "follow_up_points": "跟进合同"
    })
}

/// Decode the claims segment of a token without verifying it
pub fn token_claims(token: &str) -> Value {
    let payload = token.split('.').nth(1).expect("token has a payload");
    let bytes = URL_SAFE_NO_PAD.decode(payload).expect("payload is base64url");
    serde_json::from_slice(&bytes).expect("payload is JSON")
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Spawn a server after adjusting the default test configuration
pub async fn spawn_app_with<F>(configure: F) -> TestApp
where
    F: FnOnce(&mut LedgerConfig),
{
    LazyLock::force(&TRACING);

    let mut config = LedgerConfig::default();
    config.server.port = 0;
    config.database.url = "sqlite::memory:".to_string();
    config.auth.jwt_secret = Some("integration-test-secret".to_string());
    configure(&mut config);

    let state = AppState::new(config).await.unwrap();
    let app = create_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        port,
        api_client: client,
    }
}
