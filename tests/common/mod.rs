#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use school_api_rust::config::AppConfig;
use school_api_rust::database::{DocumentStore, MemoryStore};
use school_api_rust::{router, AppState};

pub const LONG_SECRET: &str = "test-long-token-secret";
pub const SHORT_SECRET: &str = "test-short-token-secret";
pub const PASSWORD: &str = "Secret123";

/// Configuration for an in-memory test server.
pub fn test_config(delete_strategy: &str) -> AppConfig {
    let strategy = delete_strategy.to_string();
    AppConfig::from_vars(move |key| match key {
        "LONG_TOKEN_SECRET" => Some(LONG_SECRET.to_string()),
        "SHORT_TOKEN_SECRET" => Some(SHORT_SECRET.to_string()),
        "STORE_BACKEND" => Some("memory".to_string()),
        "DELETE_STRATEGY" => Some(strategy.clone()),
        "API_ENABLE_REQUEST_LOGGING" => Some("false".to_string()),
        _ => None,
    })
    .expect("test configuration is valid")
}

/// An API server running inside the test process on its own port and
/// its own store.
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub state: AppState,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_server() -> Result<TestServer> {
    spawn_server_with(test_config("check_then_delete"), Arc::new(MemoryStore::new())).await
}

pub async fn spawn_server_with(config: AppConfig, store: Arc<dyn DocumentStore>) -> Result<TestServer> {
    // Pick an unused port for isolation
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test port")?;

    let state = AppState::new(config, store)?;
    let app = router(state.clone());
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        state,
        handle,
    })
}

impl TestServer {
    pub async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut req = self.client.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = token {
            req = req.header("token", token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await?;
        let status = res.status();
        let body = res.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, body))
    }

    pub async fn get(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.send(reqwest::Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        self.send(reqwest::Method::POST, path, token, Some(body)).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(reqwest::Method::PUT, path, Some(token), Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.send(reqwest::Method::DELETE, path, Some(token), None).await
    }

    /// Create the first user (bootstrap) and return its long token.
    pub async fn bootstrap_super_admin(&self) -> Result<String> {
        let (status, body) = self
            .post(
                "/api/user/createUser",
                None,
                json!({ "email": "root@school.edu", "password": PASSWORD }),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "bootstrap failed: {}", body);
        token_of(&body)
    }

    pub async fn create_school(&self, token: &str, name: &str) -> Result<String> {
        let (status, body) = self
            .post(
                "/api/school/create",
                Some(token),
                json!({ "name": name, "address": format!("{} Road 1", name) }),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "school create failed: {}", body);
        id_of(&body)
    }

    /// Create an admin for `school_id` and return its long token.
    pub async fn create_admin(&self, super_token: &str, email: &str, school_id: &str) -> Result<String> {
        let (status, body) = self
            .post(
                "/api/user/createUser",
                Some(super_token),
                json!({ "email": email, "password": PASSWORD, "role": "admin", "schoolID": school_id }),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "admin create failed: {}", body);
        token_of(&body)
    }

    pub async fn create_classroom(&self, token: &str, school_id: &str, name: &str) -> Result<(StatusCode, Value)> {
        self.post(
            "/api/classroom/create",
            Some(token),
            json!({ "name": name, "schoolID": school_id }),
        )
        .await
    }

    pub async fn create_student(&self, token: &str, classroom_id: &str, name: &str) -> Result<(StatusCode, Value)> {
        self.post(
            "/api/student/create",
            Some(token),
            json!({ "name": name, "age": 10, "classroomID": classroom_id }),
        )
        .await
    }
}

pub fn token_of(body: &Value) -> Result<String> {
    body["data"]["longToken"]
        .as_str()
        .map(str::to_string)
        .context("response has no long token")
}

pub fn id_of(body: &Value) -> Result<String> {
    body["data"]["_id"]
        .as_str()
        .map(str::to_string)
        .context("response has no _id")
}

pub fn data_len(body: &Value) -> usize {
    body["data"].as_array().map(Vec::len).unwrap_or(0)
}
