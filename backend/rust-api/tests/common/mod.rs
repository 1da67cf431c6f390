#![allow(dead_code)]

use adaptive_quiz_api::{
    config::Config,
    create_router,
    models::UserRole,
    services::{auth_service::AuthService, AppState},
    storage::{JsonFileStore, QuizStore},
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "Password123";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    // keeps the data directory alive for the duration of the test
    _data_dir: TempDir,
}

/// Router backed by a JSON-file store in a fresh temporary directory
pub async fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let data_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = Config::with_json_store(data_dir.path());
    let store: Arc<dyn QuizStore> = Arc::new(
        JsonFileStore::open(data_dir.path())
            .await
            .expect("Failed to open JSON store"),
    );
    let state = Arc::new(AppState::with_store(config, store));

    TestApp {
        router: create_router(state.clone()),
        state,
        _data_dir: data_dir,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, token, Some(body)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.post(
            "/api/v1/auth/login",
            None,
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Registers a student through the API and returns a bearer token
    pub async fn student_token(&self, email: &str) -> String {
        let (status, body) = self
            .post(
                "/api/v1/auth/register",
                None,
                json!({ "name": "Test Student", "email": email, "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        self.token_for(email).await
    }

    /// Creates an account with any role directly through the service layer
    pub async fn token_with_role(&self, email: &str, role: UserRole) -> String {
        AuthService::new(
            self.state.store.clone(),
            self.state.jwt.clone(),
            &self.state.config,
        )
        .create_user("Staff Member", email, PASSWORD, role)
        .await
        .expect("Failed to create user");
        self.token_for(email).await
    }

    async fn token_for(&self, email: &str) -> String {
        let (status, body) = self.login(email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Creates a question as `token` and returns its id
    pub async fn create_question(
        &self,
        token: &str,
        topic: &str,
        difficulty: &str,
        points: u32,
    ) -> String {
        let (status, body) = self
            .post(
                "/api/v1/questions",
                Some(token),
                json!({
                    "title": format!("{topic} {difficulty} question"),
                    "content": "Which option is the correct one?",
                    "question_type": "multiple_choice",
                    "topic": topic,
                    "difficulty": difficulty,
                    "options": ["A", "B", "C"],
                    "correct_answer": "B",
                    "explanation": "B is correct",
                    "points": points,
                    "tags": [topic]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create question failed: {body}");
        body["question_id"].as_str().unwrap().to_string()
    }
}
