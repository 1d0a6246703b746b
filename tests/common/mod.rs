#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use expense_tracker::{
    app::build_app,
    config::{AppConfig, Environment, JwtConfig},
    expenses::repo::ExpenseStore,
    memory::{MemoryExpenseStore, MemoryUserStore},
    state::AppState,
};

pub const SECRET: &str = "integration-test-secret";
pub const ISSUER: &str = "expense-tracker";
pub const AUDIENCE: &str = "expense-tracker-users";
pub const PASSWORD: &str = "Str0ng!Pass";

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        database_max_connections: 1,
        jwt: JwtConfig {
            secret: Some(SECRET.into()),
            issuer: ISSUER.into(),
            audience: AUDIENCE.into(),
            expires_in: Duration::from_secs(3600),
        },
        host: "127.0.0.1".into(),
        port: 0,
        cors_origin: "http://localhost:3000".into(),
        environment: Environment::Test,
    }
}

pub fn app_with(config: AppConfig, expenses: Arc<dyn ExpenseStore>) -> Router {
    let state = AppState::from_parts(
        Arc::new(config),
        Arc::new(MemoryUserStore::new()),
        expenses,
    );
    build_app(state)
}

pub fn test_app() -> Router {
    app_with(test_config(), Arc::new(MemoryExpenseStore::new()))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let (content_type, raw) = match body {
        Some(value) => (Some("application/json"), value.to_string()),
        None => (None, String::new()),
    };
    send_raw(app, method, uri, token, content_type, raw).await
}

pub async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    content_type: Option<&str>,
    raw: String,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let request = builder.body(Body::from(raw)).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    TestResponse { status, body }
}

pub async fn register(app: &Router, email: &str) -> TestResponse {
    send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "email": email,
            "password": PASSWORD,
            "first_name": "Test",
            "last_name": "User",
        })),
    )
    .await
}

pub async fn login(app: &Router, email: &str, password: &str) -> TestResponse {
    send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

/// Registers `email` and returns a session token for it.
pub async fn signed_in(app: &Router, email: &str) -> String {
    let res = register(app, email).await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    let res = login(app, email, PASSWORD).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    res.body["data"]["token"].as_str().unwrap().to_string()
}

pub async fn create_expense(app: &Router, token: &str, body: Value) -> Value {
    let res = send(app, Method::POST, "/api/expenses", Some(token), Some(body)).await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    res.body["data"]["expense"].clone()
}

pub fn expense_body(title: &str, amount: f64, category: &str, date: &str) -> Value {
    json!({
        "title": title,
        "amount": amount,
        "category": category,
        "expense_date": date,
    })
}
