mod common;

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use time::OffsetDateTime;

use common::*;
use expense_tracker::{
    auth::jwt::JwtKeys,
    config::Environment,
    memory::MemoryExpenseStore,
};

fn token_with_exp(exp: i64) -> String {
    let claims = json!({
        "userId": 1,
        "email": "a@example.com",
        "iat": exp - 60,
        "exp": exp,
        "iss": ISSUER,
        "aud": AUDIENCE,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn register_returns_profile_without_hash() {
    let app = test_app();
    let res = register(&app, "ada@example.com").await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["message"], "User registered successfully");
    let user = &res.body["data"]["user"];
    assert_eq!(user["email"], "ada@example.com");
    assert_eq!(user["first_name"], "Test");
    assert!(user["id"].as_i64().is_some());
    assert!(user.get("password_hash").is_none());
    assert!(user.get("password").is_none());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = test_app();
    assert_eq!(register(&app, "dup@example.com").await.status, StatusCode::CREATED);

    let res = register(&app, "dup@example.com").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["success"], false);
    assert_eq!(res.body["message"], "Registration failed");
    assert_eq!(res.body["error"], "User with this email already exists");
    assert!(res.body.get("data").is_none());
}

#[tokio::test]
async fn registration_validates_payload() {
    let app = test_app();
    let res = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "email": "not-an-email",
            "password": "weakpass",
            "first_name": "A",
            "last_name": "User",
        })),
    )
    .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let error = res.body["error"].as_str().unwrap();
    assert!(error.contains("Please provide a valid email address"), "{error}");
    assert!(error.contains("First name must be at least 2 characters long"), "{error}");
}

#[tokio::test]
async fn registration_lists_every_missing_field() {
    let app = test_app();
    let res = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": "partial@example.com" })),
    )
    .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["success"], false);
    let error = res.body["error"].as_str().unwrap();
    for missing in [
        "Password is required",
        "First name is required",
        "Last name is required",
    ] {
        assert!(error.contains(missing), "{error}");
    }
    assert!(!error.contains("missing field"), "{error}");
}

#[tokio::test]
async fn login_token_verifies_to_the_same_identity() {
    let app = test_app();
    let registered = register(&app, "grace@example.com").await;
    let user_id = registered.body["data"]["user"]["id"].as_i64().unwrap();

    let res = login(&app, "grace@example.com", PASSWORD).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Login successful");
    assert_eq!(res.body["data"]["user"]["id"], user_id);

    let token = res.body["data"]["token"].as_str().unwrap();
    let identity = JwtKeys::from_config(&test_config().jwt)
        .unwrap()
        .verify(token)
        .unwrap();
    assert_eq!(identity.user_id, user_id);
    assert_eq!(identity.email, "grace@example.com");
}

#[tokio::test]
async fn bad_credentials_fail_generically() {
    let app = test_app();
    register(&app, "alan@example.com").await;

    let wrong_password = login(&app, "alan@example.com", "Wr0ng!Pass").await;
    let unknown_email = login(&app, "nobody@example.com", PASSWORD).await;

    for res in [wrong_password, unknown_email] {
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["message"], "Login failed");
        assert_eq!(res.body["error"], "Invalid email or password");
    }
}

#[tokio::test]
async fn profile_read_and_update() {
    let app = test_app();
    let token = signed_in(&app, "linus@example.com").await;
    signed_in(&app, "taken@example.com").await;

    let res = send(&app, Method::GET, "/api/auth/profile", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Profile retrieved successfully");
    assert_eq!(res.body["data"]["user"]["email"], "linus@example.com");

    let res = send(
        &app,
        Method::PUT,
        "/api/auth/profile",
        Some(&token),
        Some(json!({ "first_name": "Linus", "last_name": "Torvalds" })),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Profile updated successfully");
    assert_eq!(res.body["data"]["user"]["first_name"], "Linus");

    let res = send(&app, Method::PUT, "/api/auth/profile", Some(&token), Some(json!({}))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"], "No valid fields to update");

    let res = send(
        &app,
        Method::PUT,
        "/api/auth/profile",
        Some(&token),
        Some(json!({ "email": "taken@example.com" })),
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Failed to update profile");
    assert_eq!(res.body["error"], "Email already exists");
}

#[tokio::test]
async fn changed_password_is_used_for_login() {
    let app = test_app();
    let token = signed_in(&app, "rotate@example.com").await;

    let res = send(
        &app,
        Method::PUT,
        "/api/auth/profile",
        Some(&token),
        Some(json!({ "password": "N3w!Secret" })),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);

    assert_eq!(
        login(&app, "rotate@example.com", PASSWORD).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        login(&app, "rotate@example.com", "N3w!Secret").await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn missing_expired_and_invalid_tokens() {
    let app = test_app();

    let res = send(&app, Method::GET, "/api/auth/profile", None, None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Access token required");
    assert_eq!(res.body["error"], "No token provided");

    let expired = token_with_exp(OffsetDateTime::now_utc().unix_timestamp() - 3600);
    let res = send(&app, Method::GET, "/api/expenses", Some(&expired), None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Token expired");
    assert_eq!(res.body["error"], "Please login again");

    let res = send(&app, Method::GET, "/api/expenses", Some("not.a.jwt"), None).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["message"], "Invalid token");
    assert_eq!(res.body["error"], "Token verification failed");
}

#[tokio::test]
async fn token_for_unknown_user_is_not_found() {
    let app = test_app();
    let token = token_with_exp(OffsetDateTime::now_utc().unix_timestamp() + 3600);

    let res = send(&app, Method::GET, "/api/auth/profile", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "User not found");
    assert_eq!(res.body["error"], "User does not exist");
}

#[tokio::test]
async fn missing_secret_is_a_server_error() {
    let mut config = test_config();
    config.jwt.secret = None;
    let app = app_with(config, Arc::new(MemoryExpenseStore::new()));

    let res = send(&app, Method::GET, "/api/expenses", Some("anything"), None).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["message"], "Internal server error");
    assert_eq!(res.body["error"], "JWT configuration error");

    register(&app, "nosecret@example.com").await;
    let res = login(&app, "nosecret@example.com", PASSWORD).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["message"], "Login failed");
}

#[tokio::test]
async fn production_hides_internal_detail() {
    let mut config = test_config();
    config.jwt.secret = None;
    config.environment = Environment::Production;
    let app = app_with(config, Arc::new(MemoryExpenseStore::new()));

    let res = send(&app, Method::GET, "/api/auth/profile", Some("anything"), None).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["success"], false);
    assert_eq!(res.body["message"], "Internal server error");
    assert_eq!(res.body["error"], "Something went wrong");

    let res = send(&app, Method::GET, "/api/auth/profile", None, None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["error"], "No token provided");
}

#[tokio::test]
async fn malformed_json_is_reported_in_an_envelope() {
    let app = test_app();
    let res = send_raw(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some("application/json"),
        "{\"email\": ".into(),
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Invalid JSON format in request body");
    assert_eq!(res.body["error"], "Malformed JSON");
}
