use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{LoginData, LoginRequest, RegisterRequest, UpdateProfileRequest, UserData},
    extractors::AuthUser,
    services,
};
use crate::{
    error::{ApiError, AppError, ResultExt},
    extract::ApiJson,
    response::Envelope,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/profile", get(get_profile).put(update_profile))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<UserData>>), ApiError> {
    let user = services::create_user(state.users.as_ref(), payload)
        .await
        .with_message("Registration failed")?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::success("User registered successfully", UserData { user })),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<Envelope<LoginData>>, ApiError> {
    let (user, token) = services::authenticate(state.users.as_ref(), &state.config.jwt, payload)
        .await
        .with_message("Login failed")?;

    Ok(Json(Envelope::success(
        "Login successful",
        LoginData { user, token },
    )))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Envelope<UserData>>, ApiError> {
    let user = services::get_profile(state.users.as_ref(), auth.user_id)
        .await
        .map_err(|e| match e {
            AppError::NotFound(_) => e.with_message("User not found"),
            other => other.with_message("Failed to retrieve profile"),
        })?;

    Ok(Json(Envelope::success(
        "Profile retrieved successfully",
        UserData { user },
    )))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> Result<Json<Envelope<UserData>>, ApiError> {
    let user = services::update_profile(state.users.as_ref(), auth.user_id, payload)
        .await
        .with_message("Failed to update profile")?;

    Ok(Json(Envelope::success(
        "Profile updated successfully",
        UserData { user },
    )))
}
