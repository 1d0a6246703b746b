use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{error, warn};

use super::jwt::TokenError;
use crate::{
    error::{ApiError, AppError},
    state::AppState,
};

/// Identity proven by a verified bearer token, handed to protected handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        // Expect "Bearer <token>"
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| {
                ApiError::new(
                    "Access token required",
                    AppError::Unauthenticated("No token provided".into()),
                )
            })?;

        let keys = state.jwt_keys().map_err(|e| {
            error!(error = %e, "JWT_SECRET environment variable is not set");
            ApiError::new(
                "Internal server error",
                AppError::Internal("JWT configuration error".into()),
            )
        })?;

        match keys.verify(token) {
            Ok(identity) => Ok(AuthUser {
                user_id: identity.user_id,
                email: identity.email,
            }),
            Err(TokenError::Expired) => {
                warn!("expired token");
                Err(ApiError::new(
                    "Token expired",
                    AppError::Unauthenticated("Please login again".into()),
                ))
            }
            Err(e) => {
                warn!(error = %e, "invalid token");
                Err(ApiError::new(
                    "Invalid token",
                    AppError::Forbidden("Token verification failed".into()),
                ))
            }
        }
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}
