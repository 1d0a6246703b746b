//! Error taxonomy shared by services and handlers, and its mapping onto the
//! response envelope.

use std::borrow::Cow;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{db::StoreError, response::Envelope, state::AppState, validation::ValidationErrors};

pub const GENERIC_INTERNAL_ERROR: &str = "Something went wrong";

/// Service-level failure, independent of which endpoint produced it.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidInput(_) | Self::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn default_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation error",
            Self::InvalidInput(_) => "Invalid request",
            Self::Unauthenticated(_) => "Authentication required",
            Self::Forbidden(_) => "Forbidden",
            Self::NotFound(_) => "Resource not found",
            Self::Conflict(_) => "Conflict",
            Self::PayloadTooLarge(_) => "Request entity too large",
            Self::Internal(_) => "Internal server error",
        }
    }

    pub fn with_message(self, message: impl Into<Cow<'static, str>>) -> ApiError {
        ApiError {
            message: message.into(),
            source: self,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "store operation failed");
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.default_message();
        self.with_message(message).into_response()
    }
}

/// An [`AppError`] together with the envelope message of the endpoint that
/// failed.
#[derive(Debug, thiserror::Error)]
#[error("{message}: {source}")]
pub struct ApiError {
    pub message: Cow<'static, str>,
    #[source]
    pub source: AppError,
}

impl ApiError {
    pub fn new(message: impl Into<Cow<'static, str>>, source: AppError) -> Self {
        Self {
            message: message.into(),
            source,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.source.status_code()
    }
}

/// Marks a response whose error detail must not reach clients in production.
#[derive(Debug, Clone)]
pub struct InternalFault {
    pub message: Cow<'static, str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Envelope::failure(self.message.clone(), self.source.to_string());
        let mut response = (status, Json(body)).into_response();

        if status.is_server_error() {
            tracing::error!(error = %self.source, message = %self.message, "internal api error");
            response.extensions_mut().insert(InternalFault {
                message: self.message,
            });
        }
        response
    }
}

/// Attaches an endpoint message to any error convertible into [`AppError`].
pub trait ResultExt<T> {
    fn with_message(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<AppError>,
{
    fn with_message(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| {
            let err: AppError = e.into();
            err.with_message(message)
        })
    }
}

/// Replaces the detail of internal failures with a generic text when running
/// in production.
pub async fn redact_internal_errors(State(state): State<AppState>, response: Response) -> Response {
    if !state.config.environment.is_production() {
        return response;
    }
    let Some(fault) = response.extensions().get::<InternalFault>().cloned() else {
        return response;
    };
    let status = response.status();
    (
        status,
        Json(Envelope::failure(fault.message, GENERIC_INTERNAL_ERROR)),
    )
        .into_response()
}
