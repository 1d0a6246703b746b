use async_trait::async_trait;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request,
    },
    http::{request::Parts, StatusCode},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, AppError};

/// `Json<T>` whose rejection is rendered as an envelope.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::JsonDataError(e) => ApiError::new(
            "Validation error",
            AppError::InvalidInput(e.body_text()),
        ),
        JsonRejection::JsonSyntaxError(_) => ApiError::new(
            "Invalid JSON format in request body",
            AppError::InvalidInput("Malformed JSON".into()),
        ),
        JsonRejection::MissingJsonContentType(_) => ApiError::new(
            "Invalid request",
            AppError::InvalidInput("Expected request with `Content-Type: application/json`".into()),
        ),
        other if other.status() == StatusCode::PAYLOAD_TOO_LARGE => ApiError::new(
            "Request entity too large",
            AppError::PayloadTooLarge("Payload too large".into()),
        ),
        other => ApiError::new("Invalid request", AppError::InvalidInput(other.body_text())),
    }
}

/// `Query<T>` whose rejection is rendered as an envelope.
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(query_rejection(rejection)),
        }
    }
}

fn query_rejection(rejection: QueryRejection) -> ApiError {
    ApiError::new(
        "Query validation error",
        AppError::InvalidInput(rejection.body_text()),
    )
}

/// `Path<T>` whose rejection is rendered as an envelope.
#[derive(Debug)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => Err(path_rejection(rejection)),
        }
    }
}

fn path_rejection(rejection: PathRejection) -> ApiError {
    match rejection {
        PathRejection::FailedToDeserializePathParams(e) => ApiError::new(
            "Invalid path parameter",
            AppError::InvalidInput(e.body_text()),
        ),
        other => ApiError::new("Invalid request", AppError::Internal(other.body_text())),
    }
}
