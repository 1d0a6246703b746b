use std::{net::SocketAddr, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, OriginalUri, State},
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use time::OffsetDateTime;
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::error::{redact_internal_errors, ApiError, AppError};
use crate::response::Envelope;
use crate::state::AppState;
use crate::{auth, expenses};

pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;
const API_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(expenses::router())
                .route("/health", get(health)),
        )
        .route("/", get(welcome))
        .fallback(endpoint_not_found)
        .method_not_allowed_fallback(endpoint_not_found)
        .layer(middleware::map_response_with_state(
            state.clone(),
            redact_internal_errors,
        ))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(86_400));

    if config.cors_origin.trim() == "*" {
        return layer.allow_origin(AllowOrigin::any());
    }
    match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin).allow_credentials(true),
        Err(e) => {
            tracing::warn!(error = %e, origin = %config.cors_origin, "invalid CORS_ORIGIN; cross-origin requests disabled");
            layer
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthData {
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
    environment: &'static str,
    version: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<Envelope<HealthData>> {
    Json(Envelope::success(
        "API is running successfully",
        HealthData {
            timestamp: OffsetDateTime::now_utc(),
            environment: state.config.environment.as_str(),
            version: API_VERSION,
        },
    ))
}

async fn welcome() -> Json<Envelope<serde_json::Value>> {
    Json(Envelope::success(
        "Welcome to Expense Tracker API",
        json!({
            "version": API_VERSION,
            "documentation": "/api/health",
            "endpoints": {
                "auth": "/api/auth",
                "expenses": "/api/expenses",
            },
        }),
    ))
}

async fn endpoint_not_found(method: Method, OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::new(
        "API endpoint not found",
        AppError::NotFound(format!(
            "The requested endpoint {method} {uri} does not exist"
        )),
    )
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(environment = config.environment.as_str(), "listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections");
}
