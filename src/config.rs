use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// `None` when `JWT_SECRET` is unset; signing and verification then fail at use.
    pub secret: Option<String>,
    pub issuer: String,
    pub audience: String,
    pub expires_in: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub environment: Environment,
}

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;

        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());
        if secret.is_none() {
            tracing::warn!("JWT_SECRET is not set; login and protected routes will fail");
        }

        let expires_in = match std::env::var("JWT_EXPIRES_IN") {
            Ok(raw) => parse_duration(&raw)
                .ok_or_else(|| anyhow::anyhow!("invalid JWT_EXPIRES_IN value: {raw}"))?,
            Err(_) => DEFAULT_TOKEN_TTL,
        };

        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "expense-tracker".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "expense-tracker-users".into()),
            expires_in,
        };

        let port = std::env::var("APP_PORT")
            .or_else(|_| std::env::var("PORT"))
            .ok()
            .map(|v| v.parse::<u16>())
            .transpose()?
            .unwrap_or(3000);

        let environment = std::env::var("APP_ENV")
            .or_else(|_| std::env::var("NODE_ENV"))
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Development);

        Ok(Self {
            database_url,
            database_max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
            jwt,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            cors_origin: std::env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            environment,
        })
    }
}

/// Parses `7d`, `12h`, `30m`, `45s` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], Some(c)),
        _ => (raw, None),
    };
    let value: u64 = digits.trim().parse().ok()?;
    let secs = match unit {
        None | Some('s') => value,
        Some('m') => value.checked_mul(60)?,
        Some('h') => value.checked_mul(60 * 60)?,
        Some('d') => value.checked_mul(24 * 60 * 60)?,
        Some(_) => return None,
    };
    if secs == 0 {
        return None;
    }
    Some(Duration::from_secs(secs))
}
