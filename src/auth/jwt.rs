use std::time::Duration;

use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::Claims;
use crate::config::JwtConfig;

/// Why a token could not be issued or accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("JWT configuration error")]
    MissingSecret,

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Identity recovered from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub user_id: i64,
    pub email: String,
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(config: &JwtConfig) -> Result<Self, TokenError> {
        let secret = config
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(TokenError::MissingSecret)?;
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: config.expires_in,
        })
    }

    pub fn issue(&self, user_id: i64, email: &str) -> Result<String, TokenError> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            user_id,
            email: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        debug!(user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<TokenIdentity, TokenError> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed(e.to_string()),
            }
        })?;
        debug!(user_id = data.claims.user_id, "jwt verified");
        Ok(TokenIdentity {
            user_id: data.claims.user_id,
            email: data.claims.email,
        })
    }
}
