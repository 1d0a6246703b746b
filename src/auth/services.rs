use tracing::{info, warn};

use super::{
    dto::{LoginRequest, RegisterRequest, UpdateProfileRequest},
    jwt::JwtKeys,
    password::{hash_password_blocking, verify_password_blocking},
    repo::UserStore,
    repo_types::{NewUser, UserChanges, UserProfile},
};
use crate::{config::JwtConfig, db::StoreError, error::AppError};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Default-parameter Argon2id hash checked against when the email is unknown.
const UNKNOWN_USER_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHRzYWx0c2FsdA$w1Vf6gN9i8sCyFPuFJCu6dMRkSBvHNDq3bzyeaxSYkA";

/// Registers a new user. The email must not be taken.
pub async fn create_user(
    users: &dyn UserStore,
    req: RegisterRequest,
) -> Result<UserProfile, AppError> {
    let req = req.into_registration()?;

    if users.find_by_email(&req.email).await?.is_some() {
        warn!("email already registered");
        return Err(AppError::Conflict(
            "User with this email already exists".into(),
        ));
    }

    let password_hash = hash_password_blocking(req.password).await?;
    let user = users
        .insert(NewUser {
            email: req.email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
        })
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation(_) => {
                AppError::Conflict("User with this email already exists".into())
            }
            other => other.into(),
        })?;

    info!(user_id = user.id, "user registered");
    Ok(user.into())
}

/// Checks credentials and issues a session token. Unknown email and wrong
/// password fail identically.
pub async fn authenticate(
    users: &dyn UserStore,
    jwt: &JwtConfig,
    req: LoginRequest,
) -> Result<(UserProfile, String), AppError> {
    let (email, password) = req.into_credentials()?;

    let Some(user) = users.find_by_email(&email).await? else {
        // Spend the same Argon2 work as a real check.
        verify_password_blocking(password, UNKNOWN_USER_HASH.into()).await?;
        warn!("login unknown email");
        return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.into()));
    };

    if !verify_password_blocking(password, user.password_hash.clone()).await? {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.into()));
    }

    let keys = JwtKeys::from_config(jwt).map_err(|e| AppError::Internal(e.to_string()))?;
    let token = keys
        .issue(user.id, &user.email)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    info!(user_id = user.id, "user logged in");
    Ok((user.into(), token))
}

pub async fn get_profile(users: &dyn UserStore, user_id: i64) -> Result<UserProfile, AppError> {
    users
        .find_by_id(user_id)
        .await?
        .map(UserProfile::from)
        .ok_or_else(|| AppError::NotFound("User does not exist".into()))
}

pub async fn update_profile(
    users: &dyn UserStore,
    user_id: i64,
    req: UpdateProfileRequest,
) -> Result<UserProfile, AppError> {
    if req.is_empty() {
        return Err(AppError::InvalidInput("No valid fields to update".into()));
    }
    req.validate()?;

    let password_hash = match req.password {
        Some(plain) => Some(hash_password_blocking(plain).await?),
        None => None,
    };
    let changes = UserChanges {
        email: req.email,
        password_hash,
        first_name: req.first_name,
        last_name: req.last_name,
    };

    let updated = users.update(user_id, changes).await.map_err(|e| match e {
        StoreError::UniqueViolation(_) => AppError::Conflict("Email already exists".into()),
        other => other.into(),
    })?;

    let user = updated.ok_or_else(|| AppError::NotFound("User not found".into()))?;
    info!(user_id, "profile updated");
    Ok(user.into())
}
