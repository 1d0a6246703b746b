use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::repo_types::{NewUser, User, UserChanges};
use crate::db::StoreError;

/// Persistence for user identities.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::UniqueViolation`] when the email is taken.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    /// `Ok(None)` when no user has this id.
    async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, created_at, updated_at";

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (email, password_hash, first_name, last_name) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .fetch_one(&self.db)
            .await?;
        Ok(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
               SET email         = COALESCE($2, email),
                   password_hash = COALESCE($3, password_hash),
                   first_name    = COALESCE($4, first_name),
                   last_name     = COALESCE($5, last_name),
                   updated_at    = now()
             WHERE id = $1
         RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.email)
            .bind(changes.password_hash)
            .bind(changes.first_name)
            .bind(changes.last_name)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }
}
