use std::sync::Arc;

use crate::auth::jwt::{JwtKeys, TokenError};
use crate::auth::repo::{PgUserStore, UserStore};
use crate::config::AppConfig;
use crate::db;
use crate::expenses::repo::{ExpenseStore, PgExpenseStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub expenses: Arc<dyn ExpenseStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let pool = db::connect(&config).await?;
        db::migrate(&pool).await?;

        Ok(Self {
            users: Arc::new(PgUserStore::new(pool.clone())),
            expenses: Arc::new(PgExpenseStore::new(pool)),
            config,
        })
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        expenses: Arc<dyn ExpenseStore>,
    ) -> Self {
        Self {
            config,
            users,
            expenses,
        }
    }

    /// Signing keys for the configured secret; fails when the secret is absent.
    pub fn jwt_keys(&self) -> Result<JwtKeys, TokenError> {
        JwtKeys::from_config(&self.config.jwt)
    }
}
