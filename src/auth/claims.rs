use serde::{Deserialize, Serialize};

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: i64, // user ID
    pub email: String,
    pub iat: usize, // issued at (unix timestamp)
    pub exp: usize, // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}
