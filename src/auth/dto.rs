use serde::{Deserialize, Serialize};

use super::repo_types::UserProfile;
use crate::validation::{check_email, check_name, check_password, ValidationErrors};

/// Request body for user registration. Fields are optional so that every
/// missing one is reported, not just the first.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// A registration that passed validation.
#[derive(Debug)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

fn required(
    value: Option<String>,
    label: &str,
    errors: &mut ValidationErrors,
    check: impl FnOnce(&str, &mut ValidationErrors),
) -> String {
    match value {
        Some(value) => {
            check(&value, errors);
            value
        }
        None => {
            errors.push(format!("{label} is required"));
            String::new()
        }
    }
}

impl RegisterRequest {
    pub fn into_registration(self) -> Result<Registration, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = required(self.email, "Email", &mut errors, check_email);
        let password = required(self.password, "Password", &mut errors, check_password);
        let first_name = required(self.first_name, "First name", &mut errors, |v, e| {
            check_name(v, "First name", e)
        });
        let last_name = required(self.last_name, "Last name", &mut errors, |v, e| {
            check_name(v, "Last name", e)
        });
        errors.into_result()?;
        Ok(Registration {
            email,
            password,
            first_name,
            last_name,
        })
    }
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    /// `(email, password)` once both are present and the email is well formed.
    pub fn into_credentials(self) -> Result<(String, String), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = required(self.email, "Email", &mut errors, check_email);
        let password = required(self.password, "Password", &mut errors, |v, e| {
            if v.is_empty() {
                e.push("Password is required");
            }
        });
        errors.into_result()?;
        Ok((email, password))
    }
}

/// Partial profile update; absent fields stay untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(email) = &self.email {
            check_email(email, &mut errors);
        }
        if let Some(password) = &self.password {
            check_password(password, &mut errors);
        }
        if let Some(first_name) = &self.first_name {
            check_name(first_name, "First name", &mut errors);
        }
        if let Some(last_name) = &self.last_name {
            check_name(last_name, "Last name", &mut errors);
        }
        errors.into_result()
    }
}

#[derive(Debug, Serialize)]
pub struct UserData {
    pub user: UserProfile,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct LoginData {
    pub user: UserProfile,
    pub token: String,
}
