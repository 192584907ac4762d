use serde::{Deserialize, Serialize};

use crate::profiles::repo_types::{Baby, Parent};
use crate::profiles::services::UserData;

/// Request body for sign-up: both profiles plus the account password.
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub parent: Parent,
    pub baby: Baby,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    #[serde(default)]
    pub email: String,
}

/// Returned after sign-up or sign-in.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub profile: Option<UserData>,
}

#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub uid: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
