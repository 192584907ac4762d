use tracing::{error, info, warn};

use super::provider::{Identity, MIN_PASSWORD_LEN};
use crate::error::AppError;
use crate::profiles::repo_types::{Baby, Parent};
use crate::profiles::services::{sync_session, UserData, BABIES, USERS};
use crate::state::AppState;
use crate::store::{auto_id, WriteBatch};

pub const SIGN_UP_INVALID: &str =
    "All fields must be filled. Password must be at least 6 characters.";
pub const SIGN_IN_INVALID: &str = "Email and Password must not be empty.";
pub const RESET_INVALID: &str = "Email must not be empty.";
const SIGN_UP_FAILED: &str = "Sign Up failed";
const SIGN_IN_FAILED: &str = "Sign In failed";
const PROFILE_SAVE_FAILED: &str = "Failed to save profile data.";
const RESET_FAILED: &str = "Failed to send reset email";

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

pub fn validate_sign_up(parent: &Parent, baby: &Baby, password: &str) -> Result<(), AppError> {
    let missing = [
        parent.email.as_str(),
        password,
        parent.name.as_str(),
        parent.surname.as_str(),
        baby.name.as_str(),
        baby.surname.as_str(),
        baby.date_of_birth.as_str(),
    ]
    .iter()
    .any(|f| blank(f));
    if missing || password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(SIGN_UP_INVALID.into()));
    }
    Ok(())
}

/// Creates the account, then writes `users/{uid}` and `babies/{babyId}` in
/// one batch with the two documents pointing at each other.
pub async fn sign_up(
    st: &AppState,
    parent: Parent,
    baby: Baby,
    password: &str,
) -> Result<(Identity, Option<UserData>), AppError> {
    if let Err(e) = validate_sign_up(&parent, &baby, password) {
        warn!("sign up rejected by validation");
        return Err(e);
    }

    let identity = st
        .auth
        .create_account(&parent.email, password)
        .await
        .map_err(|e| {
            error!(error = %e, "create account failed");
            AppError::Backend(e.message_or(SIGN_UP_FAILED))
        })?;

    let baby_id = auto_id();
    let parent = Parent {
        parent_id: identity.uid.clone(),
        baby_id: baby_id.clone(),
        ..parent
    };
    let baby = Baby {
        baby_id: baby_id.clone(),
        ..baby
    };
    let encode = |v: serde_json::Result<serde_json::Value>| {
        v.map_err(|e| {
            error!(error = %e, "profile encode failed");
            AppError::Backend(PROFILE_SAVE_FAILED.into())
        })
    };
    let mut batch = WriteBatch::new();
    batch
        .set(USERS, &identity.uid, encode(serde_json::to_value(&parent))?)
        .set(BABIES, &baby_id, encode(serde_json::to_value(&baby))?);

    st.store.commit(batch).await.map_err(|e| {
        error!(uid = %identity.uid, error = %e, "profile batch failed");
        let msg = e.to_string();
        AppError::Backend(if msg.is_empty() { PROFILE_SAVE_FAILED.into() } else { msg })
    })?;
    info!(uid = %identity.uid, %baby_id, "account and profiles created");

    // the provider announced the sign-in before the batch landed
    let profile = sync_session(st).await?;
    Ok((identity, profile))
}

pub async fn sign_in(
    st: &AppState,
    email: &str,
    password: &str,
) -> Result<(Identity, Option<UserData>), AppError> {
    if blank(email) || blank(password) {
        warn!("sign in rejected by validation");
        return Err(AppError::Validation(SIGN_IN_INVALID.into()));
    }
    let identity = st.auth.sign_in(email, password).await.map_err(|e| {
        warn!(error = %e, "sign in failed");
        AppError::Backend(e.message_or(SIGN_IN_FAILED))
    })?;
    info!(uid = %identity.uid, "signed in");
    let profile = sync_session(st).await?;
    Ok((identity, profile))
}

pub async fn sign_out(st: &AppState) {
    st.auth.sign_out();
    // the provider watch carries the same change; this keeps the caller's view immediate
    if let Err(e) = sync_session(st).await {
        warn!(error = %e, "session sync after sign out failed");
    }
    info!("signed out");
}

pub async fn send_password_reset(st: &AppState, email: &str) -> Result<(), AppError> {
    if blank(email) {
        return Err(AppError::Validation(RESET_INVALID.into()));
    }
    st.auth
        .send_password_reset_email(email)
        .await
        .map_err(|e| AppError::Backend(e.message_or(RESET_FAILED)))?;
    info!("password reset email sent");
    Ok(())
}
