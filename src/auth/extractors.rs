use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use super::provider::Identity;
use crate::state::AppState;

/// The identity of the active session; rejects with 401 when signed out.
#[derive(Debug)]
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        state
            .auth
            .current_identity()
            .map(AuthUser)
            .ok_or((StatusCode::UNAUTHORIZED, "not signed in".into()))
    }
}
