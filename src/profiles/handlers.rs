use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{SelectBabyRequest, SessionView};
use super::services::{self, sync_session, UserData};
use crate::{auth::extractors::AuthUser, error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/profile/refresh", post(refresh_profile))
        .route("/session/baby", put(select_baby))
}

fn session_view(state: &AppState) -> SessionView {
    let ctx = state.mirror.context();
    SessionView {
        uid: ctx.identity.map(|i| i.uid),
        baby_id: ctx.baby_id,
    }
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
) -> Result<Json<UserData>, (StatusCode, String)> {
    state
        .current_profile()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Profile not loaded".into()).into())
}

#[instrument(skip(state))]
pub async fn refresh_profile(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
) -> Result<Json<UserData>, (StatusCode, String)> {
    sync_session(&state)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Profile not found".into()).into())
}

/// Switches the active baby; an empty or null id clears it.
#[instrument(skip(state))]
pub async fn select_baby(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(body): Json<SelectBabyRequest>,
) -> Json<SessionView> {
    services::select_baby(&state, body.baby_id).await;
    info!(uid = %identity.uid, "active baby changed");
    Json(session_view(&state))
}

#[cfg(test)]
mod profile_handler_tests {
    use super::*;
    use crate::auth::provider::AuthProvider;
    use crate::state::Fixture;

    #[tokio::test]
    async fn profile_missing_is_not_found() {
        let fx = Fixture::new();
        let id = fx.auth.create_account("ana@example.com", "secret1").await.unwrap();
        let (status, _) = get_profile(State(fx.state.clone()), AuthUser(id.clone()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = refresh_profile(State(fx.state.clone()), AuthUser(id))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn selecting_a_baby_rescopes_the_mirror() {
        let fx = Fixture::new();
        let id = fx.auth.create_account("ana@example.com", "secret1").await.unwrap();
        fx.state.mirror.set_identity(Some(id.clone()));

        let Json(view) = select_baby(
            State(fx.state.clone()),
            AuthUser(id.clone()),
            Json(SelectBabyRequest {
                baby_id: Some("b2".into()),
            }),
        )
        .await;
        assert_eq!(view.baby_id.as_deref(), Some("b2"));
        assert_eq!(fx.store.active_listeners(), 5);

        let Json(view) = select_baby(
            State(fx.state.clone()),
            AuthUser(id),
            Json(SelectBabyRequest { baby_id: None }),
        )
        .await;
        assert_eq!(view.baby_id, None);
        assert_eq!(fx.store.active_listeners(), 0);
    }
}
