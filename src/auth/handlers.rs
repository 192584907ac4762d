use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{AuthResponse, MessageResponse, PasswordResetRequest, PublicUser, SignInRequest, SignUpRequest},
        extractors::AuthUser,
        provider::Identity,
        services,
    },
    profiles::services::UserData,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signout", post(sign_out))
        .route("/auth/password-reset", post(password_reset))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn respond(identity: Identity, profile: Option<UserData>) -> Json<AuthResponse> {
    Json(AuthResponse {
        user: PublicUser {
            uid: identity.uid,
            email: identity.email,
        },
        profile,
    })
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    let (identity, profile) =
        services::sign_up(&state, payload.parent, payload.baby, &payload.password).await?;
    Ok((StatusCode::CREATED, respond(identity, profile)))
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let (identity, profile) = services::sign_in(&state, &payload.email, &payload.password).await?;
    Ok(respond(identity, profile))
}

#[instrument(skip(state))]
pub async fn sign_out(State(state): State<AppState>) -> StatusCode {
    services::sign_out(&state).await;
    StatusCode::NO_CONTENT
}

#[instrument(skip(state, payload))]
pub async fn password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    services::send_password_reset(&state, &payload.email).await?;
    Ok(Json(MessageResponse {
        message: "Password reset email sent".into(),
    }))
}

#[instrument(skip(_state))]
pub async fn get_me(
    State(_state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    Ok(Json(PublicUser {
        uid: identity.uid,
        email: identity.email,
    }))
}

#[cfg(test)]
mod auth_handler_tests {
    use super::*;
    use crate::profiles::repo_types::{Baby, Parent};
    use crate::state::Fixture;

    fn signup_body() -> SignUpRequest {
        serde_json::from_value(serde_json::json!({
            "parent": {"email": "ana@example.com", "name": "Ana", "surname": "Lima"},
            "baby": {"name": "Leo", "surname": "Lima", "dateOfBirth": "2025-01-02"},
            "password": "secret1"
        }))
        .unwrap()
    }

    #[test]
    fn public_user_serialization() {
        let json = serde_json::to_string(&PublicUser {
            uid: "u1".into(),
            email: "test@example.com".into(),
        })
        .unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("uid"));
    }

    #[tokio::test]
    async fn signup_then_me() {
        let fx = Fixture::new();
        let (status, Json(body)) = sign_up(State(fx.state.clone()), Json(signup_body()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body.user.email, "ana@example.com");

        let identity = fx.state.auth.current_identity().unwrap();
        let Json(me) = get_me(State(fx.state.clone()), AuthUser(identity)).await.unwrap();
        assert_eq!(me.uid, body.user.uid);
    }

    #[tokio::test]
    async fn validation_maps_to_bad_request() {
        let fx = Fixture::new();
        let body = SignUpRequest {
            parent: Parent::default(),
            baby: Baby::default(),
            password: "secret1".into(),
        };
        let (status, msg) = sign_up(State(fx.state.clone()), Json(body)).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(msg, services::SIGN_UP_INVALID);
    }

    #[tokio::test]
    async fn signout_returns_no_content() {
        let fx = Fixture::new();
        sign_up(State(fx.state.clone()), Json(signup_body())).await.unwrap();
        assert_eq!(sign_out(State(fx.state.clone())).await, StatusCode::NO_CONTENT);
        assert!(fx.state.auth.current_identity().is_none());
    }
}
