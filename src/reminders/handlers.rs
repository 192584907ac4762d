use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::{debug, instrument};

use super::dto::{PushMessage, ReminderRequest};
use super::notifier::Notification;
use super::services::{push_notification, reminder_notification};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reminders", post(send_reminder))
        .route("/notifications/push", post(receive_push))
}

#[instrument(skip(state))]
pub async fn send_reminder(
    State(state): State<AppState>,
    Json(body): Json<ReminderRequest>,
) -> Result<Json<Notification>, (StatusCode, String)> {
    let n = reminder_notification(body.title, body.message);
    state.notifier.notify(n.clone()).await;
    Ok(Json(n))
}

/// Returns 204 when the message carried nothing to display.
#[instrument(skip(state))]
pub async fn receive_push(
    State(state): State<AppState>,
    Json(body): Json<PushMessage>,
) -> Result<(StatusCode, Json<Option<Notification>>), (StatusCode, String)> {
    match push_notification(body) {
        Some(n) => {
            state.notifier.notify(n.clone()).await;
            Ok((StatusCode::OK, Json(Some(n))))
        }
        None => {
            debug!("push message without notification payload");
            Ok((StatusCode::NO_CONTENT, Json(None)))
        }
    }
}
