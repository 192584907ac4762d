use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;

use super::analytics::{DailySeries, DiaperSummary, HomeSummary};
use super::dto::{CreatedResponse, LatestActivities, RefreshStatus, ScheduleRequest};
use super::mirror::Mirrored;
use super::repo_types::{ActivityRecord, Diaper, Feeding, Health, ScheduledActivity, Sleep};
use super::services;
use crate::{
    auth::extractors::AuthUser, clock::now_ms, reminders::services::activity_created,
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/activities/latest", get(latest))
        .route("/home/summary", get(home_summary))
        .route("/reports/diapers", get(diaper_report))
        .route("/reports/daily", get(daily_report))
        .route("/suggestions", get(suggestions))
        .route("/refresh", get(refresh_status).post(refresh))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/activities/feedings", get(list::<Feeding>).post(create::<Feeding>))
        .route("/activities/sleeps", get(list::<Sleep>).post(create::<Sleep>))
        .route("/activities/diapers", get(list::<Diaper>).post(create::<Diaper>))
        .route("/activities/health", get(list::<Health>).post(create::<Health>))
        .route("/schedule", get(list::<ScheduledActivity>).post(schedule))
        .route("/schedule/:id", delete(unschedule))
        .route("/schedule/refresh", post(refresh_schedule))
}

async fn list<T: Mirrored + Serialize>(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
) -> Result<Json<Vec<T>>, (StatusCode, String)> {
    let items = services::mirrored::<T>(&state)?;
    Ok(Json(items.as_ref().clone()))
}

/// Saves the record, then confirms it through the notifier.
async fn create<T: Mirrored>(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Json(record): Json<T>,
) -> Result<(StatusCode, Json<CreatedResponse>), (StatusCode, String)> {
    let id = services::add_activity(&state, record).await?;
    state.notifier.notify(activity_created(T::KIND)).await;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

#[instrument(skip(state))]
pub async fn schedule(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Json(body): Json<ScheduleRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), (StatusCode, String)> {
    let id = services::schedule_activity(&state, body.kind, body.scheduled_time, body.notes).await?;
    state
        .notifier
        .notify(activity_created(ScheduledActivity::KIND))
        .await;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

#[instrument(skip(state))]
pub async fn unschedule(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    services::remove_scheduled_activity(&state, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn refresh_schedule(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
) -> Json<Vec<ScheduledActivity>> {
    state.mirror.refresh_scheduled().await;
    Json(state.mirror.scheduled().as_ref().clone())
}

#[instrument(skip(state))]
pub async fn latest(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
) -> Json<LatestActivities> {
    let m = &state.mirror;
    Json(LatestActivities {
        feeding: m.latest_feeding(),
        sleep: m.latest_sleep(),
        diaper: m.latest_diaper(),
        health: m.latest_health(),
    })
}

#[instrument(skip(state))]
pub async fn home_summary(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
) -> Json<HomeSummary> {
    Json(state.mirror.home_summary(now_ms()))
}

#[instrument(skip(state))]
pub async fn diaper_report(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
) -> Json<DiaperSummary> {
    Json(state.mirror.insights().diapers.clone())
}

#[instrument(skip(state))]
pub async fn daily_report(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
) -> Json<DailySeries> {
    Json(state.mirror.daily_series(now_ms()))
}

#[instrument(skip(state))]
pub async fn suggestions(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
) -> Json<Vec<String>> {
    Json(state.mirror.insights().suggestions.clone())
}

#[instrument(skip(state))]
pub async fn refresh(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
) -> Json<RefreshStatus> {
    state.mirror.refresh_all().await;
    Json(RefreshStatus {
        refreshing: state.mirror.is_refreshing(),
    })
}

#[instrument(skip(state))]
pub async fn refresh_status(State(state): State<AppState>) -> Json<RefreshStatus> {
    Json(RefreshStatus {
        refreshing: state.mirror.is_refreshing(),
    })
}

#[cfg(test)]
mod activity_handler_tests {
    use super::*;
    use crate::auth::provider::Identity;
    use crate::state::Fixture;

    fn identity() -> Identity {
        Identity {
            uid: "u1".into(),
            email: "ana@example.com".into(),
        }
    }

    #[tokio::test]
    async fn create_notifies_and_lists() {
        let fx = Fixture::new();
        fx.state.mirror.configure(Some(identity()), Some("b1".into()));

        let (status, Json(created)) = create::<Diaper>(
            State(fx.state.clone()),
            AuthUser(identity()),
            Json(Diaper {
                kind: "DIRTY".into(),
                color: Some("GREEN".into()),
                ..Diaper::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            fx.notifier.sent()[0].title,
            "Successfully created Diaper Activity"
        );

        let Json(items) = list::<Diaper>(State(fx.state.clone()), AuthUser(identity()))
            .await
            .unwrap();
        assert_eq!(items[0].entry_id, created.id);

        let Json(report) = diaper_report(State(fx.state.clone()), AuthUser(identity())).await;
        assert_eq!(report.frequency_24h, 1);
        assert_eq!(report.color_stats.get("GREEN"), Some(&1));
    }

    #[tokio::test]
    async fn create_without_baby_is_precondition_failed() {
        let fx = Fixture::new();
        fx.state.mirror.configure(Some(identity()), None);
        let (status, msg) = create::<Feeding>(
            State(fx.state.clone()),
            AuthUser(identity()),
            Json(Feeding::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
        assert_eq!(msg, services::MISSING_CONTEXT);
        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn empty_session_reports() {
        let fx = Fixture::new();
        fx.state.mirror.configure(Some(identity()), Some("b1".into()));
        let Json(home) = home_summary(State(fx.state.clone()), AuthUser(identity())).await;
        assert_eq!(home.last_feed, "NO DATA");
        let Json(s) = suggestions(State(fx.state.clone()), AuthUser(identity())).await;
        assert_eq!(s, vec![crate::activities::analytics::LOG_MORE.to_string()]);
        let Json(series) = daily_report(State(fx.state.clone()), AuthUser(identity())).await;
        assert_eq!(series.days.len(), 1);
        let Json(r) = refresh(State(fx.state.clone()), AuthUser(identity())).await;
        assert!(!r.refreshing);
    }

    #[tokio::test]
    async fn schedule_roundtrip_over_handlers() {
        let fx = Fixture::new();
        fx.state.mirror.configure(Some(identity()), Some("b1".into()));
        let body: ScheduleRequest =
            serde_json::from_value(serde_json::json!({"type": "Bath", "scheduledTime": 42})).unwrap();
        let (_, Json(created)) = schedule(State(fx.state.clone()), AuthUser(identity()), Json(body))
            .await
            .unwrap();
        let Json(items) = refresh_schedule(State(fx.state.clone()), AuthUser(identity())).await;
        assert_eq!(items[0].id, created.id);

        let status = unschedule(State(fx.state.clone()), AuthUser(identity()), Path(created.id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(fx.state.mirror.scheduled().is_empty());
    }
}
