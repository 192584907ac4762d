use std::sync::Arc;

use tracing::{error, info, warn};

use super::mirror::Mirrored;
use super::repo_types::{ActivityRecord, ScheduledActivity};
use crate::clock::now_ms;
use crate::error::AppError;
use crate::state::AppState;
use crate::store::{auto_id, user_collection};

pub const MISSING_CONTEXT: &str = "User or baby ID missing";
pub const USER_MISSING: &str = "User missing";
pub const NEGATIVE_TIME: &str = "Times must not be before the epoch.";

fn require_scope(st: &AppState) -> Result<(String, String), AppError> {
    st.mirror.context().scope().ok_or_else(|| {
        warn!("write rejected, no user or baby");
        AppError::MissingContext(MISSING_CONTEXT.into())
    })
}

/// Persists a new record under the signed-in user, stamped with a fresh id
/// and the active baby. Returns the id.
pub async fn add_activity<T: ActivityRecord>(st: &AppState, record: T) -> Result<String, AppError> {
    let (uid, baby_id) = require_scope(st)?;
    let id = auto_id();
    let record = record.stamp(id.clone(), baby_id, now_ms());
    if record.times().iter().any(|&t| t < 0) {
        warn!(kind = T::KIND, "write rejected, negative time");
        return Err(AppError::Validation(NEGATIVE_TIME.into()));
    }
    let data = serde_json::to_value(&record).map_err(|e| {
        error!(kind = T::KIND, error = %e, "record encode failed");
        AppError::Backend(e.to_string())
    })?;

    let collection = user_collection(&uid, T::COLLECTION);
    st.store.set(&collection, &id, data).await.map_err(|e| {
        error!(%collection, error = %e, "activity write failed");
        AppError::from(e)
    })?;
    info!(kind = T::KIND, %id, "activity saved");

    if T::REFRESH_AFTER_WRITE {
        st.mirror.refresh_all().await;
    }
    Ok(id)
}

pub async fn schedule_activity(
    st: &AppState,
    kind: String,
    scheduled_time: i64,
    notes: Option<String>,
) -> Result<String, AppError> {
    let record = ScheduledActivity {
        kind,
        scheduled_time,
        notes,
        ..ScheduledActivity::default()
    };
    let id = add_activity(st, record).await?;
    st.mirror.refresh_scheduled().await;
    Ok(id)
}

/// Deleting needs a signed-in user only; the baby scope is not checked.
pub async fn remove_scheduled_activity(st: &AppState, id: &str) -> Result<(), AppError> {
    let uid = st
        .mirror
        .context()
        .identity
        .map(|i| i.uid)
        .ok_or_else(|| AppError::MissingContext(USER_MISSING.into()))?;
    let collection = user_collection(&uid, ScheduledActivity::COLLECTION);
    st.store.delete(&collection, id).await.map_err(|e| {
        error!(%collection, %id, error = %e, "scheduled delete failed");
        AppError::from(e)
    })?;
    info!(%id, "scheduled activity removed");
    st.mirror.refresh_scheduled().await;
    Ok(())
}

/// The mirrored list for `T`, or a missing-context error outside a session.
pub(crate) fn mirrored<T: Mirrored>(st: &AppState) -> Result<Arc<Vec<T>>, AppError> {
    require_scope(st)?;
    Ok(st.mirror.list::<T>())
}
