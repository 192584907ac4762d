use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::repo_types::{Baby, Parent};
use crate::error::AppError;
use crate::state::AppState;
use crate::store::DocumentStore;

pub const USERS: &str = "users";
pub const BABIES: &str = "babies";

/// The signed-in parent and the baby they track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserData {
    pub parent: Parent,
    pub baby: Option<Baby>,
}

/// Loads `users/{uid}` and then the baby it points at. `Ok(None)` when the
/// parent document does not exist or does not decode.
pub async fn load_profile(store: &dyn DocumentStore, uid: &str) -> Result<Option<UserData>, AppError> {
    let Some(doc) = store.get(USERS, uid).await? else {
        debug!(%uid, "no parent document");
        return Ok(None);
    };
    let parent: Parent = match serde_json::from_value(doc.data) {
        Ok(p) => p,
        Err(e) => {
            warn!(%uid, error = %e, "parent document malformed");
            return Ok(None);
        }
    };

    let baby = if parent.baby_id.is_empty() {
        None
    } else {
        store
            .get(BABIES, &parent.baby_id)
            .await?
            .and_then(|d| serde_json::from_value::<Baby>(d.data).ok())
    };
    Ok(Some(UserData { parent, baby }))
}

/// Aligns the mirror and the cached profile with the provider's current
/// identity. The loaded baby becomes the active baby.
pub async fn sync_session(st: &AppState) -> Result<Option<UserData>, AppError> {
    let _guard = st.session_sync.lock().await;
    let identity = st.auth.current_identity();
    st.mirror.set_identity(identity.clone());
    let Some(identity) = identity else {
        st.profile.send_replace(None);
        return Ok(None);
    };

    let profile = load_profile(st.store.as_ref(), &identity.uid).await?;
    let baby_id = profile
        .as_ref()
        .and_then(|p| p.baby.as_ref())
        .map(|b| b.baby_id.clone());
    st.profile.send_replace(profile.clone());
    st.mirror.set_baby_id(baby_id.clone());
    info!(uid = %identity.uid, baby_id = ?baby_id, "session synced");
    Ok(profile)
}

/// Switches the active baby. Runs under the same lock as [`sync_session`] so
/// a concurrent profile load cannot undo the choice.
pub async fn select_baby(st: &AppState, baby_id: Option<String>) {
    let _guard = st.session_sync.lock().await;
    st.mirror.set_baby_id(baby_id);
}

/// Re-syncs the session on every sign-in and sign-out the provider reports.
pub fn watch_auth_state(st: AppState) -> JoinHandle<()> {
    let mut changes = st.auth.subscribe();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let _ = changes.borrow_and_update();
            if let Err(e) = sync_session(&st).await {
                warn!(error = %e, "session sync after auth change failed");
            }
        }
    })
}
