use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::activities::mirror::ActivityMirror;
use crate::auth::provider::{AuthProvider, InMemoryAuthProvider};
use crate::config::AppConfig;
use crate::profiles::services::UserData;
use crate::reminders::notifier::{Notifier, TracingNotifier};
use crate::store::{DocumentStore, InMemoryStore};

/// The single active session plus its collaborators.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub mirror: Arc<ActivityMirror>,
    pub profile: Arc<watch::Sender<Option<UserData>>>,
    pub notifier: Arc<dyn Notifier>,
    /// Serializes profile loads so a stale read never lands last.
    pub session_sync: Arc<Mutex<()>>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let store = Arc::new(InMemoryStore::new()) as Arc<dyn DocumentStore>;
        let auth = Arc::new(InMemoryAuthProvider::new()) as Arc<dyn AuthProvider>;
        let notifier = Arc::new(TracingNotifier) as Arc<dyn Notifier>;
        Ok(Self::from_parts(config, store, auth, notifier))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let mirror = ActivityMirror::new(store.clone());
        Self {
            config,
            store,
            auth,
            mirror,
            profile: Arc::new(watch::channel(None).0),
            notifier,
            session_sync: Arc::new(Mutex::new(())),
        }
    }

    pub fn fake() -> Self {
        Self::from_parts(
            Arc::new(AppConfig::default()),
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryAuthProvider::new()),
            Arc::new(TracingNotifier),
        )
    }

    pub fn current_profile(&self) -> Option<UserData> {
        self.profile.borrow().clone()
    }
}

/// An [`AppState`] whose collaborators stay reachable by concrete type.
#[cfg(test)]
pub(crate) struct Fixture {
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub auth: Arc<InMemoryAuthProvider>,
    pub notifier: Arc<crate::reminders::notifier::RecordingNotifier>,
}

#[cfg(test)]
impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let auth = Arc::new(InMemoryAuthProvider::new());
        let notifier = Arc::new(crate::reminders::notifier::RecordingNotifier::new());
        let state = AppState::from_parts(
            Arc::new(AppConfig::default()),
            store.clone(),
            auth.clone(),
            notifier.clone(),
        );
        Self {
            state,
            store,
            auth,
            notifier,
        }
    }
}

#[cfg(test)]
mod state_tests {
    use super::*;

    #[tokio::test]
    async fn fake_state_starts_signed_out() {
        let state = AppState::fake();
        assert!(state.auth.current_identity().is_none());
        assert!(state.current_profile().is_none());
        assert!(state.mirror.context().scope().is_none());
    }
}
