//! Live mirror of the active baby's activity collections.
//!
//! One store subscription per record kind, scoped to the signed-in user and
//! the active baby. Every snapshot replaces the local list wholesale and
//! recomputes [`Insights`]. Changing either half of the scope discards the
//! lists and rebuilds every subscription; updates that were already in
//! flight for the old scope are dropped by generation check.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::analytics::{self, DailySeries, HomeSummary, Insights};
use super::repo_types::{ActivityRecord, Diaper, Feeding, Health, ScheduledActivity, Sleep};
use crate::auth::provider::Identity;
use crate::clock::now_ms;
use crate::store::{user_collection, DocumentStore, ListenerId, Subscription};

type List<T> = watch::Sender<Arc<Vec<T>>>;

/// Who is signed in and which baby is being tracked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub identity: Option<Identity>,
    pub baby_id: Option<String>,
}

impl SessionContext {
    /// `(uid, baby_id)` when both are present.
    pub fn scope(&self) -> Option<(String, String)> {
        match (&self.identity, &self.baby_id) {
            (Some(identity), Some(baby_id)) => Some((identity.uid.clone(), baby_id.clone())),
            _ => None,
        }
    }
}

struct ListenerHandle {
    id: ListenerId,
    task: JoinHandle<()>,
}

struct Scope {
    context: SessionContext,
    generation: u64,
    listeners: Vec<ListenerHandle>,
}

pub struct ActivityMirror {
    store: Arc<dyn DocumentStore>,
    scope: Mutex<Scope>,
    feedings: List<Feeding>,
    sleeps: List<Sleep>,
    diapers: List<Diaper>,
    health: List<Health>,
    scheduled: List<ScheduledActivity>,
    insights: watch::Sender<Arc<Insights>>,
    refreshing: watch::Sender<bool>,
    refreshes_in_flight: Mutex<usize>,
}

/// Binds a record kind to the list that mirrors it.
pub(crate) trait Mirrored: ActivityRecord {
    fn slot(mirror: &ActivityMirror) -> &List<Self>;
}

impl Mirrored for Feeding {
    fn slot(mirror: &ActivityMirror) -> &List<Self> {
        &mirror.feedings
    }
}

impl Mirrored for Sleep {
    fn slot(mirror: &ActivityMirror) -> &List<Self> {
        &mirror.sleeps
    }
}

impl Mirrored for Diaper {
    fn slot(mirror: &ActivityMirror) -> &List<Self> {
        &mirror.diapers
    }
}

impl Mirrored for Health {
    fn slot(mirror: &ActivityMirror) -> &List<Self> {
        &mirror.health
    }
}

impl Mirrored for ScheduledActivity {
    fn slot(mirror: &ActivityMirror) -> &List<Self> {
        &mirror.scheduled
    }
}

impl ActivityMirror {
    pub fn new(store: Arc<dyn DocumentStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            scope: Mutex::new(Scope {
                context: SessionContext::default(),
                generation: 0,
                listeners: Vec::new(),
            }),
            feedings: watch::channel(Arc::new(Vec::new())).0,
            sleeps: watch::channel(Arc::new(Vec::new())).0,
            diapers: watch::channel(Arc::new(Vec::new())).0,
            health: watch::channel(Arc::new(Vec::new())).0,
            scheduled: watch::channel(Arc::new(Vec::new())).0,
            insights: watch::channel(Arc::new(Insights::default())).0,
            refreshing: watch::channel(false).0,
            refreshes_in_flight: Mutex::new(0),
        })
    }

    pub fn context(&self) -> SessionContext {
        self.lock_scope().context.clone()
    }

    /// Any change of identity, sign-out included, forgets the active baby.
    pub fn set_identity(self: &Arc<Self>, identity: Option<Identity>) {
        let mut scope = self.lock_scope();
        if scope.context.identity == identity {
            return;
        }
        scope.context = SessionContext {
            identity,
            baby_id: None,
        };
        self.rebuild(&mut scope, true);
    }

    /// An empty id counts as no baby.
    pub fn set_baby_id(self: &Arc<Self>, baby_id: Option<String>) {
        let baby_id = baby_id.filter(|b| !b.is_empty());
        let mut scope = self.lock_scope();
        if scope.context.baby_id == baby_id {
            return;
        }
        scope.context.baby_id = baby_id;
        self.rebuild(&mut scope, true);
    }

    pub fn configure(self: &Arc<Self>, identity: Option<Identity>, baby_id: Option<String>) {
        let baby_id = baby_id.filter(|b| !b.is_empty());
        let mut scope = self.lock_scope();
        scope.context = match identity {
            Some(identity) => SessionContext {
                identity: Some(identity),
                baby_id,
            },
            None => SessionContext::default(),
        };
        self.rebuild(&mut scope, true);
    }

    pub(crate) fn list<T: Mirrored>(&self) -> Arc<Vec<T>> {
        T::slot(self).borrow().clone()
    }

    pub fn feedings(&self) -> Arc<Vec<Feeding>> {
        self.feedings.borrow().clone()
    }

    pub fn sleeps(&self) -> Arc<Vec<Sleep>> {
        self.sleeps.borrow().clone()
    }

    pub fn diapers(&self) -> Arc<Vec<Diaper>> {
        self.diapers.borrow().clone()
    }

    pub fn health(&self) -> Arc<Vec<Health>> {
        self.health.borrow().clone()
    }

    pub fn scheduled(&self) -> Arc<Vec<ScheduledActivity>> {
        self.scheduled.borrow().clone()
    }

    pub fn insights(&self) -> Arc<Insights> {
        self.insights.borrow().clone()
    }

    pub fn is_refreshing(&self) -> bool {
        *self.refreshing.borrow()
    }

    pub fn latest_feeding(&self) -> Option<Feeding> {
        self.feedings.borrow().first().cloned()
    }

    pub fn latest_sleep(&self) -> Option<Sleep> {
        self.sleeps.borrow().first().cloned()
    }

    pub fn latest_diaper(&self) -> Option<Diaper> {
        self.diapers.borrow().first().cloned()
    }

    pub fn latest_health(&self) -> Option<Health> {
        self.health.borrow().first().cloned()
    }

    pub fn daily_series(&self, now_ms: i64) -> DailySeries {
        analytics::daily_series(
            &self.feedings(),
            &self.sleeps(),
            &self.diapers(),
            &self.health(),
            now_ms,
        )
    }

    pub fn home_summary(&self, now_ms: i64) -> HomeSummary {
        analytics::home_summary(
            self.latest_feeding().as_ref(),
            self.latest_sleep().as_ref(),
            self.latest_diaper().as_ref(),
            self.latest_health().as_ref(),
            now_ms,
        )
    }

    /// One-shot reload of the four activity collections. Listeners are
    /// re-attached first. Each collection is applied as soon as it resolves;
    /// the refreshing flag drops only once every collection has settled.
    pub async fn refresh_all(self: &Arc<Self>) {
        let (scope, generation) = {
            let mut scope = self.lock_scope();
            if scope.context.scope().is_some() {
                self.rebuild(&mut scope, false);
            }
            (scope.context.scope(), scope.generation)
        };
        let Some((uid, baby_id)) = scope else {
            debug!("refresh skipped, no active scope");
            return;
        };

        self.begin_refresh();
        tokio::join!(
            self.fetch_into::<Feeding>(&uid, &baby_id, generation),
            self.fetch_into::<Sleep>(&uid, &baby_id, generation),
            self.fetch_into::<Diaper>(&uid, &baby_id, generation),
            self.fetch_into::<Health>(&uid, &baby_id, generation),
        );
        self.end_refresh();
        info!(%baby_id, "activity refresh settled");
    }

    pub async fn refresh_scheduled(self: &Arc<Self>) {
        let (scope, generation) = {
            let scope = self.lock_scope();
            (scope.context.scope(), scope.generation)
        };
        if let Some((uid, baby_id)) = scope {
            self.fetch_into::<ScheduledActivity>(&uid, &baby_id, generation).await;
        }
    }

    async fn fetch_into<T: Mirrored>(&self, uid: &str, baby_id: &str, generation: u64) {
        let collection = user_collection(uid, T::COLLECTION);
        match self.store.query(&collection, &T::scoped_query(baby_id)).await {
            Ok(snapshot) => {
                self.apply::<T>(generation, snapshot.decode());
            }
            Err(e) => warn!(%collection, error = %e, "one-shot fetch failed"),
        }
    }

    fn begin_refresh(&self) {
        let mut n = self.refreshes_in_flight.lock().unwrap_or_else(|e| e.into_inner());
        *n += 1;
        self.refreshing.send_replace(true);
    }

    fn end_refresh(&self) {
        let mut n = self.refreshes_in_flight.lock().unwrap_or_else(|e| e.into_inner());
        *n = n.saturating_sub(1);
        if *n == 0 {
            self.refreshing.send_replace(false);
        }
    }

    /// Replaces the list for `T` if `generation` is still current.
    fn apply<T: Mirrored>(&self, generation: u64, items: Vec<T>) -> bool {
        let scope = self.lock_scope();
        if scope.generation != generation {
            debug!(kind = T::KIND, "dropping update from a released scope");
            return false;
        }
        T::slot(self).send_replace(Arc::new(items));
        self.recompute_insights();
        true
    }

    fn recompute_insights(&self) {
        let insights = analytics::insights(
            &self.feedings(),
            &self.sleeps(),
            &self.diapers(),
            &self.health(),
            now_ms(),
        );
        self.insights.send_replace(Arc::new(insights));
    }

    fn rebuild(self: &Arc<Self>, scope: &mut Scope, clear: bool) {
        self.release(scope);
        scope.generation += 1;
        if clear {
            self.clear_lists();
        }

        let Some((uid, baby_id)) = scope.context.scope() else {
            return;
        };
        let generation = scope.generation;
        scope.listeners = vec![
            self.register::<Feeding>(&uid, &baby_id, generation),
            self.register::<Sleep>(&uid, &baby_id, generation),
            self.register::<Diaper>(&uid, &baby_id, generation),
            self.register::<Health>(&uid, &baby_id, generation),
            self.register::<ScheduledActivity>(&uid, &baby_id, generation),
        ];
        info!(%uid, %baby_id, generation, "activity listeners registered");
    }

    fn register<T: Mirrored>(
        self: &Arc<Self>,
        uid: &str,
        baby_id: &str,
        generation: u64,
    ) -> ListenerHandle {
        let collection = user_collection(uid, T::COLLECTION);
        let Subscription { id, mut updates } =
            self.store.listen(&collection, T::scoped_query(baby_id));
        let mirror = Arc::downgrade(self);

        let task = tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                let Some(mirror) = mirror.upgrade() else {
                    break;
                };
                match update {
                    Ok(snapshot) => {
                        mirror.apply::<T>(generation, snapshot.decode());
                    }
                    Err(e) => debug!(%collection, error = %e, "listener error ignored"),
                }
            }
        });
        ListenerHandle { id, task }
    }

    fn release(&self, scope: &mut Scope) {
        if scope.listeners.is_empty() {
            return;
        }
        for l in scope.listeners.drain(..) {
            self.store.unlisten(l.id);
            l.task.abort();
        }
        debug!("activity listeners released");
    }

    fn clear_lists(&self) {
        self.feedings.send_replace(Arc::new(Vec::new()));
        self.sleeps.send_replace(Arc::new(Vec::new()));
        self.diapers.send_replace(Arc::new(Vec::new()));
        self.health.send_replace(Arc::new(Vec::new()));
        self.scheduled.send_replace(Arc::new(Vec::new()));
        self.recompute_insights();
    }

    fn lock_scope(&self) -> MutexGuard<'_, Scope> {
        self.scope.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ActivityMirror {
    fn drop(&mut self) {
        let scope = self.scope.get_mut().unwrap_or_else(|e| e.into_inner());
        for l in scope.listeners.drain(..) {
            self.store.unlisten(l.id);
            l.task.abort();
        }
    }
}

#[cfg(test)]
pub(crate) mod mirror_tests {
    use super::*;
    use crate::activities::analytics as msg;
    use crate::store::{DocumentStore, InMemoryStore, StoreError};
    use serde_json::json;
    use std::time::Duration;

    pub(crate) async fn wait_until<F: Fn() -> bool>(cond: F) {
        for _ in 0..500 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached");
    }

    fn identity(uid: &str) -> Identity {
        Identity {
            uid: uid.into(),
            email: format!("{}@example.com", uid),
        }
    }

    async fn seed(store: &InMemoryStore, uid: &str, coll: &str, id: &str, data: serde_json::Value) {
        store
            .set(&user_collection(uid, coll), id, data)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn mirrors_scoped_collections_in_server_order() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "u1", "feedings", "f1", json!({"entryID": "f1", "babyID": "b1", "timestamp": 100})).await;
        seed(&store, "u1", "feedings", "f2", json!({"entryID": "f2", "babyID": "b1", "timestamp": 300})).await;
        seed(&store, "u1", "feedings", "f3", json!({"entryID": "f3", "babyID": "b2", "timestamp": 200})).await;
        seed(&store, "u1", "scheduledActivities", "s1", json!({"id": "s1", "babyID": "b1", "scheduledTime": 9})).await;
        seed(&store, "u1", "scheduledActivities", "s2", json!({"id": "s2", "babyID": "b1", "scheduledTime": 3})).await;

        let mirror = ActivityMirror::new(store.clone());
        mirror.configure(Some(identity("u1")), Some("b1".into()));

        wait_until(|| mirror.feedings().len() == 2 && mirror.scheduled().len() == 2).await;
        let ids: Vec<String> = mirror.feedings().iter().map(|f| f.entry_id.clone()).collect();
        assert_eq!(ids, vec!["f2", "f1"]);
        let sched: Vec<String> = mirror.scheduled().iter().map(|s| s.id.clone()).collect();
        assert_eq!(sched, vec!["s2", "s1"]);
        assert_eq!(mirror.latest_feeding().unwrap().entry_id, "f2");
        assert_eq!(store.active_listeners(), 5);
    }

    #[tokio::test]
    async fn malformed_documents_are_skipped() {
        let store = Arc::new(InMemoryStore::new());
        let coll = user_collection("u1", "diapers");
        store.insert_raw(&coll, "ok", json!({"entryID": "ok", "babyID": "b1", "timestamp": 5}));
        store.insert_raw(&coll, "bad", json!({"entryID": "bad", "babyID": "b1", "timestamp": "noon"}));

        let mirror = ActivityMirror::new(store.clone());
        mirror.configure(Some(identity("u1")), Some("b1".into()));
        wait_until(|| mirror.diapers().len() == 1).await;
        assert_eq!(mirror.diapers()[0].entry_id, "ok");
    }

    #[tokio::test]
    async fn listener_errors_keep_the_last_good_list() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "u1", "health", "h1", json!({"entryID": "h1", "babyID": "b1", "timestamp": 5})).await;
        let mirror = ActivityMirror::new(store.clone());
        mirror.configure(Some(identity("u1")), Some("b1".into()));
        wait_until(|| mirror.health().len() == 1).await;

        store.fail_listeners(
            &user_collection("u1", "health"),
            StoreError::PermissionDenied("PERMISSION_DENIED".into()),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(mirror.health().len(), 1);
    }

    #[tokio::test]
    async fn updates_recompute_insights() {
        let store = Arc::new(InMemoryStore::new());
        let mirror = ActivityMirror::new(store.clone());
        mirror.configure(Some(identity("u1")), Some("b1".into()));
        assert_eq!(mirror.insights().suggestions, vec![msg::LOG_MORE.to_string()]);

        let now = now_ms();
        for i in 0..6 {
            let id = format!("f{}", i);
            seed(&store, "u1", "feedings", &id, json!({"entryID": id, "babyID": "b1", "timestamp": now - i})).await;
        }
        seed(&store, "u1", "diapers", "d1", json!({"entryID": "d1", "babyID": "b1", "timestamp": now, "color": "YELLOW"})).await;

        wait_until(|| mirror.feedings().len() == 6 && mirror.diapers().len() == 1).await;
        let insights = mirror.insights();
        assert_eq!(insights.suggestions, vec![msg::FEEDING_WELL.to_string()]);
        assert_eq!(insights.diapers.frequency_24h, 1);
        assert_eq!(insights.diapers.color_stats.get("YELLOW"), Some(&1));
    }

    #[tokio::test]
    async fn switching_baby_tears_down_old_scope() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "u1", "feedings", "a", json!({"entryID": "a", "babyID": "b1", "timestamp": 1})).await;
        seed(&store, "u1", "feedings", "b", json!({"entryID": "b", "babyID": "b2", "timestamp": 2})).await;

        let mirror = ActivityMirror::new(store.clone());
        mirror.configure(Some(identity("u1")), Some("b1".into()));
        wait_until(|| mirror.feedings().len() == 1).await;
        assert_eq!(mirror.feedings()[0].baby_id, "b1");

        mirror.set_baby_id(Some("b2".into()));
        assert_eq!(store.active_listeners(), 5);
        wait_until(|| mirror.feedings().first().map(|f| f.baby_id == "b2").unwrap_or(false)).await;

        // writes under the old scope no longer reach the mirror
        seed(&store, "u1", "feedings", "c", json!({"entryID": "c", "babyID": "b1", "timestamp": 3})).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let ids: Vec<String> = mirror.feedings().iter().map(|f| f.entry_id.clone()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[tokio::test]
    async fn sign_out_releases_and_clears() {
        let store = Arc::new(InMemoryStore::new());
        seed(&store, "u1", "sleeps", "s", json!({"entryID": "s", "babyID": "b1", "startTime": 1})).await;
        let mirror = ActivityMirror::new(store.clone());
        mirror.configure(Some(identity("u1")), Some("b1".into()));
        wait_until(|| mirror.sleeps().len() == 1).await;

        mirror.set_identity(None);
        assert_eq!(store.active_listeners(), 0);
        assert!(mirror.sleeps().is_empty());
        assert_eq!(mirror.context(), SessionContext::default());
    }

    #[tokio::test]
    async fn clearing_baby_releases_listeners() {
        let store = Arc::new(InMemoryStore::new());
        let mirror = ActivityMirror::new(store.clone());
        mirror.configure(Some(identity("u1")), Some("b1".into()));
        assert_eq!(store.active_listeners(), 5);
        mirror.set_baby_id(Some(String::new()));
        assert_eq!(store.active_listeners(), 0);
        assert!(mirror.context().baby_id.is_none());
    }

    #[tokio::test]
    async fn refresh_reloads_and_settles_flag() {
        let store = Arc::new(InMemoryStore::new());
        let mirror = ActivityMirror::new(store.clone());
        mirror.configure(Some(identity("u1")), Some("b1".into()));
        seed(&store, "u1", "health", "h", json!({"entryID": "h", "babyID": "b1", "timestamp": 1, "notes": "Fever"})).await;

        let flag = mirror.refreshing.subscribe();
        mirror.refresh_all().await;
        assert!(!mirror.is_refreshing());
        assert!(flag.has_changed().unwrap());
        assert_eq!(mirror.health().len(), 1);
        assert_eq!(mirror.insights().suggestions, vec![msg::FEVER_WATCH.to_string()]);
        assert_eq!(store.active_listeners(), 5);
    }

    #[tokio::test]
    async fn refresh_without_scope_is_a_no_op() {
        let store = Arc::new(InMemoryStore::new());
        let mirror = ActivityMirror::new(store.clone());
        mirror.refresh_all().await;
        assert!(!mirror.is_refreshing());
        assert_eq!(store.active_listeners(), 0);
    }

    #[tokio::test]
    async fn failed_refresh_still_clears_flag() {
        let store = Arc::new(InMemoryStore::new());
        let mirror = ActivityMirror::new(store.clone());
        mirror.configure(Some(identity("u1")), Some("b1".into()));
        store.set_offline(true);
        mirror.refresh_all().await;
        assert!(!mirror.is_refreshing());
    }
}
