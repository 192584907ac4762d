use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{
    BatchOp, Direction, Document, DocumentStore, ListenerId, Query, Snapshot, StoreError,
    Subscription, WriteBatch,
};

const OFFLINE_MESSAGE: &str = "Failed to get document because the client is offline.";

struct Listener {
    collection: String,
    query: Query,
    tx: mpsc::UnboundedSender<Result<Snapshot, StoreError>>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, Value>>,
    listeners: HashMap<ListenerId, Listener>,
}

impl Inner {
    fn run_query(&self, collection: &str, query: &Query) -> Snapshot {
        let Some(docs) = self.collections.get(collection) else {
            return Snapshot::default();
        };
        let mut documents: Vec<Document> = docs
            .iter()
            .filter(|(_, data)| data.get(&query.field) == Some(&query.equals))
            .filter(|(_, data)| match &query.order_by {
                // ordering on a field excludes documents that lack it
                Some((field, _)) => data.get(field).is_some(),
                None => true,
            })
            .map(|(id, data)| Document {
                id: id.clone(),
                data: data.clone(),
            })
            .collect();

        if let Some((field, direction)) = &query.order_by {
            documents.sort_by(|a, b| {
                let ord = compare_values(&a.data[field.as_str()], &b.data[field.as_str()])
                    .then_with(|| a.id.cmp(&b.id));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        Snapshot { documents }
    }

    /// Pushes a fresh snapshot to every listener on `collection`, dropping
    /// listeners whose receiver is gone.
    fn notify(&mut self, collection: &str) {
        let mut closed = Vec::new();
        for (id, l) in self.listeners.iter() {
            if l.collection != collection {
                continue;
            }
            let snap = self.run_query(&l.collection, &l.query);
            if l.tx.send(Ok(snap)).is_err() {
                closed.push(*id);
            }
        }
        for id in closed {
            self.listeners.remove(&id);
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Process-local document store. Backs the binary and every test; the
/// offline switch turns each call into an `Unavailable` failure.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    next_listener: AtomicU64,
    write_calls: AtomicUsize,
    offline: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Number of set/delete/commit calls received, successful or not.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn active_listeners(&self) -> usize {
        let mut inner = self.lock();
        inner.listeners.retain(|_, l| !l.tx.is_closed());
        inner.listeners.len()
    }

    /// Stores a raw document without counting it as a client write; used to
    /// stage data, including documents the client cannot decode.
    pub fn insert_raw(&self, collection: &str, id: &str, data: Value) {
        let mut inner = self.lock();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        inner.notify(collection);
    }

    /// Delivers a listener error to every subscriber of `collection`.
    pub fn fail_listeners(&self, collection: &str, error: StoreError) {
        let inner = self.lock();
        for l in inner.listeners.values().filter(|l| l.collection == collection) {
            let _ = l.tx.send(Err(error.clone()));
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // a panic while holding the lock leaves plain data behind; keep serving it
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(AtomicOrdering::SeqCst) {
            Err(StoreError::Unavailable(OFFLINE_MESSAGE.into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn listen(&self, collection: &str, query: Query) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_listener.fetch_add(1, AtomicOrdering::SeqCst) + 1;

        if let Err(e) = self.check_online() {
            warn!(collection, "listen while offline");
            let _ = tx.send(Err(e));
        } else {
            let mut inner = self.lock();
            let _ = tx.send(Ok(inner.run_query(collection, &query)));
            inner.listeners.insert(
                id,
                Listener {
                    collection: collection.to_string(),
                    query,
                    tx,
                },
            );
        }
        debug!(collection, listener_id = id, "listener registered");
        Subscription { id, updates: rx }
    }

    fn unlisten(&self, id: ListenerId) {
        if self.lock().listeners.remove(&id).is_some() {
            debug!(listener_id = id, "listener removed");
        }
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Snapshot, StoreError> {
        self.check_online()?;
        Ok(self.lock().run_query(collection, query))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.check_online()?;
        let inner = self.lock();
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError> {
        self.write_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_online()?;
        let mut inner = self.lock();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        inner.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.write_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_online()?;
        let mut inner = self.lock();
        if let Some(docs) = inner.collections.get_mut(collection) {
            docs.remove(id);
        }
        inner.notify(collection);
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.write_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_online()?;
        if batch.ops.is_empty() {
            return Err(StoreError::BatchRejected("empty batch".into()));
        }

        let mut inner = self.lock();
        let mut touched: Vec<String> = Vec::new();
        for op in batch.ops {
            match op {
                BatchOp::Set { collection, id, data } => {
                    inner
                        .collections
                        .entry(collection.clone())
                        .or_default()
                        .insert(id, data);
                    touched.push(collection);
                }
                BatchOp::Delete { collection, id } => {
                    if let Some(docs) = inner.collections.get_mut(&collection) {
                        docs.remove(&id);
                    }
                    touched.push(collection);
                }
            }
        }
        touched.sort();
        touched.dedup();
        for c in touched {
            inner.notify(&c);
        }
        Ok(())
    }
}
