pub mod memory;

use async_trait::async_trait;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

pub use memory::InMemoryStore;

/// Failure reported by the document store. Cloned into every listener that
/// observes the same failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("batch rejected: {0}")]
    BatchRejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality filter plus an optional ordering, the only query shape the app
/// ever issues.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub field: String,
    pub equals: Value,
    pub order_by: Option<(String, Direction)>,
}

impl Query {
    pub fn where_eq(field: &str, equals: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            equals: equals.into(),
            order_by: None,
        }
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// Full result set of a query at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub documents: Vec<Document>,
}

impl Snapshot {
    /// Deserializes every document in server order. Documents that do not
    /// fit `T` are skipped.
    pub fn decode<T: DeserializeOwned>(&self) -> Vec<T> {
        self.documents
            .iter()
            .filter_map(|doc| match serde_json::from_value::<T>(doc.data.clone()) {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!(doc_id = %doc.id, error = %e, "skipping malformed document");
                    None
                }
            })
            .collect()
    }
}

pub type ListenerId = u64;

/// A live query. The current snapshot arrives first, then one snapshot per
/// change until the listener is released.
pub struct Subscription {
    pub id: ListenerId,
    pub updates: mpsc::UnboundedReceiver<Result<Snapshot, StoreError>>,
}

#[derive(Debug, Clone)]
pub enum BatchOp {
    Set {
        collection: String,
        id: String,
        data: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// Writes applied all-or-nothing by [`DocumentStore::commit`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: &str, id: &str, data: Value) -> &mut Self {
        self.ops.push(BatchOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
        self
    }

    pub fn delete(&mut self, collection: &str, id: &str) -> &mut Self {
        self.ops.push(BatchOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn listen(&self, collection: &str, query: Query) -> Subscription;
    fn unlisten(&self, id: ListenerId);
    async fn query(&self, collection: &str, query: &Query) -> Result<Snapshot, StoreError>;
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;
    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError>;
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

const AUTO_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const AUTO_ID_LEN: usize = 20;

/// Client-side document id, same shape as the hosted store's auto ids.
pub fn auto_id() -> String {
    let mut rng = rand::thread_rng();
    (0..AUTO_ID_LEN)
        .map(|_| AUTO_ID_ALPHABET[rng.gen_range(0..AUTO_ID_ALPHABET.len())] as char)
        .collect()
}

pub fn user_collection(uid: &str, name: &str) -> String {
    format!("users/{}/{}", uid, name)
}

#[cfg(test)]
mod store_tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn auto_id_shape_and_uniqueness() {
        let ids: HashSet<String> = (0..500).map(|_| auto_id()).collect();
        assert_eq!(ids.len(), 500);
        for id in &ids {
            assert_eq!(id.len(), 20);
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn decode_skips_documents_of_the_wrong_shape() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Item {
            n: i64,
        }
        let snap = Snapshot {
            documents: vec![
                Document { id: "a".into(), data: json!({"n": 1}) },
                Document { id: "b".into(), data: json!({"n": "one"}) },
                Document { id: "c".into(), data: json!({"n": 3}) },
            ],
        };
        let items: Vec<Item> = snap.decode();
        assert_eq!(items, vec![Item { n: 1 }, Item { n: 3 }]);
    }

    #[test]
    fn user_collection_path() {
        assert_eq!(user_collection("u1", "feedings"), "users/u1/feedings");
    }
}
