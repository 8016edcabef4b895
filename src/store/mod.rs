//! Document store collaborator.
//!
//! The product ran against a hosted hierarchical document database. The crate
//! talks to it through [`DocumentStore`]; [`memory::MemoryStore`] backs tests and
//! previews, [`sqlite::SqliteStore`] backs the CLI. Both reject `null` field
//! values the way the hosted store rejected `undefined`, stamp `createdAt` /
//! `updatedAt`, and push fresh snapshots to live subscribers after every write
//! they perform.
//!
//! There is no optimistic-concurrency token: the last write to a document wins.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::codes;
use crate::locator::{CollectionRef, DocRef, Query, Target};
use crate::time::now_ms;
use crate::{AppError, AppResult};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub locator: DocRef,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn id(&self) -> &str {
        self.locator.id()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        crate::locator::field_value(&self.data, name)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_value(Value::Object(self.data.clone())).map_err(|err| {
            AppError::new(codes::DECODE, "Stored record has an unexpected shape")
                .with_context("path", self.locator.path())
                .with_cause(AppError::from(err))
        })
    }
}

/// A decoded document together with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    pub id: String,
    pub value: T,
}

impl<T: DeserializeOwned> Record<T> {
    pub fn from_document(doc: &Document) -> AppResult<Self> {
        Ok(Self {
            id: doc.id().to_string(),
            value: doc.decode()?,
        })
    }
}

pub fn decode_all<T: DeserializeOwned>(docs: &[Document]) -> AppResult<Vec<Record<T>>> {
    docs.iter().map(Record::from_document).collect()
}

/// Serialize a typed body into a document map.
pub fn to_fields<T: Serialize>(value: &T) -> AppResult<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::new(
            codes::DECODE,
            "Only objects can be written as documents",
        )
        .with_context("kind", kind_of(&other))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Doc(Option<Document>),
    Query(Vec<Document>),
}

#[derive(Debug, Clone)]
pub enum SnapshotEvent {
    Snapshot(Snapshot),
    Error(AppError),
}

pub type Listener = Arc<dyn Fn(SnapshotEvent) + Send + Sync>;

pub trait DocumentStore: Send + Sync {
    fn get(&self, doc: &DocRef) -> impl Future<Output = AppResult<Option<Document>>> + Send;

    fn query(&self, query: &Query) -> impl Future<Output = AppResult<Vec<Document>>> + Send;

    /// Insert under a fresh id.
    fn create(
        &self,
        collection: &CollectionRef,
        data: Map<String, Value>,
    ) -> impl Future<Output = AppResult<Document>> + Send;

    /// Create or replace at a known id.
    fn set(
        &self,
        doc: &DocRef,
        data: Map<String, Value>,
    ) -> impl Future<Output = AppResult<Document>> + Send;

    /// Shallow merge into an existing document; `STORE/NOT_FOUND` if absent.
    fn update(
        &self,
        doc: &DocRef,
        patch: Map<String, Value>,
    ) -> impl Future<Output = AppResult<Document>> + Send;

    /// Deleting a missing document is not an error.
    fn delete(&self, doc: &DocRef) -> impl Future<Output = AppResult<()>> + Send;

    /// Register `listener` for `target`. The current snapshot is delivered before
    /// this returns; later snapshots follow every write. Dropping the returned
    /// [`Subscription`] (or calling `unsubscribe`) stops delivery.
    fn subscribe(
        &self,
        target: &Target,
        listener: Listener,
    ) -> impl Future<Output = AppResult<Subscription>> + Send;

    fn active_subscriptions(&self) -> usize;
}

/// Rejects `null` anywhere in a write body.
pub fn ensure_no_undefined(data: &Map<String, Value>, path: &str) -> AppResult<()> {
    fn walk(value: &Value, field: &str) -> Option<String> {
        match value {
            Value::Null => Some(field.to_string()),
            Value::Object(map) => map
                .iter()
                .find_map(|(k, v)| walk(v, &format!("{field}.{k}"))),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, v)| walk(v, &format!("{field}[{i}]"))),
            _ => None,
        }
    }

    for (key, value) in data {
        if let Some(field) = walk(value, key) {
            return Err(AppError::new(
                codes::UNDEFINED_FIELD,
                "Unsupported field value: undefined",
            )
            .with_context("path", path.to_string())
            .with_context("field", field));
        }
    }
    Ok(())
}

pub(crate) fn stamp_create(data: &mut Map<String, Value>) {
    let now = now_ms();
    data.entry(String::from(CREATED_AT))
        .or_insert(Value::from(now));
    data.insert(UPDATED_AT.into(), Value::from(now));
}

pub(crate) fn stamp_update(data: &mut Map<String, Value>) {
    data.remove(CREATED_AT);
    data.insert(UPDATED_AT.into(), Value::from(now_ms()));
}

fn affects(target: &Target, doc: &DocRef) -> bool {
    match target {
        Target::Doc(watched) => watched == doc,
        Target::Query(query) => query.collection() == doc.collection(),
    }
}

struct FeedEntry {
    target: Target,
    listener: Listener,
}

#[derive(Default)]
struct FeedInner {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, FeedEntry>>,
}

/// Listener registry shared by the store implementations.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
}

impl ChangeFeed {
    pub fn register(&self, target: Target, listener: Listener) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let path = target.path();
        if let Ok(mut entries) = self.inner.entries.lock() {
            entries.insert(id, FeedEntry { target, listener });
        }
        debug!(target: "landlord", event = "subscription_open", id, path = %path);
        Subscription {
            id,
            feed: Arc::downgrade(&self.inner),
        }
    }

    /// Listeners whose target covers `doc`, cloned out so callers can deliver
    /// without holding the registry lock.
    pub fn affected(&self, doc: &DocRef) -> Vec<(Target, Listener)> {
        self.inner
            .entries
            .lock()
            .map(|entries| {
                entries
                    .values()
                    .filter(|e| affects(&e.target, doc))
                    .map(|e| (e.target.clone(), e.listener.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner
            .entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Disposer for a live subscription.
#[must_use = "dropping a subscription closes it immediately"]
pub struct Subscription {
    id: u64,
    feed: Weak<FeedInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.upgrade() {
            if let Ok(mut entries) = feed.entries.lock() {
                entries.remove(&self.id);
            }
            debug!(target: "landlord", event = "subscription_closed", id = self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator;
    use crate::session::OwnerId;
    use serde_json::json;

    #[test]
    fn null_anywhere_is_rejected() {
        let body = json!({"name": "x", "address": {"line2": null}});
        let err = ensure_no_undefined(body.as_object().unwrap(), "owners/o/properties/p")
            .unwrap_err();
        assert_eq!(err.code(), codes::UNDEFINED_FIELD);
        assert_eq!(
            err.context().get("field").map(String::as_str),
            Some("address.line2")
        );

        let list = json!({"imageUrls": ["a", null]});
        let err = ensure_no_undefined(list.as_object().unwrap(), "p").unwrap_err();
        assert_eq!(
            err.context().get("field").map(String::as_str),
            Some("imageUrls[1]")
        );
    }

    #[test]
    fn stamping_keeps_created_at_on_create_and_drops_it_on_update() {
        let mut body = Map::new();
        body.insert(CREATED_AT.into(), json!(5));
        stamp_create(&mut body);
        assert_eq!(body[CREATED_AT], json!(5));
        assert!(body.contains_key(UPDATED_AT));

        stamp_update(&mut body);
        assert!(!body.contains_key(CREATED_AT));
    }

    #[test]
    fn feed_tracks_registrations() {
        let feed = ChangeFeed::default();
        let owner = OwnerId::parse("o").unwrap();
        let doc = locator::property(Some(&owner), Some("p1")).unwrap();
        let sibling = locator::property(Some(&owner), Some("p2")).unwrap();
        let listing = locator::properties(Some(&owner)).unwrap().query();

        let a = feed.register(Target::Doc(doc.clone()), Arc::new(|_: SnapshotEvent| {}));
        let b = feed.register(Target::Query(listing), Arc::new(|_: SnapshotEvent| {}));
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.affected(&doc).len(), 2);
        assert_eq!(feed.affected(&sibling).len(), 1);

        drop(a);
        b.unsubscribe();
        assert!(feed.is_empty());
    }
}
