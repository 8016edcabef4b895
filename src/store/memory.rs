use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{
    ensure_no_undefined, stamp_create, stamp_update, ChangeFeed, Document, DocumentStore,
    Listener, Snapshot, SnapshotEvent, Subscription,
};
use crate::id::new_uuid_v7;
use crate::locator::{CollectionRef, DocRef, Query, Target};
use crate::session::OwnerId;
use crate::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Set,
    Update,
    Delete,
}

/// One write the store accepted, kept for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub kind: WriteKind,
    pub path: String,
}

#[derive(Default)]
struct State {
    docs: BTreeMap<String, Document>,
    writes: Vec<WriteRecord>,
    denied_prefixes: Vec<String>,
    fail_next_write: Option<AppError>,
    fail_next_subscribe: Option<AppError>,
}

/// In-process document store.
///
/// Clones share data. [`MemoryStore::as_principal`] returns a handle that, like
/// the hosted store's security rules, only lets the given owner touch paths under
/// `owners/{owner}`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    feed: ChangeFeed,
    principal: Option<OwnerId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_principal(&self, owner: OwnerId) -> Self {
        Self {
            state: self.state.clone(),
            feed: self.feed.clone(),
            principal: Some(owner),
        }
    }

    /// Reject every write whose path starts with `prefix` as permission denied.
    pub fn deny_writes_under(&self, prefix: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.denied_prefixes.push(prefix.to_string());
        }
    }

    /// Fail the next write with `error` (network drop, quota, ...).
    pub fn fail_next_write(&self, error: AppError) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next_write = Some(error);
        }
    }

    /// Fail the next subscribe with `error`, as a dropped listen channel would.
    pub fn fail_next_subscribe(&self, error: AppError) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next_subscribe = Some(error);
        }
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state
            .lock()
            .map(|state| state.writes.clone())
            .unwrap_or_default()
    }

    pub fn write_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.writes.len())
            .unwrap_or(0)
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| AppError::new("STORE/POISONED", "Document store lock poisoned"))
    }

    fn check_access(&self, owner: &OwnerId, path: &str) -> AppResult<()> {
        match &self.principal {
            Some(principal) if principal != owner => {
                warn!(
                    target: "landlord",
                    event = "store_access_denied",
                    principal = %principal,
                    path = %path
                );
                Err(AppError::permission_denied(path))
            }
            _ => Ok(()),
        }
    }

    fn check_write(&self, state: &mut State, owner: &OwnerId, path: &str) -> AppResult<()> {
        self.check_access(owner, path)?;
        if state.denied_prefixes.iter().any(|p| path.starts_with(p)) {
            return Err(AppError::permission_denied(path));
        }
        if let Some(err) = state.fail_next_write.take() {
            return Err(err.with_context("path", path.to_string()));
        }
        Ok(())
    }

    fn snapshot_of(state: &State, target: &Target) -> Snapshot {
        match target {
            Target::Doc(doc) => Snapshot::Doc(state.docs.get(&doc.path()).cloned()),
            Target::Query(query) => Snapshot::Query(run_query(state, query)),
        }
    }

    fn publish(&self, doc: &DocRef) {
        let affected = self.feed.affected(doc);
        if affected.is_empty() {
            return;
        }
        let snapshots: Vec<(Snapshot, Listener)> = match self.state.lock() {
            Ok(state) => affected
                .into_iter()
                .map(|(target, listener)| (Self::snapshot_of(&state, &target), listener))
                .collect(),
            Err(_) => return,
        };
        for (snapshot, listener) in snapshots {
            listener(SnapshotEvent::Snapshot(snapshot));
        }
    }

    fn record(state: &mut State, kind: WriteKind, path: String) {
        debug!(target: "landlord", event = "store_write", kind = ?kind, path = %path);
        state.writes.push(WriteRecord { kind, path });
    }
}

fn run_query(state: &State, query: &Query) -> Vec<Document> {
    let prefix = format!("{}/", query.collection().path());
    let rows: Vec<Document> = state
        .docs
        .range(prefix.clone()..)
        .take_while(|(path, _)| path.starts_with(&prefix))
        .filter(|(_, doc)| doc.locator.collection() == query.collection())
        .filter(|(_, doc)| query.matches(&doc.data))
        .map(|(_, doc)| doc.clone())
        .collect();
    query.finish(rows, |doc| (doc.id(), &doc.data))
}

impl DocumentStore for MemoryStore {
    async fn get(&self, doc: &DocRef) -> AppResult<Option<Document>> {
        self.check_access(doc.owner(), &doc.path())?;
        let state = self.lock()?;
        Ok(state.docs.get(&doc.path()).cloned())
    }

    async fn query(&self, query: &Query) -> AppResult<Vec<Document>> {
        let path = query.collection().path();
        self.check_access(query.collection().owner(), &path)?;
        let state = self.lock()?;
        Ok(run_query(&state, query))
    }

    async fn create(
        &self,
        collection: &CollectionRef,
        data: Map<String, Value>,
    ) -> AppResult<Document> {
        let locator = collection
            .doc(&new_uuid_v7())
            .ok_or_else(|| AppError::new("STORE/ID", "Could not allocate a document id"))?;
        let written = {
            let mut state = self.lock()?;
            self.insert(&mut state, &locator, data, WriteKind::Create)?
        };
        self.publish(&locator);
        Ok(written)
    }

    async fn set(&self, doc: &DocRef, data: Map<String, Value>) -> AppResult<Document> {
        let written = {
            let mut state = self.lock()?;
            self.insert(&mut state, doc, data, WriteKind::Set)?
        };
        self.publish(doc);
        Ok(written)
    }

    async fn update(&self, doc: &DocRef, mut patch: Map<String, Value>) -> AppResult<Document> {
        let path = doc.path();
        let written = {
            let mut state = self.lock()?;
            self.check_write(&mut state, doc.owner(), &path)?;
            ensure_no_undefined(&patch, &path)?;
            stamp_update(&mut patch);
            let existing = state
                .docs
                .get_mut(&path)
                .ok_or_else(|| AppError::not_found(path.clone()))?;
            for (key, value) in patch {
                existing.data.insert(key, value);
            }
            let written = existing.clone();
            Self::record(&mut state, WriteKind::Update, path);
            written
        };
        self.publish(doc);
        Ok(written)
    }

    async fn delete(&self, doc: &DocRef) -> AppResult<()> {
        let path = doc.path();
        {
            let mut state = self.lock()?;
            self.check_write(&mut state, doc.owner(), &path)?;
            state.docs.remove(&path);
            Self::record(&mut state, WriteKind::Delete, path);
        }
        self.publish(doc);
        Ok(())
    }

    async fn subscribe(&self, target: &Target, listener: Listener) -> AppResult<Subscription> {
        let refused = match self.check_access(target.owner(), &target.path()) {
            Ok(()) => self.lock()?.fail_next_subscribe.take(),
            Err(err) => Some(err),
        };
        if let Some(err) = refused {
            listener(SnapshotEvent::Error(err.clone()));
            return Err(err);
        }
        let subscription = self.feed.register(target.clone(), listener.clone());
        let initial = {
            let state = self.lock()?;
            Self::snapshot_of(&state, target)
        };
        listener(SnapshotEvent::Snapshot(initial));
        Ok(subscription)
    }

    fn active_subscriptions(&self) -> usize {
        self.feed.len()
    }
}

impl MemoryStore {
    fn insert(
        &self,
        state: &mut State,
        locator: &DocRef,
        mut data: Map<String, Value>,
        kind: WriteKind,
    ) -> AppResult<Document> {
        let path = locator.path();
        self.check_write(state, locator.owner(), &path)?;
        ensure_no_undefined(&data, &path)?;
        stamp_create(&mut data);
        let doc = Document {
            locator: locator.clone(),
            data,
        };
        state.docs.insert(path.clone(), doc.clone());
        Self::record(state, kind, path);
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use crate::locator;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn owner(id: &str) -> OwnerId {
        OwnerId::parse(id).unwrap()
    }

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_get_update_delete() {
        let store = MemoryStore::new();
        let o = owner("o1");
        let props = locator::properties(Some(&o)).unwrap();
        let created = store
            .create(&props, body(json!({"status": "Vacant"})))
            .await
            .unwrap();
        assert!(created.data.contains_key("createdAt"));

        let updated = store
            .update(&created.locator, body(json!({"status": "Occupied"})))
            .await
            .unwrap();
        assert_eq!(updated.data["status"], json!("Occupied"));
        assert_eq!(updated.data["createdAt"], created.data["createdAt"]);

        store.delete(&created.locator).await.unwrap();
        assert!(store.get(&created.locator).await.unwrap().is_none());
        assert_eq!(store.write_count(), 3);
    }

    #[tokio::test]
    async fn update_of_missing_doc_is_not_found() {
        let store = MemoryStore::new();
        let o = owner("o1");
        let doc = locator::property(Some(&o), Some("nope")).unwrap();
        let err = store.update(&doc, Map::new()).await.unwrap_err();
        assert_eq!(err.code(), codes::NOT_FOUND);
    }

    #[tokio::test]
    async fn queries_do_not_leak_nested_collections() {
        let store = MemoryStore::new();
        let o = owner("o1");
        let p = locator::property(Some(&o), Some("p1")).unwrap();
        store.set(&p, body(json!({"status": "Vacant"}))).await.unwrap();
        let tenants = locator::property_children(Some(&o), Some("p1"), locator::Collection::Tenants)
            .unwrap();
        store
            .create(&tenants, body(json!({"name": "T"})))
            .await
            .unwrap();

        let listing = store
            .query(&locator::properties(Some(&o)).unwrap().query())
            .await
            .unwrap();
        assert_eq!(listing.len(), 1);
    }

    #[tokio::test]
    async fn principal_cannot_touch_other_owners() {
        let shared = MemoryStore::new();
        let alice = shared.as_principal(owner("alice"));
        let bob = owner("bob");
        let bobs = locator::properties(Some(&bob)).unwrap();
        let err = alice.create(&bobs, Map::new()).await.unwrap_err();
        assert_eq!(err.code(), codes::PERMISSION_DENIED);
        assert_eq!(shared.write_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_get_initial_and_followup_snapshots() {
        let store = MemoryStore::new();
        let o = owner("o1");
        let listing = locator::properties(Some(&o)).unwrap();
        let seen: Arc<StdMutex<Vec<usize>>> = Arc::default();
        let sink = seen.clone();
        let sub = store
            .subscribe(
                &Target::Query(listing.query()),
                Arc::new(move |event: SnapshotEvent| {
                    if let SnapshotEvent::Snapshot(Snapshot::Query(rows)) = event {
                        sink.lock().unwrap().push(rows.len());
                    }
                }),
            )
            .await
            .unwrap();
        store.create(&listing, Map::new()).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
        assert_eq!(store.active_subscriptions(), 1);

        drop(sub);
        store.create(&listing, Map::new()).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
        assert_eq!(store.active_subscriptions(), 0);
    }
}
