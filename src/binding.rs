//! Live read bindings: `{data, is_loading, error}` state kept current by a
//! store subscription that follows the bound target.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::debug;

use crate::error::codes;
use crate::locator::Target;
use crate::store::{decode_all, DocumentStore, Listener, Record, Snapshot, SnapshotEvent, Subscription};
use crate::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ReadState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<AppError>,
}

impl<T> Default for ReadState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
        }
    }
}

pub type Decoder<T> = Arc<dyn Fn(Snapshot) -> AppResult<T> + Send + Sync>;

pub struct LiveBinding<S, T = Snapshot> {
    store: S,
    target: Option<Target>,
    subscription: Option<Subscription>,
    state: Arc<watch::Sender<ReadState<T>>>,
    decode: Decoder<T>,
}

impl<S: DocumentStore> LiveBinding<S, Snapshot> {
    pub fn new(store: S) -> Self {
        Self::with_decoder(store, Arc::new(|snapshot: Snapshot| -> AppResult<Snapshot> { Ok(snapshot) }))
    }
}

impl<S, M> LiveBinding<S, Vec<Record<M>>>
where
    S: DocumentStore,
    M: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Binding over a query, decoded into typed records.
    pub fn list(store: S) -> Self {
        Self::with_decoder(store, Arc::new(decode_list::<M>))
    }
}

impl<S, M> LiveBinding<S, Option<Record<M>>>
where
    S: DocumentStore,
    M: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Binding over a single document, decoded into a typed record.
    pub fn document(store: S) -> Self {
        Self::with_decoder(store, Arc::new(decode_doc::<M>))
    }
}

impl<S, T> LiveBinding<S, T>
where
    S: DocumentStore,
    T: Clone + Send + Sync + 'static,
{
    pub fn with_decoder(store: S, decode: Decoder<T>) -> Self {
        let (state, _) = watch::channel(ReadState::default());
        Self {
            store,
            target: None,
            subscription: None,
            state: Arc::new(state),
            decode,
        }
    }

    pub fn state(&self) -> ReadState<T> {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ReadState<T>> {
        self.state.subscribe()
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Point the binding at a new target. An equal target with a live
    /// subscription is a no-op; anything else closes the current subscription
    /// and opens the next, so re-setting after a failed subscribe retries.
    /// `None` (owner or route context not known yet) leaves the binding idle.
    pub async fn set_target(&mut self, target: Option<Target>) {
        if target == self.target && (target.is_none() || self.subscription.is_some()) {
            return;
        }
        if let Some(previous) = self.subscription.take() {
            previous.unsubscribe();
        }
        self.target = target.clone();

        let Some(target) = target else {
            self.state.send_replace(ReadState::default());
            return;
        };

        self.state.send_replace(ReadState {
            data: None,
            is_loading: true,
            error: None,
        });
        debug!(target: "landlord", event = "binding_subscribe", path = %target.path());
        match self.store.subscribe(&target, self.listener()).await {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(err) => record_error(&self.state, err),
        }
    }

    /// Close the subscription and forget the target. Data stays readable.
    pub fn dispose(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.target = None;
        self.state.send_modify(|state| state.is_loading = false);
    }

    fn listener(&self) -> Listener {
        let state = self.state.clone();
        let decode = self.decode.clone();
        Arc::new(move |event: SnapshotEvent| match event {
            SnapshotEvent::Snapshot(snapshot) => match decode(snapshot) {
                Ok(value) => {
                    state.send_replace(ReadState {
                        data: Some(value),
                        is_loading: false,
                        error: None,
                    });
                }
                Err(err) => record_error(&state, err),
            },
            SnapshotEvent::Error(err) => record_error(&state, err),
        })
    }
}

/// Failures keep the last data visible.
fn record_error<T>(state: &watch::Sender<ReadState<T>>, err: AppError) {
    err.log_with_event("binding_error");
    state.send_modify(|current| {
        current.is_loading = false;
        current.error = Some(err);
    });
}

pub fn decode_list<M: DeserializeOwned>(snapshot: Snapshot) -> AppResult<Vec<Record<M>>> {
    match snapshot {
        Snapshot::Query(docs) => decode_all(&docs),
        Snapshot::Doc(_) => Err(AppError::new(
            codes::DECODE,
            "Expected a list snapshot, got a document",
        )),
    }
}

pub fn decode_doc<M: DeserializeOwned>(snapshot: Snapshot) -> AppResult<Option<Record<M>>> {
    match snapshot {
        Snapshot::Doc(doc) => doc.as_ref().map(Record::from_document).transpose(),
        Snapshot::Query(_) => Err(AppError::new(
            codes::DECODE,
            "Expected a document snapshot, got a list",
        )),
    }
}
