//! Two-phase deletion: a reversible status flip into the archive, then an
//! irreversible purge that only an archived record can reach.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::error::codes;
use crate::locator::{CollectionRef, DocRef, Query};
use crate::mutation::{
    ConfirmPrompt, Feedback, MutationPipeline, Redirect, SubmitError, WriteAction,
};
use crate::route::Route;
use crate::store::{Document, DocumentStore};
use crate::AppError;

pub const STATUS_FIELD: &str = "status";
pub const STATUS_BEFORE_ARCHIVE: &str = "statusBeforeArchive";

/// A closed status enum with one archived variant.
pub trait SoftLifecycle:
    Copy + Eq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const ARCHIVED: Self;
    /// Where a restore lands when no prior status was recorded.
    const RESTORED_DEFAULT: Self;
    /// Lower-case singular used in prompts and toasts.
    const NOUN: &'static str;
    /// What the UI calls the soft step ("delete", "archive").
    const ARCHIVE_VERB: &'static str;

    fn as_str(self) -> &'static str;

    fn listing_route() -> Route;

    fn archive_route() -> Route;

    fn is_archived(self) -> bool {
        self == Self::ARCHIVED
    }
}

/// Everything except archived records.
pub fn default_listing<L: SoftLifecycle>(collection: &CollectionRef) -> Query {
    collection.query().where_ne(STATUS_FIELD, L::ARCHIVED.as_str())
}

/// Archived records only.
pub fn archive_listing<L: SoftLifecycle>(collection: &CollectionRef) -> Query {
    collection.query().where_eq(STATUS_FIELD, L::ARCHIVED.as_str())
}

#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    #[error("cannot {action} a {noun} whose status is {status}")]
    InvalidTransition {
        noun: &'static str,
        action: &'static str,
        status: String,
    },
    #[error("{noun} not found at {path}")]
    Missing { noun: &'static str, path: String },
    #[error("cancelled by user")]
    Declined,
    #[error(transparent)]
    Write(#[from] SubmitError),
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::InvalidTransition {
                noun,
                action,
                status,
            } => AppError::new(
                codes::LIFECYCLE_TRANSITION,
                format!("This {noun} can't be {action}d right now."),
            )
            .with_context("status", status),
            LifecycleError::Missing { path, .. } => AppError::not_found(path),
            LifecycleError::Declined => {
                AppError::new(codes::LIFECYCLE_DECLINED, "Cancelled.")
            }
            LifecycleError::Write(SubmitError::Rejected(err)) => err,
            LifecycleError::Write(other) => {
                AppError::new(codes::VALIDATION, other.to_string())
            }
        }
    }
}

/// Proof that the user confirmed a permanent delete of an archived record.
/// Only [`request_purge`] hands these out, and only [`purge`] for the same
/// status enum accepts them.
#[derive(Debug)]
pub struct PurgeTicket<L> {
    doc: DocRef,
    lifecycle: PhantomData<L>,
}

impl<L> PurgeTicket<L> {
    pub fn doc(&self) -> &DocRef {
        &self.doc
    }
}

fn status_of<L: SoftLifecycle>(doc: &Document, field: &str) -> Option<L> {
    doc.field(field)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

async fn load<S, L>(
    pipeline: &MutationPipeline<S>,
    op: &'static str,
    doc: &DocRef,
) -> Result<(Document, L), LifecycleError>
where
    S: DocumentStore,
    L: SoftLifecycle,
{
    let found = match pipeline.store().get(doc).await {
        Ok(found) => found,
        Err(err) => {
            let action = WriteAction::Update(doc.clone(), Map::new());
            return Err(pipeline.fail(op, &action, err).into());
        }
    };
    let found = found.ok_or_else(|| LifecycleError::Missing {
        noun: L::NOUN,
        path: doc.path(),
    })?;
    let status = status_of::<L>(&found, STATUS_FIELD).ok_or_else(|| {
        LifecycleError::InvalidTransition {
            noun: L::NOUN,
            action: "change",
            status: found
                .field(STATUS_FIELD)
                .map(Value::to_string)
                .unwrap_or_else(|| "missing".into()),
        }
    })?;
    Ok((found, status))
}

fn capitalised(noun: &str) -> String {
    let mut chars = noun.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Soft step: confirm, remember the current status, flip to archived.
pub async fn archive<S, L>(
    pipeline: &MutationPipeline<S>,
    doc: &DocRef,
) -> Result<Document, LifecycleError>
where
    S: DocumentStore,
    L: SoftLifecycle,
{
    let (_, current) = load::<S, L>(pipeline, "lifecycle_archive", doc).await?;
    if current.is_archived() {
        return Err(LifecycleError::InvalidTransition {
            noun: L::NOUN,
            action: L::ARCHIVE_VERB,
            status: current.as_str().to_string(),
        });
    }

    let prompt = ConfirmPrompt::new(
        format!("{} this {}?", capitalised(L::ARCHIVE_VERB), L::NOUN),
        "It will move to the archive and can be restored from there.",
        capitalised(L::ARCHIVE_VERB),
    );
    if !pipeline.confirm(&prompt) {
        info!(target: "landlord", event = "lifecycle_declined", step = "archive", path = %doc);
        return Err(LifecycleError::Declined);
    }

    let mut patch = Map::new();
    patch.insert(STATUS_FIELD.into(), Value::from(L::ARCHIVED.as_str()));
    patch.insert(STATUS_BEFORE_ARCHIVE.into(), Value::from(current.as_str()));
    let written = pipeline
        .execute(
            "lifecycle_archive",
            WriteAction::Update(doc.clone(), patch),
            Feedback::new(
                format!("{} moved to archive", capitalised(L::NOUN)),
                "You can restore it or delete it permanently from the archive.",
                Redirect::To(L::listing_route()),
            ),
        )
        .await?;
    written.ok_or_else(|| LifecycleError::Missing {
        noun: L::NOUN,
        path: doc.path(),
    })
}

/// Back to the recorded prior status (or the default), marker cleared.
pub async fn restore<S, L>(
    pipeline: &MutationPipeline<S>,
    doc: &DocRef,
) -> Result<Document, LifecycleError>
where
    S: DocumentStore,
    L: SoftLifecycle,
{
    let (found, current) = load::<S, L>(pipeline, "lifecycle_restore", doc).await?;
    if !current.is_archived() {
        return Err(LifecycleError::InvalidTransition {
            noun: L::NOUN,
            action: "restore",
            status: current.as_str().to_string(),
        });
    }
    let prior = status_of::<L>(&found, STATUS_BEFORE_ARCHIVE)
        .filter(|status| !status.is_archived())
        .unwrap_or(L::RESTORED_DEFAULT);

    let mut data = found.data;
    data.remove(STATUS_BEFORE_ARCHIVE);
    data.insert(STATUS_FIELD.into(), Value::from(prior.as_str()));
    let written = pipeline
        .execute(
            "lifecycle_restore",
            WriteAction::Set(doc.clone(), data),
            Feedback::new(
                format!("{} restored", capitalised(L::NOUN)),
                format!("Status is back to {}.", prior.as_str()),
                Redirect::To(L::listing_route()),
            ),
        )
        .await?;
    written.ok_or_else(|| LifecycleError::Missing {
        noun: L::NOUN,
        path: doc.path(),
    })
}

/// Second, separate confirmation for the irreversible step.
pub async fn request_purge<S, L>(
    pipeline: &MutationPipeline<S>,
    doc: &DocRef,
) -> Result<PurgeTicket<L>, LifecycleError>
where
    S: DocumentStore,
    L: SoftLifecycle,
{
    let (_, current) = load::<S, L>(pipeline, "lifecycle_purge", doc).await?;
    if !current.is_archived() {
        return Err(LifecycleError::InvalidTransition {
            noun: L::NOUN,
            action: "permanently delete",
            status: current.as_str().to_string(),
        });
    }
    let prompt = ConfirmPrompt::new(
        format!("Permanently delete this {}?", L::NOUN),
        "This cannot be undone.",
        "Delete forever",
    );
    if !pipeline.confirm(&prompt) {
        info!(target: "landlord", event = "lifecycle_declined", step = "purge", path = %doc);
        return Err(LifecycleError::Declined);
    }
    Ok(PurgeTicket {
        doc: doc.clone(),
        lifecycle: PhantomData,
    })
}

/// Irreversible. The record is read again first: a ticket issued before a
/// restore no longer applies.
pub async fn purge<S, L>(
    pipeline: &MutationPipeline<S>,
    ticket: PurgeTicket<L>,
) -> Result<(), LifecycleError>
where
    S: DocumentStore,
    L: SoftLifecycle,
{
    let (_, current) = load::<S, L>(pipeline, "lifecycle_purge", &ticket.doc).await?;
    if !current.is_archived() {
        info!(target: "landlord", event = "lifecycle_stale_ticket", path = %ticket.doc, status = current.as_str());
        return Err(LifecycleError::InvalidTransition {
            noun: L::NOUN,
            action: "permanently delete",
            status: current.as_str().to_string(),
        });
    }
    pipeline
        .execute(
            "lifecycle_purge",
            WriteAction::Delete(ticket.doc),
            Feedback::new(
                format!("{} permanently deleted", capitalised(L::NOUN)),
                "",
                Redirect::To(L::archive_route()),
            ),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator;
    use crate::model::property::PropertyStatus;
    use crate::mutation::{RecordingUi, UiPorts};
    use crate::session::OwnerId;
    use crate::store::MemoryStore;
    use serde_json::json;

    type Fixture = (
        MemoryStore,
        std::sync::Arc<RecordingUi>,
        MutationPipeline<MemoryStore>,
        DocRef,
    );

    async fn seeded(status: &str) -> Fixture {
        let store = MemoryStore::new();
        let ui = RecordingUi::new();
        let pipeline = MutationPipeline::new(store.clone(), UiPorts::recording(ui.clone()));
        let owner = OwnerId::parse("o1").unwrap();
        let doc = locator::property(Some(&owner), Some("p1")).unwrap();
        store
            .set(&doc, json!({"status": status}).as_object().cloned().unwrap())
            .await
            .unwrap();
        (store, ui, pipeline, doc)
    }

    #[tokio::test]
    async fn archive_then_restore_returns_prior_status() {
        let (store, ui, pipeline, doc) = seeded("Occupied").await;
        ui.answer(&[true]);
        archive::<_, PropertyStatus>(&pipeline, &doc).await.unwrap();
        let archived = store.get(&doc).await.unwrap().unwrap();
        assert_eq!(archived.data["status"], json!("Deleted"));
        assert_eq!(archived.data[STATUS_BEFORE_ARCHIVE], json!("Occupied"));

        restore::<_, PropertyStatus>(&pipeline, &doc).await.unwrap();
        let restored = store.get(&doc).await.unwrap().unwrap();
        assert_eq!(restored.data["status"], json!("Occupied"));
        assert!(!restored.data.contains_key(STATUS_BEFORE_ARCHIVE));
        assert_eq!(ui.routes(), vec![Route::Properties, Route::Properties]);
    }

    #[tokio::test]
    async fn declined_archive_writes_nothing() {
        let (store, ui, pipeline, doc) = seeded("Vacant").await;
        ui.answer(&[false]);
        let err = archive::<_, PropertyStatus>(&pipeline, &doc).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Declined));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn purge_requires_archived_and_a_second_confirmation() {
        let (store, ui, pipeline, doc) = seeded("Vacant").await;
        let err = request_purge::<_, PropertyStatus>(&pipeline, &doc)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
        assert!(ui.prompts().is_empty());

        ui.answer(&[true, false]);
        archive::<_, PropertyStatus>(&pipeline, &doc).await.unwrap();
        let err = request_purge::<_, PropertyStatus>(&pipeline, &doc)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Declined));
        assert!(store.get(&doc).await.unwrap().is_some());

        ui.answer(&[true]);
        let ticket = request_purge::<_, PropertyStatus>(&pipeline, &doc)
            .await
            .unwrap();
        purge(&pipeline, ticket).await.unwrap();
        assert!(store.get(&doc).await.unwrap().is_none());

        let prompts = ui.prompts();
        assert_eq!(prompts.len(), 3);
        assert_ne!(prompts[0].title, prompts[2].title);
    }

    #[tokio::test]
    async fn ticket_from_before_a_restore_cannot_purge() {
        let (store, ui, pipeline, doc) = seeded("Occupied").await;
        ui.answer(&[true, true]);
        archive::<_, PropertyStatus>(&pipeline, &doc).await.unwrap();
        let ticket = request_purge::<_, PropertyStatus>(&pipeline, &doc)
            .await
            .unwrap();
        restore::<_, PropertyStatus>(&pipeline, &doc).await.unwrap();
        let writes = store.write_count();

        let err = purge(&pipeline, ticket).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
        assert_eq!(store.write_count(), writes);
        let kept = store.get(&doc).await.unwrap().unwrap();
        assert_eq!(kept.data["status"], json!("Occupied"));
    }

    #[tokio::test]
    async fn restore_without_marker_uses_default() {
        let (store, ui, pipeline, doc) = seeded("Deleted").await;
        restore::<_, PropertyStatus>(&pipeline, &doc).await.unwrap();
        assert_eq!(
            store.get(&doc).await.unwrap().unwrap().data["status"],
            json!("Vacant")
        );
        assert!(ui.prompts().is_empty());
    }

    #[test]
    fn listings_split_on_archived_status() {
        let owner = OwnerId::parse("o1").unwrap();
        let props = locator::properties(Some(&owner)).unwrap();
        let live = json!({"status": "Vacant"});
        let gone = json!({"status": "Deleted"});
        let live = live.as_object().unwrap();
        let gone = gone.as_object().unwrap();
        assert!(default_listing::<PropertyStatus>(&props).matches(live));
        assert!(!default_listing::<PropertyStatus>(&props).matches(gone));
        assert!(archive_listing::<PropertyStatus>(&props).matches(gone));
    }

    #[test]
    fn errors_map_to_codes() {
        let err: AppError = LifecycleError::Declined.into();
        assert_eq!(err.code(), codes::LIFECYCLE_DECLINED);
    }
}
