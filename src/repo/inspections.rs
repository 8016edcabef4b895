//! Inspections are scheduled per property from a kind-specific template.
//! The list view deletes them outright even though `Deleted` is a valid status.

use serde_json::Map;

use super::{fetch, fetch_all, located, newest_first};
use crate::locator::{self, Collection, DocRef};
use crate::model::inspection::{Inspection, InspectionKind};
use crate::mutation::{
    ConfirmPrompt, Feedback, MutationPipeline, Redirect, SubmitError, WriteAction,
};
use crate::route::Route;
use crate::session::OwnerId;
use crate::store::{Document, DocumentStore, Record};
use crate::time::DateLike;
use crate::AppResult;

fn doc_ref(owner: &OwnerId, property_id: &str, inspection_id: &str) -> AppResult<DocRef> {
    located(
        locator::inspection(Some(owner), Some(property_id), Some(inspection_id)),
        "inspection",
        inspection_id,
    )
}

/// Newest scheduled date first.
pub async fn list<S: DocumentStore>(
    store: &S,
    owner: &OwnerId,
    property_id: &str,
) -> AppResult<Vec<Record<Inspection>>> {
    let collection = located(
        locator::property_children(Some(owner), Some(property_id), Collection::Inspections),
        "property",
        property_id,
    )?;
    let mut inspections: Vec<Record<Inspection>> = fetch_all(store, &collection.query()).await?;
    newest_first(&mut inspections, |inspection| &inspection.scheduled_date);
    Ok(inspections)
}

pub async fn get<S: DocumentStore>(
    store: &S,
    owner: &OwnerId,
    property_id: &str,
    inspection_id: &str,
) -> AppResult<Option<Record<Inspection>>> {
    fetch(store, &doc_ref(owner, property_id, inspection_id)?).await
}

pub async fn create<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
    kind: InspectionKind,
    scheduled_date: DateLike,
    inspector: Option<String>,
) -> Result<Document, SubmitError> {
    let collection = located(
        locator::property_children(Some(owner), Some(property_id), Collection::Inspections),
        "property",
        property_id,
    )?;
    let mut inspection = Inspection::scheduled(kind, scheduled_date);
    inspection.inspector = inspector;

    let route_property = property_id.to_string();
    pipeline
        .submit(
            "inspection_create",
            inspection,
            WriteAction::Create(collection, Map::new()),
            Feedback::new(
                "Inspection scheduled",
                format!("{} inspection added.", kind.as_str()),
                Redirect::to_written(move |id| Route::Inspection {
                    property_id: route_property.clone(),
                    inspection_id: id.to_string(),
                }),
            ),
        )
        .await
}

pub async fn update<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
    inspection_id: &str,
    inspection: Inspection,
) -> Result<Document, SubmitError> {
    let doc = doc_ref(owner, property_id, inspection_id)?;
    pipeline
        .submit_edit(
            "inspection_update",
            inspection,
            doc,
            &[],
            Feedback::new(
                "Inspection saved",
                "Your changes were saved.",
                Redirect::To(Route::Inspection {
                    property_id: property_id.to_string(),
                    inspection_id: inspection_id.to_string(),
                }),
            ),
        )
        .await
}

/// Confirmed hard delete.
pub async fn delete<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
    inspection_id: &str,
) -> Result<(), SubmitError> {
    let doc = doc_ref(owner, property_id, inspection_id)?;
    let prompt = ConfirmPrompt::new(
        "Delete this inspection?",
        "This cannot be undone.",
        "Delete",
    );
    if !pipeline.confirm(&prompt) {
        return Err(SubmitError::Declined);
    }
    pipeline
        .execute(
            "inspection_delete",
            WriteAction::Delete(doc),
            Feedback::new("Inspection deleted", "", Redirect::Stay),
        )
        .await?;
    Ok(())
}
