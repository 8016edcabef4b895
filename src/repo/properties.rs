use serde_json::{Map, Value};
use tracing::info;

use super::{fetch, fetch_all, located};
use crate::error::codes;
use crate::lifecycle::{self, LifecycleError, PurgeTicket, STATUS_BEFORE_ARCHIVE, STATUS_FIELD};
use crate::locator::{self, DocRef};
use crate::model::property::{Property, PropertyStatus};
use crate::mutation::{Feedback, MutationPipeline, Redirect, SubmitError, WriteAction};
use crate::route::Route;
use crate::session::OwnerId;
use crate::store::{Document, DocumentStore, Record};
use crate::{AppError, AppResult};

fn doc_ref(owner: &OwnerId, property_id: &str) -> AppResult<DocRef> {
    located(locator::property(Some(owner), Some(property_id)), "property", property_id)
}

pub async fn list_active<S: DocumentStore>(store: &S, owner: &OwnerId) -> AppResult<Vec<Record<Property>>> {
    let collection = located(locator::properties(Some(owner)), "owner", owner.as_str())?;
    fetch_all(store, &lifecycle::default_listing::<PropertyStatus>(&collection)).await
}

pub async fn list_deleted<S: DocumentStore>(store: &S, owner: &OwnerId) -> AppResult<Vec<Record<Property>>> {
    let collection = located(locator::properties(Some(owner)), "owner", owner.as_str())?;
    fetch_all(store, &lifecycle::archive_listing::<PropertyStatus>(&collection)).await
}

pub async fn get<S: DocumentStore>(
    store: &S,
    owner: &OwnerId,
    property_id: &str,
) -> AppResult<Option<Record<Property>>> {
    fetch(store, &doc_ref(owner, property_id)?).await
}

/// Non-deleted properties, the number the billing plan caps.
pub async fn count_active<S: DocumentStore>(store: &S, owner: &OwnerId) -> AppResult<usize> {
    Ok(list_active(store, owner).await?.len())
}

async fn ensure_plan_allows<S: DocumentStore>(store: &S, owner: &OwnerId) -> AppResult<()> {
    let plan = super::profile::load(store, owner).await?.plan;
    let count = count_active(store, owner).await?;
    if plan.allows(count) {
        return Ok(());
    }
    let limit = plan.property_limit().unwrap_or(count);
    Err(AppError::new(
        codes::PLAN_LIMIT,
        format!(
            "Your {} plan allows {limit} properties. Upgrade to add more.",
            plan.as_str()
        ),
    )
    .with_context("plan", plan.as_str())
    .with_context("count", count.to_string()))
}

pub async fn create<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    mut property: Property,
) -> Result<Document, SubmitError> {
    let collection = located(locator::properties(Some(owner)), "owner", owner.as_str())?;
    let action = WriteAction::Create(collection, Map::new());
    if let Err(err) = ensure_plan_allows(pipeline.store(), owner).await {
        return Err(pipeline.fail("property_create", &action, err));
    }
    if property.status == PropertyStatus::Deleted {
        property.status = PropertyStatus::Vacant;
    }
    property.status_before_archive = None;

    pipeline
        .submit(
            "property_create",
            property,
            action,
            Feedback::new(
                "Property added",
                "The property is now in your portfolio.",
                Redirect::to_written(|id| Route::Property {
                    property_id: id.to_string(),
                }),
            ),
        )
        .await
}

/// Fields an edit form never owns. Status moves through [`set_status`],
/// tenant occupancy and the lifecycle functions; images through uploads.
const EDIT_KEEPS: [&str; 3] = [STATUS_FIELD, STATUS_BEFORE_ARCHIVE, "imageUrls"];

/// Edit the property's details. Whatever status the form carries is ignored,
/// and optional details left empty are cleared.
pub async fn update<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
    property: Property,
) -> Result<Document, SubmitError> {
    let doc = doc_ref(owner, property_id)?;
    pipeline
        .submit_edit(
            "property_update",
            property,
            doc,
            &EDIT_KEEPS,
            Feedback::new(
                "Property updated",
                "Your changes were saved.",
                Redirect::To(Route::Property {
                    property_id: property_id.to_string(),
                }),
            ),
        )
        .await
}

/// Manual status change between the live states.
pub async fn set_status<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
    status: PropertyStatus,
) -> Result<Document, SubmitError> {
    let doc = doc_ref(owner, property_id)?;
    let mut patch = Map::new();
    patch.insert("status".into(), Value::from(status.as_str()));
    let action = WriteAction::Update(doc, patch);
    if status == PropertyStatus::Deleted {
        let err = AppError::new(
            codes::LIFECYCLE_TRANSITION,
            "Use delete to move a property to the archive.",
        );
        return Err(pipeline.fail("property_status", &action, err));
    }
    let written = pipeline
        .execute(
            "property_status",
            action,
            Feedback::new("Status updated", format!("Property is now {status}."), Redirect::Stay),
        )
        .await?;
    written.ok_or_else(|| SubmitError::Rejected(AppError::not_found(property_id)))
}

/// Flip to `Occupied` after an active tenant was written. Never flips back.
pub(crate) async fn mark_occupied<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
) -> Result<(), SubmitError> {
    let current = get(pipeline.store(), owner, property_id).await?;
    let Some(current) = current else {
        return Err(SubmitError::Rejected(AppError::not_found(property_id)));
    };
    match current.value.status {
        PropertyStatus::Occupied => return Ok(()),
        PropertyStatus::Deleted => {
            info!(
                target: "landlord",
                event = "property_occupancy_skipped",
                property_id,
                reason = "deleted"
            );
            return Ok(());
        }
        PropertyStatus::Vacant | PropertyStatus::UnderMaintenance => {}
    }
    set_status(pipeline, owner, property_id, PropertyStatus::Occupied).await?;
    Ok(())
}

/// Append an uploaded image URL to `imageUrls`.
pub async fn add_image_url<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
    url: &str,
) -> Result<Document, SubmitError> {
    let current = get(pipeline.store(), owner, property_id)
        .await?
        .ok_or_else(|| SubmitError::Rejected(AppError::not_found(property_id)))?;
    let mut urls = current.value.image_urls;
    urls.push(url.to_string());

    let mut patch = Map::new();
    patch.insert(
        "imageUrls".into(),
        Value::Array(urls.into_iter().map(Value::String).collect()),
    );
    let written = pipeline
        .execute(
            "property_image_add",
            WriteAction::Update(doc_ref(owner, property_id)?, patch),
            Feedback::new("Image uploaded", "The photo was added to the property.", Redirect::Stay),
        )
        .await?;
    written.ok_or_else(|| SubmitError::Rejected(AppError::not_found(property_id)))
}

pub async fn archive<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
) -> Result<Document, LifecycleError> {
    let doc = doc_ref(owner, property_id).map_err(SubmitError::from)?;
    lifecycle::archive::<S, PropertyStatus>(pipeline, &doc).await
}

pub async fn restore<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
) -> Result<Document, LifecycleError> {
    let doc = doc_ref(owner, property_id).map_err(SubmitError::from)?;
    lifecycle::restore::<S, PropertyStatus>(pipeline, &doc).await
}

pub async fn request_purge<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
) -> Result<PurgeTicket<PropertyStatus>, LifecycleError> {
    let doc = doc_ref(owner, property_id).map_err(SubmitError::from)?;
    lifecycle::request_purge::<S, PropertyStatus>(pipeline, &doc).await
}

pub async fn purge<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    ticket: PurgeTicket<PropertyStatus>,
) -> Result<(), LifecycleError> {
    lifecycle::purge::<S, PropertyStatus>(pipeline, ticket).await
}
