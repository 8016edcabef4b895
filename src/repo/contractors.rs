//! Contractor directory with a duplicate-phone guard.
//!
//! The guard is a read followed by a write with nothing holding the two
//! together: two concurrent creates with the same phone can both pass.

use serde_json::Map;
use tracing::info;

use super::{fetch, fetch_all, located};
use crate::error::codes;
use crate::lifecycle::{self, LifecycleError, PurgeTicket, STATUS_BEFORE_ARCHIVE, STATUS_FIELD};
use crate::locator::{self, DocRef};
use crate::model::contractor::{Contractor, ContractorStatus};
use crate::mutation::{Feedback, MutationPipeline, Redirect, SubmitError, WriteAction};
use crate::route::Route;
use crate::session::OwnerId;
use crate::store::{Document, DocumentStore, Record};
use crate::{AppError, AppResult};

fn doc_ref(owner: &OwnerId, contractor_id: &str) -> AppResult<DocRef> {
    located(locator::contractor(Some(owner), Some(contractor_id)), "contractor", contractor_id)
}

pub async fn list_active<S: DocumentStore>(store: &S, owner: &OwnerId) -> AppResult<Vec<Record<Contractor>>> {
    let collection = located(locator::contractors(Some(owner)), "owner", owner.as_str())?;
    fetch_all(store, &lifecycle::default_listing::<ContractorStatus>(&collection)).await
}

pub async fn list_archived<S: DocumentStore>(
    store: &S,
    owner: &OwnerId,
) -> AppResult<Vec<Record<Contractor>>> {
    let collection = located(locator::contractors(Some(owner)), "owner", owner.as_str())?;
    fetch_all(store, &lifecycle::archive_listing::<ContractorStatus>(&collection)).await
}

pub async fn get<S: DocumentStore>(
    store: &S,
    owner: &OwnerId,
    contractor_id: &str,
) -> AppResult<Option<Record<Contractor>>> {
    fetch(store, &doc_ref(owner, contractor_id)?).await
}

/// Active contractors already using `phone` (normalized form).
pub async fn find_active_by_phone<S: DocumentStore>(
    store: &S,
    owner: &OwnerId,
    phone: &str,
) -> AppResult<Vec<Record<Contractor>>> {
    match locator::active_contractors_with_phone(Some(owner), phone) {
        Some(query) => fetch_all(store, &query).await,
        None => Ok(Vec::new()),
    }
}

async fn ensure_unique_phone<S: DocumentStore>(
    store: &S,
    owner: &OwnerId,
    phone: &str,
    except: Option<&str>,
) -> AppResult<()> {
    let clash = find_active_by_phone(store, owner, phone)
        .await?
        .into_iter()
        .find(|record| Some(record.id.as_str()) != except);
    match clash {
        None => Ok(()),
        Some(existing) => {
            info!(
                target: "landlord",
                event = "contractor_duplicate_phone",
                owner_id = %owner,
                existing_id = %existing.id
            );
            Err(AppError::new(
                codes::DUPLICATE_PHONE,
                format!("{} already uses this phone number.", existing.value.name),
            )
            .with_context("field", "phone")
            .with_context("existingId", existing.id))
        }
    }
}

/// Validate first so the duplicate query sees the normalized phone.
async fn checked<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    op: &'static str,
    owner: &OwnerId,
    contractor: Contractor,
    action: &WriteAction,
    except: Option<&str>,
) -> Result<Contractor, SubmitError> {
    let contractor = pipeline.validate(op, action, contractor)?;
    if let Err(err) = ensure_unique_phone(pipeline.store(), owner, &contractor.phone, except).await {
        return Err(pipeline.fail(op, action, err));
    }
    Ok(contractor)
}

pub async fn create<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    mut contractor: Contractor,
) -> Result<Document, SubmitError> {
    let collection = located(locator::contractors(Some(owner)), "owner", owner.as_str())?;
    let action = WriteAction::Create(collection, Map::new());
    contractor.status = ContractorStatus::Active;
    contractor.status_before_archive = None;
    let contractor = checked(pipeline, "contractor_create", owner, contractor, &action, None).await?;
    pipeline
        .submit(
            "contractor_create",
            contractor,
            action,
            Feedback::new(
                "Contractor added",
                "They now appear in your contractor list.",
                Redirect::to_written(|id| Route::Contractor {
                    contractor_id: id.to_string(),
                }),
            ),
        )
        .await
}

/// Edit contact details. Archive state stays with the lifecycle functions.
pub async fn update<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    contractor_id: &str,
    contractor: Contractor,
) -> Result<Document, SubmitError> {
    let doc = doc_ref(owner, contractor_id)?;
    let action = WriteAction::Set(doc.clone(), Map::new());
    let contractor = checked(
        pipeline,
        "contractor_update",
        owner,
        contractor,
        &action,
        Some(contractor_id),
    )
    .await?;
    pipeline
        .submit_edit(
            "contractor_update",
            contractor,
            doc,
            &[STATUS_FIELD, STATUS_BEFORE_ARCHIVE],
            Feedback::new(
                "Contractor updated",
                "Your changes were saved.",
                Redirect::To(Route::Contractor {
                    contractor_id: contractor_id.to_string(),
                }),
            ),
        )
        .await
}

pub async fn archive<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    contractor_id: &str,
) -> Result<Document, LifecycleError> {
    let doc = doc_ref(owner, contractor_id).map_err(SubmitError::from)?;
    lifecycle::archive::<S, ContractorStatus>(pipeline, &doc).await
}

pub async fn restore<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    contractor_id: &str,
) -> Result<Document, LifecycleError> {
    let doc = doc_ref(owner, contractor_id).map_err(SubmitError::from)?;
    lifecycle::restore::<S, ContractorStatus>(pipeline, &doc).await
}

pub async fn request_purge<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    contractor_id: &str,
) -> Result<PurgeTicket<ContractorStatus>, LifecycleError> {
    let doc = doc_ref(owner, contractor_id).map_err(SubmitError::from)?;
    lifecycle::request_purge::<S, ContractorStatus>(pipeline, &doc).await
}

pub async fn purge<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    ticket: PurgeTicket<ContractorStatus>,
) -> Result<(), LifecycleError> {
    lifecycle::purge::<S, ContractorStatus>(pipeline, ticket).await
}
