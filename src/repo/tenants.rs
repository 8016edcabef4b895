//! Tenants live under their property. Writing an `Active` tenant flips the
//! property to `Occupied`; removing one leaves the property status alone.

use serde_json::Map;
use tracing::warn;

use super::{fetch, fetch_all, located, properties};
use crate::locator::{self, DocRef};
use crate::model::tenant::Tenant;
use crate::mutation::{
    ConfirmPrompt, Feedback, MutationPipeline, Redirect, SubmitError, WriteAction,
};
use crate::route::Route;
use crate::session::OwnerId;
use crate::store::{Document, DocumentStore, Record};
use crate::{AppError, AppResult};

fn doc_ref(owner: &OwnerId, property_id: &str, tenant_id: &str) -> AppResult<DocRef> {
    located(
        locator::tenant(Some(owner), Some(property_id), Some(tenant_id)),
        "tenant",
        tenant_id,
    )
}

pub async fn list<S: DocumentStore>(
    store: &S,
    owner: &OwnerId,
    property_id: &str,
) -> AppResult<Vec<Record<Tenant>>> {
    let collection = located(locator::tenants(Some(owner), Some(property_id)), "property", property_id)?;
    fetch_all(store, &collection.query()).await
}

pub async fn get<S: DocumentStore>(
    store: &S,
    owner: &OwnerId,
    property_id: &str,
    tenant_id: &str,
) -> AppResult<Option<Record<Tenant>>> {
    fetch(store, &doc_ref(owner, property_id, tenant_id)?).await
}

async fn occupy_if_active<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
    written: &Document,
) {
    let active = written
        .decode::<Tenant>()
        .map(|tenant| tenant.is_active())
        .unwrap_or(false);
    if !active {
        return;
    }
    // The tenant write already landed; a failed flip is surfaced by its own toast.
    if let Err(err) = properties::mark_occupied(pipeline, owner, property_id).await {
        warn!(
            target: "landlord",
            event = "property_occupancy_failed",
            property_id,
            tenant_id = written.id(),
            error = %err
        );
    }
}

/// Create a tenant on an existing property.
pub async fn assign<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
    tenant: Tenant,
) -> Result<Document, SubmitError> {
    let collection = located(locator::tenants(Some(owner), Some(property_id)), "property", property_id)?;
    let action = WriteAction::Create(collection, Map::new());
    match properties::get(pipeline.store(), owner, property_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            let path = format!("owners/{owner}/properties/{property_id}");
            return Err(pipeline.fail("tenant_assign", &action, AppError::not_found(path)));
        }
        Err(err) => return Err(pipeline.fail("tenant_assign", &action, err)),
    }

    let route_property = property_id.to_string();
    let written = pipeline
        .submit(
            "tenant_assign",
            tenant,
            action,
            Feedback::new(
                "Tenant added",
                "The tenancy has been recorded.",
                Redirect::to_written(move |id| Route::Tenant {
                    property_id: route_property.clone(),
                    tenant_id: id.to_string(),
                }),
            ),
        )
        .await?;
    occupy_if_active(pipeline, owner, property_id, &written).await;
    Ok(written)
}

pub async fn update<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
    tenant_id: &str,
    tenant: Tenant,
) -> Result<Document, SubmitError> {
    let doc = doc_ref(owner, property_id, tenant_id)?;
    let written = pipeline
        .submit_edit(
            "tenant_update",
            tenant,
            doc,
            &[],
            Feedback::new(
                "Tenant updated",
                "Your changes were saved.",
                Redirect::To(Route::Tenant {
                    property_id: property_id.to_string(),
                    tenant_id: tenant_id.to_string(),
                }),
            ),
        )
        .await?;
    occupy_if_active(pipeline, owner, property_id, &written).await;
    Ok(written)
}

/// Hard delete after confirmation. The property keeps whatever status it had.
pub async fn remove<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
    tenant_id: &str,
) -> Result<(), SubmitError> {
    let doc = doc_ref(owner, property_id, tenant_id)?;
    let prompt = ConfirmPrompt::new(
        "Remove this tenant?",
        "The tenant record will be deleted. The property status is not changed.",
        "Remove",
    );
    if !pipeline.confirm(&prompt) {
        return Err(SubmitError::Declined);
    }
    pipeline
        .execute(
            "tenant_remove",
            WriteAction::Delete(doc),
            Feedback::new(
                "Tenant removed",
                "",
                Redirect::To(Route::Property {
                    property_id: property_id.to_string(),
                }),
            ),
        )
        .await?;
    Ok(())
}
