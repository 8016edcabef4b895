use serde_json::{Map, Value};

use super::{fetch_all, located, newest_first};
use crate::locator::{self, Collection, CollectionRef};
use crate::model::maintenance::{MaintenanceLog, MaintenanceStatus};
use crate::mutation::{Feedback, MutationPipeline, Redirect, SubmitError, WriteAction};
use crate::route::Route;
use crate::session::OwnerId;
use crate::store::{Document, DocumentStore, Record};
use crate::{AppError, AppResult};

fn logs(owner: &OwnerId, property_id: &str) -> AppResult<CollectionRef> {
    located(
        locator::property_children(Some(owner), Some(property_id), Collection::MaintenanceLogs),
        "property",
        property_id,
    )
}

/// Most recently reported first.
pub async fn list<S: DocumentStore>(
    store: &S,
    owner: &OwnerId,
    property_id: &str,
) -> AppResult<Vec<Record<MaintenanceLog>>> {
    let mut logged: Vec<Record<MaintenanceLog>> = fetch_all(store, &logs(owner, property_id)?.query()).await?;
    newest_first(&mut logged, |log| &log.reported_date);
    Ok(logged)
}

/// Logs still needing attention, for dashboard badges.
pub async fn open_maintenance_count<S: DocumentStore>(
    store: &S,
    owner: &OwnerId,
    property_id: &str,
) -> AppResult<usize> {
    let open: Vec<Value> = MaintenanceStatus::ALL
        .iter()
        .filter(|status| status.is_open())
        .map(|status| Value::from(status.as_str()))
        .collect();
    let query = logs(owner, property_id)?.query().where_in("status", open);
    Ok(store.query(&query).await?.len())
}

pub async fn create<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
    log: MaintenanceLog,
) -> Result<Document, SubmitError> {
    pipeline
        .submit(
            "maintenance_create",
            log,
            WriteAction::Create(logs(owner, property_id)?, Map::new()),
            Feedback::new(
                "Issue logged",
                "The maintenance issue was recorded.",
                Redirect::To(Route::Property {
                    property_id: property_id.to_string(),
                }),
            ),
        )
        .await
}

pub async fn set_status<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
    log_id: &str,
    status: MaintenanceStatus,
) -> Result<Document, SubmitError> {
    let doc = located(logs(owner, property_id)?.doc(log_id), "maintenance log", log_id)?;
    let mut patch = Map::new();
    patch.insert("status".into(), Value::from(status.as_str()));
    let written = pipeline
        .execute(
            "maintenance_status",
            WriteAction::Update(doc, patch),
            Feedback::new("Status updated", format!("Issue is now {}.", status.as_str()), Redirect::Stay),
        )
        .await?;
    written.ok_or_else(|| SubmitError::Rejected(AppError::not_found(log_id)))
}
