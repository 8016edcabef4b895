use serde_json::Map;
use tracing::info;

use super::{fetch, fetch_all, located, properties, tenants};
use crate::locator::{self, Collection, DocRef};
use crate::model::checklist::Checklist;
use crate::mutation::{ConfirmPrompt, Feedback, MutationPipeline, Redirect, SubmitError, WriteAction};
use crate::route::Route;
use crate::session::OwnerId;
use crate::store::{Document, DocumentStore, Record};
use crate::{AppError, AppResult};

fn doc_ref(owner: &OwnerId, property_id: &str, checklist_id: &str) -> AppResult<DocRef> {
    located(
        locator::checklist(Some(owner), Some(property_id), Some(checklist_id)),
        "checklist",
        checklist_id,
    )
}

pub async fn list<S: DocumentStore>(
    store: &S,
    owner: &OwnerId,
    property_id: &str,
) -> AppResult<Vec<Record<Checklist>>> {
    let collection = located(
        locator::property_children(Some(owner), Some(property_id), Collection::Checklists),
        "property",
        property_id,
    )?;
    fetch_all(store, &collection.query()).await
}

pub async fn get<S: DocumentStore>(
    store: &S,
    owner: &OwnerId,
    property_id: &str,
    checklist_id: &str,
) -> AppResult<Option<Record<Checklist>>> {
    fetch(store, &doc_ref(owner, property_id, checklist_id)?).await
}

/// A checklist hangs off a property and names one of its tenants.
async fn ensure_parents<S: DocumentStore>(
    store: &S,
    owner: &OwnerId,
    property_id: &str,
    tenant_id: &str,
) -> AppResult<()> {
    let property_path = format!("owners/{owner}/properties/{property_id}");
    if properties::get(store, owner, property_id).await?.is_none() {
        return Err(AppError::not_found(property_path));
    }
    if tenants::get(store, owner, property_id, tenant_id).await?.is_none() {
        return Err(AppError::not_found(format!("{property_path}/tenants/{tenant_id}")));
    }
    Ok(())
}

fn incomplete_prompt(missing: &[String]) -> ConfirmPrompt {
    let shown: Vec<&str> = missing.iter().take(3).map(String::as_str).collect();
    let more = missing.len().saturating_sub(shown.len());
    let mut description = format!("Still unticked: {}", shown.join(", "));
    if more > 0 {
        description.push_str(&format!(" and {more} more"));
    }
    description.push_str(". Save anyway?");
    ConfirmPrompt::new("Checklist incomplete", description, "Save anyway")
}

/// Create (no id) or replace (id) a checklist. An incomplete checklist is saved
/// only if the owner confirms.
pub async fn save<S: DocumentStore>(
    pipeline: &MutationPipeline<S>,
    owner: &OwnerId,
    property_id: &str,
    checklist_id: Option<&str>,
    checklist: Checklist,
) -> Result<Document, SubmitError> {
    let action = match checklist_id {
        Some(id) => WriteAction::Set(doc_ref(owner, property_id, id)?, Map::new()),
        None => WriteAction::Create(
            located(
                locator::property_children(Some(owner), Some(property_id), Collection::Checklists),
                "property",
                property_id,
            )?,
            Map::new(),
        ),
    };
    let checklist = pipeline.validate("checklist_save", &action, checklist)?;
    if let Err(err) = ensure_parents(pipeline.store(), owner, property_id, &checklist.tenant_id).await {
        return Err(pipeline.fail("checklist_save", &action, err));
    }

    let missing = checklist.missing_required();
    if !missing.is_empty() && !pipeline.confirm(&incomplete_prompt(&missing)) {
        info!(
            target: "landlord",
            event = "checklist_save_declined",
            property_id,
            missing = missing.len()
        );
        return Err(SubmitError::Declined);
    }

    let route_property = property_id.to_string();
    pipeline
        .submit(
            "checklist_save",
            checklist,
            action,
            Feedback::new(
                "Checklist saved",
                if missing.is_empty() {
                    "All required items are ticked.".to_string()
                } else {
                    format!("{} required items still open.", missing.len())
                },
                Redirect::to_written(move |id| Route::Checklist {
                    property_id: route_property.clone(),
                    checklist_id: id.to_string(),
                }),
            ),
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use crate::model::checklist::REQUIRED_SECTIONS;
    use crate::model::property::{Address, Property, PropertyType};
    use crate::model::tenant::Tenant;
    use crate::mutation::{RecordingUi, UiPorts};
    use crate::store::{to_fields, MemoryStore};
    use crate::time::DateLike;

    async fn seed(store: &MemoryStore, owner: &OwnerId) {
        let property = Property::new(
            Address {
                line1: "1 High St".into(),
                city: "Leeds".into(),
                postcode: "LS6 2AB".into(),
                ..Address::default()
            },
            PropertyType::House,
            3,
            1,
        );
        let doc = locator::property(Some(owner), Some("p1")).unwrap();
        store.set(&doc, to_fields(&property).unwrap()).await.unwrap();
        let tenant = Tenant::new("Sam", DateLike::Text("2024-09-01".into()), 700.0);
        let doc = locator::tenant(Some(owner), Some("p1"), Some("t1")).unwrap();
        store.set(&doc, to_fields(&tenant).unwrap()).await.unwrap();
    }

    fn complete() -> Checklist {
        let mut checklist = Checklist::move_in("t1");
        for name in REQUIRED_SECTIONS {
            if let Some(section) = checklist.sections.get_mut(*name) {
                let items: Vec<String> = section.items().map(|(i, _)| i.to_string()).collect();
                for item in items {
                    section.set_item(&item, true);
                }
            }
        }
        checklist
    }

    #[tokio::test]
    async fn incomplete_checklist_asks_and_cancel_writes_nothing() {
        let store = MemoryStore::new();
        let ui = RecordingUi::new();
        let pipeline = MutationPipeline::new(store.clone(), UiPorts::recording(ui.clone()));
        let owner = OwnerId::parse("o1").unwrap();
        seed(&store, &owner).await;
        let seeded = store.write_count();

        let err = save(&pipeline, &owner, "p1", None, Checklist::move_in("t1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Declined));
        assert_eq!(ui.prompts().len(), 1);
        assert!(ui.prompts()[0].description.contains("and 4 more"));
        assert_eq!(store.write_count(), seeded);

        ui.answer(&[true]);
        let written = save(&pipeline, &owner, "p1", None, Checklist::move_in("t1"))
            .await
            .unwrap();
        assert_eq!(store.write_count(), seeded + 1);
        assert_eq!(
            ui.routes(),
            vec![Route::Checklist {
                property_id: "p1".into(),
                checklist_id: written.id().to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn complete_checklist_saves_without_asking_and_set_replaces() {
        let store = MemoryStore::new();
        let ui = RecordingUi::new();
        let pipeline = MutationPipeline::new(store.clone(), UiPorts::recording(ui.clone()));
        let owner = OwnerId::parse("o1").unwrap();
        seed(&store, &owner).await;

        let written = save(&pipeline, &owner, "p1", None, complete()).await.unwrap();
        assert!(ui.prompts().is_empty());

        let mut edited = complete();
        edited
            .sections
            .get_mut("keys")
            .unwrap()
            .set_notes("three sets");
        save(&pipeline, &owner, "p1", Some(written.id()), edited).await.unwrap();
        let stored = get(&store, &owner, "p1", written.id()).await.unwrap().unwrap();
        assert_eq!(stored.value.sections["keys"].notes(), Some("three sets"));
        assert_eq!(list(&store, &owner, "p1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_property_or_tenant_is_not_found_without_asking() {
        let store = MemoryStore::new();
        let ui = RecordingUi::new();
        let pipeline = MutationPipeline::new(store.clone(), UiPorts::recording(ui.clone()));
        let owner = OwnerId::parse("o1").unwrap();

        let err = save(&pipeline, &owner, "p1", None, complete()).await.unwrap_err();
        assert_eq!(err.app_error().map(AppError::code), Some(codes::NOT_FOUND));

        seed(&store, &owner).await;
        let seeded = store.write_count();
        let err = save(&pipeline, &owner, "p1", None, Checklist::move_in("t9"))
            .await
            .unwrap_err();
        let missing = err.app_error().unwrap();
        assert_eq!(missing.code(), codes::NOT_FOUND);
        assert_eq!(
            missing.context().get("path").map(String::as_str),
            Some("owners/o1/properties/p1/tenants/t9")
        );
        assert!(ui.prompts().is_empty());
        assert_eq!(store.write_count(), seeded);
    }
}
