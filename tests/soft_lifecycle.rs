#![allow(clippy::unwrap_used, clippy::expect_used)]

#[path = "util.rs"]
mod util;

use std::sync::Arc;

use landlord_lib::binding::LiveBinding;
use landlord_lib::lifecycle::{self, LifecycleError};
use landlord_lib::locator::{self, Target};
use landlord_lib::model::contractor::Contractor;
use landlord_lib::model::property::{Property, PropertyStatus};
use landlord_lib::mutation::{MutationPipeline, RecordingUi};
use landlord_lib::repo::{contractors, properties};
use landlord_lib::route::Route;
use landlord_lib::store::Record;
use landlord_lib::{DocumentStore, OwnerId};

type Listing<S> = LiveBinding<S, Vec<Record<Property>>>;

async fn listings<S: DocumentStore + Clone>(store: &S, owner: &OwnerId) -> (Listing<S>, Listing<S>) {
    let collection = locator::properties(Some(owner)).unwrap();
    let mut active = Listing::<S>::list(store.clone());
    let mut archived = Listing::<S>::list(store.clone());
    active
        .set_target(Some(Target::Query(lifecycle::default_listing::<PropertyStatus>(&collection))))
        .await;
    archived
        .set_target(Some(Target::Query(lifecycle::archive_listing::<PropertyStatus>(&collection))))
        .await;
    (active, archived)
}

fn rows<S: DocumentStore>(binding: &Listing<S>) -> Vec<Record<Property>> {
    binding.state().data.unwrap_or_default()
}

async fn archive_round_trip<S: DocumentStore + Clone>(
    store: S,
    ui: Arc<RecordingUi>,
    pipeline: MutationPipeline<S>,
) {
    let o = util::owner("o1");
    let written = properties::create(&pipeline, &o, util::sample_property("1 Canal St"))
        .await
        .unwrap();
    properties::set_status(&pipeline, &o, written.id(), PropertyStatus::UnderMaintenance)
        .await
        .unwrap();
    let (active, archived) = listings(&store, &o).await;
    assert_eq!(rows(&active).len(), 1);
    assert!(rows(&archived).is_empty());

    ui.answer(&[true]);
    properties::archive(&pipeline, &o, written.id()).await.unwrap();
    assert!(rows(&active).is_empty());
    let gone = rows(&archived);
    assert_eq!(gone.len(), 1);
    assert_eq!(gone[0].value.status, PropertyStatus::Deleted);
    assert_eq!(gone[0].value.status_before_archive, Some(PropertyStatus::UnderMaintenance));
    assert_eq!(ui.routes().last(), Some(&Route::Properties));

    properties::restore(&pipeline, &o, written.id()).await.unwrap();
    let back = rows(&active);
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].value.status, PropertyStatus::UnderMaintenance);
    assert!(back[0].value.status_before_archive.is_none());
    assert!(rows(&archived).is_empty());
}

#[tokio::test]
async fn archive_and_restore_move_between_listings_in_memory() {
    let (store, ui, pipeline) = util::memory();
    archive_round_trip(store, ui, pipeline).await;
}

#[tokio::test]
async fn archive_and_restore_move_between_listings_in_sqlite() {
    let (store, ui, pipeline) = util::sqlite().await;
    archive_round_trip(store, ui, pipeline).await;
}

#[tokio::test]
async fn declined_archive_writes_nothing() {
    let (store, ui, pipeline) = util::memory();
    let o = util::owner("o1");
    let written = properties::create(&pipeline, &o, util::sample_property("2 Canal St"))
        .await
        .unwrap();
    let writes = store.write_count();

    let err = properties::archive(&pipeline, &o, written.id()).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Declined));
    assert_eq!(store.write_count(), writes);
    assert_eq!(ui.prompts().len(), 1);
}

#[tokio::test]
async fn purge_needs_its_own_confirmation() {
    let (store, ui, pipeline) = util::memory();
    let o = util::owner("o1");
    let ann = contractors::create(&pipeline, &o, Contractor::new("Ann", "Gas engineer", "07700900123"))
        .await
        .unwrap();
    ui.answer(&[true]);
    contractors::archive(&pipeline, &o, ann.id()).await.unwrap();

    // Second prompt declined: nothing is removed.
    assert!(matches!(
        contractors::request_purge(&pipeline, &o, ann.id()).await,
        Err(LifecycleError::Declined)
    ));
    let doc = locator::contractor(Some(&o), Some(ann.id())).unwrap();
    assert!(store.get(&doc).await.unwrap().is_some());

    ui.answer(&[true]);
    let ticket = contractors::request_purge(&pipeline, &o, ann.id()).await.unwrap();
    contractors::purge(&pipeline, ticket).await.unwrap();
    assert!(store.get(&doc).await.unwrap().is_none());
    assert_eq!(ui.routes().last(), Some(&Route::ArchivedContractors));
    assert_eq!(
        ui.prompts().last().map(|p| p.title.as_str()),
        Some("Permanently delete this contractor?")
    );
    assert!(contractors::list_archived(&store, &o).await.unwrap().is_empty());
}

#[tokio::test]
async fn ticket_issued_before_a_restore_no_longer_purges() {
    let (store, ui, pipeline) = util::sqlite().await;
    let o = util::owner("o1");
    let ann = contractors::create(&pipeline, &o, Contractor::new("Ann", "Gas engineer", "07700900123"))
        .await
        .unwrap();
    ui.answer(&[true, true]);
    contractors::archive(&pipeline, &o, ann.id()).await.unwrap();
    let ticket = contractors::request_purge(&pipeline, &o, ann.id()).await.unwrap();
    contractors::restore(&pipeline, &o, ann.id()).await.unwrap();

    let err = contractors::purge(&pipeline, ticket).await.unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    let kept = contractors::get(&store, &o, ann.id()).await.unwrap().unwrap();
    assert_eq!(kept.value.name, "Ann");
    assert_eq!(contractors::list_active(&store, &o).await.unwrap().len(), 1);
}
