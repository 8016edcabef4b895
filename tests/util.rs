#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::sync::Arc;

use landlord_lib::model::property::{Address, Property, PropertyType};
use landlord_lib::mutation::{MutationPipeline, RecordingUi, UiPorts};
use landlord_lib::{DocumentStore, MemoryStore, OwnerId, SqliteStore};

pub fn owner(id: &str) -> OwnerId {
    OwnerId::parse(id).expect("valid owner id")
}

pub fn pipeline_over<S: DocumentStore>(store: S) -> (Arc<RecordingUi>, MutationPipeline<S>) {
    let ui = RecordingUi::new();
    let pipeline = MutationPipeline::new(store, UiPorts::recording(ui.clone()));
    (ui, pipeline)
}

pub fn memory() -> (MemoryStore, Arc<RecordingUi>, MutationPipeline<MemoryStore>) {
    let store = MemoryStore::new();
    let (ui, pipeline) = pipeline_over(store.clone());
    (store, ui, pipeline)
}

pub async fn sqlite() -> (SqliteStore, Arc<RecordingUi>, MutationPipeline<SqliteStore>) {
    let store = SqliteStore::in_memory().await.expect("in-memory sqlite store");
    let (ui, pipeline) = pipeline_over(store.clone());
    (store, ui, pipeline)
}

pub fn sample_property(line1: &str) -> Property {
    Property::new(
        Address {
            line1: line1.into(),
            city: "Manchester".into(),
            postcode: "M1 4BT".into(),
            ..Address::default()
        },
        PropertyType::Flat,
        2,
        1,
    )
}
