#![allow(clippy::unwrap_used, clippy::expect_used)]

#[path = "util.rs"]
mod util;

use landlord_lib::locator::{self, Collection};
use landlord_lib::model::inspection::{Inspection, InspectionKind};
use landlord_lib::model::maintenance::MaintenanceLog;
use landlord_lib::repo::{inspections, maintenance};
use landlord_lib::store::to_fields;
use landlord_lib::time::DateLike;
use landlord_lib::DocumentStore;

fn mixed_dates() -> [DateLike; 3] {
    [
        DateLike::Text("2023-01-01".into()),
        DateLike::Millis(1_714_521_600_000),
        DateLike::Timestamp {
            seconds: 1_700_000_000,
            nanoseconds: 0,
        },
    ]
}

#[tokio::test]
async fn inspections_sort_by_instant_with_unreadable_dates_last() {
    let (store, _ui, pipeline) = util::sqlite().await;
    let o = util::owner("o1");
    let legacy = Inspection::scheduled(InspectionKind::Hmo, DateLike::Text("tbc".into()));
    let doc = locator::inspection(Some(&o), Some("p1"), Some("legacy")).unwrap();
    store.set(&doc, to_fields(&legacy).unwrap()).await.unwrap();
    for date in mixed_dates() {
        inspections::create(&pipeline, &o, "p1", InspectionKind::SingleLet, date, None)
            .await
            .unwrap();
    }

    let listed = inspections::list(&store, &o, "p1").await.unwrap();
    let dates: Vec<String> = listed
        .iter()
        .map(|r| r.value.scheduled_date.normalize().display_day())
        .collect();
    assert_eq!(dates, vec!["01/05/2024", "14/11/2023", "01/01/2023", "n/a"]);
    assert_eq!(listed[3].id, "legacy");
}

#[tokio::test]
async fn maintenance_sorts_by_instant_with_unreadable_dates_last() {
    let (store, _ui, pipeline) = util::sqlite().await;
    let o = util::owner("o1");
    let legacy = MaintenanceLog::open("Fence", DateLike::Text("".into()));
    let doc = locator::property_children(Some(&o), Some("p1"), Collection::MaintenanceLogs)
        .and_then(|logs| logs.doc("legacy"))
        .unwrap();
    store.set(&doc, to_fields(&legacy).unwrap()).await.unwrap();
    for (title, date) in ["Damp", "Boiler", "Gutter"].into_iter().zip(mixed_dates()) {
        maintenance::create(&pipeline, &o, "p1", MaintenanceLog::open(title, date))
            .await
            .unwrap();
    }

    let titles: Vec<String> = maintenance::list(&store, &o, "p1")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.value.title)
        .collect();
    assert_eq!(titles, vec!["Boiler", "Gutter", "Damp", "Fence"]);
}
