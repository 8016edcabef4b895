#![allow(clippy::unwrap_used, clippy::expect_used)]

#[path = "util.rs"]
mod util;

use landlord_lib::error::codes;
use landlord_lib::model::contractor::Contractor;
use landlord_lib::mutation::ToastTone;
use landlord_lib::repo::contractors;

#[tokio::test]
async fn same_number_typed_differently_is_rejected() {
    let (store, ui, pipeline) = util::sqlite().await;
    let o = util::owner("o1");
    contractors::create(&pipeline, &o, Contractor::new("Ann", "Plumber", "07123 456789"))
        .await
        .unwrap();

    let err = contractors::create(&pipeline, &o, Contractor::new("Bob", "Electrician", "07123456789"))
        .await
        .unwrap_err();
    let app = err.app_error().expect("store-level rejection");
    assert_eq!(app.code(), codes::DUPLICATE_PHONE);
    assert_eq!(app.context().get("field").map(String::as_str), Some("phone"));

    let active = contractors::list_active(&store, &o).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].value.name, "Ann");
    assert_eq!(active[0].value.phone, "07123456789");
    assert_eq!(ui.toasts().last().map(|t| t.tone), Some(ToastTone::Error));
}

#[tokio::test]
async fn numbers_are_scoped_per_owner() {
    let (store, _ui, pipeline) = util::sqlite().await;
    let a = util::owner("a");
    let b = util::owner("b");
    contractors::create(&pipeline, &a, Contractor::new("Ann", "Plumber", "07123456789"))
        .await
        .unwrap();
    contractors::create(&pipeline, &b, Contractor::new("Ann", "Plumber", "07123456789"))
        .await
        .unwrap();
    assert_eq!(contractors::list_active(&store, &b).await.unwrap().len(), 1);
}

#[tokio::test]
async fn archived_contractor_frees_the_number() {
    let (store, ui, pipeline) = util::sqlite().await;
    let o = util::owner("o1");
    let ann = contractors::create(&pipeline, &o, Contractor::new("Ann", "Plumber", "07123456789"))
        .await
        .unwrap();
    ui.answer(&[true]);
    contractors::archive(&pipeline, &o, ann.id()).await.unwrap();

    contractors::create(&pipeline, &o, Contractor::new("Bob", "Plumber", "07123 456 789"))
        .await
        .unwrap();
    assert_eq!(contractors::list_active(&store, &o).await.unwrap().len(), 1);
    assert_eq!(contractors::list_archived(&store, &o).await.unwrap().len(), 1);
}
