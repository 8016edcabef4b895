//! Per-entity read helpers and write flows. Every write goes through the
//! [`MutationPipeline`](crate::mutation::MutationPipeline); callers pass an
//! already resolved owner.

use std::cmp::Reverse;

use serde::de::DeserializeOwned;

use crate::error::codes;
use crate::locator::{DocRef, Query};
use crate::store::{decode_all, DocumentStore, Record};
use crate::time::DateLike;
use crate::{AppError, AppResult};

pub mod checklists;
pub mod contractors;
pub mod inspections;
pub mod maintenance;
pub mod profile;
pub mod properties;
pub mod tenants;

/// Turn an unbuildable locator into an error naming the offending input.
pub(crate) fn located<T>(value: Option<T>, what: &str, id: &str) -> AppResult<T> {
    value.ok_or_else(|| {
        AppError::new(codes::INVALID_LOCATOR, format!("Invalid {what} reference"))
            .with_context("id", id.to_string())
    })
}

pub(crate) async fn fetch<S, T>(store: &S, doc: &DocRef) -> AppResult<Option<Record<T>>>
where
    S: DocumentStore,
    T: DeserializeOwned,
{
    match store.get(doc).await? {
        Some(found) => Ok(Some(Record::from_document(&found)?)),
        None => Ok(None),
    }
}

pub(crate) async fn fetch_all<S, T>(store: &S, query: &Query) -> AppResult<Vec<Record<T>>>
where
    S: DocumentStore,
    T: DeserializeOwned,
{
    let docs = store.query(query).await?;
    decode_all(&docs)
}

/// Newest first by the normalized date, so text, millisecond and timestamp
/// representations interleave correctly. Unreadable dates go last.
pub(crate) fn newest_first<T>(records: &mut [Record<T>], date: impl Fn(&T) -> &DateLike) {
    records.sort_by_cached_key(|record| (Reverse(date(&record.value).normalize()), record.id.clone()));
}
