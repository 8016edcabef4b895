use std::path::Path;

use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use super::{
    ensure_no_undefined, stamp_create, stamp_update, ChangeFeed, Document, DocumentStore,
    Listener, Snapshot, SnapshotEvent, Subscription, CREATED_AT, UPDATED_AT,
};
use crate::db::{open_memory_pool, open_sqlite_pool};
use crate::error::codes;
use crate::id::new_uuid_v7;
use crate::locator::{CollectionRef, DocRef, Query, Target};
use crate::migrate::apply_migrations;
use crate::session::OwnerId;
use crate::time::now_ms;
use crate::{AppError, AppResult};

/// Document store persisted as JSON rows in SQLite.
///
/// Change notifications are local to this handle and its clones; another
/// process writing the same file is not observed.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    feed: ChangeFeed,
    principal: Option<OwnerId>,
}

impl SqliteStore {
    pub async fn open(db_path: &Path) -> AppResult<Self> {
        let pool = open_sqlite_pool(db_path).await?;
        Self::from_pool(pool).await
    }

    pub async fn in_memory() -> AppResult<Self> {
        let pool = open_memory_pool().await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> AppResult<Self> {
        apply_migrations(&pool).await?;
        Ok(Self {
            pool,
            feed: ChangeFeed::default(),
            principal: None,
        })
    }

    pub fn as_principal(&self, owner: OwnerId) -> Self {
        Self {
            pool: self.pool.clone(),
            feed: self.feed.clone(),
            principal: Some(owner),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn check_access(&self, owner: &OwnerId, path: &str) -> AppResult<()> {
        match &self.principal {
            Some(principal) if principal != owner => {
                warn!(
                    target: "landlord",
                    event = "store_access_denied",
                    principal = %principal,
                    path = %path
                );
                Err(AppError::permission_denied(path))
            }
            _ => Ok(()),
        }
    }

    async fn fetch_doc(&self, doc: &DocRef) -> AppResult<Option<Document>> {
        let row = sqlx::query("SELECT path, data FROM documents WHERE path = ?")
            .bind(doc.path())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_document).transpose()
    }

    async fn fetch_query(&self, query: &Query) -> AppResult<Vec<Document>> {
        let rows = sqlx::query("SELECT path, data FROM documents WHERE collection_path = ?")
            .bind(query.collection().path())
            .fetch_all(&self.pool)
            .await?;
        let mut docs = Vec::with_capacity(rows.len());
        for row in &rows {
            let doc = row_to_document(row)?;
            if query.matches(&doc.data) {
                docs.push(doc);
            }
        }
        Ok(query.finish(docs, |doc| (doc.id(), &doc.data)))
    }

    async fn snapshot_of(&self, target: &Target) -> AppResult<Snapshot> {
        Ok(match target {
            Target::Doc(doc) => Snapshot::Doc(self.fetch_doc(doc).await?),
            Target::Query(query) => Snapshot::Query(self.fetch_query(query).await?),
        })
    }

    async fn publish(&self, doc: &DocRef) {
        for (target, listener) in self.feed.affected(doc) {
            let event = match self.snapshot_of(&target).await {
                Ok(snapshot) => SnapshotEvent::Snapshot(snapshot),
                Err(err) => SnapshotEvent::Error(err),
            };
            listener(event);
        }
    }

    async fn write_full(&self, locator: &DocRef, mut data: Map<String, Value>) -> AppResult<Document> {
        let path = locator.path();
        self.check_access(locator.owner(), &path)?;
        ensure_no_undefined(&data, &path)?;
        stamp_create(&mut data);
        let created_at = data.get(CREATED_AT).and_then(Value::as_i64).unwrap_or_else(now_ms);
        let updated_at = data.get(UPDATED_AT).and_then(Value::as_i64).unwrap_or_else(now_ms);
        let body = serde_json::to_string(&data)?;

        sqlx::query(
            "INSERT INTO documents (path, collection_path, owner_id, doc_id, data, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(path) DO UPDATE SET data = excluded.data, \
               created_at = excluded.created_at, updated_at = excluded.updated_at",
        )
        .bind(&path)
        .bind(locator.collection().path())
        .bind(locator.owner().as_str())
        .bind(locator.id())
        .bind(&body)
        .bind(created_at)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;
        debug!(target: "landlord", event = "store_write", kind = "set", path = %path);

        Ok(Document {
            locator: locator.clone(),
            data,
        })
    }
}

fn row_to_document(row: &SqliteRow) -> AppResult<Document> {
    let path: String = row.try_get("path")?;
    let raw: String = row.try_get("data")?;
    let locator = DocRef::parse(&path).ok_or_else(|| {
        AppError::new(codes::INVALID_LOCATOR, "Stored document has an invalid path")
            .with_context("path", path.clone())
    })?;
    let data = match serde_json::from_str::<Value>(&raw)? {
        Value::Object(map) => map,
        _ => {
            return Err(AppError::new(codes::DECODE, "Stored document is not an object")
                .with_context("path", path))
        }
    };
    Ok(Document { locator, data })
}

impl DocumentStore for SqliteStore {
    async fn get(&self, doc: &DocRef) -> AppResult<Option<Document>> {
        self.check_access(doc.owner(), &doc.path())?;
        self.fetch_doc(doc).await
    }

    async fn query(&self, query: &Query) -> AppResult<Vec<Document>> {
        self.check_access(query.collection().owner(), &query.collection().path())?;
        self.fetch_query(query).await
    }

    async fn create(
        &self,
        collection: &CollectionRef,
        data: Map<String, Value>,
    ) -> AppResult<Document> {
        let locator = collection
            .doc(&new_uuid_v7())
            .ok_or_else(|| AppError::new("STORE/ID", "Could not allocate a document id"))?;
        let written = self.write_full(&locator, data).await?;
        self.publish(&locator).await;
        Ok(written)
    }

    async fn set(&self, doc: &DocRef, data: Map<String, Value>) -> AppResult<Document> {
        let written = self.write_full(doc, data).await?;
        self.publish(doc).await;
        Ok(written)
    }

    async fn update(&self, doc: &DocRef, mut patch: Map<String, Value>) -> AppResult<Document> {
        let path = doc.path();
        self.check_access(doc.owner(), &path)?;
        ensure_no_undefined(&patch, &path)?;
        stamp_update(&mut patch);

        let mut tx = self.pool.begin().await?;
        let raw: Option<String> = sqlx::query_scalar("SELECT data FROM documents WHERE path = ?")
            .bind(&path)
            .fetch_optional(&mut *tx)
            .await?;
        let mut data = match raw {
            Some(raw) => match serde_json::from_str::<Value>(&raw)? {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            None => return Err(AppError::not_found(path)),
        };
        for (key, value) in patch {
            data.insert(key, value);
        }
        let updated_at = data.get(UPDATED_AT).and_then(Value::as_i64).unwrap_or_else(now_ms);
        sqlx::query("UPDATE documents SET data = ?, updated_at = ? WHERE path = ?")
            .bind(serde_json::to_string(&data)?)
            .bind(updated_at)
            .bind(&path)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(target: "landlord", event = "store_write", kind = "update", path = %path);

        self.publish(doc).await;
        Ok(Document {
            locator: doc.clone(),
            data,
        })
    }

    async fn delete(&self, doc: &DocRef) -> AppResult<()> {
        let path = doc.path();
        self.check_access(doc.owner(), &path)?;
        sqlx::query("DELETE FROM documents WHERE path = ?")
            .bind(&path)
            .execute(&self.pool)
            .await?;
        debug!(target: "landlord", event = "store_write", kind = "delete", path = %path);
        self.publish(doc).await;
        Ok(())
    }

    async fn subscribe(&self, target: &Target, listener: Listener) -> AppResult<Subscription> {
        if let Err(err) = self.check_access(target.owner(), &target.path()) {
            listener(SnapshotEvent::Error(err.clone()));
            return Err(err);
        }
        let initial = self.snapshot_of(target).await?;
        let subscription = self.feed.register(target.clone(), listener.clone());
        listener(SnapshotEvent::Snapshot(initial));
        Ok(subscription)
    }

    fn active_subscriptions(&self) -> usize {
        self.feed.len()
    }
}
