use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::QueryAs;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres};
use tracing::{info, warn};

use super::store::{
    merge_changes, stamp_new, ChildUpdate, Collection, ConditionalDelete, Document, DocumentStore, Reference,
    StoreError,
};
use crate::config::StoreConfig;
use crate::filter::{Filter, SqlParam};

const SCHEMA: [&str; 2] = [
    r#"CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        seq BIGSERIAL,
        data JSONB NOT NULL,
        PRIMARY KEY (collection, id)
    )"#,
    "CREATE INDEX IF NOT EXISTS documents_collection_seq ON documents (collection, seq DESC)",
];

type DataQuery<'q> = QueryAs<'q, Postgres, (Json<Value>,), PgArguments>;

/// Postgres-backed store. All collections share one `documents` table
/// keyed by (collection, id) with the body in a JSONB column.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let database_url = config
            .database_url
            .as_deref()
            .ok_or(StoreError::InvalidDatabaseUrl)?;
        let url = url::Url::parse(database_url).map_err(|_| StoreError::InvalidDatabaseUrl)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url.as_str())
            .await?;

        info!(
            "Connected document store to {}:{}{}",
            url.host_str().unwrap_or("localhost"),
            url.port().unwrap_or(5432),
            url.path()
        );
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the documents table if it does not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Document store schema ready");
        Ok(())
    }
}

fn bind_params<'q>(mut query: DataQuery<'q>, params: Vec<SqlParam>) -> DataQuery<'q> {
    for param in params {
        query = match param {
            SqlParam::Text(text) => query.bind(text),
            SqlParam::Json(value) => query.bind(Json(value)),
        };
    }
    query
}

fn into_document(value: Value) -> Result<Document, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotAnObject),
    }
}

/// Lock waits that end in a deadlock or serialization failure surface as
/// conflicts rather than internal errors.
fn map_lock_error(err: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if matches!(db.code().as_deref(), Some("40001") | Some("40P01")) {
            warn!("Lock conflict on {}: {}", what, db.message());
            return StoreError::Conflict(what.to_string());
        }
    }
    StoreError::Sqlx(err)
}

/// Row-lock the document and write `changes` into it. `None` if absent.
async fn merge_locked(
    conn: &mut PgConnection,
    collection: Collection,
    id: &str,
    changes: Document,
) -> Result<Option<Document>, StoreError> {
    let current: Option<(Json<Value>,)> =
        sqlx::query_as("SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE")
            .bind(collection.name())
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_lock_error(e, collection.name()))?;
    let Some((Json(current),)) = current else {
        return Ok(None);
    };

    let mut doc = into_document(current)?;
    merge_changes(&mut doc, changes);
    sqlx::query("UPDATE documents SET data = $3 WHERE collection = $1 AND id = $2")
        .bind(collection.name())
        .bind(id)
        .bind(Json(&doc))
        .execute(&mut *conn)
        .await?;
    Ok(Some(doc))
}

/// Take a shared lock on a parent row. False if the parent is gone.
async fn share_parent(conn: &mut PgConnection, parent: Collection, parent_id: &str) -> Result<bool, StoreError> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT id FROM documents WHERE collection = $1 AND id = $2 FOR SHARE")
            .bind(parent.name())
            .bind(parent_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| map_lock_error(e, parent.name()))?;
    Ok(row.is_some())
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn find_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let row: Option<(Json<Value>,)> =
            sqlx::query_as("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection.name())
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(Json(data),)| into_document(data)).transpose()
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let predicate = filter.to_sql(1);
        let sql = format!(
            "SELECT data FROM documents WHERE collection = $1 AND {} ORDER BY seq DESC",
            predicate.query
        );
        let query = sqlx::query_as(&sql).bind(collection.name());
        let rows = bind_params(query, predicate.params)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|(Json(data),)| into_document(data))
            .collect()
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let predicate = filter.to_sql(1);
        let sql = format!(
            "SELECT COUNT(*) FROM documents WHERE collection = $1 AND {}",
            predicate.query
        );
        let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(collection.name());
        for param in predicate.params {
            query = match param {
                SqlParam::Text(text) => query.bind(text),
                SqlParam::Json(value) => query.bind(Json(value)),
            };
        }
        let count = query.fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn insert(&self, collection: Collection, data: Document) -> Result<Document, StoreError> {
        let (id, doc) = stamp_new(data);
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection.name())
            .bind(&id)
            .bind(Json(&doc))
            .execute(&self.pool)
            .await?;
        Ok(doc)
    }

    async fn insert_child(
        &self,
        collection: Collection,
        data: Document,
        parent: Collection,
        parent_id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Shared row lock: a concurrent delete_unreferenced on the parent
        // waits for this insert to commit and then sees the new child.
        if !share_parent(&mut *tx, parent, parent_id).await? {
            tx.rollback().await?;
            return Ok(None);
        }

        let (id, doc) = stamp_new(data);
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection.name())
            .bind(&id)
            .bind(Json(&doc))
            .execute(&mut *tx)
            .await?;
        tx.commit().await.map_err(|e| map_lock_error(e, collection.name()))?;
        Ok(Some(doc))
    }

    async fn update_one(
        &self,
        collection: Collection,
        id: &str,
        changes: Document,
    ) -> Result<Option<Document>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let doc = merge_locked(&mut *tx, collection, id, changes).await?;
        tx.commit().await?;
        Ok(doc)
    }

    async fn update_child(
        &self,
        collection: Collection,
        id: &str,
        changes: Document,
        parent: Collection,
        parent_id: &str,
    ) -> Result<ChildUpdate, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Parent first, in the same order as insert_child.
        if !share_parent(&mut *tx, parent, parent_id).await? {
            tx.rollback().await?;
            return Ok(ChildUpdate::ParentMissing);
        }
        let Some(doc) = merge_locked(&mut *tx, collection, id, changes).await? else {
            tx.rollback().await?;
            return Ok(ChildUpdate::NotFound);
        };
        tx.commit().await.map_err(|e| map_lock_error(e, collection.name()))?;
        Ok(ChildUpdate::Updated(doc))
    }

    async fn insert_first(&self, collection: Collection, data: Document) -> Result<Option<Document>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent first inserts into the same collection.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1)::bigint)")
            .bind(collection.name())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_lock_error(e, collection.name()))?;

        let present: Option<(String,)> = sqlx::query_as("SELECT id FROM documents WHERE collection = $1 LIMIT 1")
            .bind(collection.name())
            .fetch_optional(&mut *tx)
            .await?;
        if present.is_some() {
            tx.rollback().await?;
            return Ok(None);
        }

        let (id, doc) = stamp_new(data);
        sqlx::query("INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection.name())
            .bind(&id)
            .bind(Json(&doc))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(doc))
    }

    async fn delete_one(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let row: Option<(Json<Value>,)> =
            sqlx::query_as("DELETE FROM documents WHERE collection = $1 AND id = $2 RETURNING data")
                .bind(collection.name())
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(Json(data),)| into_document(data)).transpose()
    }

    async fn delete_unreferenced(
        &self,
        collection: Collection,
        id: &str,
        reference: Reference,
    ) -> Result<ConditionalDelete, StoreError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<(String,)> =
            sqlx::query_as("SELECT id FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE")
                .bind(collection.name())
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_lock_error(e, collection.name()))?;
        if locked.is_none() {
            tx.rollback().await?;
            return Ok(ConditionalDelete::NotFound);
        }

        let dependents: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM documents WHERE collection = $1 AND data ->> $2 = $3",
        )
        .bind(reference.collection.name())
        .bind(reference.field)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if dependents > 0 {
            tx.rollback().await?;
            return Ok(ConditionalDelete::Referenced(dependents as u64));
        }

        let deleted: Option<(Json<Value>,)> =
            sqlx::query_as("DELETE FROM documents WHERE collection = $1 AND id = $2 RETURNING data")
                .bind(collection.name())
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        tx.commit().await.map_err(|e| map_lock_error(e, collection.name()))?;

        match deleted {
            Some((Json(data),)) => Ok(ConditionalDelete::Deleted(into_document(data)?)),
            None => Ok(ConditionalDelete::NotFound),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
