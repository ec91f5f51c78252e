//! # Document Store Port
//!
//! Collections live in the account's database and are named
//! `{realm}.{logical}`; every operation takes the [`Namespace`] and the
//! logical collection name and lets the adapter resolve the rest.
//!
//! Single-document writes are atomic. Nothing else is.

use async_trait::async_trait;
use serde_json::Value;
use shared_types::Namespace;

use crate::document::Document;
use crate::errors::DatabaseError;
use crate::query::{Filter, IndexSpec, Update, UpdateResult};

/// Document database collaborator.
///
/// Production: a database driver adapter supplied by the host application.
/// Testing: [`InMemoryDocumentStore`](crate::InMemoryDocumentStore).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document, assigning `_id` if absent. Returns the `_id`.
    async fn insert_one(
        &self,
        namespace: &Namespace,
        collection: &str,
        document: Document,
    ) -> Result<Value, DatabaseError>;

    /// Ordered insert: stops at the first failure, keeping earlier inserts.
    async fn insert_many(
        &self,
        namespace: &Namespace,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<Value>, DatabaseError>;

    /// Update the first matching document, or create one when `upsert` is set.
    async fn update_one(
        &self,
        namespace: &Namespace,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<UpdateResult, DatabaseError>;

    async fn update_many(
        &self,
        namespace: &Namespace,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, DatabaseError>;

    /// Atomically update the first matching document and return it as it is
    /// after the update. `None` when nothing matched and `upsert` is unset.
    async fn find_one_and_update(
        &self,
        namespace: &Namespace,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<Option<Document>, DatabaseError>;

    async fn find(
        &self,
        namespace: &Namespace,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Document>, DatabaseError>;

    async fn find_one(
        &self,
        namespace: &Namespace,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, DatabaseError> {
        Ok(self
            .find(namespace, collection, filter)
            .await?
            .into_iter()
            .next())
    }

    /// Delete every matching document, returning how many were removed.
    async fn remove(
        &self,
        namespace: &Namespace,
        collection: &str,
        filter: &Filter,
    ) -> Result<u64, DatabaseError>;

    /// Declare an index. Re-declaring an identical index is a no-op.
    async fn create_index(
        &self,
        namespace: &Namespace,
        collection: &str,
        index: IndexSpec,
    ) -> Result<(), DatabaseError>;
}
