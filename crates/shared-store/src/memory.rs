//! # In-Memory Document Store
//!
//! Namespaced collections with `_id` and unique-index enforcement, upserts,
//! find-and-modify and an explicit stand-in for the server's expiry monitor
//! ([`InMemoryDocumentStore::purge_expired`]).

use std::collections::HashMap;
use std::iter;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use shared_types::Namespace;
use tracing::debug;
use uuid::Uuid;

use crate::document::{get_path, parse_date, Document, ID_FIELD};
use crate::errors::DatabaseError;
use crate::query::{Filter, IndexSpec, Update, UpdateResult};
use crate::store::DocumentStore;

static NULL: Value = Value::Null;

type CollectionKey = (String, String);

#[derive(Debug, Default)]
struct Collection {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

impl Collection {
    /// Enforce `_id` and every unique index. A missing field indexes as null.
    fn check_unique(
        &self,
        name: &str,
        candidate: &Document,
        skip: Option<usize>,
    ) -> Result<(), DatabaseError> {
        let id_index = IndexSpec {
            name: "_id_".to_string(),
            ..IndexSpec::unique(ID_FIELD)
        };
        let unique = iter::once(&id_index).chain(self.indexes.iter().filter(|i| i.unique));
        for index in unique {
            let key = get_path(candidate, &index.field).unwrap_or(&NULL);
            let clash = self
                .documents
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != skip)
                .any(|(_, d)| get_path(d, &index.field).unwrap_or(&NULL) == key);
            if clash {
                return Err(DatabaseError::DuplicateKey {
                    collection: name.to_string(),
                    index: index.name.clone(),
                    key: format!("{{ {}: {} }}", index.field, key),
                });
            }
        }
        Ok(())
    }

    fn insert(&mut self, name: &str, mut document: Document) -> Result<Value, DatabaseError> {
        if let Some(bad) = document.keys().find(|k| k.is_empty() || k.starts_with('$')) {
            return Err(DatabaseError::InvalidDocument(format!(
                "invalid field name {bad:?}"
            )));
        }
        let id = document
            .entry(ID_FIELD)
            .or_insert_with(|| Value::String(Uuid::new_v4().simple().to_string()))
            .clone();
        self.check_unique(name, &document, None)?;
        self.documents.push(document);
        Ok(id)
    }

    /// Shared body of the update family. The returned document is the last
    /// one written, as it is after the update.
    fn update(
        &mut self,
        name: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
        many: bool,
    ) -> Result<(UpdateResult, Option<Document>), DatabaseError> {
        update.validate()?;
        let now = Utc::now();
        let mut targets = self
            .documents
            .iter()
            .enumerate()
            .filter(|(_, d)| filter.matches(d))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        if !many {
            targets.truncate(1);
        }

        if targets.is_empty() {
            if !upsert {
                return Ok((UpdateResult::default(), None));
            }
            let mut document = filter.seed()?;
            update.apply(&mut document, now)?;
            let id = self.insert(name, document.clone())?;
            document.insert(ID_FIELD.to_string(), id.clone());
            return Ok((
                UpdateResult {
                    matched_count: 0,
                    modified_count: 0,
                    upserted_id: Some(id),
                },
                Some(document),
            ));
        }

        let mut result = UpdateResult::default();
        let mut last = None;
        for index in targets {
            let mut candidate = self.documents[index].clone();
            let changed = update.apply(&mut candidate, now)?;
            self.check_unique(name, &candidate, Some(index))?;
            result.matched_count += 1;
            if changed {
                result.modified_count += 1;
            }
            self.documents[index] = candidate.clone();
            last = Some(candidate);
        }
        Ok((result, last))
    }

    /// Remove documents older than an expiring index allows.
    fn purge(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.documents.len();
        let expiring: Vec<(String, std::time::Duration)> = self
            .indexes
            .iter()
            .filter_map(|i| i.expire_after.map(|after| (i.field.clone(), after)))
            .collect();
        for (field, after) in expiring {
            self.documents.retain(|d| {
                let expired = get_path(d, &field)
                    .and_then(parse_date)
                    .and_then(|at| (now - at).to_std().ok())
                    .is_some_and(|age| age >= after);
                !expired
            });
        }
        before - self.documents.len()
    }
}

/// In-memory implementation of the [`DocumentStore`] port.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<CollectionKey, Collection>>,
    failure: Mutex<Option<DatabaseError>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `error`.
    pub fn fail_with(&self, error: DatabaseError) {
        *self.failure.lock() = Some(error);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    /// Run the expiry monitor once, as of `now`. Returns documents removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let removed: usize = self
            .collections
            .write()
            .values_mut()
            .map(|c| c.purge(now))
            .sum();
        if removed > 0 {
            debug!(removed, "Purged expired documents");
        }
        removed
    }

    /// Number of documents in a collection.
    pub fn count(&self, namespace: &Namespace, collection: &str) -> usize {
        self.collections
            .read()
            .get(&key(namespace, collection))
            .map(|c| c.documents.len())
            .unwrap_or(0)
    }

    /// Indexes declared on a collection.
    pub fn indexes(&self, namespace: &Namespace, collection: &str) -> Vec<IndexSpec> {
        self.collections
            .read()
            .get(&key(namespace, collection))
            .map(|c| c.indexes.clone())
            .unwrap_or_default()
    }

    fn check_failure(&self) -> Result<(), DatabaseError> {
        match self.failure.lock().as_ref() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

fn key(namespace: &Namespace, collection: &str) -> CollectionKey {
    (namespace.account.clone(), namespace.collection(collection))
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert_one(
        &self,
        namespace: &Namespace,
        collection: &str,
        document: Document,
    ) -> Result<Value, DatabaseError> {
        self.check_failure()?;
        let key = key(namespace, collection);
        let mut collections = self.collections.write();
        let entry = collections.entry(key.clone()).or_default();
        entry.insert(&key.1, document)
    }

    async fn insert_many(
        &self,
        namespace: &Namespace,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<Value>, DatabaseError> {
        self.check_failure()?;
        let key = key(namespace, collection);
        let mut collections = self.collections.write();
        let entry = collections.entry(key.clone()).or_default();
        documents
            .into_iter()
            .map(|document| entry.insert(&key.1, document))
            .collect()
    }

    async fn update_one(
        &self,
        namespace: &Namespace,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<UpdateResult, DatabaseError> {
        self.check_failure()?;
        let key = key(namespace, collection);
        let mut collections = self.collections.write();
        let entry = collections.entry(key.clone()).or_default();
        entry
            .update(&key.1, filter, update, upsert, false)
            .map(|(result, _)| result)
    }

    async fn update_many(
        &self,
        namespace: &Namespace,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult, DatabaseError> {
        self.check_failure()?;
        let key = key(namespace, collection);
        let mut collections = self.collections.write();
        let entry = collections.entry(key.clone()).or_default();
        entry
            .update(&key.1, filter, update, false, true)
            .map(|(result, _)| result)
    }

    async fn find_one_and_update(
        &self,
        namespace: &Namespace,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<Option<Document>, DatabaseError> {
        self.check_failure()?;
        let key = key(namespace, collection);
        let mut collections = self.collections.write();
        let entry = collections.entry(key.clone()).or_default();
        entry
            .update(&key.1, filter, update, upsert, false)
            .map(|(_, document)| document)
    }

    async fn find(
        &self,
        namespace: &Namespace,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Document>, DatabaseError> {
        self.check_failure()?;
        Ok(self
            .collections
            .read()
            .get(&key(namespace, collection))
            .map(|c| {
                c.documents
                    .iter()
                    .filter(|d| filter.matches(d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn remove(
        &self,
        namespace: &Namespace,
        collection: &str,
        filter: &Filter,
    ) -> Result<u64, DatabaseError> {
        self.check_failure()?;
        let mut collections = self.collections.write();
        let Some(entry) = collections.get_mut(&key(namespace, collection)) else {
            return Ok(0);
        };
        let before = entry.documents.len();
        entry.documents.retain(|d| !filter.matches(d));
        Ok((before - entry.documents.len()) as u64)
    }

    async fn create_index(
        &self,
        namespace: &Namespace,
        collection: &str,
        index: IndexSpec,
    ) -> Result<(), DatabaseError> {
        self.check_failure()?;
        let key = key(namespace, collection);
        let mut collections = self.collections.write();
        let entry = collections.entry(key.clone()).or_default();

        if let Some(existing) = entry.indexes.iter().find(|i| i.name == index.name) {
            if *existing == index {
                return Ok(());
            }
            return Err(DatabaseError::Server {
                code: 85,
                message: format!("index {} already exists with different options", index.name),
            });
        }

        if index.unique {
            let mut seen = Vec::new();
            for document in &entry.documents {
                let value = get_path(document, &index.field).unwrap_or(&NULL);
                if seen.contains(&value) {
                    return Err(DatabaseError::DuplicateKey {
                        collection: key.1.clone(),
                        index: index.name.clone(),
                        key: format!("{{ {}: {} }}", index.field, value),
                    });
                }
                seen.push(value);
            }
        }
        debug!(collection = %key.1, index = %index.name, "Index created");
        entry.indexes.push(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::date_value;
    use serde_json::json;
    use std::time::Duration;

    fn ns() -> Namespace {
        Namespace::new("acme", "eu")
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_rejects_duplicates() {
        let store = InMemoryDocumentStore::new();
        let id = store.insert_one(&ns(), "events", doc(json!({ "a": 1 }))).await.unwrap();
        assert!(id.is_string());

        store
            .insert_one(&ns(), "locks", doc(json!({ "_id": "job" })))
            .await
            .unwrap();
        let err = store
            .insert_one(&ns(), "locks", doc(json!({ "_id": "job" })))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = InMemoryDocumentStore::new();
        let other = Namespace::new("acme", "us");
        store.insert_one(&ns(), "scopes", doc(json!({ "k": 1 }))).await.unwrap();
        assert_eq!(store.count(&ns(), "scopes"), 1);
        assert_eq!(store.count(&other, "scopes"), 0);
        assert!(store.find(&other, "scopes", &Filter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_seeds_from_filter() {
        let store = InMemoryDocumentStore::new();
        let filter = Filter::eq("_scopeId", "s1");
        let result = store
            .update_one(&ns(), "scopes", &filter, &Update::new().set("k", "v"), true)
            .await
            .unwrap();
        assert!(result.upserted_id.is_some());

        let found = store.find_one(&ns(), "scopes", &filter).await.unwrap().unwrap();
        assert_eq!(found["k"], json!("v"));
        assert_eq!(found["_scopeId"], json!("s1"));

        let again = store
            .update_one(&ns(), "scopes", &filter, &Update::new().set("k", "w"), true)
            .await
            .unwrap();
        assert_eq!(again.matched_count, 1);
        assert_eq!(again.modified_count, 1);
        assert_eq!(store.count(&ns(), "scopes"), 1);
    }

    #[tokio::test]
    async fn test_update_without_upsert_matches_nothing() {
        let store = InMemoryDocumentStore::new();
        let result = store
            .update_one(&ns(), "scopes", &Filter::eq("_scopeId", "x"), &Update::new().set("k", 1), false)
            .await
            .unwrap();
        assert_eq!(result, UpdateResult::default());
        assert_eq!(store.count(&ns(), "scopes"), 0);
    }

    #[tokio::test]
    async fn test_find_one_and_update_returns_after() {
        let store = InMemoryDocumentStore::new();
        store
            .insert_one(&ns(), "scopes", doc(json!({ "_scopeId": "s", "n": 1 })))
            .await
            .unwrap();
        let after = store
            .find_one_and_update(
                &ns(),
                "scopes",
                &Filter::eq("_scopeId", "s"),
                &Update::new().current_date("_seen"),
                false,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after["n"], json!(1));
        assert!(parse_date(&after["_seen"]).is_some());

        let none = store
            .find_one_and_update(
                &ns(),
                "scopes",
                &Filter::eq("_scopeId", "missing"),
                &Update::new().current_date("_seen"),
                false,
            )
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_unique_index_enforced_on_insert_and_update() {
        let store = InMemoryDocumentStore::new();
        store
            .create_index(&ns(), "scopes", IndexSpec::unique("_scopeId"))
            .await
            .unwrap();
        // Re-declaring is a no-op.
        store
            .create_index(&ns(), "scopes", IndexSpec::unique("_scopeId"))
            .await
            .unwrap();

        store.insert_one(&ns(), "scopes", doc(json!({ "_scopeId": "a" }))).await.unwrap();
        store.insert_one(&ns(), "scopes", doc(json!({ "_scopeId": "b" }))).await.unwrap();
        assert!(store
            .insert_one(&ns(), "scopes", doc(json!({ "_scopeId": "a" })))
            .await
            .unwrap_err()
            .is_duplicate_key());

        let err = store
            .update_one(&ns(), "scopes", &Filter::eq("_scopeId", "b"), &Update::new().set("_scopeId", "a"), false)
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());
    }

    #[tokio::test]
    async fn test_insert_many_is_ordered() {
        let store = InMemoryDocumentStore::new();
        let docs = vec![
            doc(json!({ "_id": 1 })),
            doc(json!({ "_id": 1 })),
            doc(json!({ "_id": 2 })),
        ];
        assert!(store.insert_many(&ns(), "events", docs).await.is_err());
        assert_eq!(store.count(&ns(), "events"), 1);
    }

    #[tokio::test]
    async fn test_remove_and_update_many() {
        let store = InMemoryDocumentStore::new();
        for i in 0..3 {
            store
                .insert_one(&ns(), "c", doc(json!({ "group": "g", "i": i })))
                .await
                .unwrap();
        }
        let result = store
            .update_many(&ns(), "c", &Filter::eq("group", "g"), &Update::new().set("seen", true))
            .await
            .unwrap();
        assert_eq!(result.modified_count, 3);
        assert_eq!(store.remove(&ns(), "c", &Filter::eq("i", 1)).await.unwrap(), 1);
        assert_eq!(store.remove(&ns(), "missing", &Filter::all()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = InMemoryDocumentStore::new();
        store
            .create_index(&ns(), "scopes", IndexSpec::expiring("_touched", Duration::from_secs(60)))
            .await
            .unwrap();
        let now = Utc::now();
        let old = now - chrono::Duration::seconds(120);
        store
            .insert_one(&ns(), "scopes", doc(json!({ "_touched": date_value(old) })))
            .await
            .unwrap();
        store
            .insert_one(&ns(), "scopes", doc(json!({ "_touched": date_value(now) })))
            .await
            .unwrap();
        store.insert_one(&ns(), "scopes", doc(json!({ "untracked": true }))).await.unwrap();

        assert_eq!(store.purge_expired(now), 1);
        assert_eq!(store.count(&ns(), "scopes"), 2);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = InMemoryDocumentStore::new();
        store.fail_with(DatabaseError::Connection("down".into()));
        assert!(store.find(&ns(), "c", &Filter::all()).await.is_err());
        store.clear_failure();
        assert!(store.find(&ns(), "c", &Filter::all()).await.is_ok());
    }
}
