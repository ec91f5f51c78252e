//! # Scoped Locks
//!
//! A lock is a document `{_id: name, owner, acquiredAt}` in the realm's
//! `locks` collection. Acquiring inserts it; the unique `_id` makes a
//! second insert fail with a duplicate key, which means "already held".
//!
//! [`LockGuard`] releases explicitly through [`LockGuard::release`]. A guard
//! dropped without releasing, on any exit path, schedules the release on
//! the current runtime.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use platform_telemetry::{log_event, metric_inc, LOCK_ACQUISITIONS};
use serde_json::Value;
use shared_store::{date_value, Document, DocumentStore, Filter, ID_FIELD};
use shared_types::Namespace;
use tokio::runtime::Handle;
use tracing::{info_span, Instrument, Span};
use uuid::Uuid;

use crate::domain::errors::LockError;

const COMPONENT: &str = "locks";

pub const OWNER_FIELD: &str = "owner";
pub const ACQUIRED_AT_FIELD: &str = "acquiredAt";

/// Named locks in one namespace, all acquired under one owner id.
pub struct ScopeLock {
    store: Arc<dyn DocumentStore>,
    namespace: Namespace,
    collection: String,
    owner: String,
    span: Span,
}

impl ScopeLock {
    pub fn new(store: Arc<dyn DocumentStore>, namespace: Namespace, collection: String) -> Self {
        Self {
            store,
            namespace,
            collection,
            owner: Uuid::new_v4().to_string(),
            span: info_span!("locks"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Take the lock or fail with [`LockError::AlreadyHeld`]. Never waits.
    pub async fn acquire(&self, name: &str) -> Result<LockGuard, LockError> {
        async {
            let mut document = Document::new();
            document.insert(ID_FIELD.to_string(), Value::from(name));
            document.insert(OWNER_FIELD.to_string(), Value::from(self.owner.as_str()));
            document.insert(ACQUIRED_AT_FIELD.to_string(), date_value(Utc::now()));
            match self
                .store
                .insert_one(&self.namespace, &self.collection, document)
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_duplicate_key() => {
                    metric_inc!(LOCK_ACQUISITIONS, &["contended"]);
                    log_event!(debug, COMPONENT, "Lock already held", lock = %name);
                    return Err(LockError::AlreadyHeld {
                        name: name.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
            metric_inc!(LOCK_ACQUISITIONS, &["acquired"]);
            log_event!(debug, COMPONENT, "Lock acquired", lock = %name, owner = %self.owner);
            Ok::<_, LockError>(LockGuard {
                release: Some(Release {
                    store: Arc::clone(&self.store),
                    namespace: self.namespace.clone(),
                    collection: self.collection.clone(),
                    name: name.to_string(),
                    owner: self.owner.clone(),
                }),
                span: self.span.clone(),
            })
        }
        .instrument(self.span.clone())
        .await
    }

    /// Run `work` while holding the lock. The lock is released whether
    /// `work` completes, panics or is cancelled.
    pub async fn with_lock<F, T>(&self, name: &str, work: F) -> Result<T, LockError>
    where
        F: Future<Output = T>,
    {
        let guard = self.acquire(name).await?;
        let output = work.await;
        guard.release().await?;
        Ok(output)
    }
}

/// Everything needed to delete the lock document.
struct Release {
    store: Arc<dyn DocumentStore>,
    namespace: Namespace,
    collection: String,
    name: String,
    owner: String,
}

impl Release {
    async fn run(self) -> Result<(), LockError> {
        let filter = Filter::by_id(self.name.clone()).and(OWNER_FIELD, self.owner);
        let removed = self
            .store
            .remove(&self.namespace, &self.collection, &filter)
            .await?;
        if removed == 0 {
            log_event!(warn, COMPONENT, "Lock was no longer held", lock = %self.name);
        } else {
            log_event!(debug, COMPONENT, "Lock released", lock = %self.name);
        }
        Ok(())
    }
}

/// A held lock.
#[must_use = "dropping the guard releases the lock"]
pub struct LockGuard {
    release: Option<Release>,
    span: Span,
}

impl LockGuard {
    pub fn name(&self) -> &str {
        self.release.as_ref().map_or("", |r| r.name.as_str())
    }

    /// Release now and wait for the database to confirm.
    pub async fn release(mut self) -> Result<(), LockError> {
        match self.release.take() {
            Some(release) => release.run().instrument(self.span.clone()).await,
            None => Ok(()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(release) = self.release.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(runtime) => {
                let span = self.span.clone();
                runtime.spawn(
                    async move {
                        let name = release.name.clone();
                        if let Err(e) = release.run().await {
                            log_event!(
                                error,
                                COMPONENT,
                                "Deferred lock release failed",
                                lock = %name,
                                error = %e
                            );
                        }
                    }
                    .instrument(span),
                );
            }
            Err(_) => {
                log_event!(
                    error,
                    COMPONENT,
                    "Lock guard dropped outside a runtime; lock left held",
                    lock = %release.name
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_store::{DatabaseError, InMemoryDocumentStore};
    use std::time::Duration;

    fn setup() -> (Arc<InMemoryDocumentStore>, Namespace) {
        (Arc::new(InMemoryDocumentStore::new()), Namespace::new("acme", "eu"))
    }

    fn locks(db: &Arc<InMemoryDocumentStore>, ns: &Namespace) -> ScopeLock {
        ScopeLock::new(db.clone(), ns.clone(), "locks".to_string())
    }

    async fn wait_for_count(db: &InMemoryDocumentStore, ns: &Namespace, expected: usize) {
        for _ in 0..200 {
            if db.count(ns, "locks") == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("lock count never reached {expected}");
    }

    #[tokio::test]
    async fn test_second_acquire_is_already_held() {
        let (db, ns) = setup();
        let a = locks(&db, &ns);
        let b = locks(&db, &ns);

        let guard = a.acquire("invoice-7").await.unwrap();
        assert_eq!(guard.name(), "invoice-7");
        assert!(matches!(
            b.acquire("invoice-7").await,
            Err(LockError::AlreadyHeld { .. })
        ));
        assert!(b.acquire("invoice-8").await.is_ok());

        guard.release().await.unwrap();
        assert!(b.acquire("invoice-7").await.is_ok());
    }

    #[tokio::test]
    async fn test_drop_releases() {
        let (db, ns) = setup();
        let lock = locks(&db, &ns);
        {
            let _guard = lock.acquire("job").await.unwrap();
            assert_eq!(db.count(&ns, "locks"), 1);
        }
        wait_for_count(&db, &ns, 0).await;
    }

    #[tokio::test]
    async fn test_with_lock_releases_on_completion() {
        let (db, ns) = setup();
        let lock = locks(&db, &ns);
        let value = lock
            .with_lock("job", async {
                assert_eq!(db.count(&ns, "locks"), 1);
                42
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(db.count(&ns, "locks"), 0);
    }

    #[tokio::test]
    async fn test_with_lock_releases_when_cancelled() {
        let (db, ns) = setup();
        let lock = locks(&db, &ns);
        let pending = lock.with_lock("job", std::future::pending::<()>());
        let _ = tokio::time::timeout(Duration::from_millis(20), pending).await;
        wait_for_count(&db, &ns, 0).await;
    }

    #[tokio::test]
    async fn test_release_only_removes_own_lock() {
        let (db, ns) = setup();
        let a = locks(&db, &ns);
        let guard = a.acquire("job").await.unwrap();

        // Simulate expiry and takeover by another owner.
        db.remove(&ns, "locks", &Filter::by_id("job")).await.unwrap();
        let b = locks(&db, &ns);
        let _held = b.acquire("job").await.unwrap();

        guard.release().await.unwrap();
        assert_eq!(db.count(&ns, "locks"), 1);
    }

    #[tokio::test]
    async fn test_database_errors_propagate() {
        let (db, ns) = setup();
        db.fail_with(DatabaseError::Connection("down".into()));
        assert!(matches!(
            locks(&db, &ns).acquire("job").await,
            Err(LockError::Database(_))
        ));
    }
}
