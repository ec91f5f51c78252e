//! # Scope Flows
//!
//! Scopes as a request handler uses them: identifiers derived from the
//! request context, attribute state spread over several flavors, expiry
//! driven by the database's TTL indexes, and locks around shared work.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;

    use pc_03_scopes::{LockError, ScopeConfig, ScopeError, ScopeStore};
    use shared_store::InMemoryDocumentStore;
    use shared_types::{Namespace, RequestContext, PROCESS_HEADER, TRANSACTION_HEADER};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn setup() -> (Arc<InMemoryDocumentStore>, ScopeStore) {
        let db = Arc::new(InMemoryDocumentStore::new());
        let scopes = ScopeStore::new(db.clone(), ScopeConfig::default());
        (db, scopes)
    }

    fn request(tx: &str) -> RequestContext {
        RequestContext::new("acme", "eu", "alice")
            .with_header(TRANSACTION_HEADER, tx)
            .with_body(json!({ "processId": "onboarding-42" }))
    }

    // =============================================================================
    // INTEGRATION TESTS: REQUEST SCOPES
    // =============================================================================

    #[tokio::test]
    async fn test_request_scopes_keep_state_apart() {
        let (db, scopes) = setup();
        let ctx = request("tx-1");

        let tx = scopes.transaction_scope(&ctx, None).unwrap();
        let user = scopes.user_scope(&ctx).unwrap();
        let process = scopes.process_scope(&ctx, None).unwrap();
        let realm = scopes.realm_scope(&ctx.namespace()).unwrap();

        tx.set_attribute("step", "validate").await.unwrap();
        user.set_attribute("locale", "de-DE").await.unwrap();
        process.set_attribute("progress", json!({ "done": 2, "total": 5 })).await.unwrap();
        realm.set_attribute("currency", "EUR").await.unwrap();

        assert_eq!(process.scope_id(), "onboarding-42");
        assert_eq!(process.get_attribute("progress.done").await.unwrap(), Some(json!(2)));
        assert_eq!(user.get_attribute("step").await.unwrap(), None);
        assert_eq!(db.count(&ctx.namespace(), "scopes"), 4);

        // A later request in the same transaction sees the same scope.
        let again = scopes.transaction_scope(&request("tx-1"), None).unwrap();
        assert_eq!(again.get_attribute("step").await.unwrap(), Some(json!("validate")));

        // A different transaction does not.
        let other = scopes.transaction_scope(&request("tx-2"), None).unwrap();
        assert!(other.get_attributes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_header_beats_body() {
        let (_, scopes) = setup();
        let ctx = request("tx-1").with_header(PROCESS_HEADER, "from-header");
        let process = scopes.process_scope(&ctx, None).unwrap();
        assert_eq!(process.scope_id(), "from-header");
    }

    #[tokio::test]
    async fn test_idle_transaction_expires_but_active_one_survives() {
        let (db, scopes) = setup();
        let ns = Namespace::new("acme", "eu");
        scopes.ensure_indexes(&ns).await.unwrap();

        let idle = scopes.transaction_scope(&request("tx-idle"), None).unwrap();
        let session = scopes.session_scope(&ns, "sess-1").unwrap();
        idle.set_attribute("step", 1).await.unwrap();
        session.set_attribute("cart", json!(["sku-1"])).await.unwrap();

        // Past the transaction TTL but well inside the session TTL.
        let removed = db.purge_expired(Utc::now() + ChronoDuration::seconds(120));
        assert_eq!(removed, 1);
        assert_eq!(idle.get_attribute("step").await.unwrap(), None);
        assert_eq!(session.get_attribute("cart.0").await.unwrap(), Some(json!("sku-1")));

        let removed = db.purge_expired(Utc::now() + ChronoDuration::hours(2));
        assert_eq!(removed, 1);
        assert!(session.get_attributes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_environment_scope_outlives_invalidation() {
        let (_, scopes) = setup();
        let ns = Namespace::new("acme", "eu");
        let env = scopes.environment_scope(&ns);
        env.set_attribute("maintenance", false).await.unwrap();

        assert!(!env.invalidate().await.unwrap());
        assert_eq!(env.get_attribute_keys().await.unwrap(), vec!["maintenance"]);

        let tx = scopes.transaction_scope(&request("tx-1"), None).unwrap();
        tx.set_attribute("k", "v").await.unwrap();
        assert!(tx.invalidate().await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_identifiers_are_reported() {
        let (_, scopes) = setup();
        let bare = RequestContext::new("acme", "eu", "alice");
        assert!(matches!(
            scopes.transaction_scope(&bare, None),
            Err(ScopeError::MissingScopeId(_))
        ));
        assert!(scopes.transaction_scope(&bare, Some("tx-explicit")).is_ok());
    }

    // =============================================================================
    // INTEGRATION TESTS: LOCKS
    // =============================================================================

    #[tokio::test]
    async fn test_lock_serializes_two_workers() {
        let (_, scopes) = setup();
        let ns = Namespace::new("acme", "eu");
        let worker_a = scopes.locks(&ns);
        let worker_b = scopes.locks(&ns);

        let result = worker_a
            .with_lock("nightly-invoicing", async {
                let contended = worker_b.acquire("nightly-invoicing").await;
                matches!(contended, Err(LockError::AlreadyHeld { .. }))
            })
            .await
            .unwrap();
        assert!(result);

        let guard = worker_b.acquire("nightly-invoicing").await.unwrap();
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_locks_are_per_realm() {
        let (_, scopes) = setup();
        let eu = scopes.locks(&Namespace::new("acme", "eu"));
        let us = scopes.locks(&Namespace::new("acme", "us"));

        let _eu_guard = eu.acquire("job").await.unwrap();
        let us_guard = us.acquire("job").await.unwrap();
        us_guard.release().await.unwrap();
    }
}
