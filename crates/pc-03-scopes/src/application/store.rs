//! Scope Store
//!
//! Hands out [`ScopeHandle`]s over the realm's `scopes` collection and
//! declares the indexes the database uses to expire tracked scopes.

use std::sync::Arc;

use platform_telemetry::log_event;
use shared_store::{DocumentStore, IndexSpec};
use shared_types::{Namespace, RequestContext};
use tracing::{info_span, Instrument, Span};

use crate::application::handle::ScopeHandle;
use crate::application::lock::ScopeLock;
use crate::config::ScopeConfig;
use crate::domain::errors::ScopeError;
use crate::domain::fields::{AccessedField, SCOPE_ID_FIELD};
use crate::domain::flavors::{
    process_scope_id, realm_scope_id, transaction_scope_id, user_scope_id, ScopeKind,
    ENVIRONMENT_SCOPE_ID,
};

const COMPONENT: &str = "scopes";

/// Scope Store
///
/// Holds no per-scope state; handles are cheap and can be created per
/// request.
pub struct ScopeStore {
    store: Arc<dyn DocumentStore>,
    config: ScopeConfig,
    span: Span,
}

impl ScopeStore {
    pub fn new(store: Arc<dyn DocumentStore>, config: ScopeConfig) -> Self {
        Self {
            store,
            config,
            span: info_span!("scopes"),
        }
    }

    /// Replace the span scope operations are recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    fn handle(
        &self,
        namespace: Namespace,
        scope_id: String,
        kind: ScopeKind,
        accessed: Option<AccessedField>,
    ) -> ScopeHandle {
        ScopeHandle::new(
            Arc::clone(&self.store),
            namespace,
            self.config.scopes_collection.clone(),
            scope_id,
            kind,
            accessed,
            self.span.clone(),
        )
    }

    /// A scope by explicit id, optionally tracking access in one of the two
    /// last-modified fields.
    pub fn scope(
        &self,
        namespace: &Namespace,
        scope_id: &str,
        accessed: Option<AccessedField>,
    ) -> Result<ScopeHandle, ScopeError> {
        if scope_id.is_empty() {
            return Err(ScopeError::MissingScopeId(ScopeKind::Custom));
        }
        Ok(self.handle(
            namespace.clone(),
            scope_id.to_string(),
            ScopeKind::Custom,
            accessed,
        ))
    }

    /// Like [`scope`](Self::scope), with the accessed field given by name.
    pub fn scope_named(
        &self,
        namespace: &Namespace,
        scope_id: &str,
        accessed_field: Option<&str>,
    ) -> Result<ScopeHandle, ScopeError> {
        let accessed = accessed_field.map(str::parse::<AccessedField>).transpose()?;
        self.scope(namespace, scope_id, accessed)
    }

    fn flavored(&self, namespace: Namespace, scope_id: String, kind: ScopeKind) -> ScopeHandle {
        self.handle(namespace, scope_id, kind, kind.accessed_field())
    }

    pub fn transaction_scope(
        &self,
        ctx: &RequestContext,
        id_override: Option<&str>,
    ) -> Result<ScopeHandle, ScopeError> {
        let id = transaction_scope_id(ctx, id_override)?;
        Ok(self.flavored(ctx.namespace(), id, ScopeKind::Transaction))
    }

    /// A session scope. Deriving the session id is up to the caller.
    pub fn session_scope(
        &self,
        namespace: &Namespace,
        session_id: &str,
    ) -> Result<ScopeHandle, ScopeError> {
        if session_id.is_empty() {
            return Err(ScopeError::MissingScopeId(ScopeKind::Session));
        }
        Ok(self.flavored(namespace.clone(), session_id.to_string(), ScopeKind::Session))
    }

    pub fn realm_scope(&self, namespace: &Namespace) -> Result<ScopeHandle, ScopeError> {
        let id = realm_scope_id(&namespace.realm)?;
        Ok(self.flavored(namespace.clone(), id, ScopeKind::Realm))
    }

    pub fn user_scope(&self, ctx: &RequestContext) -> Result<ScopeHandle, ScopeError> {
        let id = user_scope_id(ctx)?;
        Ok(self.flavored(ctx.namespace(), id, ScopeKind::User))
    }

    pub fn process_scope(
        &self,
        ctx: &RequestContext,
        id_override: Option<&str>,
    ) -> Result<ScopeHandle, ScopeError> {
        let id = process_scope_id(ctx, id_override)?;
        Ok(self.flavored(ctx.namespace(), id, ScopeKind::Process))
    }

    /// The permanent environment scope. Its `invalidate` does nothing.
    pub fn environment_scope(&self, namespace: &Namespace) -> ScopeHandle {
        self.flavored(
            namespace.clone(),
            ENVIRONMENT_SCOPE_ID.to_string(),
            ScopeKind::Environment,
        )
    }

    /// Locks in the realm's `locks` collection.
    pub fn locks(&self, namespace: &Namespace) -> ScopeLock {
        ScopeLock::new(
            Arc::clone(&self.store),
            namespace.clone(),
            self.config.locks_collection.clone(),
        )
        .with_span(self.span.clone())
    }

    /// Declare the scope id index and the two expiring indexes. Safe to
    /// repeat.
    pub async fn ensure_indexes(&self, namespace: &Namespace) -> Result<(), ScopeError> {
        async {
            let collection = &self.config.scopes_collection;
            self.store
                .create_index(namespace, collection, IndexSpec::unique(SCOPE_ID_FIELD))
                .await?;
            for field in [AccessedField::Transaction, AccessedField::Session] {
                self.store
                    .create_index(
                        namespace,
                        collection,
                        IndexSpec::expiring(field.field_name(), field.ttl(&self.config)),
                    )
                    .await?;
            }
            log_event!(
                info,
                COMPONENT,
                "Scope indexes ensured",
                account = %namespace.account,
                realm = %namespace.realm
            );
            Ok::<_, ScopeError>(())
        }
        .instrument(self.span.clone())
        .await
    }
}
