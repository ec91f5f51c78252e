//! Scope Handle
//!
//! Attribute operations on one scope document. Every call is a single
//! database operation, so each is atomic on its own; nothing spans calls.

use std::sync::Arc;

use platform_telemetry::{log_event, metric_inc, SCOPE_OPERATIONS};
use serde_json::Value;
use shared_store::{get_path, Document, DocumentStore, Filter, Update};
use shared_types::Namespace;
use tracing::{Instrument, Span};

use crate::domain::errors::ScopeError;
use crate::domain::fields::{is_reserved, validate_attribute_key, AccessedField, SCOPE_ID_FIELD};
use crate::domain::flavors::ScopeKind;

const COMPONENT: &str = "scopes";

/// A scope bound to its namespace, collection and identifier.
#[derive(Clone)]
pub struct ScopeHandle {
    store: Arc<dyn DocumentStore>,
    namespace: Namespace,
    collection: String,
    scope_id: String,
    kind: ScopeKind,
    accessed: Option<AccessedField>,
    span: Span,
}

impl ScopeHandle {
    pub(crate) fn new(
        store: Arc<dyn DocumentStore>,
        namespace: Namespace,
        collection: String,
        scope_id: String,
        kind: ScopeKind,
        accessed: Option<AccessedField>,
        span: Span,
    ) -> Self {
        Self {
            store,
            namespace,
            collection,
            scope_id,
            kind,
            accessed,
            span,
        }
    }

    pub fn scope_id(&self) -> &str {
        &self.scope_id
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn accessed_field(&self) -> Option<AccessedField> {
        self.accessed
    }

    fn filter(&self) -> Filter {
        Filter::eq(SCOPE_ID_FIELD, self.scope_id.clone())
    }

    /// Adds the access timestamp for tracked scopes.
    fn tracked(&self, update: Update) -> Update {
        match self.accessed {
            Some(field) => update.current_date(field.field_name()),
            None => update,
        }
    }

    /// The scope document, refreshing the access timestamp in the same
    /// operation when tracked.
    async fn load(&self) -> Result<Option<Document>, ScopeError> {
        let document = match self.accessed {
            Some(_) => {
                self.store
                    .find_one_and_update(
                        &self.namespace,
                        &self.collection,
                        &self.filter(),
                        &self.tracked(Update::new()),
                        false,
                    )
                    .await?
            }
            None => {
                self.store
                    .find_one(&self.namespace, &self.collection, &self.filter())
                    .await?
            }
        };
        Ok(document)
    }

    async fn write(&self, update: Update, upsert: bool) -> Result<(), ScopeError> {
        self.store
            .update_one(
                &self.namespace,
                &self.collection,
                &self.filter(),
                &self.tracked(update),
                upsert,
            )
            .await?;
        Ok(())
    }

    /// Set one attribute, creating the scope if needed. Dotted keys set
    /// nested values.
    pub async fn set_attribute(&self, key: &str, value: impl Into<Value>) -> Result<(), ScopeError> {
        validate_attribute_key(key)?;
        let value = value.into();
        async {
            self.write(Update::new().set(key, value), true).await?;
            metric_inc!(SCOPE_OPERATIONS, &["set"]);
            log_event!(debug, COMPONENT, "Attribute set", scope_id = %self.scope_id, key = %key);
            Ok::<_, ScopeError>(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Set several attributes in one write, creating the scope if needed.
    ///
    /// An empty map only refreshes the access timestamp.
    pub async fn set_attributes(&self, attributes: Document) -> Result<(), ScopeError> {
        for key in attributes.keys() {
            validate_attribute_key(key)?;
        }
        if attributes.is_empty() {
            return self.touch().await;
        }
        async {
            let count = attributes.len();
            self.write(Update::new().set_all(attributes), true).await?;
            metric_inc!(SCOPE_OPERATIONS, &["set"]);
            log_event!(
                debug,
                COMPONENT,
                "Attributes set",
                scope_id = %self.scope_id,
                count = count
            );
            Ok::<_, ScopeError>(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Read an attribute by dot path. `None` if the scope or the path is
    /// absent.
    pub async fn get_attribute(&self, key: &str) -> Result<Option<Value>, ScopeError> {
        validate_attribute_key(key)?;
        async {
            let document = self.load().await?;
            metric_inc!(SCOPE_OPERATIONS, &["get"]);
            Ok::<_, ScopeError>(document.and_then(|d| get_path(&d, key).cloned()))
        }
        .instrument(self.span.clone())
        .await
    }

    /// Every attribute, without bookkeeping fields. Empty if the scope does
    /// not exist.
    pub async fn get_attributes(&self) -> Result<Document, ScopeError> {
        async {
            let mut document = self.load().await?.unwrap_or_default();
            document.retain(|field, _| !is_reserved(field));
            metric_inc!(SCOPE_OPERATIONS, &["get_all"]);
            Ok::<_, ScopeError>(document)
        }
        .instrument(self.span.clone())
        .await
    }

    pub async fn get_attribute_keys(&self) -> Result<Vec<String>, ScopeError> {
        Ok(self.get_attributes().await?.into_iter().map(|(k, _)| k).collect())
    }

    /// Unset an attribute. Removing from a missing scope does not create it.
    pub async fn remove_attribute(&self, key: &str) -> Result<(), ScopeError> {
        validate_attribute_key(key)?;
        async {
            self.write(Update::new().unset(key), false).await?;
            metric_inc!(SCOPE_OPERATIONS, &["remove"]);
            log_event!(debug, COMPONENT, "Attribute removed", scope_id = %self.scope_id, key = %key);
            Ok::<_, ScopeError>(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Refresh the access timestamp. No-op for untracked scopes.
    pub async fn touch(&self) -> Result<(), ScopeError> {
        if self.accessed.is_none() {
            return Ok(());
        }
        async {
            self.write(Update::new(), false).await?;
            metric_inc!(SCOPE_OPERATIONS, &["touch"]);
            Ok::<_, ScopeError>(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Delete the scope document. Returns whether one was deleted.
    ///
    /// The environment scope is permanent and is never deleted.
    pub async fn invalidate(&self) -> Result<bool, ScopeError> {
        if self.kind.is_permanent() {
            log_event!(
                debug,
                COMPONENT,
                "Ignoring invalidate of permanent scope",
                scope_id = %self.scope_id
            );
            return Ok(false);
        }
        async {
            let removed = self
                .store
                .remove(&self.namespace, &self.collection, &self.filter())
                .await?;
            metric_inc!(SCOPE_OPERATIONS, &["invalidate"]);
            log_event!(
                info,
                COMPONENT,
                "Scope invalidated",
                scope_id = %self.scope_id,
                kind = %self.kind
            );
            Ok::<_, ScopeError>(removed > 0)
        }
        .instrument(self.span.clone())
        .await
    }
}

impl std::fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeHandle")
            .field("namespace", &self.namespace)
            .field("collection", &self.collection)
            .field("scope_id", &self.scope_id)
            .field("kind", &self.kind)
            .field("accessed", &self.accessed)
            .finish()
    }
}
