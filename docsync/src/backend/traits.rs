//! Core traits for sync collaborators.

use crate::array::ArrayDirective;
use crate::config::ModuleMode;
use crate::error::ChannelError;
use crate::query::WhereClause;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifies one live remote subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelHandle {
    /// Backend-assigned subscription id
    pub id: u64,
    /// Resolved path the subscription listens on
    pub path: String,
}

/// What to subscribe to.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeRequest {
    /// Owning module
    pub module: String,
    /// Fully or partially resolved remote path
    pub path: String,
    /// Collection or single document
    pub mode: ModuleMode,
    /// Filters with placeholders already resolved
    pub where_clauses: Vec<WhereClause>,
}

/// An accepted subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub handle: ChannelHandle,
    /// Fields delivered with the first server response, if any
    pub snapshot: Option<Map<String, Value>>,
}

impl Subscription {
    pub fn new(handle: ChannelHandle) -> Self {
        Self {
            handle,
            snapshot: None,
        }
    }

    pub fn with_snapshot(mut self, snapshot: Map<String, Value>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

/// Remote subscription channel.
///
/// Transport, retries and query execution live behind this trait.
#[async_trait]
pub trait SubscriptionBackend: Send + Sync {
    /// Start listening on `request.path`.
    async fn subscribe(&self, request: &SubscribeRequest) -> Result<Subscription, ChannelError>;

    /// Stop listening. Unsubscribing an already-closed handle is a no-op.
    async fn unsubscribe(&self, handle: &ChannelHandle) -> Result<(), ChannelError>;
}

/// A single field mutation in the local store.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Overwrite the field
    Set(Value),
    /// Reconcile an array field
    Array(ArrayDirective),
    /// Remove the field
    Delete,
}

impl FieldUpdate {
    /// Directive-shaped values become `Array`, everything else `Set`.
    pub fn from_value(value: Value) -> Self {
        match ArrayDirective::from_value(&value) {
            Some(directive) => Self::Array(directive),
            None => Self::Set(value),
        }
    }
}

impl From<ArrayDirective> for FieldUpdate {
    fn from(directive: ArrayDirective) -> Self {
        Self::Array(directive)
    }
}

/// The observable local store.
pub trait LocalStore: Send + Sync {
    /// Replace all state of `module` with `initial`.
    fn reset_module_state(&self, module: &str, initial: &Value);

    /// Apply `update` to the dot-separated `field_path` inside `module`.
    fn apply_field_update(&self, module: &str, field_path: &str, update: FieldUpdate);

    /// Overwrite top-level fields of `module` with `fields`. Keys are taken
    /// literally, so a remote field named `a.b` stays one field.
    fn merge_fields(&self, module: &str, fields: &Map<String, Value>);
}

/// Ambient identity context.
pub trait IdentityProvider: Send + Sync {
    /// Id of the signed-in identity, `None` when anonymous.
    fn current_identity_id(&self) -> Option<String>;
}
