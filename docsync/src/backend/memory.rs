//! In-memory local store and identity context

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::trace;

use super::traits::{FieldUpdate, IdentityProvider, LocalStore};

/// Local store keeping one JSON object per module.
#[derive(Debug, Default)]
pub struct MemoryStore {
    modules: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full state of a module.
    pub fn module_state(&self, module: &str) -> Option<Value> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(module)
            .cloned()
    }

    /// Value at a dot-separated path inside a module.
    pub fn field(&self, module: &str, field_path: &str) -> Option<Value> {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        let mut current = modules.get(module)?;
        for key in field_path.split('.') {
            current = current.as_object()?.get(key)?;
        }
        Some(current.clone())
    }
}

impl LocalStore for MemoryStore {
    fn reset_module_state(&self, module: &str, initial: &Value) {
        trace!(module, "Resetting module state");
        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(module.to_string(), initial.clone());
    }

    fn apply_field_update(&self, module: &str, field_path: &str, update: FieldUpdate) {
        trace!(module, field_path, ?update, "Applying field update");
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        let root = modules
            .entry(module.to_string())
            .or_insert_with(|| Value::Object(Map::new()));

        let mut keys: Vec<&str> = field_path.split('.').collect();
        let Some(leaf) = keys.pop() else {
            return;
        };

        let mut parent = root;
        for key in keys {
            parent = object_mut(parent)
                .entry(key)
                .or_insert_with(|| Value::Object(Map::new()));
        }
        let parent = object_mut(parent);

        match update {
            FieldUpdate::Set(value) => {
                parent.insert(leaf.to_string(), value);
            }
            FieldUpdate::Array(directive) => {
                let next = directive.apply_to_field(parent.get(leaf));
                parent.insert(leaf.to_string(), next);
            }
            FieldUpdate::Delete => {
                parent.remove(leaf);
            }
        }
    }

    fn merge_fields(&self, module: &str, fields: &Map<String, Value>) {
        trace!(module, count = fields.len(), "Merging fields");
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        let root = modules
            .entry(module.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let root = object_mut(root);
        for (key, value) in fields {
            root.insert(key.clone(), value.clone());
        }
    }
}

/// Coerce `value` into an object, replacing scalars in the way.
fn object_mut(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

/// Identity context with a settable signed-in id.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    id: RwLock<Option<String>>,
}

impl StaticIdentity {
    /// Nobody signed in.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(id: impl Into<String>) -> Self {
        Self {
            id: RwLock::new(Some(id.into())),
        }
    }

    pub fn sign_in(&self, id: impl Into<String>) {
        *self.id.write().unwrap_or_else(PoisonError::into_inner) = Some(id.into());
    }

    pub fn sign_out(&self) {
        *self.id.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_identity_id(&self) -> Option<String> {
        self.id.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
