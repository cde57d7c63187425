//! Array reconciliation directives
//!
//! Partial updates to list-valued fields are expressed as directives instead
//! of whole-array overwrites:
//! - `Union(v)` appends `v` when no equal element is present
//! - `Remove(v)` deletes every element equal to `v`
//!
//! Both are idempotent. Serialized, a directive is the tagged object
//! `{"kind": "arrayUnion" | "arrayRemove", "value": ...}`, which is what
//! [`is_reconciliation_directive`] checks for, so directives survive a trip
//! through plain JSON payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const KIND_FIELD: &str = "kind";
const VALUE_FIELD: &str = "value";
const UNION_KIND: &str = "arrayUnion";
const REMOVE_KIND: &str = "arrayRemove";

/// Declarative mutation of an array field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ArrayDirective {
    #[serde(rename = "arrayUnion")]
    Union(Value),
    #[serde(rename = "arrayRemove")]
    Remove(Value),
}

impl ArrayDirective {
    pub fn union(value: impl Into<Value>) -> Self {
        Self::Union(value.into())
    }

    pub fn remove(value: impl Into<Value>) -> Self {
        Self::Remove(value.into())
    }

    pub fn value(&self) -> &Value {
        match self {
            Self::Union(v) | Self::Remove(v) => v,
        }
    }

    /// Parse the tagged JSON form; `None` for anything else.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !is_reconciliation_directive(value) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        let kind = match self {
            Self::Union(_) => UNION_KIND,
            Self::Remove(_) => REMOVE_KIND,
        };
        let mut map = serde_json::Map::new();
        map.insert(KIND_FIELD.to_string(), Value::from(kind));
        map.insert(VALUE_FIELD.to_string(), self.value().clone());
        Value::Object(map)
    }

    /// Return a new array with the directive applied; `array` is not touched.
    pub fn apply(&self, array: &[Value]) -> Vec<Value> {
        match self {
            Self::Union(v) => {
                let mut out = array.to_vec();
                if !array.contains(v) {
                    out.push(v.clone());
                }
                out
            }
            Self::Remove(v) => array.iter().filter(|item| *item != v).cloned().collect(),
        }
    }

    /// Apply to a field value that may be missing or not an array yet.
    ///
    /// A missing or non-array field is treated as empty.
    pub fn apply_to_field(&self, current: Option<&Value>) -> Value {
        let existing: &[Value] = match current {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        };
        Value::Array(self.apply(existing))
    }
}

/// Structural check for the serialized directive shape.
///
/// True only for an object holding exactly a known `kind` tag and a `value`.
pub fn is_reconciliation_directive(value: &Value) -> bool {
    let Value::Object(map) = value else {
        return false;
    };
    if map.len() != 2 || !map.contains_key(VALUE_FIELD) {
        return false;
    }
    matches!(
        map.get(KIND_FIELD).and_then(Value::as_str),
        Some(UNION_KIND) | Some(REMOVE_KIND)
    )
}
