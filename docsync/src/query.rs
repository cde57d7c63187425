//! Where-clause filters with placeholder resolution
//!
//! A filter is a `(field, op, value)` triple. The field and any string inside
//! the value may carry placeholders that are resolved with the same rules as
//! channel paths. With nobody signed in, the identity placeholder becomes the
//! null token, so the filter matches nothing rather than failing.

use crate::error::TemplateError;
use crate::template::PlaceholderResolver;
use crate::variables::PathVariables;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Comparison operators understood by the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WhereOp {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "array-contains")]
    ArrayContains,
    #[serde(rename = "array-contains-any")]
    ArrayContainsAny,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not-in")]
    NotIn,
}

impl WhereOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Gte => ">=",
            Self::Gt => ">",
            Self::ArrayContains => "array-contains",
            Self::ArrayContainsAny => "array-contains-any",
            Self::In => "in",
            Self::NotIn => "not-in",
        }
    }
}

impl fmt::Display for WhereOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One filter triple. Serialized as `[field, op, value]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(String, WhereOp, Value)", into = "(String, WhereOp, Value)")]
pub struct WhereClause {
    pub field: String,
    pub op: WhereOp,
    pub value: Value,
}

impl WhereClause {
    pub fn new(field: impl Into<String>, op: WhereOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

impl From<(String, WhereOp, Value)> for WhereClause {
    fn from((field, op, value): (String, WhereOp, Value)) -> Self {
        Self { field, op, value }
    }
}

impl From<WhereClause> for (String, WhereOp, Value) {
    fn from(clause: WhereClause) -> Self {
        (clause.field, clause.op, clause.value)
    }
}

/// Resolves placeholders in a list of filters
#[derive(Debug, Clone, Default)]
pub struct WhereClauseResolver {
    resolver: PlaceholderResolver,
}

impl WhereClauseResolver {
    pub fn new(resolver: PlaceholderResolver) -> Self {
        Self { resolver }
    }

    /// Resolve field and value of every clause; `op` and order are kept.
    pub fn resolve_all(
        &self,
        clauses: &[WhereClause],
        supplied: &PathVariables,
        remembered: &PathVariables,
        identity: Option<&str>,
    ) -> Result<Vec<WhereClause>, TemplateError> {
        clauses
            .iter()
            .map(|clause| {
                Ok(WhereClause {
                    field: self
                        .resolver
                        .resolve(&clause.field, supplied, remembered, identity)?,
                    op: clause.op,
                    value: self.resolve_value(&clause.value, supplied, remembered, identity)?,
                })
            })
            .collect()
    }

    fn resolve_value(
        &self,
        value: &Value,
        supplied: &PathVariables,
        remembered: &PathVariables,
        identity: Option<&str>,
    ) -> Result<Value, TemplateError> {
        match value {
            Value::String(s) => Ok(Value::String(
                self.resolver.resolve(s, supplied, remembered, identity)?,
            )),
            // `in` / `array-contains-any` take a list of candidates
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_value(item, supplied, remembered, identity))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }
}

/// Resolve with the default identity placeholder and null token.
pub fn resolve_all(
    clauses: &[WhereClause],
    supplied: &PathVariables,
    remembered: &PathVariables,
    identity: Option<&str>,
) -> Result<Vec<WhereClause>, TemplateError> {
    WhereClauseResolver::default().resolve_all(clauses, supplied, remembered, identity)
}
