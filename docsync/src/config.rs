//! Configuration for sync modules.

use crate::error::{SyncError, TemplateError};
use crate::query::WhereClause;
use crate::template::{tokenize, PathTemplate, IDENTITY_PLACEHOLDER, NULL_IDENTITY};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Whether a module mirrors a collection or a single document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleMode {
    #[default]
    Collection,
    /// The last path segment is the document id
    Doc,
}

/// Configuration of one synced module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Module name, also the key in the local store
    pub module_name: String,
    /// Remote path, e.g. `users/{userId}/pets`
    pub path_template: PathTemplate,
    /// Collection or single document
    #[serde(default)]
    pub mode: ModuleMode,
    /// Filters sent with the subscription
    #[serde(default, rename = "where")]
    pub where_clauses: Vec<WhereClause>,
    /// State the local module is reset to on teardown
    #[serde(default = "empty_object")]
    pub initial_state: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl ModuleConfig {
    /// Create a collection module config.
    pub fn new(
        module_name: impl Into<String>,
        path_template: impl Into<String>,
    ) -> Result<Self, TemplateError> {
        Ok(Self {
            module_name: module_name.into(),
            path_template: PathTemplate::parse(path_template)?,
            mode: ModuleMode::default(),
            where_clauses: Vec::new(),
            initial_state: empty_object(),
        })
    }

    pub fn with_mode(mut self, mode: ModuleMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_where(mut self, clause: WhereClause) -> Self {
        self.where_clauses.push(clause);
        self
    }

    pub fn with_initial_state(mut self, state: Value) -> Self {
        self.initial_state = state;
        self
    }

    /// Check filters for placeholder syntax and the initial state shape.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.module_name.is_empty() {
            return Err(SyncError::Config("module_name must not be empty".into()));
        }
        if !self.initial_state.is_object() {
            return Err(SyncError::Config(format!(
                "initial_state of '{}' must be an object",
                self.module_name
            )));
        }
        for clause in &self.where_clauses {
            tokenize(&clause.field)?;
            check_placeholders(&clause.value)?;
        }
        Ok(())
    }
}

/// Strings in a filter value, including those inside lists, must tokenize.
fn check_placeholders(value: &Value) -> Result<(), TemplateError> {
    match value {
        Value::String(s) => tokenize(s).map(|_| ()),
        Value::Array(items) => items.iter().try_for_each(check_placeholders),
        _ => Ok(()),
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Placeholder filled from the signed-in identity
    #[serde(default = "default_identity_placeholder")]
    pub identity_placeholder: String,
    /// Substituted for the identity placeholder when nobody is signed in
    #[serde(default = "default_null_identity_token")]
    pub null_identity_token: String,
    /// Module definitions
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

fn default_identity_placeholder() -> String {
    IDENTITY_PLACEHOLDER.to_string()
}

fn default_null_identity_token() -> String {
    NULL_IDENTITY.to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            identity_placeholder: default_identity_placeholder(),
            null_identity_token: default_null_identity_token(),
            modules: Vec::new(),
        }
    }
}

impl SyncConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, SyncError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, SyncError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load config from JSON.
    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_module(mut self, module: ModuleConfig) -> Self {
        self.modules.push(module);
        self
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.identity_placeholder.is_empty() {
            return Err(SyncError::Config("identity_placeholder must not be empty".into()));
        }
        let mut names = HashSet::new();
        for module in &self.modules {
            module.validate()?;
            if !names.insert(module.module_name.as_str()) {
                return Err(SyncError::Config(format!(
                    "duplicate module '{}'",
                    module.module_name
                )));
            }
        }
        Ok(())
    }
}
