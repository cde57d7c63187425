//! Synced modules
//!
//! A `SyncModule` is one named slice of the local store mirrored from one
//! remote path. It bundles the module's config, its channel and its
//! remembered path variables.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::backend::{ChannelHandle, Collaborators, FieldUpdate};
use crate::channel::{ChannelLifecycleManager, ChannelState, CloseOptions};
use crate::config::{ModuleConfig, SyncConfig};
use crate::error::{Result, StateError};
use crate::query::WhereClause;
use crate::template::PlaceholderResolver;
use crate::variables::PathVariables;

/// One synced module.
#[derive(Clone)]
pub struct SyncModule {
    channel: ChannelLifecycleManager,
}

impl SyncModule {
    /// Validate `config` and put the local state into the initial shape.
    pub fn new(config: ModuleConfig, collaborators: Collaborators) -> Result<Self> {
        Self::with_resolver(config, collaborators, PlaceholderResolver::default())
    }

    pub fn with_resolver(
        config: ModuleConfig,
        collaborators: Collaborators,
        resolver: PlaceholderResolver,
    ) -> Result<Self> {
        config.validate()?;
        collaborators
            .store
            .reset_module_state(&config.module_name, &config.initial_state);
        Ok(Self {
            channel: ChannelLifecycleManager::with_resolver(config, collaborators, resolver),
        })
    }

    pub fn name(&self) -> &str {
        &self.channel.config().module_name
    }

    pub fn config(&self) -> &ModuleConfig {
        self.channel.config()
    }

    pub fn channel(&self) -> &ChannelLifecycleManager {
        &self.channel
    }

    /// Open the module's channel, remembering `vars` for later resolutions.
    pub async fn open(&self, vars: Option<PathVariables>) -> Result<ChannelHandle> {
        Ok(self.channel.open(vars).await?)
    }

    pub async fn close(&self, options: CloseOptions) -> Result<()> {
        Ok(self.channel.close(options).await?)
    }

    pub fn state(&self) -> ChannelState {
        self.channel.state()
    }

    /// Handle of the open channel.
    pub fn handle(&self) -> std::result::Result<ChannelHandle, StateError> {
        self.channel.handle().ok_or_else(|| StateError::NotOpen {
            module: self.name().to_string(),
        })
    }

    /// Remote path as currently resolvable; unresolved placeholders stay verbatim.
    pub fn resolved_path(&self) -> String {
        self.channel.resolved_path()
    }

    /// Configured filters as currently resolvable.
    pub fn where_clauses(&self) -> Result<Vec<WhereClause>> {
        Ok(self.channel.where_clauses()?)
    }

    pub fn path_variables(&self) -> PathVariables {
        self.channel.path_variables()
    }

    /// Apply a partial update to the local module state.
    ///
    /// Keys may be dot-separated paths. Values shaped like an array directive
    /// reconcile the target array instead of replacing it.
    pub fn patch(&self, fields: Map<String, Value>) {
        let store = &self.channel.collaborators().store;
        for (field, value) in fields {
            let update = FieldUpdate::from_value(value);
            debug!(module = %self.name(), field = %field, ?update, "Patching field");
            store.apply_field_update(self.name(), &field, update);
        }
    }
}

/// Build every module of `config`, keyed by module name.
pub fn modules_from_config(
    config: &SyncConfig,
    collaborators: &Collaborators,
) -> Result<BTreeMap<String, SyncModule>> {
    config.validate()?;
    let resolver =
        PlaceholderResolver::new(&config.identity_placeholder, &config.null_identity_token);

    config
        .modules
        .iter()
        .map(|module| {
            let synced =
                SyncModule::with_resolver(module.clone(), collaborators.clone(), resolver.clone())?;
            Ok((module.module_name.clone(), synced))
        })
        .collect()
}
