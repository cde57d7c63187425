//! Channel lifecycle for one module
//!
//! ```text
//!   Closed ──open──▶ Opening ──ok──▶ Open ──close──▶ Closing ──▶ Closed
//!     ▲                 │
//!     └─────error───────┘
//! ```
//!
//! `Opening` and `Closing` carry the shared future of the operation in
//! flight. Every caller that arrives during that window awaits the same
//! future, so five concurrent opens produce a single subscription and five
//! identical results.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::backend::{ChannelHandle, Collaborators, FieldUpdate, SubscribeRequest, Subscription};
use crate::config::{ModuleConfig, ModuleMode};
use crate::error::{ChannelError, TemplateError};
use crate::query::{WhereClause, WhereClauseResolver};
use crate::template::{self, PlaceholderResolver};
use crate::variables::{PathVariableStore, PathVariables};

type PendingOpen = Shared<BoxFuture<'static, Result<ChannelHandle, ChannelError>>>;
type PendingClose = Shared<BoxFuture<'static, Result<(), ChannelError>>>;

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Opening,
    Open,
    Closing,
}

/// Options for [`ChannelLifecycleManager::close`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseOptions {
    /// Also forget path variables and reset the local module state
    pub clear_module: bool,
}

impl CloseOptions {
    pub fn clear_module() -> Self {
        Self { clear_module: true }
    }
}

enum Phase {
    Closed,
    Opening(PendingOpen),
    Open(ChannelHandle),
    Closing {
        pending: PendingClose,
        clear_module: Arc<AtomicBool>,
    },
}

impl Phase {
    fn state(&self) -> ChannelState {
        match self {
            Phase::Closed => ChannelState::Closed,
            Phase::Opening(_) => ChannelState::Opening,
            Phase::Open(_) => ChannelState::Open,
            Phase::Closing { .. } => ChannelState::Closing,
        }
    }
}

enum Step {
    AwaitOpen(PendingOpen),
    AwaitClose(PendingClose),
}

struct Inner {
    config: ModuleConfig,
    resolver: PlaceholderResolver,
    where_resolver: WhereClauseResolver,
    collaborators: Collaborators,
    phase: Mutex<Phase>,
    variables: Mutex<PathVariableStore>,
}

/// Opens and closes the remote channel of one module.
///
/// Owns the module's [`PathVariableStore`]; nothing else mutates it.
#[derive(Clone)]
pub struct ChannelLifecycleManager {
    inner: Arc<Inner>,
}

impl ChannelLifecycleManager {
    pub fn new(config: ModuleConfig, collaborators: Collaborators) -> Self {
        Self::with_resolver(config, collaborators, PlaceholderResolver::default())
    }

    pub fn with_resolver(
        config: ModuleConfig,
        collaborators: Collaborators,
        resolver: PlaceholderResolver,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                where_resolver: WhereClauseResolver::new(resolver.clone()),
                resolver,
                collaborators,
                phase: Mutex::new(Phase::Closed),
                variables: Mutex::new(PathVariableStore::new()),
            }),
        }
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.inner.config
    }

    pub(crate) fn collaborators(&self) -> &Collaborators {
        &self.inner.collaborators
    }

    pub fn state(&self) -> ChannelState {
        self.inner.lock_phase().state()
    }

    /// Handle of the established channel, if open.
    pub fn handle(&self) -> Option<ChannelHandle> {
        match &*self.inner.lock_phase() {
            Phase::Open(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    pub fn path_variables(&self) -> PathVariables {
        self.inner.lock_variables().snapshot()
    }

    /// Path template resolved against remembered variables and identity.
    pub fn resolved_path(&self) -> String {
        self.inner
            .resolve_path(&PathVariables::new())
            // the template was validated when the config was built
            .unwrap_or_else(|_| self.inner.config.path_template.to_string())
    }

    /// Configured filters resolved against remembered variables and identity.
    pub fn where_clauses(&self) -> Result<Vec<WhereClause>, TemplateError> {
        self.inner.resolve_where(&PathVariables::new())
    }

    /// Open the channel, or join the one already opening or open.
    ///
    /// `vars` are merged into the remembered path variables once any pending
    /// close has settled, so a teardown cannot discard them. Joining an
    /// in-flight open does not restart it with the new variables.
    pub async fn open(&self, vars: Option<PathVariables>) -> Result<ChannelHandle, ChannelError> {
        let supplied = vars.unwrap_or_default();

        loop {
            let step = {
                let mut phase = self.inner.lock_phase();
                if !matches!(&*phase, Phase::Closing { .. }) {
                    self.inner.remember(&supplied);
                }
                match &*phase {
                    Phase::Closed => {
                        let request = self.inner.subscribe_request(&supplied)?;
                        let pending = Arc::clone(&self.inner).run_open(request).boxed().shared();
                        *phase = Phase::Opening(pending.clone());
                        Step::AwaitOpen(pending)
                    }
                    Phase::Opening(pending) => {
                        debug!(module = %self.inner.config.module_name, "Joining in-flight open");
                        Step::AwaitOpen(pending.clone())
                    }
                    Phase::Open(handle) => {
                        debug!(module = %self.inner.config.module_name, path = %handle.path, "Channel already open");
                        return Ok(handle.clone());
                    }
                    Phase::Closing { pending, .. } => Step::AwaitClose(pending.clone()),
                }
            };

            match step {
                Step::AwaitOpen(pending) => return pending.await,
                Step::AwaitClose(pending) => {
                    // the closer already saw any error; the phase is Closed now
                    let _ = pending.await;
                }
            }
        }
    }

    /// Close the channel. A no-op when already closed.
    ///
    /// Waits for an in-flight open to settle first. With `clear_module`, the
    /// remembered path variables are dropped and the local module state is
    /// reset to the configured initial state.
    pub async fn close(&self, options: CloseOptions) -> Result<(), ChannelError> {
        loop {
            let step = {
                let mut phase = self.inner.lock_phase();
                match &*phase {
                    Phase::Closed => return Ok(()),
                    Phase::Opening(pending) => Step::AwaitOpen(pending.clone()),
                    Phase::Open(handle) => {
                        let clear_module = Arc::new(AtomicBool::new(options.clear_module));
                        let pending = Arc::clone(&self.inner)
                            .run_close(handle.clone(), Arc::clone(&clear_module))
                            .boxed()
                            .shared();
                        *phase = Phase::Closing {
                            pending: pending.clone(),
                            clear_module,
                        };
                        Step::AwaitClose(pending)
                    }
                    Phase::Closing {
                        pending,
                        clear_module,
                    } => {
                        debug!(module = %self.inner.config.module_name, "Joining in-flight close");
                        if options.clear_module {
                            clear_module.store(true, Ordering::SeqCst);
                        }
                        Step::AwaitClose(pending.clone())
                    }
                }
            };

            match step {
                Step::AwaitOpen(pending) => {
                    // a failed open leaves the phase Closed, which the next pass returns on
                    let _ = pending.await;
                }
                Step::AwaitClose(pending) => return pending.await,
            }
        }
    }
}

impl Inner {
    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_variables(&self) -> MutexGuard<'_, PathVariableStore> {
        self.variables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge open-time variables. Callers hold the phase lock.
    fn remember(&self, supplied: &PathVariables) {
        if !supplied.is_empty() {
            debug!(module = %self.config.module_name, ?supplied, "Merging path variables");
            self.lock_variables().merge(supplied.clone());
        }
    }

    fn identity(&self) -> Option<String> {
        self.collaborators.identity.current_identity_id()
    }

    fn resolve_path(&self, supplied: &PathVariables) -> Result<String, TemplateError> {
        let remembered = self.lock_variables().snapshot();
        self.config.path_template.resolve(
            &self.resolver,
            supplied,
            &remembered,
            self.identity().as_deref(),
        )
    }

    fn resolve_where(&self, supplied: &PathVariables) -> Result<Vec<WhereClause>, TemplateError> {
        let remembered = self.lock_variables().snapshot();
        self.where_resolver.resolve_all(
            &self.config.where_clauses,
            supplied,
            &remembered,
            self.identity().as_deref(),
        )
    }

    fn subscribe_request(&self, supplied: &PathVariables) -> Result<SubscribeRequest, ChannelError> {
        Ok(SubscribeRequest {
            module: self.config.module_name.clone(),
            path: self.resolve_path(supplied)?,
            mode: self.config.mode,
            where_clauses: self.resolve_where(supplied)?,
        })
    }

    async fn run_open(self: Arc<Self>, request: SubscribeRequest) -> Result<ChannelHandle, ChannelError> {
        info!(module = %request.module, path = %request.path, "Opening channel");

        match self.collaborators.subscriptions.subscribe(&request).await {
            Ok(subscription) => {
                self.materialize(&request, &subscription);
                *self.lock_phase() = Phase::Open(subscription.handle.clone());
                info!(module = %request.module, path = %request.path, id = subscription.handle.id, "Channel open");
                Ok(subscription.handle)
            }
            Err(err) => {
                warn!(module = %request.module, path = %request.path, error = %err, "Subscribe rejected");
                *self.lock_phase() = Phase::Closed;
                Err(err)
            }
        }
    }

    async fn run_close(
        self: Arc<Self>,
        handle: ChannelHandle,
        clear_module: Arc<AtomicBool>,
    ) -> Result<(), ChannelError> {
        let module = &self.config.module_name;
        info!(module = %module, path = %handle.path, "Closing channel");

        let result = self.collaborators.subscriptions.unsubscribe(&handle).await;
        if let Err(err) = &result {
            warn!(module = %module, path = %handle.path, error = %err, "Unsubscribe rejected");
        }

        // Read the flag and tear down under the phase lock so a joining
        // close cannot slip its request in after the check.
        let mut phase = self.lock_phase();
        if clear_module.load(Ordering::SeqCst) {
            self.teardown();
        }
        *phase = Phase::Closed;
        info!(module = %module, path = %handle.path, "Channel closed");
        result
    }

    /// Write the first server response into the local store.
    fn materialize(&self, request: &SubscribeRequest, subscription: &Subscription) {
        let store = &self.collaborators.store;
        if let Some(snapshot) = &subscription.snapshot {
            store.merge_fields(&request.module, snapshot);
        }
        if self.config.mode == ModuleMode::Doc {
            let id = request
                .path
                .rsplit('/')
                .next()
                .filter(|id| !id.is_empty() && template::is_fully_resolved(id));
            if let Some(id) = id {
                store.apply_field_update(&request.module, "id", FieldUpdate::Set(Value::from(id)));
            }
        }
    }

    fn teardown(&self) {
        debug!(module = %self.config.module_name, "Clearing module");
        self.lock_variables().clear();
        self.collaborators
            .store
            .reset_module_state(&self.config.module_name, &self.config.initial_state);
    }
}
