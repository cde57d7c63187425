//! docsync - client-side sync of local modules with a remote document store
//!
//! Keeps named modules of a local, observable store in step with remote
//! collections or documents reached over subscription channels.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               SyncModule                 │
//! │  (config, resolved path, where, patch)   │
//! └────────────────────┬─────────────────────┘
//!                      │
//!          ┌───────────┴────────────┐
//!          ▼                        ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ ChannelLifecycle │     │ PathVariableStore│
//! │ Manager          │────▶│ + Placeholder    │
//! │ (open / close)   │     │   Resolver       │
//! └────────┬─────────┘     └──────────────────┘
//!          │
//!   ┌──────┴──────────┬──────────────────┐
//!   ▼                 ▼                  ▼
//! Subscription    LocalStore        IdentityProvider
//! Backend         (ArrayDirective
//!                  materialized)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use docsync::{CloseOptions, ModuleConfig, SyncModule};
//!
//! let module = SyncModule::new(ModuleConfig::new("pets", "users/{userId}/pets/{name}")?, collaborators)?;
//!
//! // users/<signed-in id>/pets/Luca
//! module.open(Some([("name".into(), "Luca".into())].into())).await?;
//!
//! // Forget `name` and reset local state
//! module.close(CloseOptions::clear_module()).await?;
//! ```

pub mod array;
pub mod backend;
pub mod channel;
pub mod config;
pub mod error;
pub mod module;
pub mod query;
pub mod template;
pub mod variables;

pub use array::{is_reconciliation_directive, ArrayDirective};
pub use backend::{
    ChannelHandle, Collaborators, FieldUpdate, IdentityProvider, LocalStore, MemoryStore,
    MockSubscription, StaticIdentity, SubscribeRequest, Subscription, SubscriptionBackend,
};
pub use channel::{ChannelLifecycleManager, ChannelState, CloseOptions};
pub use config::{ModuleConfig, ModuleMode, SyncConfig};
pub use error::{ChannelError, Result, StateError, SyncError, TemplateError};
pub use module::{modules_from_config, SyncModule};
pub use query::{WhereClause, WhereClauseResolver, WhereOp};
pub use template::{PathTemplate, PlaceholderResolver, IDENTITY_PLACEHOLDER, NULL_IDENTITY};
pub use variables::{PathVariableStore, PathVariables};
