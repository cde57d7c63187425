//! Collaborators the sync core talks to.
//!
//! - `SubscriptionBackend`: opens and closes remote subscriptions
//! - `LocalStore`: the observable local state the remote data lands in
//! - `IdentityProvider`: who is signed in, if anyone
//!
//! In-memory implementations are provided for tests and embedding.

pub mod memory;
pub mod mock;
pub mod traits;

pub use memory::{MemoryStore, StaticIdentity};
pub use mock::MockSubscription;
pub use traits::{
    ChannelHandle, FieldUpdate, IdentityProvider, LocalStore, SubscribeRequest, Subscription,
    SubscriptionBackend,
};

use std::sync::Arc;

/// The set of collaborators a module is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub subscriptions: Arc<dyn SubscriptionBackend>,
    pub store: Arc<dyn LocalStore>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl Collaborators {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionBackend>,
        store: Arc<dyn LocalStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            subscriptions,
            store,
            identity,
        }
    }
}
