//! Mock subscription backend for testing.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::traits::*;
use crate::error::ChannelError;

/// Mock backend for testing.
///
/// Serves seeded documents per resolved path and counts calls.
pub struct MockSubscription {
    documents: Mutex<HashMap<String, Map<String, Value>>>,
    requests: Mutex<Vec<SubscribeRequest>>,
    active: Mutex<HashSet<u64>>,
    next_id: AtomicU64,
    subscribe_count: AtomicU32,
    unsubscribe_count: AtomicU32,
    reject_subscribe: AtomicBool,
    reject_unsubscribe: AtomicBool,
    latency: Option<Duration>,
}

impl MockSubscription {
    /// Create a new mock backend.
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            active: Mutex::new(HashSet::new()),
            next_id: AtomicU64::new(1),
            subscribe_count: AtomicU32::new(0),
            unsubscribe_count: AtomicU32::new(0),
            reject_subscribe: AtomicBool::new(false),
            reject_unsubscribe: AtomicBool::new(false),
            latency: None,
        }
    }

    /// Seed the fields served for `path`.
    pub fn with_document(self, path: impl Into<String>, fields: Value) -> Self {
        if let Value::Object(map) = fields {
            lock(&self.documents).insert(path.into(), map);
        }
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make subscribe calls fail.
    pub fn set_reject_subscribe(&self, reject: bool) {
        self.reject_subscribe.store(reject, Ordering::SeqCst);
    }

    /// Make unsubscribe calls fail.
    pub fn set_reject_unsubscribe(&self, reject: bool) {
        self.reject_unsubscribe.store(reject, Ordering::SeqCst);
    }

    /// Number of subscribe calls received.
    pub fn subscribe_count(&self) -> u32 {
        self.subscribe_count.load(Ordering::SeqCst)
    }

    /// Number of unsubscribe calls received.
    pub fn unsubscribe_count(&self) -> u32 {
        self.unsubscribe_count.load(Ordering::SeqCst)
    }

    /// Subscriptions currently live.
    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }

    /// Every subscribe request, in arrival order.
    pub fn requests(&self) -> Vec<SubscribeRequest> {
        lock(&self.requests).clone()
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MockSubscription {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl SubscriptionBackend for MockSubscription {
    async fn subscribe(&self, request: &SubscribeRequest) -> Result<Subscription, ChannelError> {
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());
        self.simulate_latency().await;

        if self.reject_subscribe.load(Ordering::SeqCst) {
            return Err(ChannelError::SubscribeRejected {
                path: request.path.clone(),
                reason: "Mock backend rejecting subscriptions".to_string(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.active).insert(id);

        let subscription = Subscription::new(ChannelHandle {
            id,
            path: request.path.clone(),
        });
        Ok(match lock(&self.documents).get(&request.path) {
            Some(fields) => subscription.with_snapshot(fields.clone()),
            None => subscription,
        })
    }

    async fn unsubscribe(&self, handle: &ChannelHandle) -> Result<(), ChannelError> {
        self.unsubscribe_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.reject_unsubscribe.load(Ordering::SeqCst) {
            return Err(ChannelError::UnsubscribeRejected {
                path: handle.path.clone(),
                reason: "Mock backend rejecting unsubscribes".to_string(),
            });
        }

        lock(&self.active).remove(&handle.id);
        Ok(())
    }
}
