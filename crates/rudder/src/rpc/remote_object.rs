// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Base state shared by every protocol object proxy.
//!
//! Each object the driver creates is mirrored client-side by a proxy
//! holding an [`ObjectCore`]: its GUID identity, its channel back to the
//! connection, the initializer it was created with, and its event plumbing
//! (persistent subscribers plus one-shot waiters). Proxies are cheap to
//! clone; clones share lifecycle state.

use crate::error::{Error, Result};
use crate::rpc::channel::Channel;
use crate::rpc::connection::Rpc;
use crate::rpc::waiter::{self, EventPredicate, WaiterSet};
use parking_lot::Mutex;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Why an object left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeReason {
    /// The driver disposed the object or an ancestor of it.
    Server,
    /// The connection failed or was closed.
    ConnectionClosed,
}

/// Implemented by every protocol object proxy.
pub trait RemoteObject: Send + Sync {
    fn core(&self) -> &ObjectCore;

    /// Proxy-specific reaction to a protocol event, invoked by the dispatch
    /// loop before generic subscriber and waiter fan-out.
    fn on_event(&self, method: &str, params: &Value) {
        let _ = (method, params);
    }

    /// Downcast support for typed registry lookups.
    fn as_any(&self) -> &dyn Any;
}

type Listener = Arc<dyn Fn(&Value) + Send + Sync>;
type ListenerMap = Mutex<HashMap<u64, (String, Listener)>>;

/// Identity, channel, and event state of one protocol object.
#[derive(Clone)]
pub struct ObjectCore {
    guid: Arc<str>,
    type_name: Arc<str>,
    parent: Option<Arc<str>>,
    channel: Channel,
    initializer: Arc<Value>,
    disposed: Arc<AtomicBool>,
    listeners: Arc<ListenerMap>,
    next_listener_id: Arc<AtomicU64>,
    waiters: Arc<WaiterSet>,
}

impl ObjectCore {
    pub fn new(
        rpc: Arc<dyn Rpc>,
        parent: Option<Arc<str>>,
        type_name: &str,
        guid: Arc<str>,
        initializer: Value,
    ) -> Self {
        Self {
            channel: Channel::new(Arc::clone(&guid), rpc),
            guid,
            type_name: Arc::from(type_name),
            parent,
            initializer: Arc::new(initializer),
            disposed: Arc::new(AtomicBool::new(false)),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_listener_id: Arc::new(AtomicU64::new(0)),
            waiters: Arc::new(WaiterSet::default()),
        }
    }

    pub fn guid(&self) -> &Arc<str> {
        &self.guid
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn parent_guid(&self) -> Option<&Arc<str>> {
        self.parent.as_ref()
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn rpc(&self) -> &Arc<dyn Rpc> {
        self.channel.rpc()
    }

    /// The state the driver created this object with.
    pub fn initializer(&self) -> &Value {
        &self.initializer
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Message used when operations are refused because this object is gone.
    pub fn closed_message(&self) -> String {
        format!("{} has been closed", self.type_name)
    }

    /// Register a persistent event listener. The listener stays installed
    /// until [`Subscription::unsubscribe`] or disposal.
    pub fn subscribe(
        &self,
        event: &str,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .insert(id, (event.to_string(), Arc::new(listener)));
        Subscription {
            listeners: Arc::downgrade(&self.listeners),
            id,
        }
    }

    /// Fan an event out to listeners, then waiters. Called on the dispatch
    /// loop, so listeners run in protocol order.
    pub fn emit(&self, event: &str, params: &Value) {
        let matched: Vec<Listener> = {
            let listeners = self.listeners.lock();
            listeners
                .values()
                .filter(|(name, _)| name == event)
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in matched {
            listener.as_ref()(params);
        }
        self.waiters.notify(event, params);
    }

    /// Block until `event` fires with a payload accepted by `predicate`,
    /// the deadline expires, or this object is disposed.
    pub async fn wait_for_event(
        &self,
        event: &str,
        predicate: Option<EventPredicate>,
        limit: Duration,
    ) -> Result<Value> {
        if self.is_disposed() {
            return Err(Error::TargetClosed(self.closed_message()));
        }
        let (id, rx) = self.waiters.add(event, predicate)?;
        waiter::await_waiter(&self.waiters, id, rx, event, limit).await
    }

    /// Flip to the disposed state: fail waiters, drop listeners. Idempotent.
    pub(crate) fn mark_disposed(&self, reason: DisposeReason) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let message = match reason {
            DisposeReason::Server => self.closed_message(),
            DisposeReason::ConnectionClosed => "connection closed".to_string(),
        };
        self.waiters.fail_all(&message);
        self.listeners.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn waiter_count(&self) -> usize {
        self.waiters.len()
    }
}

impl fmt::Debug for ObjectCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCore")
            .field("guid", &self.guid)
            .field("type", &self.type_name)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Handle to a registered listener. Dropping the handle leaves the
/// listener installed; call [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    listeners: Weak<ListenerMap>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().remove(&self.id);
        }
    }
}
