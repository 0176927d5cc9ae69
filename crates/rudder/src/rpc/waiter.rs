// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Event waiters.
//!
//! A waiter is a one-shot subscription to a named protocol event, with an
//! optional predicate over the event payload and a deadline. Waiters are
//! fed by the connection's dispatch loop. Delivery is non-consuming: one
//! event resolves every waiter it matches, so two tasks waiting for the
//! same `close` event both see it.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Predicate applied to an event payload before a waiter resolves.
pub type EventPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

struct Waiter {
    id: u64,
    event: String,
    predicate: Option<EventPredicate>,
    tx: oneshot::Sender<Result<Value>>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    waiters: Vec<Waiter>,
    /// Set once the owning object is disposed. New waiters are refused so
    /// nothing can block on an object that will never emit again.
    closed: Option<String>,
}

/// The set of live waiters on one protocol object.
#[derive(Default)]
pub struct WaiterSet {
    inner: Mutex<Inner>,
}

impl WaiterSet {
    /// Register a waiter for `event`. Fails immediately if the owning
    /// object has already been disposed.
    pub fn add(
        &self,
        event: &str,
        predicate: Option<EventPredicate>,
    ) -> Result<(u64, oneshot::Receiver<Result<Value>>)> {
        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.closed {
            return Err(Error::TargetClosed(reason.clone()));
        }
        inner.next_id += 1;
        let id = inner.next_id;
        let (tx, rx) = oneshot::channel();
        inner.waiters.push(Waiter {
            id,
            event: event.to_string(),
            predicate,
            tx,
        });
        Ok((id, rx))
    }

    /// Drop a waiter that gave up, typically on deadline expiry.
    pub fn remove(&self, id: u64) {
        self.inner.lock().waiters.retain(|w| w.id != id);
    }

    /// Resolve every waiter matching this event. Non-matching waiters are
    /// untouched.
    pub fn notify(&self, event: &str, params: &Value) {
        let mut inner = self.inner.lock();
        let mut i = 0;
        while i < inner.waiters.len() {
            let matched = inner.waiters[i].event == event
                && inner.waiters[i]
                    .predicate
                    .as_ref()
                    .is_none_or(|keep| keep.as_ref()(params));
            if matched {
                let waiter = inner.waiters.swap_remove(i);
                let _ = waiter.tx.send(Ok(params.clone()));
            } else {
                i += 1;
            }
        }
    }

    /// Fail every live waiter and refuse all future ones. Called when the
    /// owning object is disposed or the connection goes down.
    pub fn fail_all(&self, reason: &str) {
        let drained: Vec<Waiter> = {
            let mut inner = self.inner.lock();
            inner.closed = Some(reason.to_string());
            inner.waiters.drain(..).collect()
        };
        for waiter in drained {
            let _ = waiter.tx.send(Err(Error::TargetClosed(reason.to_string())));
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Await a waiter's receiver under a deadline, deregistering it on expiry
/// so a timed-out wait leaves nothing behind.
pub async fn await_waiter(
    set: &WaiterSet,
    id: u64,
    rx: oneshot::Receiver<Result<Value>>,
    event: &str,
    limit: Duration,
) -> Result<Value> {
    match tokio::time::timeout(limit, rx).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => Err(Error::ChannelClosed),
        Err(_) => {
            set.remove(id);
            Err(Error::Timeout(format!(
                "Timeout {}ms exceeded while waiting for event \"{}\"",
                limit.as_millis(),
                event
            )))
        }
    }
}
