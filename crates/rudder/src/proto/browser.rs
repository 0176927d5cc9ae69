// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! A launched browser instance.

use crate::api::ContextOptions;
use crate::error::Result;
use crate::proto::browser_context::BrowserContext;
use crate::proto::page::Page;
use crate::proto::{Ref, find_object};
use crate::rpc::remote_object::{ObjectCore, RemoteObject, Subscription};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A running browser, parent of its contexts.
///
/// Clones share state; the instance the registry owns and the one a caller
/// holds see the same context list and connected flag.
#[derive(Clone)]
pub struct Browser {
    core: ObjectCore,
    version: String,
    connected: Arc<AtomicBool>,
    contexts: Arc<Mutex<Vec<Arc<str>>>>,
}

#[derive(Deserialize)]
struct NewContextReply {
    context: Ref,
}

impl Browser {
    pub fn from_core(core: ObjectCore) -> Self {
        let version = core.initializer()["version"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Self {
            core,
            version,
            connected: Arc::new(AtomicBool::new(true)),
            contexts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// False once the browser has closed or the connection is gone.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.core.is_disposed()
    }

    /// Contexts created through this handle that are still alive. Local
    /// accessor; no round trip.
    pub fn contexts(&self) -> Vec<BrowserContext> {
        let mut guids = self.contexts.lock();
        let rpc = self.core.rpc();
        guids.retain(|guid| rpc.lookup(guid).is_some());
        guids
            .iter()
            .filter_map(|guid| find_object(rpc, guid).ok())
            .collect()
    }

    pub async fn new_context(&self) -> Result<BrowserContext> {
        self.new_context_with_options(ContextOptions::default()).await
    }

    pub async fn new_context_with_options(
        &self,
        options: ContextOptions,
    ) -> Result<BrowserContext> {
        options.validate()?;
        let mut params = options.normalize()?;
        if let Some(state) = options.resolved_storage_state().await? {
            params["storageState"] = serde_json::to_value(state)?;
        }
        let reply: NewContextReply = self.core.channel().send("newContext", params).await?;
        let context: BrowserContext = find_object(self.core.rpc(), &reply.context.guid)?;
        self.contexts.lock().push(Arc::clone(context.core().guid()));
        Ok(context)
    }

    /// Shortcut: a fresh context holding a single new page.
    pub async fn new_page(&self) -> Result<Page> {
        self.new_page_with_options(ContextOptions::default()).await
    }

    pub async fn new_page_with_options(&self, options: ContextOptions) -> Result<Page> {
        let context = self.new_context_with_options(options).await?;
        context.new_page().await
    }

    pub async fn close(&self) -> Result<()> {
        if self.core.is_disposed() {
            return Ok(());
        }
        self.core.channel().send_no_result("close", json!({})).await
    }

    /// Runs `listener` when the browser disconnects.
    pub fn on_disconnected(
        &self,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        self.core.subscribe("close", listener)
    }
}

impl RemoteObject for Browser {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn on_event(&self, method: &str, _params: &Value) {
        if method == "close" {
            self.connected.store(false, Ordering::SeqCst);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Browser")
            .field("guid", self.core.guid())
            .field("version", &self.version)
            .field("connected", &self.is_connected())
            .finish()
    }
}
