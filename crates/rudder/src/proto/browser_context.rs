// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! An isolated browser profile: cookie jar, storage, permissions, pages.
//!
//! The dispatch loop keeps the local page list current through the
//! context's `page` event, so `pages()` never needs a round trip. For a
//! persistent context the driver announces the pre-opened first page
//! before the launch reply resolves, and it shows up here the same way.

use crate::api::{Cookie, StorageState};
use crate::error::Result;
use crate::proto::browser::Browser;
use crate::proto::page::Page;
use crate::proto::{Ref, find_object};
use crate::rpc::remote_object::{ObjectCore, RemoteObject, Subscription};
use crate::rpc::waiter::EventPredicate;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct BrowserContext {
    core: ObjectCore,
    pages: Arc<Mutex<Vec<Arc<str>>>>,
    default_timeout: Arc<Mutex<Duration>>,
}

#[derive(Deserialize)]
struct NewPageReply {
    page: Ref,
}

#[derive(Deserialize)]
struct CookiesReply {
    cookies: Vec<Cookie>,
}

impl BrowserContext {
    pub fn from_core(core: ObjectCore) -> Self {
        Self {
            core,
            pages: Arc::new(Mutex::new(Vec::new())),
            default_timeout: Arc::new(Mutex::new(Duration::from_millis(
                crate::DEFAULT_TIMEOUT_MS as u64,
            ))),
        }
    }

    /// Pages currently open in this context, in creation order. Local
    /// accessor; no round trip.
    pub fn pages(&self) -> Vec<Page> {
        let mut guids = self.pages.lock();
        let rpc = self.core.rpc();
        guids.retain(|guid| rpc.lookup(guid).is_some());
        guids
            .iter()
            .filter_map(|guid| find_object(rpc, guid).ok())
            .collect()
    }

    pub async fn new_page(&self) -> Result<Page> {
        let reply: NewPageReply = self.core.channel().send("newPage", json!({})).await?;
        find_object(self.core.rpc(), &reply.page.guid)
    }

    /// The browser owning this context, or `None` for a persistent context
    /// the driver runs without exposing one.
    pub fn browser(&self) -> Option<Browser> {
        let parent = self.core.parent_guid()?;
        find_object(self.core.rpc(), parent).ok()
    }

    pub async fn grant_permissions(
        &self,
        permissions: &[&str],
        origin: Option<&str>,
    ) -> Result<()> {
        let mut params = json!({"permissions": permissions});
        if let Some(origin) = origin {
            params["origin"] = json!(origin);
        }
        self.core
            .channel()
            .send_no_result("grantPermissions", params)
            .await
    }

    pub async fn clear_permissions(&self) -> Result<()> {
        self.core
            .channel()
            .send_no_result("clearPermissions", json!({}))
            .await
    }

    pub async fn set_extra_http_headers(&self, headers: HashMap<String, String>) -> Result<()> {
        let pairs: Vec<Value> = headers
            .iter()
            .map(|(name, value)| json!({"name": name, "value": value}))
            .collect();
        self.core
            .channel()
            .send_no_result("setExtraHTTPHeaders", json!({"headers": pairs}))
            .await
    }

    /// Change the deadline `wait_for_event` uses when none is given.
    pub fn set_default_timeout(&self, timeout: Duration) {
        *self.default_timeout.lock() = timeout;
    }

    pub async fn cookies(&self) -> Result<Vec<Cookie>> {
        let reply: CookiesReply = self
            .core
            .channel()
            .send("cookies", json!({"urls": []}))
            .await?;
        Ok(reply.cookies)
    }

    pub async fn add_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        self.core
            .channel()
            .send_no_result("addCookies", json!({"cookies": cookies}))
            .await
    }

    /// Snapshot cookies and local storage, reusable to seed a new context.
    pub async fn storage_state(&self) -> Result<StorageState> {
        self.core.channel().send("storageState", json!({})).await
    }

    /// Close the context and every page in it. For a persistent context
    /// this also closes the browser and releases the user-data directory.
    pub async fn close(&self) -> Result<()> {
        if self.core.is_disposed() {
            return Ok(());
        }
        match self.core.channel().send_no_result("close", json!({})).await {
            // Driver and client race on teardown; a close that lost the
            // race is a success.
            Err(e) if e.is_target_closed() => Ok(()),
            outcome => outcome,
        }
    }

    /// Runs `listener` with each page opened in this context.
    pub fn on_page(&self, listener: impl Fn(Page) + Send + Sync + 'static) -> Subscription {
        let rpc = Arc::clone(self.core.rpc());
        self.core.subscribe("page", move |params| {
            if let Some(guid) = params["page"]["guid"].as_str() {
                if let Ok(page) = find_object::<Page>(&rpc, guid) {
                    listener(page);
                }
            }
        })
    }

    /// Runs `listener` once the context closes.
    pub fn on_close(&self, listener: impl Fn(&Value) + Send + Sync + 'static) -> Subscription {
        self.core.subscribe("close", listener)
    }

    /// Block until `event` fires, under the context's default timeout.
    pub async fn wait_for_event(&self, event: &str) -> Result<Value> {
        let timeout = *self.default_timeout.lock();
        self.core.wait_for_event(event, None, timeout).await
    }

    /// Full form: explicit predicate and deadline.
    pub async fn wait_for_event_with(
        &self,
        event: &str,
        predicate: Option<EventPredicate>,
        timeout: Duration,
    ) -> Result<Value> {
        self.core.wait_for_event(event, predicate, timeout).await
    }

    /// Wait for the next page opened in this context.
    pub async fn expect_page(&self) -> Result<Page> {
        let params = self.wait_for_event("page").await?;
        let guid = params["page"]["guid"].as_str().ok_or_else(|| {
            crate::error::Error::Protocol("'page' event is missing 'page.guid'".to_string())
        })?;
        find_object(self.core.rpc(), guid)
    }
}

impl RemoteObject for BrowserContext {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn on_event(&self, method: &str, params: &Value) {
        if method == "page" {
            if let Some(guid) = params["page"]["guid"].as_str() {
                self.pages.lock().push(Arc::from(guid));
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for BrowserContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserContext")
            .field("guid", self.core.guid())
            .field("pages", &self.pages.lock().len())
            .finish()
    }
}
