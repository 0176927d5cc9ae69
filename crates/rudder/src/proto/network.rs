// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Network request and response objects.
//!
//! Thin read-only views over the driver's initializers; enough surface
//! for waiter predicates over `request`/`response` events.

use crate::rpc::remote_object::{ObjectCore, RemoteObject};
use parking_lot::Mutex;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

fn headers_from(initializer: &serde_json::Value) -> HashMap<String, String> {
    let Some(pairs) = initializer["headers"].as_array() else {
        return HashMap::new();
    };
    pairs
        .iter()
        .filter_map(|pair| {
            let name = pair["name"].as_str()?;
            let value = pair["value"].as_str()?;
            Some((name.to_lowercase(), value.to_string()))
        })
        .collect()
}

#[derive(Clone)]
pub struct Request {
    core: ObjectCore,
    failure: Arc<Mutex<Option<String>>>,
}

impl Request {
    pub fn from_core(core: ObjectCore) -> Self {
        Self {
            core,
            failure: Arc::new(Mutex::new(None)),
        }
    }

    pub fn url(&self) -> &str {
        self.core.initializer()["url"].as_str().unwrap_or_default()
    }

    /// HTTP method, e.g. "GET".
    pub fn method(&self) -> &str {
        self.core.initializer()["method"]
            .as_str()
            .unwrap_or_default()
    }

    /// Request headers, names lowercased.
    pub fn headers(&self) -> HashMap<String, String> {
        headers_from(self.core.initializer())
    }

    pub fn is_navigation_request(&self) -> bool {
        self.core.initializer()["isNavigationRequest"]
            .as_bool()
            .unwrap_or(false)
    }

    /// Error text if the request failed, `None` otherwise.
    pub fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }
}

impl RemoteObject for Request {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn on_event(&self, method: &str, params: &Value) {
        if method == "failed" {
            let text = params["failureText"].as_str().unwrap_or("failed");
            *self.failure.lock() = Some(text.to_string());
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method())
            .field("url", &self.url())
            .finish()
    }
}

#[derive(Clone)]
pub struct Response {
    core: ObjectCore,
}

impl Response {
    pub fn from_core(core: ObjectCore) -> Self {
        Self { core }
    }

    pub fn url(&self) -> &str {
        self.core.initializer()["url"].as_str().unwrap_or_default()
    }

    pub fn status(&self) -> u16 {
        self.core.initializer()["status"].as_u64().unwrap_or(0) as u16
    }

    pub fn status_text(&self) -> &str {
        self.core.initializer()["statusText"]
            .as_str()
            .unwrap_or_default()
    }

    /// Response headers, names lowercased.
    pub fn headers(&self) -> HashMap<String, String> {
        headers_from(self.core.initializer())
    }

    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status())
    }
}

impl RemoteObject for Response {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status())
            .field("url", &self.url())
            .finish()
    }
}
