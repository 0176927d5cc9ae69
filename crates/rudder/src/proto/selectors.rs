// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Custom selector engine registration.
//!
//! Engines are JavaScript sources implementing the create/query/queryAll
//! contract, installed into execution contexts at context-creation time.
//! That makes registration a strictly before-first-context operation: once
//! any browser context exists on this session, registering fails. The
//! registry is per-session; independent sessions never share engines.

use crate::error::{Error, Result};
use crate::rpc::remote_object::{ObjectCore, RemoteObject};
use parking_lot::Mutex;
use regex::Regex;
use serde_json::json;
use std::any::Any;
use std::sync::{Arc, OnceLock};

/// Engine names the driver provides out of the box. `*:light` variants are
/// covered too; a registered name may not contain `:` at all.
const BUILTIN_ENGINES: &[&str] = &[
    "css",
    "xpath",
    "text",
    "id",
    "data-testid",
    "data-test-id",
    "data-test",
];

#[derive(Clone)]
pub struct Selectors {
    core: ObjectCore,
    registered: Arc<Mutex<Vec<String>>>,
}

impl Selectors {
    pub fn from_core(core: ObjectCore) -> Self {
        Self {
            core,
            registered: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register `name` so `name=body` selectors work in every context
    /// created afterwards.
    ///
    /// `script` is a JavaScript expression evaluating to the engine object.
    pub async fn register(&self, name: &str, script: &str) -> Result<()> {
        self.register_with_options(name, script, false).await
    }

    /// Like [`Selectors::register`]; `content_script: true` runs the engine
    /// in an isolated world.
    pub async fn register_with_options(
        &self,
        name: &str,
        script: &str,
        content_script: bool,
    ) -> Result<()> {
        validate_engine_name(name)?;
        if self.core.rpc().has_context() {
            return Err(Error::Validation(format!(
                "selectors.register: Selector engine \"{}\" must be registered before any \
                 browser context is created",
                name
            )));
        }
        {
            let registered = self.registered.lock();
            if registered.iter().any(|existing| existing == name) {
                return Err(Error::Validation(format!(
                    "selectors.register: \"{}\" selector engine has been already registered",
                    name
                )));
            }
        }
        let mut params = json!({"name": name, "source": script});
        if content_script {
            params["contentScript"] = json!(true);
        }
        self.core.channel().send_no_result("register", params).await?;
        self.registered.lock().push(name.to_string());
        Ok(())
    }

    /// Names registered on this session, in registration order.
    pub fn registered(&self) -> Vec<String> {
        self.registered.lock().clone()
    }
}

fn validate_engine_name(name: &str) -> Result<()> {
    static NAME: OnceLock<Regex> = OnceLock::new();
    let pattern = NAME.get_or_init(|| Regex::new(r"^[a-zA-Z_][a-zA-Z_0-9-]*$").unwrap());
    if !pattern.is_match(name) {
        return Err(Error::Validation(format!(
            "selectors.register: Selector engine name may only contain [a-zA-Z0-9_-] \
             characters and must not start with a digit: \"{}\"",
            name
        )));
    }
    if BUILTIN_ENGINES.contains(&name) {
        return Err(Error::Validation(format!(
            "selectors.register: \"{}\" is a predefined selector engine",
            name
        )));
    }
    Ok(())
}

impl RemoteObject for Selectors {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for Selectors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selectors")
            .field("registered", &self.registered())
            .finish()
    }
}
