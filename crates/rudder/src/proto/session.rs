// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! The driver's top-level object (wire type `Playwright`).
//!
//! Its initializer references the three browser-type objects and the
//! selector registry, all announced by the driver before the `initialize`
//! reply resolves.

use crate::error::{Error, Result};
use crate::proto::browser_type::BrowserType;
use crate::proto::selectors::Selectors;
use crate::proto::find_object;
use crate::rpc::remote_object::{ObjectCore, RemoteObject};
use std::any::Any;

#[derive(Clone)]
pub struct Session {
    core: ObjectCore,
}

impl Session {
    pub fn from_core(core: ObjectCore) -> Self {
        Self { core }
    }

    pub fn chromium(&self) -> Result<BrowserType> {
        self.browser_type("chromium")
    }

    pub fn firefox(&self) -> Result<BrowserType> {
        self.browser_type("firefox")
    }

    pub fn webkit(&self) -> Result<BrowserType> {
        self.browser_type("webkit")
    }

    /// The per-session selector engine registry.
    pub fn selectors(&self) -> Result<Selectors> {
        let guid = self.initializer_guid("selectors")?;
        find_object(self.core.rpc(), &guid)
    }

    fn browser_type(&self, name: &str) -> Result<BrowserType> {
        let guid = self.initializer_guid(name)?;
        find_object(self.core.rpc(), &guid)
    }

    fn initializer_guid(&self, field: &str) -> Result<String> {
        self.core.initializer()[field]["guid"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Protocol(format!("Session initializer is missing '{}.guid'", field))
            })
    }
}

impl RemoteObject for Session {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
