// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! One browser engine: chromium, firefox or webkit.

use crate::api::{LaunchOptions, PersistentContextOptions};
use crate::error::{Error, Result};
use crate::proto::browser::Browser;
use crate::proto::browser_context::BrowserContext;
use crate::proto::{Ref, find_object};
use crate::rpc::remote_object::{ObjectCore, RemoteObject};
use serde::Deserialize;
use std::any::Any;
use std::path::Path;

/// A handle to one installed browser engine.
///
/// Obtained from the session (`rudder.chromium()` and friends); launches
/// either a regular browser or a persistent context bound to a user-data
/// directory.
#[derive(Clone)]
pub struct BrowserType {
    core: ObjectCore,
    name: String,
    executable_path: String,
}

#[derive(Deserialize)]
struct LaunchReply {
    browser: Ref,
}

#[derive(Deserialize)]
struct LaunchPersistentReply {
    context: Ref,
}

impl BrowserType {
    pub fn from_core(core: ObjectCore) -> Result<Self> {
        let name = core.initializer()["name"]
            .as_str()
            .ok_or_else(|| {
                Error::Protocol("BrowserType initializer is missing 'name'".to_string())
            })?
            .to_string();
        // Absent for remote engines; an empty path is fine.
        let executable_path = core.initializer()["executablePath"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            core,
            name,
            executable_path,
        })
    }

    /// "chromium", "firefox" or "webkit".
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executable_path(&self) -> &str {
        &self.executable_path
    }

    pub async fn launch(&self) -> Result<Browser> {
        self.launch_with_options(LaunchOptions::default()).await
    }

    pub async fn launch_with_options(&self, options: LaunchOptions) -> Result<Browser> {
        options.validate()?;
        let params = options.normalize()?;
        let reply: LaunchReply = self.core.channel().send("launch", params).await?;
        find_object(self.core.rpc(), &reply.browser.guid)
    }

    /// Launch a browser bound to an on-disk profile.
    ///
    /// The returned context owns the browser; closing it closes everything.
    /// The driver pre-opens a first page, so [`BrowserContext::pages`] is
    /// non-empty without an explicit `new_page`. The directory is exclusive
    /// while the context is open; relaunching against it sees the storage
    /// earlier runs wrote.
    pub async fn launch_persistent_context(
        &self,
        user_data_dir: impl AsRef<Path>,
    ) -> Result<BrowserContext> {
        self.launch_persistent_context_with_options(
            user_data_dir,
            PersistentContextOptions::default(),
        )
        .await
    }

    pub async fn launch_persistent_context_with_options(
        &self,
        user_data_dir: impl AsRef<Path>,
        options: PersistentContextOptions,
    ) -> Result<BrowserContext> {
        options.validate()?;
        let mut params = options.normalize(user_data_dir.as_ref())?;
        if let Some(state) = options.context.resolved_storage_state().await? {
            params["storageState"] = serde_json::to_value(state)?;
        }
        let reply: LaunchPersistentReply = self
            .core
            .channel()
            .send("launchPersistentContext", params)
            .await?;
        let context: BrowserContext = find_object(self.core.rpc(), &reply.context.guid)?;
        Ok(context)
    }
}

impl RemoteObject for BrowserType {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for BrowserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserType")
            .field("name", &self.name)
            .field("guid", self.core.guid())
            .finish()
    }
}
