// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Option types accepted by the public API.
//!
//! Everything here is validated client-side before a frame is sent, then
//! reshaped into the parameter objects the driver expects.

mod context_options;
mod launch_options;

pub use context_options::{
    ColorScheme, ContextOptions, Contrast, Cookie, ForcedColors, Geolocation, HttpCredentials,
    NameValue, OriginState, ReducedMotion, SameSite, StorageState, Viewport,
};
pub use launch_options::{IgnoreDefaultArgs, LaunchOptions, ProxySettings};

use crate::error::Result;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;

/// Options for creating a driver session.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Environment overrides for the driver process. The child inherits the
    /// parent environment; entries here win per key.
    pub env: HashMap<String, String>,
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Combined launch and context options for a persistent context.
///
/// `launchPersistentContext` takes one flat parameter object covering both
/// halves, with the user-data directory injected alongside.
#[derive(Debug, Clone, Default)]
pub struct PersistentContextOptions {
    pub launch: LaunchOptions,
    pub context: ContextOptions,
}

impl PersistentContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn launch(mut self, launch: LaunchOptions) -> Self {
        self.launch = launch;
        self
    }

    pub fn context(mut self, context: ContextOptions) -> Self {
        self.context = context;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.launch.validate()?;
        self.context.validate()
    }

    /// Flatten both option sets into the single params object the wire call
    /// takes, with `userDataDir` injected.
    pub(crate) fn normalize(&self, user_data_dir: &Path) -> Result<Value> {
        let mut params = self.launch.normalize()?;
        let context = self.context.normalize()?;
        if let (Some(merged), Some(extra)) = (params.as_object_mut(), context.as_object()) {
            for (key, value) in extra {
                merged.insert(key.clone(), value.clone());
            }
        }
        params["userDataDir"] = json!(user_data_dir.to_string_lossy());
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistent_options_flatten_both_halves() {
        let options = PersistentContextOptions::new()
            .launch(LaunchOptions::new().headless(true))
            .context(ContextOptions::new().locale("fr-FR"));

        let params = options.normalize(Path::new("/tmp/profile")).unwrap();
        assert_eq!(params["headless"], json!(true));
        assert_eq!(params["locale"], json!("fr-FR"));
        assert_eq!(params["userDataDir"], json!("/tmp/profile"));
        assert_eq!(params["timeout"], json!(crate::DEFAULT_TIMEOUT_MS));
    }

    #[test]
    fn persistent_options_validate_both_halves() {
        let bad_launch = PersistentContextOptions::new()
            .launch(LaunchOptions::new().args(["https://example.com"]));
        assert!(bad_launch.validate().is_err());

        let bad_context = PersistentContextOptions::new()
            .context(ContextOptions::new().viewport(1, 1).no_default_viewport());
        assert!(bad_context.validate().is_err());
    }
}
