// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

// Options for BrowserType::launch() and the launch half of persistent
// contexts. All fields are optional; the driver applies its own defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOptions {
    /// Additional arguments for the browser process. Flags only; a bare
    /// page URL here is refused client-side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    /// Browser distribution channel, e.g. "chrome" or "msedge".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Enable the Chromium sandbox.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chromium_sandbox: Option<bool>,

    /// Auto-open DevTools for every tab.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devtools: Option<bool>,

    /// Directory downloads are saved into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads_path: Option<String>,

    /// Environment for the browser process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,

    /// Path to a custom browser executable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable_path: Option<String>,

    /// Firefox user preferences. Ignored by other browsers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firefox_user_prefs: Option<HashMap<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_sighup: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_sigint: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_sigterm: Option<bool>,

    /// Run without a visible browser window. Defaults to true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,

    /// Drop all default browser arguments, or just the listed ones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_default_args: Option<IgnoreDefaultArgs>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxySettings>,

    /// Slow every operation down by this many milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slow_mo: Option<f64>,

    /// Launch deadline in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,

    /// Directory traces are saved into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traces_dir: Option<String>,
}

/// Either disable all default browser arguments or filter specific ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IgnoreDefaultArgs {
    All(bool),
    Filter(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxySettings {
    /// Proxy URL, e.g. "http://proxy:8080".
    pub server: String,

    /// Comma-separated domains that bypass the proxy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bypass: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl LaunchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn chromium_sandbox(mut self, enabled: bool) -> Self {
        self.chromium_sandbox = Some(enabled);
        self
    }

    pub fn devtools(mut self, enabled: bool) -> Self {
        self.devtools = Some(enabled);
        self
    }

    pub fn downloads_path(mut self, path: impl Into<String>) -> Self {
        self.downloads_path = Some(path.into());
        self
    }

    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn executable_path(mut self, path: impl Into<String>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    pub fn firefox_user_prefs(mut self, prefs: HashMap<String, Value>) -> Self {
        self.firefox_user_prefs = Some(prefs);
        self
    }

    pub fn handle_sighup(mut self, enabled: bool) -> Self {
        self.handle_sighup = Some(enabled);
        self
    }

    pub fn handle_sigint(mut self, enabled: bool) -> Self {
        self.handle_sigint = Some(enabled);
        self
    }

    pub fn handle_sigterm(mut self, enabled: bool) -> Self {
        self.handle_sigterm = Some(enabled);
        self
    }

    pub fn headless(mut self, enabled: bool) -> Self {
        self.headless = Some(enabled);
        self
    }

    pub fn ignore_default_args(mut self, args: IgnoreDefaultArgs) -> Self {
        self.ignore_default_args = Some(args);
        self
    }

    pub fn proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn slow_mo(mut self, ms: f64) -> Self {
        self.slow_mo = Some(ms);
        self
    }

    pub fn timeout(mut self, ms: f64) -> Self {
        self.timeout = Some(ms);
        self
    }

    pub fn traces_dir(mut self, path: impl Into<String>) -> Self {
        self.traces_dir = Some(path.into());
        self
    }

    /// Reject options the driver would accept but misbehave on. Runs
    /// before anything is sent.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(args) = &self.args {
            for arg in args {
                if is_page_url(arg) {
                    return Err(Error::Validation(format!(
                        "Arguments can not specify page to be opened: {}",
                        arg
                    )));
                }
            }
        }
        Ok(())
    }

    /// Shape options for the wire:
    /// 1. a launch timeout is always present,
    /// 2. the env map becomes an array of name/value pairs,
    /// 3. `ignoreDefaultArgs: true` becomes `ignoreAllDefaultArgs`.
    pub(crate) fn normalize(&self) -> Result<Value> {
        let mut value = serde_json::to_value(self)?;

        if value.get("timeout").is_none() {
            value["timeout"] = json!(crate::DEFAULT_TIMEOUT_MS);
        }

        if let Some(env) = value.get_mut("env") {
            if let Some(map) = env.as_object() {
                let pairs: Vec<_> = map
                    .iter()
                    .map(|(name, v)| json!({"name": name, "value": v}))
                    .collect();
                *env = json!(pairs);
            }
        }

        if let Some(ignore) = value.get("ignoreDefaultArgs") {
            if let Some(all) = ignore.as_bool() {
                if all {
                    value["ignoreAllDefaultArgs"] = json!(true);
                }
                if let Some(object) = value.as_object_mut() {
                    object.remove("ignoreDefaultArgs");
                }
            }
        }

        Ok(value)
    }
}

/// Extra browser arguments must be flags. A bare page URL would open a
/// page behind the protocol's back, so it is refused up front.
fn is_page_url(arg: &str) -> bool {
    if arg.starts_with('-') {
        return false;
    }
    if arg.starts_with("about:") || arg.starts_with("data:") {
        return true;
    }
    match url::Url::parse(arg) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https" | "file"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chains() {
        let options = LaunchOptions::new()
            .headless(false)
            .slow_mo(100.0)
            .args(["--no-sandbox", "--disable-gpu"])
            .channel("chrome");

        assert_eq!(options.headless, Some(false));
        assert_eq!(options.slow_mo, Some(100.0));
        assert_eq!(options.args.as_ref().unwrap().len(), 2);
        assert_eq!(options.channel.as_deref(), Some("chrome"));
    }

    #[test]
    fn normalize_defaults_the_timeout() {
        let normalized = LaunchOptions::new().normalize().unwrap();
        assert_eq!(normalized["timeout"], json!(crate::DEFAULT_TIMEOUT_MS));

        let normalized = LaunchOptions::new().timeout(5000.0).normalize().unwrap();
        assert_eq!(normalized["timeout"], json!(5000.0));
    }

    #[test]
    fn normalize_flattens_env_to_pairs() {
        let options = LaunchOptions::new().env(HashMap::from([(
            "DISPLAY".to_string(),
            ":99".to_string(),
        )]));

        let normalized = options.normalize().unwrap();
        assert_eq!(normalized["env"], json!([{"name": "DISPLAY", "value": ":99"}]));
    }

    #[test]
    fn normalize_rewrites_ignore_all_default_args() {
        let all = LaunchOptions::new()
            .ignore_default_args(IgnoreDefaultArgs::All(true))
            .normalize()
            .unwrap();
        assert_eq!(all["ignoreAllDefaultArgs"], json!(true));
        assert!(all.get("ignoreDefaultArgs").is_none());

        let filtered = LaunchOptions::new()
            .ignore_default_args(IgnoreDefaultArgs::Filter(vec!["--mute-audio".to_string()]))
            .normalize()
            .unwrap();
        assert_eq!(filtered["ignoreDefaultArgs"], json!(["--mute-audio"]));
        assert!(filtered.get("ignoreAllDefaultArgs").is_none());
    }

    #[test]
    fn serializes_camel_case_and_skips_unset() {
        let value = serde_json::to_value(LaunchOptions::new().chromium_sandbox(true)).unwrap();
        assert_eq!(value, json!({"chromiumSandbox": true}));
    }

    #[test]
    fn page_urls_in_args_are_rejected() {
        for arg in [
            "http://localhost:8907/empty.html",
            "https://example.com",
            "file:///tmp/index.html",
            "about:blank",
            "data:text/html,<b>hi</b>",
        ] {
            let options = LaunchOptions::new().args([arg]);
            match options.validate() {
                Err(Error::Validation(message)) => {
                    assert!(message.contains("can not specify page"), "{}", message)
                }
                other => panic!("expected validation error for {arg}, got {:?}", other),
            }
        }
    }

    #[test]
    fn flags_in_args_are_accepted() {
        let options = LaunchOptions::new().args([
            "--no-sandbox",
            "--user-agent=http://not-a-page.example",
            "--headless=new",
        ]);
        assert!(options.validate().is_ok());
    }
}
