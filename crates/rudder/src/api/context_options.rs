// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

// Options shared by Browser::new_context(), Browser::new_page() and the
// context half of persistent contexts.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorScheme {
    Light,
    Dark,
    NoPreference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReducedMotion {
    Reduce,
    NoPreference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Contrast {
    NoPreference,
    More,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForcedColors {
    Active,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// One cookie, in the shape the driver speaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Either `url`, or `domain` plus `path`, must be set when adding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Unix time in seconds; -1 marks a session cookie.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<SameSite>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            url: None,
            domain: None,
            path: None,
            expires: None,
            http_only: None,
            secure: None,
            same_site: None,
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn domain_path(mut self, domain: impl Into<String>, path: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self.path = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
    pub origin: String,
    pub local_storage: Vec<NameValue>,
}

/// Cookies and local storage captured from a context, reusable to seed a
/// fresh one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageState {
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    #[serde(default)]
    pub origins: Vec<OriginState>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,

    /// Let pages size themselves to the window instead of a fixed
    /// viewport. Mutually exclusive with `viewport`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_default_viewport: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// BCP 47 tag, e.g. "de-DE".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// IANA zone name, e.g. "Europe/Berlin".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<Geolocation>,

    /// Permissions granted to every page in the context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,

    #[serde(
        rename = "extraHTTPHeaders",
        skip_serializing_if = "Option::is_none"
    )]
    pub extra_http_headers: Option<HashMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub offline: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_credentials: Option<HttpCredentials>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_scale_factor: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_mobile: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_touch: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<ColorScheme>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduced_motion: Option<ReducedMotion>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<Contrast>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_colors: Option<ForcedColors>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_downloads: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_https_errors: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_script_enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bypass_csp: Option<bool>,

    /// Base for relative URLs in navigation calls.
    #[serde(rename = "baseURL", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Inline storage to seed the context with. Travels on the wire after
    /// [`ContextOptions::resolved_storage_state`] folds the path variant in.
    #[serde(skip)]
    pub storage_state: Option<StorageState>,

    /// Path to a storage state JSON file, read client-side.
    #[serde(skip)]
    pub storage_state_path: Option<PathBuf>,
}

impl ContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Some(Viewport { width, height });
        self
    }

    pub fn no_default_viewport(mut self) -> Self {
        self.no_default_viewport = Some(true);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn timezone_id(mut self, timezone_id: impl Into<String>) -> Self {
        self.timezone_id = Some(timezone_id.into());
        self
    }

    pub fn geolocation(mut self, geolocation: Geolocation) -> Self {
        self.geolocation = Some(geolocation);
        self
    }

    pub fn permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = Some(permissions.into_iter().map(Into::into).collect());
        self
    }

    pub fn extra_http_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_http_headers = Some(headers);
        self
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = Some(offline);
        self
    }

    pub fn http_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.http_credentials = Some(HttpCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn device_scale_factor(mut self, factor: f64) -> Self {
        self.device_scale_factor = Some(factor);
        self
    }

    pub fn is_mobile(mut self, is_mobile: bool) -> Self {
        self.is_mobile = Some(is_mobile);
        self
    }

    pub fn has_touch(mut self, has_touch: bool) -> Self {
        self.has_touch = Some(has_touch);
        self
    }

    pub fn color_scheme(mut self, scheme: ColorScheme) -> Self {
        self.color_scheme = Some(scheme);
        self
    }

    pub fn reduced_motion(mut self, motion: ReducedMotion) -> Self {
        self.reduced_motion = Some(motion);
        self
    }

    pub fn contrast(mut self, contrast: Contrast) -> Self {
        self.contrast = Some(contrast);
        self
    }

    pub fn forced_colors(mut self, colors: ForcedColors) -> Self {
        self.forced_colors = Some(colors);
        self
    }

    pub fn accept_downloads(mut self, accept: bool) -> Self {
        self.accept_downloads = Some(accept);
        self
    }

    pub fn ignore_https_errors(mut self, ignore: bool) -> Self {
        self.ignore_https_errors = Some(ignore);
        self
    }

    pub fn java_script_enabled(mut self, enabled: bool) -> Self {
        self.java_script_enabled = Some(enabled);
        self
    }

    pub fn bypass_csp(mut self, bypass: bool) -> Self {
        self.bypass_csp = Some(bypass);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn storage_state(mut self, state: StorageState) -> Self {
        self.storage_state = Some(state);
        self
    }

    pub fn storage_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_state_path = Some(path.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.no_default_viewport == Some(true) && self.viewport.is_some() {
            return Err(Error::Validation(
                "can not combine viewport with noDefaultViewport".to_string(),
            ));
        }
        Ok(())
    }

    /// Shape options for the wire. Headers become an array of name/value
    /// pairs; storage state is attached separately once resolved.
    pub(crate) fn normalize(&self) -> Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Some(headers) = value.get_mut("extraHTTPHeaders") {
            if let Some(map) = headers.as_object() {
                let pairs: Vec<_> = map
                    .iter()
                    .map(|(name, v)| json!({"name": name, "value": v}))
                    .collect();
                *headers = json!(pairs);
            }
        }
        Ok(value)
    }

    /// The storage state that should travel on the wire: the inline state
    /// if set, otherwise the contents of `storage_state_path`.
    pub(crate) async fn resolved_storage_state(&self) -> Result<Option<StorageState>> {
        if let Some(state) = &self.storage_state {
            return Ok(Some(state.clone()));
        }
        let Some(path) = &self.storage_state_path else {
            return Ok(None);
        };
        let raw = tokio::fs::read(path).await?;
        let state = serde_json::from_slice(&raw)?;
        Ok(Some(state))
    }
}
