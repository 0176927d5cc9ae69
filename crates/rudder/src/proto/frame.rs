// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! One frame in a page's frame tree.
//!
//! The main frame carries most of the page's document operations. Frame
//! URLs are kept current by the `navigated` event, which is also re-emitted
//! on the owning page as `frameNavigated` for page-level subscribers.

use crate::error::{Error, Result};
use crate::proto::element_handle::ElementHandle;
use crate::proto::js_handle::JsHandle;
use crate::proto::locator::Locator;
use crate::proto::network::Response;
use crate::proto::values;
use crate::proto::{Ref, find_object};
use crate::rpc::remote_object::{ObjectCore, RemoteObject};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::any::Any;
use std::path::Path;
use std::sync::Arc;

/// How far a navigation must get before `goto` resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[serde(rename = "networkidle")]
    NetworkIdle,
    Commit,
}

#[derive(Debug, Clone, Default)]
pub struct GotoOptions {
    pub timeout: Option<f64>,
    pub wait_until: Option<WaitUntil>,
}

/// Element state `wait_for_selector` waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitForState {
    Attached,
    Detached,
    Visible,
    Hidden,
}

#[derive(Clone)]
pub struct Frame {
    core: ObjectCore,
    name: String,
    url: Arc<Mutex<String>>,
    parent_frame: Option<Arc<str>>,
}

#[derive(Deserialize)]
struct ValueReply {
    value: Value,
}

#[derive(Deserialize)]
struct MaybeElementReply {
    element: Option<Ref>,
}

#[derive(Deserialize)]
struct HandleReply {
    handle: Ref,
}

impl Frame {
    pub fn from_core(core: ObjectCore) -> Self {
        let initializer = core.initializer();
        let name = initializer["name"].as_str().unwrap_or_default().to_string();
        let url = initializer["url"].as_str().unwrap_or_default().to_string();
        let parent_frame = initializer["parentFrame"]["guid"].as_str().map(Arc::from);
        Self {
            name,
            url: Arc::new(Mutex::new(url)),
            parent_frame,
            core,
        }
    }

    /// The frame's current URL, tracked locally from navigation events.
    pub fn url(&self) -> String {
        self.url.lock().clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_frame(&self) -> Option<Frame> {
        let parent = self.parent_frame.as_ref()?;
        find_object(self.core.rpc(), parent).ok()
    }

    /// Frames attached under this one, in creation order.
    pub fn child_frames(&self) -> Vec<Frame> {
        let Ok(page) = self.page() else {
            return Vec::new();
        };
        let guid = self.core.guid();
        page.frames()
            .into_iter()
            .filter(|frame| frame.parent_frame.as_deref() == Some(&**guid))
            .collect()
    }

    /// The page owning this frame.
    pub fn page(&self) -> Result<crate::proto::page::Page> {
        let parent = self.core.parent_guid().ok_or_else(|| {
            Error::Protocol("Frame has no parent page".to_string())
        })?;
        find_object(self.core.rpc(), parent)
    }

    pub async fn goto(&self, url: &str) -> Result<Option<Response>> {
        self.goto_with_options(url, GotoOptions::default()).await
    }

    pub async fn goto_with_options(
        &self,
        url: &str,
        options: GotoOptions,
    ) -> Result<Option<Response>> {
        #[derive(Deserialize)]
        struct GotoReply {
            response: Option<Ref>,
        }
        let mut params = json!({
            "url": url,
            "timeout": options.timeout.unwrap_or(crate::DEFAULT_TIMEOUT_MS),
        });
        if let Some(wait_until) = options.wait_until {
            params["waitUntil"] = serde_json::to_value(wait_until)?;
        }
        let reply: GotoReply = self.core.channel().send("goto", params).await?;
        match reply.response {
            Some(response) => Ok(Some(find_object(self.core.rpc(), &response.guid)?)),
            None => Ok(None),
        }
    }

    pub async fn content(&self) -> Result<String> {
        let reply: ValueReply = self.core.channel().send("content", json!({})).await?;
        Ok(reply.value.as_str().unwrap_or_default().to_string())
    }

    pub async fn set_content(&self, html: &str) -> Result<()> {
        self.core
            .channel()
            .send_no_result(
                "setContent",
                json!({"html": html, "timeout": crate::DEFAULT_TIMEOUT_MS}),
            )
            .await
    }

    pub async fn title(&self) -> Result<String> {
        let reply: ValueReply = self.core.channel().send("title", json!({})).await?;
        Ok(reply.value.as_str().unwrap_or_default().to_string())
    }

    pub async fn inner_html(&self, selector: &str) -> Result<String> {
        self.string_of("innerHTML", selector).await
    }

    pub async fn inner_text(&self, selector: &str) -> Result<String> {
        self.string_of("innerText", selector).await
    }

    /// `textContent` of the first match, or `None` for elements without one.
    pub async fn text_content(&self, selector: &str) -> Result<Option<String>> {
        #[derive(Deserialize)]
        struct TextReply {
            value: Option<String>,
        }
        let reply: TextReply = self
            .core
            .channel()
            .send("textContent", self.selector_params(selector))
            .await?;
        Ok(reply.value)
    }

    pub async fn get_attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        #[derive(Deserialize)]
        struct AttributeReply {
            value: Option<String>,
        }
        let mut params = self.selector_params(selector);
        params["name"] = json!(name);
        let reply: AttributeReply = self.core.channel().send("getAttribute", params).await?;
        Ok(reply.value)
    }

    /// Run JavaScript in the frame and decode the result into plain JSON.
    pub async fn evaluate(&self, expression: &str, arg: Value) -> Result<Value> {
        let params = json!({
            "expression": expression,
            "arg": values::to_argument(&arg),
        });
        let reply: ValueReply = self
            .core
            .channel()
            .send("evaluateExpression", params)
            .await?;
        Ok(values::from_tagged(&reply.value))
    }

    /// Like [`Frame::evaluate`], keeping the result alive driver-side.
    pub async fn evaluate_handle(&self, expression: &str, arg: Value) -> Result<JsHandle> {
        let params = json!({
            "expression": expression,
            "arg": values::to_argument(&arg),
        });
        let reply: HandleReply = self
            .core
            .channel()
            .send("evaluateExpressionHandle", params)
            .await?;
        find_object(self.core.rpc(), &reply.handle.guid)
    }

    pub async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>> {
        let reply: MaybeElementReply = self
            .core
            .channel()
            .send("querySelector", json!({"selector": selector}))
            .await?;
        match reply.element {
            Some(element) => Ok(Some(find_object(self.core.rpc(), &element.guid)?)),
            None => Ok(None),
        }
    }

    /// Wait for the first match to reach `state` (default: visible).
    /// `None` only for the detached/hidden states.
    pub async fn wait_for_selector(
        &self,
        selector: &str,
        state: Option<WaitForState>,
    ) -> Result<Option<ElementHandle>> {
        let mut params = self.selector_params(selector);
        if let Some(state) = state {
            params["state"] = serde_json::to_value(state)?;
        }
        let reply: MaybeElementReply =
            self.core.channel().send("waitForSelector", params).await?;
        match reply.element {
            Some(element) => Ok(Some(find_object(self.core.rpc(), &element.guid)?)),
            None => Ok(None),
        }
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        self.core
            .channel()
            .send_no_result("click", self.selector_params(selector))
            .await
    }

    pub async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let mut params = self.selector_params(selector);
        params["value"] = json!(value);
        self.core.channel().send_no_result("fill", params).await
    }

    /// Attach files to an `<input type=file>`. Contents are read here and
    /// travel base64-encoded; an empty list clears the selection.
    pub async fn set_input_files(&self, selector: &str, files: &[&Path]) -> Result<()> {
        let mut payloads = Vec::with_capacity(files.len());
        for file in files {
            let buffer = tokio::fs::read(file).await?;
            let name = file
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| {
                    Error::Validation(format!("not a file path: {}", file.display()))
                })?;
            payloads.push(json!({
                "name": name,
                "buffer": BASE64.encode(&buffer),
            }));
        }
        let mut params = self.selector_params(selector);
        params["payloads"] = json!(payloads);
        self.core
            .channel()
            .send_no_result("setInputFiles", params)
            .await
    }

    /// Matches for `selector`, without keeping handles alive.
    pub async fn query_count(&self, selector: &str) -> Result<usize> {
        let reply: ValueReply = self
            .core
            .channel()
            .send("queryCount", json!({"selector": selector}))
            .await?;
        Ok(reply.value.as_u64().unwrap_or(0) as usize)
    }

    pub fn locator(&self, selector: &str) -> Locator {
        Locator::new(self.clone(), selector)
    }

    async fn string_of(&self, method: &str, selector: &str) -> Result<String> {
        let reply: ValueReply = self
            .core
            .channel()
            .send(method, self.selector_params(selector))
            .await?;
        Ok(reply.value.as_str().unwrap_or_default().to_string())
    }

    fn selector_params(&self, selector: &str) -> Value {
        json!({
            "selector": selector,
            "strict": true,
            "timeout": crate::DEFAULT_TIMEOUT_MS,
        })
    }
}

impl RemoteObject for Frame {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn on_event(&self, method: &str, params: &Value) {
        if method == "navigated" {
            if let Some(url) = params["url"].as_str() {
                *self.url.lock() = url.to_string();
            }
            // Surface the navigation on the owning page for subscribers
            // that do not track individual frames.
            if let Some(page_guid) = self.core.parent_guid() {
                if let Some(page) = self.core.rpc().lookup(page_guid) {
                    page.core().emit("frameNavigated", params);
                }
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("guid", self.core.guid())
            .field("url", &self.url())
            .finish()
    }
}
