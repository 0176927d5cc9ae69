// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! A single tab. Document operations delegate to the main frame.

use crate::api::Viewport;
use crate::error::{Error, Result};
use crate::proto::browser_context::BrowserContext;
use crate::proto::element_handle::ElementHandle;
use crate::proto::frame::{Frame, GotoOptions};
use crate::proto::js_handle::JsHandle;
use crate::proto::locator::Locator;
use crate::proto::network::Response;
use crate::proto::{Ref, find_object};
use crate::rpc::remote_object::{ObjectCore, RemoteObject, Subscription};
use crate::rpc::waiter::EventPredicate;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Clone)]
pub struct Page {
    core: ObjectCore,
    main_frame: Arc<str>,
    frames: Arc<Mutex<Vec<Arc<str>>>>,
    closed: Arc<AtomicBool>,
}

#[derive(Deserialize)]
struct FrameRefParams {
    frame: Ref,
}

impl Page {
    pub fn from_core(core: ObjectCore) -> Result<Self> {
        let main_frame: Arc<str> = core.initializer()["mainFrame"]["guid"]
            .as_str()
            .map(Arc::from)
            .ok_or_else(|| {
                Error::Protocol("Page initializer is missing 'mainFrame.guid'".to_string())
            })?;
        let closed = core.initializer()["isClosed"].as_bool().unwrap_or(false);
        Ok(Self {
            frames: Arc::new(Mutex::new(vec![Arc::clone(&main_frame)])),
            main_frame,
            closed: Arc::new(AtomicBool::new(closed)),
            core,
        })
    }

    pub fn main_frame(&self) -> Result<Frame> {
        find_object(self.core.rpc(), &self.main_frame)
    }

    /// All frames in the page, main frame first. Local accessor.
    pub fn frames(&self) -> Vec<Frame> {
        let mut guids = self.frames.lock();
        let rpc = self.core.rpc();
        guids.retain(|guid| rpc.lookup(guid).is_some());
        guids
            .iter()
            .filter_map(|guid| find_object(rpc, guid).ok())
            .collect()
    }

    /// The context owning this page.
    pub fn context(&self) -> Result<BrowserContext> {
        let parent = self.core.parent_guid().ok_or_else(|| {
            Error::Protocol("Page has no parent context".to_string())
        })?;
        find_object(self.core.rpc(), parent)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.core.is_disposed()
    }

    pub fn url(&self) -> Result<String> {
        Ok(self.main_frame()?.url())
    }

    pub async fn goto(&self, url: &str) -> Result<Option<Response>> {
        self.main_frame()?.goto(url).await
    }

    pub async fn goto_with_options(
        &self,
        url: &str,
        options: GotoOptions,
    ) -> Result<Option<Response>> {
        self.main_frame()?.goto_with_options(url, options).await
    }

    pub async fn content(&self) -> Result<String> {
        self.main_frame()?.content().await
    }

    pub async fn set_content(&self, html: &str) -> Result<()> {
        self.main_frame()?.set_content(html).await
    }

    pub async fn title(&self) -> Result<String> {
        self.main_frame()?.title().await
    }

    pub async fn inner_html(&self, selector: &str) -> Result<String> {
        self.main_frame()?.inner_html(selector).await
    }

    pub async fn inner_text(&self, selector: &str) -> Result<String> {
        self.main_frame()?.inner_text(selector).await
    }

    pub async fn evaluate(&self, expression: &str, arg: Value) -> Result<Value> {
        self.main_frame()?.evaluate(expression, arg).await
    }

    pub async fn evaluate_handle(&self, expression: &str, arg: Value) -> Result<JsHandle> {
        self.main_frame()?.evaluate_handle(expression, arg).await
    }

    pub async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>> {
        self.main_frame()?.query_selector(selector).await
    }

    pub fn locator(&self, selector: &str) -> Result<Locator> {
        Ok(self.main_frame()?.locator(selector))
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        self.main_frame()?.click(selector).await
    }

    pub async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        self.main_frame()?.fill(selector, value).await
    }

    pub async fn reload(&self) -> Result<Option<Response>> {
        #[derive(Deserialize)]
        struct ReloadReply {
            response: Option<Ref>,
        }
        let reply: ReloadReply = self
            .core
            .channel()
            .send("reload", json!({"timeout": crate::DEFAULT_TIMEOUT_MS}))
            .await?;
        match reply.response {
            Some(response) => Ok(Some(find_object(self.core.rpc(), &response.guid)?)),
            None => Ok(None),
        }
    }

    pub async fn set_viewport_size(&self, width: u32, height: u32) -> Result<()> {
        self.core
            .channel()
            .send_no_result(
                "setViewportSize",
                json!({"viewportSize": Viewport { width, height }}),
            )
            .await
    }

    pub async fn close(&self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        match self.core.channel().send_no_result("close", json!({})).await {
            Err(e) if e.is_target_closed() => Ok(()),
            outcome => outcome,
        }
    }

    /// Runs `listener` once the page closes.
    pub fn on_close(&self, listener: impl Fn(&Value) + Send + Sync + 'static) -> Subscription {
        self.core.subscribe("close", listener)
    }

    /// Runs `listener` whenever any frame in the page finishes a
    /// navigation. The payload carries the frame's new `url`.
    pub fn on_frame_navigated(
        &self,
        listener: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        self.core.subscribe("frameNavigated", listener)
    }

    pub async fn wait_for_event(&self, event: &str) -> Result<Value> {
        self.wait_for_event_with(
            event,
            None,
            Duration::from_millis(crate::DEFAULT_TIMEOUT_MS as u64),
        )
        .await
    }

    pub async fn wait_for_event_with(
        &self,
        event: &str,
        predicate: Option<EventPredicate>,
        timeout: Duration,
    ) -> Result<Value> {
        self.core.wait_for_event(event, predicate, timeout).await
    }
}

impl RemoteObject for Page {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn on_event(&self, method: &str, params: &Value) {
        match method {
            "close" | "crash" => {
                self.closed.store(true, Ordering::SeqCst);
            }
            "frameAttached" => {
                if let Ok(attached) = serde_json::from_value::<FrameRefParams>(params.clone()) {
                    self.frames.lock().push(attached.frame.guid);
                }
            }
            "frameDetached" => {
                if let Some(guid) = params["frame"]["guid"].as_str() {
                    self.frames.lock().retain(|frame| frame.as_ref() != guid);
                }
            }
            _ => {}
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("guid", self.core.guid())
            .field("closed", &self.is_closed())
            .finish()
    }
}
