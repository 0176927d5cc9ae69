// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Handle to a DOM element.
//!
//! Carries the [`JsHandle`](crate::proto::js_handle::JsHandle) surface
//! (evaluate, properties, json value, dispose) plus element operations.
//! The two are separate proxy types dispatched on the wire type tag; the
//! driver only ever creates an `ElementHandle` for element values.

use crate::error::{Error, Result};
use crate::proto::frame::Frame;
use crate::proto::js_handle::JsHandle;
use crate::proto::values;
use crate::proto::{Ref, find_object};
use crate::rpc::remote_object::{ObjectCore, RemoteObject};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};
use std::any::Any;
use std::path::Path;

#[derive(Clone)]
pub struct ElementHandle {
    core: ObjectCore,
}

#[derive(Deserialize)]
struct ValueReply {
    value: Value,
}

#[derive(Deserialize)]
struct MaybeFrameReply {
    frame: Option<Ref>,
}

#[derive(Deserialize)]
struct HandleReply {
    handle: Ref,
}

impl ElementHandle {
    pub fn from_core(core: ObjectCore) -> Self {
        Self { core }
    }

    pub async fn inner_html(&self) -> Result<String> {
        self.string_of("innerHTML").await
    }

    pub async fn inner_text(&self) -> Result<String> {
        self.string_of("innerText").await
    }

    pub async fn text_content(&self) -> Result<Option<String>> {
        #[derive(Deserialize)]
        struct TextReply {
            value: Option<String>,
        }
        let reply: TextReply = self.core.channel().send("textContent", json!({})).await?;
        Ok(reply.value)
    }

    pub async fn get_attribute(&self, name: &str) -> Result<Option<String>> {
        #[derive(Deserialize)]
        struct AttributeReply {
            value: Option<String>,
        }
        let reply: AttributeReply = self
            .core
            .channel()
            .send("getAttribute", json!({"name": name}))
            .await?;
        Ok(reply.value)
    }

    pub async fn click(&self) -> Result<()> {
        self.core
            .channel()
            .send_no_result("click", json!({"timeout": crate::DEFAULT_TIMEOUT_MS}))
            .await
    }

    pub async fn fill(&self, value: &str) -> Result<()> {
        self.core
            .channel()
            .send_no_result(
                "fill",
                json!({"value": value, "timeout": crate::DEFAULT_TIMEOUT_MS}),
            )
            .await
    }

    pub async fn set_input_files(&self, files: &[&Path]) -> Result<()> {
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
        self.core
            .channel()
            .send_no_result(
                "setInputFiles",
                json!({"payloads": payloads, "timeout": crate::DEFAULT_TIMEOUT_MS}),
            )
            .await
    }

    /// The frame a `<frame>`/`<iframe>` element hosts, if any.
    pub async fn content_frame(&self) -> Result<Option<Frame>> {
        let reply: MaybeFrameReply =
            self.core.channel().send("contentFrame", json!({})).await?;
        match reply.frame {
            Some(frame) => Ok(Some(find_object(self.core.rpc(), &frame.guid)?)),
            None => Ok(None),
        }
    }

    /// The frame this element lives in, if it is still attached.
    pub async fn owner_frame(&self) -> Result<Option<Frame>> {
        let reply: MaybeFrameReply =
            self.core.channel().send("ownerFrame", json!({})).await?;
        match reply.frame {
            Some(frame) => Ok(Some(find_object(self.core.rpc(), &frame.guid)?)),
            None => Ok(None),
        }
    }

    // JsHandle surface

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

    pub async fn get_property(&self, name: &str) -> Result<JsHandle> {
        let reply: HandleReply = self
            .core
            .channel()
            .send("getProperty", json!({"name": name}))
            .await?;
        find_object(self.core.rpc(), &reply.handle.guid)
    }

    pub async fn json_value(&self) -> Result<Value> {
        let reply: ValueReply = self.core.channel().send("jsonValue", json!({})).await?;
        Ok(values::from_tagged(&reply.value))
    }

    pub async fn dispose(&self) -> Result<()> {
        if self.core.is_disposed() {
            return Ok(());
        }
        self.core.channel().send_no_result("dispose", json!({})).await
    }

    async fn string_of(&self, method: &str) -> Result<String> {
        let reply: ValueReply = self.core.channel().send(method, json!({})).await?;
        Ok(reply.value.as_str().unwrap_or_default().to_string())
    }
}

impl RemoteObject for ElementHandle {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementHandle")
            .field("guid", self.core.guid())
            .finish()
    }
}
