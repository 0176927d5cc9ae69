// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Reference to a JavaScript value kept alive driver-side.

use crate::error::Result;
use crate::proto::values;
use crate::proto::{Ref, find_object};
use crate::rpc::remote_object::{ObjectCore, RemoteObject};
use serde::Deserialize;
use serde_json::{Value, json};
use std::any::Any;

#[derive(Clone)]
pub struct JsHandle {
    core: ObjectCore,
}

#[derive(Deserialize)]
struct ValueReply {
    value: Value,
}

#[derive(Deserialize)]
struct HandleReply {
    handle: Ref,
}

impl JsHandle {
    pub fn from_core(core: ObjectCore) -> Self {
        Self { core }
    }

    /// The driver's one-line preview of the value, as of creation.
    pub fn preview(&self) -> String {
        self.core.initializer()["preview"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    /// Run JavaScript with this handle as receiver argument.
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

    pub async fn get_properties(&self) -> Result<Vec<(String, JsHandle)>> {
        #[derive(Deserialize)]
        struct Property {
            name: String,
            value: Ref,
        }
        #[derive(Deserialize)]
        struct PropertiesReply {
            properties: Vec<Property>,
        }
        let reply: PropertiesReply = self
            .core
            .channel()
            .send("getPropertyList", json!({}))
            .await?;
        reply
            .properties
            .into_iter()
            .map(|property| {
                let handle = find_object(self.core.rpc(), &property.value.guid)?;
                Ok((property.name, handle))
            })
            .collect()
    }

    /// Materialize the referenced value as plain JSON.
    pub async fn json_value(&self) -> Result<Value> {
        let reply: ValueReply = self.core.channel().send("jsonValue", json!({})).await?;
        Ok(values::from_tagged(&reply.value))
    }

    /// Release the driver-side reference. Further calls on this handle
    /// fail with a target-closed error.
    pub async fn dispose(&self) -> Result<()> {
        if self.core.is_disposed() {
            return Ok(());
        }
        self.core.channel().send_no_result("dispose", json!({})).await
    }
}

impl RemoteObject for JsHandle {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for JsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsHandle")
            .field("guid", self.core.guid())
            .field("preview", &self.preview())
            .finish()
    }
}
