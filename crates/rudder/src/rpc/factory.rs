// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Maps protocol type tags to proxy constructors.

use crate::error::Result;
use crate::proto::browser::Browser;
use crate::proto::browser_context::BrowserContext;
use crate::proto::browser_type::BrowserType;
use crate::proto::element_handle::ElementHandle;
use crate::proto::frame::Frame;
use crate::proto::generic::GenericObject;
use crate::proto::js_handle::JsHandle;
use crate::proto::network::{Request, Response};
use crate::proto::page::Page;
use crate::proto::selectors::Selectors;
use crate::proto::session::Session;
use crate::rpc::connection::Rpc;
use crate::rpc::remote_object::{ObjectCore, RemoteObject};
use serde_json::Value;
use std::sync::Arc;

/// Build the proxy for a freshly announced object.
///
/// Types without a dedicated proxy get a generic stand-in. They still sit
/// in the lifecycle graph, so cascading disposal and event routing remain
/// correct for them.
pub fn create_object(
    rpc: Arc<dyn Rpc>,
    parent: Arc<str>,
    type_name: &str,
    guid: Arc<str>,
    initializer: Value,
) -> Result<Arc<dyn RemoteObject>> {
    let core = ObjectCore::new(rpc, Some(parent), type_name, guid, initializer);
    let object: Arc<dyn RemoteObject> = match type_name {
        "Playwright" => Arc::new(Session::from_core(core)),
        "BrowserType" => Arc::new(BrowserType::from_core(core)?),
        "Browser" => Arc::new(Browser::from_core(core)),
        "BrowserContext" => Arc::new(BrowserContext::from_core(core)),
        "Page" => Arc::new(Page::from_core(core)?),
        "Frame" => Arc::new(Frame::from_core(core)),
        "ElementHandle" => Arc::new(ElementHandle::from_core(core)),
        "JSHandle" => Arc::new(JsHandle::from_core(core)),
        "Request" => Arc::new(Request::from_core(core)),
        "Response" => Arc::new(Response::from_core(core)),
        "Selectors" => Arc::new(Selectors::from_core(core)),
        other => {
            tracing::debug!(type_name = other, "no dedicated proxy for protocol type");
            Arc::new(GenericObject::from_core(core))
        }
    };
    Ok(object)
}
