// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Typed proxies for driver-side protocol objects.
//!
//! Every object the driver announces gets a proxy here (built by
//! [`crate::rpc::factory`]). A proxy method is a request/response round-trip
//! through the connection; accessors for already-known children read local
//! state the dispatch loop keeps current. Proxies are cheap clones sharing
//! one [`crate::rpc::remote_object::ObjectCore`].

pub mod browser;
pub mod browser_context;
pub mod browser_type;
pub mod element_handle;
pub mod frame;
pub mod generic;
pub mod js_handle;
pub mod locator;
pub mod network;
pub mod page;
pub mod root;
pub mod selectors;
pub mod session;
pub mod values;

pub use browser::Browser;
pub use browser_context::BrowserContext;
pub use browser_type::BrowserType;
pub use element_handle::ElementHandle;
pub use frame::Frame;
pub use js_handle::JsHandle;
pub use locator::Locator;
pub use network::{Request, Response};
pub use page::Page;
pub use selectors::Selectors;
pub use session::Session;

use crate::error::{Error, Result};
use crate::rpc::connection::{Rpc, deserialize_arc_str};
use crate::rpc::remote_object::RemoteObject;
use serde::Deserialize;
use std::sync::Arc;

/// Reference to another protocol object inside a reply or event payload.
#[derive(Debug, Deserialize)]
pub(crate) struct Ref {
    #[serde(deserialize_with = "deserialize_arc_str")]
    pub(crate) guid: Arc<str>,
}

/// Resolve a GUID the driver handed back into a typed proxy clone.
///
/// The dispatch loop registers objects before the reply that references
/// them resolves, so a miss here is a wire-contract violation, not a race.
pub(crate) fn find_object<T>(rpc: &Arc<dyn Rpc>, guid: &str) -> Result<T>
where
    T: RemoteObject + Clone + 'static,
{
    let object = rpc.lookup(guid).ok_or_else(|| {
        Error::Protocol(format!("Reply references unknown object {:?}", guid))
    })?;
    match object.as_any().downcast_ref::<T>() {
        Some(typed) => Ok(typed.clone()),
        None => Err(Error::Protocol(format!(
            "Object {:?} has unexpected type {}",
            guid,
            object.core().type_name()
        ))),
    }
}
