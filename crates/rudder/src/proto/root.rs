// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! The bootstrap object behind the empty GUID.
//!
//! The driver addresses its very first `__create__` to the root, and the
//! client sends `initialize` from it. It has no other behavior.

use crate::rpc::connection::Rpc;
use crate::rpc::remote_object::{ObjectCore, RemoteObject};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;

pub struct Root {
    core: ObjectCore,
}

impl Root {
    pub fn new(rpc: Arc<dyn Rpc>) -> Self {
        Self {
            core: ObjectCore::new(rpc, None, "Root", Arc::from(""), Value::Null),
        }
    }
}

impl RemoteObject for Root {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
