// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Fallback proxy for protocol types without a dedicated facade.
//!
//! The driver announces more object types than this client exposes
//! (artifacts, streams, tracing). They still need a node in the lifecycle
//! graph so cascading disposal and event routing stay correct.

use crate::rpc::remote_object::{ObjectCore, RemoteObject};
use std::any::Any;

#[derive(Clone)]
pub struct GenericObject {
    core: ObjectCore,
}

impl GenericObject {
    pub fn from_core(core: ObjectCore) -> Self {
        Self { core }
    }
}

impl RemoteObject for GenericObject {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
