// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Typed call interface from a proxy to its driver-side object.
//!
//! A channel is just the object's GUID plus a handle to the connection.
//! It serializes parameters, sends the call, and deserializes the reply
//! into whatever response type the caller expects.

use crate::error::Result;
use crate::rpc::connection::Rpc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct Channel {
    guid: Arc<str>,
    rpc: Arc<dyn Rpc>,
}

impl Channel {
    pub fn new(guid: Arc<str>, rpc: Arc<dyn Rpc>) -> Self {
        Self { guid, rpc }
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    pub fn rpc(&self) -> &Arc<dyn Rpc> {
        &self.rpc
    }

    /// Send a call and deserialize its reply.
    pub async fn send<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        let reply = self.rpc.send_call(&self.guid, method, params, None).await?;
        serde_json::from_value(reply).map_err(Into::into)
    }

    /// Send a call with no parameters.
    pub async fn send_no_params<R>(&self, method: &str) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let reply = self
            .rpc
            .send_call(&self.guid, method, Value::Null, None)
            .await?;
        serde_json::from_value(reply).map_err(Into::into)
    }

    /// Send a call whose reply carries nothing the caller wants.
    pub async fn send_no_result<P>(&self, method: &str, params: P) -> Result<()>
    where
        P: Serialize,
    {
        let params = serde_json::to_value(params)?;
        self.rpc.send_call(&self.guid, method, params, None).await?;
        Ok(())
    }

    /// Send a call that is abandoned client-side if no reply arrives in
    /// time. A late reply to an abandoned call is discarded, not fatal.
    pub async fn send_with_deadline<P, R>(
        &self,
        method: &str,
        params: P,
        limit: Duration,
    ) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        let reply = self
            .rpc
            .send_call(&self.guid, method, params, Some(limit))
            .await?;
        serde_json::from_value(reply).map_err(Into::into)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel").field("guid", &self.guid).finish()
    }
}
