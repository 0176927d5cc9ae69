// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Call dispatch and lifecycle routing for one driver connection.
//!
//! A connection owns the framed transport to a single driver process and
//! runs a single reader loop that is the only mutator of protocol state.
//! Outbound calls carry a connection-unique id and park a oneshot sender
//! until the matching reply arrives. Inbound frames are either replies,
//! lifecycle events (`__create__`, `__dispose__`, `__adopt__`) that mutate
//! the object registry, or object events fanned out to proxies.
//!
//! The dispatcher is strict. A reply id that matches nothing, an event for
//! an unregistered GUID, a duplicate GUID, or an unknown parent poisons
//! the connection: every pending call is rejected, every object disposed,
//! and the driver process killed. The one exception is a reply to a call
//! that was deliberately abandoned (deadline expiry or a dispose
//! rejection). Those ids are remembered and late replies to them are
//! dropped in silence.

use crate::driver::DriverSlot;
use crate::error::{Error, Result};
use crate::proto::root::Root;
use crate::rpc::factory;
use crate::rpc::registry::Registry;
use crate::rpc::remote_object::{DisposeReason, RemoteObject};
use crate::rpc::transport::{FrameSink, FrameSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::{Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{mpsc, oneshot};

/// How long the initial handshake may take before the session is written
/// off as dead.
const INITIALIZE_TIMEOUT: Duration = Duration::from_secs(30);

pub fn serialize_arc_str<S: Serializer>(value: &Arc<str>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(value)
}

pub fn deserialize_arc_str<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Arc<str>, D::Error> {
    String::deserialize(deserializer).map(Arc::from)
}

/// Seam between protocol object proxies and the connection.
#[async_trait]
pub trait Rpc: Send + Sync {
    /// Send one call frame addressed to `guid` and await its reply. With a
    /// deadline, the call is abandoned client-side on expiry.
    async fn send_call(
        &self,
        guid: &str,
        method: &str,
        params: Value,
        limit: Option<Duration>,
    ) -> Result<Value>;

    /// Look up a live object by GUID.
    fn lookup(&self, guid: &str) -> Option<Arc<dyn RemoteObject>>;

    /// Whether any browser context has ever been created on this
    /// connection. Selector engines must be registered before that point.
    fn has_context(&self) -> bool;
}

/// An inbound frame: a reply to one of our calls, or a driver event.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Reply(Reply),
    Event(EventFrame),
}

#[derive(Debug, Deserialize)]
pub struct Reply {
    pub id: u32,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorWrapper {
    pub error: ErrorPayload,
}

#[derive(Debug, Deserialize)]
pub struct ErrorPayload {
    #[serde(default = "default_error_name")]
    pub name: String,
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
}

fn default_error_name() -> String {
    "Error".to_string()
}

#[derive(Debug, Deserialize)]
pub struct EventFrame {
    #[serde(deserialize_with = "deserialize_arc_str")]
    pub guid: Arc<str>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
struct CallFrame<'a> {
    id: u32,
    guid: &'a str,
    method: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    params: &'a Value,
    metadata: Metadata,
}

#[derive(Debug, Serialize)]
struct Metadata {
    #[serde(rename = "wallTime")]
    wall_time: u64,
    #[serde(rename = "apiName", skip_serializing_if = "Option::is_none")]
    api_name: Option<String>,
    internal: bool,
}

impl Metadata {
    fn now() -> Self {
        let wall_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            wall_time,
            api_name: None,
            internal: false,
        }
    }
}

#[derive(Deserialize)]
struct CreateParams {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(deserialize_with = "deserialize_arc_str")]
    guid: Arc<str>,
    #[serde(default)]
    initializer: Value,
}

struct PendingCall {
    guid: Arc<str>,
    tx: oneshot::Sender<Result<Value>>,
}

#[derive(Default)]
struct CallMap {
    live: HashMap<u32, PendingCall>,
    /// Ids of calls the client walked away from. Replies to these are
    /// expected and silently dropped; truly unknown ids remain fatal.
    abandoned: HashSet<u32>,
}

#[derive(Clone)]
enum CloseKind {
    Transport(String),
    Protocol(String),
    UserInitiated,
}

impl CloseKind {
    fn to_error(&self) -> Error {
        match self {
            CloseKind::Transport(message) => Error::Transport(message.clone()),
            CloseKind::Protocol(message) => Error::Protocol(message.clone()),
            CloseKind::UserInitiated => Error::TargetClosed("connection closed".to_string()),
        }
    }
}

enum ConnectionState {
    Open,
    Closed(CloseKind),
}

pub struct Connection {
    last_id: AtomicU32,
    calls: Mutex<CallMap>,
    sender: TokioMutex<Option<Box<dyn FrameSink>>>,
    frame_rx: TokioMutex<Option<mpsc::UnboundedReceiver<Value>>>,
    frame_source: TokioMutex<Option<Box<dyn FrameSource>>>,
    registry: Registry,
    state: Mutex<ConnectionState>,
    context_seen: AtomicBool,
    driver: DriverSlot,
}

impl Connection {
    pub fn new<S, R>(
        sender: S,
        source: R,
        frame_rx: mpsc::UnboundedReceiver<Value>,
        driver: DriverSlot,
    ) -> Self
    where
        S: FrameSink + 'static,
        R: FrameSource + 'static,
    {
        Self {
            last_id: AtomicU32::new(0),
            calls: Mutex::new(CallMap::default()),
            sender: TokioMutex::new(Some(Box::new(sender))),
            frame_rx: TokioMutex::new(Some(frame_rx)),
            frame_source: TokioMutex::new(Some(Box::new(source))),
            registry: Registry::default(),
            state: Mutex::new(ConnectionState::Open),
            context_seen: AtomicBool::new(false),
            driver,
        }
    }

    /// Register the bootstrap root, send `initialize`, and resolve the
    /// session object the driver announces. The driver creates the session
    /// object before replying, so a direct lookup suffices.
    pub async fn initialize_session(self: &Arc<Self>) -> Result<Arc<dyn RemoteObject>> {
        let rpc: Arc<dyn Rpc> = Arc::clone(self) as Arc<dyn Rpc>;
        let root: Arc<dyn RemoteObject> = Arc::new(Root::new(Arc::clone(&rpc)));
        self.registry.register(Arc::from(""), root, None)?;

        tracing::debug!("initializing driver session");
        let reply = self
            .send_call(
                "",
                "initialize",
                json!({ "sdkLanguage": "javascript" }),
                Some(INITIALIZE_TIMEOUT),
            )
            .await?;

        let guid = reply["playwright"]["guid"].as_str().ok_or_else(|| {
            Error::Protocol("initialize reply is missing playwright.guid".to_string())
        })?;
        self.registry.lookup(guid).ok_or_else(|| {
            Error::Protocol(format!("initialize reply references unknown object {:?}", guid))
        })
    }

    /// Pump frames from the transport into the dispatcher until the pipe
    /// closes or a fatal error poisons the connection.
    pub async fn run(self: &Arc<Self>) {
        let mut source = match self.frame_source.lock().await.take() {
            Some(source) => source,
            None => {
                tracing::error!("Connection::run called more than once");
                return;
            }
        };
        let mut frame_rx = match self.frame_rx.lock().await.take() {
            Some(rx) => rx,
            None => {
                tracing::error!("Connection::run called more than once");
                return;
            }
        };

        let reader = tokio::spawn(async move { source.run().await });

        let mut failure: Option<CloseKind> = None;
        while let Some(frame) = frame_rx.recv().await {
            let message: Message = match serde_json::from_value(frame) {
                Ok(message) => message,
                Err(e) => {
                    failure = Some(CloseKind::Protocol(format!("Unrecognized frame: {}", e)));
                    break;
                }
            };
            if let Err(e) = self.dispatch(message) {
                failure = Some(close_kind_for(&e));
                break;
            }
        }

        // Dropping the receiver unblocks the reader if we bailed out first.
        drop(frame_rx);
        let reader_status = reader.await;

        if failure.is_none() {
            failure = match reader_status {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(close_kind_for(&e)),
                Err(e) => Some(CloseKind::Transport(format!("reader task failed: {}", e))),
            };
        }

        // A clean EOF that nobody asked for still means the driver is gone.
        let kind = failure.unwrap_or_else(|| {
            CloseKind::Transport("driver closed the pipe".to_string())
        });
        self.shut_down(kind);
    }

    /// Tear down on a user-initiated close: reject outstanding work, then
    /// ask the driver to exit by closing its stdin, escalating to a kill
    /// if it lingers.
    pub async fn close(&self) {
        let already_closed = {
            let mut state = self.state.lock();
            match &*state {
                ConnectionState::Closed(_) => true,
                ConnectionState::Open => {
                    *state = ConnectionState::Closed(CloseKind::UserInitiated);
                    false
                }
            }
        };
        if already_closed {
            return;
        }
        tracing::debug!("closing connection");
        self.reject_all_calls(&CloseKind::UserInitiated);
        for object in self.registry.take_all() {
            object.core().mark_disposed(DisposeReason::ConnectionClosed);
        }
        self.sender.lock().await.take();
        let process = self.driver.take();
        if let Some(process) = process {
            process.shutdown().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(&*self.state.lock(), ConnectionState::Closed(_))
    }

    fn closed_error(&self) -> Option<Error> {
        match &*self.state.lock() {
            ConnectionState::Closed(kind) => Some(kind.to_error()),
            ConnectionState::Open => None,
        }
    }

    /// Poison the connection: latch the close reason, reject every pending
    /// call, dispose every object, and kill the driver outright.
    fn shut_down(&self, kind: CloseKind) {
        let latched = {
            let mut state = self.state.lock();
            match &*state {
                ConnectionState::Closed(existing) => existing.clone(),
                ConnectionState::Open => {
                    if let CloseKind::Transport(message) | CloseKind::Protocol(message) = &kind {
                        tracing::error!("connection failed: {}", message);
                    }
                    *state = ConnectionState::Closed(kind.clone());
                    kind
                }
            }
        };
        self.reject_all_calls(&latched);
        for object in self.registry.take_all() {
            object.core().mark_disposed(DisposeReason::ConnectionClosed);
        }
        if let Some(process) = self.driver.take() {
            process.force_kill();
        }
    }

    fn reject_all_calls(&self, kind: &CloseKind) {
        let drained: Vec<PendingCall> = {
            let mut calls = self.calls.lock();
            calls.abandoned.clear();
            calls.live.drain().map(|(_, call)| call).collect()
        };
        for call in drained {
            let _ = call.tx.send(Err(kind.to_error()));
        }
    }

    fn dispatch(self: &Arc<Self>, message: Message) -> Result<()> {
        if self.is_closed() {
            tracing::trace!("dropping frame received after close");
            return Ok(());
        }
        match message {
            Message::Reply(reply) => self.handle_reply(reply),
            Message::Event(event) => match event.method.as_str() {
                "__create__" => self.handle_create(event),
                "__dispose__" => {
                    self.dispose_object(&event.guid, DisposeReason::Server);
                    Ok(())
                }
                "__adopt__" => self.handle_adopt(event),
                _ => self.handle_event(event),
            },
        }
    }

    fn handle_reply(&self, reply: Reply) -> Result<()> {
        let call = {
            let mut calls = self.calls.lock();
            if calls.abandoned.remove(&reply.id) {
                tracing::debug!(id = reply.id, "discarding late reply to abandoned call");
                return Ok(());
            }
            calls.live.remove(&reply.id)
        };
        let Some(call) = call else {
            return Err(Error::Protocol(format!(
                "Reply for unknown call id {}",
                reply.id
            )));
        };
        let outcome = match reply.error {
            Some(wrapper) => Err(error_from_payload(wrapper.error)),
            None => Ok(reply.result.unwrap_or(Value::Null)),
        };
        let _ = call.tx.send(outcome);
        Ok(())
    }

    fn handle_create(self: &Arc<Self>, event: EventFrame) -> Result<()> {
        let create: CreateParams = serde_json::from_value(event.params)
            .map_err(|e| Error::Protocol(format!("Malformed __create__ params: {}", e)))?;
        tracing::debug!(
            parent = %event.guid,
            guid = %create.guid,
            type_name = %create.type_name,
            "object created"
        );
        let rpc: Arc<dyn Rpc> = Arc::clone(self) as Arc<dyn Rpc>;
        let object = factory::create_object(
            rpc,
            Arc::clone(&event.guid),
            &create.type_name,
            Arc::clone(&create.guid),
            create.initializer,
        )?;
        if create.type_name == "BrowserContext" {
            self.context_seen.store(true, Ordering::SeqCst);
        }
        self.registry.register(create.guid, object, Some(event.guid))
    }

    fn handle_adopt(&self, event: EventFrame) -> Result<()> {
        let child = event.params["guid"].as_str().ok_or_else(|| {
            Error::Protocol("__adopt__ params are missing 'guid'".to_string())
        })?;
        tracing::debug!(child, new_parent = %event.guid, "object adopted");
        self.registry.adopt(child, &event.guid)
    }

    fn handle_event(&self, event: EventFrame) -> Result<()> {
        match self.registry.lookup(&event.guid) {
            Some(object) => {
                tracing::debug!(guid = %event.guid, method = %event.method, "event");
                object.on_event(&event.method, &event.params);
                object.core().emit(&event.method, &event.params);
                Ok(())
            }
            None => Err(Error::Protocol(format!(
                "Event \"{}\" addressed to unknown object {:?}",
                event.method, event.guid
            ))),
        }
    }

    /// Remove an object and its whole subtree. Pending calls addressed to
    /// any removed object are rejected before this returns, and their ids
    /// are remembered so late replies do not poison the connection.
    pub(crate) fn dispose_object(&self, guid: &str, reason: DisposeReason) {
        let removed = self.registry.remove_subtree(guid);
        if removed.is_empty() {
            tracing::debug!(guid, "dispose for unknown or already-disposed object");
            return;
        }
        for object in removed {
            let core = object.core();
            let rejected: Vec<PendingCall> = {
                let mut calls = self.calls.lock();
                let ids: Vec<u32> = calls
                    .live
                    .iter()
                    .filter(|(_, call)| call.guid.as_ref() == core.guid().as_ref())
                    .map(|(id, _)| *id)
                    .collect();
                ids.into_iter()
                    .filter_map(|id| {
                        calls.abandoned.insert(id);
                        calls.live.remove(&id)
                    })
                    .collect()
            };
            for call in rejected {
                let _ = call.tx.send(Err(Error::TargetClosed(core.closed_message())));
            }
            core.mark_disposed(reason);
        }
    }

    #[cfg(test)]
    pub(crate) fn inject(self: &Arc<Self>, frame: Value) -> Result<()> {
        let message: Message = serde_json::from_value(frame)?;
        self.dispatch(message)
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[async_trait]
impl Rpc for Connection {
    async fn send_call(
        &self,
        guid: &str,
        method: &str,
        params: Value,
        limit: Option<Duration>,
    ) -> Result<Value> {
        if let Some(error) = self.closed_error() {
            return Err(error);
        }
        if !self.registry.contains(guid) {
            return Err(Error::TargetClosed(format!(
                "object {:?} has been closed",
                guid
            )));
        }

        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        self.calls.lock().live.insert(
            id,
            PendingCall {
                guid: Arc::from(guid),
                tx,
            },
        );

        let frame = CallFrame {
            id,
            guid,
            method,
            params: &params,
            metadata: Metadata::now(),
        };
        let frame = match serde_json::to_value(&frame) {
            Ok(frame) => frame,
            Err(e) => {
                self.calls.lock().live.remove(&id);
                return Err(e.into());
            }
        };

        tracing::debug!(id, guid, method, "sending call");
        let write_status = match self.sender.lock().await.as_mut() {
            Some(sender) => sender.send(frame).await,
            None => Err(Error::ChannelClosed),
        };
        if let Err(e) = write_status {
            self.calls.lock().live.remove(&id);
            // A dead pipe takes the whole connection with it.
            self.shut_down(CloseKind::Transport(e.to_string()));
            return Err(e);
        }

        let wait = async { rx.await.map_err(|_| Error::ChannelClosed).and_then(|r| r) };
        match limit {
            None => wait.await,
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let mut calls = self.calls.lock();
                    if calls.live.remove(&id).is_some() {
                        calls.abandoned.insert(id);
                    }
                    drop(calls);
                    Err(Error::Timeout(format!(
                        "{}: Timeout {}ms exceeded",
                        method,
                        limit.as_millis()
                    )))
                }
            },
        }
    }

    fn lookup(&self, guid: &str) -> Option<Arc<dyn RemoteObject>> {
        self.registry.lookup(guid)
    }

    fn has_context(&self) -> bool {
        self.context_seen.load(Ordering::SeqCst)
    }
}

fn close_kind_for(error: &Error) -> CloseKind {
    match error {
        Error::Transport(message) => CloseKind::Transport(message.clone()),
        other => CloseKind::Protocol(other.to_string()),
    }
}

/// Translate a driver error payload into the client taxonomy.
fn error_from_payload(payload: ErrorPayload) -> Error {
    if payload.message.contains("Executable doesn't exist") {
        if let Some(name) = ["chromium", "firefox", "webkit"]
            .into_iter()
            .find(|name| payload.message.to_lowercase().contains(name))
        {
            return Error::BrowserNotInstalled {
                name: name.to_string(),
                message: payload.message,
            };
        }
    }
    if payload.name == "TargetClosedError" || payload.message.contains("Target closed") {
        return Error::TargetClosed(payload.message);
    }
    if payload.name == "TimeoutError" {
        return Error::Timeout(payload.message);
    }
    Error::Driver {
        name: payload.name,
        message: payload.message,
        stack: payload.stack,
    }
}
