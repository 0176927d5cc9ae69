// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Browser automation by driving the Playwright driver process.
//!
//! A [`Rudder`] session spawns the driver (the Node.js playwright CLI in
//! `run-driver` mode), speaks its length-prefixed JSON protocol over the
//! child's stdio, and mirrors the driver's object tree as typed proxies.
//! From there the API reads like the upstream clients: pick a browser
//! type, launch, open contexts and pages, act on them.
//!
//! ```no_run
//! use rudder::Rudder;
//!
//! # async fn run() -> rudder::Result<()> {
//! let rudder = Rudder::create().await?;
//! let browser = rudder.chromium()?.launch().await?;
//! let page = browser.new_page().await?;
//! page.goto("https://example.com").await?;
//! println!("{}", page.title().await?);
//! rudder.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! The driver is located via `RUDDER_DRIVER_PATH` or
//! `RUDDER_NODE_EXE`/`RUDDER_CLI_JS`, falling back to an npm-installed
//! `playwright` package; see [`driver`].

pub mod api;
pub mod driver;
pub mod error;
pub mod proto;
#[doc(hidden)]
pub mod rpc;

pub use api::{ContextOptions, CreateOptions, LaunchOptions, PersistentContextOptions};
pub use error::{Error, Result};
pub use proto::{
    Browser, BrowserContext, BrowserType, ElementHandle, Frame, JsHandle, Locator, Page, Request,
    Response, Selectors, Session,
};

use crate::driver::{DriverProcess, DriverSlot};
use crate::rpc::connection::Connection;
use crate::rpc::remote_object::RemoteObject;
use crate::rpc::transport::PipeTransport;
use std::sync::Arc;

/// Default deadline applied to driver calls that take a timeout, in
/// milliseconds. Matches the upstream clients.
pub const DEFAULT_TIMEOUT_MS: f64 = 30_000.0;

/// A driver session: one driver process, one connection, one object tree.
///
/// Cheap to clone; all clones share the session. Dropping every clone
/// without [`Rudder::close`] kills the driver process without the polite
/// shutdown handshake.
#[derive(Clone)]
pub struct Rudder {
    connection: Arc<Connection>,
    session: Session,
}

impl Rudder {
    /// Spawn the driver and perform the protocol handshake.
    pub async fn create() -> Result<Self> {
        Self::create_with_options(CreateOptions::default()).await
    }

    /// Like [`Rudder::create`], with environment overrides for the driver
    /// process.
    pub async fn create_with_options(options: CreateOptions) -> Result<Self> {
        let (process, stdin, stdout) = DriverProcess::launch(&options.env).await?;
        let (transport, frame_rx) = PipeTransport::new(stdin, stdout);
        let (writer, reader) = transport.into_parts();
        let connection = Arc::new(Connection::new(
            writer,
            reader,
            frame_rx,
            DriverSlot::holding(process),
        ));

        let pump = Arc::clone(&connection);
        tokio::spawn(async move { pump.run().await });

        let session = match connection.initialize_session().await {
            Ok(object) => object,
            Err(e) => {
                connection.close().await;
                return Err(e);
            }
        };
        let session = match session.as_any().downcast_ref::<Session>() {
            Some(session) => session.clone(),
            None => {
                connection.close().await;
                return Err(Error::Protocol(format!(
                    "initialize resolved to a {} instead of the session object",
                    session.core().type_name()
                )));
            }
        };
        Ok(Self {
            connection,
            session,
        })
    }

    pub fn chromium(&self) -> Result<BrowserType> {
        self.session.chromium()
    }

    pub fn firefox(&self) -> Result<BrowserType> {
        self.session.firefox()
    }

    pub fn webkit(&self) -> Result<BrowserType> {
        self.session.webkit()
    }

    /// The selector engine registry. Custom engines must be registered
    /// before the first browser context exists.
    pub fn selectors(&self) -> Result<Selectors> {
        self.session.selectors()
    }

    /// End the session: reject outstanding calls, dispose every proxy, and
    /// shut the driver down. Idempotent.
    pub async fn close(&self) {
        self.connection.close().await;
    }
}

impl std::fmt::Debug for Rudder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rudder")
            .field("closed", &self.connection.is_closed())
            .finish()
    }
}
