// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Error types for driver sessions.
//!
//! Every fallible operation in this crate returns [`Result`]. Errors fall
//! into a few broad groups: finding and launching the driver process,
//! transport and protocol failures on the driver pipe, errors the driver
//! itself reports for a call, and client-side validation that rejects bad
//! options before anything is sent.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while driving a browser.
#[derive(Debug, Error)]
pub enum Error {
    /// No driver installation could be located.
    #[error(
        "Playwright driver not found. Install it with `npm install playwright` \
         or point RUDDER_DRIVER_PATH at a driver bundle"
    )]
    DriverNotFound,

    /// The driver process could not be started or died during startup.
    #[error("Failed to launch driver: {0}")]
    LaunchFailed(String),

    /// The stdio pipe to the driver failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A frame violated the wire contract. Protocol errors are fatal to the
    /// connection that observed them.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The driver rejected a call.
    #[error("{message}")]
    Driver {
        /// Error class reported by the driver, e.g. `Error` or `TimeoutError`.
        name: String,
        message: String,
        /// Driver-side stack trace, when the driver supplied one.
        stack: Option<String>,
    },

    /// The browser engine for this browser type has not been downloaded.
    #[error("{message}\nRun `npx playwright install {name}` to download it")]
    BrowserNotInstalled { name: String, message: String },

    /// The object this call was addressed to, or one of its ancestors, has
    /// been closed.
    #[error("Target closed: {0}")]
    TargetClosed(String),

    /// A call or wait did not complete within its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Options were rejected client-side, before any frame was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The reply channel for a call was dropped without a value. Seen only
    /// when the connection is torn down mid-call.
    #[error("Connection closed while waiting for a reply")]
    ChannelClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors meaning the call's target (or the whole connection)
    /// is gone, as opposed to the call itself failing.
    pub fn is_target_closed(&self) -> bool {
        matches!(self, Error::TargetClosed(_) | Error::ChannelClosed)
    }
}
