// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Driver discovery and process management.
//!
//! The driver is the Node.js playwright CLI run in `run-driver` mode: a
//! long-lived child process speaking length-prefixed JSON over its stdio.
//! Discovery prefers explicit environment configuration and falls back to
//! an npm-installed `playwright` package.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Names a driver bundle directory: a `node` executable next to a
/// `package/cli.js`.
pub const DRIVER_PATH_ENV: &str = "RUDDER_DRIVER_PATH";
/// Names the node executable directly; paired with [`CLI_JS_ENV`].
pub const NODE_EXE_ENV: &str = "RUDDER_NODE_EXE";
/// Names the playwright CLI script directly; paired with [`NODE_EXE_ENV`].
pub const CLI_JS_ENV: &str = "RUDDER_CLI_JS";

/// An exit within this window after spawn counts as a launch failure.
const SPAWN_GRACE: Duration = Duration::from_millis(100);
/// How long a closing driver gets to exit before being killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A located driver: the node executable and the CLI entry script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverExecutable {
    pub node: PathBuf,
    pub cli: PathBuf,
}

/// Locate a driver installation.
///
/// Checked in order:
/// 1. `RUDDER_DRIVER_PATH`, a driver bundle directory.
/// 2. `RUDDER_NODE_EXE` plus `RUDDER_CLI_JS`, explicit paths.
/// 3. A globally or locally npm-installed `playwright` package, run with
///    whatever `node` is on the PATH.
pub fn find_driver() -> Result<DriverExecutable> {
    if let Ok(dir) = std::env::var(DRIVER_PATH_ENV) {
        return driver_from_bundle(Path::new(&dir)).ok_or_else(|| {
            Error::LaunchFailed(format!(
                "{} does not contain a driver bundle: {}",
                DRIVER_PATH_ENV, dir
            ))
        });
    }
    if let (Ok(node), Ok(cli)) = (std::env::var(NODE_EXE_ENV), std::env::var(CLI_JS_ENV)) {
        return driver_from_parts(Path::new(&node), Path::new(&cli)).ok_or_else(|| {
            Error::LaunchFailed(format!(
                "{} or {} points at a missing file",
                NODE_EXE_ENV, CLI_JS_ENV
            ))
        });
    }
    let node = find_node().ok_or(Error::DriverNotFound)?;
    for root in npm_roots() {
        if let Some(found) = driver_from_package(&node, &root.join("playwright")) {
            return Ok(found);
        }
    }
    Err(Error::DriverNotFound)
}

fn driver_from_bundle(dir: &Path) -> Option<DriverExecutable> {
    driver_from_parts(&dir.join(node_binary_name()), &dir.join("package").join("cli.js"))
}

fn driver_from_package(node: &Path, package_dir: &Path) -> Option<DriverExecutable> {
    driver_from_parts(node, &package_dir.join("cli.js"))
}

fn driver_from_parts(node: &Path, cli: &Path) -> Option<DriverExecutable> {
    if node.is_file() && cli.is_file() {
        Some(DriverExecutable {
            node: node.to_path_buf(),
            cli: cli.to_path_buf(),
        })
    } else {
        None
    }
}

fn node_binary_name() -> &'static str {
    if cfg!(windows) { "node.exe" } else { "node" }
}

fn find_node() -> Option<PathBuf> {
    let finder = if cfg!(windows) { "where" } else { "which" };
    let output = std::process::Command::new(finder).arg("node").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .next()
        .map(|line| PathBuf::from(line.trim()))
        .filter(|path| path.is_file())
}

fn npm_roots() -> Vec<PathBuf> {
    let npm = if cfg!(windows) { "npm.cmd" } else { "npm" };
    let mut roots = Vec::new();
    for global in [true, false] {
        let mut command = std::process::Command::new(npm);
        command.arg("root");
        if global {
            command.arg("-g");
        }
        let Ok(output) = command.output() else {
            continue;
        };
        if !output.status.success() {
            continue;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(line) = stdout.lines().next() {
            let path = PathBuf::from(line.trim());
            if path.is_dir() {
                roots.push(path);
            }
        }
    }
    roots
}

/// A running driver child process.
pub struct DriverProcess {
    child: Child,
}

impl DriverProcess {
    /// Spawn the driver and hand back its stdio pipes. The child inherits
    /// the parent environment; `env` entries override per key.
    pub async fn launch(env: &HashMap<String, String>) -> Result<(Self, ChildStdin, ChildStdout)> {
        let exe = find_driver()?;
        tracing::debug!(node = %exe.node.display(), cli = %exe.cli.display(), "spawning driver");

        let mut command = Command::new(&exe.node);
        command
            .arg(&exe.cli)
            .arg("run-driver")
            // Presented as the Node.js client; matches the sdkLanguage
            // sent during initialize.
            .env("PW_LANG_NAME", "javascript")
            .env("PW_CLI_DISPLAY_VERSION", env!("CARGO_PKG_VERSION"))
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            Error::LaunchFailed(format!("failed to spawn {}: {}", exe.node.display(), e))
        })?;

        tokio::time::sleep(SPAWN_GRACE).await;
        if let Ok(Some(status)) = child.try_wait() {
            return Err(Error::LaunchFailed(format!(
                "driver exited immediately with {}",
                status
            )));
        }

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::LaunchFailed("driver stdin was not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::LaunchFailed("driver stdout was not piped".to_string()))?;
        Ok((Self { child }, stdin, stdout))
    }

    /// Wait for the driver to exit after its stdin was closed, killing it
    /// if it lingers.
    pub async fn shutdown(mut self) {
        if let Ok(Ok(status)) =
            tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await
        {
            tracing::debug!(%status, "driver exited");
            return;
        }
        tracing::warn!("driver did not exit after stdin close; killing it");
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }

    /// Synchronous best-effort kill for fatal paths and Drop.
    pub fn force_kill(mut self) {
        let _ = self.child.start_kill();
    }
}

/// Shared slot holding the driver process, emptied by whichever teardown
/// path gets there first.
#[derive(Clone, Default)]
pub struct DriverSlot(Arc<Mutex<Option<DriverProcess>>>);

impl DriverSlot {
    pub fn holding(process: DriverProcess) -> Self {
        Self(Arc::new(Mutex::new(Some(process))))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Option<DriverProcess> {
        self.0.lock().take()
    }
}
