// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Wire-level plumbing: transport framing, call dispatch, the object
//! registry, and waiter machinery.
//!
//! Exposed for integration tests; none of this is stable API. Drive
//! browsers through [`crate::Rudder`] instead.

pub mod channel;
pub mod connection;
pub mod factory;
pub mod registry;
pub mod remote_object;
pub mod transport;
pub mod waiter;
