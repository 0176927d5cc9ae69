// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Selector-addressed view onto a frame.
//!
//! A locator is a client-side value, not a protocol object: frame plus
//! selector string. Every operation re-resolves the selector driver-side,
//! so a locator built before an element exists works once it appears.

use crate::error::Result;
use crate::proto::element_handle::ElementHandle;
use crate::proto::frame::{Frame, WaitForState};
use crate::proto::js_handle::JsHandle;
use serde_json::Value;
use std::path::Path;

#[derive(Clone)]
pub struct Locator {
    frame: Frame,
    selector: String,
}

impl Locator {
    pub(crate) fn new(frame: Frame, selector: &str) -> Self {
        Self {
            frame,
            selector: selector.to_string(),
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Narrow to a descendant of the current matches.
    pub fn locator(&self, selector: &str) -> Locator {
        Locator {
            frame: self.frame.clone(),
            selector: format!("{} >> {}", self.selector, selector),
        }
    }

    pub async fn click(&self) -> Result<()> {
        self.frame.click(&self.selector).await
    }

    pub async fn fill(&self, value: &str) -> Result<()> {
        self.frame.fill(&self.selector, value).await
    }

    pub async fn inner_html(&self) -> Result<String> {
        self.frame.inner_html(&self.selector).await
    }

    pub async fn inner_text(&self) -> Result<String> {
        self.frame.inner_text(&self.selector).await
    }

    pub async fn text_content(&self) -> Result<Option<String>> {
        self.frame.text_content(&self.selector).await
    }

    pub async fn get_attribute(&self, name: &str) -> Result<Option<String>> {
        self.frame.get_attribute(&self.selector, name).await
    }

    /// How many elements match right now.
    pub async fn count(&self) -> Result<usize> {
        self.frame.query_count(&self.selector).await
    }

    pub async fn set_input_files(&self, files: &[&Path]) -> Result<()> {
        self.frame.set_input_files(&self.selector, files).await
    }

    pub async fn evaluate_handle(&self, expression: &str, arg: Value) -> Result<JsHandle> {
        self.frame.evaluate_handle(expression, arg).await
    }

    /// Resolve to a concrete handle, waiting for the element to attach.
    pub async fn element_handle(&self) -> Result<Option<ElementHandle>> {
        self.frame
            .wait_for_selector(&self.selector, Some(WaitForState::Attached))
            .await
    }
}

impl std::fmt::Debug for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locator")
            .field("selector", &self.selector)
            .finish()
    }
}
