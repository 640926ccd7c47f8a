//! Browser abstraction used to drive the calculator page.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (Chromium via chromiumoxide), plus small helpers for
//! building and polling page scripts.

pub mod chromium;

use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cookies::BrowserCookie;

pub use chromium::{find_chromium, ChromiumRenderer};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser engine that can create page contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab).
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page and return the result (`Null` for undefined).
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the current URL.
    async fn get_url(&self) -> Result<String>;
    /// Add cookies to the context.
    async fn set_cookies(&mut self, cookies: &[BrowserCookie]) -> Result<()>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Poll a boolean JS expression until it is truthy or `timeout` elapses.
///
/// The expression is always evaluated at least once, so a zero timeout is
/// a single check. Script errors count as "not yet".
pub async fn wait_for(
    ctx: &dyn RenderContext,
    expression: &str,
    timeout: Duration,
    poll: Duration,
) -> bool {
    let start = Instant::now();
    loop {
        match ctx.execute_js(expression).await {
            Ok(v) if is_truthy(&v) => return true,
            Ok(_) => {}
            Err(e) => tracing::trace!("wait_for probe failed: {e}"),
        }
        if start.elapsed() >= timeout {
            return false;
        }
        tokio::time::sleep(poll.min(timeout.saturating_sub(start.elapsed()))).await;
    }
}

/// JS truthiness for the values a probe can return.
pub fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

/// Escape a value for injection into a single-quoted JavaScript string literal.
///
/// Backslashes, quotes, backticks and line breaks are escaped, `<`/`>` are
/// hex-escaped so a value cannot close a `<script>` tag, and NUL is dropped.
pub fn js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}
