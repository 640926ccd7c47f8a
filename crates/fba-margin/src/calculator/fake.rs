//! Scripted stand-in for the calculator page, answering the scripts in
//! [`super::scripts`] from an in-memory model.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::scripts;
use crate::browser::{NavigationResult, RenderContext, Renderer};
use crate::cookies::BrowserCookie;

/// How the fake calculator responds to one ASIN.
#[derive(Debug, Clone, Default)]
pub struct Product {
    pub labels: Vec<String>,
    /// Searches that answer "Failed to get product match" before succeeding.
    pub failed_matches: u32,
    /// The search shows a warning and only the product picker yields labels.
    pub needs_picker: bool,
    /// Picker selections that still show the warning.
    pub picker_warnings: u32,
    pub picker_has_select: bool,
}

impl Product {
    pub fn with_labels(labels: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(|s| s.to_string()).collect(),
            picker_has_select: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageState {
    pub gate_enabled: bool,
    pub input_enabled: bool,
    pub search_enabled: bool,
    /// Fail every navigation after this many have succeeded.
    pub fail_navigation_after: Option<u32>,
    /// Answer the label script with an object instead of a list.
    pub malformed_labels: bool,
    pub products: HashMap<String, Product>,

    pub gate_shown: bool,
    pub typed: String,
    pub labels: Vec<String>,
    pub alert: Option<String>,
    pub picker_open: bool,

    pub navigations: u32,
    pub continue_clicks: u32,
    pub searches: u32,
    pub search_another_clicks: u32,
    pub select_clicks: u32,
    pub cookies: Vec<BrowserCookie>,
    pub closed: bool,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            gate_enabled: true,
            input_enabled: true,
            search_enabled: true,
            fail_navigation_after: None,
            malformed_labels: false,
            products: HashMap::new(),
            gate_shown: false,
            typed: String::new(),
            labels: Vec::new(),
            alert: None,
            picker_open: false,
            navigations: 0,
            continue_clicks: 0,
            searches: 0,
            search_another_clicks: 0,
            select_clicks: 0,
            cookies: Vec::new(),
            closed: false,
        }
    }
}

impl PageState {
    fn input_ready(&self) -> bool {
        self.input_enabled && !self.gate_shown
    }

    fn search(&mut self) -> bool {
        if !self.search_enabled || !self.input_ready() {
            return false;
        }
        self.searches += 1;
        self.labels.clear();
        self.alert = None;
        self.picker_open = false;

        let Some(product) = self.products.get_mut(&self.typed) else {
            return true;
        };
        if product.failed_matches > 0 {
            product.failed_matches -= 1;
            self.alert = Some(format!("{}. Try again.", scripts::FAILED_MATCH_TEXT));
        } else if product.needs_picker {
            self.alert = Some("This ASIN matches multiple products".to_string());
        } else {
            self.labels = product.labels.clone();
        }
        true
    }

    fn search_another(&mut self) -> bool {
        let needs_picker = self
            .products
            .get(&self.typed)
            .is_some_and(|p| p.needs_picker);
        if self.alert.is_none() || !needs_picker {
            return false;
        }
        self.search_another_clicks += 1;
        self.alert = None;
        self.labels.clear();
        self.picker_open = true;
        true
    }

    fn select(&mut self) -> bool {
        if !self.picker_open {
            return false;
        }
        let Some(product) = self.products.get_mut(&self.typed) else {
            return false;
        };
        if !product.picker_has_select {
            return false;
        }
        let labels = product.labels.clone();
        let warn = product.picker_warnings > 0;
        if warn {
            product.picker_warnings -= 1;
        }

        self.select_clicks += 1;
        self.picker_open = false;
        if warn {
            self.alert = Some("Selected product is not eligible".to_string());
        } else {
            self.labels = labels;
        }
        true
    }

    fn answer(&mut self, script: &str) -> Value {
        if script == scripts::GATE_OR_READY {
            return json!(self.gate_shown || self.input_ready());
        }
        if script == scripts::CLICK_CONTINUE {
            if !self.gate_shown {
                return json!(false);
            }
            self.gate_shown = false;
            self.continue_clicks += 1;
            return json!(true);
        }
        if script == scripts::INPUT_PRESENT {
            return json!(self.input_ready());
        }
        if script == scripts::CLICK_SEARCH {
            return json!(self.search());
        }
        if script == scripts::ALERT_DESCRIPTION {
            return self.alert.clone().map(Value::String).unwrap_or(Value::Null);
        }
        if script == scripts::ALERT_PRESENT {
            return json!(self.alert.is_some());
        }
        if script == scripts::LABEL_PRESENT {
            return json!(!self.labels.is_empty());
        }
        if script == scripts::MARGIN_LABELS {
            if self.malformed_labels {
                return json!({ "labels": self.labels });
            }
            return json!(self.labels);
        }
        if script == scripts::click_test_id(scripts::SEARCH_ANOTHER_BUTTON) {
            return json!(self.search_another());
        }
        if script == scripts::click_test_id(scripts::SELECT_PRODUCT_BUTTON) {
            return json!(self.select());
        }
        if let Some(rest) = script.split("input.value = '").nth(2) {
            if !self.input_ready() {
                return json!(false);
            }
            self.typed = rest.split('\'').next().unwrap_or_default().to_string();
            return json!(true);
        }
        Value::Null
    }
}

/// A cloneable handle to one fake page; clones share state.
#[derive(Clone, Default)]
pub struct FakePage {
    state: Arc<Mutex<PageState>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, asin: &str, product: Product) {
        self.update(|s| {
            s.products.insert(asin.to_string(), product);
        });
    }

    pub fn update(&self, f: impl FnOnce(&mut PageState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn state(&self) -> PageState {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderContext for FakePage {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        let mut s = self.state.lock().unwrap();
        if let Some(limit) = s.fail_navigation_after {
            if s.navigations >= limit {
                bail!("navigation failed: net::ERR_CONNECTION_RESET");
            }
        }
        s.navigations += 1;
        s.gate_shown = s.gate_enabled;
        s.typed.clear();
        s.labels.clear();
        s.alert = None;
        s.picker_open = false;
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 1,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<Value> {
        Ok(self.state.lock().unwrap().answer(script))
    }

    async fn get_url(&self) -> Result<String> {
        Ok(super::CALCULATOR_URL.to_string())
    }

    async fn set_cookies(&mut self, cookies: &[BrowserCookie]) -> Result<()> {
        self.state.lock().unwrap().cookies.extend_from_slice(cookies);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Hands out the same [`FakePage`] for every context.
pub struct FakeRenderer {
    pub page: FakePage,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Ok(Box::new(self.page.clone()))
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        usize::from(!self.page.state().closed)
    }
}
