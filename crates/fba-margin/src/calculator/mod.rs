//! Driver for the Amazon FBA Revenue Calculator.
//!
//! Wraps one browser context and performs the guest sign-in, the per-ASIN
//! search and the margin extraction. All waits come from
//! [`CalculatorTimings`].

pub mod scripts;

#[cfg(test)]
pub(crate) mod fake;

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::browser::{is_truthy, wait_for, RenderContext};
use crate::margin::first_valid_margin;
use crate::types::Margin;

/// The UK calculator page.
pub const CALCULATOR_URL: &str =
    "https://sellercentral.amazon.co.uk/hz/fba/profitabilitycalculator/index?lang=en_GB";

/// Waits and attempt counts used while driving the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculatorTimings {
    pub navigation_timeout: Duration,
    /// Longest wait for an element to appear.
    pub element_timeout: Duration,
    pub poll_interval: Duration,
    /// Pause after page-changing clicks.
    pub settle: Duration,
    pub after_fill: Duration,
    pub after_search: Duration,
    /// Pause after each lookup before the next navigation.
    pub after_lookup: Duration,
    pub retry_delay: Duration,
    /// Attempts for the guest gate and for locating the input.
    pub retry_attempts: u32,
    /// Extra searches when the page reports a failed product match.
    pub failed_match_retries: u32,
    /// Select/search-another rounds before giving up on a product.
    pub max_recovery_attempts: u32,
}

impl Default for CalculatorTimings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(60),
            element_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(250),
            settle: Duration::from_secs(5),
            after_fill: Duration::from_secs(1),
            after_search: Duration::from_secs(7),
            after_lookup: Duration::from_secs(1),
            retry_delay: Duration::from_secs(2),
            retry_attempts: 3,
            failed_match_retries: 3,
            max_recovery_attempts: 3,
        }
    }
}

impl CalculatorTimings {
    /// No waiting at all; every probe is checked exactly once.
    pub fn immediate() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(5),
            element_timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
            settle: Duration::ZERO,
            after_fill: Duration::ZERO,
            after_search: Duration::ZERO,
            after_lookup: Duration::ZERO,
            retry_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// What a single ASIN lookup produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LookupOutcome {
    /// A valid margin, plus every percentage label seen.
    Found { margin: Margin, labels: Vec<String> },
    /// Percentage labels rendered, but none is a plain margin.
    NoValidMargin { labels: Vec<String> },
    /// No percentage labels at all.
    NoMargin,
    /// The ASIN input could not be located.
    InputNotFound,
    /// The search button could not be clicked.
    SearchUnavailable,
    /// The product picker had no "Select" button.
    SelectUnavailable,
}

impl LookupOutcome {
    pub fn margin(&self) -> Option<&Margin> {
        match self {
            LookupOutcome::Found { margin, .. } => Some(margin),
            _ => None,
        }
    }

    /// True when the page itself could not be driven, as opposed to simply
    /// showing no margin for the product.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            LookupOutcome::InputNotFound
                | LookupOutcome::SearchUnavailable
                | LookupOutcome::SelectUnavailable
        )
    }

    fn from_labels(labels: Vec<String>) -> Self {
        if labels.is_empty() {
            return LookupOutcome::NoMargin;
        }
        match first_valid_margin(&labels) {
            Some(margin) => LookupOutcome::Found { margin, labels },
            None => LookupOutcome::NoValidMargin { labels },
        }
    }
}

/// Same scheme, host and path; query strings and fragments are ignored.
fn same_page(a: &str, b: &str) -> bool {
    let page = |u: &str| {
        u.split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string()
    };
    page(a) == page(b)
}

/// A browser context pointed at the calculator.
pub struct Calculator {
    ctx: Box<dyn RenderContext>,
    url: String,
    timings: CalculatorTimings,
}

impl Calculator {
    pub fn new(ctx: Box<dyn RenderContext>, timings: CalculatorTimings) -> Self {
        Self {
            ctx,
            url: CALCULATOR_URL.to_string(),
            timings,
        }
    }

    /// Point the driver at a different calculator URL (other marketplaces, tests).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Give the context back, e.g. to close it.
    pub fn into_context(self) -> Box<dyn RenderContext> {
        self.ctx
    }

    /// Navigate to the calculator and pass the guest gate.
    ///
    /// Returns `Ok(false)` when the page loaded but the gate could not be passed.
    pub async fn open(&mut self) -> Result<bool> {
        let timeout_ms = self.timings.navigation_timeout.as_millis() as u64;
        let nav = self
            .ctx
            .navigate(&self.url, timeout_ms)
            .await
            .with_context(|| format!("failed to load {}", self.url))?;
        tracing::info!(
            load_time_ms = nav.load_time_ms,
            final_url = %nav.final_url,
            "Navigated to FBA calculator page"
        );
        if !same_page(&nav.final_url, &self.url) {
            tracing::warn!(
                requested = %self.url,
                final_url = %nav.final_url,
                "Redirected away from the calculator"
            );
        }
        Ok(self.continue_as_guest().await)
    }

    /// Navigate back to a fresh calculator before the next ASIN.
    pub async fn reset(&mut self) -> Result<bool> {
        self.open().await
    }

    /// Click "Continue as Guest", or accept a page that is already past the gate.
    pub async fn continue_as_guest(&mut self) -> bool {
        let t = &self.timings;
        for attempt in 1..=t.retry_attempts.max(1) {
            if wait_for(
                self.ctx.as_ref(),
                scripts::GATE_OR_READY,
                t.element_timeout,
                t.poll_interval,
            )
            .await
            {
                if self.eval_bool(scripts::CLICK_CONTINUE).await {
                    tracing::info!("Clicked 'Continue as Guest'");
                    tokio::time::sleep(t.settle).await;
                    return true;
                }
                if self.eval_bool(scripts::INPUT_PRESENT).await {
                    tracing::debug!("Calculator already past the guest gate");
                    return true;
                }
            }
            tracing::warn!(attempt, "'Continue as Guest' not available");
            if attempt < t.retry_attempts {
                tokio::time::sleep(t.retry_delay).await;
            }
        }
        false
    }

    /// Look up one ASIN and extract its net profit margin.
    pub async fn lookup(&mut self, asin: &str) -> Result<LookupOutcome> {
        let outcome = self.lookup_inner(asin).await;
        tokio::time::sleep(self.timings.after_lookup).await;
        outcome
    }

    async fn lookup_inner(&mut self, asin: &str) -> Result<LookupOutcome> {
        let t = self.timings.clone();
        tokio::time::sleep(t.settle).await;

        if !self.locate_input().await {
            let url = self.ctx.get_url().await.unwrap_or_default();
            tracing::error!(asin, %url, "Could not locate ASIN input inside shadow DOM");
            return Ok(LookupOutcome::InputNotFound);
        }
        if !is_truthy(&self.ctx.execute_js(&scripts::fill_asin(asin)).await?) {
            tracing::error!(asin, "ASIN input disappeared before it could be filled");
            return Ok(LookupOutcome::InputNotFound);
        }
        tracing::info!(asin, "Entered ASIN");
        tokio::time::sleep(t.after_fill).await;

        if !self.click_search().await? {
            return Ok(LookupOutcome::SearchUnavailable);
        }
        tokio::time::sleep(t.after_search).await;

        for _ in 0..t.failed_match_retries {
            if !self.failed_match().await? {
                break;
            }
            tracing::warn!(asin, "Product match failed, retrying search");
            if !self.click_search().await? {
                return Ok(LookupOutcome::SearchUnavailable);
            }
            tokio::time::sleep(t.after_search).await;
        }

        let labels = self.margin_labels().await?;
        tracing::info!(asin, ?labels, "Margin labels found");
        if !labels.is_empty() {
            return Ok(self.report(asin, LookupOutcome::from_labels(labels)));
        }

        if self.eval_bool(scripts::ALERT_PRESENT).await {
            tracing::warn!(asin, "Warning shown without margins, choosing another match");
            let outcome = self.recover(asin).await?;
            return Ok(self.report(asin, outcome));
        }

        tracing::warn!(asin, "No margin values found");
        Ok(LookupOutcome::NoMargin)
    }

    /// Walk the product picker: "Search another product", then "Select"
    /// until a product renders without the warning.
    async fn recover(&mut self, asin: &str) -> Result<LookupOutcome> {
        let t = self.timings.clone();
        let search_another = scripts::click_test_id(scripts::SEARCH_ANOTHER_BUTTON);
        let select = scripts::click_test_id(scripts::SELECT_PRODUCT_BUTTON);

        if !is_truthy(&self.ctx.execute_js(&search_another).await?) {
            tracing::warn!(asin, "'Search another product' button not found");
            return Ok(LookupOutcome::NoMargin);
        }
        tracing::info!(asin, "Clicked 'Search another product'");
        tokio::time::sleep(t.settle).await;

        for attempt in 1..=t.max_recovery_attempts {
            if !is_truthy(&self.ctx.execute_js(&select).await?) {
                tracing::error!(asin, "'Select' button not found in product picker");
                return Ok(LookupOutcome::SelectUnavailable);
            }
            tracing::info!(asin, attempt, "Clicked 'Select'");
            tokio::time::sleep(t.settle).await;

            if self.eval_bool(scripts::ALERT_PRESENT).await {
                tracing::warn!(asin, attempt, "Warning still shown after selecting");
                self.ctx.execute_js(&search_another).await?;
                tokio::time::sleep(t.settle).await;
                continue;
            }

            let labels = self.margin_labels().await?;
            return Ok(LookupOutcome::from_labels(labels));
        }

        tracing::warn!(
            asin,
            attempts = t.max_recovery_attempts,
            "Gave up choosing another product"
        );
        Ok(LookupOutcome::NoMargin)
    }

    fn report(&self, asin: &str, outcome: LookupOutcome) -> LookupOutcome {
        match &outcome {
            LookupOutcome::Found { margin, .. } => {
                tracing::info!(asin, margin = %margin, "Net profit margin found")
            }
            LookupOutcome::NoValidMargin { labels } => {
                tracing::warn!(asin, ?labels, "No valid numeric margin among extracted values")
            }
            _ => {}
        }
        outcome
    }

    async fn locate_input(&self) -> bool {
        let t = &self.timings;
        for attempt in 1..=t.retry_attempts.max(1) {
            if wait_for(
                self.ctx.as_ref(),
                scripts::INPUT_PRESENT,
                t.element_timeout,
                t.poll_interval,
            )
            .await
            {
                return true;
            }
            tracing::debug!(attempt, "ASIN input not present yet");
            if attempt < t.retry_attempts {
                tokio::time::sleep(t.retry_delay).await;
            }
        }
        false
    }

    async fn click_search(&self) -> Result<bool> {
        let clicked = is_truthy(&self.ctx.execute_js(scripts::CLICK_SEARCH).await?);
        if clicked {
            tracing::debug!("Clicked 'Search' inside shadow DOM");
        } else {
            tracing::error!("Search button not found inside shadow DOM");
        }
        Ok(clicked)
    }

    async fn failed_match(&self) -> Result<bool> {
        let description = self.ctx.execute_js(scripts::ALERT_DESCRIPTION).await?;
        Ok(description
            .as_str()
            .is_some_and(|d| d.contains(scripts::FAILED_MATCH_TEXT)))
    }

    /// Wait for result labels and collect the percentage ones.
    async fn margin_labels(&self) -> Result<Vec<String>> {
        let t = &self.timings;
        if !wait_for(
            self.ctx.as_ref(),
            scripts::LABEL_PRESENT,
            t.element_timeout,
            t.poll_interval,
        )
        .await
        {
            return Ok(Vec::new());
        }
        let value = self.ctx.execute_js(scripts::MARGIN_LABELS).await?;
        let labels: Vec<String> = serde_json::from_value(value)
            .context("margin label script returned something other than a list of strings")?;
        Ok(labels)
    }

    async fn eval_bool(&self, script: &str) -> bool {
        match self.ctx.execute_js(script).await {
            Ok(v) => is_truthy(&v),
            Err(e) => {
                tracing::debug!("probe failed: {e}");
                false
            }
        }
    }
}
