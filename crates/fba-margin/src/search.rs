//! Amazon UK search results scraper.
//!
//! Fetches one search results page over plain HTTP and extracts a row per
//! product tile. The rows are written to an `Amazon` worksheet by the CLI.

use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sheet::CellValue;

pub const AMAZON_UK_BASE: &str = "https://www.amazon.co.uk";

/// Worksheet receiving search results.
pub const SEARCH_WORKSHEET: &str = "Amazon";

/// Desktop browsers rotated per request.
pub const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0.3 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/85.0.4183.83 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
];

/// One product tile from a search results page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchProduct {
    /// 1-based position on the page.
    pub position: u32,
    pub url: Option<String>,
    pub asin: String,
    pub price: f64,
    pub title: Option<String>,
    pub rating: f64,
    pub currency: String,
    pub is_prime: bool,
    pub image_url: Option<String>,
    pub best_seller: bool,
    pub price_upper: f64,
    pub is_sponsored: bool,
    pub manufacturer: String,
    pub pricing_count: u32,
    pub reviews_count: u32,
    pub is_amazons_choice: bool,
    pub price_strikethrough: f64,
    pub shipping_information: Option<String>,
}

impl SearchProduct {
    pub const HEADERS: [&'static str; 18] = [
        "Position",
        "URL",
        "ASIN",
        "Price",
        "Title",
        "Rating",
        "Currency",
        "Is Prime",
        "Image URL",
        "Best Seller",
        "Price Upper",
        "Is Sponsored",
        "Manufacturer",
        "Pricing Count",
        "Reviews Count",
        "Is Amazon's Choice",
        "Price Strikethrough",
        "Shipping Information",
    ];

    /// The header row as cells.
    pub fn header_row() -> Vec<CellValue> {
        Self::HEADERS.iter().map(|h| CellValue::from(*h)).collect()
    }

    /// Cells in [`Self::HEADERS`] order. Missing text fields are blank.
    pub fn to_row(&self) -> Vec<CellValue> {
        let text = |v: &Option<String>| CellValue::from(v.clone().unwrap_or_default());
        vec![
            self.position.into(),
            text(&self.url),
            self.asin.clone().into(),
            self.price.into(),
            text(&self.title),
            self.rating.into(),
            self.currency.clone().into(),
            self.is_prime.into(),
            text(&self.image_url),
            self.best_seller.into(),
            self.price_upper.into(),
            self.is_sponsored.into(),
            self.manufacturer.clone().into(),
            self.pricing_count.into(),
            self.reviews_count.into(),
            self.is_amazons_choice.into(),
            self.price_strikethrough.into(),
            text(&self.shipping_information),
        ]
    }
}

/// Search URL for `query`, form-encoded.
pub fn search_url(query: &str) -> String {
    search_url_at(AMAZON_UK_BASE, query)
}

fn search_url_at(base: &str, query: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!("{}/s?k={encoded}&ref=nb_sb_noss", base.trim_end_matches('/'))
}

// ─── parsing ───

fn first<'a>(item: &ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(css).ok()?;
    item.select(&sel).next()
}

fn first_text(item: &ElementRef<'_>, css: &str) -> Option<String> {
    first(item, css).map(|el| el.text().collect::<String>().trim().to_string())
}

fn all_text(item: &ElementRef<'_>, css: &str) -> Vec<String> {
    match Selector::parse(css) {
        Ok(sel) => item
            .select(&sel)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// `£1,299.99` → 1299.99; anything unparseable is 0.
fn parse_price(text: &str) -> f64 {
    text.replace(['£', ','], "").trim().parse().unwrap_or(0.0)
}

fn absolute_url(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{AMAZON_UK_BASE}{href}")
    }
}

fn parse_item(item: &ElementRef<'_>, asin: &str, position: u32) -> SearchProduct {
    let price = first_text(item, "span.a-price-whole")
        .or_else(|| first_text(item, "span.a-offscreen"))
        .map(|p| parse_price(&p))
        .unwrap_or(0.0);

    let rating = first_text(item, "span.a-icon-alt")
        .and_then(|r| r.split_whitespace().next().and_then(|v| v.parse().ok()))
        .unwrap_or(0.0);

    let reviews_count = first_text(item, "span.a-size-base")
        .and_then(|r| r.replace(',', "").parse().ok())
        .unwrap_or(0);

    let price_strikethrough = first_text(item, "span.a-price-strikethrough span.a-offscreen")
        .or_else(|| first_text(item, "span.a-price-strikethrough"))
        .map(|p| parse_price(&p))
        .unwrap_or(0.0);

    let badges = all_text(item, "span.a-badge-text, span.a-badge-label");

    SearchProduct {
        position,
        url: first(item, "a.a-link-normal")
            .and_then(|a| a.value().attr("href"))
            .map(absolute_url),
        asin: asin.to_string(),
        price,
        title: first_text(item, "span.a-text-normal"),
        rating,
        currency: "GBP".to_string(),
        is_prime: first(item, "i.a-icon-prime").is_some(),
        image_url: first(item, "img.s-image")
            .and_then(|img| img.value().attr("src"))
            .map(String::from),
        best_seller: badges.iter().any(|b| b.contains("Best Seller")),
        price_upper: price,
        is_sponsored: first(item, "span.s-sponsored-label").is_some(),
        manufacturer: String::new(),
        pricing_count: 1,
        reviews_count,
        is_amazons_choice: badges.iter().any(|b| b.contains("Amazon's")),
        price_strikethrough,
        shipping_information: first_text(item, r#"span.a-size-base[aria-label="shipping"]"#),
    }
}

/// Extract every product tile (`div[data-asin]` with a non-empty ASIN).
pub fn parse_results(html: &str) -> Vec<SearchProduct> {
    let document = Html::parse_document(html);
    let Ok(sel) = Selector::parse("div[data-asin]") else {
        return Vec::new();
    };

    let mut products = Vec::new();
    for item in document.select(&sel) {
        let asin = item.value().attr("data-asin").unwrap_or_default().trim();
        if asin.is_empty() {
            continue;
        }
        let position = products.len() as u32 + 1;
        products.push(parse_item(&item, asin, position));
    }
    products
}

// ─── client ───

/// Fetches search pages with a rotating user agent and a randomised delay.
pub struct SearchClient {
    client: reqwest::Client,
    base_url: String,
    min_delay: Duration,
    max_delay: Duration,
}

impl Default for SearchClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: AMAZON_UK_BASE.to_string(),
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
        }
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }

    /// Pause a random duration in `min..=max` before each request.
    pub fn with_delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max.max(min);
        self
    }

    fn pick_delay(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let ms = rand::thread_rng()
            .gen_range(self.min_delay.as_millis() as u64..=self.max_delay.as_millis() as u64);
        Duration::from_millis(ms)
    }

    /// Fetch and parse the results page for `query`.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchProduct>> {
        let url = search_url_at(&self.base_url, query);
        let ua = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        tracing::info!(query, "Searching Amazon UK");

        tokio::time::sleep(self.pick_delay()).await;

        let body = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, ua)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-GB,en;q=0.9")
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp",
            )
            .header(reqwest::header::CONNECTION, "keep-alive")
            .header(reqwest::header::DNT, "1")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let products = parse_results(&body);
        tracing::info!(query, count = products.len(), "Extracted search results");
        Ok(products)
    }
}
