//! Page scripts for the FBA Revenue Calculator.
//!
//! The calculator is built from `kat-*` web components, so most controls
//! live inside shadow roots and cannot be reached with plain selectors.
//! Every script is a self-contained expression returning JSON.

use crate::browser::js_string;

/// Truthy once either the guest gate or the search input is on the page.
pub const GATE_OR_READY: &str = r#"(() => {
    if (document.querySelector('[data-testid="continue-btn"]')) return true;
    const host = document.querySelector('kat-input[data-testid="product-search-input"]');
    return !!(host && host.shadowRoot && host.shadowRoot.querySelector('input'));
})()"#;

/// Click "Continue as Guest"; false when the button is absent.
pub const CLICK_CONTINUE: &str = r#"(() => {
    const btn = document.querySelector('[data-testid="continue-btn"]');
    if (!btn) return false;
    btn.click();
    return true;
})()"#;

/// Whether the ASIN input exists inside its shadow root.
pub const INPUT_PRESENT: &str = r#"(() => {
    const host = document.querySelector('kat-input[data-testid="product-search-input"]');
    if (!host || !host.shadowRoot) return false;
    return !!host.shadowRoot.querySelector('input');
})()"#;

/// Click the submit button inside the search button's shadow root.
pub const CLICK_SEARCH: &str = r#"(() => {
    const host = document.querySelector('kat-button[data-testid="product-search-button"]');
    if (!host || !host.shadowRoot) return false;
    const btn = host.shadowRoot.querySelector('button.button[type="submit"]');
    if (!btn) return false;
    btn.click();
    return true;
})()"#;

/// The alert's `description` attribute, `""` when empty, `null` without an alert.
pub const ALERT_DESCRIPTION: &str = r#"(() => {
    const alert = document.querySelector('kat-alert[data-testid="alert-component"]');
    if (!alert) return null;
    const description = alert.getAttribute('description');
    return description ? description.trim() : '';
})()"#;

/// Whether the warning alert is shown.
pub const ALERT_PRESENT: &str = r#"!!document.querySelector('[data-testid="alert-component"]')"#;

/// Whether any result label has rendered.
pub const LABEL_PRESENT: &str = r#"!!document.querySelector('kat-label')"#;

/// Trimmed text of every `kat-label` whose shadow text contains `%`, in document order.
pub const MARGIN_LABELS: &str = r#"(() => {
    const results = [];
    for (const label of document.querySelectorAll('kat-label')) {
        const root = label.shadowRoot;
        if (!root) continue;
        const span = root.querySelector('span[part="label-text"]');
        if (span && span.textContent.trim().includes('%')) {
            results.push(span.textContent.trim());
        }
    }
    return results;
})()"#;

/// `data-testid` of the "Search another product" button.
pub const SEARCH_ANOTHER_BUTTON: &str = "search-another-product-btn";

/// `data-testid` of the "Select" button in the product picker.
pub const SELECT_PRODUCT_BUTTON: &str = "select-product-btn";

/// Alert text shown when the ASIN lookup did not resolve to a product.
pub const FAILED_MATCH_TEXT: &str = "Failed to get product match";

/// Clear the ASIN input and type `asin`, firing the events the component listens to.
pub fn fill_asin(asin: &str) -> String {
    format!(
        r#"(() => {{
    const host = document.querySelector('kat-input[data-testid="product-search-input"]');
    if (!host || !host.shadowRoot) return false;
    const input = host.shadowRoot.querySelector('input');
    if (!input) return false;
    const fire = (type) => input.dispatchEvent(new Event(type, {{ bubbles: true, composed: true }}));
    input.focus();
    input.value = '';
    fire('input');
    input.value = '{asin}';
    host.value = '{asin}';
    fire('input');
    fire('change');
    return true;
}})()"#,
        asin = js_string(asin)
    )
}

/// Click the element carrying `data-testid`; false when absent.
pub fn click_test_id(test_id: &str) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector('[data-testid="{}"]');
    if (!el) return false;
    el.click();
    return true;
}})()"#,
        js_string(test_id)
    )
}
