//! Session cookies exported from a signed-in browser.
//!
//! The calculator is reached as a guest, but a Seller Central cookie export
//! (the JSON written by common "export cookies" browser extensions) avoids
//! region and consent interstitials. Cookies are normalised before they are
//! handed to the browser.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// `sameSite` values the browser accepts.
const VALID_SAME_SITE: [&str; 3] = ["Strict", "Lax", "None"];

/// A cookie ready to be injected into a browser context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub same_site: Option<String>,
    /// Expiry as seconds since the Unix epoch; session cookies have none.
    #[serde(default)]
    pub expiration_date: Option<f64>,
}

fn default_path() -> String {
    "/".to_string()
}

impl BrowserCookie {
    /// Apply the browser's constraints in place.
    pub fn normalize(&mut self) {
        if let Some(stripped) = self.domain.strip_prefix('.') {
            self.domain = stripped.to_string();
        }
        if let Some(same_site) = &self.same_site {
            if !VALID_SAME_SITE.contains(&same_site.as_str()) {
                self.same_site = Some("Lax".to_string());
            }
        }
    }
}

/// Parse and normalise a cookie export.
pub fn parse_cookies(json: &str) -> std::result::Result<Vec<BrowserCookie>, serde_json::Error> {
    let mut cookies: Vec<BrowserCookie> = serde_json::from_str(json)?;
    for cookie in &mut cookies {
        cookie.normalize();
    }
    Ok(cookies)
}

/// Load a cookie export from disk.
pub fn load_cookies(path: &Path) -> Result<Vec<BrowserCookie>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::error!(
                "Cookie file {} not found. Provide a cookie JSON export.",
                path.display()
            );
            return Err(Error::CookieFileNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let cookies = parse_cookies(&raw).map_err(|source| {
        tracing::error!("Invalid JSON in {}. Check the cookie file.", path.display());
        Error::InvalidCookieFile {
            path: path.to_path_buf(),
            source,
        }
    })?;

    tracing::debug!("Loaded {} cookies from {}", cookies.len(), path.display());
    Ok(cookies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXPORT: &str = r#"[
        {
            "domain": ".amazon.co.uk",
            "expirationDate": 1790000000.5,
            "hostOnly": false,
            "httpOnly": true,
            "name": "session-id",
            "path": "/",
            "sameSite": "no_restriction",
            "secure": true,
            "session": false,
            "storeId": "0",
            "value": "261-1234567-7654321"
        },
        {
            "domain": "sellercentral.amazon.co.uk",
            "name": "i18n-prefs",
            "value": "GBP",
            "sameSite": "Strict"
        },
        {
            "domain": "sellercentral.amazon.co.uk",
            "name": "lc-acbuk",
            "value": "en_GB"
        }
    ]"#;

    #[test]
    fn test_parse_normalizes_domain_and_same_site() {
        let cookies = parse_cookies(EXPORT).unwrap();
        assert_eq!(cookies.len(), 3);

        assert_eq!(cookies[0].domain, "amazon.co.uk");
        assert_eq!(cookies[0].same_site.as_deref(), Some("Lax"));
        assert!(cookies[0].http_only);
        assert_eq!(cookies[0].expiration_date, Some(1790000000.5));

        assert_eq!(cookies[1].same_site.as_deref(), Some("Strict"));
        assert_eq!(cookies[1].path, "/");

        assert_eq!(cookies[2].same_site, None);
        assert!(!cookies[2].secure);
    }

    #[test]
    fn test_unspecified_same_site_becomes_lax() {
        let mut cookie = BrowserCookie {
            name: "a".into(),
            value: "b".into(),
            domain: "example.com".into(),
            path: "/".into(),
            secure: false,
            http_only: false,
            same_site: Some("unspecified".into()),
            expiration_date: None,
        };
        cookie.normalize();
        assert_eq!(cookie.same_site.as_deref(), Some("Lax"));
        assert_eq!(cookie.domain, "example.com");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_cookies(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::CookieFileNotFound(_)));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "{{ not json").unwrap();
        let err = load_cookies(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidCookieFile { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, EXPORT).unwrap();
        let cookies = load_cookies(&path).unwrap();
        assert_eq!(cookies[0].name, "session-id");
    }
}
