//! Environment readiness check.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use fba_margin::browser::find_chromium;
use fba_margin::cookies::load_cookies;
use fba_margin::google_auth::{ServiceAccountKey, ACCESS_TOKEN_ENV};

use crate::config::{SheetSource, Settings};
use crate::output::Output;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Warn,
    Missing,
}

impl Status {
    fn tag(self) -> &'static str {
        match self {
            Status::Ok => "[OK]",
            Status::Warn => "[??]",
            Status::Missing => "[!!]",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub status: Status,
    pub detail: String,
}

fn check(name: &'static str, status: Status, detail: impl Into<String>) -> Check {
    Check {
        name,
        status,
        detail: detail.into(),
    }
}

fn chromium_check() -> Check {
    match find_chromium() {
        Some(path) => check("chromium", Status::Ok, format!("found: {}", path.display())),
        None => check(
            "chromium",
            Status::Missing,
            "not found; install Chrome/Chromium or set FBA_MARGIN_CHROMIUM_PATH",
        ),
    }
}

fn source_check(settings: &Settings) -> Check {
    match &settings.source {
        Some(SheetSource::Xlsx(path)) if !path.exists() => check(
            "sheet",
            Status::Warn,
            format!("{} does not exist yet", path.display()),
        ),
        Some(source) => check("sheet", Status::Ok, source.to_string()),
        None => check("sheet", Status::Missing, "none configured (--sheet or --xlsx)"),
    }
}

fn credentials_check(settings: &Settings) -> Check {
    let needs_google = matches!(settings.source, Some(SheetSource::Google(_)));
    if let Some(path) = &settings.credentials {
        return match ServiceAccountKey::from_file(path) {
            Ok(key) => check(
                "credentials",
                Status::Ok,
                format!(
                    "{} ({}); share the sheet with this address",
                    path.display(),
                    key.client_email
                ),
            ),
            Err(e) => check("credentials", Status::Missing, e.to_string()),
        };
    }
    if std::env::var(ACCESS_TOKEN_ENV).is_ok_and(|v| !v.trim().is_empty()) {
        return check("credentials", Status::Ok, format!("access token from {ACCESS_TOKEN_ENV}"));
    }
    let status = if needs_google { Status::Missing } else { Status::Warn };
    check("credentials", status, "no service account key or access token")
}

fn cookies_check(path: Option<&Path>) -> Check {
    match path {
        Some(path) => match load_cookies(path) {
            Ok(cookies) => check(
                "cookies",
                Status::Ok,
                format!("{} cookies in {}", cookies.len(), path.display()),
            ),
            Err(e) => check("cookies", Status::Missing, e.to_string()),
        },
        None => check("cookies", Status::Warn, "no cookie file; continuing as guest only"),
    }
}

/// Every check, in display order.
pub fn checks(settings: &Settings) -> Vec<Check> {
    vec![
        chromium_check(),
        source_check(settings),
        credentials_check(settings),
        cookies_check(settings.cookies.as_deref()),
    ]
}

/// Ready when nothing is outright missing.
pub fn is_ready(checks: &[Check]) -> bool {
    checks.iter().all(|c| c.status != Status::Missing)
}

pub async fn run(settings: &Settings, out: Output) -> Result<()> {
    let checks = checks(settings);
    let ready = is_ready(&checks);

    if out.json {
        return out.print_json(&serde_json::json!({
            "ready": ready,
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "config_file": settings.config_file,
            "checks": checks,
        }));
    }

    println!("fba-margin doctor");
    println!("=================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    match &settings.config_file {
        Some(path) => println!("Config: {}", path.display()),
        None => println!("Config: none (defaults, environment and flags)"),
    }
    println!();
    for c in &checks {
        println!("{} {:<12} {}", c.status.tag(), c.name, c.detail);
    }
    println!();
    println!("Status: {}", if ready { "READY" } else { "NOT READY" });
    Ok(())
}
