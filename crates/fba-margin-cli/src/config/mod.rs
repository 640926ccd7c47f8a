//! Configuration loading and resolution.
//!
//! Settings are layered, later layers winning: the config file, then
//! environment variables, then command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use fba_margin::sheet::{parse_column, DEFAULT_MARGIN_COLUMN, DEFAULT_WORKSHEET};
use fba_margin::CALCULATOR_URL;

pub const CONFIG_FILE_NAME: &str = "fba-margin.json";

pub const SHEET_ENV: &str = "FBA_MARGIN_SHEET";
pub const XLSX_ENV: &str = "FBA_MARGIN_XLSX";
pub const COOKIES_ENV: &str = "FBA_MARGIN_COOKIES";
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const HEADED_ENV: &str = "FBA_MARGIN_HEADED";

/// Cookie export looked for in the working directory when none is configured.
pub const DEFAULT_COOKIE_FILE: &str = "sellercentral.amazon.co.uk_json.json";

/// Key file looked for in the working directory when none is configured.
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";

/// One configuration layer. Unset fields defer to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    /// Google Sheet URL or id.
    pub sheet: Option<String>,
    /// Local workbook used instead of a Google Sheet.
    pub xlsx: Option<PathBuf>,
    pub worksheet: Option<String>,
    /// Margin column, as letters or a 1-based number.
    pub column: Option<String>,
    pub credentials: Option<PathBuf>,
    pub cookies: Option<PathBuf>,
    pub headed: Option<bool>,
    pub calculator_url: Option<String>,
}

/// Where the ASINs live.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum SheetSource {
    Google(String),
    Xlsx(PathBuf),
}

impl std::fmt::Display for SheetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetSource::Google(id) => write!(f, "Google Sheet {id}"),
            SheetSource::Xlsx(path) => write!(f, "workbook {}", path.display()),
        }
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub source: Option<SheetSource>,
    pub worksheet: String,
    pub margin_column: u32,
    pub credentials: Option<PathBuf>,
    pub cookies: Option<PathBuf>,
    pub headed: bool,
    pub calculator_url: String,
    /// The config file that was read, if any.
    pub config_file: Option<PathBuf>,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// The layer described by environment variables, read through `var`.
    pub fn from_env_with(var: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| var(name).filter(|v| !v.trim().is_empty());
        Self {
            sheet: non_empty(SHEET_ENV),
            xlsx: non_empty(XLSX_ENV).map(PathBuf::from),
            credentials: non_empty(CREDENTIALS_ENV).map(PathBuf::from),
            cookies: non_empty(COOKIES_ENV).map(PathBuf::from),
            headed: var(HEADED_ENV).and_then(|v| {
                let parsed = parse_bool(&v);
                if parsed.is_none() {
                    tracing::warn!("Ignoring {HEADED_ENV}={v:?}: expected true or false");
                }
                parsed
            }),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// Overlay `top` on `self`. A layer naming a sheet source replaces both
    /// source fields of the layer below.
    pub fn merge(mut self, top: Config) -> Config {
        if top.sheet.is_some() || top.xlsx.is_some() {
            self.sheet = top.sheet;
            self.xlsx = top.xlsx;
        }
        Config {
            sheet: self.sheet,
            xlsx: self.xlsx,
            worksheet: top.worksheet.or(self.worksheet),
            column: top.column.or(self.column),
            credentials: top.credentials.or(self.credentials),
            cookies: top.cookies.or(self.cookies),
            headed: top.headed.or(self.headed),
            calculator_url: top.calculator_url.or(self.calculator_url),
        }
    }

    /// Apply defaults and validate.
    pub fn resolve(self) -> Result<Settings> {
        let source = match (self.sheet, self.xlsx) {
            (Some(_), Some(_)) => bail!("both a Google Sheet and an xlsx workbook are configured"),
            (Some(sheet), None) => Some(SheetSource::Google(sheet)),
            (None, Some(path)) => Some(SheetSource::Xlsx(path)),
            (None, None) => None,
        };
        let margin_column = match self.column {
            Some(col) => parse_column(&col)?,
            None => DEFAULT_MARGIN_COLUMN,
        };
        Ok(Settings {
            source,
            worksheet: self
                .worksheet
                .unwrap_or_else(|| DEFAULT_WORKSHEET.to_string()),
            margin_column,
            credentials: self
                .credentials
                .or_else(|| existing(DEFAULT_CREDENTIALS_FILE)),
            cookies: self.cookies.or_else(|| existing(DEFAULT_COOKIE_FILE)),
            headed: self.headed.unwrap_or(false),
            calculator_url: self
                .calculator_url
                .unwrap_or_else(|| CALCULATOR_URL.to_string()),
            config_file: None,
        })
    }
}

fn existing(name: &str) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    path.exists().then_some(path)
}

/// Resolve the config file: explicit path > `./fba-margin.json` >
/// `~/.fba-margin/config.json`. Only an explicit path must exist.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("config file not found: {}", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    let cwd = PathBuf::from(CONFIG_FILE_NAME);
    if cwd.exists() {
        return Ok(Some(cwd));
    }

    Ok(default_config_path().filter(|p| p.exists()))
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".fba-margin").join("config.json"))
}

/// Load every layer and resolve: file < environment < `flags`.
pub fn load_settings(explicit: Option<&Path>, flags: Config) -> Result<Settings> {
    let config_file = resolve_config_path(explicit)?;
    let file_layer = match &config_file {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading config file");
            Config::load(path)?
        }
        None => Config::default(),
    };

    let mut settings = file_layer.merge(Config::from_env()).merge(flags).resolve()?;
    settings.config_file = config_file;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_layer() {
        let cfg = Config::from_env_with(env(&[
            (SHEET_ENV, "abc"),
            (COOKIES_ENV, "c.json"),
            (HEADED_ENV, "yes"),
            (XLSX_ENV, "  "),
        ]));
        assert_eq!(cfg.sheet.as_deref(), Some("abc"));
        assert_eq!(cfg.cookies, Some(PathBuf::from("c.json")));
        assert_eq!(cfg.headed, Some(true));
        assert!(cfg.xlsx.is_none());
    }

    #[test]
    fn test_bad_headed_value_ignored() {
        let cfg = Config::from_env_with(env(&[(HEADED_ENV, "maybe")]));
        assert!(cfg.headed.is_none());
    }

    #[test]
    fn test_merge_prefers_top() {
        let base = Config {
            worksheet: Some("Base".into()),
            column: Some("D".into()),
            headed: Some(true),
            ..Config::default()
        };
        let top = Config {
            worksheet: Some("Top".into()),
            ..Config::default()
        };
        let merged = base.merge(top);
        assert_eq!(merged.worksheet.as_deref(), Some("Top"));
        assert_eq!(merged.column.as_deref(), Some("D"));
        assert_eq!(merged.headed, Some(true));
    }

    #[test]
    fn test_source_replaced_as_a_whole() {
        let base = Config {
            sheet: Some("from-file".into()),
            ..Config::default()
        };
        let top = Config {
            xlsx: Some("local.xlsx".into()),
            ..Config::default()
        };
        let settings = base.merge(top).resolve().unwrap();
        assert_eq!(
            settings.source,
            Some(SheetSource::Xlsx(PathBuf::from("local.xlsx")))
        );
    }

    #[test]
    fn test_resolve_defaults() {
        let settings = Config::default().resolve().unwrap();
        assert!(settings.source.is_none());
        assert_eq!(settings.worksheet, DEFAULT_WORKSHEET);
        assert_eq!(settings.margin_column, 3);
        assert!(!settings.headed);
        assert_eq!(settings.calculator_url, CALCULATOR_URL);
    }

    #[test]
    fn test_resolve_rejects_bad_column() {
        let cfg = Config {
            column: Some("C3".into()),
            ..Config::default()
        };
        assert!(cfg.resolve().is_err());
    }

    #[test]
    fn test_both_sources_in_one_layer_rejected() {
        let cfg = Config {
            sheet: Some("abc".into()),
            xlsx: Some("a.xlsx".into()),
            ..Config::default()
        };
        assert!(cfg.resolve().is_err());
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_config_path(Some(&dir.path().join("missing.json"))).is_err());
    }
}
