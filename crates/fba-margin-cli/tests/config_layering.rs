//! Config layering: defaults < config file < environment < flags.

use std::path::PathBuf;

use clap::Parser;
use fba_margin_cli::cli::Cli;
use fba_margin_cli::config::{
    load_settings, Config, SheetSource, COOKIES_ENV, HEADED_ENV, SHEET_ENV, XLSX_ENV,
};

fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("fba-margin.json");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_file_then_env_then_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"{
            "sheet": "https://docs.google.com/spreadsheets/d/fromfile/edit",
            "worksheet": "Products",
            "column": "E",
            "cookies": "file-cookies.json",
            "headed": false
        }"#,
    );

    let file = Config::load(&path).unwrap();
    let env = Config::from_env_with(|name| match name {
        n if n == COOKIES_ENV => Some("env-cookies.json".to_string()),
        n if n == HEADED_ENV => Some("1".to_string()),
        _ => None,
    });
    let cli = Cli::try_parse_from(["fba-margin", "list", "--column", "D"]).unwrap();

    let settings = file.merge(env).merge(cli.source.to_config()).resolve().unwrap();

    assert_eq!(
        settings.source,
        Some(SheetSource::Google(
            "https://docs.google.com/spreadsheets/d/fromfile/edit".to_string()
        ))
    );
    assert_eq!(settings.worksheet, "Products");
    assert_eq!(settings.margin_column, 4);
    assert_eq!(settings.cookies, Some(PathBuf::from("env-cookies.json")));
    assert!(settings.headed);
}

#[test]
fn test_env_source_replaces_file_source() {
    let file = Config {
        sheet: Some("fromfile".into()),
        ..Config::default()
    };
    let env = Config::from_env_with(|name| (name == XLSX_ENV).then(|| "local.xlsx".to_string()));

    let settings = file.merge(env).resolve().unwrap();
    assert_eq!(
        settings.source,
        Some(SheetSource::Xlsx(PathBuf::from("local.xlsx")))
    );
}

#[test]
fn test_flag_source_wins_over_env() {
    let env = Config::from_env_with(|name| (name == SHEET_ENV).then(|| "fromenv".to_string()));
    let cli = Cli::try_parse_from(["fba-margin", "run", "--xlsx", "flag.xlsx"]).unwrap();

    let settings = Config::default()
        .merge(env)
        .merge(cli.source.to_config())
        .resolve()
        .unwrap();
    assert_eq!(
        settings.source,
        Some(SheetSource::Xlsx(PathBuf::from("flag.xlsx")))
    );
}

#[test]
fn test_load_settings_records_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, r#"{ "xlsx": "from-file.xlsx", "worksheet": "Sheet1" }"#);

    let flags = Config {
        xlsx: Some("from-flag.xlsx".into()),
        ..Config::default()
    };
    let settings = load_settings(Some(&path), flags).unwrap();
    assert_eq!(settings.config_file, Some(path));
    assert_eq!(settings.worksheet, "Sheet1");
    assert_eq!(
        settings.source,
        Some(SheetSource::Xlsx(PathBuf::from("from-flag.xlsx")))
    );
}

#[test]
fn test_invalid_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "{ \"worksheet\": 3 }");
    let err = load_settings(Some(&path), Config::default()).unwrap_err();
    assert!(format!("{err:#}").contains("invalid config file"));
}
