//! GoogleSheetStore against a mock Sheets API.

use std::sync::Arc;

use fba_margin::google_auth::{ServiceAccountAuth, ServiceAccountKey, StaticToken, SHEETS_SCOPE};
use fba_margin::sheet::GoogleSheetStore;
use fba_margin::{read_identifiers, CellValue, Error, SheetStore};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ─── helpers ───

fn store(server: &MockServer) -> GoogleSheetStore {
    GoogleSheetStore::new("sheet123", Arc::new(StaticToken::new("ya29.static")))
        .unwrap()
        .with_base_url(&server.uri())
        .unwrap()
}

async fn mount_column(server: &MockServer, bearer: &str, values: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/v4/spreadsheets/sheet123/values/'ASINs'!A:A$"))
        .and(query_param("majorDimension", "COLUMNS"))
        .and(header("authorization", format!("Bearer {bearer}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "ASINs!A1:A5",
            "majorDimension": "COLUMNS",
            "values": [values]
        })))
        .mount(server)
        .await;
}

// ─── reading ───

#[tokio::test]
async fn test_read_identifiers_with_header_and_blanks() {
    let server = MockServer::start().await;
    mount_column(&server, "ya29.static", json!(["ASIN", "B000000001", "", "B000000003"])).await;

    let mut store = store(&server);
    let rows = read_identifiers(&mut store, "ASINs").await.unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].row, rows[0].asin.as_str()), (2, "B000000001"));
    assert_eq!((rows[1].row, rows[1].asin.as_str()), (4, "B000000003"));
}

#[tokio::test]
async fn test_empty_range_reads_as_empty_column() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/values/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "ASINs!A1:A1000",
            "majorDimension": "COLUMNS"
        })))
        .mount(&server)
        .await;

    let mut store = store(&server);
    assert!(store.read_column("ASINs", 1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_worksheet() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/values/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "Unable to parse range: 'Missing'!A:A",
                "status": "INVALID_ARGUMENT"
            }
        })))
        .mount(&server)
        .await;

    let mut store = store(&server);
    let err = store.read_column("Missing", 1).await.unwrap_err();
    assert!(matches!(err, Error::WorksheetNotFound(name) if name == "Missing"));
}

#[tokio::test]
async fn test_api_error_carries_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "The caller does not have permission" }
        })))
        .mount(&server)
        .await;

    let mut store = store(&server);
    let err = store.read_column("ASINs", 1).await.unwrap_err();
    match err {
        Error::SheetApi { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "The caller does not have permission");
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ─── writing ───

#[tokio::test]
async fn test_write_margin_user_entered() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/v4/spreadsheets/sheet123/values/'ASINs'!C2$"))
        .and(query_param("valueInputOption", "USER_ENTERED"))
        .and(body_partial_json(json!({ "values": [["12.5%"]] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "updatedCells": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let mut store = store(&server);
    store
        .write_cell("ASINs", 2, 3, &CellValue::from("12.5%"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_ensure_worksheet_creates_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet123"))
        .and(query_param("fields", "sheets.properties.title"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sheets": [{ "properties": { "title": "ASINs" } }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v4/spreadsheets/sheet123:batchUpdate"))
        .and(body_partial_json(json!({
            "requests": [{ "addSheet": { "properties": { "title": "Amazon" } } }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "replies": [{}] })))
        .expect(1)
        .mount(&server)
        .await;

    let mut store = store(&server);
    assert!(!store.ensure_worksheet("ASINs", 100, 18).await.unwrap());
    assert!(store.ensure_worksheet("Amazon", 100, 18).await.unwrap());
}

#[tokio::test]
async fn test_append_rows_inserts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/v4/spreadsheets/sheet123/values/'Amazon'!A1:append$"))
        .and(query_param("insertDataOption", "INSERT_ROWS"))
        .and(query_param("valueInputOption", "USER_ENTERED"))
        .and(body_partial_json(json!({ "values": [["Position", "ASIN"], [1.0, "B000000001"]] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let mut store = store(&server);
    store
        .append_rows(
            "Amazon",
            &[
                vec!["Position".into(), "ASIN".into()],
                vec![1u32.into(), "B000000001".into()],
            ],
        )
        .await
        .unwrap();
    // Nothing to send.
    store.append_rows("Amazon", &[]).await.unwrap();
}

// ─── service account ───

fn service_account_key(token_uri: &str) -> ServiceAccountKey {
    let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
    let pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap();
    ServiceAccountKey::from_json(
        &json!({
            "type": "service_account",
            "client_email": "margins@project.iam.gserviceaccount.com",
            "private_key": pem.as_str(),
            "token_uri": token_uri,
        })
        .to_string(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_service_account_token_exchanged_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.exchanged",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_column(&server, "ya29.exchanged", json!(["B000000001"])).await;

    let auth = ServiceAccountAuth::new(
        service_account_key(&format!("{}/token", server.uri())),
        SHEETS_SCOPE,
    )
    .unwrap();
    let mut store = GoogleSheetStore::new("sheet123", Arc::new(auth))
        .unwrap()
        .with_base_url(&server.uri())
        .unwrap();

    assert_eq!(store.read_column("ASINs", 1).await.unwrap(), vec!["B000000001"]);
    assert_eq!(store.read_column("ASINs", 1).await.unwrap(), vec!["B000000001"]);
}

#[tokio::test]
async fn test_rejected_token_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid JWT Signature."
        })))
        .mount(&server)
        .await;

    let auth = ServiceAccountAuth::new(
        service_account_key(&format!("{}/token", server.uri())),
        SHEETS_SCOPE,
    )
    .unwrap();
    let mut store = GoogleSheetStore::new("sheet123", Arc::new(auth))
        .unwrap()
        .with_base_url(&server.uri())
        .unwrap();

    let err = store.read_column("ASINs", 1).await.unwrap_err();
    assert!(matches!(err, Error::Auth(msg) if msg.contains("invalid_grant")));
}
