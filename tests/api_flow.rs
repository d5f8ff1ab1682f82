use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use msc_receipts::auth::hash_password;
use msc_receipts::config::Config;
use msc_receipts::db;
use msc_receipts::error::{AppError, AppResult};
use msc_receipts::mailer::{ReceiptEmail, ReceiptMailer, RECEIPT_SUBJECT};
use msc_receipts::receipt::pdf::{PdfEngine, PdfOptions};
use msc_receipts::tasks::{SideEffect, SideEffects};
use msc_receipts::{routes, AppState};

struct FakePdfEngine;

impl PdfEngine for FakePdfEngine {
    fn render(&self, html_path: &Path, options: &PdfOptions) -> anyhow::Result<Vec<u8>> {
        let html = std::fs::read_to_string(html_path)?;
        anyhow::ensure!(html.contains("receipt-preview"), "unexpected markup");
        anyhow::ensure!(options.margin_in == 0.4, "unexpected margins");
        Ok(b"%PDF-1.4 test receipt".to_vec())
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<ReceiptEmail>>,
    fail: bool,
}

#[async_trait]
impl ReceiptMailer for RecordingMailer {
    async fn send_receipt(&self, email: ReceiptEmail) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Delivery("connection refused".into()));
        }
        self.sent.lock().push(email);
        Ok(())
    }
}

struct TestApp {
    _dir: tempfile::TempDir,
    router: Router,
    state: AppState,
    mailer: Arc<RecordingMailer>,
    side_effects: mpsc::Receiver<SideEffect>,
}

async fn test_app_with(mailer: RecordingMailer) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::for_dir(dir.path(), "integration-secret");
    let pool = db::open(&config.database_path).expect("open db");
    let (side_effects, rx) = SideEffects::channel(16);
    let mailer = Arc::new(mailer);

    let state = AppState::new(
        &config,
        pool,
        Arc::new(FakePdfEngine),
        mailer.clone(),
        side_effects,
    )
    .expect("state");
    state
        .admins
        .upsert("sandy", &hash_password("letmein").expect("hash"))
        .await
        .expect("seed admin");

    TestApp {
        _dir: dir,
        router: routes::router(state.clone()),
        state,
        mailer,
        side_effects: rx,
    }
}

async fn test_app() -> TestApp {
    test_app_with(RecordingMailer::default()).await
}

struct Reply {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    fn header(&self, name: header::HeaderName) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

impl TestApp {
    async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.send(request).await
    }

    /// Send a body exactly as given, with an optional content type.
    async fn call_raw(&self, uri: &str, content_type: Option<&str>, body: &str) -> Reply {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder.body(Body::from(body.to_string())).expect("request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes()
            .to_vec();
        Reply { status, headers, body }
    }

    async fn token(&self) -> String {
        let reply = self
            .call(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({"username": "sandy", "password": "letmein"})),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        reply.json()["token"].as_str().expect("token").to_string()
    }

    async fn create(&self, payload: Value) -> i64 {
        let reply = self.call("POST", "/api/donations", None, Some(payload)).await;
        assert_eq!(reply.status, StatusCode::OK, "{}", String::from_utf8_lossy(&reply.body));
        reply.json()["id"].as_i64().expect("id")
    }
}

fn cash(amount: Value) -> Value {
    json!({
        "type": "cash",
        "date": "2024-03-05",
        "donor_name": "Sam Smith",
        "donor_email": "sam@example.org",
        "donor_phone": "555-123-4567",
        "amount": amount,
    })
}

#[tokio::test]
async fn in_kind_submission_keeps_only_complete_items() {
    let mut app = test_app().await;
    let id = app
        .create(json!({
            "type": "in-kind",
            "date": "2024-03-05T10:00:00.000Z",
            "donor_name": "Jane Doe",
            "items": [
                {"description": "Coat", "value": 40},
                {"description": "", "value": 5}
            ]
        }))
        .await;

    let reply = app.call("GET", &format!("/api/donations/{}", id), None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let record = reply.json();
    assert_eq!(record["type"], "in-kind");
    assert_eq!(record["date"], "2024-03-05");
    assert_eq!(record["items"], json!([{"description": "Coat", "value": "40"}]));
    assert_eq!(record["total_value"], "40");

    match app.side_effects.try_recv() {
        Ok(SideEffect::Created(created)) => assert_eq!(created.id, id),
        other => panic!("expected a creation side effect, got {:?}", other),
    }
}

#[tokio::test]
async fn cash_amount_must_be_positive() {
    let app = test_app().await;
    for amount in [json!(0), json!(-5), json!("abc")] {
        let reply = app.call("POST", "/api/donations", None, Some(cash(amount))).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        let body = reply.json();
        assert_eq!(body["error"], "validation_error");
        assert!(body["fields"]["amount"].is_string());
    }

    let token = app.token().await;
    let reply = app.call("GET", "/api/donations", Some(&token), None).await;
    assert_eq!(reply.json(), json!([]));
}

#[tokio::test]
async fn all_field_errors_are_reported_together() {
    let app = test_app().await;
    let reply = app
        .call(
            "POST",
            "/api/donations",
            None,
            Some(json!({"type": "cash", "date": "2024-03-05", "donor_email": "nope", "donor_phone": "123"})),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let fields = reply.json()["fields"].clone();
    for key in ["donor_name", "amount", "donor_email", "donor_phone"] {
        assert!(fields[key].is_string(), "missing error for {}", key);
    }
}

#[tokio::test]
async fn listing_requires_admin_and_orders_by_date() {
    let app = test_app().await;
    let older = app.create(json!({"type": "cash", "date": "2024-01-10", "donor_name": "A", "amount": 5})).await;
    let newer = app.create(json!({"type": "cash", "date": "2024-06-10", "donor_name": "B", "amount": 7})).await;

    let reply = app.call("GET", "/api/donations", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let token = app.token().await;
    let list = app.call("GET", "/api/donations", Some(&token), None).await.json();
    let ids: Vec<i64> = list.as_array().unwrap().iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![newer, older]);

    let filtered = app
        .call("GET", "/api/donations?start_date=2024-06-01&type=cash", Some(&token), None)
        .await
        .json();
    assert_eq!(filtered.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_is_protected_and_missing_ids_are_not_found() {
    let mut app = test_app().await;
    let id = app.create(cash(json!(20))).await;
    let _ = app.side_effects.try_recv();

    let reply = app.call("DELETE", &format!("/api/donations/{}", id), None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let token = app.token().await;
    let reply = app.call("DELETE", &format!("/api/donations/{}", id), Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(matches!(app.side_effects.try_recv(), Ok(SideEffect::Deleted(deleted)) if deleted == id));

    let reply = app.call("DELETE", &format!("/api/donations/{}", id), Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    let reply = app.call("GET", &format!("/api/donations/{}", id), None, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_export_is_a_header_only_workbook() {
    let app = test_app().await;
    let token = app.token().await;
    let reply = app.call("GET", "/api/donations/export/excel", Some(&token), None).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.header(header::CONTENT_DISPOSITION),
        "attachment; filename=MSC-Donations.xlsx"
    );
    assert!(reply.header(header::CONTENT_TYPE).contains("spreadsheetml"));
    assert!(reply.body.starts_with(b"PK"));

    let unauthenticated = app.call("GET", "/api/donations/export/excel", None, None).await;
    assert_eq!(unauthenticated.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_and_verify() {
    let app = test_app().await;

    let missing = app.call("POST", "/api/auth/login", None, Some(json!({"username": "sandy"}))).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let wrong = app
        .call("POST", "/api/auth/login", None, Some(json!({"username": "sandy", "password": "nope"})))
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let unknown = app
        .call("POST", "/api/auth/login", None, Some(json!({"username": "ghost", "password": "letmein"})))
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);

    let token = app.token().await;
    let verify = app.call("GET", "/api/auth/verify", Some(&token), None).await;
    assert_eq!(verify.status, StatusCode::OK);
    let body = verify.json();
    assert_eq!(body["valid"], true);
    assert_eq!(body["user"]["username"], "sandy");

    let bogus = app.call("GET", "/api/auth/verify", Some("not-a-token"), None).await;
    assert_eq!(bogus.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn receipt_channels_share_one_content_model() {
    let app = test_app().await;
    let id = app.create(cash(json!("125.5"))).await;

    let preview = app.call("GET", &format!("/api/donations/{}/receipt", id), None, None).await.json();
    let receipt_id = format!("MSC-{:04}", id);
    assert_eq!(preview["receipt_id"], receipt_id.as_str());
    assert_eq!(preview["date"], "03/05/2024");
    assert_eq!(preview["donor"]["phone"], "(555) 123-4567");
    assert_eq!(preview["gift"]["amount"], "$125.50");

    let print = app.call("GET", &format!("/api/donations/{}/receipt.html", id), None, None).await;
    assert!(print.header(header::CONTENT_TYPE).starts_with("text/html"));
    let markup = String::from_utf8(print.body).unwrap();
    assert!(markup.contains("@media print"));
    assert!(markup.contains("Donation Amount: $125.50"));

    let pdf = app.call("GET", &format!("/api/donations/{}/receipt.pdf", id), None, None).await;
    assert_eq!(pdf.status, StatusCode::OK);
    assert_eq!(pdf.header(header::CONTENT_TYPE), "application/pdf");
    assert_eq!(
        pdf.header(header::CONTENT_DISPOSITION),
        format!("attachment; filename=MSC-Donation-Receipt-{}.pdf", receipt_id)
    );
    assert!(pdf.body.starts_with(b"%PDF"));

    let missing = app.call("GET", "/api/donations/999/receipt.pdf", None, None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn emailing_a_receipt() {
    let app = test_app().await;
    let id = app.create(cash(json!(25))).await;
    let uri = format!("/api/donations/{}/email", id);

    let no_address = app.call("POST", &uri, None, Some(json!({}))).await;
    assert_eq!(no_address.status, StatusCode::BAD_REQUEST);

    let bad_address = app.call("POST", &uri, None, Some(json!({"email": "sam at example"}))).await;
    assert_eq!(bad_address.status, StatusCode::BAD_REQUEST);

    let no_donation = app
        .call("POST", "/api/donations/4242/email", None, Some(json!({"email": "sam@example.org"})))
        .await;
    assert_eq!(no_donation.status, StatusCode::NOT_FOUND);

    let sent = app.call("POST", &uri, None, Some(json!({"email": "sam@example.org"}))).await;
    assert_eq!(sent.status, StatusCode::OK);

    let outbox = app.mailer.sent.lock();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].to, "sam@example.org");
    assert_eq!(outbox[0].subject, RECEIPT_SUBJECT);
    assert!(outbox[0].pdf.starts_with(b"%PDF"));
    assert!(outbox[0].html.contains("$25.00"));
}

#[tokio::test]
async fn delivery_failure_is_a_server_error() {
    let app = test_app_with(RecordingMailer { fail: true, ..Default::default() }).await;
    let id = app.create(cash(json!(25))).await;

    let reply = app
        .call("POST", &format!("/api/donations/{}/email", id), None, Some(json!({"email": "sam@example.org"})))
        .await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.json()["error"], "delivery_error");
}

#[tokio::test]
async fn monthly_log_reads_back_rows() {
    let app = test_app().await;
    let id = app.create(cash(json!(10))).await;
    let record = app.state.donations.get(id).await.unwrap();
    app.state.monthly_log.append(&record).unwrap();

    let token = app.token().await;
    let rows = app.call("GET", "/api/donations/logs/2024/3", Some(&token), None).await.json();
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["Receipt ID"], format!("MSC-{:04}", id).as_str());
    assert_eq!(rows[0]["Amount"], "$10.00");

    let empty = app.call("GET", "/api/donations/logs/2023/1", Some(&token), None).await.json();
    assert_eq!(empty, json!([]));

    let bad_month = app.call("GET", "/api/donations/logs/2024/13", Some(&token), None).await;
    assert_eq!(bad_month.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_service_status() {
    let app = test_app().await;
    let reply = app.call("GET", "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "msc-receipts");
}

#[tokio::test]
async fn item_values_keep_full_precision_through_the_api() {
    let app = test_app().await;
    let id = app
        .create(json!({
            "type": "in-kind",
            "date": "2024-03-05",
            "donor_name": "Jane Doe",
            "items": [
                {"description": "Quilt", "value": "12.3456789012345678"},
                {"description": "Lamp", "value": "0.0000000000000002"}
            ]
        }))
        .await;

    let record = app.call("GET", &format!("/api/donations/{}", id), None, None).await.json();
    assert_eq!(record["items"][0]["value"], "12.3456789012345678");
    assert_eq!(record["items"][1]["value"], "0.0000000000000002");
    assert_eq!(record["total_value"], "12.3456789012345680");
}

#[tokio::test]
async fn overflowing_item_values_are_a_validation_error() {
    let app = test_app().await;
    let reply = app
        .call(
            "POST",
            "/api/donations",
            None,
            Some(json!({
                "type": "in-kind",
                "date": "2024-03-05",
                "donor_name": "Jane Doe",
                "items": [
                    {"description": "Painting", "value": "79228162514264337593543950335"},
                    {"description": "Sculpture", "value": "79228162514264337593543950335"}
                ]
            })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["fields"]["items"], "Item values are too large");
}

#[tokio::test]
async fn malformed_bodies_get_the_error_payload() {
    let app = test_app().await;

    let cases = [
        ("/api/donations", Some("application/json"), "not json"),
        ("/api/donations", Some("application/json"), "\"x\""),
        ("/api/donations", None, r#"{"type": "cash"}"#),
        ("/api/donations", Some("text/plain"), r#"{"type": "cash"}"#),
        ("/api/auth/login", Some("application/json"), "{"),
        ("/api/auth/login", None, r#"{"username": "sandy", "password": "letmein"}"#),
    ];
    for (uri, content_type, body) in cases {
        let reply = app.call_raw(uri, content_type, body).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{} {:?} {}", uri, content_type, body);
        assert!(reply.header(header::CONTENT_TYPE).starts_with("application/json"));
        let payload = reply.json();
        assert_eq!(payload["error"], "validation_error");
        assert!(payload["fields"]["body"].is_string());
    }

    let id = app.create(cash(json!(25))).await;
    let reply = app
        .call_raw(&format!("/api/donations/{}/email", id), None, r#"{"email": "sam@example.org"}"#)
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["error"], "validation_error");
    assert!(app.mailer.sent.lock().is_empty());
}

#[tokio::test]
async fn non_numeric_ids_are_not_found() {
    let app = test_app().await;
    let token = app.token().await;

    for uri in [
        "/api/donations/abc",
        "/api/donations/abc/receipt",
        "/api/donations/abc/receipt.html",
        "/api/donations/abc/receipt.pdf",
        "/api/donations/99999999999999999999999",
    ] {
        let reply = app.call("GET", uri, None, None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(reply.json()["error"], "not_found");
    }

    let reply = app.call("DELETE", "/api/donations/abc", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.json()["error"], "not_found");

    let reply = app
        .call("POST", "/api/donations/abc/email", None, Some(json!({"email": "sam@example.org"})))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn monthly_log_path_must_be_numeric() {
    let app = test_app().await;
    let token = app.token().await;

    let reply = app.call("GET", "/api/donations/logs/this-year/march", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let fields = reply.json()["fields"].clone();
    assert!(fields["year"].is_string());
    assert!(fields["month"].is_string());
}
