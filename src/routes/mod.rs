use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{auth, AppState};

pub mod donations;
pub mod receipts;
pub mod reports;

/// Every endpoint, with state attached. Transport layers (CORS, rate limiting,
/// security headers) are added by the server binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/donations",
            get(donations::list_donations).post(donations::create_donation),
        )
        .route("/api/donations/export/excel", get(reports::export_excel))
        .route("/api/donations/logs/{year}/{month}", get(reports::monthly_log))
        .route(
            "/api/donations/{id}",
            get(donations::get_donation).delete(donations::delete_donation),
        )
        .route("/api/donations/{id}/receipt", get(receipts::receipt_preview))
        .route("/api/donations/{id}/receipt.html", get(receipts::receipt_print))
        .route("/api/donations/{id}/receipt.pdf", get(receipts::receipt_pdf))
        .route("/api/donations/{id}/email", post(receipts::email_receipt))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/verify", get(auth::verify))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "service": "msc-receipts",
    }))
}
