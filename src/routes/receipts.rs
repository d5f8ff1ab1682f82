use axum::{
    extract::{Json, State},
    http::{header, HeaderValue},
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extract::{ApiJson, DonationId};
use crate::mailer::{ReceiptEmail, RECEIPT_SUBJECT};
use crate::receipt::html::{self, Layout};
use crate::receipt::ReceiptContent;
use crate::validation::is_valid_email;
use crate::AppState;

#[derive(Deserialize)]
pub struct EmailRequest {
    email: Option<String>,
}

#[derive(Serialize)]
pub struct EmailResponse {
    message: &'static str,
}

async fn load_content(state: &AppState, id: i64) -> AppResult<ReceiptContent> {
    let record = state.donations.get(id).await?;
    Ok(ReceiptContent::from_record(&record))
}

async fn render_pdf(state: &AppState, content: &ReceiptContent) -> AppResult<Vec<u8>> {
    let markup = html::render(content, Layout::Document, state.logo.as_deref());
    state.receipts.render(markup).await
}

pub async fn receipt_preview(
    State(state): State<AppState>,
    DonationId(id): DonationId,
) -> AppResult<Json<ReceiptContent>> {
    Ok(Json(load_content(&state, id).await?))
}

pub async fn receipt_print(
    State(state): State<AppState>,
    DonationId(id): DonationId,
) -> AppResult<Html<String>> {
    let content = load_content(&state, id).await?;
    Ok(Html(html::render(&content, Layout::Print, state.logo.as_deref())))
}

pub async fn receipt_pdf(State(state): State<AppState>, DonationId(id): DonationId) -> AppResult<Response> {
    let content = load_content(&state, id).await?;
    let pdf = render_pdf(&state, &content).await?;

    let disposition = format!(
        "attachment; filename=MSC-Donation-Receipt-{}.pdf",
        content.receipt_id
    );
    let mut response = pdf.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).map_err(|e| AppError::Render(e.to_string()))?,
    );
    Ok(response)
}

pub async fn email_receipt(
    State(state): State<AppState>,
    DonationId(id): DonationId,
    ApiJson(req): ApiJson<EmailRequest>,
) -> AppResult<Json<EmailResponse>> {
    let email = req.email.map(|e| e.trim().to_string()).unwrap_or_default();
    if email.is_empty() {
        return Err(AppError::field("email", "Email address is required"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::field("email", "Please enter a valid email address"));
    }

    let content = load_content(&state, id).await?;
    let pdf = render_pdf(&state, &content).await?;

    state
        .mailer
        .send_receipt(ReceiptEmail {
            to: email,
            subject: RECEIPT_SUBJECT.to_string(),
            html: html::render_email(&content),
            pdf,
        })
        .await?;
    tracing::info!(receipt = %content.receipt_id, "Receipt emailed");

    Ok(Json(EmailResponse {
        message: "Receipt sent successfully",
    }))
}
