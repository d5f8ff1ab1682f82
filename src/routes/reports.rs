use std::collections::BTreeMap;

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};

use crate::auth::AuthenticatedAdmin;
use crate::error::{AppError, AppResult, FieldErrors};
use crate::export::export_workbook;
use crate::routes::donations::DonationQuery;
use crate::AppState;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub async fn export_excel(
    State(state): State<AppState>,
    admin: AuthenticatedAdmin,
    Query(query): Query<DonationQuery>,
) -> AppResult<Response> {
    let filter = query.into_filter()?;
    let records = state.donations.list(filter).await?;
    let count = records.len();

    let bytes = tokio::task::spawn_blocking(move || export_workbook(&records))
        .await
        .map_err(|e| AppError::Export(e.to_string()))??;
    tracing::info!(rows = count, admin = %admin.username, "Donations exported");

    let mut response = bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(XLSX_CONTENT_TYPE));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=MSC-Donations.xlsx"),
    );
    Ok(response)
}

pub async fn monthly_log(
    State(state): State<AppState>,
    _admin: AuthenticatedAdmin,
    Path((year, month)): Path<(String, String)>,
) -> AppResult<Json<Vec<BTreeMap<String, String>>>> {
    let mut errors = FieldErrors::new();
    let year = match year.trim().parse::<i32>() {
        Ok(year) if (1..=9999).contains(&year) => Some(year),
        _ => {
            errors.insert("year".into(), "Year must be a four-digit number".into());
            None
        }
    };
    let month = match month.trim().parse::<u32>() {
        Ok(month) if (1..=12).contains(&month) => Some(month),
        _ => {
            errors.insert("month".into(), "Month must be between 1 and 12".into());
            None
        }
    };
    let (Some(year), Some(month)) = (year, month) else {
        return Err(AppError::Validation(errors));
    };

    let log = state.monthly_log.clone();
    let rows = tokio::task::spawn_blocking(move || log.read_month(year, month))
        .await
        .map_err(|e| AppError::Export(e.to_string()))?
        .map_err(|e| {
            tracing::error!(year, month, "Reading monthly log failed: {:#}", e);
            AppError::Export(e.to_string())
        })?;
    Ok(Json(rows))
}
