use axum::extract::{Json, Query, State};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedAdmin;
use crate::db::models::{DonationFilter, DonationRecord, DonationType};
use crate::error::{AppError, AppResult, FieldErrors};
use crate::extract::{ApiJson, DonationId};
use crate::format::normalize_date;
use crate::tasks::SideEffect;
use crate::validation::{validate, DonationPayload};
use crate::AppState;

/// Raw listing filters from the query string; blanks mean "no bound".
#[derive(Deserialize, Debug, Default)]
pub struct DonationQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(rename = "type")]
    pub donation_type: Option<String>,
}

impl DonationQuery {
    pub fn into_filter(self) -> AppResult<DonationFilter> {
        let mut errors = FieldErrors::new();
        let mut date = |field: &str, raw: Option<String>| -> Option<NaiveDate> {
            let raw = raw.filter(|s| !s.trim().is_empty())?;
            let parsed = normalize_date(&raw);
            if parsed.is_none() {
                errors.insert(field.to_string(), "Please enter a valid date".into());
            }
            parsed
        };
        let start_date = date("start_date", self.start_date);
        let end_date = date("end_date", self.end_date);

        let donation_type = match self.donation_type.filter(|s| !s.trim().is_empty()) {
            None => None,
            Some(raw) => {
                let parsed = DonationType::parse(&raw);
                if parsed.is_none() {
                    errors.insert("type".into(), "Donation type must be cash or in-kind".into());
                }
                parsed
            }
        };

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }
        Ok(DonationFilter {
            start_date,
            end_date,
            donation_type,
        })
    }
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub id: i64,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub async fn create_donation(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<DonationPayload>,
) -> AppResult<Json<CreatedResponse>> {
    let donation = validate(&payload).map_err(|fields| {
        tracing::info!(fields = ?fields.keys().collect::<Vec<_>>(), "Donation rejected");
        AppError::Validation(fields)
    })?;

    let record = state.donations.create(donation).await?;
    tracing::info!(
        donation_id = record.id,
        kind = record.donation_type().as_str(),
        "Donation recorded"
    );

    let id = record.id;
    state.side_effects.enqueue(SideEffect::Created(record));
    Ok(Json(CreatedResponse {
        id,
        message: "Donation recorded successfully",
    }))
}

pub async fn list_donations(
    State(state): State<AppState>,
    _admin: AuthenticatedAdmin,
    Query(query): Query<DonationQuery>,
) -> AppResult<Json<Vec<DonationRecord>>> {
    let filter = query.into_filter()?;
    Ok(Json(state.donations.list(filter).await?))
}

pub async fn get_donation(
    State(state): State<AppState>,
    DonationId(id): DonationId,
) -> AppResult<Json<DonationRecord>> {
    Ok(Json(state.donations.get(id).await?))
}

pub async fn delete_donation(
    State(state): State<AppState>,
    admin: AuthenticatedAdmin,
    DonationId(id): DonationId,
) -> AppResult<Json<MessageResponse>> {
    state.donations.delete(id).await?;
    tracing::info!(donation_id = id, admin = %admin.username, "Donation deleted");

    state.side_effects.enqueue(SideEffect::Deleted(id));
    Ok(Json(MessageResponse {
        message: "Donation deleted successfully",
    }))
}
