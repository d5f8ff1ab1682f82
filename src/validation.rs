//! Donation payload checks.
//!
//! Every rule runs independently and all failures come back together, keyed by
//! field name, so a form can highlight each offending input at once. Malformed
//! input is classified, never rejected by a panic or a parse error.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::db::models::{DonationItem, DonationType, Donor, Gift, NewDonation};
use crate::error::FieldErrors;
use crate::format::{normalize_date, phone_digits, round_cents};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

const PHONE_SEPARATORS: &[char] = &[' ', '-', '(', ')', '.', '+'];

/// Donation as submitted by a client. Nothing is trusted yet.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct DonationPayload {
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub donation_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub donor_name: Option<String>,
    /// Single-line address, accepted when the structured fields are absent.
    #[serde(default, deserialize_with = "lenient_text")]
    pub donor_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub street_address: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub zip_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub donor_phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub donor_email: Option<String>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub items: Option<Value>,
    #[serde(default)]
    pub total_value: Option<Value>,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Read a number from JSON, accepting numeric strings such as `"$1,250.00"`.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => parse_decimal_str(s),
        _ => None,
    }
}

pub fn parse_decimal_str(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

fn is_present(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Items with both a description and a non-negative value; everything else is
/// dropped without being reported.
pub fn usable_items(items: Option<&Value>) -> Vec<DonationItem> {
    let Some(Value::Array(entries)) = items else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let description = entry.get("description")?.as_str()?.trim();
            if description.is_empty() {
                return None;
            }
            let value = parse_decimal(entry.get("value")?)?;
            if value < Decimal::ZERO {
                return None;
            }
            Some(DonationItem {
                description: description.to_string(),
                value,
            })
        })
        .collect()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn is_valid_phone(phone: &str) -> bool {
    let only_digits_and_separators = phone
        .chars()
        .all(|c| c.is_ascii_digit() || PHONE_SEPARATORS.contains(&c));
    only_digits_and_separators && phone_digits(phone).len() >= 10
}

/// Check a payload and, when it passes, produce the normalized donation to store.
pub fn validate(payload: &DonationPayload) -> Result<NewDonation, FieldErrors> {
    let mut errors = FieldErrors::new();

    let donation_type = match non_blank(&payload.donation_type) {
        Some(raw) => DonationType::parse(&raw),
        None => None,
    };
    if donation_type.is_none() {
        errors.insert(
            "type".into(),
            "Donation type must be cash or in-kind".into(),
        );
    }

    let date = match non_blank(&payload.date) {
        None => {
            errors.insert("date".into(), "Date is required".into());
            None
        }
        Some(raw) => {
            let parsed = normalize_date(&raw);
            if parsed.is_none() {
                errors.insert("date".into(), "Please enter a valid date".into());
            }
            parsed
        }
    };

    let donor_name = non_blank(&payload.donor_name);
    if donor_name.is_none() {
        errors.insert("donor_name".into(), "Donor name is required".into());
    }

    let gift = match donation_type {
        Some(DonationType::Cash) => cash_gift(payload, &mut errors),
        Some(DonationType::InKind) => in_kind_gift(payload, &mut errors),
        None => None,
    };

    let donor_email = non_blank(&payload.donor_email);
    if let Some(email) = &donor_email {
        if !is_valid_email(email) {
            errors.insert("donor_email".into(), "Please enter a valid email address".into());
        }
    }

    let donor_phone = non_blank(&payload.donor_phone);
    if let Some(phone) = &donor_phone {
        if !is_valid_phone(phone) {
            errors.insert("donor_phone".into(), "Please enter a valid phone number".into());
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let (Some(date), Some(donor_name), Some(gift)) = (date, donor_name, gift) else {
        // Every missing piece above has recorded an error.
        return Err(errors);
    };

    let structured = [
        &payload.street_address,
        &payload.city,
        &payload.state,
        &payload.zip_code,
    ]
    .iter()
    .any(|field| non_blank(field).is_some());
    let street_address = if structured {
        non_blank(&payload.street_address)
    } else {
        non_blank(&payload.donor_address)
    };

    Ok(NewDonation {
        date,
        donor: Donor {
            donor_name,
            street_address,
            city: non_blank(&payload.city),
            state: non_blank(&payload.state),
            zip_code: non_blank(&payload.zip_code),
            donor_phone: donor_phone.map(|p| phone_digits(&p)),
            donor_email,
        },
        gift,
    })
}

fn cash_gift(payload: &DonationPayload, errors: &mut FieldErrors) -> Option<Gift> {
    if !is_present(&payload.amount) {
        errors.insert("amount".into(), "Amount is required".into());
        return None;
    }
    match payload.amount.as_ref().and_then(parse_decimal) {
        Some(amount) if amount > Decimal::ZERO => Some(Gift::Cash { amount }),
        _ => {
            errors.insert(
                "amount".into(),
                "Please enter a valid amount greater than 0".into(),
            );
            None
        }
    }
}

fn in_kind_gift(payload: &DonationPayload, errors: &mut FieldErrors) -> Option<Gift> {
    let items = usable_items(payload.items.as_ref());
    if items.is_empty() {
        errors.insert("items".into(), "At least one item is required".into());
        return None;
    }

    let Some(gift) = Gift::in_kind(items) else {
        errors.insert("items".into(), "Item values are too large".into());
        return None;
    };
    if let Some(submitted) = payload.total_value.as_ref().and_then(parse_decimal) {
        if round_cents(submitted) != round_cents(gift.value()) {
            tracing::warn!(
                submitted = %submitted,
                computed = %gift.value(),
                "Submitted total_value differs from item sum; using item sum"
            );
        }
    }
    Some(gift)
}
