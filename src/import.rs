//! Bulk import of historical donations from a spreadsheet.
//!
//! Columns are matched by header name. Every row goes through the same validation
//! as a submitted form; rows that fail are skipped and reported by row number.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};

use crate::db::DonationStore;
use crate::export::cell_text;
use crate::format::CANONICAL_DATE_FORMAT;
use crate::validation::{parse_decimal_str, validate, DonationPayload};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// One sheet row keyed by trimmed header text.
pub type SheetRow = HashMap<String, Data>;

/// Read the first worksheet of an `.xlsx`/`.xls`/`.ods` file.
pub fn read_sheet(path: &Path) -> anyhow::Result<Vec<SheetRow>> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("opening {}", path.display()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("{} has no worksheets", path.display()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("reading sheet {}", sheet))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(|c| cell_text(c).trim().to_string()).collect(),
        None => return Ok(Vec::new()),
    };

    Ok(rows
        .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|row| {
            headers
                .iter()
                .zip(row.iter())
                .filter(|(h, _)| !h.is_empty())
                .map(|(h, c)| (h.clone(), c.clone()))
                .collect()
        })
        .collect())
}

fn text(row: &SheetRow, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| row.get(*k))
        .map(|c| cell_text(c).trim().to_string())
        .find(|s| !s.is_empty())
}

/// Excel stores dates as days since 1899-12-30.
fn excel_serial_date(serial: f64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

fn import_date(cell: Option<&Data>) -> Option<String> {
    let date = match cell? {
        Data::DateTime(dt) => excel_serial_date(dt.as_f64()),
        Data::Float(f) => excel_serial_date(*f),
        Data::Int(i) => excel_serial_date(*i as f64),
        other => {
            let raw = cell_text(other);
            let raw = raw.trim();
            // Anything else is handed to the validator as written.
            return match NaiveDate::parse_from_str(raw, "%m/%d/%Y") {
                Ok(date) => Some(date.format(CANONICAL_DATE_FORMAT).to_string()),
                Err(_) => Some(raw.to_string()).filter(|s| !s.is_empty()),
            };
        }
    };
    date.map(|d| d.format(CANONICAL_DATE_FORMAT).to_string())
}

/// `Coat: $40.00; Shoes: $12` becomes two items; any other text is one item
/// worth nothing.
fn import_items(raw: &str) -> Value {
    if raw.contains(':') && raw.contains('$') {
        let items: Vec<Value> = raw
            .split(';')
            .filter(|part| !part.trim().is_empty())
            .map(|part| {
                let (description, value) = part.split_once(':').unwrap_or((part, ""));
                json!({
                    "description": description.trim(),
                    "value": parse_decimal_str(value).map(|d| d.to_string()),
                })
            })
            .collect();
        return Value::Array(items);
    }
    json!([{ "description": raw.trim(), "value": "0" }])
}

/// Map a sheet row onto the same payload a client would submit.
pub fn row_to_payload(row: &SheetRow) -> DonationPayload {
    let in_kind = text(row, &["Type"])
        .map(|t| t.to_lowercase().contains("kind"))
        .unwrap_or(false);

    let donor_name = text(row, &["Donor Name"]).or_else(|| {
        let first = text(row, &["First Name", "FirstName"]).unwrap_or_default();
        let last = text(row, &["Last Name", "LastName"]).unwrap_or_default();
        Some(format!("{} {}", first, last).trim().to_string()).filter(|s| !s.is_empty())
    });

    let mut payload = DonationPayload {
        donation_type: Some(if in_kind { "in-kind" } else { "cash" }.to_string()),
        date: import_date(row.get("Date")),
        donor_name,
        street_address: text(row, &["Street Address", "Street"]),
        donor_address: text(row, &["Address"]),
        city: text(row, &["City"]),
        state: text(row, &["State"]),
        zip_code: text(row, &["ZIP Code", "ZIP", "Zip"]),
        donor_phone: text(row, &["Phone"]),
        donor_email: text(row, &["Email"]),
        ..DonationPayload::default()
    };

    if in_kind {
        payload.items = text(row, &["Items", "Description"]).map(|raw| import_items(&raw));
        payload.total_value = text(row, &["Total Value", "Amount"]).map(Value::String);
    } else {
        payload.amount = text(row, &["Amount"]).map(Value::String);
    }
    payload
}

/// Validate and store every row. Row numbers in the log are 1-based and count
/// the header, matching what a spreadsheet shows.
pub async fn import_rows(rows: Vec<SheetRow>, store: &DonationStore) -> ImportSummary {
    let mut summary = ImportSummary::default();

    for (idx, row) in rows.iter().enumerate() {
        let row_number = idx + 2;
        let donation = match validate(&row_to_payload(row)) {
            Ok(donation) => donation,
            Err(fields) => {
                tracing::warn!(row = row_number, errors = ?fields, "Skipping invalid row");
                summary.skipped += 1;
                continue;
            }
        };
        match store.create(donation).await {
            Ok(record) => {
                summary.imported += 1;
                if summary.imported % 100 == 0 {
                    tracing::info!("Imported {} donations...", summary.imported);
                }
                tracing::debug!(row = row_number, donation_id = record.id, "Row imported");
            }
            Err(e) => {
                tracing::error!(row = row_number, "Failed to store row: {}", e);
                summary.skipped += 1;
            }
        }
    }

    summary
}
