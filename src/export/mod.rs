//! Flat spreadsheet rows for donations.
//!
//! The bulk export and the monthly log share one row shape; they only differ in
//! how in-kind items are spelled out and in the name of the last column.

use calamine::Data;
use rust_xlsxwriter::{Color, Format, FormatAlign, Worksheet, XlsxError};

use crate::db::models::{DonationRecord, Gift};
use crate::format::{display_date, format_currency, format_phone, receipt_id};

pub mod monthly_log;
pub mod workbook;

pub use monthly_log::MonthlyLog;
pub use workbook::export_workbook;

pub const SHEET_NAME: &str = "Donations";
pub const COLUMN_WIDTHS: [f64; 9] = [12.0, 12.0, 8.0, 25.0, 25.0, 15.0, 35.0, 50.0, 12.0];
const HEADER_FILL: u32 = 0xF052A1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStyle {
    /// `Coat; Shoes`
    Descriptions,
    /// `Coat: $40.00; Shoes: $12.00`
    WithValues,
}

impl ItemStyle {
    pub fn headers(&self) -> [&'static str; 9] {
        let last = match self {
            ItemStyle::Descriptions => "Value",
            ItemStyle::WithValues => "Amount",
        };
        [
            "Receipt ID",
            "Date",
            "Type",
            "Donor Name",
            "Email",
            "Phone",
            "Address",
            "Items",
            last,
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub receipt_id: String,
    pub date: String,
    pub donation_type: String,
    pub donor_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub items: String,
    pub value: String,
}

impl ExportRow {
    pub fn from_record(record: &DonationRecord, style: ItemStyle) -> Self {
        let items = match &record.gift {
            Gift::Cash { .. } => String::new(),
            Gift::InKind { items, .. } => items
                .iter()
                .map(|item| match style {
                    ItemStyle::Descriptions => item.description.clone(),
                    ItemStyle::WithValues => {
                        format!("{}: {}", item.description, format_currency(Some(item.value)))
                    }
                })
                .collect::<Vec<_>>()
                .join("; "),
        };
        let donor = &record.donor;

        Self {
            receipt_id: receipt_id(record.id),
            date: display_date(record.date),
            donation_type: record.donation_type().label().to_string(),
            donor_name: donor.donor_name.clone(),
            email: donor.donor_email.clone().unwrap_or_default(),
            phone: donor.donor_phone.as_deref().map(format_phone).unwrap_or_default(),
            address: donor.address_line().unwrap_or_default(),
            items,
            value: format_currency(Some(record.gift.value())),
        }
    }

    pub fn cells(&self) -> [&str; 9] {
        [
            &self.receipt_id,
            &self.date,
            &self.donation_type,
            &self.donor_name,
            &self.email,
            &self.phone,
            &self.address,
            &self.items,
            &self.value,
        ]
    }
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center)
}

/// Write a styled header followed by plain string rows.
pub(crate) fn write_sheet<R, C>(
    worksheet: &mut Worksheet,
    headers: &[&str],
    rows: R,
) -> Result<(), XlsxError>
where
    R: IntoIterator<Item = C>,
    C: IntoIterator,
    C::Item: AsRef<str>,
{
    worksheet.set_name(SHEET_NAME)?;
    let header_format = header_format();
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }
    for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
        worksheet.set_column_width(col as u16, *width)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    for (idx, row) in rows.into_iter().enumerate() {
        let row_num = (idx + 1) as u32;
        for (col, cell) in row.into_iter().enumerate() {
            let cell = cell.as_ref();
            if !cell.is_empty() {
                worksheet.write_string(row_num, col as u16, cell)?;
            }
        }
    }
    Ok(())
}

/// Spreadsheet cell as display text; whole floats lose their `.0`.
pub(crate) fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::Error(e) => format!("{:?}", e),
    }
}
