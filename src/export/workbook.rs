use rust_xlsxwriter::{Workbook, XlsxError};

use super::{write_sheet, ExportRow, ItemStyle};
use crate::db::models::DonationRecord;

/// Build the downloadable `.xlsx` for a set of donations.
///
/// An empty slice still yields a valid workbook holding just the header row.
pub fn export_workbook(records: &[DonationRecord]) -> Result<Vec<u8>, XlsxError> {
    let style = ItemStyle::Descriptions;
    let rows: Vec<ExportRow> = records
        .iter()
        .map(|r| ExportRow::from_record(r, style))
        .collect();

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    write_sheet(worksheet, &style.headers(), rows.iter().map(ExportRow::cells))?;
    workbook.save_to_buffer()
}
