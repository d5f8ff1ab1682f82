//! One spreadsheet per month, appended to on every new donation.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use calamine::{open_workbook, Reader, Xlsx};
use chrono::Datelike;
use rust_xlsxwriter::Workbook;

use super::{cell_text, write_sheet, ExportRow, ItemStyle, SHEET_NAME};
use crate::db::models::DonationRecord;

const STYLE: ItemStyle = ItemStyle::WithValues;

#[derive(Debug, Clone)]
pub struct MonthlyLog {
    dir: PathBuf,
}

impl MonthlyLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, year: i32, month: u32) -> PathBuf {
        self.dir.join(format!("donations-{:04}-{:02}.xlsx", year, month))
    }

    /// Add the donation to its month's file, creating the file when needed.
    ///
    /// The sheet is rewritten in full and swapped in with a rename, so readers
    /// never observe a half-written file.
    pub fn append(&self, record: &DonationRecord) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.path_for(record.date.year(), record.date.month());

        let mut rows = if path.exists() {
            read_rows(&path)?.1
        } else {
            Vec::new()
        };
        let row = ExportRow::from_record(record, STYLE);
        rows.push(row.cells().iter().map(|c| c.to_string()).collect());

        let mut workbook = Workbook::new();
        write_sheet(workbook.add_worksheet(), &STYLE.headers(), rows)?;
        let bytes = workbook.save_to_buffer()?;

        let mut staged = tempfile::NamedTempFile::new_in(&self.dir)?;
        staged.write_all(&bytes)?;
        staged
            .persist(&path)
            .with_context(|| format!("replacing {}", path.display()))?;

        tracing::info!(receipt = %row.receipt_id, path = %path.display(), "Donation logged to monthly spreadsheet");
        Ok(path)
    }

    /// Rows of one month keyed by column header; a month without a file is empty.
    pub fn read_month(&self, year: i32, month: u32) -> anyhow::Result<Vec<BTreeMap<String, String>>> {
        let path = self.path_for(year, month);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let (headers, rows) = read_rows(&path)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                headers
                    .iter()
                    .cloned()
                    .zip(row)
                    .filter(|(header, _)| !header.is_empty())
                    .collect()
            })
            .collect())
    }
}

/// Header row and data rows of the donations sheet.
fn read_rows(path: &Path) -> anyhow::Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).with_context(|| format!("opening {}", path.display()))?;
    let range = workbook
        .worksheet_range(SHEET_NAME)
        .with_context(|| format!("reading sheet {} of {}", SHEET_NAME, path.display()))?;

    let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
    let headers = rows.next().unwrap_or_default();
    Ok((headers, rows.filter(|r| r.iter().any(|c| !c.is_empty())).collect()))
}
