//! Fixture builders for impactor tests.
//!
//! Everything here writes real `.xlsx` files with `umya-spreadsheet` so the
//! production readers are exercised end to end. Helpers panic on failure;
//! they are only meant for tests.

use chrono::NaiveDateTime;
use impactor_common::CellValue;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use umya_spreadsheet::Spreadsheet;

/// A temporary directory that lives as long as the fixture.
pub struct FixtureDir {
    dir: TempDir,
}

impl FixtureDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create fixture dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

impl Default for FixtureDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a workbook (starting from the default `Sheet1`), let `f` shape it,
/// and write it to `path`.
pub fn write_workbook<F: FnOnce(&mut Spreadsheet)>(path: &Path, f: F) {
    let mut book = umya_spreadsheet::new_file();
    f(&mut book);
    umya_spreadsheet::writer::xlsx::write(&book, path).expect("write fixture workbook");
}

/// Set a 1-based `(row, col)` cell of `sheet`.
pub fn set_cell(book: &mut Spreadsheet, sheet: &str, row: u32, col: u32, value: CellValue) {
    let ws = book
        .get_sheet_by_name_mut(sheet)
        .unwrap_or_else(|| panic!("fixture sheet `{sheet}` missing"));
    let cell = ws.get_cell_mut((col, row));
    match value {
        CellValue::Empty => {
            cell.set_blank();
        }
        CellValue::Int(i) => {
            cell.set_value_number(i as f64);
        }
        CellValue::Number(n) => {
            cell.set_value_number(n);
        }
        CellValue::Text(s) => {
            cell.set_value(s);
        }
        CellValue::Boolean(b) => {
            cell.set_value_bool(b);
        }
        CellValue::DateTime(dt) => {
            cell.set_value(dt.format("%d.%m.%Y %H:%M").to_string());
        }
        CellValue::Error(e) => {
            cell.set_value(e);
        }
    }
}

fn rename_first_sheet(book: &mut Spreadsheet, name: &str) {
    book.get_sheet_by_name_mut("Sheet1")
        .expect("default sheet")
        .set_name(name);
}

/// Report artifact as produced by the legacy reporting application: a
/// summary sheet, then the metrics sheet with four banner rows above the
/// header on row 5.
#[derive(Clone, Debug)]
pub struct ReportArtifact {
    pub summary_sheet: String,
    pub metrics_sheet: String,
    pub headers: Vec<String>,
    pub rows: Vec<[CellValue; 4]>,
    /// Write only the summary sheet.
    pub omit_metrics_sheet: bool,
}

impl ReportArtifact {
    pub fn english() -> Self {
        Self::with_headers(&[
            "Period",
            "Calculated calls",
            "Forecasted calls",
            "Answered calls",
        ])
    }

    pub fn russian() -> Self {
        Self::with_headers(&[
            "Период",
            "Расчетные звонки",
            "Спрогнозированные звонки",
            "Отвеченные звонки",
        ])
    }

    pub fn with_headers(headers: &[&str]) -> Self {
        Self {
            summary_sheet: "Summary".into(),
            metrics_sheet: "Metrics".into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            omit_metrics_sheet: false,
        }
    }

    /// Single-sheet artifact: the metrics sheet is never written.
    pub fn without_metrics_sheet(mut self) -> Self {
        self.omit_metrics_sheet = true;
        self
    }

    pub fn row(self, period: &str, calculated: f64, forecasted: f64, answered: f64) -> Self {
        self.raw_row(
            period,
            CellValue::Number(calculated),
            CellValue::Number(forecasted),
            CellValue::Number(answered),
        )
    }

    pub fn raw_row(
        mut self,
        period: &str,
        calculated: CellValue,
        forecasted: CellValue,
        answered: CellValue,
    ) -> Self {
        self.rows
            .push([CellValue::Text(period.into()), calculated, forecasted, answered]);
        self
    }

    pub fn write(&self, path: &Path) {
        write_workbook(path, |book| {
            rename_first_sheet(book, &self.summary_sheet);
            set_cell(
                book,
                &self.summary_sheet,
                1,
                1,
                CellValue::Text("Workload summary".into()),
            );
            if self.omit_metrics_sheet {
                return;
            }
            book.new_sheet(&self.metrics_sheet).expect("metrics sheet");
            let sheet = self.metrics_sheet.as_str();
            set_cell(book, sheet, 1, 1, "Report: intraday workload".into());
            set_cell(book, sheet, 2, 1, "Selection: fixture".into());
            // Row 3 stays empty: the header is located by physical row.
            set_cell(book, sheet, 4, 1, "Generated by testkit".into());
            for (i, h) in self.headers.iter().enumerate() {
                set_cell(book, sheet, 5, i as u32 + 1, CellValue::Text(h.clone()));
            }
            for (r, row) in self.rows.iter().enumerate() {
                for (c, value) in row.iter().enumerate() {
                    set_cell(book, sheet, 6 + r as u32, c as u32 + 1, value.clone());
                }
            }
        });
    }
}

/// The spreadsheet of record: one header row, one row per incident.
#[derive(Clone, Debug)]
pub struct SourceOfRecord {
    pub sheet: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SourceOfRecord {
    pub fn new(sheet: &str, headers: &[&str]) -> Self {
        Self {
            sheet: sheet.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Headers used by most engine tests: identifier, region, start, end, notes.
    pub fn standard() -> Self {
        Self::new("Report", &["Incident ID", "Region", "Start", "End", "Notes"])
    }

    pub fn row(mut self, values: Vec<CellValue>) -> Self {
        self.rows.push(values);
        self
    }

    pub fn write(&self, path: &Path) {
        write_workbook(path, |book| {
            rename_first_sheet(book, &self.sheet);
            for (i, h) in self.headers.iter().enumerate() {
                set_cell(book, &self.sheet, 1, i as u32 + 1, CellValue::Text(h.clone()));
            }
            for (r, row) in self.rows.iter().enumerate() {
                for (c, value) in row.iter().enumerate() {
                    set_cell(book, &self.sheet, 2 + r as u32, c as u32 + 1, value.clone());
                }
            }
        });
    }
}

/// `dd.mm.yyyy hh:mm` text cell, the source-of-record convention.
pub fn stamp(dt: NaiveDateTime) -> CellValue {
    CellValue::Text(dt.format("%d.%m.%Y %H:%M").to_string())
}

pub fn text(s: &str) -> CellValue {
    CellValue::Text(s.into())
}

/// Read a sheet back as `(row, col) -> display text` for assertions.
pub fn read_cell_text(path: &Path, sheet: &str, row: u32, col: u32) -> String {
    let book = umya_spreadsheet::reader::xlsx::read(path).expect("read fixture workbook");
    let ws = book
        .get_sheet_by_name(sheet)
        .unwrap_or_else(|| panic!("sheet `{sheet}` missing"));
    ws.get_value((col, row))
}
