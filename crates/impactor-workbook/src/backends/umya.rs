#![cfg(feature = "umya")]

use crate::error::{IoError, is_lock_violation};
use crate::lock;
use crate::traits::{SheetData, SpreadsheetReader, SpreadsheetWriter};
use impactor_common::CellValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use umya_spreadsheet::{CellRawValue, CellValue as UmyaCellValue, Spreadsheet, XlsxError, reader::xlsx};

/// Read/write adapter for the source of record.
///
/// Every mutation stays in memory until [`SpreadsheetWriter::save`], which
/// writes a sibling temporary file and renames it over the original; a
/// failed or interrupted save never leaves a partial workbook behind.
pub struct UmyaAdapter {
    workbook: Spreadsheet,
    original_path: Option<PathBuf>,
}

impl UmyaAdapter {
    pub fn original_path(&self) -> Option<&Path> {
        self.original_path.as_deref()
    }

    fn convert_cell_value(cv: &UmyaCellValue) -> Option<CellValue> {
        let raw = cv.get_raw_value();
        if raw.is_empty() {
            return None;
        }
        if raw.is_error() {
            return Some(CellValue::Error(cv.get_value().to_string()));
        }
        match raw {
            CellRawValue::Numeric(n) => Some(CellValue::Number(*n)),
            CellRawValue::Bool(b) => Some(CellValue::Boolean(*b)),
            CellRawValue::String(s) => Some(CellValue::Text(s.to_string())),
            CellRawValue::RichText(rt) => Some(CellValue::Text(rt.get_text().to_string())),
            CellRawValue::Lazy(s) => {
                let txt = s.as_ref();
                if let Ok(n) = txt.parse::<f64>() {
                    Some(CellValue::Number(n))
                } else if txt.eq_ignore_ascii_case("TRUE") {
                    Some(CellValue::Boolean(true))
                } else if txt.eq_ignore_ascii_case("FALSE") {
                    Some(CellValue::Boolean(false))
                } else {
                    Some(CellValue::Text(txt.to_string()))
                }
            }
            CellRawValue::Error(_) => Some(CellValue::Error(cv.get_value().to_string())),
            CellRawValue::Empty => None,
        }
    }

    fn map_xlsx_error(path: &Path, err: XlsxError) -> IoError {
        match err {
            XlsxError::Io(io) => IoError::from_io(path, io),
            other => IoError::from_backend("umya", other),
        }
    }

    fn write_atomically(&self, path: &Path) -> Result<(), IoError> {
        lock::ensure_unlocked(path)?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| IoError::from_io(dir, e))?;
        umya_spreadsheet::writer::xlsx::write_writer(&self.workbook, tmp.as_file_mut())
            .map_err(|e| Self::map_xlsx_error(path, e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| IoError::from_io(path, e))?;
        tmp.persist(path).map_err(|e| {
            if is_lock_violation(&e.error) {
                IoError::StorageBusy {
                    path: path.to_path_buf(),
                    holder: None,
                }
            } else {
                IoError::from_io(path, e.error)
            }
        })?;
        tracing::debug!(path = %path.display(), "workbook persisted");
        Ok(())
    }
}

impl SpreadsheetReader for UmyaAdapter {
    fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, IoError>
    where
        Self: Sized,
    {
        let path = path.as_ref();
        // Full read (not lazy) so saves never hit undeserialized sheets
        let book = xlsx::read(path).map_err(|e| Self::map_xlsx_error(path, e))?;
        Ok(Self {
            workbook: book,
            original_path: Some(path.to_path_buf()),
        })
    }

    fn sheet_names(&self) -> Result<Vec<String>, IoError> {
        let count = self.workbook.get_sheet_count();
        let mut names = Vec::with_capacity(count);
        for i in 0..count {
            if let Some(s) = self.workbook.get_sheet(&i) {
                names.push(s.get_name().to_string());
            }
        }
        Ok(names)
    }

    fn read_sheet(&mut self, sheet: &str) -> Result<SheetData, IoError> {
        let ws = self
            .workbook
            .get_sheet_by_name(sheet)
            .ok_or_else(|| IoError::SheetNotFound(sheet.to_string()))?;
        let mut cells: BTreeMap<(u32, u32), CellValue> = BTreeMap::new();
        for cell in ws.get_cell_collection() {
            let coord = cell.get_coordinate();
            let col = *coord.get_col_num();
            let row = *coord.get_row_num();
            if let Some(value) = Self::convert_cell_value(cell.get_cell_value()) {
                if !value.is_blank() {
                    cells.insert((row, col), value);
                }
            }
        }
        Ok(SheetData::from_cells(cells))
    }
}

impl SpreadsheetWriter for UmyaAdapter {
    fn write_cell(
        &mut self,
        sheet: &str,
        row: u32,
        col: u32,
        value: CellValue,
    ) -> Result<(), IoError> {
        let ws = self
            .workbook
            .get_sheet_by_name_mut(sheet)
            .ok_or_else(|| IoError::SheetNotFound(sheet.to_string()))?;
        // umya uses (col,row)
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
        Ok(())
    }

    fn save(&mut self) -> Result<(), IoError> {
        let path = self
            .original_path
            .clone()
            .ok_or_else(|| IoError::Unsupported("save unavailable: no original path".into()))?;
        self.write_atomically(&path)
    }
}
