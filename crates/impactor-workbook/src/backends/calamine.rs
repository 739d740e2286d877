#![cfg(feature = "calamine")]

use crate::error::IoError;
use crate::traits::{SheetData, SpreadsheetReader};
use impactor_common::CellValue;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ::calamine::{Data, Range, Reader, Sheets, open_workbook_auto};

/// Read-only adapter used for downloaded report artifacts.
pub struct CalamineAdapter {
    workbook: Sheets<BufReader<File>>,
    path: PathBuf,
}

impl CalamineAdapter {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn convert_value(data: &Data) -> CellValue {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Int(*i),
            Data::Bool(b) => CellValue::Boolean(*b),
            Data::Error(e) => CellValue::Error(e.to_string()),
            // Kept as a serial; consumers decide whether a number is a date.
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::DateTimeIso(s) => CellValue::Text(s.clone()),
            Data::DurationIso(s) => CellValue::Text(s.clone()),
        }
    }

    fn range_to_cells(range: &Range<Data>) -> BTreeMap<(u32, u32), CellValue> {
        let mut cells = BTreeMap::new();

        let start_row = range.start().unwrap_or_default().0 as usize;
        let start_col = range.start().unwrap_or_default().1 as usize;

        for (row, col, val) in range.used_cells() {
            // Calamine uses 0-based indexing relative to the range start
            let excel_row = (row + start_row + 1) as u32;
            let excel_col = (col + start_col + 1) as u32;

            let value = Self::convert_value(val);
            if !value.is_blank() {
                cells.insert((excel_row, excel_col), value);
            }
        }

        cells
    }
}

impl SpreadsheetReader for CalamineAdapter {
    fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, IoError>
    where
        Self: Sized,
    {
        let path = path.as_ref();
        let workbook = open_workbook_auto(path).map_err(|e| match e {
            ::calamine::Error::Io(io) => IoError::from_io(path, io),
            other => IoError::from_backend("calamine", other),
        })?;
        Ok(Self {
            workbook,
            path: path.to_path_buf(),
        })
    }

    fn sheet_names(&self) -> Result<Vec<String>, IoError> {
        Ok(self.workbook.sheet_names())
    }

    fn read_sheet(&mut self, sheet: &str) -> Result<SheetData, IoError> {
        if !self.workbook.sheet_names().iter().any(|n| n == sheet) {
            return Err(IoError::SheetNotFound(sheet.to_string()));
        }
        let range = self
            .workbook
            .worksheet_range(sheet)
            .map_err(|e| IoError::from_backend("calamine", e))?;
        Ok(SheetData::from_cells(Self::range_to_cells(&range)))
    }
}
