use crate::error::IoError;
use impactor_common::CellValue;
use std::collections::BTreeMap;
use std::path::Path;

/// Cell values of one sheet keyed by 1-based `(row, col)`.
///
/// Only non-blank cells are stored.
#[derive(Clone, Debug, Default)]
pub struct SheetData {
    pub cells: BTreeMap<(u32, u32), CellValue>,
    pub dimensions: Option<(u32, u32)>,
}

impl SheetData {
    pub fn from_cells(cells: BTreeMap<(u32, u32), CellValue>) -> Self {
        let dims = cells.keys().fold((0u32, 0u32), |acc, (r, c)| {
            (acc.0.max(*r), acc.1.max(*c))
        });
        let dimensions = if dims == (0, 0) { None } else { Some(dims) };
        Self { cells, dimensions }
    }

    pub fn get(&self, row: u32, col: u32) -> Option<&CellValue> {
        self.cells.get(&(row, col))
    }

    /// Cell value or `Empty` for absent cells.
    pub fn value(&self, row: u32, col: u32) -> CellValue {
        self.get(row, col).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, row: u32, col: u32, value: CellValue) {
        if value.is_blank() {
            self.cells.remove(&(row, col));
            return;
        }
        let (max_r, max_c) = self.dimensions.unwrap_or((0, 0));
        self.dimensions = Some((max_r.max(row), max_c.max(col)));
        self.cells.insert((row, col), value);
    }

    pub fn max_row(&self) -> u32 {
        self.dimensions.map(|(r, _)| r).unwrap_or(0)
    }

    pub fn max_col(&self) -> u32 {
        self.dimensions.map(|(_, c)| c).unwrap_or(0)
    }

    /// Values of `row` from column 1 through `max_col()`, blanks included.
    pub fn row_values(&self, row: u32) -> Vec<CellValue> {
        (1..=self.max_col()).map(|c| self.value(row, c)).collect()
    }
}

pub trait SpreadsheetReader {
    fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, IoError>
    where
        Self: Sized;

    fn sheet_names(&self) -> Result<Vec<String>, IoError>;

    fn read_sheet(&mut self, sheet: &str) -> Result<SheetData, IoError>;

    /// Read a sheet by its 0-based position in the workbook.
    fn read_sheet_at(&mut self, index: usize) -> Result<SheetData, IoError> {
        let names = self.sheet_names()?;
        let name = names
            .get(index)
            .cloned()
            .ok_or(IoError::SheetIndexOutOfRange {
                index,
                available: names.len(),
            })?;
        self.read_sheet(&name)
    }
}

pub trait SpreadsheetWriter {
    fn write_cell(
        &mut self,
        sheet: &str,
        row: u32,
        col: u32,
        value: CellValue,
    ) -> Result<(), IoError>;

    /// Persist every pending mutation over the file the backend was opened
    /// from. Either the whole workbook lands or the file is left untouched.
    fn save(&mut self) -> Result<(), IoError>;
}
