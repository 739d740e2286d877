use crate::config::{SourceConfig, TimestampConfig};
use crate::error::EngineError;
use crate::schema::{ColumnMap, ColumnRole, HEADER_ROW};
use chrono::{NaiveDate, NaiveDateTime};
use impactor_common::{CellValue, Incident, parse_date, parse_timestamp};
use impactor_workbook::SheetData;

/// One data row of the spreadsheet of record.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// 1-based sheet row.
    pub row: u32,
    pub id: String,
    pub region: String,
    /// `None` when the start cell is blank or unparseable.
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// Day-only column value, when that column exists.
    pub day: Option<NaiveDate>,
    pub notes: CellValue,
}

impl SourceRow {
    /// The incident this row describes, if its start is known.
    pub fn incident(&self) -> Option<Incident> {
        self.start
            .map(|start| Incident::new(self.id.clone(), self.region.clone(), start, self.end))
    }
}

/// In-memory view of the spreadsheet of record with resolved columns.
#[derive(Debug, Clone)]
pub struct SourceTable {
    sheet: SheetData,
    columns: ColumnMap,
    formats: Vec<String>,
}

impl SourceTable {
    pub fn new(sheet: SheetData, config: &SourceConfig, timestamps: &TimestampConfig) -> Self {
        let columns = ColumnMap::from_sheet(&sheet, &config.headers);
        tracing::debug!(?columns, "source columns resolved");
        Self {
            sheet,
            columns,
            formats: timestamps.formats.clone(),
        }
    }

    pub fn sheet(&self) -> &SheetData {
        &self.sheet
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    pub(crate) fn columns_mut(&mut self) -> &mut ColumnMap {
        &mut self.columns
    }

    pub(crate) fn set(&mut self, row: u32, col: u32, value: CellValue) {
        self.sheet.set(row, col, value);
    }

    pub fn has_day_column(&self) -> bool {
        self.columns.contains(ColumnRole::Day)
    }

    /// Last row holding any value (the header row for an empty table).
    pub fn last_row(&self) -> u32 {
        self.sheet.max_row().max(HEADER_ROW)
    }

    /// First data row whose identifier matches `id`.
    pub fn find_row(&self, id: &str) -> Option<u32> {
        let col = self.columns.get(ColumnRole::IncidentId)?;
        let id = id.trim();
        (HEADER_ROW + 1..=self.last_row()).find(|r| self.sheet.value(*r, col).as_text().trim() == id)
    }

    pub fn value(&self, row: u32, role: ColumnRole) -> CellValue {
        match self.columns.get(role) {
            Some(col) => self.sheet.value(row, col),
            None => CellValue::Empty,
        }
    }

    /// Every data row with a non-blank identifier, in table order.
    ///
    /// Requires the identifier, region and start columns.
    pub fn incidents(&self) -> Result<Vec<SourceRow>, EngineError> {
        self.columns.require(
            &[ColumnRole::IncidentId, ColumnRole::Region, ColumnRole::Start],
            "source of record",
        )?;

        let mut rows = Vec::new();
        for r in HEADER_ROW + 1..=self.last_row() {
            let id = self.value(r, ColumnRole::IncidentId).as_text().trim().to_string();
            if id.is_empty() {
                continue;
            }
            let start = parse_timestamp(&self.value(r, ColumnRole::Start), self.formats.as_slice());
            if start.is_none() {
                tracing::warn!(row = r, incident = %id, "start timestamp missing or unparseable");
            }
            rows.push(SourceRow {
                row: r,
                id,
                region: self.value(r, ColumnRole::Region).as_text().trim().to_string(),
                start,
                end: parse_timestamp(&self.value(r, ColumnRole::End), self.formats.as_slice()),
                day: parse_date(&self.value(r, ColumnRole::Day), self.formats.as_slice()),
                notes: self.value(r, ColumnRole::Notes),
            });
        }
        Ok(rows)
    }

    /// First parseable value of the day-only column.
    pub fn first_day(&self) -> Result<NaiveDate, EngineError> {
        let col = self.columns.get(ColumnRole::Day).ok_or_else(|| {
            EngineError::Config("automatic date needs a day-only column".into())
        })?;
        (HEADER_ROW + 1..=self.last_row())
            .find_map(|r| parse_date(&self.sheet.value(r, col), self.formats.as_slice()))
            .ok_or_else(|| EngineError::Config("day-only column holds no valid date".into()))
    }
}
