//! Write-back of metrics into the spreadsheet of record.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::schema::{ColumnRole, HEADER_ROW};
use crate::source::{SourceRow, SourceTable};
use impactor_common::{CellValue, MetricsResult, round_to};
use impactor_workbook::WriteSession;

/// What an [`ResultStore::upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Written into the incident's existing row.
    Written { row: u32 },
    /// No row matched; a new one was added.
    Appended { row: u32 },
    /// Lost and Excess were already filled; nothing changed.
    AlreadyProcessed { row: u32 },
}

/// Batches upserts against an open [`WriteSession`].
///
/// The store keeps an in-memory mirror of the sheet so repeated lookups do
/// not re-read the workbook. Nothing reaches disk until the caller finalizes
/// the session.
pub struct ResultStore<'s> {
    session: &'s mut WriteSession,
    table: SourceTable,
    lost_label: String,
    excess_label: String,
    threshold: f64,
}

impl<'s> ResultStore<'s> {
    pub fn open(session: &'s mut WriteSession, config: &EngineConfig) -> Result<Self, EngineError> {
        let sheet = session.read()?;
        let table = SourceTable::new(sheet, &config.source, &config.timestamps);
        table
            .columns()
            .require(&[ColumnRole::IncidentId], "source of record")?;
        Ok(Self {
            session,
            table,
            lost_label: config.source.lost_label.clone(),
            excess_label: config.source.excess_label.clone(),
            threshold: config.source.materiality_threshold,
        })
    }

    pub fn table(&self) -> &SourceTable {
        &self.table
    }

    pub fn incidents(&self) -> Result<Vec<SourceRow>, EngineError> {
        self.table.incidents()
    }

    /// Whether both output cells of `id`'s row are already filled.
    pub fn is_processed(&self, id: &str) -> bool {
        let Some(row) = self.table.find_row(id) else {
            return false;
        };
        !self.table.value(row, ColumnRole::Lost).is_blank()
            && !self.table.value(row, ColumnRole::Excess).is_blank()
    }

    /// Numeric Notes below the materiality threshold.
    ///
    /// Missing rows, a missing Notes column and non-numeric notes are all
    /// material.
    pub fn below_materiality(&self, id: &str) -> bool {
        self.table
            .find_row(id)
            .and_then(|row| self.table.value(row, ColumnRole::Notes).as_number())
            .is_some_and(|n| n < self.threshold)
    }

    /// Write `result` into the incident's row, appending one if needed.
    pub fn upsert(&mut self, result: &MetricsResult) -> Result<UpsertOutcome, EngineError> {
        let (lost_col, excess_col) = self.provision_output_columns()?;

        let (row, appended) = match self.table.find_row(&result.incident_id) {
            Some(row) => (row, false),
            None => {
                let row = self.table.last_row() + 1;
                let id_col = self
                    .table
                    .columns()
                    .column(ColumnRole::IncidentId, "source of record")?;
                self.put(row, id_col, CellValue::Text(result.incident_id.clone()))?;
                (row, true)
            }
        };

        if !self.table.sheet().value(row, lost_col).is_blank()
            && !self.table.sheet().value(row, excess_col).is_blank()
        {
            tracing::debug!(incident = %result.incident_id, row, "already processed");
            return Ok(UpsertOutcome::AlreadyProcessed { row });
        }

        self.put(row, lost_col, CellValue::Int(result.lost_calls))?;
        self.put(
            row,
            excess_col,
            CellValue::Number(round_to(result.excess_ratio, 4)),
        )?;
        tracing::info!(
            incident = %result.incident_id,
            date = %result.date,
            lost = result.lost_calls,
            excess = result.excess_ratio,
            row,
            "result stored"
        );
        Ok(if appended {
            UpsertOutcome::Appended { row }
        } else {
            UpsertOutcome::Written { row }
        })
    }

    /// Resolve the Lost and Excess columns, appending whichever is missing
    /// after the last used column, Lost first.
    fn provision_output_columns(&mut self) -> Result<(u32, u32), EngineError> {
        for (role, label) in [
            (ColumnRole::Lost, self.lost_label.clone()),
            (ColumnRole::Excess, self.excess_label.clone()),
        ] {
            if self.table.columns().contains(role) {
                continue;
            }
            let col = self.table.sheet().max_col() + 1;
            self.put(HEADER_ROW, col, CellValue::Text(label.clone()))?;
            self.table.columns_mut().insert(role, col);
            tracing::info!(column = col, header = %label, "output column added");
        }
        let columns = self.table.columns();
        Ok((
            columns.column(ColumnRole::Lost, "source of record")?,
            columns.column(ColumnRole::Excess, "source of record")?,
        ))
    }

    fn put(&mut self, row: u32, col: u32, value: CellValue) -> Result<(), EngineError> {
        self.session.write(row, col, value.clone())?;
        self.table.set(row, col, value);
        Ok(())
    }
}
