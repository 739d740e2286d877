//! Lost-call and excess-traffic metrics from one report artifact.

use crate::config::ReportConfig;
use crate::error::EngineError;
use impactor_common::round_to;
use impactor_workbook::{CalamineAdapter, SheetData, SpreadsheetReader};
use std::path::Path;

/// One interval row of the report's metrics table.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub period: String,
    pub calculated: f64,
    pub forecasted: f64,
    pub answered: f64,
}

impl ReportRow {
    pub fn new(period: impl Into<String>, calculated: f64, forecasted: f64, answered: f64) -> Self {
        Self {
            period: period.into(),
            calculated,
            forecasted,
            answered,
        }
    }

    /// Calls lost in this interval.
    ///
    /// The `answered <= forecasted` branch algebraically reduces to
    /// `calculated - forecasted`; it is kept in its business form.
    pub fn lost(&self) -> f64 {
        let diff = self.calculated - self.forecasted;
        if diff <= 0.0 {
            return 0.0;
        }
        let answer_diff = self.answered - self.forecasted;
        if answer_diff > 0.0 {
            self.calculated - self.answered
        } else {
            (self.calculated - self.answered) - (self.forecasted - self.answered)
        }
    }
}

/// `(lost_calls, excess_ratio)` over the rows of one window.
///
/// Lost calls are the truncated sum of per-row losses, floored at zero
/// (a row answering more than it received can go negative). The excess ratio is
/// `sum(calculated - forecasted) / sum(forecasted)` rounded to 4 places, or
/// exactly `0.0` when nothing was forecast.
pub fn compute_metrics(rows: &[ReportRow]) -> (i64, f64) {
    let lost: f64 = rows.iter().map(ReportRow::lost).sum();
    let excess_sum: f64 = rows.iter().map(|r| r.calculated - r.forecasted).sum();
    let forecast_sum: f64 = rows.iter().map(|r| r.forecasted).sum();
    let excess = if forecast_sum == 0.0 {
        0.0
    } else {
        round_to(excess_sum / forecast_sum, 4)
    };
    ((lost.trunc() as i64).max(0), excess)
}

#[derive(Debug, Clone, Copy)]
struct ReportColumns {
    period: u32,
    calculated: u32,
    forecasted: u32,
    answered: u32,
}

/// Reads report artifacts laid out per a [`ReportConfig`].
#[derive(Debug, Clone, Default)]
pub struct MetricsExtractor {
    config: ReportConfig,
}

impl MetricsExtractor {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Parse `artifact` into `(lost_calls, excess_ratio)`.
    ///
    /// A missing metrics sheet or missing required column fails with
    /// [`EngineError::SchemaMismatch`] and yields no partial metrics.
    pub fn extract_metrics(&self, artifact: &Path) -> Result<(i64, f64), EngineError> {
        let rows = self.read_rows(artifact)?;
        let metrics = compute_metrics(&rows);
        tracing::debug!(
            artifact = %artifact.display(),
            rows = rows.len(),
            lost = metrics.0,
            excess = metrics.1,
            "metrics extracted"
        );
        Ok(metrics)
    }

    /// Data rows of the metrics sheet with summary rows removed.
    pub fn read_rows(&self, artifact: &Path) -> Result<Vec<ReportRow>, EngineError> {
        let mut reader = CalamineAdapter::open_path(artifact)?;
        let sheet = reader.read_sheet_at(self.config.sheet_index)?;
        self.rows_from_sheet(&sheet)
    }

    pub fn rows_from_sheet(&self, sheet: &SheetData) -> Result<Vec<ReportRow>, EngineError> {
        let columns = self.resolve_columns(sheet)?;
        let markers: Vec<String> = self
            .config
            .total_markers
            .iter()
            .map(|m| m.to_lowercase())
            .collect();

        let mut rows = Vec::new();
        for r in self.config.header_row + 1..=sheet.max_row() {
            let period = sheet.value(r, columns.period).as_text();
            let lowered = period.to_lowercase();
            if markers.iter().any(|m| lowered.contains(m.as_str())) {
                continue;
            }
            rows.push(ReportRow {
                period,
                calculated: sheet.value(r, columns.calculated).number_or_zero(),
                forecasted: sheet.value(r, columns.forecasted).number_or_zero(),
                answered: sheet.value(r, columns.answered).number_or_zero(),
            });
        }
        Ok(rows)
    }

    fn resolve_columns(&self, sheet: &SheetData) -> Result<ReportColumns, EngineError> {
        let header_row = self.config.header_row;
        let headers: Vec<(u32, String)> = (1..=sheet.max_col())
            .map(|c| (c, sheet.value(header_row, c).as_text().trim().to_lowercase()))
            .filter(|(_, h)| !h.is_empty())
            .collect();
        let find = |aliases: &[String]| {
            headers.iter().find_map(|(c, h)| {
                aliases
                    .iter()
                    .any(|a| a.trim().to_lowercase() == *h)
                    .then_some(*c)
            })
        };

        let wanted = [
            ("Period", &self.config.period),
            ("Calculated calls", &self.config.calculated),
            ("Forecasted calls", &self.config.forecasted),
            ("Answered calls", &self.config.answered),
        ];
        let mut found = [0u32; 4];
        let mut missing = Vec::new();
        for (slot, (label, aliases)) in found.iter_mut().zip(wanted) {
            match find(aliases.as_slice()) {
                Some(c) => *slot = c,
                None => missing.push(label.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(EngineError::missing_columns("report artifact", missing));
        }
        Ok(ReportColumns {
            period: found[0],
            calculated: found[1],
            forecasted: found[2],
            answered: found[3],
        })
    }
}
