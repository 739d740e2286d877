//! One end-to-end run over the spreadsheet of record.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::fetch::{FetchRequest, ReportFetcher};
use crate::metrics::MetricsExtractor;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::source::SourceRow;
use crate::store::{ResultStore, UpsertOutcome};
use crate::window::{split_incident_into_windows, window_for_date};
use chrono::NaiveDate;
use impactor_common::{MetricsResult, Window};
use impactor_workbook::WriteSession;
use serde::Serialize;
use std::path::Path;

/// Which windows a run measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Every calendar day of every closed incident.
    #[default]
    AllWindows,
    /// One window per incident on the given day.
    SingleDate(NaiveDate),
    /// Like `SingleDate`, with the day taken from the day-only column.
    AutoDate,
}

/// Counters from a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub target_date: Option<NaiveDate>,
    pub incidents_seen: usize,
    pub skipped_region: usize,
    /// Rows without a usable start timestamp.
    pub skipped_unparseable: usize,
    /// Open incidents in all-windows mode.
    pub skipped_open: usize,
    /// Incidents not active on the target date.
    pub skipped_date: usize,
    /// Rows already filled before this run; never fetched.
    pub already_processed: usize,
    pub below_materiality: usize,
    /// Windows fetched and reduced to metrics.
    pub windows_measured: usize,
    pub windows_failed: usize,
    /// Source rows that received a Lost/Excess pair this run.
    pub rows_written: usize,
    /// One result per `(incident, date)` measured or zeroed, in order.
    pub results: Vec<MetricsResult>,
    pub reconciliation: Option<ReconcileReport>,
}

/// Drives WindowSplitter → fetch → MetricsExtractor → ResultStore for
/// every incident, finalizes once, then reconciles.
pub struct Pipeline<F: ReportFetcher> {
    config: EngineConfig,
    fetcher: F,
    extractor: MetricsExtractor,
    mode: RunMode,
    reconcile: bool,
}

impl<F: ReportFetcher> Pipeline<F> {
    pub fn new(config: EngineConfig, fetcher: F) -> Self {
        let extractor = MetricsExtractor::new(config.report.clone());
        Self {
            config,
            fetcher,
            extractor,
            mode: RunMode::AllWindows,
            reconcile: true,
        }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Run the reconciliation pass after the batch is saved (default on).
    pub fn with_reconcile(mut self, reconcile: bool) -> Self {
        self.reconcile = reconcile;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run(&mut self, source: &Path) -> Result<RunSummary, EngineError> {
        let _span = tracing::info_span!("run", source = %source.display()).entered();
        let mut summary = RunSummary::default();

        let mut session = WriteSession::open(source, self.config.source.sheet.as_deref())?;
        {
            let mut store = ResultStore::open(&mut session, &self.config)?;
            let target = match self.mode {
                RunMode::AllWindows => None,
                RunMode::SingleDate(date) => Some(date),
                RunMode::AutoDate => Some(store.table().first_day()?),
            };
            summary.target_date = target;
            if let Some(date) = target {
                tracing::info!(%date, "single-date run");
            }

            let rows = store.incidents()?;
            tracing::info!(incidents = rows.len(), "source of record loaded");
            for row in &rows {
                self.process_row(&mut store, row, target, &mut summary)?;
            }
        }
        let saved = session.finalize()?;
        tracing::info!(
            cells = saved,
            measured = summary.windows_measured,
            rows = summary.rows_written,
            failed = summary.windows_failed,
            "batch saved"
        );

        if self.reconcile {
            let report = Reconciler::new(self.config.source.clone()).reconcile(source)?;
            summary.reconciliation = Some(report);
        }
        Ok(summary)
    }

    fn process_row(
        &mut self,
        store: &mut ResultStore<'_>,
        row: &SourceRow,
        target: Option<NaiveDate>,
        summary: &mut RunSummary,
    ) -> Result<(), EngineError> {
        let _span = tracing::info_span!("incident", id = %row.id, region = %row.region).entered();
        summary.incidents_seen += 1;

        let Some(selectors) = self.config.selectors_for(&row.region) else {
            tracing::warn!("region not configured; skipped");
            summary.skipped_region += 1;
            return Ok(());
        };

        let Some(incident) = row.incident() else {
            summary.skipped_unparseable += 1;
            if let Some(date) = target {
                // Mark the row handled so operators do not chase it.
                let zero = MetricsResult::zero(&row.id, date);
                if !matches!(store.upsert(&zero)?, UpsertOutcome::AlreadyProcessed { .. }) {
                    summary.rows_written += 1;
                    summary.results.push(zero);
                }
            }
            return Ok(());
        };

        if store.is_processed(&row.id) {
            tracing::debug!("already processed");
            summary.already_processed += 1;
            return Ok(());
        }

        let windows: Vec<Window> = match target {
            Some(date) => {
                let selected = if store.table().has_day_column() {
                    row.day == Some(date)
                } else {
                    incident.covers(date)
                };
                if !selected {
                    summary.skipped_date += 1;
                    return Ok(());
                }
                vec![window_for_date(&incident, date)]
            }
            None => match incident.end {
                Some(end) => split_incident_into_windows(incident.start, end),
                None => {
                    tracing::warn!("incident still open; run with a target date to measure it");
                    summary.skipped_open += 1;
                    return Ok(());
                }
            },
        };
        let Some(first) = windows.first() else {
            tracing::warn!("end precedes start; nothing to measure");
            summary.skipped_unparseable += 1;
            return Ok(());
        };

        if store.below_materiality(&row.id) {
            tracing::info!("below materiality; zeros recorded without fetching");
            summary.below_materiality += 1;
            let zero = MetricsResult::zero(&row.id, first.date);
            store.upsert(&zero)?;
            summary.rows_written += 1;
            summary.results.push(zero);
            return Ok(());
        }

        tracing::info!(windows = windows.len(), "measuring");
        let mut stored: Option<MetricsResult> = None;
        for window in &windows {
            let Some(result) = self.measure(row, &selectors, window, summary) else {
                continue;
            };
            summary.windows_measured += 1;
            // The row holds one pair; the first measured day lands there.
            if stored.is_none() {
                stored = Some(result.clone());
            }
            summary.results.push(result);
        }

        match stored {
            Some(result) => match store.upsert(&result)? {
                UpsertOutcome::Written { .. } | UpsertOutcome::Appended { .. } => {
                    summary.rows_written += 1;
                }
                UpsertOutcome::AlreadyProcessed { row } => {
                    tracing::debug!(row, "row filled earlier in this run; kept");
                }
            },
            None => tracing::warn!("no window could be measured; row left blank"),
        }
        Ok(())
    }

    /// Fetch and reduce one window. Failures are logged and counted; the
    /// caller moves on to the next window.
    fn measure(
        &mut self,
        row: &SourceRow,
        selectors: &[String],
        window: &Window,
        summary: &mut RunSummary,
    ) -> Option<MetricsResult> {
        let request = FetchRequest {
            incident_id: &row.id,
            region: &row.region,
            selectors,
            window,
        };
        let artifact = match self.fetcher.fetch(&request) {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(date = %window.date, error = %err, "fetch failed; window skipped");
                summary.windows_failed += 1;
                return None;
            }
        };
        match self.extractor.extract_metrics(&artifact) {
            Ok((lost, excess)) => Some(MetricsResult::new(row.id.clone(), window.date, lost, excess)),
            Err(err) => {
                tracing::warn!(
                    date = %window.date,
                    artifact = %artifact.display(),
                    error = %err,
                    "artifact rejected; window skipped"
                );
                summary.windows_failed += 1;
                None
            }
        }
    }
}
