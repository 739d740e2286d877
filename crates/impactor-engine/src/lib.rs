//! Incident impact computation.
//!
//! An incident interval is cut into calendar-day [windows](window), each
//! window's report artifact is reduced to a `(lost_calls, excess_ratio)`
//! pair by the [`MetricsExtractor`], results are upserted into the
//! spreadsheet of record through a [`ResultStore`], and a final
//! [`Reconciler`] pass removes duplicate and contradicted measurements.

pub mod config;
mod error;
pub mod fetch;
pub mod metrics;
pub mod pipeline;
pub mod reconcile;
pub mod schema;
pub mod sink;
pub mod source;
pub mod store;
pub mod window;

pub use config::{EngineConfig, HeaderTerms, ReportConfig, SourceConfig, TimestampConfig};
pub use error::{EngineError, SchemaMismatch};
pub use fetch::{CommandFetcher, DirectoryFetcher, FetchError, FetchRequest, ReportFetcher};
pub use metrics::{MetricsExtractor, ReportRow, compute_metrics};
pub use pipeline::{Pipeline, RunMode, RunSummary};
pub use reconcile::{LedgerRow, ReconcileReport, Reconciler, notes_score, reconcile_rows};
pub use schema::{ColumnMap, ColumnRole};
pub use sink::CsvSink;
pub use source::{SourceRow, SourceTable};
pub use store::{ResultStore, UpsertOutcome};
pub use window::{split_incident_into_windows, window_for_date};

pub use impactor_common::{Incident, MetricsResult, Window};
