use crate::fetch::FetchError;
use impactor_workbook::IoError;
use std::path::PathBuf;
use thiserror::Error;

/// Why a sheet could not be bound to the columns an operation needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaMismatch {
    #[error("sheet #{index} missing ({available} sheets present)")]
    MissingSheet { index: usize, available: usize },

    #[error("{context}: missing column(s) {}", missing.join(", "))]
    MissingColumns {
        context: &'static str,
        missing: Vec<String>,
    },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("schema mismatch: {0}")]
    SchemaMismatch(#[from] SchemaMismatch),

    /// Another writer holds the source of record. Nothing was persisted.
    #[error("storage busy: {} is open in another program", path.display())]
    StorageBusy {
        path: PathBuf,
        holder: Option<PathBuf>,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("batch output failed: {0}")]
    Output(String),

    #[error(transparent)]
    Io(IoError),
}

impl EngineError {
    pub fn is_storage_busy(&self) -> bool {
        matches!(self, EngineError::StorageBusy { .. })
    }

    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, EngineError::SchemaMismatch(_))
    }

    pub(crate) fn missing_columns(context: &'static str, missing: Vec<String>) -> Self {
        EngineError::SchemaMismatch(SchemaMismatch::MissingColumns { context, missing })
    }
}

impl From<IoError> for EngineError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::StorageBusy { path, holder } => EngineError::StorageBusy { path, holder },
            IoError::SheetIndexOutOfRange { index, available } => {
                EngineError::SchemaMismatch(SchemaMismatch::MissingSheet { index, available })
            }
            other => EngineError::Io(other),
        }
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(err: serde_yaml::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_busy_survives_conversion() {
        let err: EngineError = IoError::StorageBusy {
            path: PathBuf::from("book.xlsx"),
            holder: None,
        }
        .into();
        assert!(err.is_storage_busy());
        assert!(err.to_string().contains("book.xlsx"));
    }

    #[test]
    fn missing_sheet_is_schema_mismatch() {
        let err: EngineError = IoError::SheetIndexOutOfRange {
            index: 1,
            available: 1,
        }
        .into();
        assert!(err.is_schema_mismatch());
    }

    #[test]
    fn missing_columns_lists_every_role() {
        let err = EngineError::missing_columns("report", vec!["Period".into(), "Answered".into()]);
        assert_eq!(
            err.to_string(),
            "schema mismatch: report: missing column(s) Period, Answered"
        );
    }
}
