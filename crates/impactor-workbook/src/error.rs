use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by spreadsheet backends and write sessions.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{backend} backend error: {message}")]
    Backend { backend: &'static str, message: String },

    #[error("sheet `{0}` not found")]
    SheetNotFound(String),

    #[error("sheet index {index} out of range ({available} sheets)")]
    SheetIndexOutOfRange { index: usize, available: usize },

    /// The target file is held by another writer (open in an office suite,
    /// or a sharing violation reported by the OS).
    #[error("storage busy: {} is locked by another writer", path.display())]
    StorageBusy {
        path: PathBuf,
        holder: Option<PathBuf>,
    },

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl IoError {
    pub fn from_backend(backend: &'static str, err: impl std::fmt::Display) -> Self {
        IoError::Backend {
            backend,
            message: err.to_string(),
        }
    }

    /// Classify an OS error raised while touching `path`.
    pub fn from_io(path: &Path, source: std::io::Error) -> Self {
        if is_lock_violation(&source) {
            IoError::StorageBusy {
                path: path.to_path_buf(),
                holder: None,
            }
        } else {
            IoError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    pub fn is_storage_busy(&self) -> bool {
        matches!(self, IoError::StorageBusy { .. })
    }
}

/// Permission and sharing-violation errors are how a concurrent writer
/// surfaces on every supported platform.
pub(crate) fn is_lock_violation(err: &std::io::Error) -> bool {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        return true;
    }
    // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(err.raw_os_error(), Some(32) | Some(33))
}
