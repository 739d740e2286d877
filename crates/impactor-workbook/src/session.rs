use crate::backends::UmyaAdapter;
use crate::error::IoError;
use crate::lock;
use crate::traits::{SheetData, SpreadsheetReader, SpreadsheetWriter};
use impactor_common::CellValue;
use std::path::{Path, PathBuf};

/// An open workbook/sheet pair that batches writes until [`finalize`].
///
/// Dropping a session without finalizing discards every pending write; the
/// file on disk is untouched.
///
/// [`finalize`]: WriteSession::finalize
pub struct WriteSession {
    adapter: UmyaAdapter,
    path: PathBuf,
    sheet: String,
    pending: usize,
    finalized: bool,
}

impl WriteSession {
    /// Open `path` for batched writes against `sheet` (first sheet when `None`).
    ///
    /// Fails with [`IoError::StorageBusy`] when another writer holds the file.
    pub fn open(path: impl AsRef<Path>, sheet: Option<&str>) -> Result<Self, IoError> {
        let path = path.as_ref();
        lock::ensure_unlocked(path)?;
        let adapter = UmyaAdapter::open_path(path)?;
        let names = adapter.sheet_names()?;
        let sheet = match sheet {
            Some(name) => names
                .into_iter()
                .find(|n| n == name)
                .ok_or_else(|| IoError::SheetNotFound(name.to_string()))?,
            None => names
                .into_iter()
                .next()
                .ok_or(IoError::SheetIndexOutOfRange {
                    index: 0,
                    available: 0,
                })?,
        };
        tracing::debug!(path = %path.display(), sheet = %sheet, "write session opened");
        Ok(Self {
            adapter,
            path: path.to_path_buf(),
            sheet,
            pending: 0,
            finalized: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet
    }

    /// Snapshot of the session sheet including unsaved writes.
    pub fn read(&mut self) -> Result<SheetData, IoError> {
        let sheet = self.sheet.clone();
        self.adapter.read_sheet(&sheet)
    }

    pub fn write(&mut self, row: u32, col: u32, value: CellValue) -> Result<(), IoError> {
        let sheet = self.sheet.clone();
        self.adapter.write_cell(&sheet, row, col, value)?;
        self.pending += 1;
        Ok(())
    }

    pub fn pending_writes(&self) -> usize {
        self.pending
    }

    /// Flush every batched write in one atomic save and return how many
    /// cell writes were persisted. A session with nothing pending does not
    /// touch the file.
    pub fn finalize(mut self) -> Result<usize, IoError> {
        let written = self.pending;
        if written > 0 {
            self.adapter.save()?;
            tracing::info!(
                path = %self.path.display(),
                cells = written,
                "write session finalized"
            );
        }
        self.pending = 0;
        self.finalized = true;
        Ok(written)
    }
}

impl Drop for WriteSession {
    fn drop(&mut self) {
        if !self.finalized && self.pending > 0 {
            tracing::warn!(
                path = %self.path.display(),
                discarded = self.pending,
                "write session dropped without finalize; pending writes discarded"
            );
        }
    }
}
