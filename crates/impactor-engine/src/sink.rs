use crate::error::EngineError;
use impactor_common::MetricsResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Column names of the batch output.
pub const CSV_HEADER: [&str; 4] = ["incident_id", "date", "lost_calls", "excess_ratio"];

/// Delimited batch output: one record per `(incident, date)`.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    written: usize,
}

impl CsvSink<File> {
    pub fn create(path: &Path) -> Result<Self, EngineError> {
        let file = File::create(path)
            .map_err(|e| EngineError::Output(format!("{}: {e}", path.display())))?;
        Self::new(file)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Result<Self, EngineError> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(CSV_HEADER).map_err(csv_error)?;
        Ok(Self { writer, written: 0 })
    }

    pub fn write(&mut self, result: &MetricsResult) -> Result<(), EngineError> {
        self.writer
            .write_record([
                result.incident_id.clone(),
                result.date.format("%Y-%m-%d").to_string(),
                result.lost_calls.to_string(),
                format!("{:.4}", result.excess_ratio),
            ])
            .map_err(csv_error)?;
        self.written += 1;
        Ok(())
    }

    pub fn write_all<'a>(
        &mut self,
        results: impl IntoIterator<Item = &'a MetricsResult>,
    ) -> Result<(), EngineError> {
        for result in results {
            self.write(result)?;
        }
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(self) -> Result<W, EngineError> {
        self.writer
            .into_inner()
            .map_err(|e| EngineError::Output(e.error().to_string()))
    }
}

fn csv_error(err: csv::Error) -> EngineError {
    EngineError::Output(err.to_string())
}
