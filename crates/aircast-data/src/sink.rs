//! Forecast output records and sinks.

use crate::error::Result;
use crate::observation::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One forecast value for one entity at one future time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    /// Device the forecast belongs to
    pub entity_id: EntityId,
    /// Site of the device (pass-through)
    pub site_id: Option<String>,
    /// Forecast time (UTC, in the future at generation time)
    pub timestamp: DateTime<Utc>,
    /// Predicted target value
    pub predicted_value: f64,
}

/// Destination for forecast records.
pub trait ForecastSink {
    /// Write a batch of records, returning how many were accepted.
    fn write(&mut self, records: &[ForecastRecord]) -> Result<usize>;
}

/// Sink that keeps records in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Vec<ForecastRecord>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records written so far.
    pub fn records(&self) -> &[ForecastRecord] {
        &self.records
    }
}

impl ForecastSink for MemorySink {
    fn write(&mut self, records: &[ForecastRecord]) -> Result<usize> {
        self.records.extend_from_slice(records);
        Ok(records.len())
    }
}

/// Sink writing records as CSV rows.
#[derive(Debug)]
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    /// Wrap a writer. A header row is written with the first record.
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::DataError::Io(e.into_error()))
    }
}

impl CsvSink<File> {
    /// Create a CSV file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> ForecastSink for CsvSink<W> {
    fn write(&mut self, records: &[ForecastRecord]) -> Result<usize> {
        for record in records {
            self.writer.serialize(record)?;
        }
        self.writer.flush()?;
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, value: f64) -> ForecastRecord {
        ForecastRecord {
            entity_id: id.into(),
            site_id: Some("site-1".into()),
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 13, 0, 0).unwrap(),
            predicted_value: value,
        }
    }

    #[test]
    fn test_memory_sink_accumulates() {
        let mut sink = MemorySink::new();
        assert_eq!(sink.write(&[record("a", 1.0)]).unwrap(), 1);
        assert_eq!(sink.write(&[record("b", 2.0), record("c", 3.0)]).unwrap(), 2);
        assert_eq!(sink.records().len(), 3);
    }

    #[test]
    fn test_csv_sink_writes_header_and_rows() {
        let mut sink = CsvSink::new(Vec::new());
        sink.write(&[record("a", 12.5)]).unwrap();
        let bytes = sink.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("entity_id,site_id,timestamp,predicted_value")
        );
        assert_eq!(lines.next(), Some("a,site-1,2024-06-01T13:00:00Z,12.5"));
    }
}
