//! Acquisition records and the sinks that persist them.

use crate::error::{Result, SonrayError};
use crate::kernel::AcquisitionMode;
use serde::Serialize;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Column order of [`AcousticRecord::to_csv_row`].
pub const CSV_HEADER: &str =
    "scene_id,mode,kind,index,ray_count,max_bounces,bvh_strategy,frame_time_ms,first_reflection_ms,rt60_s";

/// What a record summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// One realtime frame
    Frame,
    /// One reference iteration, metrics taken from the running mean
    Iteration,
    /// Final result of a reference run
    Summary,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frame => "frame",
            Self::Iteration => "iteration",
            Self::Summary => "summary",
        }
    }
}

/// One row of acquisition output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcousticRecord {
    pub scene_id: String,
    pub mode: AcquisitionMode,
    pub kind: RecordKind,
    pub index: u32,
    pub ray_count: u32,
    pub max_bounces: u32,
    pub bvh_strategy: &'static str,
    pub frame_time_ms: f64,
    pub first_reflection_ms: Option<f64>,
    pub rt60_s: Option<f64>,
}

impl AcousticRecord {
    /// Comma-separated row matching [`CSV_HEADER`]. Missing metrics are written as `NaN`.
    pub fn to_csv_row(&self) -> String {
        let opt = |v: Option<f64>| v.map_or_else(|| "NaN".to_string(), |x| format!("{:.4}", x));
        format!(
            "{},{},{},{},{},{},{},{:.4},{},{}",
            self.scene_id,
            self.mode,
            self.kind.as_str(),
            self.index,
            self.ray_count,
            self.max_bounces,
            self.bvh_strategy,
            self.frame_time_ms,
            opt(self.first_reflection_ms),
            opt(self.rt60_s),
        )
    }
}

/// Destination for acquisition records. The session owns its sink and closes
/// it exactly once on termination.
pub trait RecordSink {
    fn write_record(&mut self, record: &AcousticRecord) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Writes every record through `log::info!`.
#[derive(Debug, Default)]
pub struct LogRecordSink;

impl RecordSink for LogRecordSink {
    fn write_record(&mut self, record: &AcousticRecord) -> Result<()> {
        log::info!("{}", record.to_csv_row());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// CSV writer over any `io::Write`. The header goes out with the first record.
pub struct CsvRecordSink<W: Write> {
    writer: W,
    wrote_header: bool,
    closed: bool,
}

impl<W: Write> CsvRecordSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            wrote_header: false,
            closed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for CsvRecordSink<W> {
    fn write_record(&mut self, record: &AcousticRecord) -> Result<()> {
        if self.closed {
            return Err(SonrayError::Sink("write after close".into()));
        }
        if !self.wrote_header {
            writeln!(self.writer, "{}", CSV_HEADER)?;
            self.wrote_header = true;
        }
        writeln!(self.writer, "{}", record.to_csv_row())?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.writer.flush()?;
        Ok(())
    }
}

/// Collects records in shared memory. Clones observe the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordSink {
    records: Arc<Mutex<Vec<AcousticRecord>>>,
    close_count: Arc<Mutex<u32>>,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AcousticRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn close_count(&self) -> u32 {
        self.close_count.lock().map(|c| *c).unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }
}

impl RecordSink for MemoryRecordSink {
    fn write_record(&mut self, record: &AcousticRecord) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| SonrayError::Sink("record storage poisoned".into()))?;
        records.push(record.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut count = self
            .close_count
            .lock()
            .map_err(|_| SonrayError::Sink("record storage poisoned".into()))?;
        *count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::BVH_STRATEGY_LABEL;

    fn sample(kind: RecordKind) -> AcousticRecord {
        AcousticRecord {
            scene_id: "shoebox".into(),
            mode: AcquisitionMode::Reference,
            kind,
            index: 3,
            ray_count: 1024,
            max_bounces: 8,
            bvh_strategy: BVH_STRATEGY_LABEL,
            frame_time_ms: 12.5,
            first_reflection_ms: Some(7.0),
            rt60_s: None,
        }
    }

    #[test]
    fn test_csv_row_writes_nan_for_missing_metrics() {
        let row = sample(RecordKind::Iteration).to_csv_row();
        assert_eq!(
            row,
            "shoebox,reference,iteration,3,1024,8,median-split-refit,12.5000,7.0000,NaN"
        );
        assert_eq!(row.split(',').count(), CSV_HEADER.split(',').count());
    }

    #[test]
    fn test_csv_sink_writes_header_once() {
        let mut sink = CsvRecordSink::new(Vec::new());
        sink.write_record(&sample(RecordKind::Iteration)).unwrap();
        sink.write_record(&sample(RecordKind::Summary)).unwrap();
        sink.close().unwrap();
        assert!(sink.write_record(&sample(RecordKind::Frame)).is_err());

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[2].contains(",summary,"));
    }

    #[test]
    fn test_memory_sink_clones_share_storage() {
        let observer = MemoryRecordSink::new();
        let mut sink = observer.clone();
        sink.write_record(&sample(RecordKind::Frame)).unwrap();
        sink.close().unwrap();

        assert_eq!(observer.records().len(), 1);
        assert_eq!(observer.records()[0].kind, RecordKind::Frame);
        assert!(observer.is_closed());
    }
}
