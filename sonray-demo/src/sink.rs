use sonray_core::{AcousticRecord, RecordSink, Result, SonrayError};
use std::io::Write;

/// Writes one JSON object per record, newline separated.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    records_written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            records_written: 0,
        }
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write_record(&mut self, record: &AcousticRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)
            .map_err(|e| SonrayError::Sink(format!("Failed to serialize record: {}", e)))?;
        self.writer.write_all(b"\n")?;
        self.records_written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        log::info!("Record sink closed after {} records", self.records_written);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonray_core::{AcquisitionMode, BVH_STRATEGY_LABEL, RecordKind};

    #[test]
    fn test_json_lines_layout() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let record = AcousticRecord {
            scene_id: "hall".into(),
            mode: AcquisitionMode::Realtime,
            kind: RecordKind::Frame,
            index: 7,
            ray_count: 2048,
            max_bounces: 16,
            bvh_strategy: BVH_STRATEGY_LABEL,
            frame_time_ms: 3.5,
            first_reflection_ms: Some(12.0),
            rt60_s: None,
        };
        sink.write_record(&record).unwrap();
        sink.write_record(&record).unwrap();
        sink.close().unwrap();
        assert_eq!(sink.records_written(), 2);

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["mode"], "realtime");
        assert_eq!(first["kind"], "frame");
        assert_eq!(first["index"], 7);
        assert_eq!(first["bvh_strategy"], "median-split-refit");
        assert!(first["rt60_s"].is_null());
        assert_eq!(text.lines().count(), 2);
    }
}
