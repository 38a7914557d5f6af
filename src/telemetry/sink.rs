use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use image::RgbImage;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::error::{Result, TrainError};

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// Destination for training metrics. Written only by the training loop.
pub trait TelemetrySink {
    fn emit_scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<()>;
    fn emit_image(&mut self, tag: &str, image: &RgbImage, step: u64) -> Result<()>;
    /// Flushes and releases the sink. Further emits fail or are dropped.
    fn close(&mut self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Event file sink
// ---------------------------------------------------------------------------

/// One line of `events.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventRecord {
    Scalar {
        tag: String,
        step: u64,
        value: f64,
    },
    Image {
        tag: String,
        step: u64,
        path: PathBuf,
        width: u32,
        height: u32,
    },
}

/// Appends scalar events as JSON lines to `{dir}/events.jsonl` and writes
/// images as PNG files under `{dir}/images/`.
pub struct EventFileSink {
    dir: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl EventFileSink {
    pub const EVENTS_FILE: &'static str = "events.jsonl";

    pub fn create(dir: &Path) -> Result<EventFileSink> {
        std::fs::create_dir_all(dir.join("images"))?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(Self::EVENTS_FILE))?;
        Ok(EventFileSink {
            dir: dir.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_record(&mut self, record: &EventRecord) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| TrainError::invariant("telemetry sink is closed"))?;
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl TelemetrySink for EventFileSink {
    fn emit_scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<()> {
        self.write_record(&EventRecord::Scalar {
            tag: tag.to_string(),
            step,
            value,
        })
    }

    fn emit_image(&mut self, tag: &str, image: &RgbImage, step: u64) -> Result<()> {
        let file_name = format!("{}_{}.png", tag.replace('/', "_"), step);
        let path = self.dir.join("images").join(file_name);
        image.save(&path)?;
        self.write_record(&EventRecord::Image {
            tag: tag.to_string(),
            step,
            path,
            width: image.width(),
            height: image.height(),
        })
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Channel sink
// ---------------------------------------------------------------------------

/// Event forwarded by `ChannelSink`.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    Scalar { tag: String, value: f64, step: u64 },
    Image { tag: String, image: RgbImage, step: u64 },
}

/// Forwards every event to an in-process receiver.
///
/// A dropped receiver does not stop training; events are discarded from
/// then on. `close` drops the sender so the receiver sees disconnection.
pub struct ChannelSink {
    tx: Option<mpsc::Sender<TelemetryEvent>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<TelemetryEvent>) -> Self {
        ChannelSink { tx: Some(tx) }
    }

    /// Creates a sink together with its receiving end.
    pub fn channel() -> (ChannelSink, mpsc::Receiver<TelemetryEvent>) {
        let (tx, rx) = mpsc::channel();
        (ChannelSink::new(tx), rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    fn send(&mut self, event: TelemetryEvent) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| TrainError::invariant("telemetry sink is closed"))?;
        if tx.send(event).is_err() {
            debug!("Telemetry receiver dropped; discarding event");
        }
        Ok(())
    }
}

impl TelemetrySink for ChannelSink {
    fn emit_scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<()> {
        self.send(TelemetryEvent::Scalar {
            tag: tag.to_string(),
            value,
            step,
        })
    }

    fn emit_image(&mut self, tag: &str, image: &RgbImage, step: u64) -> Result<()> {
        self.send(TelemetryEvent::Image {
            tag: tag.to_string(),
            image: image.clone(),
            step,
        })
    }

    fn close(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_writes_one_json_line_per_scalar() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = EventFileSink::create(dir.path()).unwrap();
        sink.emit_scalar("data/total_loss", 0.5, 20).unwrap();
        sink.emit_scalar("data/lr", 0.001, 20).unwrap();
        sink.close().unwrap();

        let text = std::fs::read_to_string(dir.path().join(EventFileSink::EVENTS_FILE)).unwrap();
        let records: Vec<EventRecord> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(
            records[0],
            EventRecord::Scalar { tag: "data/total_loss".into(), step: 20, value: 0.5 }
        );
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn file_sink_saves_images_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = EventFileSink::create(dir.path()).unwrap();
        sink.emit_image("data/image", &RgbImage::new(4, 3), 7).unwrap();
        sink.close().unwrap();

        let png = dir.path().join("images").join("data_image_7.png");
        assert!(png.exists());
        let text = std::fs::read_to_string(dir.path().join(EventFileSink::EVENTS_FILE)).unwrap();
        assert!(text.contains("\"kind\":\"image\""));
    }

    #[test]
    fn closed_file_sink_rejects_events() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = EventFileSink::create(dir.path()).unwrap();
        sink.close().unwrap();
        assert!(sink.emit_scalar("data/lr", 0.1, 1).is_err());
    }

    #[test]
    fn channel_sink_disconnects_on_close() {
        let (mut sink, rx) = ChannelSink::channel();
        sink.emit_scalar("stage1/lr", 0.01, 5).unwrap();
        sink.close().unwrap();
        assert!(sink.is_closed());
        assert_eq!(
            rx.recv().unwrap(),
            TelemetryEvent::Scalar { tag: "stage1/lr".into(), value: 0.01, step: 5 }
        );
        assert!(rx.recv().is_err());
    }
}
