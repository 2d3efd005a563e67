//! Per-cycle CSV recording.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use pantilt::{CycleOutcome, LockTransition};
use serde::Serialize;

/// One CSV row.
#[derive(Debug, Clone, Serialize)]
pub struct CycleRecord {
    pub cycle: u64,
    pub detections: usize,
    pub transition: &'static str,
    pub target_id: Option<u32>,
    pub target_x: Option<u16>,
    pub target_y: Option<u16>,
    pub target_age: Option<u32>,
    pub pan_error: Option<i32>,
    pub tilt_error: Option<i32>,
    pub pan_command: i32,
    pub tilt_command: i32,
}

impl From<&CycleOutcome> for CycleRecord {
    fn from(outcome: &CycleOutcome) -> Self {
        Self {
            cycle: outcome.cycle,
            detections: outcome.detections,
            transition: transition_label(&outcome.transition),
            target_id: outcome.target.map(|d| d.id),
            target_x: outcome.target.map(|d| d.x),
            target_y: outcome.target.map(|d| d.y),
            target_age: outcome.target.map(|d| d.age),
            pan_error: outcome.pan_error,
            tilt_error: outcome.tilt_error,
            pan_command: outcome.pan_command,
            tilt_command: outcome.tilt_command,
        }
    }
}

/// Short snake_case name for a lock transition.
pub fn transition_label(transition: &LockTransition) -> &'static str {
    match transition {
        LockTransition::NoDetections => "no_detections",
        LockTransition::Searching => "searching",
        LockTransition::Acquired { .. } => "acquired",
        LockTransition::Held { .. } => "held",
        LockTransition::Lost { .. } => "lost",
        LockTransition::Reacquired { .. } => "reacquired",
    }
}

/// Writes one row per tracker cycle.
pub struct CycleRecorder<W: Write> {
    writer: csv::Writer<W>,
    rows: u64,
}

impl CycleRecorder<File> {
    /// Create (or truncate) a CSV file at `path`.
    pub fn create(path: &Path) -> Result<Self, csv::Error> {
        Ok(Self::new(csv::Writer::from_path(path)?))
    }
}

impl<W: Write> CycleRecorder<W> {
    pub fn from_writer(writer: W) -> Self {
        Self::new(csv::Writer::from_writer(writer))
    }

    fn new(writer: csv::Writer<W>) -> Self {
        Self { writer, rows: 0 }
    }

    pub fn record(&mut self, outcome: &CycleOutcome) -> Result<(), csv::Error> {
        self.writer.serialize(CycleRecord::from(outcome))?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W, csv::Error> {
        self.writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }
}
