//! Scripted sensor and recording actuator.
//!
//! Used for replaying captured detection logs and for driving the tracker in
//! tests without hardware.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::detection::Detection;
use crate::error::{ConfigError, DeviceError, DeviceResult};
use crate::interface::{DetectionSource, ServoTransport};

/// Detection source that plays back a fixed list of frames.
#[derive(Debug, Clone)]
pub struct ScriptedDetector {
    frames: VecDeque<Vec<Detection>>,
    width: u32,
    height: u32,
    fail_when_exhausted: bool,
    polled: u64,
}

impl ScriptedDetector {
    pub fn new(width: u32, height: u32, frames: Vec<Vec<Detection>>) -> Self {
        Self {
            frames: frames.into(),
            width,
            height,
            fail_when_exhausted: false,
            polled: 0,
        }
    }

    /// Load frames from a JSON file holding an array of detection arrays.
    pub fn from_json_file(path: &Path, width: u32, height: u32) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let frames: Vec<Vec<Detection>> = serde_json::from_str(&json)?;
        Ok(Self::new(width, height, frames))
    }

    /// Report [`DeviceError::Disconnected`] once the script runs out,
    /// instead of returning empty frames forever.
    pub fn fail_when_exhausted(mut self, fail: bool) -> Self {
        self.fail_when_exhausted = fail;
        self
    }

    /// Frames not yet played back.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    /// Number of polls served so far.
    pub fn polled(&self) -> u64 {
        self.polled
    }
}

impl DetectionSource for ScriptedDetector {
    fn poll_detections(&mut self) -> DeviceResult<Vec<Detection>> {
        match self.frames.pop_front() {
            Some(frame) => {
                self.polled += 1;
                Ok(frame)
            }
            None if self.fail_when_exhausted => Err(DeviceError::Disconnected(format!(
                "script exhausted after {} frames",
                self.polled
            ))),
            None => {
                self.polled += 1;
                Ok(Vec::new())
            }
        }
    }

    fn frame_width(&self) -> u32 {
        self.width
    }

    fn frame_height(&self) -> u32 {
        self.height
    }
}

/// Servo transport that records every command pair.
///
/// Clones share the same log, so a test can keep one handle and hand the
/// other to the tracker.
#[derive(Debug, Clone, Default)]
pub struct RecordingServo {
    sent: Arc<Mutex<Vec<(i32, i32)>>>,
    fail_after: Option<usize>,
}

impl RecordingServo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with [`DeviceError::Disconnected`] once `count` commands have been
    /// accepted.
    pub fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Snapshot of all commands sent so far.
    pub fn commands(&self) -> Vec<(i32, i32)> {
        self.sent.lock().unwrap().clone()
    }

    /// Most recent command, if any.
    pub fn last(&self) -> Option<(i32, i32)> {
        self.sent.lock().unwrap().last().copied()
    }
}

impl ServoTransport for RecordingServo {
    fn send_servo_command(&mut self, pan: i32, tilt: i32) -> DeviceResult<()> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| DeviceError::Disconnected("servo log poisoned".to_string()))?;
        if let Some(limit) = self.fail_after {
            if sent.len() >= limit {
                return Err(DeviceError::Disconnected(format!(
                    "servo link dropped after {limit} commands"
                )));
            }
        }
        sent.push((pan, tilt));
        Ok(())
    }
}
