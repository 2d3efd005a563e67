//! Per-cycle orchestration: poll, select, control, actuate.
//!
//! One call to [`PanTiltTracker::step`] is one control cycle:
//!
//! 1. poll the detection source (blocks until a frame is ready)
//! 2. apply the signature filter and detection cap
//! 3. let the [`LockManager`] pick a target
//! 4. reset both loops if the lock passed through "unlocked"
//! 5. with a target, compute pixel errors and update both loops;
//!    without one, leave both loops at rest
//! 6. send both commands in a single transport call
//!
//! A command pair is sent every cycle, including the rest pair when nothing
//! is tracked, so the actuator is never left holding a stale correction.

use log::{debug, info};
use serde::Serialize;

use crate::callback::{CallbackId, CallbackRegistry, TrackerEvent};
use crate::config::TrackerConfig;
use crate::detection::{Detection, SignatureMap};
use crate::error::{ConfigError, DeviceResult};
use crate::interface::{DetectionSource, ServoTransport};
use crate::lock::{LockManager, LockTransition, TrackState};
use crate::pid::PidLoop;

/// Tracked cycles between progress log lines.
const PROGRESS_INTERVAL: u64 = 60;

/// What happened during one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    /// 1-based cycle counter
    pub cycle: u64,
    /// Detections considered after filtering
    pub detections: usize,
    pub transition: LockTransition,
    /// Detection driven toward frame center this cycle
    pub target: Option<Detection>,
    pub pan_error: Option<i32>,
    pub tilt_error: Option<i32>,
    pub pan_command: i32,
    pub tilt_command: i32,
}

impl CycleOutcome {
    pub fn is_tracking(&self) -> bool {
        self.target.is_some()
    }
}

/// Counters accumulated over a tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionStats {
    pub cycles: u64,
    pub tracked_cycles: u64,
    pub acquisitions: u64,
    pub losses: u64,
}

/// Closed-loop pan/tilt tracker.
///
/// Owns the detection source, the servo transport, the lock state and one
/// PID loop per axis. All state is mutated only from [`step`](Self::step),
/// so the tracker needs no internal locking.
pub struct PanTiltTracker<D, A> {
    detector: D,
    actuator: A,
    lock: LockManager,
    pan: PidLoop,
    tilt: PidLoop,
    center_x: i32,
    center_y: i32,
    signature_map: SignatureMap,
    max_detections: Option<usize>,
    stats: SessionStats,
    callbacks: CallbackRegistry,
}

impl<D: DetectionSource, A: ServoTransport> PanTiltTracker<D, A> {
    /// Build a tracker. Frame geometry is queried once here and cached.
    pub fn new(detector: D, actuator: A, config: &TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let width = detector.frame_width();
        let height = detector.frame_height();
        info!(
            "Tracker frame {}x{}, lock age > {}",
            width, height, config.min_age_to_lock
        );

        Ok(Self {
            detector,
            actuator,
            lock: LockManager::new(config.min_age_to_lock),
            pan: PidLoop::new(config.pan.gains, config.pan.device, config.limits),
            tilt: PidLoop::new(config.tilt.gains, config.tilt.device, config.limits),
            center_x: half(width),
            center_y: half(height),
            signature_map: config.signature_map,
            max_detections: config.max_detections,
            stats: SessionStats::default(),
            callbacks: CallbackRegistry::new(),
        })
    }

    /// Run one control cycle.
    ///
    /// Device failures are returned unchanged. A failed poll sends nothing;
    /// a failed send happens after both loops were updated for this cycle.
    pub fn step(&mut self) -> DeviceResult<CycleOutcome> {
        let mut detections = self.detector.poll_detections()?;
        self.stats.cycles += 1;

        detections.retain(|d| self.signature_map.matches(d));
        if let Some(max) = self.max_detections {
            detections.truncate(max);
        }

        let selection = self.lock.select_target(&detections);
        let transition = selection.transition;

        if transition.passed_through_unlocked() {
            self.pan.reset();
            self.tilt.reset();
        }

        if let Some(id) = transition.lost_id() {
            self.stats.losses += 1;
            self.callbacks.emit(&TrackerEvent::LockLost { id });
        }

        let target = selection.index.map(|i| detections[i]);

        if let (Some(id), Some(detection)) = (transition.acquired_id(), target) {
            self.stats.acquisitions += 1;
            self.callbacks
                .emit(&TrackerEvent::LockAcquired { id, detection });
        }

        let outcome = match target {
            Some(detection) => {
                let pan_error = self.center_x - i32::from(detection.x);
                let tilt_error = i32::from(detection.y) - self.center_y;

                let pan_command = self.pan.update(pan_error);
                let tilt_command = self.tilt.update(tilt_error);

                self.stats.tracked_cycles += 1;
                if self.stats.tracked_cycles % PROGRESS_INTERVAL == 0 {
                    info!(
                        "Tracked {} cycles (detection {}, pan {}, tilt {})",
                        self.stats.tracked_cycles, detection.id, pan_command, tilt_command
                    );
                }
                debug!(
                    "Cycle {}: {} err=({}, {}) cmd=({}, {})",
                    self.stats.cycles, detection, pan_error, tilt_error, pan_command, tilt_command
                );

                CycleOutcome {
                    cycle: self.stats.cycles,
                    detections: detections.len(),
                    transition,
                    target: Some(detection),
                    pan_error: Some(pan_error),
                    tilt_error: Some(tilt_error),
                    pan_command,
                    tilt_command,
                }
            }
            None => CycleOutcome {
                cycle: self.stats.cycles,
                detections: detections.len(),
                transition,
                target: None,
                pan_error: None,
                tilt_error: None,
                pan_command: self.pan.command(),
                tilt_command: self.tilt.command(),
            },
        };

        self.actuator
            .send_servo_command(outcome.pan_command, outcome.tilt_command)?;

        if let (Some(detection), Some(pan_error), Some(tilt_error)) =
            (outcome.target, outcome.pan_error, outcome.tilt_error)
        {
            self.callbacks.emit(&TrackerEvent::TrackingUpdate {
                id: detection.id,
                pan_error,
                tilt_error,
                pan_command: outcome.pan_command,
                tilt_command: outcome.tilt_command,
            });
        }

        Ok(outcome)
    }

    /// Run cycles until `max_cycles` have completed (forever if `None`) or a
    /// device call fails.
    pub fn run(&mut self, max_cycles: Option<u64>) -> DeviceResult<SessionStats> {
        let mut remaining = max_cycles;
        while remaining != Some(0) {
            self.step()?;
            if let Some(n) = remaining.as_mut() {
                *n -= 1;
            }
        }
        Ok(self.stats)
    }

    /// Register a listener for tracker events.
    pub fn register_callback<F>(&mut self, callback: F) -> CallbackId
    where
        F: Fn(&TrackerEvent) + Send + Sync + 'static,
    {
        self.callbacks.register(callback)
    }

    pub fn deregister_callback(&mut self, id: CallbackId) -> bool {
        self.callbacks.deregister(id)
    }

    /// Drop the lock and return both loops to rest without sending anything.
    pub fn reset(&mut self) {
        self.lock.reset();
        self.pan.reset();
        self.tilt.reset();
    }

    pub fn track_state(&self) -> TrackState {
        self.lock.state()
    }

    pub fn pan_loop(&self) -> &PidLoop {
        &self.pan
    }

    pub fn tilt_loop(&self) -> &PidLoop {
        &self.tilt
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Cached frame center `(x, y)` in pixels.
    pub fn frame_center(&self) -> (i32, i32) {
        (self.center_x, self.center_y)
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }
}

fn half(extent: u32) -> i32 {
    i32::try_from(extent / 2).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pid::{PidGains, RCS_CENTER_POS};
    use crate::scripted::{RecordingServo, ScriptedDetector};

    fn tracker(
        frames: Vec<Vec<Detection>>,
    ) -> (PanTiltTracker<ScriptedDetector, RecordingServo>, RecordingServo) {
        let servo = RecordingServo::new();
        let detector = ScriptedDetector::new(320, 200, frames);
        let tracker =
            PanTiltTracker::new(detector, servo.clone(), &TrackerConfig::default()).unwrap();
        (tracker, servo)
    }

    #[test]
    fn test_frame_center_cached() {
        let (tracker, _) = tracker(vec![]);
        assert_eq!(tracker.frame_center(), (160, 100));
    }

    #[test]
    fn test_no_target_sends_rest_command() {
        let (mut tracker, servo) = tracker(vec![vec![], vec![]]);
        let outcome = tracker.step().unwrap();
        assert_eq!(outcome.transition, LockTransition::NoDetections);
        assert_eq!(outcome.target, None);
        assert_eq!(servo.last(), Some((RCS_CENTER_POS, RCS_CENTER_POS)));
    }

    #[test]
    fn test_signature_filter_changes_candidate() {
        let frames = vec![vec![
            Detection::new(1, 1, 10, 10, 4, 4, 100),
            Detection::new(2, 2, 200, 100, 4, 4, 100),
        ]];
        let config = TrackerConfig {
            signature_map: SignatureMap::signature(2),
            ..Default::default()
        };
        let detector = ScriptedDetector::new(320, 200, frames);
        let mut tracker = PanTiltTracker::new(detector, RecordingServo::new(), &config).unwrap();

        let outcome = tracker.step().unwrap();
        assert_eq!(outcome.detections, 1);
        assert_eq!(outcome.transition, LockTransition::Acquired { id: 2 });
    }

    #[test]
    fn test_max_detections_hides_locked_target() {
        let a = Detection::new(1, 1, 10, 10, 4, 4, 100);
        let b = Detection::new(2, 1, 20, 20, 4, 4, 100);
        let config = TrackerConfig {
            max_detections: Some(1),
            ..Default::default()
        };
        let detector = ScriptedDetector::new(320, 200, vec![vec![a, b], vec![b, a]]);
        let mut tracker = PanTiltTracker::new(detector, RecordingServo::new(), &config).unwrap();

        assert_eq!(
            tracker.step().unwrap().transition,
            LockTransition::Acquired { id: 1 }
        );
        // id 1 is cut off by the cap, so the lock moves to id 2
        assert_eq!(
            tracker.step().unwrap().transition,
            LockTransition::Reacquired {
                lost: 1,
                acquired: 2
            }
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = TrackerConfig::default();
        config.limits.position_min = 10;
        config.limits.position_max = 0;
        let detector = ScriptedDetector::new(320, 200, vec![]);
        assert!(PanTiltTracker::new(detector, RecordingServo::new(), &config).is_err());
    }

    #[test]
    fn test_offset_servo_range_rest_command_in_range() {
        let mut config = TrackerConfig::default();
        config.limits.position_min = 600;
        config.limits.position_max = 1000;
        let target = Detection::new(5, 1, 200, 100, 12, 12, 31);
        let servo = RecordingServo::new();
        let detector = ScriptedDetector::new(320, 200, vec![vec![], vec![target]]);
        let mut tracker = PanTiltTracker::new(detector, servo.clone(), &config).unwrap();

        tracker.run(Some(2)).unwrap();
        // No-target cycle and first-sample cycle both rest at the range midpoint
        assert_eq!(servo.commands(), vec![(800, 800), (800, 800)]);
    }

    #[test]
    fn test_velocity_axes_rest_at_zero() {
        let config = TrackerConfig {
            pan: crate::config::AxisConfig::velocity(PidGains::new(400, 0, 400)),
            tilt: crate::config::AxisConfig::velocity(PidGains::new(500, 0, 500)),
            ..Default::default()
        };
        let servo = RecordingServo::new();
        let detector = ScriptedDetector::new(320, 200, vec![vec![]]);
        let mut tracker = PanTiltTracker::new(detector, servo.clone(), &config).unwrap();
        tracker.step().unwrap();
        assert_eq!(servo.last(), Some((0, 0)));
    }

    #[test]
    fn test_run_stops_after_budget() {
        let (mut tracker, servo) = tracker(vec![]);
        let stats = tracker.run(Some(4)).unwrap();
        assert_eq!(stats.cycles, 4);
        assert_eq!(stats.tracked_cycles, 0);
        assert_eq!(servo.commands().len(), 4);

        let stats = tracker.run(Some(0)).unwrap();
        assert_eq!(stats.cycles, 4);
    }
}
