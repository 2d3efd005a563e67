//! Closed-loop pan/tilt target tracking.
//!
//! Keeps a two-axis actuator aimed at a moving target reported by a vision
//! sensor. Each control cycle:
//!
//! - the [`LockManager`] decides which detection (if any) is being tracked,
//!   gating new locks on detection age and following a locked id across
//!   frames;
//! - one [`PidLoop`] per axis turns the target's pixel offset from frame
//!   center into an actuator command, with integral anti-windup, a
//!   first-sample guard and position-servo or velocity-motor shaping;
//! - the [`PanTiltTracker`] ties them together against a
//!   [`DetectionSource`] and a [`ServoTransport`].
//!
//! # Example
//!
//! ```
//! use pantilt::{Detection, PanTiltTracker, RecordingServo, ScriptedDetector, TrackerConfig};
//!
//! let target = Detection::new(5, 1, 200, 100, 12, 12, 31);
//! let detector = ScriptedDetector::new(320, 200, vec![vec![target], vec![target]]);
//! let servo = RecordingServo::new();
//!
//! let mut tracker = PanTiltTracker::new(detector, servo.clone(), &TrackerConfig::default())?;
//! tracker.run(Some(2))?;
//!
//! // First cycle holds the rest position, second applies the correction
//! assert_eq!(servo.commands(), vec![(500, 500), (484, 500)]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod callback;
pub mod config;
pub mod cycle;
pub mod detection;
pub mod error;
pub mod interface;
pub mod lock;
pub mod pid;
pub mod scripted;

pub use callback::{CallbackId, TrackerEvent};
pub use config::{AxisConfig, TrackerConfig};
pub use cycle::{CycleOutcome, PanTiltTracker, SessionStats};
pub use detection::{Detection, SignatureMap};
pub use error::{ConfigError, DeviceError, DeviceResult};
pub use interface::{DetectionSource, ServoTransport};
pub use lock::{LockManager, LockTransition, Selection, TrackState, MINIMUM_BLOCK_AGE_TO_LOCK};
pub use pid::{DeviceKind, PidGains, PidLimits, PidLoop};
pub use scripted::{RecordingServo, ScriptedDetector};
