//! Pan/tilt harness for testing and simulation
//!
//! Provides a simulated camera and servo pair that close the loop around a
//! moving target, motion presets to drive it, and a CSV recorder for
//! per-cycle tracker output.

pub mod motion;
pub mod recorder;
pub mod scene;

pub use motion::{TargetMotion, TestMotions};
pub use recorder::{CycleRecord, CycleRecorder};
pub use scene::{simulated_rig, SceneConfig, SimScene, SimulatedCamera, SimulatedServos};
