//! Sensor and actuator interfaces.
//!
//! Abstracts the vision sensor and the servo link so the tracker can run
//! against real hardware, a simulation, or a scripted replay.

use crate::detection::Detection;
use crate::error::DeviceResult;

/// Source of per-frame detections.
pub trait DetectionSource {
    /// Block until the next frame's detections are available.
    ///
    /// Returns an empty list when nothing was detected this frame. The
    /// order is whatever the sensor reports; it is not re-sorted.
    fn poll_detections(&mut self) -> DeviceResult<Vec<Detection>>;

    /// Frame width in pixels
    fn frame_width(&self) -> u32;

    /// Frame height in pixels
    fn frame_height(&self) -> u32;
}

/// Two-axis actuator link.
pub trait ServoTransport {
    /// Send both axis commands at once.
    ///
    /// Fire-and-forget; no acknowledgement beyond transport success.
    ///
    /// # Arguments
    /// * `pan` - Pan axis command (position or velocity, per loop config)
    /// * `tilt` - Tilt axis command
    fn send_servo_command(&mut self, pan: i32, tilt: i32) -> DeviceResult<()>;
}

impl<T: DetectionSource + ?Sized> DetectionSource for &mut T {
    fn poll_detections(&mut self) -> DeviceResult<Vec<Detection>> {
        (**self).poll_detections()
    }

    fn frame_width(&self) -> u32 {
        (**self).frame_width()
    }

    fn frame_height(&self) -> u32 {
        (**self).frame_height()
    }
}

impl<T: DetectionSource + ?Sized> DetectionSource for Box<T> {
    fn poll_detections(&mut self) -> DeviceResult<Vec<Detection>> {
        (**self).poll_detections()
    }

    fn frame_width(&self) -> u32 {
        (**self).frame_width()
    }

    fn frame_height(&self) -> u32 {
        (**self).frame_height()
    }
}

impl<T: ServoTransport + ?Sized> ServoTransport for &mut T {
    fn send_servo_command(&mut self, pan: i32, tilt: i32) -> DeviceResult<()> {
        (**self).send_servo_command(pan, tilt)
    }
}

impl<T: ServoTransport + ?Sized> ServoTransport for Box<T> {
    fn send_servo_command(&mut self, pan: i32, tilt: i32) -> DeviceResult<()> {
        (**self).send_servo_command(pan, tilt)
    }
}
