//! Error types for the tracker boundary and configuration.
//!
//! The control law itself never fails: "no detections", "target lost" and
//! "candidate too young" are ordinary lock transitions. The only errors are
//! failures of the external sensor/actuator calls and bad configuration
//! files, both of which propagate to the caller unchanged.

use thiserror::Error;

/// Failure reported by a detection source or servo transport.
///
/// The unit variants mirror the failure codes a vision sensor returns over
/// its packet link. Transports that have their own failure modes can use
/// [`DeviceError::Disconnected`] or wrap an I/O error.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Generic link failure (bitstream error, bad packet type).
    #[error("Device error")]
    Error,

    /// Sensor has no new frame yet and the caller asked not to wait.
    #[error("Device busy")]
    Busy,

    /// Packet checksum did not match its payload.
    #[error("Checksum error")]
    ChecksumError,

    /// No response within the transport timeout.
    #[error("Timeout waiting for device")]
    Timeout,

    /// The user is holding the sensor button and has taken over the servos.
    #[error("Button override active")]
    ButtonOverride,

    /// Transport is gone (cable pulled, script exhausted, peer closed).
    #[error("Device disconnected: {0}")]
    Disconnected(String),

    /// Low-level I/O error from the transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors loading or validating a [`TrackerConfig`](crate::TrackerConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
