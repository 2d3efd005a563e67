//! Fixed-point PID loop for a single actuator axis.
//!
//! The loop works entirely in integers. Gains are scaled so that small
//! integer values are useful: the integral contribution is divided by 16 and
//! the summed PID term by 1024, both with arithmetic (sign-preserving)
//! shifts.
//!
//! ```text
//! integral = clamp(integral + e, integral_min, integral_max)
//! pid      = (e*Kp + ((integral*Ki) >> 4) + (e - e_prev)*Kd) >> 10
//! ```
//!
//! How `pid` becomes a command depends on the actuator:
//!
//! - [`DeviceKind::Position`]: a servo holds absolute position, so the PID
//!   term is a correction added to the previous command, then clamped to the
//!   servo range.
//! - [`DeviceKind::Velocity`]: a motor is driven by a rate, so the PID term
//!   is the command itself, pushed away from zero by the deadband so small
//!   corrections still overcome static friction.
//!
//! The first update after [`PidLoop::reset`] only records the error. With no
//! previous sample the derivative is undefined, so no command is produced
//! until the second update.

use serde::{Deserialize, Serialize};

/// Default integral accumulator bound (symmetric).
pub const PID_MAX_INTEGRAL: i32 = 2000;
/// Minimum servo position.
pub const RCS_MIN_POS: i32 = 0;
/// Maximum servo position.
pub const RCS_MAX_POS: i32 = 1000;
/// Servo rest position.
pub const RCS_CENTER_POS: i32 = (RCS_MAX_POS - RCS_MIN_POS) / 2;
/// Offset added to non-zero velocity commands.
pub const BASE_DEADBAND: i32 = 20;

const INTEGRAL_SHIFT: u32 = 4;
const PID_SHIFT: u32 = 10;

/// Kind of actuator driven by a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Absolute-position servo; command is integrated and range-limited.
    #[default]
    Position,
    /// Rate-driven motor; command is recomputed each cycle with deadband.
    Velocity,
}

/// Integer loop gains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidGains {
    pub proportional: i32,
    pub integral: i32,
    pub derivative: i32,
}

impl PidGains {
    pub fn new(proportional: i32, integral: i32, derivative: i32) -> Self {
        Self {
            proportional,
            integral,
            derivative,
        }
    }
}

/// Bounds applied inside the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidLimits {
    pub integral_min: i32,
    pub integral_max: i32,
    /// Lowest command for position devices
    pub position_min: i32,
    /// Highest command for position devices
    pub position_max: i32,
    /// Magnitude added to non-zero velocity commands
    pub deadband: i32,
}

impl PidLimits {
    /// Rest command for position devices: the midpoint of the servo range.
    pub fn center_position(&self) -> i32 {
        let min = i64::from(self.position_min);
        let span = i64::from(self.position_max) - min;
        saturate(min + span / 2)
    }
}

impl Default for PidLimits {
    fn default() -> Self {
        Self {
            integral_min: -PID_MAX_INTEGRAL,
            integral_max: PID_MAX_INTEGRAL,
            position_min: RCS_MIN_POS,
            position_max: RCS_MAX_POS,
            deadband: BASE_DEADBAND,
        }
    }
}

/// PID loop state for one axis.
#[derive(Debug, Clone)]
pub struct PidLoop {
    gains: PidGains,
    kind: DeviceKind,
    limits: PidLimits,

    command: i32,
    integral: i32,
    previous_error: Option<i32>,
}

impl PidLoop {
    /// Create a loop in its reset state.
    pub fn new(gains: PidGains, kind: DeviceKind, limits: PidLimits) -> Self {
        let mut pid = Self {
            gains,
            kind,
            limits,
            command: 0,
            integral: 0,
            previous_error: None,
        };
        pid.reset();
        pid
    }

    /// Servo loop with default limits.
    pub fn position(gains: PidGains) -> Self {
        Self::new(gains, DeviceKind::Position, PidLimits::default())
    }

    /// Motor loop with default limits.
    pub fn velocity(gains: PidGains) -> Self {
        Self::new(gains, DeviceKind::Velocity, PidLimits::default())
    }

    /// Forget all history and return the command to rest.
    pub fn reset(&mut self) {
        self.command = self.rest_command();
        self.integral = 0;
        self.previous_error = None;
    }

    /// Feed one error sample and return the resulting command.
    pub fn update(&mut self, error: i32) -> i32 {
        if let Some(previous) = self.previous_error {
            self.integral = bound(
                i64::from(self.integral) + i64::from(error),
                self.limits.integral_min,
                self.limits.integral_max,
            );

            let pid = self.pid_term(error, previous);

            self.command = match self.kind {
                DeviceKind::Position => bound(
                    i64::from(self.command).saturating_add(pid),
                    self.limits.position_min,
                    self.limits.position_max,
                ),
                DeviceKind::Velocity => {
                    let deadband = i64::from(self.limits.deadband);
                    let shaped = match pid {
                        p if p > 0 => p + deadband,
                        p if p < 0 => p - deadband,
                        _ => 0,
                    };
                    saturate(shaped)
                }
            };
        }

        self.previous_error = Some(error);
        self.command
    }

    /// Raw PID term before device shaping.
    fn pid_term(&self, error: i32, previous: i32) -> i64 {
        let error = i64::from(error);
        let proportional = error.saturating_mul(i64::from(self.gains.proportional));
        let integral = i64::from(self.integral).saturating_mul(i64::from(self.gains.integral))
            >> INTEGRAL_SHIFT;
        let derivative = (error - i64::from(previous))
            .saturating_mul(i64::from(self.gains.derivative));
        proportional
            .saturating_add(integral)
            .saturating_add(derivative)
            >> PID_SHIFT
    }

    fn rest_command(&self) -> i32 {
        match self.kind {
            DeviceKind::Position => self.limits.center_position(),
            DeviceKind::Velocity => 0,
        }
    }

    pub fn command(&self) -> i32 {
        self.command
    }

    pub fn integral(&self) -> i32 {
        self.integral
    }

    /// Error from the last update, `None` until the first sample after a reset.
    pub fn previous_error(&self) -> Option<i32> {
        self.previous_error
    }
}

/// Clamp into `[min, max]` and narrow to i32. Never panics on inverted bounds.
fn bound(value: i64, min: i32, max: i32) -> i32 {
    saturate(value.max(i64::from(min)).min(i64::from(max)))
}

fn saturate(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pan_loop() -> PidLoop {
        PidLoop::position(PidGains::new(400, 0, 400))
    }

    #[test]
    fn test_reset_state() {
        let pid = pan_loop();
        assert_eq!(pid.command(), RCS_CENTER_POS);
        assert_eq!(pid.integral(), 0);
        assert_eq!(pid.previous_error(), None);

        let vel = PidLoop::velocity(PidGains::new(400, 0, 400));
        assert_eq!(vel.command(), 0);
    }

    #[test]
    fn test_first_sample_only_records_error() {
        for error in [-500, -1, 0, 1, 160, i32::MAX, i32::MIN] {
            let mut pid = pan_loop();
            assert_eq!(pid.update(error), RCS_CENTER_POS);
            assert_eq!(pid.previous_error(), Some(error));
            assert_eq!(pid.integral(), 0);
        }
    }

    #[test]
    fn test_second_sample_applies_formula() {
        let mut pid = pan_loop();
        pid.update(-40);
        // (-40*400 + 0 + 0*400) >> 10 = -16000 >> 10 = -16 (floor)
        assert_eq!(pid.update(-40), RCS_CENTER_POS - 16);
        assert_eq!(pid.integral(), -40);

        // derivative term: (-100*400 + (-100 - -40)*400) >> 10 = -64000 >> 10 = -63
        assert_eq!(pid.update(-100), RCS_CENTER_POS - 16 - 63);
        assert_eq!(pid.integral(), -140);
    }

    #[test]
    fn test_arithmetic_shift_rounds_toward_negative_infinity() {
        let mut pid = PidLoop::position(PidGains::new(1, 0, 0));
        pid.update(-1);
        // -1 >> 10 == -1, not 0
        assert_eq!(pid.update(-1), RCS_CENTER_POS - 1);

        let mut pid = PidLoop::position(PidGains::new(1, 0, 0));
        pid.update(1);
        assert_eq!(pid.update(1), RCS_CENTER_POS);
    }

    #[test]
    fn test_integral_term_is_scaled() {
        let mut pid = PidLoop::position(PidGains::new(0, 1024, 0));
        pid.update(16);
        // integral = 16, (16*1024)>>4 = 1024, 1024>>10 = 1
        assert_eq!(pid.update(16), RCS_CENTER_POS + 1);
    }

    #[test]
    fn test_integral_clamps_at_bounds() {
        let mut pid = PidLoop::position(PidGains::new(0, 0, 0));
        pid.update(700);
        for _ in 0..20 {
            pid.update(700);
            assert!(pid.integral() <= PID_MAX_INTEGRAL);
        }
        assert_eq!(pid.integral(), PID_MAX_INTEGRAL);

        for _ in 0..20 {
            pid.update(-900);
        }
        assert_eq!(pid.integral(), -PID_MAX_INTEGRAL);
    }

    #[test]
    fn test_position_command_clamps() {
        let mut pid = pan_loop();
        pid.update(5000);
        for _ in 0..10 {
            pid.update(5000);
        }
        assert_eq!(pid.command(), RCS_MAX_POS);
        pid.update(5000);
        assert_eq!(pid.command(), RCS_MAX_POS);

        for _ in 0..10 {
            pid.update(-5000);
        }
        assert_eq!(pid.command(), RCS_MIN_POS);
    }

    #[test]
    fn test_velocity_deadband() {
        // Gain of 1024 makes pid == error when the error is steady
        let mut pid = PidLoop::velocity(PidGains::new(1024, 0, 0));
        pid.update(0);

        assert_eq!(pid.update(7), 7 + BASE_DEADBAND);
        assert_eq!(pid.update(-7), -7 - BASE_DEADBAND);
        assert_eq!(pid.update(0), 0);
    }

    #[test]
    fn test_velocity_is_not_integrated() {
        let mut pid = PidLoop::velocity(PidGains::new(1024, 0, 0));
        pid.update(10);
        assert_eq!(pid.update(10), 30);
        assert_eq!(pid.update(10), 30);
        assert_eq!(pid.update(10), 30);
    }

    #[test]
    fn test_zero_gains_is_noop() {
        let mut pid = PidLoop::position(PidGains::new(0, 0, 0));
        for error in [100, -100, 3000] {
            assert_eq!(pid.update(error), RCS_CENTER_POS);
        }

        let mut vel = PidLoop::velocity(PidGains::new(0, 0, 0));
        for error in [100, -100] {
            assert_eq!(vel.update(error), 0);
        }
    }

    #[test]
    fn test_reset_after_updates() {
        let mut pid = pan_loop();
        pid.update(100);
        pid.update(120);
        assert_ne!(pid.command(), RCS_CENTER_POS);

        pid.reset();
        assert_eq!(pid.command(), RCS_CENTER_POS);
        assert_eq!(pid.integral(), 0);
        assert_eq!(pid.previous_error(), None);
        assert_eq!(pid.update(999), RCS_CENTER_POS);
    }

    #[test]
    fn test_extreme_errors_saturate() {
        let mut pid = PidLoop::velocity(PidGains::new(i32::MAX, i32::MAX, i32::MAX));
        pid.update(i32::MIN);
        assert_eq!(pid.update(i32::MAX), i32::MAX);

        let mut pid = PidLoop::new(
            PidGains::new(i32::MAX, 0, 0),
            DeviceKind::Position,
            PidLimits::default(),
        );
        pid.update(i32::MAX);
        assert_eq!(pid.update(i32::MAX), RCS_MAX_POS);
    }

    #[test]
    fn test_inverted_limits_do_not_panic() {
        let limits = PidLimits {
            integral_min: 10,
            integral_max: -10,
            position_min: 800,
            position_max: 200,
            deadband: 0,
        };
        let mut pid = PidLoop::new(PidGains::new(400, 10, 400), DeviceKind::Position, limits);
        pid.update(50);
        pid.update(50);
        assert_eq!(pid.integral(), -10);
        assert_eq!(pid.command(), 200);
    }

    #[test]
    fn test_center_position() {
        assert_eq!(PidLimits::default().center_position(), 500);
        let limits = PidLimits {
            position_min: 100,
            position_max: 900,
            ..Default::default()
        };
        assert_eq!(limits.center_position(), 500);
    }

    #[test]
    fn test_offset_range_rests_inside_limits() {
        let limits = PidLimits {
            position_min: 600,
            position_max: 1000,
            ..Default::default()
        };
        assert_eq!(limits.center_position(), 800);

        let mut pid = PidLoop::new(PidGains::new(400, 0, 400), DeviceKind::Position, limits);
        assert_eq!(pid.command(), 800);
        assert_eq!(pid.update(-40), 800);
        for _ in 0..100 {
            let command = pid.update(-400);
            assert!((600..=1000).contains(&command), "command {command}");
        }
        assert_eq!(pid.command(), 600);
    }
}
