//! Target motion profiles for the simulated scene.
//!
//! Positions are in scene pixels, relative to where the camera looks when
//! both servos sit at their rest position.

use std::f64::consts::TAU;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Target trajectory over time.
pub trait TargetMotion: Send {
    /// Target position `(x, y)` at `t` seconds.
    fn position(&mut self, t: f64) -> (f64, f64);

    /// Whether the target is physically present at `t` seconds.
    fn visible(&self, _t: f64) -> bool {
        true
    }

    fn name(&self) -> &str;
}

/// Target that never moves.
#[derive(Debug, Clone)]
pub struct Stationary {
    pub x: f64,
    pub y: f64,
}

impl Stationary {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl TargetMotion for Stationary {
    fn position(&mut self, _t: f64) -> (f64, f64) {
        (self.x, self.y)
    }

    fn name(&self) -> &str {
        "stationary"
    }
}

/// Independent sinusoidal oscillation on each axis.
#[derive(Debug, Clone)]
pub struct Sinusoid {
    pub amplitude_x: f64,
    pub amplitude_y: f64,
    pub period_s: f64,
}

impl TargetMotion for Sinusoid {
    fn position(&mut self, t: f64) -> (f64, f64) {
        let phase = TAU * t / self.period_s;
        (self.amplitude_x * phase.sin(), self.amplitude_y * phase.sin())
    }

    fn name(&self) -> &str {
        "sinusoid"
    }
}

/// Constant-rate circle around the rest pointing.
#[derive(Debug, Clone)]
pub struct Circular {
    pub radius: f64,
    pub period_s: f64,
}

impl TargetMotion for Circular {
    fn position(&mut self, t: f64) -> (f64, f64) {
        let phase = TAU * t / self.period_s;
        (self.radius * phase.cos(), self.radius * phase.sin())
    }

    fn name(&self) -> &str {
        "circular"
    }
}

/// Bounded random walk with a reproducible seed.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    step: f64,
    bound: f64,
    x: f64,
    y: f64,
    rng: ChaCha8Rng,
}

impl RandomWalk {
    /// # Arguments
    /// * `step` - Maximum displacement per call, in pixels
    /// * `bound` - Walk is clamped to `[-bound, bound]` on both axes
    /// * `seed` - RNG seed
    pub fn new(step: f64, bound: f64, seed: u64) -> Self {
        Self {
            step,
            bound,
            x: 0.0,
            y: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl TargetMotion for RandomWalk {
    fn position(&mut self, _t: f64) -> (f64, f64) {
        if self.step > 0.0 {
            self.x += self.rng.random_range(-self.step..self.step);
            self.y += self.rng.random_range(-self.step..self.step);
        }
        self.x = self.x.clamp(-self.bound, self.bound);
        self.y = self.y.clamp(-self.bound, self.bound);
        (self.x, self.y)
    }

    fn name(&self) -> &str {
        "random_walk"
    }
}

/// Wraps another motion and periodically removes the target from the scene.
pub struct Blink {
    inner: Box<dyn TargetMotion>,
    visible_s: f64,
    hidden_s: f64,
}

impl Blink {
    pub fn new(inner: Box<dyn TargetMotion>, visible_s: f64, hidden_s: f64) -> Self {
        Self {
            inner,
            visible_s,
            hidden_s,
        }
    }
}

impl TargetMotion for Blink {
    fn position(&mut self, t: f64) -> (f64, f64) {
        self.inner.position(t)
    }

    fn visible(&self, t: f64) -> bool {
        let period = self.visible_s + self.hidden_s;
        if period <= 0.0 {
            return true;
        }
        t.rem_euclid(period) < self.visible_s && self.inner.visible(t)
    }

    fn name(&self) -> &str {
        "blink"
    }
}

/// Named motion presets used by the demo binary.
pub struct TestMotions;

impl TestMotions {
    /// Names accepted by [`TestMotions::by_name`].
    pub const NAMES: [&'static str; 6] = [
        "stationary",
        "sine_pan",
        "sine_tilt",
        "circular",
        "random_walk",
        "blink",
    ];

    /// Build a preset.
    ///
    /// `amplitude` is the peak excursion in pixels; `seed` only affects
    /// random presets. Returns `None` for unknown names.
    pub fn by_name(name: &str, amplitude: f64, seed: u64) -> Option<Box<dyn TargetMotion>> {
        let motion: Box<dyn TargetMotion> = match name {
            "stationary" => Box::new(Stationary::new(amplitude, amplitude / 2.0)),
            "sine_pan" => Box::new(Sinusoid {
                amplitude_x: amplitude,
                amplitude_y: 0.0,
                period_s: 4.0,
            }),
            "sine_tilt" => Box::new(Sinusoid {
                amplitude_x: 0.0,
                amplitude_y: amplitude,
                period_s: 4.0,
            }),
            "circular" => Box::new(Circular {
                radius: amplitude,
                period_s: 6.0,
            }),
            "random_walk" => Box::new(RandomWalk::new(amplitude / 20.0, amplitude, seed)),
            "blink" => Box::new(Blink::new(
                Box::new(Circular {
                    radius: amplitude,
                    period_s: 6.0,
                }),
                3.0,
                1.0,
            )),
            _ => return None,
        };
        Some(motion)
    }
}
