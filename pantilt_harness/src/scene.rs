//! Simulated pan/tilt rig.
//!
//! A [`SimScene`] holds a moving target, a two-axis mount and a camera
//! riding on it. [`SimulatedCamera`] and [`SimulatedServos`] share the scene
//! so the tracker can close the loop exactly as it would on hardware:
//!
//! ```text
//!  image_x = cx + target_x + gain * (pan  - pan_rest)
//!  image_y = cy + target_y - gain * (tilt - tilt_rest)
//! ```
//!
//! Raising the pan command moves the target right in the image, raising
//! tilt moves it up, which matches the error signs the tracker uses.
//!
//! Detection ids and ages follow sensor conventions: the target gets a new
//! id each time it comes into view, ages count consecutive frames and
//! saturate at 255, and the list is sorted largest-area first.

use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use pantilt::pid::PidLimits;
use pantilt::{Detection, DetectionSource, DeviceError, DeviceKind, DeviceResult, ServoTransport};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::motion::TargetMotion;

/// Highest age value the sensor reports.
const MAX_AGE: u32 = 255;
/// Sensor ids are a single byte.
const MAX_ID: u32 = 255;

/// Physical parameters of the simulated rig.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Seconds between frames
    pub frame_interval_s: f64,
    /// Image shift in pixels per servo count
    pub pixels_per_count: f64,
    /// Fraction of the remaining distance a position servo covers per frame
    pub servo_response: f64,
    /// Servo counts moved per frame per unit of velocity command
    pub velocity_scale: f64,
    pub pan_device: DeviceKind,
    pub tilt_device: DeviceKind,
    /// Servo travel, shared with the tracker
    pub limits: PidLimits,
    /// Probability per frame of a short-lived distractor blob appearing
    pub distractor_rate: f64,
    /// Side length of the target's bounding box in pixels
    pub target_size: u16,
    pub seed: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            width: 316,
            height: 208,
            frame_interval_s: 1.0 / 60.0,
            pixels_per_count: 0.5,
            servo_response: 0.6,
            velocity_scale: 0.1,
            pan_device: DeviceKind::Position,
            tilt_device: DeviceKind::Position,
            limits: PidLimits::default(),
            distractor_rate: 0.0,
            target_size: 24,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct Blob {
    id: u32,
    age: u32,
    x: f64,
    y: f64,
    size: u16,
    frames_left: u32,
}

/// Ground truth and dynamics for the simulated rig.
pub struct SimScene {
    config: SceneConfig,
    motion: Box<dyn TargetMotion>,
    rng: ChaCha8Rng,

    time_s: f64,
    frame: u64,

    pan_position: f64,
    tilt_position: f64,
    pan_command: i32,
    tilt_command: i32,

    target: Option<Blob>,
    distractors: Vec<Blob>,
    next_id: u32,
    commands_received: u64,
}

impl SimScene {
    pub fn new(config: SceneConfig, motion: Box<dyn TargetMotion>) -> Self {
        let rest = config.limits.center_position();
        let rest_command = |kind: DeviceKind| match kind {
            DeviceKind::Position => rest,
            DeviceKind::Velocity => 0,
        };
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            pan_position: f64::from(rest),
            tilt_position: f64::from(rest),
            pan_command: rest_command(config.pan_device),
            tilt_command: rest_command(config.tilt_device),
            motion,
            config,
            time_s: 0.0,
            frame: 0,
            target: None,
            distractors: Vec::new(),
            next_id: 0,
            commands_received: 0,
        }
    }

    /// Current mount position `(pan, tilt)` in servo counts.
    pub fn mount_position(&self) -> (f64, f64) {
        (self.pan_position, self.tilt_position)
    }

    pub fn commands_received(&self) -> u64 {
        self.commands_received
    }

    /// True pixel offset of the target from frame center, if it is in view.
    pub fn target_offset(&self) -> Option<(f64, f64)> {
        let (cx, cy) = self.center();
        self.target.as_ref().map(|t| (t.x - cx, t.y - cy))
    }

    /// Accept a command pair from the tracker.
    pub fn command(&mut self, pan: i32, tilt: i32) {
        self.pan_command = pan;
        self.tilt_command = tilt;
        self.commands_received += 1;
    }

    /// Advance one frame and report what the camera sees.
    pub fn capture(&mut self) -> Vec<Detection> {
        self.frame += 1;
        self.time_s += self.config.frame_interval_s;

        self.pan_position =
            self.step_axis(self.pan_position, self.pan_command, self.config.pan_device);
        self.tilt_position =
            self.step_axis(self.tilt_position, self.tilt_command, self.config.tilt_device);

        self.update_target();
        self.update_distractors();

        let mut detections: Vec<Detection> = self
            .target
            .iter()
            .chain(self.distractors.iter())
            .map(|blob| self.to_detection(blob))
            .collect();
        // Largest blobs first, like the sensor
        detections.sort_by_key(|d| std::cmp::Reverse(u32::from(d.width) * u32::from(d.height)));
        debug!("Frame {}: {} detections", self.frame, detections.len());
        detections
    }

    fn step_axis(&self, position: f64, command: i32, kind: DeviceKind) -> f64 {
        let limits = &self.config.limits;
        let next = match kind {
            DeviceKind::Position => {
                position + (f64::from(command) - position) * self.config.servo_response
            }
            DeviceKind::Velocity => position + f64::from(command) * self.config.velocity_scale,
        };
        next.clamp(
            f64::from(limits.position_min.min(limits.position_max)),
            f64::from(limits.position_max.max(limits.position_min)),
        )
    }

    fn center(&self) -> (f64, f64) {
        (
            f64::from(self.config.width) / 2.0,
            f64::from(self.config.height) / 2.0,
        )
    }

    fn in_frame(&self, x: f64, y: f64) -> bool {
        x >= 0.0
            && y >= 0.0
            && x < f64::from(self.config.width)
            && y < f64::from(self.config.height)
    }

    /// Next free id, skipping any still held by a blob in view.
    fn allocate_id(&mut self) -> u32 {
        let in_use = |id: u32, scene: &Self| {
            scene
                .target
                .iter()
                .chain(scene.distractors.iter())
                .any(|blob| blob.id == id)
        };
        let mut id = self.next_id;
        for _ in 0..=MAX_ID {
            if !in_use(id, self) {
                break;
            }
            id = (id + 1) % (MAX_ID + 1);
        }
        self.next_id = (id + 1) % (MAX_ID + 1);
        id
    }

    fn update_target(&mut self) {
        let t = self.time_s;
        let (tx, ty) = self.motion.position(t);
        let visible = self.motion.visible(t);

        let (cx, cy) = self.center();
        let rest = f64::from(self.config.limits.center_position());
        let gain = self.config.pixels_per_count;
        let x = cx + tx + gain * (self.pan_position - rest);
        let y = cy + ty - gain * (self.tilt_position - rest);

        if !visible || !self.in_frame(x, y) {
            if let Some(lost) = self.target.take() {
                debug!("Target {} left the frame", lost.id);
            }
            return;
        }

        match self.target.as_mut() {
            Some(blob) => {
                blob.x = x;
                blob.y = y;
                blob.age = (blob.age + 1).min(MAX_AGE);
            }
            None => {
                let id = self.allocate_id();
                self.target = Some(Blob {
                    id,
                    age: 0,
                    x,
                    y,
                    size: self.config.target_size,
                    frames_left: u32::MAX,
                });
            }
        }
    }

    fn update_distractors(&mut self) {
        for blob in &mut self.distractors {
            blob.frames_left = blob.frames_left.saturating_sub(1);
            blob.age = (blob.age + 1).min(MAX_AGE);
        }
        self.distractors.retain(|b| b.frames_left > 0);

        let rate = self.config.distractor_rate.clamp(0.0, 1.0);
        if rate > 0.0 && self.rng.random_bool(rate) {
            let x = self.rng.random_range(0.0..f64::from(self.config.width));
            let y = self.rng.random_range(0.0..f64::from(self.config.height));
            let size = self.rng.random_range(2..=self.config.target_size.saturating_mul(2).max(3));
            let frames_left = self.rng.random_range(1..=10);
            let id = self.allocate_id();
            self.distractors.push(Blob {
                id,
                age: 0,
                x,
                y,
                size,
                frames_left,
            });
        }
    }

    fn to_detection(&self, blob: &Blob) -> Detection {
        let max_x = self.config.width.saturating_sub(1).min(u32::from(u16::MAX));
        let max_y = self.config.height.saturating_sub(1).min(u32::from(u16::MAX));
        Detection::new(
            blob.id,
            1,
            blob.x.round().clamp(0.0, f64::from(max_x)) as u16,
            blob.y.round().clamp(0.0, f64::from(max_y)) as u16,
            blob.size,
            blob.size,
            blob.age,
        )
    }
}

fn lock_scene(scene: &Mutex<SimScene>) -> DeviceResult<MutexGuard<'_, SimScene>> {
    scene
        .lock()
        .map_err(|_| DeviceError::Disconnected("simulated scene poisoned".to_string()))
}

/// Camera half of the simulated rig.
#[derive(Clone)]
pub struct SimulatedCamera {
    scene: Arc<Mutex<SimScene>>,
    width: u32,
    height: u32,
}

impl DetectionSource for SimulatedCamera {
    fn poll_detections(&mut self) -> DeviceResult<Vec<Detection>> {
        Ok(lock_scene(&self.scene)?.capture())
    }

    fn frame_width(&self) -> u32 {
        self.width
    }

    fn frame_height(&self) -> u32 {
        self.height
    }
}

/// Servo half of the simulated rig.
#[derive(Clone)]
pub struct SimulatedServos {
    scene: Arc<Mutex<SimScene>>,
}

impl ServoTransport for SimulatedServos {
    fn send_servo_command(&mut self, pan: i32, tilt: i32) -> DeviceResult<()> {
        lock_scene(&self.scene)?.command(pan, tilt);
        Ok(())
    }
}

/// Build a simulated rig.
///
/// Returns the camera, the servos, and a shared handle to the scene for
/// reading ground truth.
pub fn simulated_rig(
    config: SceneConfig,
    motion: Box<dyn TargetMotion>,
) -> (SimulatedCamera, SimulatedServos, Arc<Mutex<SimScene>>) {
    let width = config.width;
    let height = config.height;
    let scene = Arc::new(Mutex::new(SimScene::new(config, motion)));
    let camera = SimulatedCamera {
        scene: scene.clone(),
        width,
        height,
    };
    let servos = SimulatedServos {
        scene: scene.clone(),
    };
    (camera, servos, scene)
}
