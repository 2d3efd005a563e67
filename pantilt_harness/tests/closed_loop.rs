//! Closed-loop tracking against the simulated rig.

use std::sync::{Arc, Mutex};

use pantilt::{
    AxisConfig, DeviceKind, PanTiltTracker, TrackState, TrackerConfig, MINIMUM_BLOCK_AGE_TO_LOCK,
};
use pantilt_harness::motion::{Blink, Circular, Stationary, TargetMotion};
use pantilt_harness::{simulated_rig, CycleRecorder, SceneConfig, SimScene};

fn offset(scene: &Arc<Mutex<SimScene>>) -> Option<(f64, f64)> {
    scene.lock().unwrap().target_offset()
}

fn rig(
    config: &TrackerConfig,
    scene_config: SceneConfig,
    motion: Box<dyn TargetMotion>,
) -> (
    PanTiltTracker<pantilt_harness::SimulatedCamera, pantilt_harness::SimulatedServos>,
    Arc<Mutex<SimScene>>,
) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (camera, servos, scene) = simulated_rig(scene_config, motion);
    let tracker = PanTiltTracker::new(camera, servos, config).unwrap();
    (tracker, scene)
}

#[test]
fn test_stationary_target_is_centered() {
    let config = TrackerConfig::default();
    let (mut tracker, scene) = rig(
        &config,
        SceneConfig::default(),
        Box::new(Stationary::new(50.0, 25.0)),
    );

    // Nothing moves until the detection is old enough to lock
    tracker
        .run(Some(u64::from(MINIMUM_BLOCK_AGE_TO_LOCK)))
        .unwrap();
    assert_eq!(tracker.track_state(), TrackState::Unlocked);
    assert_eq!(offset(&scene), Some((50.0, 25.0)));

    tracker.run(Some(300)).unwrap();
    assert!(tracker.track_state().is_locked());

    let (dx, dy) = offset(&scene).expect("target stays in view");
    assert!(dx.abs() <= 4.0, "pan residual {dx}");
    assert!(dy.abs() <= 4.0, "tilt residual {dy}");

    let stats = tracker.stats();
    assert_eq!(stats.acquisitions, 1);
    assert_eq!(stats.losses, 0);
}

#[test]
fn test_velocity_axes_center_target() {
    let config = TrackerConfig {
        pan: AxisConfig::velocity(TrackerConfig::default().pan.gains),
        tilt: AxisConfig::velocity(TrackerConfig::default().tilt.gains),
        ..Default::default()
    };
    let scene_config = SceneConfig {
        pan_device: DeviceKind::Velocity,
        tilt_device: DeviceKind::Velocity,
        ..Default::default()
    };
    let (mut tracker, scene) = rig(&config, scene_config, Box::new(Stationary::new(50.0, 25.0)));

    tracker.run(Some(400)).unwrap();

    let (dx, dy) = offset(&scene).expect("target stays in view");
    assert!(dx.abs() <= 4.0, "pan residual {dx}");
    assert!(dy.abs() <= 4.0, "tilt residual {dy}");
    // Inside the deadband both motors stop
    assert_eq!(tracker.pan_loop().command(), 0);
    assert_eq!(tracker.tilt_loop().command(), 0);
}

#[test]
fn test_blinking_target_is_reacquired() {
    let motion = Blink::new(
        Box::new(Circular {
            radius: 30.0,
            period_s: 6.0,
        }),
        3.0,
        1.0,
    );
    let (mut tracker, _scene) = rig(
        &TrackerConfig::default(),
        SceneConfig::default(),
        Box::new(motion),
    );

    let stats = tracker.run(Some(600)).unwrap();
    assert!(stats.acquisitions >= 2, "{stats:?}");
    assert!(stats.losses >= 1, "{stats:?}");
    assert!(stats.tracked_cycles < stats.cycles);
}

#[test]
fn test_distractors_never_steal_lock() {
    let scene_config = SceneConfig {
        distractor_rate: 0.2,
        seed: 11,
        ..Default::default()
    };
    let (mut tracker, scene) = rig(
        &TrackerConfig::default(),
        scene_config,
        Box::new(Stationary::new(-30.0, 20.0)),
    );

    let ids = Arc::new(Mutex::new(Vec::new()));
    let ids_clone = ids.clone();
    tracker.register_callback(move |event| {
        if let pantilt::TrackerEvent::LockAcquired { id, .. } = event {
            ids_clone.lock().unwrap().push(*id);
        }
    });

    let stats = tracker.run(Some(600)).unwrap();
    assert_eq!(stats.acquisitions, 1, "{stats:?}");
    assert_eq!(stats.losses, 0);
    // The target was the first blob the scene ever spawned
    assert_eq!(*ids.lock().unwrap(), vec![0]);
    assert!(offset(&scene).is_some());
}

#[test]
fn test_recorder_captures_every_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cycles.csv");

    let (mut tracker, _scene) = rig(
        &TrackerConfig::default(),
        SceneConfig::default(),
        Box::new(Stationary::new(10.0, 10.0)),
    );
    let mut recorder = CycleRecorder::create(&path).unwrap();
    for _ in 0..50 {
        let outcome = tracker.step().unwrap();
        recorder.record(&outcome).unwrap();
    }
    recorder.flush().unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 50);
    assert_eq!(&rows[0][2], "searching");
    assert_eq!(&rows[31][2], "acquired");
    assert_eq!(&rows[49][2], "held");
}
