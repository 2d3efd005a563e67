use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, warn};
use pantilt::{AxisConfig, PanTiltTracker, TrackerConfig, TrackerEvent};
use pantilt_harness::{simulated_rig, CycleRecorder, SceneConfig, TestMotions};

/// Command line arguments for tracking demo
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Pan/tilt tracking demonstration against a simulated rig",
    long_about = "Runs the pan/tilt tracker in closed loop against a simulated camera \
        and servo pair. The target follows one of the motion presets; the tracker \
        locks on once the detection is old enough and drives it toward frame center.\n\n\
        A per-cycle CSV can be written with --output for offline analysis."
)]
struct Args {
    #[arg(
        short,
        long,
        default_value = "sine_pan",
        help = "Motion pattern type",
        long_help = "Type of target motion to simulate. Available patterns:\n  \
            - stationary: Fixed offset from the rest pointing\n  \
            - sine_pan: Sinusoidal oscillation along the pan axis\n  \
            - sine_tilt: Sinusoidal oscillation along the tilt axis\n  \
            - circular: Circle around the rest pointing\n  \
            - random_walk: Bounded random walk\n  \
            - blink: Circular motion that periodically leaves the scene"
    )]
    motion: String,

    #[arg(
        short = 'a',
        long,
        default_value_t = 40.0,
        help = "Motion amplitude in pixels"
    )]
    amplitude: f64,

    #[arg(short = 'n', long, default_value_t = 600, help = "Number of cycles to run")]
    cycles: u64,

    #[arg(long, default_value_t = 60.0, help = "Simulated frame rate in Hz")]
    frame_rate: f64,

    #[arg(long, default_value_t = 0, help = "Seed for random motion and distractors")]
    seed: u64,

    #[arg(
        long,
        default_value_t = 0.0,
        help = "Per-frame probability of a distractor blob",
        long_help = "Probability per frame that a short-lived distractor detection \
            appears. Distractors never live long enough to be locked, but they can \
            delay acquisition when they are the largest blob in frame."
    )]
    distractor_rate: f64,

    #[arg(
        short,
        long,
        help = "Tracker configuration JSON file",
        long_help = "Path to a tracker configuration JSON file. Fields that are \
            missing fall back to the defaults."
    )]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Write per-cycle records to this CSV file")]
    output: Option<PathBuf>,

    #[arg(long, help = "Drive both axes as velocity motors")]
    velocity: bool,

    #[arg(long, help = "Print the session summary as JSON")]
    json: bool,

    #[arg(short, long, help = "Enable verbose output")]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins unless --verbose asks for debug output
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    if args.frame_rate <= 0.0 {
        return Err(anyhow!("Frame rate must be positive, got {}", args.frame_rate));
    }

    let mut config = match &args.config {
        Some(path) => TrackerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load tracker config {}", path.display()))?,
        None => TrackerConfig::default(),
    };
    if args.velocity {
        config.pan = AxisConfig::velocity(config.pan.gains);
        config.tilt = AxisConfig::velocity(config.tilt.gains);
    }

    let motion = TestMotions::by_name(&args.motion, args.amplitude, args.seed).ok_or_else(|| {
        anyhow!(
            "Unknown motion type: {} (expected one of {:?})",
            args.motion,
            TestMotions::NAMES
        )
    })?;

    let scene_config = SceneConfig {
        frame_interval_s: 1.0 / args.frame_rate,
        pan_device: config.pan.device,
        tilt_device: config.tilt.device,
        limits: config.limits,
        distractor_rate: args.distractor_rate,
        seed: args.seed,
        ..Default::default()
    };

    println!("Pan/Tilt Tracking Demo");
    println!("======================");
    println!("Motion type: {}", args.motion);
    println!("Cycles: {}", args.cycles);
    println!("Frame rate: {} Hz", args.frame_rate);
    println!(
        "Devices: pan {:?}, tilt {:?}",
        scene_config.pan_device, scene_config.tilt_device
    );

    let (camera, servos, scene) = simulated_rig(scene_config, motion);
    let mut tracker =
        PanTiltTracker::new(camera, servos, &config).context("Invalid tracker configuration")?;

    let lock_events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = lock_events.clone();
    tracker.register_callback(move |event| match event {
        TrackerEvent::LockAcquired { id, detection } => {
            info!("Locked on {id}: {detection}");
            if let Ok(mut events) = events_clone.lock() {
                events.push(*id);
            }
        }
        TrackerEvent::LockLost { id } => warn!("Lost lock on {id}"),
        TrackerEvent::TrackingUpdate { .. } => {}
    });

    let mut recorder = match &args.output {
        Some(path) => Some(
            CycleRecorder::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => None,
    };

    let mut squared_error = 0.0;
    let mut error_samples = 0u64;

    for _ in 0..args.cycles {
        let outcome = tracker.step().context("Tracking cycle failed")?;

        if let Some(recorder) = recorder.as_mut() {
            recorder.record(&outcome)?;
        }

        if outcome.is_tracking() {
            let offset = scene
                .lock()
                .map_err(|_| anyhow!("Simulated scene poisoned"))?
                .target_offset();
            if let Some((dx, dy)) = offset {
                squared_error += dx * dx + dy * dy;
                error_samples += 1;
            }
        }
    }

    if let Some(mut recorder) = recorder {
        recorder.flush()?;
        if let Some(path) = &args.output {
            println!("Wrote {} cycle records to {}", recorder.rows(), path.display());
        }
    }

    let stats = tracker.stats();
    let rms = (error_samples > 0).then(|| (squared_error / error_samples as f64).sqrt());

    if args.json {
        let locked_ids = lock_events
            .lock()
            .map_err(|_| anyhow!("Lock log poisoned"))?
            .clone();
        let summary = serde_json::json!({
            "motion": args.motion,
            "stats": stats,
            "rms_error_px": rms,
            "locked_ids": locked_ids,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("\nSession summary");
    println!("---------------");
    println!("Cycles:          {}", stats.cycles);
    println!(
        "Tracked cycles:  {} ({:.1}%)",
        stats.tracked_cycles,
        100.0 * stats.tracked_cycles as f64 / stats.cycles.max(1) as f64
    );
    println!("Acquisitions:    {}", stats.acquisitions);
    println!("Losses:          {}", stats.losses);
    match rms {
        Some(rms) => println!("RMS error:       {rms:.2} px"),
        None => println!("RMS error:       n/a (never tracked)"),
    }
    let (pan, tilt) = scene
        .lock()
        .map_err(|_| anyhow!("Simulated scene poisoned"))?
        .mount_position();
    println!("Final mount:     pan {pan:.1}, tilt {tilt:.1}");

    Ok(())
}
