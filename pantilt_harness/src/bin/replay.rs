use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use pantilt::{PanTiltTracker, RecordingServo, ScriptedDetector, TrackerConfig};
use pantilt_harness::CycleRecorder;

/// Replay a captured detection log through the tracker
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Replay captured detections through the pan/tilt tracker",
    long_about = "Feeds a JSON detection log (an array of frames, each an array of \
        detections) through the tracker and prints or records the commands it would \
        have sent. No hardware is touched."
)]
struct Args {
    /// JSON file holding the detection frames
    input: PathBuf,

    #[arg(long, default_value_t = 316, help = "Frame width in pixels")]
    width: u32,

    #[arg(long, default_value_t = 208, help = "Frame height in pixels")]
    height: u32,

    #[arg(short, long, help = "Tracker configuration JSON file")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Write per-cycle records to this CSV file")]
    output: Option<PathBuf>,

    #[arg(long, help = "Print the selected target of every frame")]
    print_targets: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TrackerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load tracker config {}", path.display()))?,
        None => TrackerConfig::default(),
    };

    let detector = ScriptedDetector::from_json_file(&args.input, args.width, args.height)
        .with_context(|| format!("Failed to load detections from {}", args.input.display()))?;
    let frames = detector.remaining();
    info!("Replaying {} frames from {}", frames, args.input.display());

    let servo = RecordingServo::new();
    let mut tracker = PanTiltTracker::new(detector, servo.clone(), &config)
        .context("Invalid tracker configuration")?;

    let mut recorder = match &args.output {
        Some(path) => Some(
            CycleRecorder::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => None,
    };

    for _ in 0..frames {
        let outcome = tracker.step().context("Replay cycle failed")?;

        if args.print_targets {
            let frame = tracker.detector().polled();
            println!("frame {frame}: {} detections", outcome.detections);
            if let Some(target) = &outcome.target {
                println!("  target {target}");
            }
        }

        match recorder.as_mut() {
            Some(recorder) => recorder.record(&outcome)?,
            None => println!(
                "{:>6} {:>14} pan {:>5} tilt {:>5}",
                outcome.cycle,
                pantilt_harness::recorder::transition_label(&outcome.transition),
                outcome.pan_command,
                outcome.tilt_command
            ),
        }
    }

    if let Some(mut recorder) = recorder {
        recorder.flush()?;
    }

    let stats = tracker.stats();
    println!(
        "{} cycles, {} tracked, {} acquisitions, {} losses, {} commands sent",
        stats.cycles,
        stats.tracked_cycles,
        stats.acquisitions,
        stats.losses,
        servo.commands().len()
    );

    Ok(())
}
