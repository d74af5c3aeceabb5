//! Scan command - run the scanner loop over captured frames.
//!
//! A simulated camera plays the frame files back in rotation, so the full
//! acquisition, polling and recognition path runs exactly as it would
//! against a live device.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use moments_core::camera::{CameraSession, DeviceInfo, FacingMode, Platform, SimulatedBackend};
use moments_core::{
    FingerprintMatcher, FrameSource, RecognitionPipeline, ScanEvent, Scanner, ScannerConfig, WholeFrameDetector,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::utils::{load_frame, load_targets};

const DEVICE_ID: &str = "frame-files";

pub struct ScanOptions {
    pub interval_ms: u64,
    /// Completed cycles to run; one per frame when unset
    pub cycles: Option<u64>,
    pub max_distance: u32,
    pub json: bool,
    pub quiet: bool,
}

/// Execute the scan command.
pub async fn execute(frame_paths: Vec<PathBuf>, targets_path: PathBuf, options: ScanOptions) -> Result<()> {
    let targets = load_targets(&targets_path)?;
    if targets.is_empty() {
        bail!("Invalid targets file: {} has no targets", targets_path.display());
    }

    let frames = frame_paths
        .iter()
        .map(|path| load_frame(path))
        .collect::<Result<Vec<_>>>()?;
    let cycles = options.cycles.unwrap_or(frames.len() as u64);

    let backend = SimulatedBackend::new(vec![DeviceInfo::camera(
        DEVICE_ID,
        "Frame files",
        Some(FacingMode::Environment),
    )])
    .with_frames(frames);

    let mut session = CameraSession::new(Arc::new(backend), Platform::Desktop);
    session.start().await.context("Failed to start camera")?;
    debug!(state = ?session.state(), "Camera session started");
    let session = Arc::new(Mutex::new(session));

    let matcher = FingerprintMatcher::new(targets, options.max_distance);
    let pipeline = RecognitionPipeline::new(Arc::new(WholeFrameDetector), Arc::new(matcher));
    info!(
        strategy = pipeline.strategy_name(),
        cycles,
        interval_ms = options.interval_ms,
        "Starting scan"
    );

    let source: Arc<dyn FrameSource> = session.clone();
    let (handle, mut events) = Scanner::new(Arc::new(pipeline), source)
        .with_config(ScannerConfig {
            interval: Duration::from_millis(options.interval_ms),
            ..Default::default()
        })
        .spawn();

    let mut completed = 0u64;
    let mut recognized = 0usize;
    while completed < cycles {
        let Some(event) = events.recv().await else {
            break;
        };

        if options.json {
            println!("{}", serde_json::to_string(&event).context("Failed to serialize scan event")?);
        }

        match &event {
            ScanEvent::Detections { cycle, detections } => {
                completed += 1;
                recognized += detections.len();
                if !options.json && !options.quiet {
                    print_detections(*cycle, detections);
                }
            }
            ScanEvent::CycleFailed { cycle, error } => {
                completed += 1;
                if !options.json && !options.quiet {
                    println!("   {} {}", format!("cycle {}", cycle).dimmed(), error.red());
                }
            }
            ScanEvent::TickSkipped { reason } => {
                debug!(?reason, "Tick skipped");
            }
        }
    }

    handle.stop().await;
    session.lock().await.stop();

    if !options.json && !options.quiet {
        println!();
        println!("{}", "Scan finished".green().bold());
        println!("   {} {}", "Cycles:".dimmed(), completed);
        println!("   {} {}", "Detections:".dimmed(), recognized);
    }

    Ok(())
}

fn print_detections(cycle: u64, detections: &[moments_core::DetectedStamp]) {
    let label = format!("cycle {}", cycle);
    if detections.is_empty() {
        println!("   {} {}", label.dimmed(), "no stamp".dimmed());
        return;
    }
    for detection in detections {
        println!(
            "   {} {} {} ({:.0}%)",
            label.dimmed(),
            detection.name.bold(),
            detection.stamp_id.to_string().dimmed(),
            detection.confidence * 100.0
        );
    }
}
