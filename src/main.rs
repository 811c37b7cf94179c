//! Motion-triggered recorder: watches a V4L2 camera and records while
//! something moves.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use pi_cam_motion::{
    CameraConfig, CameraDevice, ControllerConfig, FourCC, RecordingController, V4L2Device,
};

/// Record video from a V4L2 camera whenever motion is detected.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Video device index (0 for /dev/video0).
    #[arg(short, long, default_value_t = 0)]
    device: u32,

    /// Directory recordings are written to.
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Frame width in pixels.
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// Frame height in pixels.
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Frames per second.
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Pixel format FourCC (YUYV, MJPG, RGB3, BGR3).
    #[arg(long, default_value = "YUYV")]
    pixel_format: FourCC,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Cli::parse()) {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("error setting Ctrl-C handler")?;

    let camera_config = CameraConfig {
        device_index: cli.device,
        width: cli.width,
        height: cli.height,
        frame_rate: cli.fps,
        fourcc: cli.pixel_format,
        ..CameraConfig::default()
    };
    let camera = V4L2Device::open(&camera_config)
        .with_context(|| format!("opening /dev/video{}", cli.device))?;

    log::info!("Device: {}", camera.capabilities().card);
    log::info!("Driver: {}", camera.capabilities().driver);

    let config = ControllerConfig {
        output_dir: cli.output_dir,
        ..ControllerConfig::default()
    };
    let mut controller = RecordingController::new(camera, config);

    log::info!("watching for motion (Ctrl-C to stop)");
    controller.run(&shutdown)?;
    log::info!("exit");
    Ok(())
}
