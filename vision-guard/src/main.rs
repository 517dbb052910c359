#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use vision_guard::config::{Cli, Command, Layout, PipelineConfig};
use vision_guard::detect::lane::LaneDetector;
use vision_guard::detect::pipeline::{DetectionPipeline, MediaProcessor};
use vision_guard::storage::Database;
use vision_guard::web::upload::ALLOWED_IMAGE_EXTENSIONS;
use vision_guard::web::{self, AppState, LiveSettings};
use vision_media::VideoSource;

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(device) = &cli.device {
        config.device = device.clone();
    }
    Ok(config)
}

fn serve(config: PipelineConfig, layout: Layout, host: String, port: u16) -> Result<()> {
    layout.ensure()?;
    let db = Database::open(layout.database_path())?;
    let pipeline = DetectionPipeline::load(&config, &layout)?;

    let state = AppState {
        db,
        processor: Arc::new(pipeline),
        live: LiveSettings {
            camera: VideoSource::Camera(config.camera_index),
            capture_seconds: config.live_capture_seconds,
        },
        layout,
    };

    actix_web::rt::System::new().block_on(web::serve(state, host, port))
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ALLOWED_IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn detect(config: &PipelineConfig, layout: &Layout, input: &Path, output: &Path, limit: Option<u64>) -> Result<()> {
    let pipeline = DetectionPipeline::load(config, layout)?;

    let stats = if is_image(input) {
        pipeline.process_image(input, output)?
    } else {
        let source = VideoSource::File(input.to_path_buf());
        pipeline.process_video(&source, output, limit.map(Duration::from_secs))?
    };

    info!(
        "{} frame(s), average {:.2} fps, {:.1} ms inference",
        stats.frames,
        stats.average_fps,
        stats.average_inference * 1000.0
    );
    Ok(())
}

fn main() -> Result<()> {
    vision_guard::log_init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let layout = Layout::new(&cli.root);

    match cli.command {
        None | Some(Command::Serve) => serve(config, layout, cli.host, cli.port),
        Some(Command::Detect {
            input,
            output,
            limit_seconds,
        }) => detect(&config, &layout, &input, &output, limit_seconds),
        Some(Command::Lane { input, output, style }) => {
            let source = input.parse::<VideoSource>().context("Invalid lane input")?;
            let options = match style {
                Some(style) => config.lane.with_style(style),
                None => config.lane,
            };
            let detector = LaneDetector::new(options)?;
            let frames = detector.process_video(&source, &output)?;
            info!("Wrote {frames} lane frames to {}", output.display());
            Ok(())
        }
    }
}
