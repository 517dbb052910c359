use crate::detect::lane::{LaneOptions, LaneStyle};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use vision_inference::engine::inference_engine::ExecutionProvider;
use vision_inference::inference::yolo::inference_yolo_detect::YoloOptions;

#[derive(Parser, Debug)]
#[command(
    name = "vision-guard",
    version,
    about = "Vehicle, traffic sign and lane detection with a web dashboard"
)]
pub struct Cli {
    /// Directory holding `models/`, `static/` and `instance/`.
    #[arg(long, global = true, env = "VISIONGUARD_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Optional TOML file tuning the detection pipeline.
    #[arg(long, global = true, env = "VISIONGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Execution provider override, e.g. `cpu` or `cuda:0`.
    #[arg(long, global = true, env = "VISIONGUARD_DEVICE")]
    pub device: Option<String>,

    #[arg(long, global = true, env = "VISIONGUARD_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, global = true, env = "VISIONGUARD_PORT", default_value_t = 5000)]
    pub port: u16,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the web dashboard (the default).
    Serve,
    /// Run vehicle, sign and lane detection once over an image or video.
    Detect {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Stop a video after this many seconds of processing.
        #[arg(long)]
        limit_seconds: Option<u64>,
    },
    /// Lane overlay only, no detectors required.
    Lane {
        /// Video file or camera index.
        #[arg(long)]
        input: String,
        #[arg(long)]
        output: PathBuf,
        /// Defaults to the `[lane]` style from the config file.
        #[arg(long, value_enum)]
        style: Option<LaneStyle>,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub car_model: PathBuf,
    pub sign_model: PathBuf,
    pub device: String,
    pub confidence: f32,
    pub iou_threshold: f32,
    pub input_size: i32,
    pub camera_index: i32,
    pub live_capture_seconds: u64,
    pub jpeg_quality: i32,
    pub lane: LaneOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let yolo = YoloOptions::default();
        Self {
            car_model: PathBuf::from("models/car_model.onnx"),
            sign_model: PathBuf::from("models/paneaux_detect.onnx"),
            device: "cpu".to_string(),
            confidence: yolo.confidence,
            iou_threshold: yolo.iou_threshold,
            input_size: yolo.input_size.0,
            camera_index: 0,
            live_capture_seconds: 15,
            jpeg_quality: 95,
            lane: LaneOptions::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!("Loaded pipeline config from {}", path.display());

        Ok(config)
    }

    pub fn execution_provider(&self) -> Result<ExecutionProvider> {
        self.device.parse()
    }

    pub fn yolo_options(&self) -> YoloOptions {
        YoloOptions {
            input_size: (self.input_size, self.input_size),
            confidence: self.confidence,
            iou_threshold: self.iou_threshold,
        }
    }
}

/// On-disk layout rooted at `--root`.
#[derive(Debug, Clone)]
pub struct Layout {
    pub root: PathBuf,
    pub static_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub instance_dir: PathBuf,
}

impl Layout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let static_dir = root.join("static");
        Self {
            uploads_dir: static_dir.join("uploads"),
            outputs_dir: static_dir.join("outputs"),
            instance_dir: root.join("instance"),
            static_dir,
            root,
        }
    }

    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.uploads_dir, &self.outputs_dir, &self.instance_dir] {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.instance_dir.join("app.db")
    }

    /// Relative paths from the config are taken relative to the root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_bundled_models() {
        let config = PipelineConfig::default();
        assert_eq!(config.car_model, PathBuf::from("models/car_model.onnx"));
        assert_eq!(config.live_capture_seconds, 15);
        assert_eq!(config.execution_provider().ok(), Some(ExecutionProvider::CPU));
    }

    #[test]
    fn partial_toml_keeps_defaults() -> Result<()> {
        let config: PipelineConfig = toml::from_str(
            r#"
            device = "cuda:1"
            confidence = 0.4

            [lane]
            style = "contours"
            "#,
        )?;

        assert_eq!(config.execution_provider()?, ExecutionProvider::CUDA(1));
        assert_eq!(config.yolo_options().confidence, 0.4);
        assert_eq!(config.yolo_options().iou_threshold, 0.7);
        assert_eq!(config.lane.style, LaneStyle::Contours);
        assert_eq!(config.lane.blur_kernel, 13);
        assert_eq!(config.sign_model, PathBuf::from("models/paneaux_detect.onnx"));
        Ok(())
    }

    #[test]
    fn layout_places_database_in_instance() {
        let layout = Layout::new("/srv/vision");
        assert_eq!(layout.database_path(), PathBuf::from("/srv/vision/instance/app.db"));
        assert_eq!(layout.outputs_dir, PathBuf::from("/srv/vision/static/outputs"));
        assert_eq!(
            layout.resolve(Path::new("models/car_model.onnx")),
            PathBuf::from("/srv/vision/models/car_model.onnx")
        );
        assert_eq!(layout.resolve(Path::new("/opt/m.onnx")), PathBuf::from("/opt/m.onnx"));
    }

    #[test]
    fn cli_defaults_to_serving() {
        let cli = Cli::parse_from(["vision-guard"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.port, 5000);
    }

    #[test]
    fn cli_parses_lane_command() {
        let cli = Cli::parse_from([
            "vision-guard",
            "lane",
            "--input",
            "0",
            "--output",
            "lanes.mp4",
            "--style",
            "contours",
        ]);
        match cli.command {
            Some(Command::Lane { input, style, .. }) => {
                assert_eq!(input, "0");
                assert_eq!(style, Some(LaneStyle::Contours));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parses_serve_options() {
        let cli = Cli::parse_from(["vision-guard", "serve", "--host", "0.0.0.0", "--port", "8080"]);
        assert!(matches!(cli.command, Some(Command::Serve)));
        assert_eq!(cli.host, "0.0.0.0");
        assert_eq!(cli.port, 8080);

        let cli = Cli::parse_from(["vision-guard", "--port", "8081", "serve"]);
        assert_eq!(cli.port, 8081);
    }
}
