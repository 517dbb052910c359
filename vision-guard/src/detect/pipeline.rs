use crate::config::{Layout, PipelineConfig};
use crate::detect::annotate::{draw_detections, draw_stats};
use crate::detect::lane::LaneDetector;
use crate::detect::stats::{fps_from, ProcessStats, StatsAccumulator};
use crate::detect::{CAR_COLOR, SIGN_COLOR};
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::path::Path;
use std::time::{Duration, Instant};
use vision_inference::inference::yolo::inference_yolo_detect::{YoloDetectInference, YoloDetectSession};
use vision_media::{Image, VideoReader, VideoSource, VideoWriter, RGB};

/// What the web layer needs from the detection stack.
pub trait MediaProcessor: Send + Sync {
    fn process_image(&self, input: &Path, output: &Path) -> Result<ProcessStats>;

    /// Stops at end of stream, or once `limit` of wall time has passed.
    fn process_video(&self, source: &VideoSource, output: &Path, limit: Option<Duration>) -> Result<ProcessStats>;

    /// Feeds annotated JPEG frames to `sink` until the source ends or `sink` returns `false`.
    fn stream_mjpeg(&self, source: &VideoSource, sink: &mut dyn FnMut(Vec<u8>) -> bool) -> Result<()>;
}

pub struct Detector {
    name: String,
    model: Box<dyn YoloDetectInference + Send + Sync>,
    color: RGB,
}

impl Detector {
    pub fn new(name: impl Into<String>, model: impl YoloDetectInference + Send + Sync + 'static, color: RGB) -> Self {
        Self {
            name: name.into(),
            model: Box::new(model),
            color,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub struct ProcessedFrame {
    pub image: Image,
    pub fps: f64,
    /// Seconds spent on the whole frame.
    pub inference_time: f64,
    pub detections: usize,
}

pub struct DetectionPipeline {
    lane: LaneDetector,
    detectors: Vec<Detector>,
    jpeg_quality: i32,
}

impl DetectionPipeline {
    pub fn new(lane: LaneDetector, jpeg_quality: i32) -> Self {
        Self {
            lane,
            detectors: Vec::new(),
            jpeg_quality,
        }
    }

    pub fn with_detector(mut self, detector: Detector) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Vehicle and sign detectors from the configured model paths.
    pub fn load(config: &PipelineConfig, layout: &Layout) -> Result<Self> {
        let executor = config.execution_provider()?;
        let options = config.yolo_options();

        let car_model = layout.resolve(&config.car_model);
        let cars = YoloDetectSession::new(&car_model, executor, options)
            .with_context(|| format!("Failed to load vehicle detector {}", car_model.display()))?;

        let sign_model = layout.resolve(&config.sign_model);
        let signs = YoloDetectSession::new(&sign_model, executor, options)
            .with_context(|| format!("Failed to load sign detector {}", sign_model.display()))?;

        info!("Detection pipeline ready on {executor}");
        Ok(Self::new(LaneDetector::new(config.lane.clone())?, config.jpeg_quality)
            .with_detector(Detector::new("vehicles", cars, CAR_COLOR))
            .with_detector(Detector::new("signs", signs, SIGN_COLOR)))
    }

    pub fn detectors(&self) -> &[Detector] {
        &self.detectors
    }

    /// Lane overlay, then each detector in turn on the annotated frame, then the timing banner.
    pub fn process_frame(&self, frame: &Image) -> Result<ProcessedFrame> {
        let start = Instant::now();

        let mut image = self.lane.overlay(frame)?;
        let mut detections = 0;
        for detector in &self.detectors {
            let results = detector.model.inference_yolo(&image)?;
            debug!("{}: {} detections", detector.name, results.len());

            draw_detections(&mut image, &results, detector.model.names(), detector.color)?;
            detections += results.len();
        }

        let elapsed = start.elapsed();
        let fps = fps_from(elapsed);
        let inference_time = elapsed.as_secs_f64();
        draw_stats(&mut image, fps, inference_time)?;

        Ok(ProcessedFrame {
            image,
            fps,
            inference_time,
            detections,
        })
    }
}

impl MediaProcessor for DetectionPipeline {
    fn process_image(&self, input: &Path, output: &Path) -> Result<ProcessStats> {
        let frame = Image::open_file(input)?;
        let processed = self.process_frame(&frame)?;
        processed.image.save(output)?;

        info!(
            "Processed {} with {} detections in {:.1} ms",
            input.display(),
            processed.detections,
            processed.inference_time * 1000.0
        );
        Ok(ProcessStats::single(processed.fps, processed.inference_time))
    }

    fn process_video(&self, source: &VideoSource, output: &Path, limit: Option<Duration>) -> Result<ProcessStats> {
        let reader = VideoReader::open(source)?;
        let fps = reader.fps();
        let limit = limit.filter(|limit| !limit.is_zero());

        let mut writer: Option<VideoWriter> = None;
        let mut stats = StatsAccumulator::default();
        let start = Instant::now();

        info!("Processing {source} at {fps:.1} fps");
        for frame in reader {
            let processed = self.process_frame(&frame?)?;
            if writer.is_none() {
                writer = Some(VideoWriter::create(output, fps, processed.image.get_size())?);
            }
            if let Some(writer) = writer.as_mut() {
                writer.write(&processed.image)?;
            }
            stats.record(processed.fps, processed.inference_time);

            if limit.is_some_and(|limit| start.elapsed() >= limit) {
                debug!("Time limit reached after {} frames", stats.frames());
                break;
            }
        }

        let Some(writer) = writer else {
            bail!("No frames could be read from {source}");
        };
        writer.finish()?;

        let stats = stats.finish(start.elapsed());
        info!(
            "Processed {} frames from {source}, average {:.2} fps",
            stats.frames, stats.average_fps
        );
        Ok(stats)
    }

    fn stream_mjpeg(&self, source: &VideoSource, sink: &mut dyn FnMut(Vec<u8>) -> bool) -> Result<()> {
        let reader = VideoReader::open(source)?;
        info!("Live feed started on {source}");

        for frame in reader {
            let processed = self.process_frame(&frame?)?;
            let jpeg = match processed.image.encode_jpeg(self.jpeg_quality) {
                Ok(jpeg) => jpeg,
                Err(err) => {
                    warn!("Dropping live frame: {err}");
                    continue;
                }
            };

            if !sink(jpeg) {
                debug!("Live feed consumer disconnected");
                break;
            }
        }

        info!("Live feed on {source} stopped");
        Ok(())
    }
}
