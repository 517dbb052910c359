use crate::detect::{
    LANE_COLOR, ROI_BOTTOM_LEFT, ROI_BOTTOM_RIGHT, ROI_TOP_LEFT, ROI_TOP_RIGHT, ROI_TOP_Y,
};
use anyhow::{bail, Result};
use clap::ValueEnum;
use log::{debug, info};
use opencv::core::{self, Mat, Point, Size, Vec4i, Vector};
use opencv::imgproc;
use serde::Deserialize;
use std::f64::consts::PI;
use std::path::Path;
use vision_media::{Annotate, Image, VideoReader, VideoSource, VideoWriter, RGB};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LaneStyle {
    /// Hough segments on a separate layer blended over the frame.
    #[default]
    Hough,
    /// Edge contours drawn straight onto the frame.
    Contours,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(from = "LaneOptionsFile")]
pub struct LaneOptions {
    pub style: LaneStyle,
    pub blur_kernel: i32,
    pub canny_low: f64,
    pub canny_high: f64,
    pub hough_threshold: i32,
    pub min_line_length: f64,
    pub max_line_gap: f64,
    pub line_thickness: i32,
    pub frame_weight: f64,
}

impl Default for LaneOptions {
    fn default() -> Self {
        Self {
            style: LaneStyle::Hough,
            blur_kernel: 5,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_threshold: 50,
            min_line_length: 40.0,
            max_line_gap: 150.0,
            line_thickness: 5,
            frame_weight: 0.85,
        }
    }
}

impl LaneOptions {
    pub fn contours() -> Self {
        Self {
            style: LaneStyle::Contours,
            blur_kernel: 13,
            line_thickness: 2,
            ..Self::default()
        }
    }

    pub fn for_style(style: LaneStyle) -> Self {
        match style {
            LaneStyle::Hough => Self::default(),
            LaneStyle::Contours => Self::contours(),
        }
    }

    /// Switch style, taking the new style's blur and stroke defaults.
    pub fn with_style(self, style: LaneStyle) -> Self {
        if style == self.style {
            return self;
        }

        let defaults = Self::for_style(style);
        Self {
            style,
            blur_kernel: defaults.blur_kernel,
            line_thickness: defaults.line_thickness,
            ..self
        }
    }
}

/// `[lane]` table as written in the config file. Unset keys fall back to the chosen style's defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LaneOptionsFile {
    style: LaneStyle,
    blur_kernel: Option<i32>,
    canny_low: Option<f64>,
    canny_high: Option<f64>,
    hough_threshold: Option<i32>,
    min_line_length: Option<f64>,
    max_line_gap: Option<f64>,
    line_thickness: Option<i32>,
    frame_weight: Option<f64>,
}

impl From<LaneOptionsFile> for LaneOptions {
    fn from(file: LaneOptionsFile) -> Self {
        let defaults = LaneOptions::for_style(file.style);
        Self {
            style: file.style,
            blur_kernel: file.blur_kernel.unwrap_or(defaults.blur_kernel),
            canny_low: file.canny_low.unwrap_or(defaults.canny_low),
            canny_high: file.canny_high.unwrap_or(defaults.canny_high),
            hough_threshold: file.hough_threshold.unwrap_or(defaults.hough_threshold),
            min_line_length: file.min_line_length.unwrap_or(defaults.min_line_length),
            max_line_gap: file.max_line_gap.unwrap_or(defaults.max_line_gap),
            line_thickness: file.line_thickness.unwrap_or(defaults.line_thickness),
            frame_weight: file.frame_weight.unwrap_or(defaults.frame_weight),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneSegment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

pub struct LaneDetector {
    options: LaneOptions,
}

impl LaneDetector {
    pub fn new(options: LaneOptions) -> Result<Self> {
        if options.blur_kernel <= 0 || options.blur_kernel % 2 == 0 {
            bail!("Blur kernel must be a positive odd number, got {}", options.blur_kernel);
        }

        Ok(Self { options })
    }

    pub fn options(&self) -> &LaneOptions {
        &self.options
    }

    /// Road region in front of the camera, clockwise from bottom left.
    pub fn roi_trapezoid(width: i32, height: i32) -> [(i32, i32); 4] {
        let (w, h) = (width as f64, height as f64);
        [
            ((w * ROI_BOTTOM_LEFT) as i32, height),
            ((w * ROI_BOTTOM_RIGHT) as i32, height),
            ((w * ROI_TOP_RIGHT) as i32, (h * ROI_TOP_Y) as i32),
            ((w * ROI_TOP_LEFT) as i32, (h * ROI_TOP_Y) as i32),
        ]
    }

    /// Single-channel mask, 255 inside the road trapezoid.
    fn roi_mask(width: i32, height: i32) -> Result<Mat> {
        let mut canvas = Image::blank(width, height, RGB::BLACK)?;
        canvas.fill_polygon(&Self::roi_trapezoid(width, height), RGB::WHITE)?;

        let mut mask = Mat::default();
        imgproc::cvt_color_def(canvas.mat(), &mut mask, imgproc::COLOR_BGR2GRAY)?;
        Ok(mask)
    }

    fn masked_edges(&self, frame: &Image) -> Result<Mat> {
        let (width, height) = frame.get_size();

        let mask = Self::roi_mask(width, height)?;

        let mut gray = Mat::default();
        imgproc::cvt_color_def(frame.mat(), &mut gray, imgproc::COLOR_BGR2GRAY)?;

        let mut blurred = Mat::default();
        let kernel = self.options.blur_kernel;
        imgproc::gaussian_blur_def(&gray, &mut blurred, Size::new(kernel, kernel), 0.0)?;

        let mut edges = Mat::default();
        imgproc::canny_def(&blurred, &mut edges, self.options.canny_low, self.options.canny_high)?;

        let mut masked = Mat::default();
        core::bitwise_and_def(&edges, &mask, &mut masked)?;

        Ok(masked)
    }

    pub fn detect(&self, frame: &Image) -> Result<Vec<LaneSegment>> {
        let edges = self.masked_edges(frame)?;

        let mut lines = Vector::<Vec4i>::new();
        imgproc::hough_lines_p(
            &edges,
            &mut lines,
            1.0,
            PI / 180.0,
            self.options.hough_threshold,
            self.options.min_line_length,
            self.options.max_line_gap,
        )?;

        Ok(lines
            .iter()
            .map(|line| LaneSegment {
                x1: line[0],
                y1: line[1],
                x2: line[2],
                y2: line[3],
            })
            .collect())
    }

    pub fn contours(&self, frame: &Image) -> Result<Vec<Vec<(i32, i32)>>> {
        let edges = self.masked_edges(frame)?;

        let mut contours = Vector::<Vector<Point>>::new();
        imgproc::find_contours_def(&edges, &mut contours, imgproc::RETR_TREE, imgproc::CHAIN_APPROX_SIMPLE)?;

        Ok(contours
            .iter()
            .map(|contour| contour.iter().map(|point| (point.x, point.y)).collect())
            .collect())
    }

    pub fn overlay(&self, frame: &Image) -> Result<Image> {
        match self.options.style {
            LaneStyle::Hough => {
                let segments = self.detect(frame)?;
                debug!("{} lane segments", segments.len());

                let (width, height) = frame.get_size();
                let mut layer = Image::blank(width, height, RGB::BLACK)?;
                for segment in &segments {
                    layer.draw_line(
                        (segment.x1, segment.y1),
                        (segment.x2, segment.y2),
                        LANE_COLOR,
                        self.options.line_thickness,
                    )?;
                }

                frame.blend(&layer, self.options.frame_weight, 1.0)
            }
            LaneStyle::Contours => {
                let contours = self.contours(frame)?;
                debug!("{} lane contours", contours.len());

                let mut annotated = frame.try_clone()?;
                for contour in &contours {
                    annotated.draw_polyline(contour, true, LANE_COLOR, self.options.line_thickness)?;
                }

                Ok(annotated)
            }
        }
    }

    /// Lane overlay over a whole video, written at the source frame rate.
    pub fn process_video(&self, source: &VideoSource, output: impl AsRef<Path>) -> Result<u64> {
        let reader = VideoReader::open(source)?;
        let fps = reader.fps();
        let mut writer: Option<VideoWriter> = None;

        info!("Lane processing started for {source}");
        for frame in reader {
            let annotated = self.overlay(&frame?)?;
            if writer.is_none() {
                writer = Some(VideoWriter::create(output.as_ref(), fps, annotated.get_size())?);
            }
            if let Some(writer) = writer.as_mut() {
                writer.write(&annotated)?;
            }
        }

        match writer {
            Some(writer) => {
                let frames = writer.finish()?;
                info!("Lane processing complete, {frames} frames saved at {}", output.as_ref().display());
                Ok(frames)
            }
            None => bail!("Couldn't read any frame from {source}"),
        }
    }
}
