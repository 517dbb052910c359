use super::{VideoSource, DEFAULT_FPS};
use crate::image::image::path_str;
use crate::Image;
use anyhow::{bail, Result};
use log::debug;
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};

pub struct VideoReader {
    capture: VideoCapture,
}

impl VideoReader {
    pub fn open(source: &VideoSource) -> Result<Self> {
        let capture = match source {
            VideoSource::Camera(index) => VideoCapture::new(*index, videoio::CAP_ANY)?,
            VideoSource::File(path) => VideoCapture::from_file(path_str(path)?, videoio::CAP_ANY)?,
        };

        if !capture.is_opened()? {
            bail!("Unable to open video source {source}");
        }
        debug!("Opened video source {source}");

        Ok(Self { capture })
    }

    pub fn fps(&self) -> f64 {
        match self.capture.get(videoio::CAP_PROP_FPS) {
            Ok(fps) if fps.is_finite() && fps > 0.0 => fps,
            _ => DEFAULT_FPS,
        }
    }

    /// `None` once the stream is exhausted.
    pub fn read_frame(&mut self) -> Result<Option<Image>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.rows() <= 0 {
            return Ok(None);
        }

        Image::from_mat(frame).map(Some)
    }
}

impl Iterator for VideoReader {
    type Item = Result<Image>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}
