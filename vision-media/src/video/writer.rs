use crate::image::image::path_str;
use crate::{Image, ResizeImage};
use anyhow::{bail, Result};
use log::debug;
use opencv::core::Size;
use opencv::prelude::*;
use opencv::videoio;
use std::path::{Path, PathBuf};

/// MPEG-4 (`mp4v`) writer with a fixed frame size.
pub struct VideoWriter {
    writer: videoio::VideoWriter,
    path: PathBuf,
    size: (i32, i32),
    frames: u64,
}

impl VideoWriter {
    pub fn create(path: impl AsRef<Path>, fps: f64, size: (i32, i32)) -> Result<Self> {
        let path = path.as_ref();
        let fourcc = videoio::VideoWriter::fourcc('m', 'p', '4', 'v')?;
        let writer = videoio::VideoWriter::new(path_str(path)?, fourcc, fps, Size::new(size.0, size.1), true)?;
        if !writer.is_opened()? {
            bail!("Unable to open video writer at {}", path.display());
        }
        debug!("Writing {}x{} @ {fps:.1} fps to {}", size.0, size.1, path.display());

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            size,
            frames: 0,
        })
    }

    pub fn write(&mut self, frame: &Image) -> Result<()> {
        if frame.get_size() == self.size {
            self.writer.write(frame.mat())?;
        } else {
            self.writer.write(frame.resize_into(self.size)?.mat())?;
        }
        self.frames += 1;

        Ok(())
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Flush and close the container, returning the number of frames written.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.release()?;
        debug!("Closed {} after {} frames", self.path.display(), self.frames);
        Ok(self.frames)
    }
}
