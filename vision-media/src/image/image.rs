use crate::RGB;
use anyhow::{anyhow, bail, Result};
use opencv::core::{Mat, Vec3b, Vector, CV_8UC3};
use opencv::imgcodecs;
use opencv::prelude::*;
use std::path::Path;

/// An owned 8-bit BGR frame.
pub struct Image {
    mat: Mat,
}

pub(crate) fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow!("Path is not valid UTF-8: {}", path.display()))
}

impl Image {
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mat = imgcodecs::imread(path_str(path)?, imgcodecs::IMREAD_COLOR)?;
        if mat.rows() <= 0 || mat.cols() <= 0 {
            bail!("Unable to read image at {}", path.display());
        }

        Ok(Self { mat })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let buffer = Vector::<u8>::from_slice(bytes);
        let mat = imgcodecs::imdecode(&buffer, imgcodecs::IMREAD_COLOR)?;
        if mat.rows() <= 0 || mat.cols() <= 0 {
            bail!("Buffer of {} bytes is not a decodable image", bytes.len());
        }

        Ok(Self { mat })
    }

    pub fn from_mat(mat: Mat) -> Result<Self> {
        if mat.typ() != CV_8UC3 {
            bail!("Expected an 8-bit three channel frame, got type {}", mat.typ());
        }

        Ok(Self { mat })
    }

    pub fn blank(width: i32, height: i32, color: RGB) -> Result<Self> {
        let mat = Mat::new_rows_cols_with_default(height, width, CV_8UC3, color.scalar())?;
        Ok(Self { mat })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !imgcodecs::imwrite(path_str(path)?, &self.mat, &Vector::new())? {
            bail!("Failed to write image to {}", path.display());
        }

        Ok(())
    }

    pub fn encode_jpeg(&self, quality: i32) -> Result<Vec<u8>> {
        let params = Vector::<i32>::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, quality.clamp(1, 100)]);
        let mut buffer = Vector::<u8>::new();
        if !imgcodecs::imencode(".jpg", &self.mat, &mut buffer, &params)? {
            bail!("JPEG encoding failed");
        }

        Ok(buffer.to_vec())
    }

    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            mat: self.mat.try_clone()?,
        })
    }

    pub fn get_width(&self) -> i32 {
        self.mat.cols()
    }

    pub fn get_height(&self) -> i32 {
        self.mat.rows()
    }

    pub fn get_size(&self) -> (i32, i32) {
        (self.get_width(), self.get_height())
    }

    /// Interleaved BGR bytes, row major.
    pub fn raw_data(&self) -> Result<&[u8]> {
        Ok(self.mat.data_bytes()?)
    }

    pub fn pixel(&self, x: i32, y: i32) -> Result<RGB> {
        let bgr = self.mat.at_2d::<Vec3b>(y, x)?;
        Ok(RGB(bgr[2], bgr[1], bgr[0]))
    }

    pub fn mat(&self) -> &Mat {
        &self.mat
    }

    pub fn mat_mut(&mut self) -> &mut Mat {
        &mut self.mat
    }
}
