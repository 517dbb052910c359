use crate::{Image, RGB};
use anyhow::Result;
use opencv::core::{self, Mat, Size};
use opencv::imgproc;

/// Geometry of an aspect preserving resize onto a padded canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: i32,
    pub pad_y: i32,
    pub scaled: (i32, i32),
    pub target: (i32, i32),
}

impl Letterbox {
    pub fn fit(source: (i32, i32), target: (i32, i32)) -> Self {
        let (sw, sh) = (source.0.max(1) as f32, source.1.max(1) as f32);
        let scale = (target.0 as f32 / sw).min(target.1 as f32 / sh);
        let scaled = (
            ((sw * scale).round() as i32).clamp(1, target.0),
            ((sh * scale).round() as i32).clamp(1, target.1),
        );

        Self {
            scale,
            pad_x: (target.0 - scaled.0) / 2,
            pad_y: (target.1 - scaled.1) / 2,
            scaled,
            target,
        }
    }

    /// Map a point on the padded canvas back onto the source frame.
    pub fn unmap_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale,
            (y - self.pad_y as f32) / self.scale,
        )
    }
}

pub trait ResizeImage {
    fn resize_into(&self, size: (i32, i32)) -> Result<Self>
    where
        Self: Sized;

    fn letterbox(&self, size: (i32, i32), pad: RGB) -> Result<(Self, Letterbox)>
    where
        Self: Sized;
}

impl ResizeImage for Image {
    fn resize_into(&self, size: (i32, i32)) -> Result<Self> {
        let mut resized = Mat::default();
        imgproc::resize(
            self.mat(),
            &mut resized,
            Size::new(size.0, size.1),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        Image::from_mat(resized)
    }

    fn letterbox(&self, size: (i32, i32), pad: RGB) -> Result<(Self, Letterbox)> {
        let geometry = Letterbox::fit(self.get_size(), size);
        let resized = if geometry.scaled == self.get_size() {
            self.try_clone()?
        } else {
            self.resize_into(geometry.scaled)?
        };

        let mut padded = Mat::default();
        core::copy_make_border(
            resized.mat(),
            &mut padded,
            geometry.pad_y,
            size.1 - geometry.scaled.1 - geometry.pad_y,
            geometry.pad_x,
            size.0 - geometry.scaled.0 - geometry.pad_x,
            core::BORDER_CONSTANT,
            pad.scalar(),
        )?;

        Ok((Image::from_mat(padded)?, geometry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_frame_is_padded_vertically() {
        let letterbox = Letterbox::fit((1280, 720), (640, 640));
        assert_eq!(letterbox.scale, 0.5);
        assert_eq!(letterbox.scaled, (640, 360));
        assert_eq!((letterbox.pad_x, letterbox.pad_y), (0, 140));
    }

    #[test]
    fn unmap_reverses_scale_and_padding() {
        let letterbox = Letterbox::fit((1280, 720), (640, 640));
        let (x, y) = letterbox.unmap_point(320.0, 320.0);
        assert!((x - 640.0).abs() < 1e-3);
        assert!((y - 360.0).abs() < 1e-3);
    }

    #[test]
    fn letterboxed_image_matches_target() -> Result<()> {
        let image = Image::blank(200, 100, RGB(255, 0, 0))?;
        let (padded, geometry) = image.letterbox((64, 64), RGB(114, 114, 114))?;

        assert_eq!(padded.get_size(), (64, 64));
        assert_eq!(geometry.pad_y, 16);
        assert_eq!(padded.pixel(32, 2)?, RGB(114, 114, 114));
        assert_eq!(padded.pixel(32, 32)?, RGB(255, 0, 0));
        Ok(())
    }
}
