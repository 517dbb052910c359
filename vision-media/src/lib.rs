pub mod image;
pub mod video;

pub use image::annotate::Annotate;
pub use image::image::Image;
pub use image::size::{Letterbox, ResizeImage};
pub use video::{VideoReader, VideoSource, VideoWriter};

use opencv::core::Scalar;

/// Colour in RGB order. OpenCV stores frames as BGR; conversion happens at the draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RGB(pub u8, pub u8, pub u8);

impl RGB {
    pub const WHITE: RGB = RGB(255, 255, 255);
    pub const BLACK: RGB = RGB(0, 0, 0);
    pub const GREEN: RGB = RGB(0, 255, 0);

    pub(crate) fn scalar(self) -> Scalar {
        Scalar::new(self.2 as f64, self.1 as f64, self.0 as f64, 0.0)
    }
}
