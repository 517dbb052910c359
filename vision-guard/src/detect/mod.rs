use vision_media::RGB;

pub mod annotate;
pub mod lane;
pub mod pipeline;
pub mod stats;

pub const CAR_COLOR: RGB = RGB(255, 191, 0);
pub const SIGN_COLOR: RGB = RGB(0, 0, 255);
pub const LANE_COLOR: RGB = RGB::GREEN;
pub const STATS_COLOR: RGB = RGB::WHITE;

// Region of interest as fractions of the frame.
pub(crate) const ROI_BOTTOM_LEFT: f64 = 0.1;
pub(crate) const ROI_BOTTOM_RIGHT: f64 = 0.9;
pub(crate) const ROI_TOP_LEFT: f64 = 0.4;
pub(crate) const ROI_TOP_RIGHT: f64 = 0.6;
pub(crate) const ROI_TOP_Y: f64 = 0.6;
