pub mod annotate;
pub mod image;
pub mod size;
