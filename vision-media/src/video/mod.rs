mod reader;
mod writer;

pub use reader::VideoReader;
pub use writer::VideoWriter;

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

/// Frame rate assumed when a container does not report one.
pub const DEFAULT_FPS: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    File(PathBuf),
    Camera(i32),
}

fn parse_device_index(uri: &str) -> Option<i32> {
    if let Ok(index) = uri.parse::<i32>() {
        return Some(index);
    }

    uri.strip_prefix("/dev/video")
        .filter(|suffix| !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()))
        .and_then(|suffix| suffix.parse().ok())
}

impl FromStr for VideoSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match parse_device_index(s) {
            Some(index) => VideoSource::Camera(index),
            None => VideoSource::File(PathBuf::from(s)),
        })
    }
}

impl Display for VideoSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoSource::File(path) => write!(f, "{}", path.display()),
            VideoSource::Camera(index) => write!(f, "camera #{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Image, RGB};
    use anyhow::Result;

    #[test]
    fn device_forms_parse_as_camera() {
        assert_eq!("0".parse::<VideoSource>().unwrap(), VideoSource::Camera(0));
        assert_eq!("/dev/video2".parse::<VideoSource>().unwrap(), VideoSource::Camera(2));
    }

    #[test]
    fn anything_else_is_a_file() {
        assert_eq!(
            "clips/solidYellowLeft.mp4".parse::<VideoSource>().unwrap(),
            VideoSource::File(PathBuf::from("clips/solidYellowLeft.mp4"))
        );
        assert_eq!(
            "/dev/video".parse::<VideoSource>().unwrap(),
            VideoSource::File(PathBuf::from("/dev/video"))
        );
    }

    #[test]
    fn written_video_reads_back_frame_by_frame() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("clip.mp4");

        let mut writer = VideoWriter::create(&path, 10.0, (160, 120))?;
        for _ in 0..4 {
            writer.write(&Image::blank(160, 120, RGB(0, 128, 0))?)?;
        }
        // Off-size frames are scaled to the writer's size.
        writer.write(&Image::blank(80, 60, RGB(0, 128, 0))?)?;
        assert_eq!(writer.frames(), 5);
        assert_eq!(writer.finish()?, 5);

        let reader = VideoReader::open(&VideoSource::File(path))?;
        assert!((reader.fps() - 10.0).abs() < 0.5);

        let frames = reader.collect::<Result<Vec<Image>>>()?;
        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|frame| frame.get_size() == (160, 120)));
        Ok(())
    }

    #[test]
    fn missing_file_does_not_open() {
        let source = VideoSource::File(PathBuf::from("/nonexistent/clip.mp4"));
        assert!(VideoReader::open(&source).is_err());
    }
}
