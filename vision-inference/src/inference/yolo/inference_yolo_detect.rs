use crate::engine::inference_engine::{ExecutionProvider, OnnxSession};
use crate::inference::yolo::NMSImplement;
use crate::utils::class_names::ClassNames;
use anyhow::{bail, Result};
use log::{debug, warn};
use ndarray::{s, Array4, ArrayView2, Axis, Ix3};
use rayon::prelude::*;
use std::path::Path;
use vision_media::{Image, Letterbox, ResizeImage, RGB};

/// Grey used by Ultralytics to pad letterboxed inputs.
const LETTERBOX_PAD: RGB = RGB(114, 114, 114);

pub trait YoloDetectInference {
    fn inference_yolo(&self, image: &Image) -> Result<Vec<YoloDetectResult>>;
    fn names(&self) -> &ClassNames;
}

/// A detection in source-frame pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct YoloDetectResult {
    pub class_index: usize,
    pub score: f32,

    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloOptions {
    pub input_size: (i32, i32),
    pub confidence: f32,
    pub iou_threshold: f32,
}

impl Default for YoloOptions {
    fn default() -> Self {
        Self {
            input_size: (640, 640),
            confidence: 0.25,
            iou_threshold: 0.7,
        }
    }
}

pub struct YoloDetectSession {
    session: OnnxSession,
    names: ClassNames,
    options: YoloOptions,
}

impl YoloDetectSession {
    pub fn new(model_path: impl AsRef<Path>, executor: ExecutionProvider, options: YoloOptions) -> Result<Self> {
        let model_path = model_path.as_ref();
        let session = OnnxSession::new(model_path, executor)?;

        let names = match session.metadata_value("names") {
            Ok(Some(raw)) => ClassNames::parse(&raw),
            Ok(None) => {
                warn!("{} carries no class names, labels fall back to indices", model_path.display());
                ClassNames::default()
            }
            Err(err) => {
                warn!("Failed to read metadata of {}: {err}", model_path.display());
                ClassNames::default()
            }
        };
        debug!("{} knows {} classes", model_path.display(), names.len());

        Ok(Self {
            session,
            names,
            options,
        })
    }
}

impl YoloDetectInference for YoloDetectSession {
    fn inference_yolo(&self, image: &Image) -> Result<Vec<YoloDetectResult>> {
        let (letterboxed, geometry) = image.letterbox(self.options.input_size, LETTERBOX_PAD)?;
        let tensor = image_to_tensor(&letterboxed)?;

        let output = self.session.run(tensor)?;
        let output = output.into_dimensionality::<Ix3>()?;
        if output.shape()[1] <= 4 {
            bail!("Unexpected detector output shape {:?}", output.shape());
        }

        let detections = decode_output(
            output.index_axis(Axis(0), 0),
            self.options.confidence,
            &geometry,
            image.get_size(),
        );
        debug!("{} candidate boxes above confidence", detections.len());

        Ok(detections.non_maximum_suppression(self.options.iou_threshold))
    }

    fn names(&self) -> &ClassNames {
        &self.names
    }
}

/// BGR bytes to a normalised RGB `[1, 3, h, w]` tensor.
pub(crate) fn image_to_tensor(image: &Image) -> Result<Array4<f32>> {
    let (width, height) = image.get_size();
    let (width, height) = (width as usize, height as usize);
    let data = image.raw_data()?;

    let mut tensor = Array4::<f32>::zeros((1, 3, height, width));
    for (index, pixel) in data.chunks_exact(3).enumerate() {
        let (x, y) = (index % width, index / width);
        tensor[[0, 0, y, x]] = pixel[2] as f32 / 255.0;
        tensor[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
        tensor[[0, 2, y, x]] = pixel[0] as f32 / 255.0;
    }

    Ok(tensor)
}

/// Decode a YOLOv8 head of shape `[4 + classes, anchors]`.
///
/// Rows 0..4 are `cx, cy, w, h` on the letterboxed canvas, the remaining rows are
/// per-class scores. Each anchor keeps its best class if that score clears
/// `confidence`; boxes are mapped back through `letterbox` and clamped to `frame_size`.
pub fn decode_output(
    output: ArrayView2<'_, f32>,
    confidence: f32,
    letterbox: &Letterbox,
    frame_size: (i32, i32),
) -> Vec<YoloDetectResult> {
    let (max_x, max_y) = (frame_size.0 as f32, frame_size.1 as f32);

    output
        .t()
        .axis_iter(Axis(0))
        .into_par_iter()
        .filter_map(|anchor| {
            let (class_index, score) = anchor
                .slice(s![4..])
                .iter()
                .copied()
                .enumerate()
                .fold((0, f32::MIN), |best, current| if current.1 > best.1 { current } else { best });

            if score <= confidence {
                return None;
            }

            let (cx, cy, w, h) = (anchor[0], anchor[1], anchor[2], anchor[3]);
            let (x1, y1) = letterbox.unmap_point(cx - w / 2.0, cy - h / 2.0);
            let (x2, y2) = letterbox.unmap_point(cx + w / 2.0, cy + h / 2.0);

            Some(YoloDetectResult {
                class_index,
                score,
                x1: x1.clamp(0.0, max_x),
                y1: y1.clamp(0.0, max_y),
                x2: x2.clamp(0.0, max_x),
                y2: y2.clamp(0.0, max_y),
            })
        })
        .collect()
}
