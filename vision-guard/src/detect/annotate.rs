use crate::detect::STATS_COLOR;
use anyhow::Result;
use vision_inference::inference::yolo::inference_yolo_detect::YoloDetectResult;
use vision_inference::utils::class_names::ClassNames;
use vision_media::{Annotate, Image, RGB};

const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f64 = 0.5;
const LABEL_MIN_Y: i32 = 20;

pub fn detection_label(names: &ClassNames, detection: &YoloDetectResult) -> String {
    format!("{}: {:.2}", names.label(detection.class_index), detection.score)
}

/// Label anchor above the box, kept inside the frame's top margin.
pub fn label_origin(detection: &YoloDetectResult) -> (i32, i32) {
    let (x1, y1) = (detection.x1 as i32, detection.y1 as i32);
    (x1, (y1 - 10).max(LABEL_MIN_Y))
}

pub fn draw_detections(
    image: &mut Image,
    detections: &[YoloDetectResult],
    names: &ClassNames,
    color: RGB,
) -> Result<()> {
    for detection in detections {
        image.draw_rect(
            (detection.x1 as i32, detection.y1 as i32),
            (detection.x2 as i32, detection.y2 as i32),
            color,
            BOX_THICKNESS,
        )?;
        image.draw_text(
            &detection_label(names, detection),
            label_origin(detection),
            LABEL_SCALE,
            color,
            BOX_THICKNESS,
        )?;
    }

    Ok(())
}

/// `inference` is in seconds.
pub fn draw_stats(image: &mut Image, fps: f64, inference: f64) -> Result<()> {
    image.draw_text(&format!("FPS: {fps:.2}"), (20, 30), 0.7, STATS_COLOR, 2)?;
    image.draw_text(
        &format!("Inference: {:.1} ms", inference * 1000.0),
        (20, 60),
        0.6,
        STATS_COLOR,
        2,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(x1: f32, y1: f32) -> YoloDetectResult {
        YoloDetectResult {
            class_index: 1,
            score: 0.876,
            x1,
            y1,
            x2: x1 + 40.0,
            y2: y1 + 30.0,
        }
    }

    #[test]
    fn label_uses_class_name_and_two_decimals() {
        let names = ClassNames::from_iter([(0, "car"), (1, "truck")]);
        assert_eq!(detection_label(&names, &detection(0.0, 0.0)), "truck: 0.88");
        assert_eq!(detection_label(&ClassNames::default(), &detection(0.0, 0.0)), "cls_1: 0.88");
    }

    #[test]
    fn label_stays_below_top_margin() {
        assert_eq!(label_origin(&detection(15.0, 5.0)), (15, 20));
        assert_eq!(label_origin(&detection(15.0, 100.0)), (15, 90));
    }

    #[test]
    fn boxes_are_drawn_in_detector_colour() -> Result<()> {
        let mut image = Image::blank(200, 200, RGB::BLACK)?;
        draw_detections(&mut image, &[detection(50.0, 80.0)], &ClassNames::default(), RGB(255, 191, 0))?;

        assert_eq!(image.pixel(50, 95)?, RGB(255, 191, 0));
        assert_eq!(image.pixel(70, 95)?, RGB::BLACK);
        Ok(())
    }
}
