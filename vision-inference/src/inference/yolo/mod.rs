use inference_yolo_detect::YoloDetectResult;

pub mod inference_yolo_detect;

/// Upper bound on boxes kept per frame after suppression.
pub const MAX_DETECTIONS: usize = 300;

impl YoloDetectResult {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &YoloDetectResult) -> f32 {
        let intersection_width = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let intersection_height = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection_area = intersection_width * intersection_height;

        let union = self.area() + other.area() - intersection_area;
        if union > 0.0 {
            intersection_area / union
        } else {
            0.0
        }
    }
}

pub trait NMSImplement {
    fn non_maximum_suppression(self, iou_threshold: f32) -> Vec<YoloDetectResult>;
}

impl NMSImplement for Vec<YoloDetectResult> {
    /// Class aware: boxes of different classes never suppress each other.
    fn non_maximum_suppression(self, iou_threshold: f32) -> Vec<YoloDetectResult> {
        let mut candidates = self;
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut result: Vec<YoloDetectResult> = Vec::new();
        for candidate in candidates {
            if result.len() >= MAX_DETECTIONS {
                break;
            }

            let suppressed = result.iter().any(|kept| {
                kept.class_index == candidate.class_index && kept.iou(&candidate) > iou_threshold
            });
            if !suppressed {
                result.push(candidate);
            }
        }

        result
    }
}
