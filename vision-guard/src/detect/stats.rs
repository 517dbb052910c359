use serde::Serialize;
use std::time::Duration;

/// Summary of a processing run. `average_inference` is in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ProcessStats {
    pub frames: u64,
    pub average_fps: f64,
    pub average_inference: f64,
    pub elapsed_time: Option<f64>,
}

impl ProcessStats {
    pub fn single(fps: f64, inference: f64) -> Self {
        Self {
            frames: 1,
            average_fps: fps,
            average_inference: inference,
            elapsed_time: None,
        }
    }
}

pub fn fps_from(elapsed: Duration) -> f64 {
    1.0 / elapsed.as_secs_f64().max(1e-6)
}

#[derive(Debug, Default)]
pub struct StatsAccumulator {
    frames: u64,
    total_fps: f64,
    total_inference: f64,
}

impl StatsAccumulator {
    pub fn record(&mut self, fps: f64, inference: f64) {
        self.frames += 1;
        self.total_fps += fps;
        self.total_inference += inference;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn finish(self, elapsed: Duration) -> ProcessStats {
        let (average_fps, average_inference) = match self.frames {
            0 => (0.0, 0.0),
            n => (self.total_fps / n as f64, self.total_inference / n as f64),
        };

        ProcessStats {
            frames: self.frames,
            average_fps,
            average_inference,
            elapsed_time: Some(elapsed.as_secs_f64()),
        }
    }
}
