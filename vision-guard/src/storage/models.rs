use crate::detect::stats::ProcessStats;
use anyhow::{anyhow, Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub const USERNAME_MAX_LEN: usize = 80;
pub const EMAIL_MAX_LEN: usize = 120;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Image,
    Video,
    Live,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Image => "image",
            InputType::Video => "video",
            InputType::Live => "live",
        }
    }
}

impl Display for InputType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "image" => Ok(InputType::Image),
            "video" => Ok(InputType::Video),
            "live" => Ok(InputType::Live),
            other => Err(anyhow!("Unknown input type {other:?}")),
        }
    }
}

impl ToSql for InputType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for InputType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|_| FromSqlError::InvalidType)
    }
}

/// A stored processing result. `output_path` is relative to the static root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRecord {
    pub id: i64,
    pub user_id: i64,
    pub input_type: InputType,
    pub input_filename: Option<String>,
    pub output_path: String,
    pub created_at: DateTime<Utc>,
    pub average_fps: Option<f64>,
    pub average_inference: Option<f64>,
    pub elapsed_time: Option<f64>,
}

impl DetectionRecord {
    /// File name of the output inside `static/outputs/`.
    pub fn output_filename(&self) -> &str {
        self.output_path.rsplit('/').next().unwrap_or(&self.output_path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDetection {
    pub user_id: i64,
    pub input_type: InputType,
    pub input_filename: Option<String>,
    pub output_path: String,
    pub average_fps: Option<f64>,
    pub average_inference: Option<f64>,
    pub elapsed_time: Option<f64>,
}

impl NewDetection {
    pub fn from_stats(
        user_id: i64,
        input_type: InputType,
        input_filename: Option<String>,
        output_filename: &str,
        stats: &ProcessStats,
    ) -> Self {
        Self {
            user_id,
            input_type,
            input_filename,
            output_path: format!("outputs/{output_filename}"),
            average_fps: Some(stats.average_fps),
            average_inference: Some(stats.average_inference),
            elapsed_time: stats.elapsed_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_type_names() -> Result<()> {
        for kind in [InputType::Image, InputType::Video, InputType::Live] {
            assert_eq!(kind.as_str().parse::<InputType>()?, kind);
        }
        assert!("webcam".parse::<InputType>().is_err());
        Ok(())
    }

    #[test]
    fn new_detection_points_into_outputs() {
        let stats = ProcessStats::single(12.5, 0.08);
        let new = NewDetection::from_stats(3, InputType::Image, Some("a.png".into()), "x_processed.png", &stats);

        assert_eq!(new.output_path, "outputs/x_processed.png");
        assert_eq!(new.average_fps, Some(12.5));
        assert_eq!(new.elapsed_time, None);
    }
}
