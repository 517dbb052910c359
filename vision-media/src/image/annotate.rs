use crate::{Image, RGB};
use anyhow::{bail, Result};
use opencv::core::{self, Mat, Point, Vector};
use opencv::imgproc;

pub trait Annotate {
    fn draw_rect(&mut self, top_left: (i32, i32), bottom_right: (i32, i32), color: RGB, thickness: i32) -> Result<()>;
    fn draw_line(&mut self, from: (i32, i32), to: (i32, i32), color: RGB, thickness: i32) -> Result<()>;
    fn draw_text(&mut self, text: &str, origin: (i32, i32), scale: f64, color: RGB, thickness: i32) -> Result<()>;
    fn fill_polygon(&mut self, points: &[(i32, i32)], color: RGB) -> Result<()>;
    fn draw_polyline(&mut self, points: &[(i32, i32)], closed: bool, color: RGB, thickness: i32) -> Result<()>;

    /// `alpha * self + beta * other`, saturating per channel.
    fn blend(&self, other: &Self, alpha: f64, beta: f64) -> Result<Self>
    where
        Self: Sized;
}

impl Annotate for Image {
    fn draw_rect(&mut self, top_left: (i32, i32), bottom_right: (i32, i32), color: RGB, thickness: i32) -> Result<()> {
        imgproc::rectangle_points(
            self.mat_mut(),
            Point::new(top_left.0, top_left.1),
            Point::new(bottom_right.0, bottom_right.1),
            color.scalar(),
            thickness,
            imgproc::LINE_8,
            0,
        )?;
        Ok(())
    }

    fn draw_line(&mut self, from: (i32, i32), to: (i32, i32), color: RGB, thickness: i32) -> Result<()> {
        imgproc::line(
            self.mat_mut(),
            Point::new(from.0, from.1),
            Point::new(to.0, to.1),
            color.scalar(),
            thickness,
            imgproc::LINE_8,
            0,
        )?;
        Ok(())
    }

    fn draw_text(&mut self, text: &str, origin: (i32, i32), scale: f64, color: RGB, thickness: i32) -> Result<()> {
        imgproc::put_text(
            self.mat_mut(),
            text,
            Point::new(origin.0, origin.1),
            imgproc::FONT_HERSHEY_SIMPLEX,
            scale,
            color.scalar(),
            thickness,
            imgproc::LINE_AA,
            false,
        )?;
        Ok(())
    }

    fn fill_polygon(&mut self, points: &[(i32, i32)], color: RGB) -> Result<()> {
        let polygon = points
            .iter()
            .map(|&(x, y)| Point::new(x, y))
            .collect::<Vector<Point>>();
        let polygons = Vector::<Vector<Point>>::from_iter([polygon]);

        imgproc::fill_poly(
            self.mat_mut(),
            &polygons,
            color.scalar(),
            imgproc::LINE_8,
            0,
            Point::default(),
        )?;
        Ok(())
    }

    fn draw_polyline(&mut self, points: &[(i32, i32)], closed: bool, color: RGB, thickness: i32) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let polyline = points
            .iter()
            .map(|&(x, y)| Point::new(x, y))
            .collect::<Vector<Point>>();
        let polylines = Vector::<Vector<Point>>::from_iter([polyline]);

        imgproc::polylines(
            self.mat_mut(),
            &polylines,
            closed,
            color.scalar(),
            thickness,
            imgproc::LINE_8,
            0,
        )?;
        Ok(())
    }

    fn blend(&self, other: &Self, alpha: f64, beta: f64) -> Result<Self> {
        if self.get_size() != other.get_size() {
            bail!(
                "Cannot blend frames of different sizes {:?} and {:?}",
                self.get_size(),
                other.get_size()
            );
        }

        let mut blended = Mat::default();
        core::add_weighted(self.mat(), alpha, other.mat(), beta, 0.0, &mut blended, -1)?;
        Image::from_mat(blended)
    }
}
