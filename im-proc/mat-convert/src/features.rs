use cv_mat::{Depth, Mat, MatData, MatType, Point};
use image::{GrayImage, Pixel, Rgb};
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut},
    hough::{LineDetectionOptions, detect_lines},
};

use crate::{
    Error, Result,
    bridge::{AnyImage, map_any_image, pixel_like},
};

/// A color given as R,G,B,A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Samples for a matrix with `channels` channels, in matrix order.
    fn samples(&self, channels: u8) -> [u8; 4] {
        let luma = Rgb([self.r, self.g, self.b]).to_luma().0[0];
        match channels {
            1 => [luma, 0, 0, 0],
            2 => [luma, self.a, 0, 0],
            _ => [self.b, self.g, self.r, self.a],
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(R: {}, G: {}, B: {}, A: {})",
            self.r, self.g, self.b, self.a
        )
    }
}

fn gray_input(src: &dyn MatData) -> Result<GrayImage> {
    if src.mat_type() != MatType::CV_8UC1 {
        return Err(Error::UnsupportedType(src.mat_type()));
    }
    AnyImage::from_mat(src)?
        .into_gray()
        .ok_or(Error::UnsupportedType(src.mat_type()))
}

/// Canny edge detection on a single channel 8 bit matrix.
///
/// Only an `aperture` of 3 is available.
pub fn canny(src: &dyn MatData, low: f64, high: f64, aperture: u32) -> Result<Mat> {
    if aperture != 3 {
        return Err(Error::UnsupportedAperture(aperture));
    }
    let gray = gray_input(src)?;
    if gray.width() == 0 || gray.height() == 0 {
        return Ok(Mat::zeros(src.rows(), src.cols(), MatType::CV_8UC1)?);
    }
    tracing::trace!("canny {low}/{high} on {}x{}", src.cols(), src.rows());
    let edges = imageproc::edges::canny(&gray, low as f32, high as f32);
    AnyImage::Gray(edges).into_mat()
}

/// Parameters of [hough_lines_p].
///
/// The accumulator resolution is fixed at one pixel and one degree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughParams {
    /// Minimum number of votes for a line.
    pub threshold: u32,
    /// Radius within which weaker lines are suppressed, in accumulator cells.
    pub suppression_radius: u32,
    /// Segments shorter than this are discarded.
    pub min_line_length: f64,
    /// Largest gap between points on the same segment.
    pub max_line_gap: f64,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            threshold: 50,
            suppression_radius: 8,
            min_line_length: 0.0,
            max_line_gap: 0.0,
        }
    }
}

/// Find line segments in a binary edge image.
///
/// Returns segments as `[x1, y1, x2, y2]`.
pub fn hough_lines_p(src: &dyn MatData, params: HoughParams) -> Result<Vec<[f64; 4]>> {
    let gray = gray_input(src)?;
    let lines = detect_lines(
        &gray,
        LineDetectionOptions {
            vote_threshold: params.threshold,
            suppression_radius: params.suppression_radius,
        },
    );
    tracing::trace!("hough found {} candidate lines", lines.len());
    let mut segments = Vec::new();
    for line in lines {
        let (sin, cos) = (line.angle_in_degrees as f64).to_radians().sin_cos();
        walk_line(&gray, line.r as f64, sin, cos, &params, &mut segments);
    }
    Ok(segments)
}

/// Walk along `x cos + y sin = r` and split it into segments of set pixels.
fn walk_line(
    gray: &GrayImage,
    r: f64,
    sin: f64,
    cos: f64,
    params: &HoughParams,
    segments: &mut Vec<[f64; 4]>,
) {
    let (w, h) = gray.dimensions();
    // step along the axis the line is closest to
    let points: Vec<(i64, i64)> = if sin.abs() >= cos.abs() {
        (0..w as i64)
            .map(|x| (x, ((r - x as f64 * cos) / sin).round() as i64))
            .collect()
    } else {
        (0..h as i64)
            .map(|y| (((r - y as f64 * sin) / cos).round() as i64, y))
            .collect()
    };
    let is_set = |(x, y): (i64, i64)| {
        x >= 0 && y >= 0 && x < w as i64 && y < h as i64 && gray.get_pixel(x as u32, y as u32)[0] > 0
    };
    let dist = |a: (i64, i64), b: (i64, i64)| {
        (((a.0 - b.0).pow(2) + (a.1 - b.1).pow(2)) as f64).sqrt()
    };

    let mut current: Option<((i64, i64), (i64, i64))> = None;
    let close = |seg: Option<((i64, i64), (i64, i64))>, segments: &mut Vec<[f64; 4]>| {
        if let Some((start, end)) = seg {
            if dist(start, end) >= params.min_line_length {
                segments.push([start.0 as f64, start.1 as f64, end.0 as f64, end.1 as f64]);
            }
        }
    };
    for p in points {
        if !is_set(p) {
            continue;
        }
        current = match current {
            Some((start, end)) if dist(end, p) <= params.max_line_gap + 1.0 => Some((start, p)),
            seg => {
                close(seg, segments);
                Some((p, p))
            }
        };
    }
    close(current, segments);
}

/// Draw a line segment in place on an 8 bit matrix.
///
/// `color` is R,G,B,A and is written in the matrix's B,G,R,A order. Single
/// channel matrices receive the luma of the color.
pub fn line(img: &mut Mat, p1: Point, p2: Point, color: Color, thickness: u32) -> Result<()> {
    let mt = img.mat_type();
    if mt.depth != Depth::U8 {
        return Err(Error::UnsupportedType(mt));
    }
    tracing::trace!("line {p1:?} -> {p2:?} {color} thickness {thickness}");
    let samples = color.samples(mt.channels);
    let canvas = AnyImage::from_mat(&*img)?;
    let drawn = map_any_image!(canvas, x, {
        let mut x = x;
        let px = pixel_like(&x, &samples);
        if thickness <= 1 {
            draw_line_segment_mut(
                &mut x,
                (p1.x as f32, p1.y as f32),
                (p2.x as f32, p2.y as f32),
                px,
            );
        } else if p1 == p2 {
            draw_filled_circle_mut(&mut x, (p1.x, p1.y), thickness as i32 / 2, px);
        } else {
            draw_polygon_mut(&mut x, &thick_quad(p1, p2, thickness), px);
        }
        x
    });
    *img = drawn.into_mat()?;
    Ok(())
}

/// Corners of a `thickness` wide rectangle around the segment `p1`-`p2`.
fn thick_quad(p1: Point, p2: Point, thickness: u32) -> [imageproc::point::Point<i32>; 4] {
    let (dx, dy) = ((p2.x - p1.x) as f64, (p2.y - p1.y) as f64);
    let len = (dx * dx + dy * dy).sqrt();
    let half = thickness as f64 / 2.0;
    let (nx, ny) = (-dy / len * half, dx / len * half);
    let corner = |p: Point, sx: f64, sy: f64| {
        imageproc::point::Point::new((p.x as f64 + sx).round() as i32, (p.y as f64 + sy).round() as i32)
    };
    [
        corner(p1, nx, ny),
        corner(p2, nx, ny),
        corner(p2, -nx, -ny),
        corner(p1, -nx, -ny),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_edge() -> Mat {
        let mut m = Mat::zeros(20, 20, MatType::CV_8UC1).unwrap();
        for y in 0..20 {
            for x in 10..20 {
                m.set_sample(y, x, 0, 255);
            }
        }
        m
    }

    #[test]
    fn canny_finds_step() {
        let edges = canny(&step_edge(), 50.0, 150.0, 3).unwrap();
        assert_eq!(edges.mat_type(), MatType::CV_8UC1);
        assert!((8..12).any(|x| edges.sample(10, x, 0) > 0));
        assert!((0..20).all(|y| edges.sample(y, 3, 0) == 0));
    }

    #[test]
    fn canny_rejects_input() {
        assert!(matches!(
            canny(&step_edge(), 50.0, 150.0, 5),
            Err(Error::UnsupportedAperture(5))
        ));
        let color = Mat::zeros(4, 4, MatType::CV_8UC3).unwrap();
        assert!(matches!(
            canny(&color, 50.0, 150.0, 3),
            Err(Error::UnsupportedType(_))
        ));
    }

    #[test]
    fn canny_of_empty_matrix() {
        for (rows, cols) in [(0, 0), (0, 5), (5, 0)] {
            let empty = Mat::zeros(rows, cols, MatType::CV_8UC1).unwrap();
            let edges = canny(&empty, 50.0, 150.0, 3).unwrap();
            assert_eq!(edges.mat_type(), MatType::CV_8UC1);
            assert_eq!((edges.rows(), edges.cols()), (rows, cols));
        }
    }

    #[test]
    fn hough_horizontal_segment() {
        let mut m = Mat::zeros(20, 20, MatType::CV_8UC1).unwrap();
        for x in 2..18 {
            m.set_sample(10, x, 0, 255);
        }
        let params = HoughParams {
            threshold: 10,
            suppression_radius: 8,
            min_line_length: 10.0,
            max_line_gap: 1.0,
        };
        let segments = hough_lines_p(&m, params).unwrap();
        assert!(!segments.is_empty());
        for [x1, y1, x2, y2] in segments {
            assert!((y1 - 10.0).abs() <= 1.0 && (y2 - 10.0).abs() <= 1.0);
            assert!((x2 - x1).abs() >= 10.0);
        }
    }

    #[test]
    fn hough_nothing_in_blank_image() {
        let m = Mat::zeros(20, 20, MatType::CV_8UC1).unwrap();
        assert!(hough_lines_p(&m, HoughParams::default()).unwrap().is_empty());
    }

    #[test]
    fn line_is_bgr() {
        let mut m = Mat::zeros(10, 10, MatType::CV_8UC3).unwrap();
        line(&mut m, Point::new(0, 5), Point::new(9, 5), Color::rgb(255, 0, 0), 1).unwrap();
        assert_eq!(m.mat_type(), MatType::CV_8UC3);
        let px: Vec<i32> = (0..3).map(|c| m.sample(5, 3, c)).collect();
        assert_eq!(px, [0, 0, 255]);
        assert_eq!(m.sample(4, 3, 2), 0);
    }

    #[test]
    fn thick_line() {
        let mut m = Mat::zeros(10, 10, MatType::CV_8UC1).unwrap();
        line(&mut m, Point::new(0, 5), Point::new(9, 5), Color::rgb(255, 255, 255), 3).unwrap();
        for y in 4..=6 {
            assert_eq!(m.sample(y, 5, 0), 255, "row {y}");
        }
        assert_eq!(m.sample(1, 5, 0), 0);
    }

    #[test]
    fn color_display() {
        assert_eq!(Color::rgba(1, 2, 3, 4).to_string(), "(R: 1, G: 2, B: 3, A: 4)");
    }
}
