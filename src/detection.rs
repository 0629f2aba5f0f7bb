//! Blemish boundary detection.
//!
//! Localizes the defect inside a fixed square box around the click:
//! 1. **Scharr gradient** of the smoothed grayscale, both axes, equally weighted
//! 2. **Binary threshold** of the 8-bit gradient map
//! 3. **Largest external contour** of the thresholded map
//! 4. **Minimal enclosing circle** of that contour
//!
//! The circle becomes the [`BlemishGeometry`] that drives mask construction.

use image::{imageops, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::gradients::{horizontal_scharr, vertical_scharr};
use imageproc::point::Point;

use crate::border::pad_reflect_101;
use crate::error::{Error, Result};

/// Tolerance used when testing whether a point lies inside a circle.
const CIRCLE_EPSILON: f64 = 1e-7;

/// Slack removed before ceiling the radius so exact integers stay exact.
const RADIUS_SLACK: f64 = 1e-6;

/// Centre and radius of the detected blemish, local to the detection box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlemishGeometry {
    /// Circle centre, in box coordinates.
    pub center: (u32, u32),
    /// Circle radius, never larger than the box half size.
    pub radius: u32,
}

/// A circle with real-valued centre and radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    /// Centre x.
    pub x: f64,
    /// Centre y.
    pub y: f64,
    /// Radius.
    pub radius: f64,
}

impl Circle {
    fn from_two(a: (f64, f64), b: (f64, f64)) -> Self {
        let x = (a.0 + b.0) / 2.0;
        let y = (a.1 + b.1) / 2.0;
        Self {
            x,
            y,
            radius: (a.0 - x).hypot(a.1 - y),
        }
    }

    /// Circle through three points, or the widest two-point circle when they
    /// are collinear.
    fn from_three(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Self {
        let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
        if d.abs() < 1e-12 {
            let mut widest = Self::from_two(a, b);
            for candidate in [Self::from_two(a, c), Self::from_two(b, c)] {
                if candidate.radius > widest.radius {
                    widest = candidate;
                }
            }
            return widest;
        }

        let a2 = a.0 * a.0 + a.1 * a.1;
        let b2 = b.0 * b.0 + b.1 * b.1;
        let c2 = c.0 * c.0 + c.1 * c.1;
        let x = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
        let y = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;
        Self {
            x,
            y,
            radius: (a.0 - x).hypot(a.1 - y),
        }
    }

    /// Whether `p` lies inside or on the circle.
    #[must_use]
    pub fn contains(&self, p: (f64, f64)) -> bool {
        (p.0 - self.x).hypot(p.1 - self.y) <= self.radius + CIRCLE_EPSILON
    }
}

/// Saturate an absolute gradient response to the 8-bit range.
fn abs_saturate(v: i16) -> f32 {
    f32::from(v.unsigned_abs().min(255))
}

/// Combined Scharr gradient magnitude of an extracted detection box.
///
/// The box is filtered as an isolated image: it is reflect-101 padded by one
/// pixel first, so nothing outside it contributes. Each axis response is
/// taken as an absolute value saturated to 255, and the two are averaged
/// with ties rounded to even.
///
/// # Errors
///
/// Returns [`Error::EmptyImage`] if the box has a zero dimension.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn gradient_map(region: &GrayImage) -> Result<GrayImage> {
    let padded = pad_reflect_101(region, 1)?;
    let gx = horizontal_scharr(&padded);
    let gy = vertical_scharr(&padded);

    Ok(GrayImage::from_fn(region.width(), region.height(), |x, y| {
        let h = gx.get_pixel(x + 1, y + 1)[0];
        let v = gy.get_pixel(x + 1, y + 1)[0];
        let combined = (0.5 * abs_saturate(h) + 0.5 * abs_saturate(v)).round_ties_even();
        Luma([combined.clamp(0.0, 255.0) as u8])
    }))
}

/// Binary threshold: pixels strictly above `level` become 255, others 0.
#[must_use]
pub fn threshold_map(map: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(map.width(), map.height(), |x, y| {
        if map.get_pixel(x, y)[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Shoelace area of a closed polygon.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    twice.unsigned_abs() as f64 / 2.0
}

/// Boundary points of the external contour with the largest area.
///
/// Only outermost borders are considered. The map is traced inside a
/// one-pixel zero frame so regions touching the box edge still count as
/// outer borders; returned points are in `binary` coordinates.
///
/// Contours come in raster-scan order and a later contour replaces the
/// current pick only with a strictly larger area, so the first one wins
/// ties. Returns `None` when the map has no foreground.
#[must_use]
pub fn largest_external_contour(binary: &GrayImage) -> Option<Vec<Point<i32>>> {
    let mut framed = GrayImage::new(binary.width() + 2, binary.height() + 2);
    imageops::replace(&mut framed, binary, 1, 1);

    let mut best: Option<(Vec<Point<i32>>, f64)> = None;

    for contour in find_contours::<i32>(&framed) {
        if contour.border_type != BorderType::Outer || contour.parent.is_some() {
            continue;
        }
        let area = contour_area(&contour.points);
        match &best {
            Some((_, best_area)) if area <= *best_area => {}
            _ => best = Some((contour.points, area)),
        }
    }

    best.map(|(points, _)| {
        points
            .into_iter()
            .map(|p| Point::new(p.x - 1, p.y - 1))
            .collect()
    })
}

/// Smallest circle containing every point.
///
/// Incremental construction over the points in their given order, so the
/// result is deterministic. Returns `None` for an empty slice.
#[must_use]
pub fn min_enclosing_circle(points: &[Point<i32>]) -> Option<Circle> {
    let pts: Vec<(f64, f64)> = points
        .iter()
        .map(|p| (f64::from(p.x), f64::from(p.y)))
        .collect();
    let first = *pts.first()?;

    let mut circle = Circle {
        x: first.0,
        y: first.1,
        radius: 0.0,
    };

    for (i, &p) in pts.iter().enumerate().skip(1) {
        if circle.contains(p) {
            continue;
        }
        circle = Circle {
            x: p.0,
            y: p.1,
            radius: 0.0,
        };
        for (j, &q) in pts[..i].iter().enumerate() {
            if circle.contains(q) {
                continue;
            }
            circle = Circle::from_two(p, q);
            for &r in &pts[..j] {
                if !circle.contains(r) {
                    circle = Circle::from_three(p, q, r);
                }
            }
        }
    }

    Some(circle)
}

/// Convert a fitted circle into box-local integer geometry.
///
/// The centre is truncated, the radius ceiling-rounded, and both are kept
/// inside the box: the centre within `0..size` and the radius at most
/// `(size - 1) / 2`.
#[must_use]
pub fn geometry_from_circle(circle: &Circle, size: u32) -> BlemishGeometry {
    let half = (size - 1) / 2;
    let limit = f64::from(size - 1);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let center = (
        circle.x.clamp(0.0, limit) as u32,
        circle.y.clamp(0.0, limit) as u32,
    );
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let radius = ((circle.radius - RADIUS_SLACK).ceil().clamp(0.0, f64::from(half))) as u32;

    BlemishGeometry { center, radius }
}

/// Detect the blemish around `site` in the padded smoothed grayscale.
///
/// `size` is the (odd) detection box side, `threshold` the gradient level a
/// pixel must exceed to count as boundary. Returns `Ok(None)` when nothing in
/// the box crosses the threshold.
///
/// # Errors
///
/// Returns [`Error::RegionOutOfBounds`] if the box does not fit in `gray`.
pub fn detect_blemish(
    gray: &GrayImage,
    site: (u32, u32),
    size: u32,
    threshold: u8,
) -> Result<Option<BlemishGeometry>> {
    let half = i64::from(size.saturating_sub(1) / 2);
    let (width, height) = gray.dimensions();
    let left = i64::from(site.0) - half;
    let top = i64::from(site.1) - half;
    if left < 0
        || top < 0
        || left + i64::from(size) > i64::from(width)
        || top + i64::from(size) > i64::from(height)
    {
        return Err(Error::RegionOutOfBounds {
            x: left,
            y: top,
            size,
            width,
            height,
        });
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let region = imageops::crop_imm(gray, left as u32, top as u32, size, size).to_image();
    let gradient = gradient_map(&region)?;
    let binary = threshold_map(&gradient, threshold);

    let Some(contour) = largest_external_contour(&binary) else {
        log::debug!("no gradient above {threshold} around {site:?}");
        return Ok(None);
    };
    let Some(circle) = min_enclosing_circle(&contour) else {
        return Ok(None);
    };

    let geometry = geometry_from_circle(&circle, size);
    log::debug!(
        "blemish contour of {} points, circle ({:.1}, {:.1}) r={:.2} -> {:?}",
        contour.len(),
        circle.x,
        circle.y,
        circle.radius,
        geometry
    );
    Ok(Some(geometry))
}
