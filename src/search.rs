//! Mean-intensity guided patch search.
//!
//! The replacement patch is picked from a `k`x`k` grid of boxes around the
//! blemish box. Each candidate is scored by how close its mean, weighted by
//! the statistics mask, comes to the mean of the ring *around* the blemish.
//! The closest candidate wins; the centre cell (the blemish itself) is never
//! considered.

use image::GrayImage;

use crate::error::{Error, Result};
use crate::mask::inverted;

/// Score of one candidate box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScore {
    /// Grid cell as `(row, column)`.
    pub cell: (u32, u32),
    /// Top-left corner of the box in padded coordinates.
    pub position: (u32, u32),
    /// Masked mean intensity of the box.
    pub mean: f64,
    /// Absolute difference from the surround mean.
    pub difference: f64,
}

/// Outcome of a patch search.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchMatch {
    /// Mean intensity of the blemish box outside the statistics mask.
    pub surround_mean: f64,
    /// The winning candidate.
    pub best: CandidateScore,
    /// Every candidate in row-major scan order.
    pub candidates: Vec<CandidateScore>,
}

/// Border width that keeps the detection box and the whole candidate grid
/// inside the padded workspace for any click on the image.
#[must_use]
pub fn required_border(size: u32) -> u32 {
    size.saturating_add(size.saturating_sub(1) / 2)
}

/// Spacing between neighbouring grid cells.
///
/// Zero when the grid has more than `2 * size + 1` cells per side.
#[must_use]
pub fn grid_step(size: u32, grid: u32) -> u32 {
    size / ((grid - 1) / 2)
}

/// Top-left corners of every non-centre grid cell around `site`, in
/// row-major order, as `((row, column), (x, y))`.
///
/// Corners may be negative when the grid would leave the buffer.
#[must_use]
pub fn candidate_origins(site: (u32, u32), size: u32, grid: u32) -> Vec<((u32, u32), (i64, i64))> {
    let half = i64::from((size - 1) / 2);
    let step = i64::from(grid_step(size, grid));
    let mid = grid / 2;
    let left = i64::from(site.0) - half;
    let top = i64::from(site.1) - half;

    let mut origins = Vec::with_capacity(grid.saturating_mul(grid).saturating_sub(1) as usize);
    for row in 0..grid {
        for col in 0..grid {
            if row == mid && col == mid {
                continue;
            }
            let dx = (i64::from(col) - i64::from(mid)) * step;
            let dy = (i64::from(row) - i64::from(mid)) * step;
            origins.push(((row, col), (left + dx, top + dy)));
        }
    }
    origins
}

/// Mean of `gray` over the `mask`-selected pixels of the box at `(left, top)`.
///
/// An empty selection has mean 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn masked_mean(gray: &GrayImage, left: u32, top: u32, mask: &GrayImage) -> f64 {
    let mut sum = 0u64;
    let mut count = 0u64;
    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] != 0 {
            sum += u64::from(gray.get_pixel(left + x, top + y)[0]);
            count += 1;
        }
    }
    if count == 0 {
        return 0.0;
    }
    sum as f64 / count as f64
}

/// Check that a box fits in the buffer and return its corner as unsigned.
fn fit_box(gray: &GrayImage, origin: (i64, i64), size: u32) -> Result<(u32, u32)> {
    let (width, height) = gray.dimensions();
    let fits = origin.0 >= 0
        && origin.1 >= 0
        && origin.0 + i64::from(size) <= i64::from(width)
        && origin.1 + i64::from(size) <= i64::from(height);
    if !fits {
        return Err(Error::RegionOutOfBounds {
            x: origin.0,
            y: origin.1,
            size,
            width,
            height,
        });
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let corner = (origin.0 as u32, origin.1 as u32);
    Ok(corner)
}

/// Find the grid box whose masked mean best matches the blemish surround.
///
/// `site` is the padded click point, `stats_mask` the box-sized statistics
/// mask and `grid` the (odd) number of cells per side. The first candidate
/// in row-major order wins ties.
///
/// # Errors
///
/// Returns [`Error::RegionOutOfBounds`] if the blemish box or any candidate
/// box leaves `gray`, and [`Error::InvalidOptions`] for a grid below 3 or one
/// too fine to step away from the blemish box.
pub fn search_patch(
    gray: &GrayImage,
    site: (u32, u32),
    stats_mask: &GrayImage,
    grid: u32,
) -> Result<PatchMatch> {
    if grid < 3 {
        return Err(Error::InvalidOptions(format!(
            "search grid must be at least 3, got {grid}"
        )));
    }
    let size = stats_mask.width();
    if grid_step(size, grid) == 0 {
        return Err(Error::InvalidOptions(format!(
            "search grid {grid} is too fine for box size {size}"
        )));
    }
    let half = i64::from(size.saturating_sub(1) / 2);

    let blemish_box = fit_box(
        gray,
        (i64::from(site.0) - half, i64::from(site.1) - half),
        size,
    )?;
    let surround_mean = masked_mean(gray, blemish_box.0, blemish_box.1, &inverted(stats_mask));

    let mut candidates = Vec::new();
    let mut best: Option<CandidateScore> = None;

    for (cell, origin) in candidate_origins(site, size, grid) {
        let position = fit_box(gray, origin, size)?;
        let mean = masked_mean(gray, position.0, position.1, stats_mask);
        let score = CandidateScore {
            cell,
            position,
            mean,
            difference: (mean - surround_mean).abs(),
        };
        if best.is_none_or(|b| score.difference < b.difference) {
            best = Some(score);
        }
        candidates.push(score);
    }

    let best = best.ok_or_else(|| Error::InvalidOptions("empty search grid".into()))?;
    log::debug!(
        "surround mean {surround_mean:.2}, best cell {:?} at {:?} (mean {:.2}, diff {:.2})",
        best.cell,
        best.position,
        best.mean,
        best.difference
    );

    Ok(PatchMatch {
        surround_mean,
        best,
        candidates,
    })
}
