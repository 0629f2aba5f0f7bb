//! Gradient-domain (Poisson) compositing.
//!
//! Direct pixel copies leave a visible seam wherever patch and destination
//! differ in brightness. Instead the patch is pasted by solving
//!
//! `laplacian(f) = laplacian(patch)` inside the mask, `f = destination` on its border
//!
//! so the patch keeps its texture (its gradients) while its overall level is
//! pulled towards the surrounding destination pixels.

use image::{GrayImage, Rgb, RgbImage};

use crate::error::{Error, Result};

/// Over-relaxation factor of the iterative solver.
const SOR_OMEGA: f64 = 1.9;

/// Upper bound on solver sweeps per channel.
const MAX_SWEEPS: usize = 5000;

/// Sweeps stop once no pixel moves by more than this.
const TOLERANCE: f64 = 1e-3;

/// A 4-neighbour of an unknown pixel.
#[derive(Debug, Clone, Copy)]
enum Neighbour {
    /// Another pixel being solved for.
    Unknown(usize),
    /// A fixed destination pixel on the region border.
    Fixed(Rgb<u8>),
}

/// One pixel of the Poisson system.
#[derive(Debug, Clone)]
struct Node {
    dest: (u32, u32),
    neighbours: [Neighbour; 4],
    guidance: [f64; 3],
}

/// Bounding box of the selected pixels, ignoring the outermost frame.
fn inner_bounds(mask: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let (w, h) = mask.dimensions();
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] == 0 || x == 0 || y == 0 || x + 1 >= w || y + 1 >= h {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds
}

fn to_f64(px: Rgb<u8>) -> [f64; 3] {
    [f64::from(px[0]), f64::from(px[1]), f64::from(px[2])]
}

/// Blend `patch` into `dest` under `mask`, centred on `center`.
///
/// The mask's outermost pixel frame is ignored so every blended pixel has all
/// four neighbours inside the patch. The bounding box of the remaining mask
/// is placed with its centre on `center`; destination pixels outside the
/// mask are never written. Returns `false` (and leaves `dest` alone) when the
/// mask selects nothing.
///
/// # Errors
///
/// Returns [`Error::InvalidOptions`] if `patch` and `mask` differ in size and
/// [`Error::RegionOutOfBounds`] if the placed region (plus its one-pixel
/// border) does not fit in `dest`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn seamless_clone(
    patch: &RgbImage,
    dest: &mut RgbImage,
    mask: &GrayImage,
    center: (u32, u32),
) -> Result<bool> {
    if patch.dimensions() != mask.dimensions() {
        return Err(Error::InvalidOptions(format!(
            "patch is {}x{} but mask is {}x{}",
            patch.width(),
            patch.height(),
            mask.width(),
            mask.height()
        )));
    }

    let Some((x0, y0, x1, y1)) = inner_bounds(mask) else {
        return Ok(false);
    };
    let (rw, rh) = (x1 - x0 + 1, y1 - y0 + 1);
    let left = i64::from(center.0) - i64::from(rw / 2);
    let top = i64::from(center.1) - i64::from(rh / 2);

    let (dw, dh) = dest.dimensions();
    if left < 1
        || top < 1
        || left + i64::from(rw) >= i64::from(dw)
        || top + i64::from(rh) >= i64::from(dh)
    {
        return Err(Error::RegionOutOfBounds {
            x: left,
            y: top,
            size: rw.max(rh),
            width: dw,
            height: dh,
        });
    }
    // Patch (px, py) lands on dest (px + shift_x, py + shift_y).
    let shift_x = left - i64::from(x0);
    let shift_y = top - i64::from(y0);
    let to_dest = |px: u32, py: u32| {
        (
            (i64::from(px) + shift_x) as u32,
            (i64::from(py) + shift_y) as u32,
        )
    };

    let selected = |x: u32, y: u32| {
        (x0..=x1).contains(&x) && (y0..=y1).contains(&y) && mask.get_pixel(x, y)[0] != 0
    };

    let mut index = vec![None; (patch.width() * patch.height()) as usize];
    let mut order = Vec::new();
    for y in y0..=y1 {
        for x in x0..=x1 {
            if selected(x, y) {
                index[(y * patch.width() + x) as usize] = Some(order.len());
                order.push((x, y));
            }
        }
    }

    let nodes: Vec<Node> = order
        .iter()
        .map(|&(x, y)| {
            let here = to_f64(*patch.get_pixel(x, y));
            let mut guidance = [0.0; 3];
            let offsets = [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)];
            let neighbours = offsets.map(|(nx, ny)| {
                let there = to_f64(*patch.get_pixel(nx, ny));
                for ((g, h), t) in guidance.iter_mut().zip(here).zip(there) {
                    *g += h - t;
                }
                match index[(ny * patch.width() + nx) as usize] {
                    Some(i) => Neighbour::Unknown(i),
                    None => {
                        let (dx, dy) = to_dest(nx, ny);
                        Neighbour::Fixed(*dest.get_pixel(dx, dy))
                    }
                }
            });
            Node {
                dest: to_dest(x, y),
                neighbours,
                guidance,
            }
        })
        .collect();

    let mut solution: Vec<[f64; 3]> = order
        .iter()
        .map(|&(x, y)| to_f64(*patch.get_pixel(x, y)))
        .collect();

    for ch in 0..3 {
        let sweeps = solve_channel(&nodes, &mut solution, ch);
        log::debug!(
            "poisson channel {ch}: {} unknowns, {sweeps} sweeps",
            nodes.len()
        );
    }

    for (node, value) in nodes.iter().zip(&solution) {
        let px = dest.get_pixel_mut(node.dest.0, node.dest.1);
        for (c, v) in px.0.iter_mut().zip(value) {
            *c = v.round().clamp(0.0, 255.0) as u8;
        }
    }

    Ok(true)
}

/// Successive over-relaxation on one colour channel. Returns sweeps used.
fn solve_channel(nodes: &[Node], solution: &mut [[f64; 3]], ch: usize) -> usize {
    for sweep in 1..=MAX_SWEEPS {
        let mut max_change = 0.0_f64;
        for (i, node) in nodes.iter().enumerate() {
            let mut sum = node.guidance[ch];
            for n in &node.neighbours {
                sum += match *n {
                    Neighbour::Unknown(j) => solution[j][ch],
                    Neighbour::Fixed(px) => f64::from(px[ch]),
                };
            }
            let target = sum / 4.0;
            let change = SOR_OMEGA * (target - solution[i][ch]);
            solution[i][ch] += change;
            max_change = max_change.max(change.abs());
        }
        if max_change < TOLERANCE {
            return sweep;
        }
    }
    MAX_SWEEPS
}
