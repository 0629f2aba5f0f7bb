//! Circular masks derived from the detected blemish.

use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_circle_mut;

use crate::detection::BlemishGeometry;

/// Value of a selected mask pixel.
pub const MASK_ON: u8 = 255;

/// The two box-sized masks used by a repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskPair {
    /// Disk of the detected radius; weights intensity statistics.
    pub stats: GrayImage,
    /// Disk of the box half size; limits compositing.
    pub blend: GrayImage,
}

impl MaskPair {
    /// Build both masks for a `size`x`size` box.
    ///
    /// Both disks share the detected centre. Anything falling outside the
    /// box is clipped, so neither mask can exceed it.
    #[must_use]
    pub fn new(size: u32, geometry: &BlemishGeometry) -> Self {
        let half = (size - 1) / 2;
        Self {
            stats: filled_disk(size, geometry.center, geometry.radius),
            blend: filled_disk(size, geometry.center, half),
        }
    }
}

/// A `size`x`size` mask, zero everywhere but a filled disk.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn filled_disk(size: u32, center: (u32, u32), radius: u32) -> GrayImage {
    let mut mask = GrayImage::new(size, size);
    draw_filled_circle_mut(
        &mut mask,
        (center.0 as i32, center.1 as i32),
        radius as i32,
        Luma([MASK_ON]),
    );
    mask
}

/// Complement of a binary mask.
#[must_use]
pub fn inverted(mask: &GrayImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([!mask.get_pixel(x, y)[0]])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p[0] != 0).count()
    }

    #[test]
    fn masks_share_centre_with_different_radii() {
        let geometry = BlemishGeometry {
            center: (17, 17),
            radius: 4,
        };
        let masks = MaskPair::new(35, &geometry);

        assert_eq!(masks.stats.dimensions(), (35, 35));
        assert_eq!(masks.blend.dimensions(), (35, 35));
        assert_eq!(masks.stats.get_pixel(17, 17)[0], MASK_ON);
        assert_eq!(masks.blend.get_pixel(17, 17)[0], MASK_ON);
        assert_eq!(masks.stats.get_pixel(17, 23)[0], 0);
        assert_eq!(masks.blend.get_pixel(17, 23)[0], MASK_ON);
        assert!(coverage(&masks.stats) < coverage(&masks.blend));
    }

    #[test]
    fn masks_are_binary() {
        let masks = MaskPair::new(
            35,
            &BlemishGeometry {
                center: (10, 20),
                radius: 6,
            },
        );
        for mask in [&masks.stats, &masks.blend] {
            assert!(mask.pixels().all(|p| p[0] == 0 || p[0] == MASK_ON));
        }
    }

    #[test]
    fn blend_mask_stays_inside_box_for_off_centre_blemish() {
        // Centre in the corner: the half-size disk is clipped to the box.
        let masks = MaskPair::new(
            35,
            &BlemishGeometry {
                center: (0, 34),
                radius: 17,
            },
        );
        assert_eq!(masks.blend.dimensions(), (35, 35));
        assert!(coverage(&masks.blend) > 0);
        assert!(coverage(&masks.blend) < 35 * 35 / 2);
    }

    #[test]
    fn blend_disk_touches_but_never_exceeds_box_when_centred() {
        let disk = filled_disk(35, (17, 17), 17);
        assert_eq!(disk.get_pixel(0, 17)[0], MASK_ON);
        assert_eq!(disk.get_pixel(34, 17)[0], MASK_ON);
        assert_eq!(disk.get_pixel(17, 0)[0], MASK_ON);
        assert_eq!(disk.get_pixel(0, 0)[0], 0);
        assert_eq!(disk.get_pixel(34, 34)[0], 0);
    }

    #[test]
    fn zero_radius_selects_centre_pixel() {
        let disk = filled_disk(35, (17, 17), 0);
        assert_eq!(coverage(&disk), 1);
        assert_eq!(disk.get_pixel(17, 17)[0], MASK_ON);
    }

    #[test]
    fn inversion_complements_coverage() {
        let disk = filled_disk(35, (17, 17), 5);
        let inv = inverted(&disk);
        assert_eq!(coverage(&disk) + coverage(&inv), 35 * 35);
        assert_eq!(inv.get_pixel(17, 17)[0], 0);
    }
}
