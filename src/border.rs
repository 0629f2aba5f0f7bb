//! Reflect-padded workspaces and the smoothed grayscale cache.
//!
//! Every neighbourhood operation of a repair (gradient box, candidate grid,
//! blend region) runs on a copy of the working image enlarged with a mirrored
//! border, so clicks right at the image edge behave like clicks in the middle.
//! The mirror skips the edge pixel itself (`gfedcb|abcdefgh|gfedcba`) which keeps
//! gradients continuous across the seam.

use image::{imageops, GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage};
use imageproc::filter::{gaussian_blur_f32, median_filter};

use crate::error::{Error, Result};

/// Gaussian sigma matching a 5x5 kernel with automatic sigma.
const SMOOTHING_SIGMA: f32 = 1.1;

/// Radius of the median filter applied after the blur (3x3 window).
const MEDIAN_RADIUS: u32 = 1;

/// Border-reflected copies of the working image and its smoothed grayscale.
///
/// Created fresh for every click and dropped once the repair finishes.
#[derive(Debug, Clone)]
pub struct PaddedWorkspace {
    /// Padded colour buffer, source of patches and target of compositing.
    pub color: RgbImage,
    /// Padded smoothed grayscale, used for detection and patch scoring.
    pub gray: GrayImage,
    border: u32,
    width: u32,
    height: u32,
}

impl PaddedWorkspace {
    /// Pad `color` and `gray` by `border` pixels on every side.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyImage`] if either image has a zero dimension and
    /// [`Error::InvalidOptions`] if the two buffers differ in size.
    pub fn new(color: &RgbImage, gray: &GrayImage, border: u32) -> Result<Self> {
        if color.dimensions() != gray.dimensions() {
            return Err(Error::InvalidOptions(format!(
                "grayscale cache is {}x{} but the image is {}x{}",
                gray.width(),
                gray.height(),
                color.width(),
                color.height()
            )));
        }

        Ok(Self {
            color: pad_reflect_101(color, border)?,
            gray: pad_reflect_101(gray, border)?,
            border,
            width: color.width(),
            height: color.height(),
        })
    }

    /// Border width in pixels.
    #[must_use]
    pub fn border(&self) -> u32 {
        self.border
    }

    /// Translate an image-space point into padded space.
    #[must_use]
    pub fn to_padded(&self, x: u32, y: u32) -> (u32, u32) {
        (x + self.border, y + self.border)
    }

    /// Crop the border off the colour buffer, yielding an image of the
    /// original size.
    #[must_use]
    pub fn unpad(&self) -> RgbImage {
        imageops::crop_imm(&self.color, self.border, self.border, self.width, self.height)
            .to_image()
    }
}

/// Map an out-of-range coordinate back into `0..len` by mirroring without
/// repeating the edge sample.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn reflect_101(index: i64, len: u32) -> u32 {
    if len == 1 {
        return 0;
    }
    let len = i64::from(len);
    let period = 2 * (len - 1);
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - i;
    }
    i as u32
}

/// Return a copy of `image` enlarged by `border` mirrored pixels on each side.
///
/// Borders wider than the image are handled by repeated reflection.
///
/// # Errors
///
/// Returns [`Error::EmptyImage`] if the image has a zero dimension and
/// [`Error::InvalidOptions`] if the padded size does not fit in `u32`.
pub fn pad_reflect_101<P>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    border: u32,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>>
where
    P: Pixel,
{
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::EmptyImage { width, height });
    }

    let padded = |len: u32| border.checked_mul(2).and_then(|b| len.checked_add(b));
    let (Some(padded_width), Some(padded_height)) = (padded(width), padded(height)) else {
        return Err(Error::InvalidOptions(format!(
            "border {border} is too wide for a {width}x{height} image"
        )));
    };

    let offset = i64::from(border);
    Ok(ImageBuffer::from_fn(
        padded_width,
        padded_height,
        |x, y| {
            let sx = reflect_101(i64::from(x) - offset, width);
            let sy = reflect_101(i64::from(y) - offset, height);
            *image.get_pixel(sx, sy)
        },
    ))
}

/// Luminance of an RGB pixel: `0.299*R + 0.587*G + 0.114*B`, rounded.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn luminance(px: &Rgb<u8>) -> u8 {
    let lum = 0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2]);
    lum.round().clamp(0.0, 255.0) as u8
}

/// Build the noise-suppressed grayscale used for blemish detection.
///
/// Gaussian blur, then a 3x3 median, then luminance conversion.
#[must_use]
pub fn smooth_gray(image: &RgbImage) -> GrayImage {
    let blurred = gaussian_blur_f32(image, SMOOTHING_SIGMA);
    let filtered = median_filter(&blurred, MEDIAN_RADIUS, MEDIAN_RADIUS);
    GrayImage::from_fn(filtered.width(), filtered.height(), |x, y| {
        Luma([luminance(filtered.get_pixel(x, y))])
    })
}
