//! Repair session: options, the click-to-repair pipeline and undo.

use std::path::{Path, PathBuf};

use image::{imageops, DynamicImage, GrayImage, ImageFormat, RgbImage};

use crate::blending;
use crate::border::{smooth_gray, PaddedWorkspace};
use crate::detection::{self, BlemishGeometry};
use crate::error::{Error, Result};
use crate::mask::MaskPair;
use crate::search::{self, PatchMatch};

/// Largest accepted detection box side.
pub const MAX_BOX_SIZE: u32 = 4095;

/// Options controlling blemish repair.
#[derive(Debug, Clone)]
pub struct RepairOptions {
    /// Side of the square detection box in pixels (odd, at least 3).
    pub box_size: u32,
    /// Gradient level (0-255) a pixel must exceed to count as blemish edge.
    pub gradient_threshold: u8,
    /// Cells per side of the patch search grid (odd, at least 3).
    pub grid_size: u32,
    /// Enable verbose logging.
    pub verbose: bool,
    /// Suppress non-error output.
    pub quiet: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            box_size: 35,
            gradient_threshold: 50,
            grid_size: 5,
            verbose: false,
            quiet: false,
        }
    }
}

impl RepairOptions {
    /// Check the numeric options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOptions`] for an even, too small or too large
    /// box, an even or too small grid, or a grid so fine that its cells would
    /// be less than one pixel apart.
    pub fn validate(&self) -> Result<()> {
        if self.box_size < 3 || self.box_size % 2 == 0 {
            return Err(Error::InvalidOptions(format!(
                "box size must be odd and at least 3, got {}",
                self.box_size
            )));
        }
        if self.box_size > MAX_BOX_SIZE {
            return Err(Error::InvalidOptions(format!(
                "box size must be at most {MAX_BOX_SIZE}, got {}",
                self.box_size
            )));
        }
        if self.grid_size < 3 || self.grid_size % 2 == 0 {
            return Err(Error::InvalidOptions(format!(
                "grid size must be odd and at least 3, got {}",
                self.grid_size
            )));
        }
        if (self.grid_size - 1) / 2 > self.box_size {
            return Err(Error::InvalidOptions(format!(
                "grid size {} is too fine for box size {}: at most {} cells per side",
                self.grid_size,
                self.box_size,
                2 * self.box_size + 1
            )));
        }
        Ok(())
    }

    /// Half of the detection box, excluding the centre pixel.
    #[must_use]
    pub fn half_size(&self) -> u32 {
        (self.box_size - 1) / 2
    }

    /// Mirrored border added around the image for each repair.
    #[must_use]
    pub fn border(&self) -> u32 {
        search::required_border(self.box_size)
    }
}

/// What a successful repair found and used.
#[derive(Debug, Clone)]
pub struct Repair {
    /// Click point in image coordinates.
    pub click: (u32, u32),
    /// Click point in padded coordinates.
    pub padded_click: (u32, u32),
    /// Detected blemish, local to the detection box.
    pub geometry: BlemishGeometry,
    /// Patch search outcome, positions in padded coordinates.
    pub patch: PatchMatch,
}

/// Repair the blemish nearest `click` without touching the inputs.
///
/// Returns the repaired image, same size as the input, with the repair
/// details. `smoothed` must be the [`smooth_gray`] cache of the image the session
/// started from; it is deliberately not recomputed per click.
///
/// # Errors
///
/// - [`Error::InvalidOptions`] for bad options or mismatched buffers
/// - [`Error::OutOfBoundsClick`] if `click` lies outside `image`
/// - [`Error::NoBlemishDetected`] if no edge crosses the gradient threshold
/// - [`Error::RegionOutOfBounds`] if a box leaves the padded workspace
pub fn repair(
    image: &RgbImage,
    smoothed: &GrayImage,
    click: (u32, u32),
    opts: &RepairOptions,
) -> Result<(RgbImage, Repair)> {
    opts.validate()?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::EmptyImage { width, height });
    }
    if click.0 >= width || click.1 >= height {
        return Err(Error::OutOfBoundsClick {
            x: click.0,
            y: click.1,
            width,
            height,
        });
    }

    let size = opts.box_size;
    let half = opts.half_size();
    let mut workspace = PaddedWorkspace::new(image, smoothed, opts.border())?;
    let site = workspace.to_padded(click.0, click.1);

    let geometry =
        detection::detect_blemish(&workspace.gray, site, size, opts.gradient_threshold)?
            .ok_or(Error::NoBlemishDetected {
                x: click.0,
                y: click.1,
            })?;

    let masks = MaskPair::new(size, &geometry);
    let found = search::search_patch(&workspace.gray, site, &masks.stats, opts.grid_size)?;

    let (px, py) = found.best.position;
    let patch = imageops::crop_imm(&workspace.color, px, py, size, size).to_image();
    blending::seamless_clone(&patch, &mut workspace.color, &masks.blend, site)?;

    log::debug!(
        "click {click:?} -> padded {site:?}, box half {half}, blemish {geometry:?}, patch {:?}",
        found.best.position
    );

    let repaired = workspace.unpad();
    Ok((
        repaired,
        Repair {
            click,
            padded_click: site,
            geometry,
            patch: found,
        },
    ))
}

/// An interactive retouching session over one image.
///
/// Owns the working image, the smoothed grayscale cache and a single undo
/// slot. Repairs run one at a time through `&mut self`.
#[derive(Debug, Clone)]
pub struct RetouchSession {
    image: RgbImage,
    smoothed: GrayImage,
    snapshot: Option<RgbImage>,
    options: RepairOptions,
}

impl RetouchSession {
    /// Start a session on `image`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOptions`] for bad options and
    /// [`Error::EmptyImage`] for an image with a zero dimension.
    pub fn new(image: RgbImage, options: RepairOptions) -> Result<Self> {
        options.validate()?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::EmptyImage { width, height });
        }
        let smoothed = smooth_gray(&image);
        Ok(Self {
            image,
            smoothed,
            snapshot: None,
            options,
        })
    }

    /// Load an image file and start a session on it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if the file cannot be decoded, plus the
    /// errors of [`RetouchSession::new`].
    pub fn open(path: &Path, options: RepairOptions) -> Result<Self> {
        let image = image::open(path)?.to_rgb8();
        log::debug!(
            "loaded {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Self::new(image, options)
    }

    /// The current working image.
    #[must_use]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Consume the session, returning the working image.
    #[must_use]
    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Whether an undo snapshot is held.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Repair the blemish at `(x, y)` in image coordinates.
    ///
    /// On success the previous image becomes the undo snapshot. On failure
    /// neither the image nor the snapshot changes.
    ///
    /// # Errors
    ///
    /// See [`repair`].
    pub fn repair(&mut self, x: u32, y: u32) -> Result<Repair> {
        let outcome = repair(&self.image, &self.smoothed, (x, y), &self.options);
        match outcome {
            Ok((repaired, done)) => {
                let previous = std::mem::replace(&mut self.image, repaired);
                self.snapshot = Some(previous);
                log::info!(
                    "repaired ({x}, {y}): radius {}, patch diff {:.2}",
                    done.geometry.radius,
                    done.patch.best.difference
                );
                Ok(done)
            }
            Err(e) => {
                log::warn!("repair at ({x}, {y}) skipped: {e}");
                Err(e)
            }
        }
    }

    /// Restore the image from before the last successful repair.
    ///
    /// Returns `false` when there is nothing to undo. The snapshot is
    /// consumed, so a second undo is a no-op.
    pub fn undo(&mut self) -> bool {
        match self.snapshot.take() {
            Some(previous) => {
                self.image = previous;
                log::info!("undid last repair");
                true
            }
            None => false,
        }
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Save an RGB image, using maximum quality for JPEG.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&DynamicImage::ImageRgb8(img.clone()))?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            img.save(path)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Generate a default output path from an input path.
///
/// Example: `"portrait.jpg"` becomes `"portrait_retouched.jpg"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_retouched.{ext}"))
}
