//! Error types for the blemish-removal crate.

/// Errors that can occur while setting up a session or repairing a blemish.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The image has zero width or height.
    #[error("image is empty ({width}x{height})")]
    EmptyImage {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },

    /// A repair option is out of its valid range.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// No edge above the gradient threshold was found around the click.
    #[error("no blemish detected at ({x}, {y})")]
    NoBlemishDetected {
        /// Click x coordinate in image space.
        x: u32,
        /// Click y coordinate in image space.
        y: u32,
    },

    /// The click lies outside the working image.
    #[error("click ({x}, {y}) is outside the {width}x{height} image")]
    OutOfBoundsClick {
        /// Click x coordinate.
        x: u32,
        /// Click y coordinate.
        y: u32,
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },

    /// A box or blend region does not fit inside the padded workspace.
    #[error("region at ({x}, {y}) size {size} does not fit in the {width}x{height} workspace")]
    RegionOutOfBounds {
        /// Left edge of the region (may be negative).
        x: i64,
        /// Top edge of the region (may be negative).
        y: i64,
        /// Side length of the region.
        size: u32,
        /// Workspace width in pixels.
        width: u32,
        /// Workspace height in pixels.
        height: u32,
    },

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image decoding or encoding.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Whether the caller may simply retry with another click.
    ///
    /// Recoverable errors never modify the session.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NoBlemishDetected { .. } | Error::OutOfBoundsClick { .. }
        )
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
