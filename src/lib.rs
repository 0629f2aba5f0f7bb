//! Click-to-heal blemish removal.
//!
//! A user marks a small defect with a single point. The crate finds the
//! defect's true extent around that point, picks a nearby patch of matching
//! brightness and blends it in with Poisson (seamless) cloning so no seam is
//! visible.
//!
//! # Quick Start
//!
//! ```no_run
//! use blemish_removal::{RepairOptions, RetouchSession};
//!
//! let mut session = RetouchSession::open("portrait.jpg".as_ref(), RepairOptions::default())
//!     .expect("failed to load image");
//! session.repair(212, 148).expect("no blemish there");
//! session.image().save("portrait_retouched.png").unwrap();
//! ```
//!
//! # Pipeline
//!
//! Each click runs, in order:
//! 1. [`border`]: reflect-pad the image and its smoothed grayscale
//! 2. [`detection`]: Scharr gradient, threshold, largest contour, enclosing circle
//! 3. [`mask`]: statistics and blend disks
//! 4. [`search`]: grid search for the patch whose mean matches the blemish surround
//! 5. [`blending`]: seamless clone of the patch, then crop the border off
//!
//! A failed step leaves the session untouched; [`RetouchSession::undo`]
//! reverts the last successful repair.

#![deny(missing_docs)]

pub mod blending;
pub mod border;
pub mod detection;
mod engine;
pub mod error;
pub mod mask;
pub mod search;

pub use detection::BlemishGeometry;
pub use engine::{
    default_output_path, is_supported_image, repair, save_image, Repair, RepairOptions,
    RetouchSession, MAX_BOX_SIZE,
};
pub use error::{Error, Result};
pub use mask::MaskPair;
pub use search::{CandidateScore, PatchMatch};
