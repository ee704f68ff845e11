//! Camera acquisition.
//!
//! A camera is any [`FrameSource`]. [`acquire`] asks for the preferred stream
//! (rear-facing, ideal resolution), falls back to default constraints, and
//! only then gives up with a retryable [`Error::CameraUnavailable`].

use std::fmt;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info, warn};

use crate::config::CaptureConfig;
use crate::error::{Error, Result};

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    /// Rear camera, pointing at the world.
    Environment,
    /// Whatever the device offers.
    Any,
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Environment => write!(f, "environment"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// Constraints for opening a camera stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Requested facing mode.
    pub facing: Facing,
    /// Ideal frame width, if any.
    pub ideal_width: Option<u32>,
    /// Ideal frame height, if any.
    pub ideal_height: Option<u32>,
}

impl StreamConstraints {
    /// Rear-facing camera at the configured ideal resolution.
    #[must_use]
    pub fn preferred(config: &CaptureConfig) -> Self {
        Self {
            facing: Facing::Environment,
            ideal_width: Some(config.ideal_width),
            ideal_height: Some(config.ideal_height),
        }
    }

    /// Any camera at any resolution.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            facing: Facing::Any,
            ideal_width: None,
            ideal_height: None,
        }
    }
}

/// A device that produces camera frames.
pub trait FrameSource: Send {
    /// The name of this source (for logging).
    fn name(&self) -> &str;

    /// Open a stream with the given constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if the constraints cannot be satisfied or access is
    /// denied.
    fn open(&mut self, constraints: &StreamConstraints) -> Result<()>;

    /// Grab the current frame from an open stream.
    ///
    /// # Errors
    ///
    /// Returns an error if no frame is available.
    fn grab(&mut self) -> Result<DynamicImage>;

    /// Release the stream.
    fn close(&mut self) {}
}

/// An open camera stream.
///
/// The stream is closed when the camera is dropped.
pub struct Camera<S: FrameSource> {
    source: S,
    constraints: StreamConstraints,
}

impl<S: FrameSource> fmt::Debug for Camera<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Camera")
            .field("source", &self.source.name())
            .field("constraints", &self.constraints)
            .finish()
    }
}

impl<S: FrameSource> Camera<S> {
    /// The constraints the stream was opened with.
    #[must_use]
    pub fn constraints(&self) -> &StreamConstraints {
        &self.constraints
    }

    /// Grab a frame, rejecting frames with no pixels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CameraNotReady`] if the stream has no usable frame.
    pub fn capture(&mut self) -> Result<DynamicImage> {
        let frame = self.source.grab()?;
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::CameraNotReady);
        }
        debug!("Captured {}x{} frame from {}", width, height, self.source.name());
        Ok(frame)
    }
}

impl<S: FrameSource> Drop for Camera<S> {
    fn drop(&mut self) {
        self.source.close();
    }
}

/// Open a camera, falling back to default constraints.
///
/// # Errors
///
/// Returns [`Error::CameraUnavailable`] if neither the preferred nor the
/// fallback constraints can be satisfied.
pub fn acquire<S: FrameSource>(mut source: S, preferred: &StreamConstraints) -> Result<Camera<S>> {
    match source.open(preferred) {
        Ok(()) => {
            info!("Opened {} with {} facing", source.name(), preferred.facing);
            return Ok(Camera {
                source,
                constraints: *preferred,
            });
        }
        Err(e) => warn!(
            "Failed to open {} with preferred constraints: {}",
            source.name(),
            e
        ),
    }

    let fallback = StreamConstraints::fallback();
    match source.open(&fallback) {
        Ok(()) => {
            info!("Opened {} with default constraints", source.name());
            Ok(Camera {
                source,
                constraints: fallback,
            })
        }
        Err(e) => {
            warn!("Fallback camera failed for {}: {}", source.name(), e);
            Err(Error::camera_unavailable(format!(
                "could not open {}: {e}",
                source.name()
            )))
        }
    }
}

/// A camera backed by an image file.
///
/// Every grab re-reads the file, so replacing it between captures behaves
/// like pointing the camera at something else.
#[derive(Debug, Clone)]
pub struct ImageFileSource {
    path: PathBuf,
    name: String,
    open: bool,
}

impl ImageFileSource {
    /// Create a source for the image at `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: format!("image file {}", path.display()),
            path,
            open: false,
        }
    }
}

impl FrameSource for ImageFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self, _constraints: &StreamConstraints) -> Result<()> {
        let metadata = std::fs::metadata(&self.path)
            .map_err(|e| Error::camera_unavailable(format!("{}: {e}", self.path.display())))?;
        if !metadata.is_file() {
            return Err(Error::camera_unavailable(format!(
                "{} is not a file",
                self.path.display()
            )));
        }
        self.open = true;
        Ok(())
    }

    fn grab(&mut self) -> Result<DynamicImage> {
        if !self.open {
            return Err(Error::CameraNotReady);
        }
        Ok(image::open(&self.path)?)
    }

    fn close(&mut self) {
        self.open = false;
    }
}
